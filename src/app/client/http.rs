//! Core HTTP operations with rate limiting and retry logic
//!
//! This module provides the [`HttpTransport`] capability used by
//! authentication, catalog scraping and episode downloads, and its reqwest
//! implementation. Requests are rate limited, and 429/503 answers are retried
//! with exponential backoff. Every other failure is classified and returned:
//! episode-level retries belong to the orchestrator.

use std::error::Error as StdError;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, StatusCode};
use url::Url;

use crate::constants::limits;
use crate::errors::{NetResult, NetworkError};

/// Request/response capability shared by every component that talks to the site
///
/// All implementations must send and store cookies through one shared jar.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Fetch a page body
    async fn get(&self, url: &Url) -> NetResult<String>;

    /// Fetch a page body with extra query parameters
    async fn get_with_query(&self, url: &Url, query: &[(&str, &str)]) -> NetResult<String>;

    /// Submit an urlencoded form and return the response body
    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> NetResult<String>;
}

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// A zero rate is treated as one request per second.
    pub fn new(client: Client, rate_limit_rps: u32) -> Self {
        Self {
            client,
            rate_limiter: Self::build_rate_limiter(rate_limit_rps),
        }
    }

    fn build_rate_limiter(rate_limit_rps: u32) -> DirectRateLimiter {
        let rate = NonZeroU32::new(rate_limit_rps).unwrap_or(NonZeroU32::MIN);
        RateLimiter::direct(Quota::per_second(rate))
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Sends the request built by `build`, backing off on 429/503
    async fn execute<F>(&self, url: &Url, build: F) -> NetResult<String>
    where
        F: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut retries = 0;
        loop {
            // Apply rate limiting with jitter to avoid thundering herd
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
                .await;

            let response = build(&self.client)
                .send()
                .await
                .map_err(|e| classify(url, e))?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
            {
                if retries < limits::MAX_STATUS_RETRIES {
                    retries += 1;
                    let delay = backoff_delay(retries);
                    tracing::warn!(
                        "Server answered {} for {}. Backing off for {}ms",
                        status.as_u16(),
                        url,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                    NetworkError::RateLimitExceeded
                } else {
                    NetworkError::ServerOverloaded
                });
            }

            if !status.is_success() {
                return Err(NetworkError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }

            let body = response.text().await.map_err(|e| classify(url, e))?;
            tracing::debug!("Fetched {} ({} bytes)", url, body.len());
            return Ok(body);
        }
    }
}

#[async_trait]
impl HttpTransport for HttpHandler {
    async fn get(&self, url: &Url) -> NetResult<String> {
        self.execute(url, |client| client.get(url.clone())).await
    }

    async fn get_with_query(&self, url: &Url, query: &[(&str, &str)]) -> NetResult<String> {
        self.execute(url, |client| client.get(url.clone()).query(query))
            .await
    }

    async fn post_form(&self, url: &Url, form: &[(&str, &str)]) -> NetResult<String> {
        self.execute(url, |client| client.post(url.clone()).form(form))
            .await
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(limits::RETRY_BASE_DELAY_MS * 2_u64.pow(attempt))
}

/// Map a reqwest failure onto the transport error taxonomy
fn classify(url: &Url, error: reqwest::Error) -> NetworkError {
    if is_name_resolution(&error) {
        NetworkError::NameResolution {
            url: url.to_string(),
        }
    } else {
        NetworkError::Transport {
            url: url.to_string(),
            source: error,
        }
    }
}

/// Walks the error chain looking for a resolver failure
fn is_name_resolution(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(err) = current {
        let message = err.to_string().to_lowercase();
        if message.contains("dns error")
            || message.contains("failed to lookup address")
            || message.contains("name or service not known")
            || message.contains("no such host")
        {
            return true;
        }
        current = err.source();
    }
    false
}
