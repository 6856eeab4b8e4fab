//! HTTP client configuration and building logic
//!
//! This module handles the configuration and construction of the HTTP client
//! and the set of site endpoints it talks to.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONNECTION, REFERER};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::session::SessionJar;
use crate::constants::{http, limits, site};
use crate::errors::{NetResult, NetworkError};

/// Configuration for the site HTTP client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Site base URL; every site endpoint is resolved against it
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// TCP keep-alive settings
    pub tcp_keepalive: Option<Duration>,
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum number of idle connections per host
    pub pool_max_per_host: usize,
    /// Request timeout
    pub request_timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: site::BASE_URL.to_string(),
            user_agent: http::USER_AGENT.to_string(),
            tcp_keepalive: Some(Duration::from_secs(30)),
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// Resolved site URLs used by authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteEndpoints {
    pub base_url: Url,
    pub profile_url: Url,
    pub login_url: Url,
}

impl ClientConfig {
    /// Configuration pointing at another site root (used by tests and mirrors)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Resolve the site endpoints against the base URL
    pub fn endpoints(&self) -> NetResult<SiteEndpoints> {
        let base_url = Url::parse(&self.base_url).map_err(|e| NetworkError::InvalidUrl {
            url: self.base_url.clone(),
            error: e.to_string(),
        })?;
        let join = |path: &str| {
            base_url.join(path).map_err(|e| NetworkError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                error: e.to_string(),
            })
        };

        Ok(SiteEndpoints {
            profile_url: join(site::PROFILE_PATH)?,
            login_url: join(site::LOGIN_PATH)?,
            base_url,
        })
    }

    /// Builds the HTTP client around the shared session jar
    pub fn build_http_client(&self, jar: Arc<SessionJar>) -> NetResult<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        if let Ok(referer) = HeaderValue::from_str(&format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            site::LOGIN_PATH
        )) {
            headers.insert(REFERER, referer);
        }

        let mut client_builder = Client::builder()
            .cookie_provider(jar) // every request shares the one session
            .default_headers(headers)
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(keepalive) = self.tcp_keepalive {
            client_builder = client_builder.tcp_keepalive(keepalive);
        }

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder
            .build()
            .map_err(|source| NetworkError::Transport {
                url: self.base_url.clone(),
                source,
            })
    }
}
