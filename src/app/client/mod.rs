//! HTTP client layer for the catalog site
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration, building and site endpoints
//! - `session`: cookie jar shared by every request and its on-disk store
//! - `http`: the transport capability with rate limiting and backoff
//! - `auth`: session verification and the three login strategies

use std::sync::Arc;

use crate::auth::Credentials;
use crate::errors::AuthResult;

pub mod auth;
pub mod config;
pub mod http;
pub mod session;

pub use auth::{AuthManager, Session, SharedAuth, Verification};
pub use config::{ClientConfig, SiteEndpoints};
pub use http::{HttpHandler, HttpTransport};
pub use session::{SessionJar, SessionStore, StoredCookie, StoredSession};

/// Wiring of one transport, one cookie jar and one auth manager
///
/// Every component that talks to the site is handed clones of the same
/// transport and auth manager, so they all share a single session.
#[derive(Debug, Clone)]
pub struct SiteClient {
    http: Arc<HttpHandler>,
    jar: Arc<SessionJar>,
    auth: SharedAuth,
    endpoints: SiteEndpoints,
}

impl SiteClient {
    /// Builds the client, restoring any session saved by a previous run
    ///
    /// No request is made here; authentication happens lazily on first use.
    pub async fn new(
        config: ClientConfig,
        store: SessionStore,
        credentials: Option<Credentials>,
    ) -> AuthResult<Self> {
        let stored = store.load().await?;
        if !stored.cookies.is_empty() {
            tracing::debug!(
                "Restored {} cookies from {}",
                stored.cookies.len(),
                store.path().display()
            );
        }

        let jar = Arc::new(SessionJar::from_stored(&stored.cookies));
        let client = config.build_http_client(jar.clone())?;
        let http = Arc::new(HttpHandler::new(client, config.rate_limit_rps));
        let endpoints = config.endpoints()?;

        let auth = AuthManager::new(
            http.clone(),
            jar.clone(),
            store,
            endpoints.clone(),
            credentials,
        )
        .with_device_id(stored.device_id)
        .shared();

        Ok(Self {
            http,
            jar,
            auth,
            endpoints,
        })
    }

    /// Shared transport for scraping and downloads
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        self.http.clone()
    }

    /// Shared authentication manager
    pub fn auth(&self) -> SharedAuth {
        self.auth.clone()
    }

    pub fn jar(&self) -> &Arc<SessionJar> {
        &self.jar
    }

    pub fn endpoints(&self) -> &SiteEndpoints {
        &self.endpoints
    }
}

#[cfg(test)]
mod tests;
