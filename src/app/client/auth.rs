//! Session authentication
//!
//! [`AuthManager`] owns the process-wide [`Session`]. It verifies whatever
//! cookies are already in the jar by reading session markers from a profile
//! page, logs in with the configured strategy only when that fails, and
//! persists the jar after every successful verification.

use std::sync::{Arc, OnceLock};

use rand::distributions::Alphanumeric;
use rand::Rng;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use tokio::sync::Mutex;
use url::Url;

use super::config::SiteEndpoints;
use super::http::HttpTransport;
use super::session::{SessionJar, SessionStore, StoredSession};
use crate::auth::{ApiCredentials, Credentials};
use crate::constants::auth;
use crate::errors::{AuthError, AuthResult, NetworkError};

/// Authentication manager shared by the scraper and the episode downloader
pub type SharedAuth = Arc<Mutex<AuthManager>>;

/// Process-wide session state
///
/// Flags only move from false to true; [`AuthManager::logout`] is the one
/// way back.
#[derive(Debug, Clone)]
pub struct Session {
    authenticated: bool,
    premium: bool,
    jar: Arc<SessionJar>,
}

impl Session {
    fn new(jar: Arc<SessionJar>) -> Self {
        Self {
            authenticated: false,
            premium: false,
            jar,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_premium(&self) -> bool {
        self.premium
    }

    pub fn jar(&self) -> &Arc<SessionJar> {
        &self.jar
    }

    fn mark_authenticated(&mut self, premium: bool) {
        self.authenticated = true;
        self.premium = self.premium || premium;
    }
}

/// Outcome of reading the session markers of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Authenticated { premium: bool },
    Anonymous { message: String },
}

/// Drives verification and login for the shared session
pub struct AuthManager {
    transport: Arc<dyn HttpTransport>,
    store: SessionStore,
    endpoints: SiteEndpoints,
    credentials: Option<Credentials>,
    device_id: Option<String>,
    session: Session,
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("store", &self.store)
            .field("endpoints", &self.endpoints)
            .field("credentials", &self.credentials)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl AuthManager {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        jar: Arc<SessionJar>,
        store: SessionStore,
        endpoints: SiteEndpoints,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            transport,
            store,
            endpoints,
            credentials,
            device_id: None,
            session: Session::new(jar),
        }
    }

    /// Reuse the device id recorded by a previous run
    pub fn with_device_id(mut self, device_id: Option<String>) -> Self {
        self.device_id = device_id;
        self
    }

    /// Wrap the manager for sharing between components
    pub fn shared(self) -> SharedAuth {
        Arc::new(Mutex::new(self))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Make sure the session is authenticated, logging in if required
    ///
    /// Once authenticated this returns immediately without any request.
    pub async fn ensure_authenticated(&mut self) -> AuthResult<&Session> {
        if self.session.authenticated {
            return Ok(&self.session);
        }

        match self.verify().await? {
            Verification::Authenticated { premium } => {
                tracing::info!("Reusing stored session");
                self.accept(premium).await?;
                return Ok(&self.session);
            }
            Verification::Anonymous { message } => {
                tracing::debug!("Stored session is not logged in: {}", message);
            }
        }

        let credentials = self
            .credentials
            .clone()
            .ok_or(AuthError::MissingCredentials)?;

        match &credentials {
            Credentials::Api(api) => self.login_api(api).await?,
            Credentials::CookieReplay { user_id, user_key } => {
                self.replay_cookies(user_id, user_key)
            }
            Credentials::Form { user, pass } => self.login_form(user, pass).await?,
        }

        match self.verify().await? {
            Verification::Authenticated { premium } => {
                tracing::info!("Successfully logged in");
                self.accept(premium).await?;
                Ok(&self.session)
            }
            Verification::Anonymous { message } => {
                tracing::error!("Login verification failed: {}", message);
                Err(AuthError::VerificationFailed { message })
            }
        }
    }

    /// Clear the stored session and reset the in-memory one
    pub async fn logout(&mut self) -> AuthResult<bool> {
        let removed = self.store.clear().await?;
        self.session.jar.clear();
        self.session.authenticated = false;
        self.session.premium = false;
        Ok(removed)
    }

    /// Fetch the profile page and read its session markers
    pub async fn verify(&self) -> AuthResult<Verification> {
        let html = self.transport.get(&self.endpoints.profile_url).await?;
        parse_session_markers(&html)
    }

    async fn accept(&mut self, premium: bool) -> AuthResult<()> {
        self.session.mark_authenticated(premium);
        if self.session.premium {
            tracing::info!("You have a premium account!");
        } else {
            tracing::warn!("Do not use this app without a premium account.");
        }

        self.persist().await?;
        Ok(())
    }

    /// Save the jar as it is now, including cookies rotated since login
    ///
    /// Does nothing until the session has been authenticated, so an
    /// anonymous jar never replaces a stored session.
    pub async fn persist(&self) -> AuthResult<bool> {
        if !self.session.authenticated {
            return Ok(false);
        }
        self.store
            .save(&StoredSession {
                device_id: self.device_id.clone(),
                cookies: self.session.jar.snapshot(),
            })
            .await?;
        Ok(true)
    }

    async fn login_form(&self, user: &str, pass: &str) -> AuthResult<()> {
        tracing::info!("Logging in as {} with the login form", user);
        let login_page = self.transport.get(&self.endpoints.login_url).await?;
        let token = extract_csrf_token(&login_page)?;
        tracing::debug!(
            "Found login token: {}...",
            token.chars().take(8).collect::<String>()
        );

        self.transport
            .post_form(
                &self.endpoints.login_url,
                &[
                    (auth::FORM_USERNAME_FIELD, user),
                    (auth::FORM_PASSWORD_FIELD, pass),
                    (auth::FORM_REDIRECT_FIELD, "/"),
                    (auth::FORM_TOKEN_FIELD, token.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn login_api(&mut self, api: &ApiCredentials) -> AuthResult<()> {
        tracing::info!("Logging in as {} through the API", api.user);
        let device_id = api
            .device_id
            .clone()
            .or_else(|| self.device_id.clone())
            .unwrap_or_else(generate_device_id);
        self.device_id = Some(device_id.clone());

        let session_url = parse_url(&api.session_url)?;
        let body = self
            .transport
            .get_with_query(
                &session_url,
                &[
                    ("device_id", device_id.as_str()),
                    ("device_type", auth::API_DEVICE_TYPE),
                    ("access_token", api.session_key.as_str()),
                    ("version", api.api_version.as_str()),
                    ("locale", api.locale.as_str()),
                ],
            )
            .await?;
        let session_id = parse_session_start(&body)?;

        let login_url = parse_url(&api.login_url)?;
        let body = self
            .transport
            .post_form(
                &login_url,
                &[
                    ("account", api.user.as_str()),
                    ("password", api.pass.as_str()),
                    ("session_id", session_id.as_str()),
                    ("version", api.api_version.as_str()),
                ],
            )
            .await?;
        parse_login_response(&body)?;

        let jar = &self.session.jar;
        jar.inject(auth::SESSION_ID_COOKIE, &session_id, &self.endpoints.base_url);
        jar.inject(auth::LOCALE_COOKIE, &api.locale, &self.endpoints.base_url);
        Ok(())
    }

    fn replay_cookies(&self, user_id: &str, user_key: &str) {
        tracing::info!("Logging in by replaying cookies for user id {}", user_id);
        let jar = &self.session.jar;
        jar.inject(auth::USER_ID_COOKIE, user_id, &self.endpoints.base_url);
        jar.inject(auth::USER_KEY_COOKIE, user_key, &self.endpoints.base_url);
    }
}

fn parse_url(url: &str) -> AuthResult<Url> {
    Url::parse(url).map_err(|e| {
        AuthError::Network(NetworkError::InvalidUrl {
            url: url.to_string(),
            error: e.to_string(),
        })
    })
}

fn generate_device_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(auth::DEVICE_ID_LENGTH)
        .map(char::from)
        .collect()
}

fn session_marker_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(auth::SESSION_MARKER_PATTERN).expect("session marker pattern is valid")
    })
}

fn selector(css: &str) -> AuthResult<Selector> {
    Selector::parse(css).map_err(|_| AuthError::LoginFailed {
        reason: format!("invalid selector {}", css),
    })
}

/// Read the session markers embedded in a page's inline scripts
pub fn parse_session_markers(html: &str) -> AuthResult<Verification> {
    let document = Html::parse_document(html);
    let scripts = selector(auth::SCRIPT_SELECTOR)?;

    let mut authenticated = false;
    let mut premium = false;
    for script in document.select(&scripts) {
        let text = script.text().collect::<String>();
        for captures in session_marker_regex().captures_iter(&text) {
            let value = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
            if value.is_empty() || value == auth::NOT_REGISTERED_MARKER {
                continue;
            }
            authenticated = true;
            if auth::PREMIUM_MARKERS.contains(&value) {
                premium = true;
            }
        }
    }

    if authenticated {
        return Ok(Verification::Authenticated { premium });
    }

    let errors = selector(auth::ERROR_MESSAGE_SELECTOR)?;
    let message = document
        .select(&errors)
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Ok(Verification::Anonymous {
        message: if message.is_empty() {
            "no session markers found on the profile page".to_string()
        } else {
            message
        },
    })
}

/// Extracts the login form token
fn extract_csrf_token(html: &str) -> AuthResult<String> {
    let document = Html::parse_document(html);
    let csrf_selector =
        Selector::parse(auth::CSRF_TOKEN_SELECTOR).map_err(|_| AuthError::CsrfTokenNotFound)?;

    document
        .select(&csrf_selector)
        .next()
        .and_then(|element| element.value().attr("value"))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .ok_or(AuthError::CsrfTokenNotFound)
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    #[serde(default)]
    error: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SessionData {
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    #[serde(default)]
    auth: Option<String>,
}

fn decode_envelope<T: serde::de::DeserializeOwned>(body: &str, step: &str) -> AuthResult<T> {
    let envelope: ApiEnvelope<T> =
        serde_json::from_str(body).map_err(|e| AuthError::LoginFailed {
            reason: format!("malformed {} response: {}", step, e),
        })?;

    if envelope.error {
        return Err(AuthError::LoginFailed {
            reason: envelope
                .message
                .unwrap_or_else(|| format!("{} was rejected", step)),
        });
    }

    envelope.data.ok_or_else(|| AuthError::LoginFailed {
        reason: format!("{} response has no data", step),
    })
}

fn parse_session_start(body: &str) -> AuthResult<String> {
    decode_envelope::<SessionData>(body, "session start")?
        .session_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AuthError::LoginFailed {
            reason: "session start response has no session id".to_string(),
        })
}

fn parse_login_response(body: &str) -> AuthResult<()> {
    let data = decode_envelope::<LoginData>(body, "login")?;
    if data.auth.is_none() {
        tracing::debug!("API login response carries no auth token");
    }
    Ok(())
}
