//! Persistent cookie jar and its on-disk store
//!
//! The jar wraps reqwest's in-memory [`Jar`] and records every raw
//! `Set-Cookie` value it sees, keyed by host and cookie name, so the session
//! can be written to disk and replayed on the next run.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, warn};
use url::Url;

use crate::app::cache::with_suffix;
use crate::constants::files;
use crate::errors::AuthResult;

/// One recorded `Set-Cookie` value and the URL it was received from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCookie {
    pub url: String,
    pub raw: String,
}

/// Serialized form of the session file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    /// Device id used by API logins, reused across runs
    #[serde(default)]
    pub device_id: Option<String>,
    /// Recorded cookies in replay order
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
}

/// Cookie jar shared by every request of the process
pub struct SessionJar {
    jar: RwLock<Jar>,
    records: RwLock<BTreeMap<String, StoredCookie>>,
}

impl fmt::Debug for SessionJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionJar")
            .field("cookies", &self.len())
            .finish()
    }
}

impl Default for SessionJar {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionJar {
    /// Create an empty jar
    pub fn new() -> Self {
        Self {
            jar: RwLock::new(Jar::default()),
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a jar pre-filled with cookies from a previous run
    pub fn from_stored(cookies: &[StoredCookie]) -> Self {
        let jar = Self::new();
        for cookie in cookies {
            match Url::parse(&cookie.url) {
                Ok(url) => jar.record(&cookie.raw, &url),
                Err(e) => warn!("Dropping stored cookie for invalid URL {}: {}", cookie.url, e),
            }
        }
        jar
    }

    /// Set a cookie directly, as if the server at `url` had sent it
    pub fn inject(&self, name: &str, value: &str, url: &Url) {
        let raw = format!("{}={}; Path=/", name, value);
        self.record(&raw, url);
    }

    /// Snapshot of all recorded cookies for persistence
    pub fn snapshot(&self) -> Vec<StoredCookie> {
        self.records
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    /// Forget every cookie
    pub fn clear(&self) {
        *self.jar.write().unwrap_or_else(|e| e.into_inner()) = Jar::default();
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of distinct recorded cookies
    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the jar holds no cookies
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cookie header value that would be sent to `url`
    pub fn header_for(&self, url: &Url) -> Option<String> {
        self.cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    fn record(&self, raw: &str, url: &Url) {
        let Some(name) = cookie_name(raw) else {
            debug!("Ignoring malformed cookie from {}", url);
            return;
        };

        self.jar
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .add_cookie_str(raw, url);

        let key = format!("{}|{}", url.host_str().unwrap_or_default(), name);
        self.records
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                key,
                StoredCookie {
                    url: url.to_string(),
                    raw: raw.to_string(),
                },
            );
    }
}

impl CookieStore for SessionJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let raws: Vec<String> = cookie_headers
            .filter_map(|value| value.to_str().ok().map(str::to_string))
            .collect();
        for raw in raws {
            self.record(&raw, url);
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.jar
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .cookies(url)
    }
}

/// Extract the cookie name from a raw `Set-Cookie` value
fn cookie_name(raw: &str) -> Option<&str> {
    let pair = raw.split(';').next()?;
    let (name, _) = pair.split_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// On-disk home of the session, created lazily on first save
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store backed by an explicit file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store backed by the default session file inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(files::SESSION_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored session; a missing or unreadable file yields an empty one
    pub async fn load(&self) -> AuthResult<StoredSession> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No session file at {}", self.path.display());
                return Ok(StoredSession::default());
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&content) {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!(
                    "Session file {} is corrupted ({}), starting a fresh session",
                    self.path.display(),
                    e
                );
                Ok(StoredSession::default())
            }
        }
    }

    /// Write the session atomically
    pub async fn save(&self, session: &StoredSession) -> AuthResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(session)?;
        let temp_path = with_suffix(&self.path, files::TEMP_FILE_SUFFIX);
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;
        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    /// Delete the session file, returning whether one existed
    pub async fn clear(&self) -> AuthResult<bool> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
