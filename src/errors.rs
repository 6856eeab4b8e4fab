//! Error types for Crunchy Fetch
//!
//! Errors are grouped by the component that raises them. Fatal categories
//! (authentication, scraping, cache I/O) unwind to the run boundary, while
//! episode-level failures are caught by the orchestrator and retried.

use std::path::PathBuf;
use thiserror::Error;

/// Process exit status used when a login is required but no credentials exist
pub const EXIT_MISSING_CREDENTIALS: i32 = 3;

/// Transport-level failures reported by the HTTP capability
#[derive(Error, Debug)]
pub enum NetworkError {
    /// The host name could not be resolved; retrying will not help
    #[error("Name resolution failed for {url}")]
    NameResolution { url: String },

    /// Any other transport failure (connect, TLS, timeout, body read)
    #[error("HTTP request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("Server error: HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Rate limit exceeded after backing off
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded after backing off
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// A URL could not be parsed or resolved
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },
}

impl NetworkError {
    /// Whether this failure carries the name-resolution signature
    pub fn is_name_resolution(&self) -> bool {
        matches!(self, NetworkError::NameResolution { .. })
    }
}

/// Authentication-related errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// No credentials configured while a login is required
    #[error(
        "Missing credentials. Set CR_USERNAME and CR_PASSWORD, configure [auth] in the config file or run 'auth setup'"
    )]
    MissingCredentials,

    /// Transport failure during authentication
    #[error("HTTP request failed during authentication: {0}")]
    Network(#[from] NetworkError),

    /// Login request was rejected or returned an unusable response
    #[error("Login failed: {reason}")]
    LoginFailed { reason: String },

    /// CSRF token not found in login page
    #[error("Login token not found in login page. The login page format may have changed")]
    CsrfTokenNotFound,

    /// The post-login verification pass found no session markers
    #[error("Authentication failed: {message}")]
    VerificationFailed { message: String },

    /// Invalid username format
    #[error("Invalid username format: {reason}")]
    InvalidUsername { reason: String },

    /// File I/O error during credential or session storage
    #[error("Failed to access credential storage: {0}")]
    CredentialStorage(#[from] std::io::Error),

    /// Session file could not be decoded or encoded
    #[error("Session store is corrupted: {0}")]
    SessionStore(#[from] serde_json::Error),
}

/// Catalog scraping errors
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Catalog page is missing its title marker
    #[error("Invalid page ({address}): no series title found")]
    MissingTitle { address: String },

    /// Authentication failed before the catalog could be read
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Transport failure while fetching the catalog
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// CSS selector error
    #[error("Invalid CSS selector: {selector}")]
    InvalidSelector { selector: String },

    /// The embedded player configuration could not be located or decoded
    #[error("Player metadata not found or malformed: {reason}")]
    PlayerMetadata { reason: String },
}

/// Persistent cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Cache file could not be read, copied or written
    #[error("Cache file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Cache map could not be serialized
    #[error("Cache serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Atomic rename of the temporary cache file failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },
}

/// Per-episode download failures, retried by the orchestrator
#[derive(Error, Debug)]
pub enum EpisodeError {
    /// Transport failure while fetching the episode
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Authentication failed while fetching the episode
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Player page did not contain usable metadata
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// Local file operation failed
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The muxing step failed
    #[error("Muxing failed for {path}: {reason}")]
    Mux { path: PathBuf, reason: String },

    /// Generic error for other issues
    #[error("{0}")]
    Other(String),
}

impl EpisodeError {
    /// Whether the failure is a name-resolution error, which retrying cannot fix
    pub fn is_name_resolution(&self) -> bool {
        match self {
            EpisodeError::Network(e) => e.is_name_resolution(),
            EpisodeError::Auth(AuthError::Network(e)) => e.is_name_resolution(),
            EpisodeError::Scrape(ScrapeError::Network(e)) => e.is_name_resolution(),
            _ => false,
        }
    }

    /// Whether the failure must end the run instead of being retried
    ///
    /// Only authentication failures qualify; a transport error raised while
    /// authenticating is handled like any other network error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EpisodeError::Auth(e) if !matches!(e, AuthError::Network(_)))
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Missing required configuration field
    #[error("Missing required configuration field: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Authentication error
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Scraping error
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Episode error that escaped the orchestrator
    #[error(transparent)]
    Episode(#[from] EpisodeError),

    /// Network error outside of an episode
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error only ends the current task rather than the whole run
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Scrape(ScrapeError::Auth(e)) => matches!(e, AuthError::Network(_)),
            AppError::Episode(e) if e.is_fatal() => false,
            AppError::Scrape(_) | AppError::Network(_) | AppError::Episode(_) => true,

            AppError::Auth(_)
            | AppError::Cache(_)
            | AppError::Config(_)
            | AppError::Io(_)
            | AppError::Generic { .. } => false,
        }
    }

    /// Whether the error means no credentials were available for a required login
    pub fn is_missing_credentials(&self) -> bool {
        matches!(
            self,
            AppError::Auth(AuthError::MissingCredentials)
                | AppError::Scrape(ScrapeError::Auth(AuthError::MissingCredentials))
                | AppError::Episode(EpisodeError::Auth(AuthError::MissingCredentials))
        )
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_missing_credentials() {
            EXIT_MISSING_CREDENTIALS
        } else {
            1
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Auth(_) => "authentication",
            AppError::Scrape(ScrapeError::Auth(_)) => "authentication",
            AppError::Episode(EpisodeError::Auth(_)) => "authentication",
            AppError::Scrape(_) => "scraping",
            AppError::Cache(_) => "cache",
            AppError::Episode(_) => "episode",
            AppError::Network(_) => "network",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Authentication result type alias
pub type AuthResult<T> = std::result::Result<T, AuthError>;

/// Network result type alias
pub type NetResult<T> = std::result::Result<T, NetworkError>;

/// Scraping result type alias
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Episode result type alias
pub type EpisodeResult<T> = std::result::Result<T, EpisodeError>;
