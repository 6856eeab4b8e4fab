//! Application constants for Crunchy Fetch
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names for authentication
pub mod env {
    /// Environment variable name for the account username
    pub const USERNAME: &str = "CR_USERNAME";

    /// Environment variable name for the account password
    pub const PASSWORD: &str = "CR_PASSWORD";
}

/// Catalog site endpoints
pub mod site {
    /// Site base URL
    pub const BASE_URL: &str = "https://www.crunchyroll.com";

    /// Authenticated-only page used to verify the session
    pub const PROFILE_PATH: &str = "/acct/?action=status";

    /// Login form page and submission target
    pub const LOGIN_PATH: &str = "/login";

    /// Mobile API session start endpoint
    pub const API_SESSION_URL: &str = "https://api.crunchyroll.com/start_session.0.json";

    /// Mobile API login endpoint
    pub const API_LOGIN_URL: &str = "https://api.crunchyroll.com/login.0.json";
}

/// Authentication and credential-related constants
pub mod auth {
    /// Minimum allowed username length
    pub const MIN_USERNAME_LENGTH: usize = 3;

    /// Maximum allowed username length
    pub const MAX_USERNAME_LENGTH: usize = 100;

    /// File permissions for .env file (Unix only) - owner read/write only
    #[cfg(unix)]
    pub const ENV_FILE_PERMISSIONS: u32 = 0o600;

    /// CSS selector for the login form token
    pub const CSRF_TOKEN_SELECTOR: &str = "input[name='login_form[_token]']";

    /// Form field names used by the login form
    pub const FORM_USERNAME_FIELD: &str = "login_form[name]";
    pub const FORM_PASSWORD_FIELD: &str = "login_form[password]";
    pub const FORM_REDIRECT_FIELD: &str = "login_form[redirect_url]";
    pub const FORM_TOKEN_FIELD: &str = "login_form[_token]";

    /// Selector for inline scripts carrying session markers
    pub const SCRIPT_SELECTOR: &str = "script";

    /// Pattern matching analytics dimensions that carry session markers
    pub const SESSION_MARKER_PATTERN: &str = r"ga\('set', 'dimension[5-8]', '([^']*)'\);";

    /// Marker value for an anonymous session
    pub const NOT_REGISTERED_MARKER: &str = "not-registered";

    /// Marker values for a premium session
    pub const PREMIUM_MARKERS: &[&str] = &["premium", "premiumplus"];

    /// Selector for the page's error-message region
    pub const ERROR_MESSAGE_SELECTOR: &str = "ul.message, li.error";

    /// Cookie names used for cookie replay
    pub const USER_ID_COOKIE: &str = "c_userid";
    pub const USER_KEY_COOKIE: &str = "c_userkey";
    pub const SESSION_ID_COOKIE: &str = "sess_id";
    pub const LOCALE_COOKIE: &str = "c_locale";

    /// Length of generated API device ids
    pub const DEVICE_ID_LENGTH: usize = 32;

    /// API device type reported when starting a session
    pub const API_DEVICE_TYPE: &str = "com.crunchyroll.iphone";

    /// Default API access key, version and locale
    pub const API_SESSION_KEY: &str = "QWjz212GspMHH9h";
    pub const API_VERSION: &str = "2313.8";
    pub const API_LOCALE: &str = "enUS";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str =
        "Mozilla/5.0 (Windows NT 6.2; WOW64; x64; rv:58.0) Gecko/20100101 Firefox/58.0";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 4;
}

/// Rate limiting and transport-level retry configuration
pub mod limits {
    /// Default request rate against the catalog site (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 2;

    /// Maximum backoff attempts for 429/503 responses
    pub const MAX_STATUS_RETRIES: u32 = 3;

    /// Base delay for exponential backoff on 429/503 (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 1000;
}

/// Catalog page CSS selectors
pub mod selectors {
    /// Series title marker
    pub const TITLE_SELECTOR: &str = "meta[itemprop=name]";

    /// Episode list items
    pub const EPISODE_SELECTOR: &str = ".episode";

    /// Episode title text inside an item
    pub const EPISODE_TITLE_SELECTOR: &str = ".series-title";

    /// Placeholder image for unreleased episodes
    pub const COMING_SOON_SELECTOR: &str = "img[src*=coming_soon]";

    /// Georestriction notices
    pub const AVAILABILITY_LOW_SELECTOR: &str = ".availability-notes-low";
    pub const AVAILABILITY_HIGH_SELECTOR: &str = ".availability-notes-high";
}

/// File operation constants
pub mod files {
    /// Persistent cache file name inside the output directory
    pub const CACHE_FILE_NAME: &str = ".crpersistent";

    /// Session store file name inside the output directory
    pub const SESSION_FILE_NAME: &str = ".crsession.json";

    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Backup file suffix
    pub const BACKUP_FILE_SUFFIX: &str = ".backup";
}

/// Download run defaults
pub mod download {
    /// Address prefix marking a direct single-episode link
    pub const DIRECT_LINK_PREFIX: char = '@';

    /// Default retry budget per episode
    pub const DEFAULT_RETRY: u32 = 5;

    /// Default delay between attempts and between episodes (milliseconds)
    pub const DEFAULT_SLEEP_TIME_MS: u64 = 5000;

    /// Default locale used for patterns and stream selection
    pub const DEFAULT_LOCALE: &str = "enUS";

    /// Default output name template
    pub const DEFAULT_NAME_TEMPLATE: &str =
        "{SERIES} - {EPISODE} - {TITLE} - [{TAG}]";

    /// Default release tag used in output names
    pub const DEFAULT_TAG: &str = "CrunchyRoll";

    /// Stream format requested from the player metadata
    pub const STREAM_FORMAT: &str = "adaptive_hls";

    /// Subtitle codec written into the container
    pub const SUBTITLE_FORMAT: &str = "ass";

    /// Output container extension
    pub const CONTAINER_EXTENSION: &str = "mkv";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use download::{DEFAULT_RETRY, DEFAULT_SLEEP_TIME_MS, DIRECT_LINK_PREFIX};
pub use env::{PASSWORD as ENV_PASSWORD, USERNAME as ENV_USERNAME};
pub use files::{CACHE_FILE_NAME, SESSION_FILE_NAME};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use site::BASE_URL as SITE_BASE_URL;
