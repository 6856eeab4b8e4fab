//! Configuration management for Crunchy Fetch
//!
//! This module provides unified configuration management with automatic
//! first-run initialization, multi-source loading, and zero-config defaults.

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::catalog::{CatalogConfig, Locale};
use crate::app::client::ClientConfig;
use crate::app::episode::PlayerDownloaderConfig;
use crate::app::orchestrator::OrchestratorConfig;
use crate::auth::Credentials;
use crate::constants::{auth, download, env as env_constants, http, limits, logging, site};
use crate::errors::{AppError, ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Account and login strategy settings
    pub auth: AuthConfigToml,
    /// Download run settings
    pub download: DownloadConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfigToml {
    /// Account name for the form and API logins
    pub user: Option<String>,
    /// Account password for the form and API logins
    pub pass: Option<String>,
    /// `c_userid` cookie value for cookie replay
    pub user_id: Option<String>,
    /// `c_userkey` cookie value for cookie replay
    pub user_key: Option<String>,
    /// Log in through the mobile API
    pub log_using_api: bool,
    /// Inject stored cookies instead of logging in
    pub log_using_cookie: bool,
    /// Fixed API device id (generated and stored when empty)
    pub device_id: Option<String>,
    pub session_url: String,
    pub login_url: String,
    pub session_key: String,
    pub api_version: String,
    pub api_locale: String,
}

impl Default for AuthConfigToml {
    fn default() -> Self {
        Self {
            user: None,
            pass: None,
            user_id: None,
            user_key: None,
            log_using_api: false,
            log_using_cookie: false,
            device_id: None,
            session_url: site::API_SESSION_URL.to_string(),
            login_url: site::API_LOGIN_URL.to_string(),
            session_key: auth::API_SESSION_KEY.to_string(),
            api_version: auth::API_VERSION.to_string(),
            api_locale: auth::API_LOCALE.to_string(),
        }
    }
}

/// TOML-friendly download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfigToml {
    /// Output directory (current directory when unset)
    pub output: Option<PathBuf>,
    /// Locale for episode patterns and stream selection
    pub locale: String,
    /// Subtitle language (defaults to the locale)
    pub subtitle_language: Option<String>,
    /// Skip seasons marked as dubbed
    pub ignore_dub: bool,
    /// Retries per episode after the first attempt
    pub retry: u32,
    /// Delay between attempts and between episodes in milliseconds
    pub sleep_time_ms: u64,
    /// Start every run from an empty cache
    pub ignore_cache: bool,
    /// Output file name template
    pub name_template: String,
    /// Release tag used in output names
    pub tag: String,
    /// ffmpeg executable
    pub ffmpeg_path: PathBuf,
}

impl Default for DownloadConfigToml {
    fn default() -> Self {
        Self {
            output: None,
            locale: download::DEFAULT_LOCALE.to_string(),
            subtitle_language: None,
            ignore_dub: false,
            retry: download::DEFAULT_RETRY,
            sleep_time_ms: download::DEFAULT_SLEEP_TIME_MS,
            ignore_cache: false,
            name_template: download::DEFAULT_NAME_TEMPLATE.to_string(),
            tag: download::DEFAULT_TAG.to_string(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// Site base URL
    pub base_url: String,
    /// User agent sent with every request
    pub user_agent: String,
    /// TCP keep-alive timeout in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Request timeout in seconds
    pub request_timeout_secs: u64,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            base_url: site::BASE_URL.to_string(),
            user_agent: http::USER_AGENT.to_string(),
            tcp_keepalive_secs: Some(30),
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            request_timeout_secs: http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no CLI verbosity flag is given
    pub level: String,
    /// Enable colored output
    pub colored_output: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
            colored_output: true,
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    ///
    /// CLI arguments are applied on top by the command handlers.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = if let Some(ref path) = config_file_override {
            Some(path.clone())
        } else {
            Self::find_config_file()
        };

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading config from: {}", path.display());
                config = Self::load_from_file(&path).await?;
            } else if config_file_override.is_some() {
                return Err(ConfigError::NotFound { path }.into());
            }
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Fill account credentials from `CR_USERNAME` / `CR_PASSWORD`
    ///
    /// Environment values take precedence over the file.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(user) = env::var(env_constants::USERNAME) {
            if !user.trim().is_empty() {
                self.auth.user = Some(user);
            }
        }
        if let Ok(pass) = env::var(env_constants::PASSWORD) {
            if !pass.is_empty() {
                self.auth.pass = Some(pass);
            }
        }
    }

    /// Reject values no run could work with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "The rate limit must allow at least one request per second".to_string(),
            });
        }

        if self.client.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "client.base_url".to_string(),
            });
        }

        if !Locale::is_supported(&self.download.locale) {
            warn!(
                "Locale {} is not supported, {} will be used",
                self.download.locale,
                download::DEFAULT_LOCALE
            );
        }

        Ok(())
    }

    /// Initialize configuration on first run
    ///
    /// Creates a default config file if none exists and notifies the user
    pub async fn initialize_first_run() -> Result<Option<PathBuf>> {
        let config_path = Self::get_default_config_path()?;

        if config_path.exists() {
            return Ok(Some(config_path));
        }

        info!("Creating default configuration file...");

        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let config_content = Self::generate_default_config_content();

        tokio::fs::write(&config_path, config_content)
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    config_path.display(),
                    e
                ))
            })?;

        println!("📁 Created default configuration file:");
        println!("   {}", config_path.display());
        println!("   You can customize settings by editing this file.");
        println!();

        Ok(Some(config_path))
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![
            // Project-local config
            PathBuf::from("./crunchy-fetch.toml"),
            PathBuf::from("./config.toml"),
        ];
        if let Ok(user_config) = Self::get_default_config_path() {
            search_paths.push(user_config);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// Get the default config file path for the current user
    fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| AppError::generic("Could not determine user config directory"))?;

        Ok(config_dir.join("crunchy-fetch").join("config.toml"))
    }

    /// Load configuration from a TOML file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::InvalidFormat)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Generate default configuration content with helpful comments
    fn generate_default_config_content() -> String {
        format!(
            r#"# Crunchy Fetch Configuration
# This file was automatically generated on first run.
# You can customize any of these settings to suit your needs.

[auth]
# Account credentials (CR_USERNAME / CR_PASSWORD override these)
# user = "someone@example.com"
# pass = "secret"

# Log in through the mobile API instead of the website form
log_using_api = false

# Inject session cookies instead of logging in
log_using_cookie = false
# user_id = ""
# user_key = ""

[download]
# Output directory (current directory when unset)
# output = "/path/to/videos"
locale = "{locale}"
# subtitle_language = "{locale}"
ignore_dub = false
retry = {retry}
sleep_time_ms = {sleep}
ignore_cache = false
name_template = "{template}"
tag = "{tag}"
ffmpeg_path = "ffmpeg"

[client]
# HTTP client settings
base_url = "{base_url}"
tcp_keepalive_secs = 30
pool_idle_timeout_secs = {idle}
pool_max_per_host = {pool}
request_timeout_secs = {timeout}
connect_timeout_secs = {connect}
rate_limit_rps = {rps}

[logging]
# Logging configuration
level = "{level}"  # error, warn, info, debug, trace
colored_output = true
"#,
            locale = download::DEFAULT_LOCALE,
            retry = download::DEFAULT_RETRY,
            sleep = download::DEFAULT_SLEEP_TIME_MS,
            template = download::DEFAULT_NAME_TEMPLATE,
            tag = download::DEFAULT_TAG,
            base_url = site::BASE_URL,
            idle = http::POOL_IDLE_TIMEOUT.as_secs(),
            pool = http::POOL_MAX_PER_HOST,
            timeout = http::DEFAULT_TIMEOUT.as_secs(),
            connect = http::CONNECT_TIMEOUT.as_secs(),
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}

impl AuthConfigToml {
    /// Active credential form, if the settings describe one
    pub fn credentials(&self) -> Option<Credentials> {
        Credentials::select(self)
    }
}

impl DownloadConfigToml {
    /// Directory receiving videos, the cache and the session file
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Convert to runtime CatalogConfig
    pub fn catalog_config(&self, locale: Locale) -> CatalogConfig {
        CatalogConfig {
            retry: self.retry,
            ignore_dub: self.ignore_dub,
            locale,
        }
    }

    /// Convert to runtime OrchestratorConfig
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::new(self.output_dir())
            .with_retry(self.retry)
            .with_sleep_time(Duration::from_millis(self.sleep_time_ms))
            .with_ignore_cache(self.ignore_cache)
    }

    /// Convert to runtime PlayerDownloaderConfig
    pub fn player_config(&self, locale: &Locale) -> PlayerDownloaderConfig {
        PlayerDownloaderConfig {
            output_dir: self.output_dir(),
            name_template: self.name_template.clone(),
            tag: self.tag.clone(),
            locale: locale.code().to_string(),
            subtitle_language: self
                .subtitle_language
                .clone()
                .unwrap_or_else(|| locale.code().to_string()),
        }
    }
}

impl ClientConfigToml {
    /// Convert to runtime ClientConfig
    pub fn to_runtime_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            user_agent: self.user_agent.clone(),
            tcp_keepalive: self.tcp_keepalive_secs.map(Duration::from_secs),
            pool_idle_timeout: self.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.pool_max_per_host,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            rate_limit_rps: self.rate_limit_rps,
        }
    }
}
