//! Prelude module for Crunchy Fetch Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use crunchy_fetch::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use crunchy_fetch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::load(None).await?;
//!     let output = config.download.output_dir();
//!
//!     let client = SiteClient::new(
//!         config.client.to_runtime_config(),
//!         SessionStore::in_dir(&output),
//!         config.auth.credentials(),
//!     )
//!     .await?;
//!     let locale = Locale::resolve(&config.download.locale)?;
//!
//!     let scraper = CatalogScraper::new(
//!         client.transport(),
//!         client.auth(),
//!         config.download.catalog_config(locale.clone()),
//!     );
//!     let downloader = PlayerDownloader::new(
//!         client.transport(),
//!         client.auth(),
//!         config.download.player_config(&locale),
//!         FfmpegMuxer::default(),
//!     );
//!     let mut orchestrator =
//!         Orchestrator::new(scraper, downloader, config.download.orchestrator_config());
//!
//!     let task = Task::new("https://www.crunchyroll.com/sample-show", EpisodeRange::all());
//!     let summary = orchestrator.run(&task).await?;
//!     println!("{}", summary.describe());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Site session
    AuthManager,
    ClientConfig,
    SessionStore,
    SiteClient,

    // Scraping and downloading
    CatalogConfig,
    CatalogScraper,
    DownloadCache,
    DownloadOutcome,
    EpisodeDownloader,
    EpisodeSource,
    FfmpegMuxer,
    Locale,
    PlayerDownloader,
    PlayerDownloaderConfig,

    // Core orchestration
    Orchestrator,
    OrchestratorConfig,
    RunSummary,

    // Data types
    EpisodeDescriptor,
    EpisodeRange,
    Task,
};

// Configuration
pub use crate::config::AppConfig;

// Authentication functions
pub use crate::auth::{
    check_credentials, get_auth_status, setup_credentials, verify_credentials, AuthStatus,
    Credentials,
};

// Commonly used constants
pub use crate::constants::{DEFAULT_RETRY, ENV_PASSWORD, ENV_USERNAME, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _client_config = ClientConfig::default();
        let config = AppConfig::default();
        let _orchestrator_config = config.download.orchestrator_config();

        let _has_creds = check_credentials();
        let auth_status = get_auth_status(&config);
        assert!(auth_status.credentials_valid.is_none());

        assert_eq!(DEFAULT_RETRY, 5);
        assert!(USER_AGENT.contains("Mozilla"));
    }

    #[tokio::test]
    async fn test_prelude_integration_pattern() {
        use tempfile::TempDir;

        let temp_dir = TempDir::new().unwrap();
        let cache = DownloadCache::open(DownloadCache::path_in(temp_dir.path()), false)
            .await
            .unwrap();
        assert!(cache.is_empty());

        let store = SessionStore::in_dir(temp_dir.path());
        let client = SiteClient::new(ClientConfig::default(), store, None)
            .await
            .unwrap();
        assert!(!client.auth().lock().await.session().is_authenticated());
    }

    #[test]
    fn test_std_reexports() {
        let _path = PathBuf::from("/tmp/test");
        let data = Arc::new(42);
        assert_eq!(*data, 42);
    }
}
