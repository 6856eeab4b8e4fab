//! Core application logic for Crunchy Fetch
//!
//! This module contains the site client and its authentication state machine,
//! the catalog scraper, the persistent download cache, the single-episode
//! downloader and the orchestrator that ties them together.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crunchy_fetch::app::{ClientConfig, SessionStore, SiteClient};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SessionStore::in_dir(Path::new("downloads"));
//! let client = SiteClient::new(ClientConfig::default(), store, None).await?;
//!
//! // Verifies the stored session, logging in only when it is anonymous
//! let auth = client.auth();
//! let mut manager = auth.lock().await;
//! let session = manager.ensure_authenticated().await?;
//! println!("premium: {}", session.is_premium());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod client;
pub mod episode;
pub mod models;
pub mod orchestrator;

// Re-export main public API
pub use cache::DownloadCache;
pub use catalog::{CatalogConfig, CatalogScraper, EpisodeSource, Locale};
pub use client::{
    AuthManager, ClientConfig, HttpTransport, Session, SessionStore, SharedAuth, SiteClient,
};
pub use episode::{
    DownloadOutcome, EpisodeDownloader, FfmpegMuxer, MuxJob, Muxer, PlayerDownloader,
    PlayerDownloaderConfig,
};
pub use models::{CatalogPage, EpisodeDescriptor, EpisodeRange, Task};
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunSummary};
