//! Single-episode downloads
//!
//! The orchestrator only sees the [`EpisodeDownloader`] trait. The shipped
//! implementation, [`PlayerDownloader`], reads the player configuration
//! embedded in an episode page, fetches the subtitle track and hands the
//! stream to a [`Muxer`].

use async_trait::async_trait;
use url::Url;

use crate::errors::EpisodeResult;

pub mod downloader;
pub mod mux;
pub mod player;

pub use downloader::{PlayerDownloader, PlayerDownloaderConfig};
pub use mux::{FfmpegMuxer, MuxJob, Muxer};
pub use player::{extract_player_metadata, EpisodePage, PlayerMedia};

/// What a successful download call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The episode was fetched and written
    Downloaded,
    /// Nothing was done (output already present, or no stream available)
    Ignored,
}

impl DownloadOutcome {
    pub fn is_ignored(&self) -> bool {
        matches!(self, DownloadOutcome::Ignored)
    }
}

/// Downloads one episode given its absolute address
///
/// Errors are reported to the caller, which owns the retry policy.
#[async_trait]
pub trait EpisodeDownloader: Send + Sync {
    async fn download(&self, address: &Url) -> EpisodeResult<DownloadOutcome>;
}
