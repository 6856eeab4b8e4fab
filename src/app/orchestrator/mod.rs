//! Download orchestration
//!
//! The orchestrator drives one task from start to finish: it opens the
//! persistent cache, asks the [`EpisodeSource`] for the episode list and then
//! walks the list strictly in order, handing each episode to the
//! [`EpisodeDownloader`].
//!
//! # Per-episode policy
//!
//! - Episodes outside the task's range are skipped without touching the cache.
//! - Episodes already listed in the cache are skipped.
//! - A successful download is recorded and the cache is flushed before the
//!   next episode starts, so an interrupted run never repeats finished work.
//! - A failed attempt is retried after `sleep_time` until the episode's
//!   budget is spent, giving `retry + 1` attempts in total. Name-resolution
//!   failures spend the whole budget at once.
//! - Authentication failures and cache write failures end the run. A network
//!   error raised while authenticating is retried like any other.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crunchy_fetch::app::{
//!     CatalogConfig, CatalogScraper, FfmpegMuxer, Locale, Orchestrator, OrchestratorConfig,
//!     PlayerDownloader, PlayerDownloaderConfig, SiteClient, SessionStore, Task,
//! };
//! use crunchy_fetch::app::client::ClientConfig;
//! use crunchy_fetch::app::models::EpisodeRange;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SiteClient::new(ClientConfig::default(), SessionStore::in_dir(Path::new("downloads")), None).await?;
//! let locale = Locale::resolve("enUS")?;
//!
//! let scraper = CatalogScraper::new(client.transport(), client.auth(), CatalogConfig::new(locale));
//! let downloader = PlayerDownloader::new(
//!     client.transport(),
//!     client.auth(),
//!     PlayerDownloaderConfig::new("downloads"),
//!     FfmpegMuxer::default(),
//! );
//!
//! let mut orchestrator = Orchestrator::new(scraper, downloader, OrchestratorConfig::new("downloads"));
//! let task = Task::new("https://www.crunchyroll.com/sample-show", EpisodeRange::new(1, 12));
//! let summary = orchestrator.run(&task).await?;
//! println!("{}", summary.describe());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod stats;

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::app::cache::DownloadCache;
use crate::app::catalog::EpisodeSource;
use crate::app::episode::{DownloadOutcome, EpisodeDownloader};
use crate::app::models::Task;
use crate::errors::{AppError, Result};

pub use config::OrchestratorConfig;
pub use stats::RunSummary;

/// Sequential, retrying, cache-backed download loop
pub struct Orchestrator<S, D> {
    source: S,
    downloader: D,
    config: OrchestratorConfig,
}

impl<S: EpisodeSource, D: EpisodeDownloader> Orchestrator<S, D> {
    pub fn new(source: S, downloader: D, config: OrchestratorConfig) -> Self {
        Self {
            source,
            downloader,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Process every episode of a task
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cache` when the cache cannot be opened or flushed,
    /// `AppError::Scrape` when the episode list cannot be built and
    /// `AppError::Episode` when a download fails to authenticate. Other
    /// download failures are retried and counted in the summary.
    pub async fn run(&mut self, task: &Task) -> Result<RunSummary> {
        let started = Instant::now();

        let mut cache =
            DownloadCache::open(&self.config.cache_path, self.config.ignore_cache).await?;
        debug!(
            "Cache {} holds {} episodes",
            cache.path().display(),
            cache.len()
        );

        let page = self.source.fetch_episodes(task).await?;
        let mut episodes = page.episodes;
        let mut summary = RunSummary::new(page.title, episodes.len());

        if !summary.title.is_empty() {
            info!(
                "{}: {} episodes, range {}",
                summary.title, summary.total, task.range
            );
        }

        let mut index = 0;
        while index < episodes.len() {
            let episode = &mut episodes[index];

            if !task.range.contains(episode.index()) {
                debug!("Episode {} is out of range", episode.label());
                summary.out_of_range += 1;
                index += 1;
                continue;
            }

            if cache.is_downloaded(&episode.source_address) {
                debug!("{} already downloaded", episode.source_address);
                summary.cached += 1;
                index += 1;
                continue;
            }

            summary.attempts += 1;
            match self.downloader.download(&episode.source_address).await {
                Ok(DownloadOutcome::Downloaded) => {
                    cache.mark_downloaded(
                        &episode.source_address,
                        chrono::Utc::now().timestamp_millis(),
                    );
                    if let Err(e) = cache.flush().await {
                        error!("Could not save progress: {}", e);
                        return Err(e.into());
                    }
                    summary.downloaded += 1;
                    summary.flushes += 1;
                    index += 1;
                    self.pause().await;
                }
                Ok(DownloadOutcome::Ignored) => {
                    summary.ignored += 1;
                    index += 1;
                }
                Err(e) if e.is_fatal() => {
                    error!("Authentication failed while fetching an episode: {}", e);
                    return Err(AppError::Episode(e));
                }
                Err(e) => {
                    if e.is_name_resolution() {
                        error!("The URL {} is invalid", episode.source_address);
                        episode.retry_budget = 0;
                    } else {
                        debug!("Attempt on {} failed: {}", episode.source_address, e);
                    }

                    if episode.retry_budget == 0 {
                        error!(
                            "Cannot fetch episode {}, please rerun later ({})",
                            episode.label(),
                            e
                        );
                        summary.failed += 1;
                        index += 1;
                    } else {
                        warn!(
                            "{} ({})",
                            retry_notice(episode.retry_budget, self.config.retry, &episode.label()),
                            e
                        );
                        episode.retry_budget -= 1;
                        summary.retries += 1;
                    }
                    self.pause().await;
                }
            }
        }

        summary.duration = started.elapsed();
        Ok(summary)
    }

    async fn pause(&self) {
        if !self.config.sleep_time.is_zero() {
            tokio::time::sleep(self.config.sleep_time).await;
        }
    }
}

/// Warning logged before a retry; `remaining` is the budget before this retry
fn retry_notice(remaining: u32, retry: u32, label: &str) -> String {
    format!("Retry {} / {} for episode {}", remaining, retry, label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_notice_counts_down() {
        assert_eq!(retry_notice(5, 5, "s1e3"), "Retry 5 / 5 for episode s1e3");
        assert_eq!(retry_notice(1, 5, "s2e10"), "Retry 1 / 5 for episode s2e10");
    }
}
