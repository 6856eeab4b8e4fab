//! Configuration for the download orchestrator

use std::path::PathBuf;
use std::time::Duration;

use crate::app::cache::DownloadCache;
use crate::constants::download;

/// Per-run sequencing options
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay after each download and after each failed attempt
    pub sleep_time: Duration,
    /// Retries per episode after the first attempt
    pub retry: u32,
    /// Start from an empty cache instead of the stored one
    pub ignore_cache: bool,
    /// Location of the persistent cache file
    pub cache_path: PathBuf,
}

impl OrchestratorConfig {
    /// Defaults with the cache stored in `output_dir`
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            sleep_time: Duration::from_millis(download::DEFAULT_SLEEP_TIME_MS),
            retry: download::DEFAULT_RETRY,
            ignore_cache: false,
            cache_path: DownloadCache::path_in(&output_dir.into()),
        }
    }

    pub fn with_sleep_time(mut self, sleep_time: Duration) -> Self {
        self.sleep_time = sleep_time;
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ignore_cache(mut self, ignore_cache: bool) -> Self {
        self.ignore_cache = ignore_cache;
        self
    }
}
