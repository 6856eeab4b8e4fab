//! Run statistics
//!
//! Counters collected while one task is processed, reported by the CLI once
//! the task finishes.

use std::time::Duration;

/// Outcome counters for one task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Series title, empty for direct links
    pub title: String,
    /// Episodes returned by the catalog
    pub total: usize,
    /// Episodes fetched and recorded in the cache
    pub downloaded: usize,
    /// Episodes the downloader chose not to fetch
    pub ignored: usize,
    /// Episodes skipped because the cache already lists them
    pub cached: usize,
    /// Episodes outside the requested range
    pub out_of_range: usize,
    /// Episodes that used up their retry budget
    pub failed: usize,
    /// Download calls made
    pub attempts: usize,
    /// Failed attempts that were retried
    pub retries: usize,
    /// Cache writes performed
    pub flushes: usize,
    pub duration: Duration,
}

impl RunSummary {
    pub fn new(title: impl Into<String>, total: usize) -> Self {
        Self {
            title: title.into(),
            total,
            ..Default::default()
        }
    }

    /// Episodes that reached a final state in this run
    pub fn processed(&self) -> usize {
        self.downloaded + self.ignored + self.cached + self.out_of_range + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// One-line human readable report
    pub fn describe(&self) -> String {
        let name = if self.title.is_empty() {
            "direct link"
        } else {
            self.title.as_str()
        };
        format!(
            "{}: {} downloaded, {} already cached, {} ignored, {} out of range, {} failed ({} attempts, {:.1}s)",
            name,
            self.downloaded,
            self.cached,
            self.ignored,
            self.out_of_range,
            self.failed,
            self.attempts,
            self.duration.as_secs_f64()
        )
    }
}
