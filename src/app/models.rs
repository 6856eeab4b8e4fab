//! Data models for Crunchy Fetch
//!
//! This module defines the core data structures shared by the scraper and the
//! orchestrator: download tasks, episode ranges and episode descriptors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;

/// Inclusive range of episode numbers to download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRange {
    pub min: u32,
    pub max: u32,
}

impl Default for EpisodeRange {
    fn default() -> Self {
        Self::all()
    }
}

impl EpisodeRange {
    pub fn all() -> Self {
        Self {
            min: 0,
            max: u32::MAX,
        }
    }

    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Whether an episode passes the filter
    ///
    /// Episodes without a numeric index are never filtered out.
    pub fn contains(&self, index: Option<u32>) -> bool {
        match index {
            Some(n) => n >= self.min && n <= self.max,
            None => true,
        }
    }
}

impl FromStr for EpisodeRange {
    type Err = ConfigError;

    /// Accepts `N`, `A-B`, `A-` and `-B`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidValue {
            field: "episodes".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };
        let bound = |part: &str, default: u32| -> Result<u32, ConfigError> {
            let part = part.trim();
            if part.is_empty() {
                Ok(default)
            } else {
                part.parse()
                    .map_err(|_| invalid("Bounds must be whole episode numbers"))
            }
        };

        let range = match s.split_once('-') {
            Some((min, max)) => Self::new(bound(min, 0)?, bound(max, u32::MAX)?),
            None => {
                let n = bound(s, 0)?;
                Self::new(n, n)
            }
        };

        if range.min > range.max {
            return Err(invalid("The first episode must not exceed the last"));
        }
        Ok(range)
    }
}

impl fmt::Display for EpisodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min, self.max) {
            (0, u32::MAX) => write!(f, "all"),
            (min, u32::MAX) => write!(f, "{}-", min),
            (min, max) if min == max => write!(f, "{}", min),
            (min, max) => write!(f, "{}-{}", min, max),
        }
    }
}

/// One catalog address to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Catalog page URL, or a direct episode link prefixed with `@`
    pub catalog_address: String,
    pub range: EpisodeRange,
}

impl Task {
    pub fn new(catalog_address: impl Into<String>, range: EpisodeRange) -> Self {
        Self {
            catalog_address: catalog_address.into(),
            range,
        }
    }
}

/// One downloadable episode discovered on a catalog page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeDescriptor {
    /// Absolute episode address; also the cache key
    pub source_address: Url,
    /// Raw episode token, e.g. "12", "12.5" or "SP1"
    pub episode_number: String,
    /// Season number parsed from the season heading, defaulting to 1
    pub volume: u32,
    /// Raw season heading
    pub season_name: String,
    /// Remaining attempts after the first one
    pub retry_budget: u32,
}

impl EpisodeDescriptor {
    /// Numeric index used for range filtering
    ///
    /// Parses the leading digits of the episode token, so "12.5" maps to 12
    /// and tokens such as "SP1" or "OVA" have no index.
    pub fn index(&self) -> Option<u32> {
        let digits: String = self
            .episode_number
            .trim()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }

    /// Short label used in log lines
    pub fn label(&self) -> String {
        format!("s{}e{}", self.volume, self.episode_number)
    }
}

/// Result of scraping one catalog address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPage {
    pub title: String,
    /// Episodes in ascending broadcast order
    pub episodes: Vec<EpisodeDescriptor>,
}
