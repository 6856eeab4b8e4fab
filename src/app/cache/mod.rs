//! Persistent record of completed downloads
//!
//! The cache lives next to the downloaded files as `.crpersistent`, with a
//! `.crpersistent.backup` copy taken every time it is opened. Writes go to a
//! temporary file that is renamed over the original.
//!
//! # Examples
//!
//! ```rust,no_run
//! use crunchy_fetch::app::cache::DownloadCache;
//! use std::path::Path;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let path = DownloadCache::path_in(Path::new("downloads"));
//! let mut cache = DownloadCache::open(path, false).await?;
//!
//! let episode = Url::parse("https://www.crunchyroll.com/show/episode-1")?;
//! if !cache.is_downloaded(&episode) {
//!     cache.mark_downloaded(&episode, chrono::Utc::now().timestamp_millis());
//!     cache.flush().await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub mod manager;

pub use manager::DownloadCache;

/// `path` with `suffix` appended to its file name
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}
