//! Command-line argument parsing for Crunchy Fetch
//!
//! This module defines the CLI structure using clap derive macros,
//! providing a user-friendly interface for downloading series and
//! managing the site session.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::models::EpisodeRange;
use crate::config::DownloadConfigToml;

/// Crunchy Fetch - Download series episodes with resumable progress
#[derive(Parser, Debug)]
#[command(
    name = "crunchy_fetch",
    version,
    about = "Download every episode of a series, resuming where the last run stopped",
    long_about = "Downloads the episodes listed on a catalog page one after another.
Completed episodes are recorded next to the videos, so interrupted runs pick up where they left off.
Prefix an address with @ to download a single episode page directly."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory for videos, progress cache and session
    #[arg(short, long, global = true, value_name = "DIR")]
    pub output: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download the episodes of one or more series
    Download(DownloadArgs),

    /// Manage authentication credentials and the stored session
    Auth(AuthArgs),
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Catalog addresses, or @<episode address> for a single episode
    #[arg(value_name = "ADDRESS", required = true)]
    pub addresses: Vec<String>,

    /// Episodes to fetch: N, A-B, A- or -B
    #[arg(short, long, value_name = "RANGE")]
    pub episodes: Option<EpisodeRange>,

    /// Skip seasons marked as dubbed
    #[arg(long)]
    pub ignore_dub: bool,

    /// Retries per episode after the first attempt
    #[arg(short, long)]
    pub retry: Option<u32>,

    /// Delay between attempts and between episodes in milliseconds
    #[arg(long, value_name = "MS")]
    pub sleep_ms: Option<u64>,

    /// Ignore the stored progress and start from an empty cache
    #[arg(long)]
    pub ignore_cache: bool,

    /// Locale for episode detection and stream selection (e.g. enUS, frFR)
    #[arg(short, long)]
    pub locale: Option<String>,

    /// Subtitle language to embed (defaults to the locale)
    #[arg(long, value_name = "LANG")]
    pub subtitles: Option<String>,
}

/// Arguments for authentication management
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub action: AuthAction,
}

/// Authentication actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Set up account credentials
    Setup {
        /// Force setup even if credentials exist
        #[arg(short, long)]
        force: bool,
    },

    /// Verify current credentials against the site
    Verify,

    /// Show authentication status
    Status,

    /// Forget the stored session
    Logout,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    ///
    /// Falls back to the configured level when no flag is given.
    pub fn log_level(&self, configured: &str) -> String {
        if self.global.quiet {
            "error".to_string()
        } else if self.global.very_verbose {
            "debug".to_string()
        } else if self.global.verbose {
            "info".to_string()
        } else {
            configured.to_string()
        }
    }
}

impl DownloadArgs {
    /// Validate argument combinations clap cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some(address) = self.addresses.iter().find(|a| a.trim().is_empty()) {
            return Err(format!("Invalid address: {:?}", address));
        }
        Ok(())
    }

    /// Episode range, everything when unset
    pub fn range(&self) -> EpisodeRange {
        self.episodes.unwrap_or_default()
    }

    /// Override file settings with the flags that were given
    pub fn apply_to(&self, settings: &mut DownloadConfigToml) {
        if self.ignore_dub {
            settings.ignore_dub = true;
        }
        if self.ignore_cache {
            settings.ignore_cache = true;
        }
        if let Some(retry) = self.retry {
            settings.retry = retry;
        }
        if let Some(sleep_ms) = self.sleep_ms {
            settings.sleep_time_ms = sleep_ms;
        }
        if let Some(locale) = &self.locale {
            settings.locale = locale.clone();
        }
        if let Some(subtitles) = &self.subtitles {
            settings.subtitle_language = Some(subtitles.clone());
        }
    }
}
