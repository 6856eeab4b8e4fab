//! Command handlers for Crunchy Fetch CLI
//!
//! This module implements the main command handlers that coordinate between
//! CLI arguments and the core application functionality.

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::app::{
    CatalogScraper, FfmpegMuxer, Locale, Orchestrator, PlayerDownloader, SessionStore, SiteClient,
    Task,
};
use crate::auth::{check_credentials, logout, setup_credentials, show_auth_status, verify_credentials};
use crate::cli::{AuthAction, AuthArgs, DownloadArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, Result};

/// Handle the download command
///
/// Builds one shared site session, then processes every address in order.
/// A task that fails to scrape is reported and skipped; authentication and
/// cache failures stop the whole run.
pub async fn handle_download(
    args: DownloadArgs,
    mut config: AppConfig,
    show_progress: bool,
) -> Result<()> {
    let start_time = Instant::now();
    args.validate().map_err(AppError::generic)?;
    args.apply_to(&mut config.download);
    config.validate()?;

    let locale = Locale::resolve(&config.download.locale)?;
    let output_dir = config.download.output_dir();
    tokio::fs::create_dir_all(&output_dir).await?;
    info!("Writing episodes to {}", output_dir.display());

    let credentials = config.auth.credentials();
    match &credentials {
        Some(c) => debug!("Using {:?} login if the stored session has expired", c.strategy()),
        None => debug!("No credentials configured, relying on the stored session"),
    }

    let store = SessionStore::in_dir(&output_dir);
    let client = SiteClient::new(config.client.to_runtime_config(), store, credentials).await?;

    let scraper = CatalogScraper::new(
        client.transport(),
        client.auth(),
        config.download.catalog_config(locale.clone()),
    );
    let downloader = PlayerDownloader::new(
        client.transport(),
        client.auth(),
        config.download.player_config(&locale),
        FfmpegMuxer::new(&config.download.ffmpeg_path),
    );
    let mut orchestrator =
        Orchestrator::new(scraper, downloader, config.download.orchestrator_config());

    let range = args.range();
    let mut failed_episodes = 0;
    let mut failed_tasks = 0;

    for address in &args.addresses {
        let task = Task::new(address.clone(), range);
        let spinner = task_spinner(address, show_progress)?;

        let result = orchestrator.run(&task).await;
        spinner.finish_and_clear();

        // the site may have rotated cookies while the task ran
        if let Err(e) = client.auth().lock().await.persist().await {
            warn!("Could not save the session: {}", e);
        }

        match result {
            Ok(summary) => {
                failed_episodes += summary.failed;
                if show_progress {
                    println!("✅ {}", summary.describe());
                }
                info!("{}", summary.describe());
            }
            Err(e) if e.is_recoverable() => {
                failed_tasks += 1;
                error!("Skipping {} ({} error): {}", address, e.category(), e);
            }
            Err(e) => {
                error!("Stopping run ({} error): {}", e.category(), e);
                return Err(e);
            }
        }
    }

    if failed_episodes > 0 {
        warn!(
            "{} episodes could not be fetched, rerun later to retry them",
            failed_episodes
        );
    }
    if failed_tasks > 0 {
        warn!("{} of {} addresses failed", failed_tasks, args.addresses.len());
    }
    info!("Download command finished in {:?}", start_time.elapsed());

    Ok(())
}

fn task_spinner(address: &str, show_progress: bool) -> Result<ProgressBar> {
    if !show_progress {
        return Ok(ProgressBar::hidden());
    }

    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg} [{elapsed}]")
        .map_err(|e| AppError::generic(format!("Invalid progress template: {}", e)))?
        .tick_strings(&["◐", "◓", "◑", "◒"]);
    spinner.set_style(style);
    spinner.set_message(format!("Processing {}", address));
    spinner.enable_steady_tick(Duration::from_millis(120));
    Ok(spinner)
}

/// Handle authentication commands
pub async fn handle_auth(args: AuthArgs, mut config: AppConfig) -> Result<()> {
    match args.action {
        AuthAction::Setup { force } => {
            if force || !check_credentials() {
                setup_credentials(&mut config).await?;
            } else {
                println!("✅ Credentials already configured. Use --force to update.");
            }
        }
        AuthAction::Verify => {
            if verify_credentials(&config).await? {
                println!("✅ Credentials verified successfully");
            } else {
                println!("❌ Credential verification failed");
            }
        }
        AuthAction::Status => {
            show_auth_status(&config).await?;
        }
        AuthAction::Logout => {
            logout(&config).await?;
        }
    }

    Ok(())
}
