//! Crunchy Fetch CLI application
//!
//! Command-line interface for downloading the episodes of a series with
//! resumable progress tracking.

use std::process;

use tracing::{debug, info};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, EnvFilter};

use crunchy_fetch::cli::{handle_auth, handle_download, Cli, Commands};
use crunchy_fetch::config::{AppConfig, LoggingConfig};
use crunchy_fetch::errors::Result;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    if cli.global.config.is_none() {
        if let Err(e) = AppConfig::initialize_first_run().await {
            eprintln!("Could not create a default configuration: {}", e);
        }
    }

    let mut config = AppConfig::load(cli.global.config.clone()).await?;
    if let Some(output) = &cli.global.output {
        config.download.output = Some(output.clone());
    }

    init_logging(&cli, &config.logging);
    info!("Crunchy Fetch v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Download(args) => {
            debug!("Executing download command");
            handle_download(args, config, !cli.global.quiet).await
        }
        Commands::Auth(args) => {
            debug!("Executing auth command");
            handle_auth(args, config).await
        }
    }
}

/// Initialize logging based on CLI verbosity settings
fn init_logging(cli: &Cli, logging: &LoggingConfig) {
    let log_level = cli.log_level(&logging.level);

    let directive = format!("crunchy_fetch={}", log_level)
        .parse::<Directive>()
        .or_else(|_| "crunchy_fetch=info".parse::<Directive>());

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = directive {
        filter = filter.add_directive(directive);
    }

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(logging.colored_output)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
}
