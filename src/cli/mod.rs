//! Command-line interface components
//!
//! This module contains CLI-specific code for the Crunchy Fetch application:
//! argument parsing and the command handlers.

pub mod args;
pub mod commands;

pub use args::{AuthAction, AuthArgs, Cli, Commands, DownloadArgs, GlobalArgs};
pub use commands::{handle_auth, handle_download};
