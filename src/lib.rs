//! Crunchy Fetch Library
//!
//! A Rust library for downloading the episodes of a series from a
//! session-gated catalog site. It authenticates under one of several login
//! strategies, scrapes the episode list and downloads episodes one at a time,
//! recording progress so repeated runs never fetch an episode twice.

pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
