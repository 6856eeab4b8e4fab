//! Credential management for site authentication
//!
//! This module selects the active credential form for a configuration and
//! provides the interactive `auth` workflows: setup, verification, status and
//! logout. The session itself is driven by [`crate::app::client::AuthManager`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use crunchy_fetch::auth::{check_credentials, setup_credentials};
//! use crunchy_fetch::config::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = AppConfig::load(None).await?;
//! if !check_credentials() {
//!     setup_credentials(&mut config).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod credentials;

pub use credentials::{
    check_credentials, get_auth_status, logout, prompt_credentials, save_credentials,
    save_credentials_to, setup_credentials, show_auth_status, verify_credentials, ApiCredentials,
    AuthStatus, Credentials, LoginStrategy,
};
