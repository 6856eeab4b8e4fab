//! Credential management for site authentication
//!
//! This module decides which login form is active for a configuration,
//! handles interactive setup, and stores username/password pairs in .env
//! files with restrictive permissions.

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::app::client::{SessionStore, SiteClient};
use crate::config::{AppConfig, AuthConfigToml};
use crate::constants::{auth, env as env_constants};
use crate::errors::{AuthError, AuthResult};

/// Which login strategy a set of credentials drives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStrategy {
    /// Mobile API session start followed by an API login
    Api,
    /// Pre-obtained session cookies are injected directly
    CookieReplay,
    /// Website login form with its anti-forgery token
    Form,
}

/// Settings for an API login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub user: String,
    pub pass: String,
    pub session_url: String,
    pub login_url: String,
    pub session_key: String,
    pub api_version: String,
    pub locale: String,
    /// Fixed device id; a random one is generated and persisted when absent
    pub device_id: Option<String>,
}

/// The single credential form active for a run
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Api(ApiCredentials),
    CookieReplay { user_id: String, user_key: String },
    Form { user: String, pass: String },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Api(c) => f
                .debug_struct("Api")
                .field("user", &c.user)
                .field("session_url", &c.session_url)
                .finish_non_exhaustive(),
            Credentials::CookieReplay { user_id, .. } => f
                .debug_struct("CookieReplay")
                .field("user_id", user_id)
                .finish_non_exhaustive(),
            Credentials::Form { user, .. } => f
                .debug_struct("Form")
                .field("user", user)
                .finish_non_exhaustive(),
        }
    }
}

impl Credentials {
    /// Select the active credential form from configuration
    ///
    /// The strategy flags decide the form: an enabled flag whose fields are
    /// missing yields `None` rather than falling through to another form.
    pub fn select(settings: &AuthConfigToml) -> Option<Self> {
        let present = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        if settings.log_using_api {
            let user = present(&settings.user)?;
            let pass = present(&settings.pass)?;
            return Some(Credentials::Api(ApiCredentials {
                user,
                pass,
                session_url: settings.session_url.clone(),
                login_url: settings.login_url.clone(),
                session_key: settings.session_key.clone(),
                api_version: settings.api_version.clone(),
                locale: settings.api_locale.clone(),
                device_id: present(&settings.device_id),
            }));
        }

        if settings.log_using_cookie {
            return Some(Credentials::CookieReplay {
                user_id: present(&settings.user_id)?,
                user_key: present(&settings.user_key)?,
            });
        }

        Some(Credentials::Form {
            user: present(&settings.user)?,
            pass: present(&settings.pass)?,
        })
    }

    pub fn strategy(&self) -> LoginStrategy {
        match self {
            Credentials::Api(_) => LoginStrategy::Api,
            Credentials::CookieReplay { .. } => LoginStrategy::CookieReplay,
            Credentials::Form { .. } => LoginStrategy::Form,
        }
    }
}

/// Authentication status information
#[derive(Debug, Clone)]
pub struct AuthStatus {
    /// Whether username environment variable is set
    pub username_set: bool,
    /// Whether password environment variable is set
    pub password_set: bool,
    /// Whether .env file exists in current directory
    pub dotenv_file_exists: bool,
    /// Whether a stored session exists in the output directory
    pub session_file_exists: bool,
    /// Whether credentials have been verified (None = not tested)
    pub credentials_valid: Option<bool>,
}

impl AuthStatus {
    /// Check if both credentials are available in environment
    pub fn has_credentials(&self) -> bool {
        self.username_set && self.password_set
    }

    /// Get descriptive status message for display
    pub fn status_message(&self) -> String {
        match (self.has_credentials(), self.credentials_valid) {
            (false, Some(true)) => "Stored session is valid".to_string(),
            (false, _) => "Missing credentials - run 'auth setup' to configure".to_string(),
            (true, None) => "Credentials configured but not verified".to_string(),
            (true, Some(true)) => "Credentials configured and verified".to_string(),
            (true, Some(false)) => "Credentials configured but invalid".to_string(),
        }
    }
}

/// Check current authentication status
pub fn get_auth_status(config: &AppConfig) -> AuthStatus {
    AuthStatus {
        username_set: config.auth.user.is_some() || env::var(env_constants::USERNAME).is_ok(),
        password_set: config.auth.pass.is_some() || env::var(env_constants::PASSWORD).is_ok(),
        dotenv_file_exists: Path::new(".env").exists(),
        session_file_exists: SessionStore::in_dir(&config.download.output_dir()).exists(),
        credentials_valid: None,
    }
}

/// Check if credentials exist in environment variables
pub fn check_credentials() -> bool {
    env::var(env_constants::USERNAME).is_ok() && env::var(env_constants::PASSWORD).is_ok()
}

/// Prompt user for credentials interactively
pub fn prompt_credentials() -> AuthResult<(String, String)> {
    print!("Username or email: ");
    io::stdout().flush().map_err(AuthError::CredentialStorage)?;

    let mut username = String::new();
    io::stdin()
        .read_line(&mut username)
        .map_err(AuthError::CredentialStorage)?;
    let username = username.trim().to_string();

    if username.is_empty() {
        return Err(AuthError::InvalidUsername {
            reason: "Username cannot be empty".to_string(),
        });
    }

    if !is_valid_username(&username) {
        return Err(AuthError::InvalidUsername {
            reason: "Username should be an email address or alphanumeric with dots, hyphens or underscores"
                .to_string(),
        });
    }

    let password = rpassword::prompt_password("Password: ")
        .map_err(|e| AuthError::CredentialStorage(io::Error::new(io::ErrorKind::Other, e)))?;

    if password.is_empty() {
        return Err(AuthError::InvalidUsername {
            reason: "Password cannot be empty".to_string(),
        });
    }

    Ok((username, password))
}

/// Validate a username or email address
fn is_valid_username(username: &str) -> bool {
    if username.len() < auth::MIN_USERNAME_LENGTH || username.len() > auth::MAX_USERNAME_LENGTH {
        return false;
    }

    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | '@' | '+'))
}

/// Save credentials to the .env file in the current directory
pub fn save_credentials(username: &str, password: &str) -> AuthResult<()> {
    save_credentials_to(Path::new(".env"), username, password)?;

    env::set_var(env_constants::USERNAME, username);
    env::set_var(env_constants::PASSWORD, password);

    println!("Credentials saved to .env file");

    #[cfg(unix)]
    println!("File permissions set to owner-only (600)");

    #[cfg(not(unix))]
    println!(
        "Warning: File permissions not set (non-Unix system). Please ensure .env file is protected."
    );

    Ok(())
}

/// Merge credentials into an env file, keeping unrelated lines
pub fn save_credentials_to(env_path: &Path, username: &str, password: &str) -> AuthResult<()> {
    let mut lines = Vec::new();
    let mut username_found = false;
    let mut password_found = false;

    if env_path.exists() {
        let reader = BufReader::new(File::open(env_path)?);

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();

            if trimmed.starts_with(&format!("{}=", env_constants::USERNAME)) {
                lines.push(format!("{}={}", env_constants::USERNAME, username));
                username_found = true;
            } else if trimmed.starts_with(&format!("{}=", env_constants::PASSWORD)) {
                lines.push(format!("{}={}", env_constants::PASSWORD, password));
                password_found = true;
            } else {
                lines.push(line);
            }
        }
    }

    if !username_found {
        lines.push(format!("{}={}", env_constants::USERNAME, username));
    }
    if !password_found {
        lines.push(format!("{}={}", env_constants::PASSWORD, password));
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(env_path)?;

    for line in lines {
        writeln!(file, "{}", line)?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(auth::ENV_FILE_PERMISSIONS);
        file.set_permissions(perms)?;
    }

    Ok(())
}

/// Verify the configured credentials by establishing a session
///
/// Returns `Ok(false)` when the site rejects the login; transport failures
/// are returned as errors.
pub async fn verify_credentials(config: &AppConfig) -> AuthResult<bool> {
    let credentials = config.auth.credentials();
    if credentials.is_none() {
        return Err(AuthError::MissingCredentials);
    }

    println!("Verifying credentials...");

    let store = SessionStore::in_dir(&config.download.output_dir());
    let client = SiteClient::new(config.client.to_runtime_config(), store, credentials).await?;
    let auth = client.auth();
    let mut manager = auth.lock().await;

    match manager.ensure_authenticated().await {
        Ok(session) => {
            if session.is_premium() {
                println!("Credentials verified successfully (premium account)");
            } else {
                println!("Credentials verified successfully (no premium account)");
            }
            Ok(true)
        }
        Err(AuthError::Network(e)) => Err(AuthError::Network(e)),
        Err(e) => {
            println!("Credential verification failed: {}", e);
            Ok(false)
        }
    }
}

/// Interactive credential setup workflow
pub async fn setup_credentials(config: &mut AppConfig) -> AuthResult<()> {
    println!("Authentication Setup");
    println!("====================");
    println!();
    println!("This stores your account credentials in a .env file in the current directory.");
    println!();

    if get_auth_status(config).has_credentials() {
        println!("Warning: Credentials are already configured.");
        print!("Do you want to update them? [y/N]: ");
        io::stdout().flush().map_err(AuthError::CredentialStorage)?;

        let mut response = String::new();
        io::stdin()
            .read_line(&mut response)
            .map_err(AuthError::CredentialStorage)?;

        if !response.trim().to_lowercase().starts_with('y') {
            println!("Setup cancelled.");
            return Ok(());
        }
        println!();
    }

    let (username, password) = prompt_credentials()?;

    println!();
    save_credentials(&username, &password)?;
    config.auth.user = Some(username);
    config.auth.pass = Some(password);

    println!();
    if verify_credentials(config).await? {
        println!();
        println!("Setup complete! You can now download episodes.");
    } else {
        println!();
        println!("Setup failed. Please check your credentials and try again.");
        println!("   You can run 'auth setup' again to re-enter your credentials.");
    }

    Ok(())
}

/// Show current authentication status
pub async fn show_auth_status(config: &AppConfig) -> AuthResult<()> {
    let mut status = get_auth_status(config);

    println!("Authentication Status");
    println!("=====================");
    println!();

    match config
        .auth
        .user
        .clone()
        .or_else(|| env::var(env_constants::USERNAME).ok())
    {
        Some(username) => println!("Username: {} (set)", username),
        None => println!("Username: Not set"),
    }
    println!(
        "Password: {}",
        if status.password_set { "Set" } else { "Not set" }
    );
    println!(
        "Login strategy: {}",
        match config.auth.credentials().map(|c| c.strategy()) {
            Some(LoginStrategy::Api) => "API",
            Some(LoginStrategy::CookieReplay) => "cookie replay",
            Some(LoginStrategy::Form) => "login form",
            None => "none",
        }
    );
    println!(
        ".env file: {}",
        if status.dotenv_file_exists {
            "Exists"
        } else {
            "Not found"
        }
    );
    println!(
        "Stored session: {}",
        if status.session_file_exists {
            "Exists"
        } else {
            "Not found"
        }
    );
    println!();

    if config.auth.credentials().is_some() {
        println!("Testing credentials...");
        status.credentials_valid = Some(verify_credentials(config).await?);
        println!();
    }

    println!("Status: {}", status.status_message());

    if !status.has_credentials() {
        println!();
        println!("To configure credentials, run: crunchy_fetch auth setup");
    } else if status.credentials_valid == Some(false) {
        println!();
        println!("To update credentials, run: crunchy_fetch auth setup");
    }

    Ok(())
}

/// Forget the stored session
pub async fn logout(config: &AppConfig) -> AuthResult<()> {
    let store = SessionStore::in_dir(&config.download.output_dir());
    if store.clear().await? {
        println!("Removed stored session {}", store.path().display());
    } else {
        println!("No stored session to remove");
    }
    Ok(())
}
