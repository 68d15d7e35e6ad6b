//! Credential management for the granule archive FTP account
//!
//! Credentials live in environment variables, optionally seeded from a .env
//! file with owner-only permissions. The rest of the crate only ever sees an
//! [`FtpCredentials`] value, whose Debug output redacts the password.

use std::env;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use crate::constants::{auth, env as env_constants};
use crate::errors::{AuthError, AuthResult};

/// FTP account credentials resolved from the environment
///
/// The password is intentionally excluded from Debug output so credentials
/// can appear in traces without leaking the secret.
#[derive(Clone)]
pub struct FtpCredentials {
    username: String,
    password: String,
}

impl FtpCredentials {
    pub fn new(username: String, password: String) -> Self {
        Self { username, password }
    }

    /// Resolve credentials from the environment
    ///
    /// # Errors
    ///
    /// `AuthError::MissingCredentials` when either variable is unset or empty.
    pub fn from_env() -> AuthResult<Self> {
        let username = env::var(env_constants::USERNAME).ok();
        let password = env::var(env_constants::PASSWORD).ok();
        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Ok(Self::new(u, p)),
            _ => Err(AuthError::MissingCredentials),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for FtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FtpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
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
            (false, _) => "Missing credentials - run 'auth setup' to configure".to_string(),
            (true, None) => "Credentials configured but not verified".to_string(),
            (true, Some(true)) => "Credentials configured and verified".to_string(),
            (true, Some(false)) => "Credentials configured but invalid".to_string(),
        }
    }
}

/// Check current authentication status
pub fn get_auth_status() -> AuthStatus {
    AuthStatus {
        username_set: env::var(env_constants::USERNAME).is_ok(),
        password_set: env::var(env_constants::PASSWORD).is_ok(),
        dotenv_file_exists: Path::new(".env").exists(),
        credentials_valid: None,
    }
}

/// Check if credentials exist in environment variables
pub fn check_credentials() -> bool {
    env::var(env_constants::USERNAME).is_ok() && env::var(env_constants::PASSWORD).is_ok()
}

/// Prompt user for credentials interactively
pub fn prompt_credentials() -> AuthResult<FtpCredentials> {
    print!("FTP Username: ");
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
            reason: "Username should be alphanumeric with optional dots, hyphens, or underscores"
                .to_string(),
        });
    }

    let password = rpassword::prompt_password("FTP Password: ")
        .map_err(|e| AuthError::CredentialStorage(io::Error::new(io::ErrorKind::Other, e)))?;

    if password.is_empty() {
        return Err(AuthError::InvalidUsername {
            reason: "Password cannot be empty".to_string(),
        });
    }

    Ok(FtpCredentials::new(username, password))
}

/// Validate username format
fn is_valid_username(username: &str) -> bool {
    if username.len() < auth::MIN_USERNAME_LENGTH || username.len() > auth::MAX_USERNAME_LENGTH {
        return false;
    }

    username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == '_')
}

/// Save credentials to .env file with secure permissions
pub fn save_credentials(credentials: &FtpCredentials) -> AuthResult<()> {
    let env_path = Path::new(".env");
    let mut existing_lines = Vec::new();
    let mut username_found = false;
    let mut password_found = false;

    // Preserve unrelated lines from an existing .env file
    if env_path.exists() {
        let file = File::open(env_path)?;
        let reader = BufReader::new(file);

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();

            if trimmed.starts_with(&format!("{}=", env_constants::USERNAME)) {
                existing_lines.push(format!(
                    "{}={}",
                    env_constants::USERNAME,
                    credentials.username()
                ));
                username_found = true;
            } else if trimmed.starts_with(&format!("{}=", env_constants::PASSWORD)) {
                existing_lines.push(format!(
                    "{}={}",
                    env_constants::PASSWORD,
                    credentials.password()
                ));
                password_found = true;
            } else {
                existing_lines.push(line);
            }
        }
    }

    if !username_found {
        existing_lines.push(format!(
            "{}={}",
            env_constants::USERNAME,
            credentials.username()
        ));
    }
    if !password_found {
        existing_lines.push(format!(
            "{}={}",
            env_constants::PASSWORD,
            credentials.password()
        ));
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(env_path)?;

    for line in existing_lines {
        writeln!(file, "{}", line)?;
    }

    // Owner-only permissions on Unix
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = file.metadata()?.permissions();
        perms.set_mode(auth::ENV_FILE_PERMISSIONS);
        file.set_permissions(perms)?;
    }

    env::set_var(env_constants::USERNAME, credentials.username());
    env::set_var(env_constants::PASSWORD, credentials.password());

    println!("Credentials saved to .env file");

    #[cfg(unix)]
    println!("File permissions set to owner-only (600)");

    #[cfg(not(unix))]
    println!(
        "Warning: File permissions not set (non-Unix system). Please ensure .env file is protected."
    );

    Ok(())
}

/// Remove stored credentials from the environment and the .env file
///
/// Unrelated .env lines are preserved.
pub fn clear_credentials() -> AuthResult<()> {
    let env_path = Path::new(".env");

    if env_path.exists() {
        let file = File::open(env_path)?;
        let reader = BufReader::new(file);

        let kept: Vec<String> = reader
            .lines()
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|line| {
                let trimmed = line.trim();
                !trimmed.starts_with(&format!("{}=", env_constants::USERNAME))
                    && !trimmed.starts_with(&format!("{}=", env_constants::PASSWORD))
            })
            .collect();

        if kept.is_empty() {
            std::fs::remove_file(env_path)?;
        } else {
            let mut file = OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(env_path)?;
            for line in kept {
                writeln!(file, "{}", line)?;
            }
        }
    }

    env::remove_var(env_constants::USERNAME);
    env::remove_var(env_constants::PASSWORD);

    println!("Credentials cleared");
    Ok(())
}

/// Verify credentials by logging in to the archive
pub async fn verify_credentials() -> AuthResult<bool> {
    use crate::app::transfer::{Connector, FtpConnector, TransferConfig};

    let credentials = FtpCredentials::from_env()?;

    println!("Verifying credentials with the archive...");

    let connector = FtpConnector::new(TransferConfig::default(), credentials);
    match connector.connect().await {
        Ok(mut transport) => {
            let _ = transport.close().await;
            println!("Credentials verified successfully!");
            Ok(true)
        }
        Err(e) => {
            println!("Credential verification failed: {}", e);
            Ok(false)
        }
    }
}

/// Interactive credential setup workflow
pub async fn setup_credentials() -> AuthResult<()> {
    println!("Himawari Archive Authentication Setup");
    println!("=====================================");
    println!();
    println!("This will help you configure your FTP credentials for the granule archive.");
    println!("Your credentials will be stored in a .env file in the current directory.");
    println!();

    let status = get_auth_status();
    if status.has_credentials() {
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

    let credentials = prompt_credentials()?;

    println!();
    println!("Saving credentials...");
    save_credentials(&credentials)?;

    println!();
    let is_valid = verify_credentials().await?;

    if is_valid {
        println!();
        println!("Setup complete! You can now run fetch commands.");
    } else {
        println!();
        println!("Setup failed. Please check your credentials and try again.");
        println!("   You can run 'auth setup' again to re-enter your credentials.");
    }

    Ok(())
}

/// Show current authentication status
pub async fn show_auth_status() -> AuthResult<()> {
    let mut status = get_auth_status();

    println!("Himawari Archive Authentication Status");
    println!("======================================");
    println!();

    if let Ok(username) = env::var(env_constants::USERNAME) {
        println!("Username: {} (set)", username);
    } else {
        println!("Username: Not set");
    }

    println!(
        "Password: {}",
        if status.password_set {
            "Set"
        } else {
            "Not set"
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

    println!();

    if status.has_credentials() {
        println!("Testing credentials...");
        let is_valid = verify_credentials().await?;
        status.credentials_valid = Some(is_valid);

        println!();
    }

    println!("Status: {}", status.status_message());

    if !status.has_credentials() {
        println!();
        println!("To configure credentials, run: himawari_fetcher auth setup");
    } else if status.credentials_valid == Some(false) {
        println!();
        println!("To update credentials, run: himawari_fetcher auth setup");
    }

    Ok(())
}

/// Check if command requires authentication and prompt setup if needed
pub async fn ensure_authenticated() -> AuthResult<FtpCredentials> {
    if !check_credentials() {
        println!("This command requires archive FTP credentials.");
        println!();

        print!("Would you like to set up authentication now? [Y/n]: ");
        io::stdout().flush().map_err(AuthError::CredentialStorage)?;

        let mut response = String::new();
        io::stdin()
            .read_line(&mut response)
            .map_err(AuthError::CredentialStorage)?;

        if response.trim().to_lowercase().starts_with('n') {
            return Err(AuthError::MissingCredentials);
        }

        println!();
        setup_credentials().await?;
    }

    FtpCredentials::from_env()
}
