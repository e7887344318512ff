//! Configuration management for the Google MCP Server
//!
//! Handles file paths, environment variables and the OAuth callback settings.
//! A `Config` is built once at startup and handed to everything that needs it.

use std::path::PathBuf;

use crate::error::{ConfigError, Result};
use crate::google::scope::Scope;

/// Default token file, relative to the working directory
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Default OAuth client secrets file, relative to the working directory
pub const DEFAULT_CLIENT_SECRETS_FILE: &str = "credentials.json";

/// Default port for the local OAuth redirect listener
pub const DEFAULT_OAUTH_PORT: u16 = 8080;

/// Configuration for the Google MCP Server
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to stored credentials (access/refresh tokens)
    pub token_path: PathBuf,

    /// Path to OAuth client secrets
    pub client_secrets_path: PathBuf,

    /// Scopes used when a caller does not ask for any
    pub default_scopes: Vec<Scope>,

    /// Host used in the OAuth redirect URI
    pub oauth_callback_host: String,

    /// OAuth callback port (0 picks a free port)
    pub oauth_callback_port: u16,

    /// Whether the interactive flow tries to launch a browser
    pub open_browser: bool,

    /// Root URL of the Google APIs, e.g. `https://gmail.googleapis.com`
    pub api_root: String,
}

impl Config {
    /// Create a configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let token_path = std::env::var("GOOGLE_TOKEN_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_FILE));

        let client_secrets_path = std::env::var("GOOGLE_CLIENT_SECRETS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CLIENT_SECRETS_FILE));

        let oauth_callback_port = std::env::var("GOOGLE_OAUTH_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_OAUTH_PORT);

        let open_browser = std::env::var_os("GOOGLE_OAUTH_NO_BROWSER").is_none();

        let api_root = std::env::var("GOOGLE_API_ROOT")
            .unwrap_or_else(|_| crate::gmail::client::DEFAULT_API_ROOT.to_string());

        Self {
            token_path,
            client_secrets_path,
            default_scopes: vec![Scope::Gmail],
            oauth_callback_host: "localhost".to_string(),
            oauth_callback_port,
            open_browser,
            api_root,
        }
    }

    /// Create a configuration with explicit token and secrets paths
    pub fn with_paths(token_path: impl Into<PathBuf>, client_secrets_path: impl Into<PathBuf>) -> Self {
        Self {
            token_path: token_path.into(),
            client_secrets_path: client_secrets_path.into(),
            ..Self::from_env()
        }
    }

    /// Check if the OAuth client secrets file exists
    pub fn client_secrets_exist(&self) -> bool {
        self.client_secrets_path.exists()
    }

    /// Check if a token file exists
    pub fn token_exists(&self) -> bool {
        self.token_path.exists()
    }

    /// Redirect URI for a listener bound to `port`. No trailing slash.
    pub fn redirect_uri(&self, port: u16) -> String {
        format!("http://{}:{}", self.oauth_callback_host, port)
    }

    /// Startup check: a token file or a client secrets file must exist
    pub fn check_credential_sources(&self) -> Result<()> {
        if self.token_exists() || self.client_secrets_exist() {
            return Ok(());
        }

        Err(ConfigError::NoCredentialSource {
            token_path: self.token_path.display().to_string(),
            secrets_path: self.client_secrets_path.display().to_string(),
        }
        .into())
    }

    /// Reject settings no request could succeed with
    pub fn validate(&self) -> Result<()> {
        if !(self.api_root.starts_with("http://") || self.api_root.starts_with("https://")) {
            return Err(ConfigError::InvalidConfig {
                message: format!("API root must be an http(s) URL, got '{}'", self.api_root),
            }
            .into());
        }

        if self.default_scopes.is_empty() {
            return Err(ConfigError::InvalidConfig {
                message: "at least one default scope is required".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Gmail API constants
pub mod gmail {
    /// Default Gmail service name
    pub const SERVICE_NAME: &str = "gmail";

    /// Default Gmail service version
    pub const SERVICE_VERSION: &str = "v1";

    /// User ID for the authenticated user
    pub const USER_ID: &str = "me";
}
