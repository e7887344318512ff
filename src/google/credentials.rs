//! Credential and client secret types
//!
//! The token file uses Google's "authorized user" layout so that files
//! written by other Google tooling load here and vice versa.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Google's token endpoint
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens expiring within this many seconds are treated as expired.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// OAuth client credentials
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Auth URI
    pub auth_uri: String,

    /// Token URI
    pub token_uri: String,

    /// Redirect URIs
    #[serde(default)]
    pub redirect_uris: Vec<String>,
}

/// Client secrets file format (can be "installed" or "web")
#[derive(Debug, Deserialize)]
struct ClientSecretsFile {
    #[serde(alias = "web")]
    installed: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Load client secrets from a Google OAuth client JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::ClientSecretsNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|message| {
            ConfigError::InvalidClientSecrets {
                path: path.display().to_string(),
                message,
            }
            .into()
        })
    }

    fn parse(content: &str) -> std::result::Result<Self, String> {
        let file: ClientSecretsFile = serde_json::from_str(content).map_err(|e| e.to_string())?;
        file.installed
            .ok_or_else(|| "expected 'installed' or 'web' credentials".to_string())
    }
}

/// An authorized user credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Access token
    #[serde(rename = "token")]
    pub access_token: String,

    /// Refresh token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token endpoint used for refreshing
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    /// OAuth client that obtained the token
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    /// Granted scope URIs
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Access token expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl Credential {
    /// Build a credential from a fresh authorization-code exchange
    pub fn from_token_response(
        response: TokenResponse,
        secrets: &ClientSecrets,
        requested_scopes: &[String],
    ) -> Self {
        let scopes = response
            .granted_scopes()
            .unwrap_or_else(|| requested_scopes.to_vec());

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes,
            expiry: response.expires_in.map(expiry_from_now),
        }
    }

    /// Apply a refresh response. Fields the endpoint omits are kept.
    pub fn refreshed(&self, response: TokenResponse) -> Self {
        Self {
            scopes: response.granted_scopes().unwrap_or_else(|| self.scopes.clone()),
            access_token: response.access_token,
            refresh_token: response.refresh_token.or_else(|| self.refresh_token.clone()),
            expiry: response.expires_in.map(expiry_from_now),
            ..self.clone()
        }
    }

    /// Whether the access token is expired or about to expire
    pub fn is_expired(&self) -> bool {
        self.expiry
            .is_some_and(|exp| Utc::now() + Duration::seconds(REFRESH_MARGIN_SECS) >= exp)
    }

    /// Whether every requested scope was granted
    pub fn has_scopes(&self, requested: &[String]) -> bool {
        requested.iter().all(|s| self.scopes.contains(s))
    }

    /// Usable as-is for the requested scopes
    pub fn is_valid_for(&self, requested: &[String]) -> bool {
        !self.access_token.is_empty() && !self.is_expired() && self.has_scopes(requested)
    }
}

fn expiry_from_now(expires_in: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in)
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token response from OAuth token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl TokenResponse {
    /// Space-separated `scope` field as a list, if present and non-empty
    fn granted_scopes(&self) -> Option<Vec<String>> {
        let scopes: Vec<String> = self
            .scope
            .as_deref()?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        (!scopes.is_empty()).then_some(scopes)
    }
}
