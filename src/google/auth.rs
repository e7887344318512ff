//! Token lifecycle management
//!
//! `TokenManager::acquire` is the only way the rest of the crate gets a
//! credential:
//! - a stored credential that is valid for the requested scopes is returned
//! - an expired one with a refresh token is refreshed once and persisted
//! - anything else goes through the interactive flow and is persisted

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::google::credentials::{ClientSecrets, Credential};
use crate::google::flow::{AuthorizationFlow, GoogleOAuthFlow};
use crate::google::scope::{resolve_scopes, Scope};
use crate::google::store::CredentialStore;

/// Hands out valid credentials, refreshing or re-authorizing as needed
pub struct TokenManager {
    /// Configuration
    config: Config,

    /// Token file
    store: CredentialStore,

    /// OAuth endpoints
    flow: Arc<dyn AuthorizationFlow>,
}

impl TokenManager {
    /// Create a manager talking to Google's OAuth endpoints
    pub fn new(config: Config) -> Self {
        let flow = Arc::new(GoogleOAuthFlow::new(config.clone()));
        Self::with_flow(config, flow)
    }

    /// Create a manager with a custom authorization flow
    pub fn with_flow(config: Config, flow: Arc<dyn AuthorizationFlow>) -> Self {
        let store = CredentialStore::new(config.token_path.clone());
        Self { config, store, flow }
    }

    /// Configuration this manager was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token file backing this manager
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Whether a token file exists locally
    pub fn has_token(&self) -> bool {
        self.store.exists()
    }

    /// Scope URIs for a request; empty falls back to the configured defaults
    pub fn resolve(&self, scopes: &[Scope]) -> Vec<String> {
        resolve_scopes(scopes, &self.config.default_scopes)
    }

    /// Return a credential valid for `scopes`
    pub async fn acquire(&self, scopes: &[Scope]) -> Result<Credential> {
        let requested = self.resolve(scopes);
        let mut authorize_scopes = requested.clone();

        if let Some(creds) = self.store.load(&requested).await {
            if creds.is_valid_for(&requested) {
                tracing::debug!("Using stored credentials from {}", self.store.path().display());
                return Ok(creds);
            }

            if creds.has_scopes(&requested) && creds.is_expired() && creds.refresh_token.is_some() {
                tracing::info!("Token expired. Refreshing...");
                let refreshed = self.flow.refresh(&creds).await?;
                tracing::info!("Token refreshed successfully");
                self.store.save(&refreshed).await?;
                return Ok(refreshed);
            }

            if !creds.has_scopes(&requested) {
                // Keep what was already granted so the next request does not re-prompt
                authorize_scopes = merge_scopes(&creds.scopes, &requested);
                tracing::info!(
                    "Stored credentials do not cover {:?}; re-authorizing for {:?}",
                    requested,
                    authorize_scopes
                );
            }
        }

        tracing::info!("No valid credentials found. Starting auth flow...");
        let secrets = ClientSecrets::load(&self.config.client_secrets_path)?;
        let creds = self.flow.authorize(&secrets, &authorize_scopes).await?;
        self.store.save(&creds).await?;
        Ok(creds)
    }
}

/// `granted` followed by every scope of `requested` not already in it
fn merge_scopes(granted: &[String], requested: &[String]) -> Vec<String> {
    let mut merged = granted.to_vec();
    for scope in requested {
        if !merged.contains(scope) {
            merged.push(scope.clone());
        }
    }
    merged
}
