//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tempfile::TempDir;

use google_mcp_server_rust::config::Config;
use google_mcp_server_rust::error::Result;
use google_mcp_server_rust::google::credentials::{ClientSecrets, Credential};
use google_mcp_server_rust::google::flow::AuthorizationFlow;

pub const GMAIL_SCOPE: &str = "https://mail.google.com/";

/// Authorization flow that never touches the network and counts its calls
#[derive(Default)]
pub struct CountingFlow {
    pub refreshes: AtomicUsize,
    pub authorizations: AtomicUsize,
}

impl CountingFlow {
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn authorize_count(&self) -> usize {
        self.authorizations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthorizationFlow for CountingFlow {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(Credential {
            access_token: "refreshed-token".to_string(),
            expiry: Some(Utc::now() + Duration::hours(1)),
            ..credential.clone()
        })
    }

    async fn authorize(&self, secrets: &ClientSecrets, scopes: &[String]) -> Result<Credential> {
        self.authorizations.fetch_add(1, Ordering::SeqCst);
        Ok(Credential {
            access_token: "authorized-token".to_string(),
            refresh_token: Some("authorized-refresh".to_string()),
            token_uri: secrets.token_uri.clone(),
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            scopes: scopes.to_vec(),
            expiry: Some(Utc::now() + Duration::hours(1)),
        })
    }
}

/// A Gmail-scoped credential expiring `expires_in` seconds from now
pub fn credential(expires_in: i64, refresh_token: Option<&str>) -> Credential {
    Credential {
        access_token: "stored-token".to_string(),
        refresh_token: refresh_token.map(str::to_string),
        token_uri: "https://oauth2.googleapis.com/token".to_string(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        scopes: vec![GMAIL_SCOPE.to_string()],
        expiry: Some(Utc::now() + Duration::seconds(expires_in)),
    }
}

/// Configuration rooted in `dir`, with `api_root` pointing at a mock server
pub fn config(dir: &TempDir, api_root: &str) -> Config {
    let mut config = Config::with_paths(dir.path().join("token.json"), dir.path().join("credentials.json"));
    config.api_root = api_root.to_string();
    config.open_browser = false;
    config
}

pub fn write_token(path: &Path, credential: &Credential) {
    std::fs::write(path, serde_json::to_string_pretty(credential).unwrap()).unwrap();
}

pub fn read_token(path: &Path) -> Credential {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

pub fn write_client_secrets(path: &Path) {
    let secrets = serde_json::json!({
        "installed": {
            "client_id": "client-id",
            "client_secret": "client-secret",
            "auth_uri": "https://accounts.google.com/o/oauth2/auth",
            "token_uri": "https://oauth2.googleapis.com/token",
            "redirect_uris": ["http://localhost"]
        }
    });
    std::fs::write(path, secrets.to_string()).unwrap();
}

pub fn counting_flow() -> Arc<CountingFlow> {
    Arc::new(CountingFlow::default())
}
