//! Token file persistence

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::Result;
use crate::google::credentials::Credential;

/// Reads and writes the token file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a token file is present
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored credential.
    ///
    /// A missing or unreadable file yields `None`. When the file records no
    /// scopes the credential is taken to cover `scopes`.
    pub async fn load(&self, scopes: &[String]) -> Option<Credential> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read token file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<Credential>(&content) {
            Ok(mut creds) => {
                if creds.scopes.is_empty() {
                    creds.scopes = scopes.to_vec();
                }
                Some(creds)
            }
            Err(e) => {
                tracing::warn!("Ignoring invalid token file {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Persist `credential`, replacing the token file atomically
    pub async fn save(&self, credential: &Credential) -> Result<()> {
        let content = serde_json::to_string_pretty(credential)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || write_atomically(&path, content.as_bytes()))
            .await
            .map_err(std::io::Error::other)??;

        tracing::info!("Credentials saved to {}", self.path.display());
        Ok(())
    }
}

/// Write to a sibling temp file, then rename over `path`
fn write_atomically(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp_file = NamedTempFile::new_in(dir)?;
    tmp_file.write_all(content)?;
    tmp_file.as_file().sync_all()?;
    tmp_file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn credential() -> Credential {
        Credential {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec!["https://mail.google.com/".to_string()],
            expiry: Some(Utc.with_ymd_and_hms(2031, 5, 4, 3, 2, 1).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("token.json"));
        assert!(!store.exists());
        assert!(store.load(&[]).await.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested").join("token.json"));
        let creds = credential();

        store.save(&creds).await.unwrap();
        assert!(store.exists());
        let loaded = store.load(&["https://mail.google.com/".to_string()]).await;
        assert_eq!(loaded, Some(creds));
    }

    #[tokio::test]
    async fn test_corrupt_file_loads_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(CredentialStore::new(path).load(&[]).await.is_none());
    }

    #[tokio::test]
    async fn test_missing_scopes_take_requested() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"token": "t", "refresh_token": "r"}"#).unwrap();

        let requested = vec!["https://www.googleapis.com/auth/calendar".to_string()];
        let creds = CredentialStore::new(path).load(&requested).await.unwrap();
        assert_eq!(creds.scopes, requested);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("token.json"));
        store.save(&credential()).await.unwrap();

        let mut newer = credential();
        newer.access_token = "newer".to_string();
        store.save(&newer).await.unwrap();

        assert_eq!(store.load(&[]).await.unwrap().access_token, "newer");
    }
}
