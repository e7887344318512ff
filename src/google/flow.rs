//! OAuth 2.0 flows against Google's endpoints
//!
//! Handles:
//! - Refreshing an access token with a stored refresh token
//! - The installed-app authorization code flow with a local redirect listener
//!
//! Both are behind [`AuthorizationFlow`] so the token lifecycle can be driven
//! without a browser.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{extract::Query, response::Html, routing::get, Router};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{distributions::Alphanumeric, Rng};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;

use crate::config::Config;
use crate::error::{AuthError, Result};
use crate::google::credentials::{ClientSecrets, Credential, TokenResponse};

/// The external OAuth collaborator
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    /// Exchange the credential's refresh token for a new access token
    async fn refresh(&self, credential: &Credential) -> Result<Credential>;

    /// Obtain a brand-new credential through user consent
    async fn authorize(&self, secrets: &ClientSecrets, scopes: &[String]) -> Result<Credential>;
}

/// PKCE code verifier and its S256 challenge
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    pub verifier: String,
    pub challenge: String,
}

impl PkceChallenge {
    /// Generate a random 43-character verifier and its challenge
    pub fn generate() -> Self {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        let verifier = URL_SAFE_NO_PAD.encode(random_bytes);
        let challenge = Self::compute_challenge(&verifier);
        Self { verifier, challenge }
    }

    fn compute_challenge(verifier: &str) -> String {
        let hash = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hash)
    }
}

fn random_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(30)
        .map(char::from)
        .collect()
}

/// Query parameters Google appends to the redirect URI
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

impl CallbackParams {
    /// Validate the callback against the state we sent and extract the code
    pub fn into_code(self, expected_state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(AuthError::AuthorizationDenied { reason: error }.into());
        }
        if self.state.as_deref() != Some(expected_state) {
            return Err(AuthError::StateMismatch.into());
        }
        self.code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::NoAuthCode.into())
    }

    fn page(&self) -> &'static str {
        if self.code.is_some() && self.error.is_none() {
            "<html><body><h1>Authentication successful!</h1><p>You can close this window.</p></body></html>"
        } else {
            "<html><body><h1>Authentication failed</h1><p>No authorization code received.</p></body></html>"
        }
    }
}

/// Google's OAuth endpoints, driven over HTTP
pub struct GoogleOAuthFlow {
    http_client: reqwest::Client,
    config: Config,
}

impl GoogleOAuthFlow {
    /// Create a flow using the callback settings in `config`
    pub fn new(config: Config) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            config,
        }
    }

    /// Build the consent URL
    pub fn authorization_url(
        secrets: &ClientSecrets,
        scopes: &[String],
        redirect_uri: &str,
        state: &str,
        pkce: &PkceChallenge,
    ) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256&access_type=offline&include_granted_scopes=true&prompt=consent",
            secrets.auth_uri,
            urlencoding::encode(&secrets.client_id),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(&scopes.join(" ")),
            urlencoding::encode(state),
            pkce.challenge,
        )
    }

    /// Exchange an authorization code for a credential
    pub async fn exchange_code(
        &self,
        secrets: &ClientSecrets,
        code: &str,
        redirect_uri: &str,
        verifier: &str,
        scopes: &[String],
    ) -> Result<Credential> {
        let params = [
            ("client_id", secrets.client_id.as_str()),
            ("client_secret", secrets.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let response = self
            .http_client
            .post(&secrets.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchangeFailed {
                message: format!("{}: {}", status, text),
            }
            .into());
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(Credential::from_token_response(token_response, secrets, scopes))
    }

    /// Serve the redirect URI until Google calls it once
    async fn wait_for_callback(listener: tokio::net::TcpListener) -> Result<CallbackParams> {
        let (tx, rx) = oneshot::channel::<CallbackParams>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let callback_handler = move |Query(params): Query<CallbackParams>| async move {
            let page = params.page();
            if let Some(tx) = tx.lock().ok().and_then(|mut slot| slot.take()) {
                let _ = tx.send(params);
            }
            Html(page)
        };

        let app = Router::new().route("/", get(callback_handler));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        // The sender lives in the router; if the server dies first it is dropped.
        let params = rx.await;
        let _ = shutdown_tx.send(());

        match params {
            Ok(params) => Ok(params),
            Err(_) => {
                let message = match server.await {
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => e.to_string(),
                    Ok(Ok(())) => "callback listener stopped".to_string(),
                };
                Err(AuthError::CallbackError { message }.into())
            }
        }
    }

    /// Bind the redirect listener and build the consent URL
    pub async fn start(&self, secrets: &ClientSecrets, scopes: &[String]) -> Result<PendingAuthorization> {
        let host = self.config.oauth_callback_host.as_str();
        let port = self.config.oauth_callback_port;
        let listener = tokio::net::TcpListener::bind((host, port)).await.map_err(|e| AuthError::CallbackError {
            message: format!("cannot listen on {}:{}: {}", host, port, e),
        })?;
        let redirect_uri = self.config.redirect_uri(listener.local_addr()?.port());

        let state = random_state();
        let pkce = PkceChallenge::generate();
        let auth_url = Self::authorization_url(secrets, scopes, &redirect_uri, &state, &pkce);

        Ok(PendingAuthorization {
            listener,
            redirect_uri,
            state,
            pkce,
            auth_url,
        })
    }

    /// Wait for the redirect, check it and exchange the code
    pub async fn complete(
        &self,
        pending: PendingAuthorization,
        secrets: &ClientSecrets,
        scopes: &[String],
    ) -> Result<Credential> {
        let PendingAuthorization {
            listener,
            redirect_uri,
            state,
            pkce,
            ..
        } = pending;

        tracing::info!("Waiting for authorization callback on {}", redirect_uri);
        let code = match Self::wait_for_callback(listener).await.and_then(|p| p.into_code(&state)) {
            Ok(code) => code,
            Err(e) => {
                tracing::error!("Error during authentication flow: {}", e);
                return Err(e);
            }
        };

        let credential = self
            .exchange_code(secrets, &code, &redirect_uri, &pkce.verifier, scopes)
            .await?;
        tracing::info!("Authentication flow completed successfully");
        Ok(credential)
    }
}

/// An authorization request waiting for Google to call the redirect URI
pub struct PendingAuthorization {
    listener: tokio::net::TcpListener,
    redirect_uri: String,
    state: String,
    pkce: PkceChallenge,
    auth_url: String,
}

impl PendingAuthorization {
    /// URL the user has to open
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Redirect URI the listener answers on
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// `state` value the callback must echo back
    pub fn state(&self) -> &str {
        &self.state
    }
}

#[async_trait]
impl AuthorizationFlow for GoogleOAuthFlow {
    async fn refresh(&self, credential: &Credential) -> Result<Credential> {
        let refresh_token = credential
            .refresh_token
            .as_deref()
            .ok_or(AuthError::NoRefreshToken)?;

        let params = [
            ("client_id", credential.client_id.as_str()),
            ("client_secret", credential.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&credential.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenRefreshFailed {
                message: format!("{}: {}", status, text),
            }
            .into());
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(credential.refreshed(token_response))
    }

    async fn authorize(&self, secrets: &ClientSecrets, scopes: &[String]) -> Result<Credential> {
        let pending = self.start(secrets, scopes).await?;

        eprintln!("\nPlease visit this URL to authorize this application:");
        eprintln!("{}\n", pending.auth_url());

        if self.config.open_browser {
            if let Err(e) = open::that(pending.auth_url()) {
                tracing::warn!("Could not open browser automatically: {}", e);
            }
        }

        self.complete(pending, secrets, scopes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> ClientSecrets {
        ClientSecrets {
            client_id: "client id".to_string(),
            client_secret: "secret".to_string(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uris: vec![],
        }
    }

    #[test]
    fn test_pkce_challenge() {
        let pkce = PkceChallenge::generate();
        assert_eq!(pkce.verifier.len(), 43);
        assert_eq!(pkce.challenge, PkceChallenge::compute_challenge(&pkce.verifier));
        // RFC 7636 appendix B
        assert_eq!(
            PkceChallenge::compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_authorization_url() {
        let pkce = PkceChallenge::generate();
        let url = GoogleOAuthFlow::authorization_url(
            &secrets(),
            &["https://mail.google.com/".to_string()],
            "http://localhost:8080",
            "xyz",
            &pkce,
        );
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?response_type=code"));
        assert!(url.contains("client_id=client%20id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080&"));
        assert!(url.contains("scope=https%3A%2F%2Fmail.google.com%2F"));
        assert!(url.contains("state=xyz"));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("access_type=offline"));
        assert!(url.contains("include_granted_scopes=true"));
    }

    #[test]
    fn test_callback_params() {
        let ok = CallbackParams {
            code: Some("4/abc".to_string()),
            state: Some("s1".to_string()),
            error: None,
        };
        assert_eq!(ok.into_code("s1").unwrap(), "4/abc");

        let denied = CallbackParams {
            error: Some("access_denied".to_string()),
            state: Some("s1".to_string()),
            ..Default::default()
        };
        assert!(denied.into_code("s1").unwrap_err().to_string().contains("access_denied"));

        let forged = CallbackParams {
            code: Some("4/abc".to_string()),
            state: Some("other".to_string()),
            error: None,
        };
        assert!(matches!(
            forged.into_code("s1"),
            Err(crate::error::GoogleMcpError::Auth(AuthError::StateMismatch))
        ));

        let empty = CallbackParams {
            state: Some("s1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            empty.into_code("s1"),
            Err(crate::error::GoogleMcpError::Auth(AuthError::NoAuthCode))
        ));
    }

    #[test]
    fn test_random_state() {
        let a = random_state();
        assert_eq!(a.len(), 30);
        assert_ne!(a, random_state());
    }
}
