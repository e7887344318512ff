//! Error types for the Google MCP Server
//!
//! Configuration and authorization failures are fatal for the call that hit
//! them; Gmail API failures are surfaced verbatim. Nothing here is retried.

use thiserror::Error;

/// Main error type for the Google MCP Server
#[derive(Error, Debug)]
pub enum GoogleMcpError {
    /// Setup problems the operator has to fix
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Refresh or interactive authorization failures
    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    /// Gmail API errors
    #[error("Gmail API error: {0}")]
    Api(#[from] ApiError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "client secrets file not found: {path}. Download the OAuth client JSON \
         (Desktop app) from the Google Cloud Console and save it there, or point \
         GOOGLE_CLIENT_SECRETS_FILE at it"
    )]
    ClientSecretsNotFound { path: String },

    #[error("invalid client secrets file {path}: {message}")]
    InvalidClientSecrets { path: String, message: String },

    #[error(
        "no token file at {token_path} and no client secrets at {secrets_path}; \
         place credentials.json there or run `google-mcp-server auth`"
    )]
    NoCredentialSource {
        token_path: String,
        secrets_path: String,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// OAuth authorization errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Failed to refresh access token: {message}")]
    TokenRefreshFailed { message: String },

    #[error("Credential has no refresh token")]
    NoRefreshToken,

    #[error("Authorization was denied: {reason}")]
    AuthorizationDenied { reason: String },

    #[error("OAuth callback error: {message}")]
    CallbackError { message: String },

    #[error("OAuth callback state did not match the authorization request")]
    StateMismatch,

    #[error("No authorization code provided")]
    NoAuthCode,

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed { message: String },

    #[error("Credential is expired or has no access token")]
    InvalidCredential,
}

/// Gmail API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("API request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid email address: {email}")]
    InvalidEmail { email: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid parameter: {name} - {message}")]
    InvalidParameter { name: String, message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid tool arguments: {message}")]
    InvalidArguments { message: String },
}

/// Result type alias for Google MCP operations
pub type Result<T> = std::result::Result<T, GoogleMcpError>;
