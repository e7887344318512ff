//! Google MCP Server - Rust Implementation
//!
//! A Model Context Protocol (MCP) server for a Google account and Gmail.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use google_mcp_server_rust::config::Config;
use google_mcp_server_rust::gmail::cleaner::select_cleaner;
use google_mcp_server_rust::google::auth::TokenManager;
use google_mcp_server_rust::google::scope::Scope;
use google_mcp_server_rust::mcp::server::McpServer;
use google_mcp_server_rust::mcp::tools::{ToolHandler, Toolset};

/// Google MCP Server
#[derive(Parser)]
#[command(name = "google-mcp-server")]
#[command(author, version, about = "Google MCP Server - A Model Context Protocol server for Google account and Gmail tools")]
struct Cli {
    /// Token file (overrides GOOGLE_TOKEN_FILE)
    #[arg(long, global = true)]
    token_file: Option<PathBuf>,

    /// OAuth client secrets file (overrides GOOGLE_CLIENT_SECRETS_FILE)
    #[arg(long, global = true)]
    client_secrets: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the MCP server on stdio (default)
    Serve {
        /// Tools to expose
        #[arg(long, value_enum, default_value_t = Toolset::All)]
        tools: Toolset,
    },

    /// Authenticate with Google and store the token
    Auth {
        /// Scope name or URI (GMAIL, CALENDAR, CALENDAR_EVENTS); repeatable
        #[arg(long = "scope", value_parser = parse_scope)]
        scopes: Vec<Scope>,
    },

    /// Show whether a usable token is stored
    Status,
}

fn parse_scope(value: &str) -> std::result::Result<Scope, String> {
    Scope::parse(value).ok_or_else(|| format!("unknown scope '{}'", value))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(token_file) = cli.token_file {
        config.token_path = token_file;
    }
    if let Some(client_secrets) = cli.client_secrets {
        config.client_secrets_path = client_secrets;
    }

    config.validate().context("Invalid configuration")?;

    match cli.command {
        Some(Commands::Auth { scopes }) => run_auth(config, &scopes).await,
        Some(Commands::Status) => run_status(config).await,
        Some(Commands::Serve { tools }) => run_server(config, tools).await,
        None => run_server(config, Toolset::All).await,
    }
}

async fn run_auth(config: Config, scopes: &[Scope]) -> anyhow::Result<()> {
    let manager = TokenManager::new(config);
    manager
        .acquire(scopes)
        .await
        .context("Authentication failed")?;

    eprintln!(
        "Authentication completed successfully! Token saved to {}",
        manager.store().path().display()
    );
    Ok(())
}

async fn run_status(config: Config) -> anyhow::Result<()> {
    let manager = TokenManager::new(config);
    let path = manager.store().path().display().to_string();

    if !manager.has_token() {
        println!("No token file at {}", path);
        return Ok(());
    }

    let scopes = manager.resolve(&[]);
    match manager.store().load(&scopes).await {
        Some(credential) if credential.is_valid_for(&scopes) => {
            let expiry = credential
                .expiry
                .map(|e| e.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            println!("Token at {} is valid (expires {})", path, expiry);
        }
        Some(credential) if credential.has_scopes(&scopes) && credential.refresh_token.is_some() => {
            println!("Token at {} is expired; it will be refreshed on next use", path);
        }
        Some(_) => println!("Token at {} is not usable; run `auth` again", path),
        None => println!("Token at {} could not be read; run `auth` again", path),
    }
    Ok(())
}

async fn run_server(config: Config, toolset: Toolset) -> anyhow::Result<()> {
    config
        .check_credential_sources()
        .context("Cannot start the server")?;

    let cleaner = select_cleaner();
    tracing::info!(
        "Starting {} server (body cleaner: {})",
        toolset.server_name(),
        cleaner.name()
    );

    let manager = Arc::new(TokenManager::new(config));
    let tool_handler = ToolHandler::new(manager, cleaner, toolset);

    let mut server = McpServer::new(tool_handler);
    server.run_stdio().await.context("Server stopped with an error")?;

    Ok(())
}
