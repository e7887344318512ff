//! Google MCP Server Library
//!
//! A Model Context Protocol (MCP) server exposing a Google account and its
//! Gmail mailbox as tools: OAuth login with a persisted, auto-refreshed
//! token, message search, sending and replying.

pub mod config;
pub mod error;
pub mod gmail;
pub mod google;
pub mod mcp;

pub use config::Config;
pub use error::{GoogleMcpError, Result};
