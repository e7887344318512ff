//! Google account module
//!
//! Scopes, stored credentials, the OAuth flows and the token lifecycle.

pub mod auth;
pub mod credentials;
pub mod flow;
pub mod scope;
pub mod store;
