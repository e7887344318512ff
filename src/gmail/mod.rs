//! Gmail API module
//!
//! Contains types, the service handle and body cleaning for the Gmail API.

pub mod cleaner;
pub mod client;
pub mod types;
pub mod utils;
