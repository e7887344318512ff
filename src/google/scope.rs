//! Google API permission scopes

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Google API scopes this server can request.
///
/// Serialized as the scope URI; the upper-case name is accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Scope {
    /// Full Gmail access
    #[serde(rename = "https://mail.google.com/", alias = "GMAIL")]
    Gmail,

    /// Full Calendar access
    #[serde(rename = "https://www.googleapis.com/auth/calendar", alias = "CALENDAR")]
    Calendar,

    /// Calendar events only
    #[serde(
        rename = "https://www.googleapis.com/auth/calendar.events",
        alias = "CALENDAR_EVENTS"
    )]
    CalendarEvents,
}

impl Scope {
    /// All known scopes
    pub const ALL: [Scope; 3] = [Scope::Gmail, Scope::Calendar, Scope::CalendarEvents];

    /// The scope URI sent to Google
    pub fn uri(&self) -> &'static str {
        match self {
            Scope::Gmail => "https://mail.google.com/",
            Scope::Calendar => "https://www.googleapis.com/auth/calendar",
            Scope::CalendarEvents => "https://www.googleapis.com/auth/calendar.events",
        }
    }

    /// Upper-case constant name
    pub fn name(&self) -> &'static str {
        match self {
            Scope::Gmail => "GMAIL",
            Scope::Calendar => "CALENDAR",
            Scope::CalendarEvents => "CALENDAR_EVENTS",
        }
    }

    /// Parse either a scope URI or a constant name (case-insensitive)
    pub fn parse(value: &str) -> Option<Scope> {
        Self::ALL
            .into_iter()
            .find(|s| s.uri() == value || s.name().eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// Resolve requested scopes to URIs, using `defaults` when nothing was asked for
pub fn resolve_scopes(requested: &[Scope], defaults: &[Scope]) -> Vec<String> {
    let scopes = if requested.is_empty() { defaults } else { requested };

    let mut uris: Vec<String> = Vec::with_capacity(scopes.len());
    for scope in scopes {
        let uri = scope.uri().to_string();
        if !uris.contains(&uri) {
            uris.push(uri);
        }
    }
    uris
}
