//! Message body cleaning
//!
//! HTML stripping is an optional capability (cargo feature `html-cleaning`).
//! Without it bodies are returned as received.

use std::sync::Arc;

/// Turns a raw message body into agent-friendly text
pub trait BodyCleaner: Send + Sync {
    /// Clean `body`. Never fails; worst case the input comes back unchanged.
    fn clean(&self, body: &str) -> String;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Strips markup, keeping only text nodes
#[cfg(feature = "html-cleaning")]
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlBodyCleaner;

#[cfg(feature = "html-cleaning")]
impl BodyCleaner for HtmlBodyCleaner {
    fn clean(&self, body: &str) -> String {
        let fragment = scraper::Html::parse_fragment(body);
        fragment
            .root_element()
            .text()
            .collect::<String>()
            .trim()
            .to_string()
    }

    fn name(&self) -> &'static str {
        "html"
    }
}

/// Returns bodies untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct RawBodyCleaner;

impl BodyCleaner for RawBodyCleaner {
    fn clean(&self, body: &str) -> String {
        body.to_string()
    }

    fn name(&self) -> &'static str {
        "raw"
    }
}

/// Pick the best cleaner compiled into this binary
pub fn select_cleaner() -> Arc<dyn BodyCleaner> {
    #[cfg(feature = "html-cleaning")]
    {
        Arc::new(HtmlBodyCleaner)
    }

    #[cfg(not(feature = "html-cleaning"))]
    {
        tracing::warn!("HTML cleaning not available (built without `html-cleaning`). Skipping cleaning.");
        Arc::new(RawBodyCleaner)
    }
}
