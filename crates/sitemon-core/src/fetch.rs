//! XML document fetcher
//!
//! [`DocumentFetcher`] walks an ordered list of [`RetrievalStrategy`]s and
//! returns the first body that looks like sitemap XML. Proxies and error
//! pages often answer `200 OK` with HTML, so a successful response whose body
//! fails [`looks_like_sitemap`] is treated like a failed attempt.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::traits::RetrievalStrategy;

/// Whether `text` plausibly is a sitemap document
///
/// True when it carries an XML declaration or one of the two sitemap root
/// tags, and is not an HTML page.
pub fn looks_like_sitemap(text: &str) -> bool {
    (text.contains("<?xml") || text.contains("<urlset") || text.contains("<sitemapindex"))
        && !text.contains("<!DOCTYPE html>")
}

/// Ordered fallback over retrieval strategies
pub struct DocumentFetcher {
    strategies: Vec<Box<dyn RetrievalStrategy>>,
}

impl DocumentFetcher {
    /// Create a fetcher trying `strategies` in order
    pub fn new(strategies: Vec<Box<dyn RetrievalStrategy>>) -> Self {
        Self { strategies }
    }

    /// Names of the configured strategies, in attempt order
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Fetch the raw sitemap text behind `url`
    ///
    /// # Errors
    ///
    /// `Error::Fetch` when no strategy produced a valid body. The message
    /// carries the last strategy error, or a generic message when every
    /// attempt answered but none with sitemap content.
    pub async fn fetch(&self, url: &str) -> Result<String> {
        let mut last_error: Option<Error> = None;

        for strategy in &self.strategies {
            match strategy.retrieve(url).await {
                Ok(text) if looks_like_sitemap(&text) => {
                    debug!(strategy = strategy.name(), url, bytes = text.len(), "Fetched sitemap");
                    return Ok(text);
                }
                Ok(_) => {
                    warn!(
                        strategy = strategy.name(),
                        url, "Response is not sitemap XML, trying next path"
                    );
                }
                Err(e) => {
                    warn!(strategy = strategy.name(), url, error = %e, "Fetch attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => Error::fetch(format!("Failed to fetch sitemap: {}", strip_fetch_prefix(&e))),
            None => Error::fetch("Failed to fetch sitemap: All fetch attempts failed"),
        })
    }
}

/// Message without the "Fetch error: " display prefix
fn strip_fetch_prefix(err: &Error) -> String {
    match err {
        Error::Fetch(msg) => msg.clone(),
        other => other.to_string(),
    }
}
