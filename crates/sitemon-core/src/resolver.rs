//! Recursive sitemap resolution
//!
//! [`SitemapResolver`] turns a root sitemap URL into one flat sequence of
//! [`UrlRecord`]s. Sitemap indexes are followed through the same entry point,
//! so nesting depth is bounded only by `ResolverConfig::max_depth`. An index
//! that lists one of its own ancestors is reported as a failed child instead
//! of being fetched again.
//!
//! ## Fan-out
//!
//! Children of an index are resolved in fixed-size batches. Resolutions in a
//! batch run concurrently and all settle before the next batch starts, so at
//! most `batch_size` requests hit the target host at once. A failing child is
//! recorded in [`Resolution::failures`] and never aborts its siblings.

use futures::future::{BoxFuture, FutureExt, join_all};
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use crate::fetch::DocumentFetcher;
use crate::model::UrlRecord;
use crate::parser::{self, SitemapDocument};

/// A child sitemap that could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChildFailure {
    /// Location of the child sitemap
    pub location: String,
    /// Why it failed
    pub message: String,
}

/// Outcome of resolving one root sitemap
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// All records, in batch order then document order
    pub records: Vec<UrlRecord>,
    /// Children skipped along the way, at any depth
    pub failures: Vec<ChildFailure>,
}

/// Resolves sitemap URLs (including indexes) into URL records
pub struct SitemapResolver {
    fetcher: DocumentFetcher,
    batch_size: usize,
    max_depth: usize,
}

impl SitemapResolver {
    /// Create a resolver over `fetcher`
    pub fn new(fetcher: DocumentFetcher, config: &ResolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fetcher,
            batch_size: config.batch_size,
            max_depth: config.max_depth,
        })
    }

    /// Resolve `url` into a flat record sequence
    ///
    /// # Errors
    ///
    /// `Error::Resolve` when the URL is not absolute, when the root document
    /// cannot be fetched or parsed, or when an index yields no URLs at all.
    pub async fn resolve(&self, url: &str) -> Result<Resolution> {
        validate_url(url)?;
        info!(url, "Resolving sitemap");

        let resolution = self.resolve_node(url.to_string(), Vec::new()).await?;
        if !resolution.failures.is_empty() {
            warn!(
                url,
                failed = resolution.failures.len(),
                "Resolved sitemap with skipped children"
            );
        }
        Ok(resolution)
    }

    /// `ancestors` holds the indexes on the path from the root to `url`
    fn resolve_node(&self, url: String, ancestors: Vec<String>) -> BoxFuture<'_, Result<Resolution>> {
        async move {
            let depth = ancestors.len();
            if depth > 0 {
                validate_url(&url)?;
            }
            if ancestors.contains(&url) {
                return Err(Error::resolve(format!(
                    "Failed to fetch sitemap: sitemap index cycles back to {}",
                    url
                )));
            }
            if depth > self.max_depth {
                return Err(Error::resolve(format!(
                    "Failed to fetch sitemap: index nesting exceeds maximum depth ({})",
                    self.max_depth
                )));
            }

            debug!(url = %url, depth, "Fetching sitemap");
            let text = self.fetcher.fetch(&url).await.map_err(wrap)?;

            match parser::parse(&text).map_err(wrap)? {
                SitemapDocument::Urlset(records) => {
                    debug!(url = %url, count = records.len(), "Parsed urlset");
                    Ok(Resolution {
                        records,
                        failures: Vec::new(),
                    })
                }
                SitemapDocument::Index(children) => {
                    debug!(url = %url, children = children.len(), "Parsed sitemap index");
                    let mut path = ancestors;
                    path.push(url);
                    self.resolve_children(children, path).await
                }
            }
        }
        .boxed()
    }

    async fn resolve_children(&self, children: Vec<String>, path: Vec<String>) -> Result<Resolution> {
        let mut resolution = Resolution::default();

        for batch in children.chunks(self.batch_size) {
            let results = join_all(
                batch
                    .iter()
                    .map(|child| self.resolve_node(child.clone(), path.clone())),
            )
            .await;

            for (location, result) in batch.iter().zip(results) {
                match result {
                    Ok(child) => {
                        resolution.records.extend(child.records);
                        resolution.failures.extend(child.failures);
                    }
                    Err(e) => {
                        warn!(child = %location, error = %e, "Failed to resolve child sitemap");
                        resolution.failures.push(ChildFailure {
                            location: location.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        if resolution.records.is_empty() {
            return Err(Error::resolve(
                "Failed to fetch sitemap: No valid URLs found in any of the sitemaps",
            ));
        }
        Ok(resolution)
    }
}

fn validate_url(url: &str) -> Result<()> {
    match url::Url::parse(url) {
        Ok(parsed) if parsed.has_host() => Ok(()),
        _ => Err(Error::resolve(format!(
            "Failed to fetch sitemap: Invalid URL format: {}",
            url
        ))),
    }
}

/// Re-wrap a fetch/parse failure with resolver context
fn wrap(err: Error) -> Error {
    match err {
        Error::Resolve(_) => err,
        Error::Fetch(msg) => Error::resolve(msg),
        other => Error::resolve(format!("Failed to fetch sitemap: {}", other)),
    }
}
