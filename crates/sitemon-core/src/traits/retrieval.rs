// # Retrieval Strategy Trait
//
// Defines one way of getting the raw text behind a sitemap URL.
//
// ## Implementations
//
// - Direct HTTP fetch: `sitemon-fetch-http` crate
// - URL-templated CORS proxies: `sitemon-fetch-http` crate
//
// Strategies are composed by `DocumentFetcher`, which tries them in order and
// owns the "does this look like a sitemap" validation. A strategy only
// reports transport-level success or failure.

use async_trait::async_trait;

/// Trait for retrieval strategy implementations
///
/// # Contract
///
/// - `Ok(body)` only for a successful response; the body is returned as-is
/// - `Err(Error::Fetch)` for network failures and non-success statuses
/// - No retries, no caching: one call is one attempt
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Retrieve the document at `url`
    async fn retrieve(&self, url: &str) -> Result<String, crate::Error>;

    /// Short name used in logs (e.g. "direct", "corsproxy")
    fn name(&self) -> &str;
}
