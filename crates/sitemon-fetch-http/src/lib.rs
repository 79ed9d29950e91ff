// # HTTP Retrieval Strategies
//
// This crate provides the network side of the sitemap monitor's fetcher.
//
// ## Purpose
//
// Sitemaps are often served behind bot protection or CORS restrictions, so
// a single request path is not reliable. Two strategies are provided:
// - `DirectStrategy`: GET the sitemap URL itself
// - `ProxyStrategy`: GET it through a URL-templated public proxy
//
// `build_fetcher` turns a `FetchConfig` into a `DocumentFetcher` trying the
// direct path first and then every proxy in order.
//
// ## Timeouts
//
// Every attempt is bounded by `FetchConfig::timeout_secs`; a hung proxy only
// delays the next strategy, it never stalls a check.

use sitemon_core::config::{FetchConfig, ProxyConfig};
use sitemon_core::traits::RetrievalStrategy;
use sitemon_core::{DocumentFetcher, Error, Result};

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

/// Build the shared HTTP client for all strategies
///
/// Requests accept any content type and identify as the sitemap monitor.
pub fn build_client(config: &FetchConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .build()
        .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))
}

/// Build a fetcher with the configured direct and proxy strategies
pub fn build_fetcher(config: &FetchConfig) -> Result<DocumentFetcher> {
    config.validate()?;
    let client = build_client(config)?;

    let mut strategies: Vec<Box<dyn RetrievalStrategy>> = Vec::new();
    if config.direct {
        strategies.push(Box::new(DirectStrategy::new(client.clone())));
    }
    for proxy in &config.proxies {
        strategies.push(Box::new(ProxyStrategy::new(proxy, client.clone())));
    }

    tracing::debug!(
        strategies = strategies.len(),
        timeout_secs = config.timeout_secs,
        "Built sitemap fetcher"
    );
    Ok(DocumentFetcher::new(strategies))
}

/// GET `request_url` and return the body of a successful response
async fn get_text(client: &reqwest::Client, request_url: &str) -> Result<String> {
    let response = client
        .get(request_url)
        .send()
        .await
        .map_err(|e| Error::fetch(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(Error::fetch(format!("HTTP error! status: {}", response.status().as_u16())));
    }

    response
        .text()
        .await
        .map_err(|e| Error::fetch(format!("Failed to read response: {}", e)))
}

/// Fetch the sitemap URL itself
pub struct DirectStrategy {
    client: reqwest::Client,
}

impl DirectStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for DirectStrategy {
    async fn retrieve(&self, url: &str) -> Result<String> {
        tracing::trace!(url, "Direct fetch");
        get_text(&self.client, url).await
    }

    fn name(&self) -> &str {
        "direct"
    }
}

/// Fetch the sitemap through a URL-templated proxy
pub struct ProxyStrategy {
    name: String,
    template: String,
    client: reqwest::Client,
}

impl ProxyStrategy {
    pub fn new(config: &ProxyConfig, client: reqwest::Client) -> Self {
        Self {
            name: config.name.clone(),
            template: config.template.clone(),
            client,
        }
    }

    /// The proxy request URL for `target`
    pub fn request_url(&self, target: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
        self.template.replace("{url}", &encoded)
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for ProxyStrategy {
    async fn retrieve(&self, url: &str) -> Result<String> {
        let request_url = self.request_url(url);
        tracing::trace!(proxy = %self.name, url, request_url = %request_url, "Proxy fetch");
        get_text(&self.client, &request_url).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitemon_core::config::ResolverConfig;
    use sitemon_core::SitemapResolver;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://example.com/page1</loc><lastmod>2024-01-15</lastmod></url>
        </urlset>"#;

    fn config_with_proxy(server: &MockServer, direct: bool) -> FetchConfig {
        FetchConfig {
            timeout_secs: 5,
            direct,
            proxies: vec![ProxyConfig::new("local", format!("{}/raw?url={{url}}", server.uri()))],
            ..FetchConfig::default()
        }
    }

    #[test]
    fn test_proxy_request_url_encodes_target() {
        let client = reqwest::Client::new();
        let proxy = ProxyStrategy::new(
            &ProxyConfig::new("allorigins", "https://api.allorigins.win/raw?url={url}"),
            client,
        );

        assert_eq!(
            proxy.request_url("https://example.com/sitemap.xml?page=2"),
            "https://api.allorigins.win/raw?url=https%3A%2F%2Fexample.com%2Fsitemap.xml%3Fpage%3D2"
        );
    }

    #[test]
    fn test_build_fetcher_orders_direct_then_proxies() {
        let fetcher = build_fetcher(&FetchConfig::default()).unwrap();
        assert_eq!(
            fetcher.strategy_names(),
            vec!["direct", "allorigins", "corsproxy", "codetabs"]
        );

        let proxies_only = FetchConfig {
            direct: false,
            ..FetchConfig::default()
        };
        assert_eq!(build_fetcher(&proxies_only).unwrap().strategy_names().len(), 3);
    }

    #[test]
    fn test_build_fetcher_rejects_empty_path_list() {
        let config = FetchConfig {
            direct: false,
            proxies: Vec::new(),
            ..FetchConfig::default()
        };
        assert!(matches!(build_fetcher(&config), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_direct_fetch_sends_identifying_headers() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .and(header("accept", "*/*"))
            .and(header("user-agent", "Mozilla/5.0 (compatible; SitemapMonitor/1.0)"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(URLSET)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = build_fetcher(&config_with_proxy(&mock_server, true)).unwrap();
        let body = fetcher
            .fetch(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap();
        assert!(body.contains("https://example.com/page1"));
    }

    #[tokio::test]
    async fn test_server_error_falls_back_to_proxy() {
        let mock_server = MockServer::start().await;
        let target = format!("{}/sitemap.xml", mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw"))
            .and(query_param("url", target.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string(URLSET))
            .expect(1)
            .mount(&mock_server)
            .await;

        let fetcher = build_fetcher(&config_with_proxy(&mock_server, true)).unwrap();
        let body = fetcher.fetch(&target).await.unwrap();
        assert!(body.contains("<urlset"));
    }

    #[tokio::test]
    async fn test_html_challenge_page_falls_back_to_proxy() {
        let mock_server = MockServer::start().await;
        let target = format!("{}/sitemap.xml", mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<!DOCTYPE html><html><body>Checking your browser</body></html>"),
            )
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw"))
            .respond_with(ResponseTemplate::new(200).set_body_string(URLSET))
            .mount(&mock_server)
            .await;

        let fetcher = build_fetcher(&config_with_proxy(&mock_server, true)).unwrap();
        assert!(fetcher.fetch(&target).await.unwrap().contains("<urlset"));
    }

    #[tokio::test]
    async fn test_all_paths_failing_reports_last_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let fetcher = build_fetcher(&config_with_proxy(&mock_server, true)).unwrap();
        let err = fetcher
            .fetch(&format!("{}/sitemap.xml", mock_server.uri()))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Fetch error: Failed to fetch sitemap: HTTP error! status: 503"
        );
    }

    #[tokio::test]
    async fn test_resolves_index_over_http() {
        let mock_server = MockServer::start().await;
        let index_xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <sitemap><loc>{0}/sitemap-1.xml</loc></sitemap>
              <sitemap><loc>{0}/sitemap-2.xml</loc></sitemap>
            </sitemapindex>"#,
            mock_server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/sitemap_index.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_xml))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap-1.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(URLSET))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sitemap-2.xml"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let config = FetchConfig {
            timeout_secs: 5,
            proxies: Vec::new(),
            ..FetchConfig::default()
        };
        let resolver =
            SitemapResolver::new(build_fetcher(&config).unwrap(), &ResolverConfig::default()).unwrap();
        let resolution = resolver
            .resolve(&format!("{}/sitemap_index.xml", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(resolution.records.len(), 1);
        assert_eq!(resolution.records[0].location, "https://example.com/page1");
        assert_eq!(resolution.failures.len(), 1);
        assert!(resolution.failures[0].location.ends_with("/sitemap-2.xml"));
    }
}
