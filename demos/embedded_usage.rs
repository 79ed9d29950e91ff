//! Minimal embedding example for sitemon-core
//!
//! This example demonstrates using sitemon-core as a library in a custom
//! application: an in-process retrieval strategy stands in for the network,
//! a stdout notifier stands in for e-mail, and the memory store keeps the
//! snapshots. The application drives every check itself.

use sitemon_core::config::{EngineConfig, ResolverConfig};
use sitemon_core::model::ChangeSet;
use sitemon_core::traits::{Notifier, RetrievalStrategy};
use sitemon_core::{
    DocumentFetcher, Error, MemoryMonitorStore, MonitorEngine, ProcessLog, Result,
    SitemapResolver,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Serves sitemaps from memory, keyed by URL
#[derive(Clone, Default)]
struct InMemorySite {
    pages: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySite {
    fn publish(&self, url: &str, body: String) {
        if let Ok(mut pages) = self.pages.write() {
            pages.insert(url.to_string(), body);
        }
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for InMemorySite {
    async fn retrieve(&self, url: &str) -> Result<String> {
        self.pages
            .read()
            .map_err(|_| Error::fetch("site lock poisoned"))?
            .get(url)
            .cloned()
            .ok_or_else(|| Error::fetch(format!("HTTP error! status: 404 ({})", url)))
    }

    fn name(&self) -> &str {
        "in-memory"
    }
}

/// Prints change summaries
struct ConsoleNotifier;

#[async_trait::async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, changes: &ChangeSet, site_url: &str) -> Result<bool> {
        println!("  changes on {}:", site_url);
        for record in &changes.added {
            println!("    + {}", record.location);
        }
        for record in &changes.modified {
            println!("    ~ {}", record.location);
        }
        for record in &changes.removed {
            println!("    - {}", record.location);
        }
        Ok(true)
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

fn urlset(entries: &[(&str, &str)]) -> String {
    let body: String = entries
        .iter()
        .map(|(loc, lastmod)| format!("<url><loc>{}</loc><lastmod>{}</lastmod></url>", loc, lastmod))
        .collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><urlset>{}</urlset>"#, body)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    const INDEX: &str = "https://blog.example/sitemap_index.xml";
    const POSTS: &str = "https://blog.example/post-sitemap.xml";
    const PAGES: &str = "https://blog.example/page-sitemap.xml";

    let site = InMemorySite::default();
    site.publish(
        INDEX,
        format!(
            r#"<?xml version="1.0"?><sitemapindex><sitemap><loc>{}</loc></sitemap><sitemap><loc>{}</loc></sitemap></sitemapindex>"#,
            POSTS, PAGES
        ),
    );
    site.publish(
        POSTS,
        urlset(&[
            ("https://blog.example/hello-world", "2024-01-01"),
            ("https://blog.example/second-post", "2024-01-10"),
        ]),
    );
    site.publish(PAGES, urlset(&[("https://blog.example/about", "2023-12-01")]));

    let resolver = SitemapResolver::new(
        DocumentFetcher::new(vec![Box::new(site.clone())]),
        &ResolverConfig::default(),
    )?;
    let (engine, _events) = MonitorEngine::new(
        resolver,
        Box::new(MemoryMonitorStore::new()),
        Some(Box::new(ConsoleNotifier)),
        EngineConfig::default(),
    )?;

    let monitor = engine.add_monitor(INDEX, Some(60)).await?;

    println!("First check:");
    let mut log = ProcessLog::new();
    engine.check_monitor(&monitor, &mut log).await?;
    for line in log.lines() {
        println!("  {}", line);
    }

    // The blog publishes a post and edits another
    site.publish(
        POSTS,
        urlset(&[
            ("https://blog.example/second-post", "2024-02-02"),
            ("https://blog.example/third-post", "2024-02-01"),
        ]),
    );

    println!("Second check:");
    let mut log = ProcessLog::new();
    let report = engine.check_monitor(&monitor, &mut log).await?;
    for line in log.lines() {
        println!("  {}", line);
    }

    if let Some(changes) = report.changes {
        println!("Summary: {}", changes.summary().join(", "));
    }

    Ok(())
}
