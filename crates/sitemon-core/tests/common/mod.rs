//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that record how the engine
//! drives its collaborators.

#![allow(dead_code)]

use sitemon_core::config::{EngineConfig, ResolverConfig};
use sitemon_core::error::{Error, Result};
use sitemon_core::model::{ChangeSet, Monitor, MonitorUpdate, UrlRecord};
use sitemon_core::store::MemoryMonitorStore;
use sitemon_core::traits::{MonitorStore, Notifier, RetrievalStrategy};
use sitemon_core::{DocumentFetcher, EngineEvent, MonitorEngine, SitemapResolver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A retrieval strategy serving canned bodies by URL
///
/// Unknown URLs fail with an HTTP 404 style fetch error.
pub struct ScriptedStrategy {
    pages: Arc<Mutex<HashMap<String, String>>>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl ScriptedStrategy {
    pub fn new() -> Self {
        Self {
            pages: Arc::new(Mutex::new(HashMap::new())),
            requested: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Serve `body` for `url`, replacing any previous body
    pub fn serve(&self, url: &str, body: impl Into<String>) {
        self.pages.lock().unwrap().insert(url.to_string(), body.into());
    }

    /// Stop serving `url`
    pub fn forget(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }

    /// URLs requested so far, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    /// Create a new ScriptedStrategy that shares pages and history with an existing one
    pub fn sharing_pages_with(other: &Self) -> Self {
        Self {
            pages: Arc::clone(&other.pages),
            requested: Arc::clone(&other.requested),
        }
    }
}

#[async_trait::async_trait]
impl RetrievalStrategy for ScriptedStrategy {
    async fn retrieve(&self, url: &str) -> Result<String> {
        self.requested.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::fetch(format!("HTTP 404 for {}", url)))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// How a [`RecordingNotifier`] answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyMode {
    Handled,
    NotConfigured,
    Failing,
}

/// A notifier that records every change set it receives
pub struct RecordingNotifier {
    mode: NotifyMode,
    calls: Arc<Mutex<Vec<(String, ChangeSet)>>>,
}

impl RecordingNotifier {
    pub fn new(mode: NotifyMode) -> Self {
        Self {
            mode,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Recorded (site_url, changes) pairs
    pub fn calls(&self) -> Vec<(String, ChangeSet)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Create a new RecordingNotifier that shares its history with an existing one
    pub fn sharing_calls_with(other: &Self) -> Self {
        Self {
            mode: other.mode,
            calls: Arc::clone(&other.calls),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, changes: &ChangeSet, site_url: &str) -> Result<bool> {
        self.calls
            .lock()
            .unwrap()
            .push((site_url.to_string(), changes.clone()));
        match self.mode {
            NotifyMode::Handled => Ok(true),
            NotifyMode::NotConfigured => Ok(false),
            NotifyMode::Failing => Err(Error::notify("SMTP relay unavailable")),
        }
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// A MonitorStore over a shared memory store that counts writes
///
/// Snapshot saves can be made to fail to exercise the persisting stage.
pub struct MockMonitorStore {
    inner: MemoryMonitorStore,
    save_call_count: Arc<AtomicUsize>,
    update_call_count: Arc<AtomicUsize>,
    flush_call_count: Arc<AtomicUsize>,
    fail_saves: Arc<AtomicBool>,
}

impl MockMonitorStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryMonitorStore::new(),
            save_call_count: Arc::new(AtomicUsize::new(0)),
            update_call_count: Arc::new(AtomicUsize::new(0)),
            flush_call_count: Arc::new(AtomicUsize::new(0)),
            fail_saves: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the number of times save_snapshot() was called
    pub fn save_call_count(&self) -> usize {
        self.save_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times update_monitor() was called
    pub fn update_call_count(&self) -> usize {
        self.update_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times flush() was called
    pub fn flush_call_count(&self) -> usize {
        self.flush_call_count.load(Ordering::SeqCst)
    }

    /// Make subsequent save_snapshot() calls fail
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of snapshots held for a monitor
    pub async fn snapshot_count(&self, monitor_id: &str) -> usize {
        self.inner.snapshot_count(monitor_id).await
    }

    /// Create a new MockMonitorStore that shares data and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            inner: other.inner.clone(),
            save_call_count: Arc::clone(&other.save_call_count),
            update_call_count: Arc::clone(&other.update_call_count),
            flush_call_count: Arc::clone(&other.flush_call_count),
            fail_saves: Arc::clone(&other.fail_saves),
        }
    }
}

#[async_trait::async_trait]
impl MonitorStore for MockMonitorStore {
    async fn create_monitor(&self, url: &str, check_interval_minutes: u32) -> Result<Monitor> {
        self.inner.create_monitor(url, check_interval_minutes).await
    }

    async fn update_monitor(&self, id: &str, update: &MonitorUpdate) -> Result<()> {
        self.update_call_count.fetch_add(1, Ordering::SeqCst);
        self.inner.update_monitor(id, update).await
    }

    async fn delete_monitor(&self, id: &str) -> Result<()> {
        self.inner.delete_monitor(id).await
    }

    async fn get_monitor(&self, id: &str) -> Result<Option<Monitor>> {
        self.inner.get_monitor(id).await
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        self.inner.list_monitors().await
    }

    async fn save_snapshot(&self, monitor_id: &str, urls: Vec<UrlRecord>) -> Result<()> {
        self.save_call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::store("disk full"));
        }
        self.inner.save_snapshot(monitor_id, urls).await
    }

    async fn latest_snapshot(&self, monitor_id: &str) -> Result<Option<Vec<UrlRecord>>> {
        self.inner.latest_snapshot(monitor_id).await
    }

    async fn flush(&self) -> Result<()> {
        self.flush_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Engine settings suited to tests
pub fn test_engine_config() -> EngineConfig {
    EngineConfig {
        scheduler_batch_size: 10,
        tick_interval_secs: 1,
        default_check_interval_minutes: 60,
        event_channel_capacity: 100,
    }
}

/// Build an engine over shared test doubles
pub fn build_engine(
    strategy: &ScriptedStrategy,
    store: &MockMonitorStore,
    notifier: Option<&RecordingNotifier>,
    config: EngineConfig,
) -> (MonitorEngine, mpsc::Receiver<EngineEvent>) {
    let fetcher = DocumentFetcher::new(vec![Box::new(ScriptedStrategy::sharing_pages_with(
        strategy,
    ))]);
    let resolver =
        SitemapResolver::new(fetcher, &ResolverConfig::default()).expect("resolver config is valid");
    let notifier = notifier
        .map(|n| Box::new(RecordingNotifier::sharing_calls_with(n)) as Box<dyn Notifier>);

    MonitorEngine::new(
        resolver,
        Box::new(MockMonitorStore::sharing_counters_with(store)),
        notifier,
        config,
    )
    .expect("engine construction succeeds")
}

/// A urlset document from (loc, lastmod) pairs
pub fn urlset(entries: &[(&str, Option<&str>)]) -> String {
    let body: String = entries
        .iter()
        .map(|(loc, lastmod)| match lastmod {
            Some(lastmod) => format!("<url><loc>{}</loc><lastmod>{}</lastmod></url>", loc, lastmod),
            None => format!("<url><loc>{}</loc></url>", loc),
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        body
    )
}

/// A sitemap index document referencing `children`
pub fn sitemap_index(children: &[&str]) -> String {
    let body: String = children
        .iter()
        .map(|loc| format!("<sitemap><loc>{}</loc></sitemap>", loc))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</sitemapindex>"#,
        body
    )
}

/// Drain every event currently queued
pub fn drain_events(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
