//! Snapshot orchestration
//!
//! The MonitorEngine is responsible for:
//! - Resolving a monitor's sitemap via the SitemapResolver
//! - Diffing it against the latest stored snapshot
//! - Dispatching change notifications via the Notifier
//! - Persisting snapshots and check timestamps via the MonitorStore
//!
//! ## Architecture
//!
//! ```text
//!                       ┌────────────────┐
//!                       │ MonitorEngine  │
//!                       └────────────────┘
//!                               │
//!     ┌──────────────┬──────────┴───┬───────────────┬─────────────┐
//!     ▼              ▼              ▼               ▼             ▼
//! ┌──────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌─────────┐
//! │ Resolver │ │ diff()     │ │ Notifier   │ │MonitorStore│ │ Events  │
//! │ (fetch)  │ │ (compare)  │ │ (notify)   │ │ (persist)  │ │(observe)│
//! └──────────┘ └────────────┘ └────────────┘ └────────────┘ └─────────┘
//! ```
//!
//! ## Two entry points
//!
//! 1. [`MonitorEngine::check_monitor`]: the manual refresh. Always persists
//!    the new snapshot and narrates every stage into a [`ProcessLog`].
//! 2. [`MonitorEngine::run_scheduled_batch`]: the periodic job. Picks due
//!    monitors, persists only when something changed and reports one
//!    [`MonitorOutcome`] per monitor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::diff::diff;
use crate::error::{CheckStage, Error, Result};
use crate::model::{ChangeSet, Monitor, MonitorUpdate};
use crate::resolver::{ChildFailure, SitemapResolver};
use crate::traits::{MonitorStore, Notifier};

/// Events emitted by the MonitorEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A check cycle started
    CheckStarted { monitor_id: String, url: String },

    /// A child sitemap of an index was skipped
    ChildSitemapFailed {
        monitor_id: String,
        location: String,
        error: String,
    },

    /// The new snapshot differs from the previous one
    ChangesDetected {
        monitor_id: String,
        added: usize,
        modified: usize,
        removed: usize,
    },

    /// The notifier failed; the check carried on
    NotificationFailed { monitor_id: String, error: String },

    /// A check cycle completed
    CheckSucceeded { monitor_id: String, changed: bool },

    /// A check cycle aborted
    CheckFailed { monitor_id: String, error: String },

    /// A scheduled batch completed
    BatchCompleted { processed: usize, failed: usize },

    /// Engine started
    Started { monitors_count: usize },

    /// Engine stopped
    Stopped { reason: String },
}

/// One timestamped line of a [`ProcessLog`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Human-readable narration of one manual check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLog {
    entries: Vec<LogEntry>,
}

impl ProcessLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line, mirroring it to the tracing log
    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.entries.push(LogEntry {
            timestamp: Utc::now(),
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Messages without timestamps, in order
    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }

    /// `[HH:MM:SS] message` lines, as shown on a dashboard
    pub fn lines(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| format!("[{}] {}", e.timestamp.format("%H:%M:%S"), e.message))
            .collect()
    }
}

/// Result of a successful manual check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub monitor_id: String,
    /// Number of records in the new snapshot
    pub url_count: usize,
    /// `None` on the first check of a monitor
    pub changes: Option<ChangeSet>,
    /// Whether the notifier reported the changes as handled
    pub notified: bool,
    /// Child sitemaps skipped during resolution
    pub failures: Vec<ChildFailure>,
}

/// What became of a change notification
#[derive(Debug, Clone, PartialEq, Eq)]
enum Delivery {
    Handled,
    NotConfigured,
    Failed(String),
}

/// Per-monitor status in a [`BatchReport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Outcome of one monitor within a scheduled batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorOutcome {
    /// Monitor URL
    pub monitor: String,
    pub monitor_id: String,
    pub status: OutcomeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MonitorOutcome {
    fn success(monitor: &Monitor, changed: bool) -> Self {
        Self {
            monitor: monitor.url.clone(),
            monitor_id: monitor.id.clone(),
            status: OutcomeStatus::Success,
            changes: Some(changed),
            error: None,
        }
    }

    fn failure(monitor: &Monitor, error: &Error) -> Self {
        Self {
            monitor: monitor.url.clone(),
            monitor_id: monitor.id.clone(),
            status: OutcomeStatus::Error,
            changes: None,
            error: Some(error.to_string()),
        }
    }
}

/// Report of one scheduled batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub success: bool,
    pub processed: usize,
    pub results: Vec<MonitorOutcome>,
}

impl BatchReport {
    /// Number of monitors whose check failed
    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == OutcomeStatus::Error)
            .count()
    }
}

/// Core orchestration engine
///
/// The engine owns its collaborators and is driven either per monitor
/// ([`check_monitor`](Self::check_monitor)), per batch
/// ([`run_scheduled_batch`](Self::run_scheduled_batch)), or continuously
/// ([`run`](Self::run)).
///
/// ## Failure isolation
///
/// A failing check aborts only that monitor's remaining stages. Nothing done
/// before the failure is rolled back, and other monitors in the same batch
/// are still processed.
pub struct MonitorEngine {
    /// Sitemap resolver (fetch + parse + index traversal)
    resolver: SitemapResolver,

    /// Monitor and snapshot persistence
    store: Box<dyn MonitorStore>,

    /// Optional change notifier
    notifier: Option<Box<dyn Notifier>>,

    config: EngineConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl MonitorEngine {
    /// Create a new engine
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: SitemapResolver,
        store: Box<dyn MonitorStore>,
        notifier: Option<Box<dyn Notifier>>,
        config: EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            resolver,
            store,
            notifier,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The store collaborator
    pub fn store(&self) -> &dyn MonitorStore {
        self.store.as_ref()
    }

    /// Register a new monitor
    ///
    /// `check_interval_minutes` falls back to the configured default.
    pub async fn add_monitor(
        &self,
        url: &str,
        check_interval_minutes: Option<u32>,
    ) -> Result<Monitor> {
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::invalid_input(format!("Invalid URL format: {} ({})", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::invalid_input(format!(
                "Unsupported URL scheme: {}",
                parsed.scheme()
            )));
        }

        let interval = check_interval_minutes.unwrap_or(self.config.default_check_interval_minutes);
        if interval == 0 {
            return Err(Error::invalid_input("Check interval must be > 0"));
        }

        let monitor = self.store.create_monitor(url, interval).await?;
        info!(monitor_id = %monitor.id, url, interval, "Monitor added");
        Ok(monitor)
    }

    /// Run one manual check cycle for `monitor`
    ///
    /// Every stage is narrated into `log`. On failure the last line is
    /// `Error: <message>` and the returned error names the failing stage.
    pub async fn check_monitor(&self, monitor: &Monitor, log: &mut ProcessLog) -> Result<CheckReport> {
        self.emit_event(EngineEvent::CheckStarted {
            monitor_id: monitor.id.clone(),
            url: monitor.url.clone(),
        });
        log.push(format!("Starting refresh for {}", monitor.url));

        match self.check_stages(monitor, log).await {
            Ok(report) => {
                log.push("Refresh completed successfully");
                self.emit_event(EngineEvent::CheckSucceeded {
                    monitor_id: monitor.id.clone(),
                    changed: report.changes.as_ref().is_some_and(|c| !c.is_empty()),
                });
                Ok(report)
            }
            Err(e) => {
                error!(monitor_id = %monitor.id, "Check failed: {}", e);
                log.push(format!("Error: {}", e));
                self.emit_event(EngineEvent::CheckFailed {
                    monitor_id: monitor.id.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Look up a monitor and check it
    pub async fn check_monitor_by_id(&self, monitor_id: &str, log: &mut ProcessLog) -> Result<CheckReport> {
        let monitor = self
            .store
            .get_monitor(monitor_id)
            .await?
            .ok_or_else(|| Error::not_found(monitor_id))?;
        self.check_monitor(&monitor, log).await
    }

    async fn check_stages(&self, monitor: &Monitor, log: &mut ProcessLog) -> Result<CheckReport> {
        log.push("Fetching current sitemap...");
        let resolution = self
            .resolver
            .resolve(&monitor.url)
            .await
            .map_err(|e| Error::check(CheckStage::Fetching, e))?;
        for failure in &resolution.failures {
            log.push(format!(
                "Warning: skipped child sitemap {}: {}",
                failure.location, failure.message
            ));
        }
        self.report_child_failures(monitor, &resolution.failures);
        log.push(format!("Found {} URLs in sitemap", resolution.records.len()));

        log.push("Retrieving previous snapshot...");
        let previous = self
            .store
            .latest_snapshot(&monitor.id)
            .await
            .map_err(|e| Error::check(CheckStage::Comparing, e))?;

        let mut notified = false;
        let changes = match previous {
            Some(previous) => {
                log.push("Comparing with previous snapshot...");
                let changes = diff(&previous, &resolution.records);
                if changes.is_empty() {
                    log.push("No changes detected");
                } else {
                    log.push(format!("Changes detected: {}", changes.summary().join(", ")));
                    self.emit_changes(monitor, &changes);
                    log.push("Processing notification...");
                    match self.notify(monitor, &changes).await {
                        Delivery::Handled => {
                            notified = true;
                            log.push("Change notification processed");
                        }
                        Delivery::NotConfigured => {
                            log.push("Note: notifications are not configured");
                        }
                        Delivery::Failed(error) => {
                            log.push(format!("Notification failed: {}", error));
                        }
                    }
                }
                Some(changes)
            }
            None => {
                log.push("No previous snapshot found, this is the first check");
                None
            }
        };

        let url_count = resolution.records.len();
        log.push("Saving new snapshot...");
        self.store
            .save_snapshot(&monitor.id, resolution.records)
            .await
            .map_err(|e| Error::check(CheckStage::Persisting, e))?;

        log.push("Updating monitor status...");
        self.store
            .update_monitor(&monitor.id, &MonitorUpdate::checked(monitor, Utc::now()))
            .await
            .map_err(|e| Error::check(CheckStage::UpdatingMetadata, e))?;

        Ok(CheckReport {
            monitor_id: monitor.id.clone(),
            url_count,
            changes,
            notified,
            failures: resolution.failures,
        })
    }

    /// Process the monitors due at `now`
    ///
    /// At most `scheduler_batch_size` monitors are picked, oldest
    /// `next_check` first. Per monitor: resolve, diff against the latest
    /// snapshot (none counts as empty), persist and notify only on changes,
    /// then advance `last_check`/`next_check`. A failing monitor is reported
    /// in the results and keeps its timestamps, so it is retried next batch.
    ///
    /// # Errors
    ///
    /// Only when the due monitors cannot be listed.
    pub async fn run_scheduled_batch(&self, now: DateTime<Utc>) -> Result<BatchReport> {
        let due = self
            .store
            .due_monitors(now, self.config.scheduler_batch_size)
            .await?;
        debug!(count = due.len(), "Processing due monitors");

        let mut results = Vec::with_capacity(due.len());
        for monitor in &due {
            self.emit_event(EngineEvent::CheckStarted {
                monitor_id: monitor.id.clone(),
                url: monitor.url.clone(),
            });

            match self.process_due(monitor, now).await {
                Ok(changed) => {
                    info!(monitor_id = %monitor.id, url = %monitor.url, changed, "Scheduled check completed");
                    self.emit_event(EngineEvent::CheckSucceeded {
                        monitor_id: monitor.id.clone(),
                        changed,
                    });
                    results.push(MonitorOutcome::success(monitor, changed));
                }
                Err(e) => {
                    error!(monitor_id = %monitor.id, url = %monitor.url, "Scheduled check failed: {}", e);
                    self.emit_event(EngineEvent::CheckFailed {
                        monitor_id: monitor.id.clone(),
                        error: e.to_string(),
                    });
                    results.push(MonitorOutcome::failure(monitor, &e));
                }
            }
        }

        let report = BatchReport {
            success: true,
            processed: results.len(),
            results,
        };
        self.emit_event(EngineEvent::BatchCompleted {
            processed: report.processed,
            failed: report.failed(),
        });
        Ok(report)
    }

    async fn process_due(&self, monitor: &Monitor, now: DateTime<Utc>) -> Result<bool> {
        let resolution = self
            .resolver
            .resolve(&monitor.url)
            .await
            .map_err(|e| Error::check(CheckStage::Fetching, e))?;
        self.report_child_failures(monitor, &resolution.failures);

        let previous = self
            .store
            .latest_snapshot(&monitor.id)
            .await
            .map_err(|e| Error::check(CheckStage::Comparing, e))?
            .unwrap_or_default();

        let changes = diff(&previous, &resolution.records);
        let changed = !changes.is_empty();
        if changed {
            self.emit_changes(monitor, &changes);
            self.store
                .save_snapshot(&monitor.id, resolution.records)
                .await
                .map_err(|e| Error::check(CheckStage::Persisting, e))?;
            self.notify(monitor, &changes).await;
        }

        self.store
            .update_monitor(&monitor.id, &MonitorUpdate::checked(monitor, now))
            .await
            .map_err(|e| Error::check(CheckStage::UpdatingMetadata, e))?;

        Ok(changed)
    }

    /// Dispatch to the notifier; failures are logged, never raised
    async fn notify(&self, monitor: &Monitor, changes: &ChangeSet) -> Delivery {
        let Some(notifier) = &self.notifier else {
            debug!(monitor_id = %monitor.id, "No notifier configured");
            return Delivery::NotConfigured;
        };

        match notifier.notify(changes, &monitor.url).await {
            Ok(true) => Delivery::Handled,
            Ok(false) => Delivery::NotConfigured,
            Err(e) => {
                warn!(
                    monitor_id = %monitor.id,
                    notifier = notifier.name(),
                    "Notification failed: {}", e
                );
                self.emit_event(EngineEvent::NotificationFailed {
                    monitor_id: monitor.id.clone(),
                    error: e.to_string(),
                });
                Delivery::Failed(e.to_string())
            }
        }
    }

    fn emit_changes(&self, monitor: &Monitor, changes: &ChangeSet) {
        self.emit_event(EngineEvent::ChangesDetected {
            monitor_id: monitor.id.clone(),
            added: changes.added.len(),
            modified: changes.modified.len(),
            removed: changes.removed.len(),
        });
    }

    fn report_child_failures(&self, monitor: &Monitor, failures: &[ChildFailure]) {
        for failure in failures {
            self.emit_event(EngineEvent::ChildSitemapFailed {
                monitor_id: monitor.id.clone(),
                location: failure.location.clone(),
                error: failure.message.clone(),
            });
        }
    }

    /// Run the scheduled batch every `tick_interval_secs` until SIGINT
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Fatal error
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    async fn run_internal(&self, shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>) -> Result<()> {
        let monitors_count = self.store.list_monitors().await?.len();
        info!(monitors = monitors_count, "Engine started");
        self.emit_event(EngineEvent::Started { monitors_count });

        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
            self.config.tick_interval_secs,
        ));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_scheduled_batch(Utc::now()).await {
                        Ok(report) if report.processed > 0 => {
                            info!(processed = report.processed, failed = report.failed(), "Scheduled batch completed");
                        }
                        Ok(_) => debug!("No monitors due"),
                        Err(e) => {
                            // Continue running despite errors
                            error!("Scheduled batch failed: {}", e);
                        }
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        self.store.flush().await?;
        info!("Store flushed, engine stopped");

        Ok(())
    }

    /// Run the tick loop until `shutdown_rx` fires (or SIGINT when `None`)
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_log_keeps_order_and_formats_lines() {
        let mut log = ProcessLog::new();
        log.push("Starting refresh for https://a.example/");
        log.push("Fetching current sitemap...");

        assert_eq!(
            log.messages(),
            vec!["Starting refresh for https://a.example/", "Fetching current sitemap..."]
        );
        let lines = log.lines();
        assert!(lines[1].starts_with('['));
        assert!(lines[1].ends_with("] Fetching current sitemap..."));
    }

    #[test]
    fn batch_report_serializes_like_the_job_response() {
        let monitor = Monitor::new("https://a.example/sitemap.xml", 60);
        let report = BatchReport {
            success: true,
            processed: 2,
            results: vec![
                MonitorOutcome::success(&monitor, true),
                MonitorOutcome::failure(&monitor, &Error::resolve("Failed to fetch sitemap: HTTP 500")),
            ],
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["processed"], 2);
        assert_eq!(json["results"][0]["status"], "success");
        assert_eq!(json["results"][0]["changes"], true);
        assert!(json["results"][0].get("error").is_none());
        assert_eq!(json["results"][1]["status"], "error");
        assert_eq!(json["results"][1]["error"], "Failed to fetch sitemap: HTTP 500");
        assert_eq!(report.failed(), 1);
    }
}
