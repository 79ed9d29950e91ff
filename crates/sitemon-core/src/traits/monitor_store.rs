// # Monitor Store Trait
//
// Defines the interface for persisting monitors and their snapshots.
//
// ## Purpose
//
// The store owns the monitor lifecycle and the snapshot history:
// - Monitor records (URL, enabled flag, interval, check timestamps)
// - One immutable snapshot per check, newest read back for diffing
//
// ## Implementations
//
// - In-memory: `MemoryMonitorStore`
// - File-based: `FileMonitorStore` (JSON, atomic writes)
//
// ## Usage
//
// ```rust,ignore
// use sitemon_core::MonitorStore;
//
// let monitor = store.create_monitor("https://example.com/sitemap.xml", 1440).await?;
// store.save_snapshot(&monitor.id, urls).await?;
// let previous = store.latest_snapshot(&monitor.id).await?;
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Monitor, MonitorUpdate, UrlRecord};

/// Trait for store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Create an enabled monitor for `url`
    async fn create_monitor(
        &self,
        url: &str,
        check_interval_minutes: u32,
    ) -> Result<Monitor, crate::Error>;

    /// Apply the set fields of `update` to monitor `id`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Updated
    /// - `Err(Error::NotFound)`: No such monitor
    async fn update_monitor(&self, id: &str, update: &MonitorUpdate) -> Result<(), crate::Error>;

    /// Delete monitor `id` and its snapshots
    ///
    /// Deleting a missing monitor is not an error.
    async fn delete_monitor(&self, id: &str) -> Result<(), crate::Error>;

    /// Get a monitor by id
    async fn get_monitor(&self, id: &str) -> Result<Option<Monitor>, crate::Error>;

    /// List all monitors, newest created first
    async fn list_monitors(&self) -> Result<Vec<Monitor>, crate::Error>;

    /// Store a new snapshot for monitor `monitor_id`
    async fn save_snapshot(
        &self,
        monitor_id: &str,
        urls: Vec<UrlRecord>,
    ) -> Result<(), crate::Error>;

    /// Get the most recent snapshot's records, if any
    async fn latest_snapshot(&self, monitor_id: &str)
    -> Result<Option<Vec<UrlRecord>>, crate::Error>;

    /// Monitors due for a scheduled check at `now`, at most `limit`
    ///
    /// Due means enabled and `next_check` unset or not after `now`. Ordered by
    /// `next_check` ascending with never-scheduled monitors first.
    async fn due_monitors(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Monitor>, crate::Error> {
        let mut due: Vec<Monitor> = self
            .list_monitors()
            .await?
            .into_iter()
            .filter(|m| m.is_due(now))
            .collect();
        due.sort_by_key(|m| m.next_check);
        due.truncate(limit);
        Ok(due)
    }

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}
