// # Memory Monitor Store
//
// In-memory implementation of MonitorStore.
//
// ## Purpose
//
// Provides a simple, fast store that doesn't persist across restarts.
// Useful for testing, one-shot checks, and embedding.
//
// ## Crash Behavior
//
// - All monitors and snapshots are lost on restart
// - The first check after a restart has no previous snapshot to diff against

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::StoreData;
use crate::Error;
use crate::model::{Monitor, MonitorUpdate, UrlRecord};
use crate::traits::MonitorStore;

/// In-memory store implementation
///
/// Snapshots are kept without a retention limit.
///
/// # Example
///
/// ```rust,no_run
/// use sitemon_core::store::MemoryMonitorStore;
/// use sitemon_core::traits::MonitorStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryMonitorStore::new();
///
///     let monitor = store.create_monitor("https://example.com/sitemap.xml", 1440).await?;
///     assert_eq!(store.list_monitors().await?.len(), 1);
///     assert!(store.latest_snapshot(&monitor.id).await?.is_none());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryMonitorStore {
    inner: Arc<RwLock<StoreData>>,
}

impl MemoryMonitorStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots stored for a monitor
    pub async fn snapshot_count(&self, monitor_id: &str) -> usize {
        self.inner.read().await.snapshot_count(monitor_id)
    }

    /// Check if the store has no monitors
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.monitors.is_empty()
    }
}

#[async_trait]
impl MonitorStore for MemoryMonitorStore {
    async fn create_monitor(&self, url: &str, check_interval_minutes: u32) -> Result<Monitor, Error> {
        Ok(self.inner.write().await.create_monitor(url, check_interval_minutes))
    }

    async fn update_monitor(&self, id: &str, update: &MonitorUpdate) -> Result<(), Error> {
        self.inner.write().await.update_monitor(id, update)
    }

    async fn delete_monitor(&self, id: &str) -> Result<(), Error> {
        self.inner.write().await.delete_monitor(id);
        Ok(())
    }

    async fn get_monitor(&self, id: &str) -> Result<Option<Monitor>, Error> {
        Ok(self.inner.read().await.get_monitor(id))
    }

    async fn list_monitors(&self) -> Result<Vec<Monitor>, Error> {
        Ok(self.inner.read().await.list_monitors())
    }

    async fn save_snapshot(&self, monitor_id: &str, urls: Vec<UrlRecord>) -> Result<(), Error> {
        self.inner.write().await.save_snapshot(monitor_id, urls, None)
    }

    async fn latest_snapshot(&self, monitor_id: &str) -> Result<Option<Vec<UrlRecord>>, Error> {
        Ok(self.inner.read().await.latest_snapshot(monitor_id))
    }

    async fn flush(&self) -> Result<(), Error> {
        // No-op for memory store
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryMonitorStore::new();
        assert!(store.is_empty().await);

        let monitor = store
            .create_monitor("https://example.com/sitemap.xml", 1440)
            .await
            .unwrap();
        assert!(monitor.enabled);
        assert_eq!(monitor.check_interval_minutes, 1440);

        let fetched = store.get_monitor(&monitor.id).await.unwrap();
        assert_eq!(fetched, Some(monitor.clone()));

        store.delete_monitor(&monitor.id).await.unwrap();
        assert!(store.is_empty().await);
        // deleting again is fine
        store.delete_monitor(&monitor.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_store_snapshots() {
        let store = MemoryMonitorStore::new();
        let monitor = store
            .create_monitor("https://example.com/sitemap.xml", 60)
            .await
            .unwrap();

        assert!(store.latest_snapshot(&monitor.id).await.unwrap().is_none());

        store
            .save_snapshot(&monitor.id, vec![UrlRecord::new("https://example.com/a")])
            .await
            .unwrap();
        store
            .save_snapshot(&monitor.id, vec![UrlRecord::new("https://example.com/b")])
            .await
            .unwrap();

        let latest = store.latest_snapshot(&monitor.id).await.unwrap();
        assert_eq!(latest, Some(vec![UrlRecord::new("https://example.com/b")]));
        assert_eq!(store.snapshot_count(&monitor.id).await, 2);
    }

    #[tokio::test]
    async fn test_memory_store_list_newest_first() {
        let store = MemoryMonitorStore::new();
        let first = store.create_monitor("https://a.example/", 60).await.unwrap();
        let second = store.create_monitor("https://b.example/", 60).await.unwrap();

        let ids: Vec<String> = store
            .list_monitors()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test]
    async fn test_memory_store_update() {
        let store = MemoryMonitorStore::new();
        let monitor = store.create_monitor("https://a.example/", 60).await.unwrap();

        let update = MonitorUpdate::default().with_enabled(false);
        store.update_monitor(&monitor.id, &update).await.unwrap();
        assert!(!store.get_monitor(&monitor.id).await.unwrap().unwrap().enabled);

        let err = store.update_monitor("missing", &update).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_memory_store_due_monitors() {
        let store = MemoryMonitorStore::new();
        let now = Utc::now();

        let never = store.create_monitor("https://never.example/", 60).await.unwrap();
        let overdue = store.create_monitor("https://overdue.example/", 60).await.unwrap();
        let later = store.create_monitor("https://later.example/", 60).await.unwrap();
        let disabled = store.create_monitor("https://disabled.example/", 60).await.unwrap();

        store
            .update_monitor(
                &overdue.id,
                &MonitorUpdate {
                    next_check: Some(now - chrono::Duration::minutes(1)),
                    ..MonitorUpdate::default()
                },
            )
            .await
            .unwrap();
        store
            .update_monitor(
                &later.id,
                &MonitorUpdate {
                    next_check: Some(now + chrono::Duration::minutes(10)),
                    ..MonitorUpdate::default()
                },
            )
            .await
            .unwrap();
        store
            .update_monitor(&disabled.id, &MonitorUpdate::default().with_enabled(false))
            .await
            .unwrap();

        let due: Vec<String> = store
            .due_monitors(now, 10)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(due, vec![never.id.clone(), overdue.id]);

        let limited = store.due_monitors(now, 1).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, never.id);
    }
}
