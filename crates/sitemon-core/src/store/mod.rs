// # Monitor Store Implementations
//
// This module provides implementations of the MonitorStore trait for
// different persistence strategies. Both share `StoreData`, the in-memory
// table of monitors and snapshots; they differ only in durability.

pub mod file;
pub mod memory;

pub use file::FileMonitorStore;
pub use memory::MemoryMonitorStore;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::model::{Monitor, MonitorUpdate, Snapshot, UrlRecord};

/// Monitors (in creation order) and snapshots (in save order)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct StoreData {
    pub(crate) monitors: Vec<Monitor>,
    pub(crate) snapshots: Vec<Snapshot>,
}

impl StoreData {
    pub(crate) fn create_monitor(&mut self, url: &str, check_interval_minutes: u32) -> Monitor {
        let monitor = Monitor::new(url, check_interval_minutes);
        self.monitors.push(monitor.clone());
        monitor
    }

    pub(crate) fn update_monitor(&mut self, id: &str, update: &MonitorUpdate) -> Result<(), Error> {
        let monitor = self
            .monitors
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| Error::not_found(id))?;
        monitor.apply(update);
        Ok(())
    }

    /// Returns whether anything was removed
    pub(crate) fn delete_monitor(&mut self, id: &str) -> bool {
        let before = self.monitors.len() + self.snapshots.len();
        self.monitors.retain(|m| m.id != id);
        self.snapshots.retain(|s| s.monitor_id != id);
        before != self.monitors.len() + self.snapshots.len()
    }

    pub(crate) fn get_monitor(&self, id: &str) -> Option<Monitor> {
        self.monitors.iter().find(|m| m.id == id).cloned()
    }

    /// Newest created first; monitors created in the same instant keep
    /// reverse insertion order
    pub(crate) fn list_monitors(&self) -> Vec<Monitor> {
        let mut monitors: Vec<Monitor> = self.monitors.iter().rev().cloned().collect();
        monitors.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        monitors
    }

    /// Append a snapshot, keeping at most `retention` per monitor
    pub(crate) fn save_snapshot(
        &mut self,
        monitor_id: &str,
        urls: Vec<UrlRecord>,
        retention: Option<usize>,
    ) -> Result<(), Error> {
        if !self.monitors.iter().any(|m| m.id == monitor_id) {
            return Err(Error::not_found(monitor_id));
        }
        self.snapshots.push(Snapshot::new(monitor_id, urls));

        if let Some(retention) = retention {
            let mut excess = self
                .snapshots
                .iter()
                .filter(|s| s.monitor_id == monitor_id)
                .count()
                .saturating_sub(retention);
            self.snapshots.retain(|s| {
                if excess > 0 && s.monitor_id == monitor_id {
                    excess -= 1;
                    false
                } else {
                    true
                }
            });
        }
        Ok(())
    }

    pub(crate) fn latest_snapshot(&self, monitor_id: &str) -> Option<Vec<UrlRecord>> {
        self.snapshots
            .iter()
            .rev()
            .find(|s| s.monitor_id == monitor_id)
            .map(|s| s.urls.clone())
    }

    pub(crate) fn snapshot_count(&self, monitor_id: &str) -> usize {
        self.snapshots
            .iter()
            .filter(|s| s.monitor_id == monitor_id)
            .count()
    }
}
