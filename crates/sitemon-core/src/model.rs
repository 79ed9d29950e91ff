//! Domain types shared by every layer
//!
//! - [`UrlRecord`]: one `<url>` entry of a sitemap
//! - [`ChangeSet`]: added/modified/removed partition between two snapshots
//! - [`Monitor`]: a site under periodic watch (owned by the store)
//! - [`Snapshot`]: a persisted, immutable resolution of one monitor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sitemap entry
///
/// `location` is the identity key within a snapshot. The remaining fields are
/// kept as the opaque strings found in the document; only `last_modified`
/// takes part in change detection, and only by exact string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    #[serde(rename = "loc")]
    pub location: String,

    #[serde(rename = "lastmod", default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    #[serde(rename = "changefreq", default, skip_serializing_if = "Option::is_none")]
    pub change_frequency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl UrlRecord {
    /// Create a record with only a location
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            last_modified: None,
            change_frequency: None,
            priority: None,
        }
    }

    /// Set the `lastmod` value
    pub fn with_last_modified(mut self, last_modified: impl Into<String>) -> Self {
        self.last_modified = Some(last_modified.into());
        self
    }

    /// Set the `changefreq` value
    pub fn with_change_frequency(mut self, change_frequency: impl Into<String>) -> Self {
        self.change_frequency = Some(change_frequency.into());
        self
    }

    /// Set the `priority` value
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = Some(priority.into());
        self
    }
}

/// Partition of two snapshots into added, modified and removed records
///
/// `added` and `modified` follow the order of the current snapshot,
/// `removed` follows the order of the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<UrlRecord>,
    pub modified: Vec<UrlRecord>,
    pub removed: Vec<UrlRecord>,
}

impl ChangeSet {
    /// True when no record was added, modified or removed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// Total number of changed records
    pub fn len(&self) -> usize {
        self.added.len() + self.modified.len() + self.removed.len()
    }

    /// Human-readable count per non-empty category
    ///
    /// e.g. `["2 URLs added", "1 URLs removed"]`
    pub fn summary(&self) -> Vec<String> {
        [
            (self.added.len(), "added"),
            (self.modified.len(), "modified"),
            (self.removed.len(), "removed"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, verb)| format!("{} URLs {}", count, verb))
        .collect()
    }
}

/// A site under periodic watch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Monitor {
    pub id: String,
    pub url: String,
    pub enabled: bool,
    /// Minutes between scheduled checks
    pub check_interval_minutes: u32,
    pub last_check: Option<DateTime<Utc>>,
    /// `None` means the monitor has never been scheduled and is due now
    pub next_check: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Monitor {
    /// Create an enabled, never-checked monitor
    pub fn new(url: impl Into<String>, check_interval_minutes: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            enabled: true,
            check_interval_minutes,
            last_check: None,
            next_check: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the scheduler should pick this monitor at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_check.is_none_or(|next| next <= now)
    }

    /// Next check time when checked at `now`
    pub fn next_check_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::minutes(i64::from(self.check_interval_minutes))
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &MonitorUpdate) {
        if let Some(url) = &update.url {
            self.url = url.clone();
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(interval) = update.check_interval_minutes {
            self.check_interval_minutes = interval;
        }
        if let Some(last_check) = update.last_check {
            self.last_check = Some(last_check);
        }
        if let Some(next_check) = update.next_check {
            self.next_check = Some(next_check);
        }
    }
}

/// Partial monitor fields for `MonitorStore::update_monitor`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorUpdate {
    pub url: Option<String>,
    pub enabled: Option<bool>,
    pub check_interval_minutes: Option<u32>,
    pub last_check: Option<DateTime<Utc>>,
    pub next_check: Option<DateTime<Utc>>,
}

impl MonitorUpdate {
    /// Update that records a completed check at `now`
    pub fn checked(monitor: &Monitor, now: DateTime<Utc>) -> Self {
        Self {
            last_check: Some(now),
            next_check: Some(monitor.next_check_after(now)),
            ..Self::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }
}

/// Persisted resolution of one monitor at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    pub monitor_id: String,
    pub urls: Vec<UrlRecord>,
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    pub(crate) fn new(monitor_id: &str, urls: Vec<UrlRecord>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            monitor_id: monitor_id.to_string(),
            urls,
            created_at: Utc::now(),
        }
    }
}
