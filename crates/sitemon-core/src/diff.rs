//! Snapshot diffing
//!
//! Records are keyed by `location`; `last_modified` is the only change
//! signal and is compared as an exact string (absent vs. present counts as a
//! change, absent on both sides does not).

use std::collections::HashMap;

use crate::model::{ChangeSet, UrlRecord};

/// Compute the change set between two snapshots
///
/// Duplicate locations within one input resolve last-write-wins.
pub fn diff(previous: &[UrlRecord], current: &[UrlRecord]) -> ChangeSet {
    let previous_by_location = index(previous);
    let current_by_location = index(current);

    let mut changes = ChangeSet::default();

    for record in current {
        match previous_by_location.get(record.location.as_str()) {
            None => changes.added.push(record.clone()),
            Some(old) if old.last_modified != record.last_modified => {
                changes.modified.push(record.clone())
            }
            Some(_) => {}
        }
    }

    for record in previous {
        if !current_by_location.contains_key(record.location.as_str()) {
            changes.removed.push(record.clone());
        }
    }

    changes
}

fn index(records: &[UrlRecord]) -> HashMap<&str, &UrlRecord> {
    records
        .iter()
        .map(|record| (record.location.as_str(), record))
        .collect()
}
