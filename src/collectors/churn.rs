//! Preference-churn detection
//!
//! Counts preference changes in a short trailing window. Repeated changes to
//! the same key (display toggling) or a high aggregate change count across
//! keys signal sensory-seeking behavior.

use crate::types::{EventKind, InteractionEvent};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Trailing window length in seconds (5 minutes)
pub const CHURN_WINDOW_SEC: i64 = 300;

/// Changes to one key at which the same-key component saturates
const SAME_KEY_SATURATION: f64 = 3.0;

/// Aggregate change count at which the aggregate component saturates
const AGGREGATE_SATURATION: f64 = 6.0;

/// Preference churn over the trailing window
#[derive(Debug, Clone, PartialEq)]
pub struct ChurnReport {
    /// Preference changes inside the trailing window
    pub changes_in_window: u32,
    /// Most changes to any single key
    pub max_per_key: u32,
    /// Distinct keys touched
    pub keys_touched: u32,
    /// The most-churned key, when it was changed at least twice
    pub repeated_key: Option<String>,
}

/// Analyze preference churn over the trailing window ending at `now`.
pub fn analyze(window: &[InteractionEvent], now: DateTime<Utc>) -> ChurnReport {
    let cutoff = now - chrono::Duration::seconds(CHURN_WINDOW_SEC);

    let mut per_key: HashMap<&str, u32> = HashMap::new();
    let mut changes = 0u32;
    for event in window {
        if event.kind != EventKind::PreferenceChange || event.timestamp < cutoff {
            continue;
        }
        changes += 1;
        if let Some(key) = event.field.as_deref() {
            *per_key.entry(key).or_insert(0) += 1;
        }
    }

    let (repeated_key, max_per_key) = per_key
        .iter()
        .map(|(key, count)| (*key, *count))
        .max_by_key(|(key, count)| (*count, std::cmp::Reverse(*key)))
        .map(|(key, count)| ((count >= 2).then(|| key.to_string()), count))
        .unwrap_or((None, 0));

    ChurnReport {
        changes_in_window: changes,
        max_per_key,
        keys_touched: per_key.len() as u32,
        repeated_key,
    }
}

/// Confidence that the churn reflects sensory-seeking behavior.
pub fn confidence(report: &ChurnReport) -> f64 {
    if report.changes_in_window < 2 {
        return 0.0;
    }
    let aggregate = (report.changes_in_window as f64 / AGGREGATE_SATURATION).clamp(0.0, 1.0);
    let same_key = if report.max_per_key >= 2 {
        ((report.max_per_key as f64 - 1.0) / (SAME_KEY_SATURATION - 1.0)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (0.6 * aggregate + 0.4 * same_key).clamp(0.0, 1.0)
}
