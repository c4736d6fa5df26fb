//! Weekly snapshots
//!
//! The live event stream is folded into one aggregate per calendar week.
//! Accumulators hold only derived counters, never raw events, and the
//! finalized snapshot is immutable: historical analysis stays stable even if
//! live detection logic changes.

use crate::types::{CrisisAssessment, EventKind, InteractionEvent};
use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Monday of the calendar week containing `ts`
pub fn week_start_of(ts: DateTime<Utc>) -> NaiveDate {
    ts.date_naive().week(Weekday::Mon).first_day()
}

/// Session-shape aggregates for one week
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatterns {
    /// Completed foreground sessions
    pub sessions: u32,
    /// Total foreground minutes
    pub active_minutes: f64,
    /// Mean session length in minutes
    pub mean_session_minutes: f64,
}

/// One finalized calendar week of derived aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySnapshot {
    /// Monday of the week
    pub week_start: NaiveDate,
    /// Pain/mood entries saved
    pub entries_logged: u32,
    /// Assessments with a detected crisis, copied by value
    pub crisis_events: Vec<CrisisAssessment>,
    /// Features touched during the week
    pub features_used: BTreeSet<String>,
    /// Preference changes over the week
    pub preference_changes: u32,
    /// Session-shape aggregates
    pub session_patterns: SessionPatterns,
    /// Minutes from intervention start to release, per released intervention
    pub recovery_latencies_min: Vec<f64>,
    /// True once the week is closed; finalized snapshots never change
    pub finalized: bool,
}

impl WeeklySnapshot {
    /// Zero-activity snapshot for a week with no recorded events
    pub fn empty(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            entries_logged: 0,
            crisis_events: Vec::new(),
            features_used: BTreeSet::new(),
            preference_changes: 0,
            session_patterns: SessionPatterns::default(),
            recovery_latencies_min: Vec::new(),
            finalized: true,
        }
    }

    /// Number of detected crises in the week
    pub fn crisis_count(&self) -> u32 {
        self.crisis_events.len() as u32
    }

    /// Mean confidence of the week's detected crises
    pub fn mean_severity(&self) -> Option<f64> {
        if self.crisis_events.is_empty() {
            return None;
        }
        let sum: f64 = self.crisis_events.iter().map(|a| a.confidence).sum();
        Some(sum / self.crisis_events.len() as f64)
    }

    /// Mean minutes from intervention to release
    pub fn mean_recovery_minutes(&self) -> Option<f64> {
        if self.recovery_latencies_min.is_empty() {
            return None;
        }
        let sum: f64 = self.recovery_latencies_min.iter().sum();
        Some(sum / self.recovery_latencies_min.len() as f64)
    }

    /// Number of distinct features used
    pub fn engagement_breadth(&self) -> u32 {
        self.features_used.len() as u32
    }
}

/// Mutable aggregate for the week currently in progress
#[derive(Debug, Clone)]
pub struct WeekAccumulator {
    week_start: NaiveDate,
    entries_logged: u32,
    crisis_events: Vec<CrisisAssessment>,
    features_used: BTreeSet<String>,
    preference_changes: u32,
    sessions: u32,
    active_minutes: f64,
    foreground_since: Option<DateTime<Utc>>,
    recovery_latencies_min: Vec<f64>,
}

impl WeekAccumulator {
    pub fn new(week_start: NaiveDate) -> Self {
        Self {
            week_start,
            entries_logged: 0,
            crisis_events: Vec::new(),
            features_used: BTreeSet::new(),
            preference_changes: 0,
            sessions: 0,
            active_minutes: 0.0,
            foreground_since: None,
            recovery_latencies_min: Vec::new(),
        }
    }

    pub fn week_start(&self) -> NaiveDate {
        self.week_start
    }

    /// Fold one event into the week's counters. The event itself is not kept.
    pub fn observe_event(&mut self, event: &InteractionEvent) {
        match event.kind {
            EventKind::EntrySaved => self.entries_logged += 1,
            EventKind::PreferenceChange => self.preference_changes += 1,
            EventKind::Navigation => {
                if let Some(feature) = event.page.as_deref().and_then(feature_of) {
                    self.features_used.insert(feature.to_string());
                }
            }
            EventKind::AppForeground => self.foreground_since = Some(event.timestamp),
            EventKind::AppBackground | EventKind::AppClose => {
                if let Some(since) = self.foreground_since.take() {
                    let minutes = (event.timestamp - since).num_milliseconds() as f64 / 60_000.0;
                    if minutes >= 0.0 {
                        self.sessions += 1;
                        self.active_minutes += minutes;
                    }
                }
            }
            _ => {}
        }
    }

    /// Record a detected crisis (copied by value).
    pub fn observe_assessment(&mut self, assessment: &CrisisAssessment) {
        if assessment.detected_crisis.is_some() {
            self.crisis_events.push(assessment.clone());
        }
    }

    /// Record a released intervention's recovery latency.
    pub fn observe_recovery(&mut self, minutes: f64) {
        self.recovery_latencies_min.push(minutes.max(0.0));
    }

    /// Close the week into an immutable snapshot.
    pub fn finalize(self) -> WeeklySnapshot {
        let mean_session_minutes = if self.sessions > 0 {
            self.active_minutes / self.sessions as f64
        } else {
            0.0
        };
        WeeklySnapshot {
            week_start: self.week_start,
            entries_logged: self.entries_logged,
            crisis_events: self.crisis_events,
            features_used: self.features_used,
            preference_changes: self.preference_changes,
            session_patterns: SessionPatterns {
                sessions: self.sessions,
                active_minutes: self.active_minutes,
                mean_session_minutes,
            },
            recovery_latencies_min: self.recovery_latencies_min,
            finalized: true,
        }
    }
}

/// Top-level feature a page belongs to ("entry/severity" -> "entry")
fn feature_of(page: &str) -> Option<&str> {
    let feature = page.split('/').next().unwrap_or(page);
    if feature.is_empty() {
        None
    } else {
        Some(feature)
    }
}
