//! Longitudinal recovery tracking
//!
//! Aggregates the live stream into weekly snapshots and derives trend, habit,
//! regression, and feature-exposure signals over a multi-week horizon.
//! Finalization is lazy and idempotent: absent weeks are synthesized as
//! zero-activity snapshots so trends stay continuous across long gaps.

pub mod exposure;
pub mod relapse;
pub mod snapshot;
pub mod trends;

use crate::types::{CrisisAssessment, InteractionEvent};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use exposure::ExposureGate;
use relapse::{RegressionAnalysis, RelapseWarning};
use snapshot::{week_start_of, WeekAccumulator, WeeklySnapshot};
use std::collections::BTreeMap;
use trends::{HabitReport, TrendDirection, TrendMetric, TrendReport};

/// A week is stable when it has at most this many detected crises
const STABLE_CRISIS_MAX: u32 = 1;

/// Entries per week for logging to count as useful
const HABIT_MIN_ENTRIES: f64 = 3.0;

/// Entry-count variance bound for logging to count as regular
const HABIT_MAX_VARIANCE: f64 = 2.0;

/// Longitudinal tracker over weekly snapshots
#[derive(Debug, Clone)]
pub struct RecoveryTracker {
    snapshots: BTreeMap<NaiveDate, WeeklySnapshot>,
    current: Option<WeekAccumulator>,
    exposure: ExposureGate,
}

impl Default for RecoveryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoveryTracker {
    pub fn new() -> Self {
        Self {
            snapshots: BTreeMap::new(),
            current: None,
            exposure: ExposureGate::default(),
        }
    }

    /// Restore the tracker from persisted snapshots.
    pub fn with_snapshots(snapshots: Vec<WeeklySnapshot>) -> Self {
        let mut tracker = Self::new();
        for snapshot in snapshots {
            tracker.snapshots.insert(snapshot.week_start, snapshot);
        }
        // Replay exposure over history so the gate matches what the user
        // had earned
        let weeks: Vec<NaiveDate> = tracker.snapshots.keys().copied().collect();
        for week in weeks {
            tracker.advance_exposure(week);
        }
        tracker
    }

    /// Fold one event into the current week.
    pub fn observe_event(&mut self, event: &InteractionEvent) {
        self.roll_to(week_start_of(event.timestamp));
        if let Some(current) = self.current.as_mut() {
            current.observe_event(event);
        }
    }

    /// Record a detected crisis (copied by value into the week).
    pub fn observe_assessment(&mut self, assessment: &CrisisAssessment) {
        self.roll_to(week_start_of(assessment.assessed_at));
        if let Some(current) = self.current.as_mut() {
            current.observe_assessment(assessment);
        }
    }

    /// Record a released intervention's recovery latency.
    pub fn observe_recovery(&mut self, minutes: f64, at: DateTime<Utc>) {
        self.roll_to(week_start_of(at));
        if let Some(current) = self.current.as_mut() {
            current.observe_recovery(minutes);
        }
    }

    /// Finalize every week strictly before the week containing `now`.
    ///
    /// Safe to run lazily (on next app open, even after a multi-week
    /// absence): missing weeks become zero-activity snapshots, and re-running
    /// on already-finalized weeks changes nothing. Returns the number of
    /// weeks newly finalized.
    pub fn finalize_through(&mut self, now: DateTime<Utc>) -> u32 {
        let before = self.snapshots.len();
        self.roll_to(week_start_of(now));
        (self.snapshots.len() - before) as u32
    }

    /// Finalized snapshots, oldest first.
    pub fn snapshots(&self) -> Vec<&WeeklySnapshot> {
        self.snapshots.values().collect()
    }

    /// Owned copies of the finalized snapshots, for persistence.
    pub fn export_snapshots(&self) -> Vec<WeeklySnapshot> {
        self.snapshots.values().cloned().collect()
    }

    /// Trend of one metric over the trailing finalized weeks.
    pub fn trend(&self, metric: TrendMetric) -> Option<TrendReport> {
        trends::trend(metric, &self.metric_series(metric))
    }

    /// All four tracked trends.
    pub fn trends(&self) -> Vec<TrendReport> {
        [
            TrendMetric::CrisisFrequency,
            TrendMetric::CrisisSeverity,
            TrendMetric::RecoveryTime,
            TrendMetric::EngagementBreadth,
        ]
        .into_iter()
        .filter_map(|metric| self.trend(metric))
        .collect()
    }

    /// Whether regular entry logging has formed as a habit.
    pub fn logging_habit(&self) -> Option<HabitReport> {
        let series: Vec<(NaiveDate, f64)> = self
            .snapshots
            .values()
            .map(|s| (s.week_start, s.entries_logged as f64))
            .collect();
        trends::detect_habit(&series, "entry_logging", HABIT_MIN_ENTRIES, HABIT_MAX_VARIANCE)
    }

    /// Most recent classified regression in the crisis-count series.
    pub fn regression(&self) -> Option<RegressionAnalysis> {
        let series: Vec<(NaiveDate, f64)> = self
            .snapshots
            .values()
            .map(|s| (s.week_start, s.crisis_count() as f64))
            .collect();
        relapse::classify_regression(&series)
    }

    /// Derived warning for the current regression, if any.
    pub fn relapse_warning(&self) -> Option<RelapseWarning> {
        let analysis = self.regression()?;
        let trend = self
            .trend(TrendMetric::CrisisFrequency)
            .map(|t| t.direction)
            .unwrap_or(TrendDirection::Flat);
        Some(relapse::warning_for(&analysis, trend))
    }

    /// Current feature-exposure gate.
    pub fn exposure(&self) -> &ExposureGate {
        &self.exposure
    }

    /// Consecutive trailing stable weeks (at most [`STABLE_CRISIS_MAX`]
    /// detected crises each).
    pub fn stable_weeks(&self) -> u32 {
        self.snapshots
            .values()
            .rev()
            .take_while(|s| s.crisis_count() <= STABLE_CRISIS_MAX)
            .count() as u32
    }

    /// Threshold feedback for the personalization layer (closing the loop).
    ///
    /// During a relapse the engine becomes slightly more sensitive; during a
    /// sustained decline in crisis frequency, slightly less. Always within
    /// the clamp the threshold table applies.
    pub fn sensitivity_hint(&self) -> f64 {
        if let Some(analysis) = self.regression() {
            if analysis.kind == relapse::RegressionKind::Relapse {
                return 0.9;
            }
        }
        match self.trend(TrendMetric::CrisisFrequency).map(|t| t.direction) {
            Some(TrendDirection::Decreasing) => 1.1,
            _ => 1.0,
        }
    }

    fn metric_series(&self, metric: TrendMetric) -> Vec<f64> {
        self.snapshots
            .values()
            .map(|s| match metric {
                TrendMetric::CrisisFrequency => s.crisis_count() as f64,
                TrendMetric::CrisisSeverity => s.mean_severity().unwrap_or(0.0),
                TrendMetric::RecoveryTime => s.mean_recovery_minutes().unwrap_or(0.0),
                TrendMetric::EngagementBreadth => s.engagement_breadth() as f64,
            })
            .collect()
    }

    /// Ensure the current accumulator covers `target_week`, finalizing and
    /// synthesizing everything before it.
    fn roll_to(&mut self, target_week: NaiveDate) {
        if self.current.is_none() {
            let resume_from = self
                .snapshots
                .keys()
                .next_back()
                .map(|w| *w + Duration::weeks(1))
                .unwrap_or(target_week);
            self.current = Some(WeekAccumulator::new(resume_from.min(target_week)));
        }

        loop {
            let current_week = self.current.as_ref().map(|c| c.week_start()).unwrap();
            if current_week >= target_week {
                // Late events for an already-finalized week fold into the
                // current accumulator rather than mutating history
                return;
            }
            let finished = self.current.take().unwrap().finalize();
            let week = finished.week_start;
            // First finalization wins: an already-finalized week never changes
            self.snapshots.entry(week).or_insert(finished);
            self.advance_exposure(week);
            self.current = Some(WeekAccumulator::new(week + Duration::weeks(1)));
        }
    }

    /// Advance the exposure gate for one newly finalized week.
    fn advance_exposure(&mut self, week: NaiveDate) {
        let regression = self.regression().filter(|r| {
            let elevation_end = r.spike_week + Duration::weeks(r.elevated_weeks.max(1) as i64);
            week >= r.spike_week && week < elevation_end + Duration::weeks(1)
        });
        let stable = self.stable_weeks();
        self.exposure.update(week, stable, regression.as_ref());
    }
}
