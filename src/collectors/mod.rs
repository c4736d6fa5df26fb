//! Signal collectors
//!
//! Each collector is a pure transform over a sliding window of interaction
//! events (plus an explicit `now`), invoked on demand by the classifier. The
//! [`CollectorSet`] runs them all and reports coverage: the fraction of
//! collectors that had enough data to judge the window at all.

pub mod churn;
pub mod flows;
pub mod inactivity;
pub mod input;
pub mod navigation;
pub mod repetition;

use crate::types::{DetectedSignal, InteractionEvent};
use chrono::{DateTime, Utc};
use flows::FlowCatalog;

/// Navigation entropy signal
pub const SIG_NAVIGATION_ENTROPY: &str = "navigation_entropy";
/// App closure terminating a rapid navigation burst
pub const SIG_ABRUPT_EXIT: &str = "abrupt_exit";
/// Started-but-stale multi-step flows
pub const SIG_ABANDONED_FLOWS: &str = "abandoned_flows";
/// Long event gaps with no lifecycle explanation
pub const SIG_UNEXPLAINED_INACTIVITY: &str = "unexplained_inactivity";
/// Repeated event subsequences or identical-event runs
pub const SIG_REPETITION: &str = "repetition";
/// Rapid preference/display toggling
pub const SIG_PREFERENCE_CHURN: &str = "preference_churn";
/// Heavy deletion and form abandonment on input fields
pub const SIG_INPUT_CHAOS: &str = "input_chaos";

/// Number of distinct collectors behind [`CollectorSet::collect`]
const COLLECTOR_COUNT: u32 = 6;

/// Every signal name a collector can produce. Signature markers must resolve
/// against this list at engine construction.
pub fn known_signals() -> &'static [&'static str] {
    &[
        SIG_NAVIGATION_ENTROPY,
        SIG_ABRUPT_EXIT,
        SIG_ABANDONED_FLOWS,
        SIG_UNEXPLAINED_INACTIVITY,
        SIG_REPETITION,
        SIG_PREFERENCE_CHURN,
        SIG_INPUT_CHAOS,
    ]
}

/// Combined output of one collection pass
#[derive(Debug, Clone)]
pub struct CollectorOutput {
    /// Signals with non-zero evidence
    pub signals: Vec<DetectedSignal>,
    /// Collectors with enough data to judge / total collectors (0-1)
    pub coverage: f64,
}

/// Runs every collector against a window
#[derive(Debug, Clone, Default)]
pub struct CollectorSet {
    flow_catalog: FlowCatalog,
}

impl CollectorSet {
    pub fn new(flow_catalog: FlowCatalog) -> Self {
        Self { flow_catalog }
    }

    pub fn flow_catalog(&self) -> &FlowCatalog {
        &self.flow_catalog
    }

    /// Run all collectors over the window at `now`.
    ///
    /// Insufficient data is not an error: a collector without enough events
    /// contributes no signal and lowers coverage instead.
    pub fn collect(&self, window: &[InteractionEvent], now: DateTime<Utc>) -> CollectorOutput {
        let mut signals = Vec::new();
        let mut sufficient = 0u32;

        // Navigation entropy + abrupt exit
        let nav = navigation::analyze(window);
        if nav.navigation_count >= navigation::MIN_NAVIGATION_EVENTS as u32 {
            sufficient += 1;
        }
        if nav.entropy > 0.0 {
            signals.push(DetectedSignal::computed(
                SIG_NAVIGATION_ENTROPY,
                nav.entropy,
                format!(
                    "speed={:.2} erraticism={:.2} circling={:.2} navs={}",
                    nav.speed, nav.erraticism, nav.circling, nav.navigation_count
                ),
            ));
        }
        if let Some(conf) = navigation::abrupt_exit(window) {
            signals.push(DetectedSignal::computed(
                SIG_ABRUPT_EXIT,
                conf,
                "app closed during rapid navigation burst",
            ));
        }

        // Abandoned flows
        if !window.is_empty() && !self.flow_catalog.is_empty() {
            sufficient += 1;
        }
        let abandoned = flows::detect(&self.flow_catalog, window, now);
        if !abandoned.is_empty() {
            let names: Vec<&str> = abandoned.iter().map(|a| a.flow.as_str()).collect();
            signals.push(DetectedSignal::computed(
                SIG_ABANDONED_FLOWS,
                flows::confidence(&abandoned),
                format!("stale flows: {}", names.join(", ")),
            ));
        }

        // Unexplained inactivity
        if !window.is_empty() {
            sufficient += 1;
        }
        let gaps = inactivity::detect(window, now);
        let gap_conf = inactivity::confidence(&gaps);
        if gap_conf > 0.0 {
            let longest = gaps
                .iter()
                .filter(|g| !g.explained)
                .map(|g| g.duration_sec)
                .fold(0.0, f64::max);
            let dissociative = gaps.iter().any(|g| g.likely_dissociation);
            signals.push(DetectedSignal::computed(
                SIG_UNEXPLAINED_INACTIVITY,
                gap_conf,
                format!(
                    "longest unexplained gap {:.1} min, likely_dissociation={}",
                    longest / 60.0,
                    dissociative
                ),
            ));
        }

        // Repetition
        if window.len() >= 4 {
            sufficient += 1;
        }
        let repetition = repetition::analyze(window);
        if repetition.is_reportable() {
            signals.push(DetectedSignal::computed(
                SIG_REPETITION,
                repetition::confidence(&repetition),
                format!(
                    "pattern_len={} repeats={} echo={}",
                    repetition.pattern_len, repetition.max_repeats, repetition.max_echo
                ),
            ));
        }

        // Preference churn
        if !window.is_empty() {
            sufficient += 1;
        }
        let churn = churn::analyze(window, now);
        let churn_conf = churn::confidence(&churn);
        if churn_conf > 0.0 {
            signals.push(DetectedSignal::computed(
                SIG_PREFERENCE_CHURN,
                churn_conf,
                format!(
                    "{} changes across {} keys, max_per_key={}",
                    churn.changes_in_window, churn.keys_touched, churn.max_per_key
                ),
            ));
        }

        // Input chaos
        let input = input::analyze(window);
        if input.event_count() >= input::MIN_INPUT_EVENTS {
            sufficient += 1;
        }
        if input.chaos > 0.15 {
            signals.push(DetectedSignal::computed(
                SIG_INPUT_CHAOS,
                input.chaos,
                format!(
                    "deletion_ratio={:.2} abandonment_rate={:.2}",
                    input.deletion_ratio, input.abandonment_rate
                ),
            ));
        }

        CollectorOutput {
            signals,
            coverage: sufficient as f64 / COLLECTOR_COUNT as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::seconds(sec)
    }

    #[test]
    fn test_empty_window_has_zero_coverage() {
        let set = CollectorSet::default();
        let output = set.collect(&[], ts(0));
        assert!(output.signals.is_empty());
        assert_eq!(output.coverage, 0.0);
    }

    #[test]
    fn test_signal_names_are_known() {
        let set = CollectorSet::default();
        let mut window = Vec::new();
        for i in 0..6 {
            let page = if i % 2 == 0 { "a" } else { "b" };
            window.push(InteractionEvent::navigation(ts(i), page));
        }
        window.push(InteractionEvent::preference_change(ts(7), "theme", "dark"));
        window.push(InteractionEvent::preference_change(ts(9), "theme", "light"));

        let output = set.collect(&window, ts(10));
        assert!(!output.signals.is_empty());
        for signal in &output.signals {
            assert!(
                known_signals().contains(&signal.name.as_str()),
                "unknown signal {}",
                signal.name
            );
        }
    }

    #[test]
    fn test_coverage_partial_for_navigation_only_window() {
        let set = CollectorSet::default();
        let window = vec![
            InteractionEvent::navigation(ts(0), "settings"),
            InteractionEvent::navigation(ts(25), "profile"),
            InteractionEvent::navigation(ts(50), "help"),
            InteractionEvent::navigation(ts(75), "about"),
        ];

        let output = set.collect(&window, ts(80));
        // Input collector has nothing to judge; the other five do
        assert!((output.coverage - 5.0 / 6.0).abs() < 0.001);
    }

    #[test]
    fn test_collect_is_deterministic() {
        let set = CollectorSet::default();
        let window = vec![
            InteractionEvent::navigation(ts(0), "a"),
            InteractionEvent::navigation(ts(1), "b"),
            InteractionEvent::navigation(ts(2), "a"),
            InteractionEvent::field_entry(ts(3), "severity", "7"),
        ];

        let first = set.collect(&window, ts(10));
        for _ in 0..10 {
            let again = set.collect(&window, ts(10));
            assert_eq!(again.signals, first.signals);
            assert_eq!(again.coverage, first.coverage);
        }
    }
}
