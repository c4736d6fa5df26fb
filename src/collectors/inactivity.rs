//! Unexplained-inactivity detection
//!
//! Scans the window for long gaps between consecutive events. A gap is
//! explained only when bracketed by explicit background/foreground lifecycle
//! events; unexplained gaps past a longer threshold are marked as likely
//! dissociation.

use crate::types::{EventKind, InteractionEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gap length (seconds) at which inactivity becomes notable
pub const INACTIVITY_GAP_SEC: i64 = 300;

/// Unexplained gap length (seconds) at which dissociation becomes likely
pub const DISSOCIATION_GAP_SEC: i64 = 600;

/// Gap length (seconds) at which confidence saturates
const SATURATION_GAP_SEC: f64 = 2400.0;

/// A detected inactivity gap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InactivityGap {
    /// Gap start (last event before silence)
    pub start: DateTime<Utc>,
    /// Gap end (first event after silence, or `now` for an open gap)
    pub end: DateTime<Utc>,
    /// Gap length in seconds
    pub duration_sec: f64,
    /// True when bracketed by background/foreground lifecycle events
    pub explained: bool,
    /// True for an unexplained gap past the dissociation threshold
    pub likely_dissociation: bool,
}

/// Detect inactivity gaps in the window, evaluated at `now`.
///
/// The trailing stretch between the last event and `now` is included as an
/// open gap; it counts as explained when the last event put the app in the
/// background or closed it.
pub fn detect(window: &[InteractionEvent], now: DateTime<Utc>) -> Vec<InactivityGap> {
    let mut gaps = Vec::new();

    for pair in window.windows(2) {
        let duration_sec = (pair[1].timestamp - pair[0].timestamp).num_seconds();
        if duration_sec <= INACTIVITY_GAP_SEC {
            continue;
        }
        let explained = pair[0].kind == EventKind::AppBackground
            && pair[1].kind == EventKind::AppForeground;
        gaps.push(gap(pair[0].timestamp, pair[1].timestamp, explained));
    }

    if let Some(last) = window.last() {
        let trailing_sec = (now - last.timestamp).num_seconds();
        if trailing_sec > INACTIVITY_GAP_SEC {
            let explained =
                matches!(last.kind, EventKind::AppBackground | EventKind::AppClose);
            gaps.push(gap(last.timestamp, now, explained));
        }
    }

    gaps
}

fn gap(start: DateTime<Utc>, end: DateTime<Utc>, explained: bool) -> InactivityGap {
    let duration_sec = (end - start).num_milliseconds() as f64 / 1000.0;
    InactivityGap {
        start,
        end,
        duration_sec,
        explained,
        likely_dissociation: !explained && duration_sec >= DISSOCIATION_GAP_SEC as f64,
    }
}

/// Collapse gaps into a single confidence driven by the longest unexplained
/// gap. Explained gaps contribute nothing.
pub fn confidence(gaps: &[InactivityGap]) -> f64 {
    let longest = gaps
        .iter()
        .filter(|g| !g.explained)
        .map(|g| g.duration_sec)
        .fold(0.0, f64::max);

    if longest <= INACTIVITY_GAP_SEC as f64 {
        0.0
    } else if longest < DISSOCIATION_GAP_SEC as f64 {
        // Notable but below the dissociation threshold
        let frac = (longest - INACTIVITY_GAP_SEC as f64)
            / (DISSOCIATION_GAP_SEC - INACTIVITY_GAP_SEC) as f64;
        (0.2 + 0.3 * frac).clamp(0.0, 0.5)
    } else {
        let frac =
            (longest - DISSOCIATION_GAP_SEC as f64) / (SATURATION_GAP_SEC - DISSOCIATION_GAP_SEC as f64);
        (0.7 + 0.25 * frac.min(1.0)).clamp(0.0, 0.95)
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
    fn test_short_gaps_are_ignored() {
        let window = vec![
            InteractionEvent::navigation(ts(0), "a"),
            InteractionEvent::navigation(ts(120), "b"),
            InteractionEvent::navigation(ts(250), "c"),
        ];
        assert!(detect(&window, ts(260)).is_empty());
    }

    #[test]
    fn test_bracketed_gap_is_explained() {
        let window = vec![
            InteractionEvent::new(ts(0), EventKind::AppBackground),
            InteractionEvent::new(ts(900), EventKind::AppForeground),
        ];
        let gaps = detect(&window, ts(910));
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].explained);
        assert!(!gaps[0].likely_dissociation);
        assert_eq!(confidence(&gaps), 0.0);
    }

    #[test]
    fn test_unexplained_long_gap_is_likely_dissociation() {
        let window = vec![
            InteractionEvent::navigation(ts(0), "entry/new"),
            InteractionEvent::field_entry(ts(900), "severity", "7"),
        ];
        let gaps = detect(&window, ts(910));
        assert_eq!(gaps.len(), 1);
        assert!(!gaps[0].explained);
        assert!(gaps[0].likely_dissociation);
        assert!((gaps[0].duration_sec - 900.0).abs() < 0.001);
        assert!(confidence(&gaps) >= 0.7);
    }

    #[test]
    fn test_mid_length_unexplained_gap_scores_moderate() {
        let window = vec![
            InteractionEvent::navigation(ts(0), "a"),
            InteractionEvent::navigation(ts(450), "b"),
        ];
        let gaps = detect(&window, ts(460));
        assert_eq!(gaps.len(), 1);
        assert!(!gaps[0].likely_dissociation);
        let c = confidence(&gaps);
        assert!(c > 0.0 && c < 0.5);
    }

    #[test]
    fn test_trailing_open_gap() {
        let window = vec![InteractionEvent::navigation(ts(0), "a")];
        let gaps = detect(&window, ts(700));
        assert_eq!(gaps.len(), 1);
        assert!(!gaps[0].explained);
        assert!(gaps[0].likely_dissociation);
    }

    #[test]
    fn test_trailing_gap_after_background_is_explained() {
        let window = vec![
            InteractionEvent::navigation(ts(0), "a"),
            InteractionEvent::new(ts(10), EventKind::AppBackground),
        ];
        let gaps = detect(&window, ts(1200));
        assert_eq!(gaps.len(), 1);
        assert!(gaps[0].explained);
        assert_eq!(confidence(&gaps), 0.0);
    }

    #[test]
    fn test_determinism() {
        let window = vec![
            InteractionEvent::navigation(ts(0), "a"),
            InteractionEvent::navigation(ts(900), "b"),
        ];
        let first = detect(&window, ts(1000));
        for _ in 0..10 {
            assert_eq!(detect(&window, ts(1000)), first);
        }
    }
}
