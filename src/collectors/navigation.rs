//! Navigation entropy and abrupt-exit detection
//!
//! Entropy combines navigation speed, gap erraticism, and page circling into
//! a single 0-1 score. A separate abrupt-exit check flags an app closure that
//! terminates a rapid navigation burst.

use crate::types::{EventKind, InteractionEvent};
use std::collections::HashSet;

/// Minimum navigation events required before entropy is defined
pub const MIN_NAVIGATION_EVENTS: usize = 3;

/// Inter-navigation gap (seconds) treated as maximally rapid
const RAPID_GAP_SEC: f64 = 2.0;

/// Maximum seconds between the last navigation and an app close for the
/// closure to count as abrupt
const ABRUPT_EXIT_HORIZON_SEC: f64 = 4.0;

/// Weight of the speed component in the entropy score
const SPEED_WEIGHT: f64 = 0.4;
/// Weight of the erraticism component
const ERRATICISM_WEIGHT: f64 = 0.3;
/// Weight of the circling component
const CIRCLING_WEIGHT: f64 = 0.3;

/// Decomposed navigation entropy
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationAnalysis {
    /// Combined entropy (0-1); 0 when fewer than 3 navigation events
    pub entropy: f64,
    /// Inverse mean inter-navigation time, normalized (0-1)
    pub speed: f64,
    /// Coefficient of variation of inter-navigation gaps (0-1)
    pub erraticism: f64,
    /// One minus unique-page ratio (0-1)
    pub circling: f64,
    /// Number of navigation events in the window
    pub navigation_count: u32,
}

impl NavigationAnalysis {
    fn quiet(navigation_count: u32) -> Self {
        Self {
            entropy: 0.0,
            speed: 0.0,
            erraticism: 0.0,
            circling: 0.0,
            navigation_count,
        }
    }
}

/// Compute navigation entropy over the window.
///
/// Returns a zero analysis (never a false positive) when the window holds
/// fewer than [`MIN_NAVIGATION_EVENTS`] navigations.
pub fn analyze(window: &[InteractionEvent]) -> NavigationAnalysis {
    let navs: Vec<&InteractionEvent> = window
        .iter()
        .filter(|e| e.kind == EventKind::Navigation)
        .collect();

    if navs.len() < MIN_NAVIGATION_EVENTS {
        return NavigationAnalysis::quiet(navs.len() as u32);
    }

    let gaps: Vec<f64> = navs
        .windows(2)
        .map(|pair| (pair[1].timestamp - pair[0].timestamp).num_milliseconds() as f64 / 1000.0)
        .collect();

    let mean_gap = gaps.iter().sum::<f64>() / gaps.len() as f64;

    let speed = if mean_gap <= 0.0 {
        1.0
    } else {
        (RAPID_GAP_SEC / mean_gap).clamp(0.0, 1.0)
    };

    let erraticism = if mean_gap > 0.0 {
        let variance =
            gaps.iter().map(|g| (g - mean_gap).powi(2)).sum::<f64>() / gaps.len() as f64;
        (variance.sqrt() / mean_gap).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let unique_pages: HashSet<&str> = navs.iter().filter_map(|e| e.page.as_deref()).collect();
    let circling = (1.0 - unique_pages.len() as f64 / navs.len() as f64).clamp(0.0, 1.0);

    let entropy = (SPEED_WEIGHT * speed + ERRATICISM_WEIGHT * erraticism + CIRCLING_WEIGHT * circling)
        .clamp(0.0, 1.0);

    NavigationAnalysis {
        entropy,
        speed,
        erraticism,
        circling,
        navigation_count: navs.len() as u32,
    }
}

/// Detect an abrupt exit: an app close within a few seconds of a rapid
/// navigation burst. Returns a confidence, or `None` when the window does not
/// end in such a closure.
pub fn abrupt_exit(window: &[InteractionEvent]) -> Option<f64> {
    let close = window.last().filter(|e| e.kind == EventKind::AppClose)?;
    let last_nav = window
        .iter()
        .rev()
        .find(|e| e.kind == EventKind::Navigation)?;

    let close_gap = (close.timestamp - last_nav.timestamp).num_milliseconds() as f64 / 1000.0;
    if close_gap > ABRUPT_EXIT_HORIZON_SEC {
        return None;
    }

    let analysis = analyze(window);
    if analysis.navigation_count < MIN_NAVIGATION_EVENTS as u32 || analysis.speed < 0.5 {
        return None;
    }

    Some((0.5 + 0.5 * analysis.speed).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn ts(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::milliseconds(ms)
    }

    fn nav_trace(gaps_ms: &[i64], pages: &[&str]) -> Vec<InteractionEvent> {
        let mut t = 0;
        let mut events = vec![InteractionEvent::navigation(ts(0), pages[0])];
        for (i, gap) in gaps_ms.iter().enumerate() {
            t += gap;
            events.push(InteractionEvent::navigation(ts(t), pages[i + 1]));
        }
        events
    }

    #[test]
    fn test_too_few_navigations_is_zero() {
        let events = nav_trace(&[500], &["a", "b"]);
        let analysis = analyze(&events);
        assert_eq!(analysis.entropy, 0.0);
        assert_eq!(analysis.navigation_count, 2);
    }

    #[test]
    fn test_rapid_circling_scores_high() {
        // Erratic sub-second gaps over two pages
        let events = nav_trace(
            &[200, 800, 150, 900, 200, 1000, 250],
            &["a", "b", "a", "b", "a", "b", "a", "b"],
        );
        let analysis = analyze(&events);

        assert_eq!(analysis.speed, 1.0);
        assert!(analysis.erraticism > 0.5);
        assert!((analysis.circling - 0.75).abs() < 0.001);
        assert!(analysis.entropy > 0.75);
    }

    #[test]
    fn test_methodical_browsing_scores_low() {
        // Distinct pages, ~20s apart, steady cadence
        let events = nav_trace(
            &[20_000, 21_000, 19_000, 20_500, 20_000],
            &["settings", "profile", "help", "about", "entry/new", "home"],
        );
        let analysis = analyze(&events);

        assert!(analysis.speed < 0.15);
        assert!(analysis.erraticism < 0.1);
        assert_eq!(analysis.circling, 0.0);
        assert!(analysis.entropy < 0.1);
    }

    #[test]
    fn test_determinism() {
        let events = nav_trace(&[300, 700, 400], &["a", "b", "a", "c"]);
        let first = analyze(&events);
        for _ in 0..10 {
            assert_eq!(analyze(&events), first);
        }
    }

    #[test]
    fn test_abrupt_exit_after_rapid_burst() {
        let mut events = nav_trace(
            &[200, 800, 150, 900, 200, 1000, 250],
            &["a", "b", "a", "b", "a", "b", "a", "b"],
        );
        let last = events.last().unwrap().timestamp;
        events.push(InteractionEvent::new(
            last + Duration::seconds(2),
            EventKind::AppClose,
        ));

        let confidence = abrupt_exit(&events).unwrap();
        assert!(confidence > 0.9);
    }

    #[test]
    fn test_no_abrupt_exit_without_close() {
        let events = nav_trace(&[200, 300, 250], &["a", "b", "a", "b"]);
        assert!(abrupt_exit(&events).is_none());
    }

    #[test]
    fn test_no_abrupt_exit_after_slow_browsing() {
        let mut events = nav_trace(&[20_000, 25_000, 22_000], &["a", "b", "c", "d"]);
        let last = events.last().unwrap().timestamp;
        events.push(InteractionEvent::new(
            last + Duration::seconds(2),
            EventKind::AppClose,
        ));

        assert!(abrupt_exit(&events).is_none());
    }

    #[test]
    fn test_close_long_after_navigation_is_not_abrupt() {
        let mut events = nav_trace(&[300, 400, 350], &["a", "b", "a", "b"]);
        let last = events.last().unwrap().timestamp;
        events.push(InteractionEvent::new(
            last + Duration::seconds(30),
            EventKind::AppClose,
        ));

        assert!(abrupt_exit(&events).is_none());
    }
}
