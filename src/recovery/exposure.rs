//! Progressive feature exposure
//!
//! Interface complexity is gated to demonstrated recovery stability: each
//! milestone unlocks a feature set once the user has been stable long enough.
//! Exposure advances one level at a time, never skips ahead, and retreats for
//! at least one full week after any detected setback or relapse.

use crate::recovery::relapse::RegressionAnalysis;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// One exposure milestone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    /// Stable weeks required to unlock this level
    pub stable_weeks: u32,
    /// Features unlocked at this level
    pub features: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Gate mapping recovery duration to exposed feature sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureGate {
    milestones: Vec<Milestone>,
    level: usize,
    /// No advancement before this week (set after a regression)
    hold_until: Option<NaiveDate>,
}

impl Default for ExposureGate {
    fn default() -> Self {
        Self::new(Self::default_milestones())
    }
}

impl ExposureGate {
    pub fn new(milestones: Vec<Milestone>) -> Self {
        Self {
            milestones,
            level: 0,
            hold_until: None,
        }
    }

    /// Default milestone table for the host health tracker
    pub fn default_milestones() -> Vec<Milestone> {
        vec![
            Milestone {
                stable_weeks: 0,
                features: strings(&["entry", "mood"]),
            },
            Milestone {
                stable_weeks: 2,
                features: strings(&["history", "reminders"]),
            },
            Milestone {
                stable_weeks: 4,
                features: strings(&["trends", "report"]),
            },
            Milestone {
                stable_weeks: 8,
                features: strings(&["insights", "export"]),
            },
        ]
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Highest level the milestone table allows for a stability duration
    pub fn max_level_for(&self, stable_weeks: u32) -> usize {
        self.milestones
            .iter()
            .rposition(|m| m.stable_weeks <= stable_weeks)
            .unwrap_or(0)
    }

    /// Features exposed at the current level (union of unlocked milestones)
    pub fn exposed_features(&self) -> Vec<String> {
        self.milestones
            .iter()
            .take(self.level + 1)
            .flat_map(|m| m.features.iter().cloned())
            .collect()
    }

    /// Advance or retreat the gate for one week.
    ///
    /// `regression` is the regression detected in the week being evaluated,
    /// if any. On regression the gate retreats one level and freezes for a
    /// full week; otherwise it advances at most one level, and only when the
    /// stability duration has reached the next milestone.
    pub fn update(
        &mut self,
        week: NaiveDate,
        stable_weeks: u32,
        regression: Option<&RegressionAnalysis>,
    ) {
        if regression.is_some() {
            self.level = self.level.saturating_sub(1);
            self.hold_until = Some(week + Duration::weeks(1));
            return;
        }

        if let Some(hold) = self.hold_until {
            if week < hold {
                return;
            }
            self.hold_until = None;
        }

        let next = self.level + 1;
        if next < self.milestones.len() && stable_weeks >= self.milestones[next].stable_weeks {
            self.level = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::relapse::RegressionKind;

    fn week(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap() + Duration::weeks(n as i64)
    }

    fn regression(at: NaiveDate) -> RegressionAnalysis {
        RegressionAnalysis {
            kind: RegressionKind::Setback,
            spike_week: at,
            baseline: 1.0,
            peak: 5.0,
            elevated_weeks: 1,
        }
    }

    #[test]
    fn test_starts_at_base_level() {
        let gate = ExposureGate::default();
        assert_eq!(gate.level(), 0);
        let features = gate.exposed_features();
        assert!(features.contains(&"entry".to_string()));
        assert!(!features.contains(&"trends".to_string()));
    }

    #[test]
    fn test_advances_one_level_per_update() {
        let mut gate = ExposureGate::default();
        // Even with 10 stable weeks, one update moves one level only
        gate.update(week(10), 10, None);
        assert_eq!(gate.level(), 1);
        gate.update(week(11), 11, None);
        assert_eq!(gate.level(), 2);
    }

    #[test]
    fn test_never_exceeds_milestone_gate() {
        let mut gate = ExposureGate::default();
        for n in 0..20 {
            let stable = n;
            gate.update(week(n), stable, None);
            assert!(
                gate.level() <= gate.max_level_for(stable),
                "level {} exceeds gate for {} stable weeks",
                gate.level(),
                stable
            );
        }
    }

    #[test]
    fn test_does_not_advance_before_milestone() {
        let mut gate = ExposureGate::default();
        gate.update(week(1), 1, None);
        assert_eq!(gate.level(), 0);
        gate.update(week(2), 2, None);
        assert_eq!(gate.level(), 1);
    }

    #[test]
    fn test_regression_retreats_and_freezes_one_week() {
        let mut gate = ExposureGate::default();
        gate.update(week(2), 2, None);
        gate.update(week(4), 4, None);
        assert_eq!(gate.level(), 2);

        let setback = regression(week(5));
        gate.update(week(5), 0, Some(&setback));
        assert_eq!(gate.level(), 1);

        // Still inside the freeze window
        gate.update(week(5) + Duration::days(3), 2, None);
        assert_eq!(gate.level(), 1);

        // A full week later advancement resumes
        gate.update(week(6), 2, None);
        assert_eq!(gate.level(), 1);
        gate.update(week(7), 4, None);
        assert_eq!(gate.level(), 2);
    }

    #[test]
    fn test_retreat_does_not_underflow() {
        let mut gate = ExposureGate::default();
        let setback = regression(week(1));
        gate.update(week(1), 0, Some(&setback));
        assert_eq!(gate.level(), 0);
    }

    #[test]
    fn test_exposed_features_accumulate() {
        let mut gate = ExposureGate::default();
        gate.update(week(2), 2, None);
        let features = gate.exposed_features();
        assert!(features.contains(&"entry".to_string()));
        assert!(features.contains(&"history".to_string()));
        assert!(!features.contains(&"export".to_string()));
    }
}
