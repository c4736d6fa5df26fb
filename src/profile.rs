//! User crisis profile and personalization
//!
//! The profile holds declared conditions, a learned behavioral baseline, and
//! user-authored custom indicators. Personalization is a pure transform: an
//! immutable profile snapshot plus the signature registry yield a threshold
//! table for one classification pass. Profile updates are explicit
//! copy-on-write operations; the classifier never mutates the profile.

use crate::signatures::SignatureRegistry;
use crate::types::{DetectedSignal, InteractionEvent};
use crate::collectors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Population-default seconds spent per page while navigating
pub const POPULATION_NAV_SECONDS_PER_PAGE: f64 = 8.0;

/// A user must be at least this much faster than the population default
/// before the navigation threshold is rescaled
const MATERIAL_BASELINE_RATIO: f64 = 1.25;

/// Cap on the navigation-baseline threshold scale
const NAV_BASELINE_MAX_SCALE: f64 = 1.5;

/// Confidence assigned to signals injected from custom indicator matches
pub const SELF_REPORT_CONFIDENCE: f64 = 0.85;

/// Per-signal multiplier bounds for declared conditions
const CONDITION_FACTOR_MIN: f64 = 0.25;
const CONDITION_FACTOR_MAX: f64 = 4.0;

/// How the user prefers the interface to respond to a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Non-blocking, dismissible suggestion
    GentlePrompt,
    /// Passive resource display, no navigation change
    ShowResources,
    /// Hard-switch to a reduced-complexity presentation
    SimplifyImmediately,
    /// Log only, no visible change
    DoNothing,
}

/// A condition the user has declared, with per-signal threshold multipliers.
///
/// A factor above 1 raises the bar for that signal (less sensitive), below 1
/// lowers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclaredCondition {
    /// Condition name, e.g. "adhd" or "fibromyalgia"
    pub name: String,
    /// Signal name to threshold multiplier
    pub adjustments: HashMap<String, f64>,
}

impl DeclaredCondition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            adjustments: HashMap::new(),
        }
    }

    pub fn with_adjustment(mut self, signal: impl Into<String>, factor: f64) -> Self {
        self.adjustments.insert(signal.into(), factor);
        self
    }
}

/// User-authored custom indicator: a free-text description plus the behavior
/// tags that should trigger it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomIndicator {
    /// Free-text description in the user's own words
    pub description: String,
    /// Trigger tags matched against signal names and event kinds
    pub trigger_tags: Vec<String>,
}

/// Rolling statistics of the user's own "normal"
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnedBaseline {
    /// Mean seconds between navigations
    pub nav_seconds_per_page: Option<f64>,
    /// Mean session length in minutes
    pub mean_session_minutes: Option<f64>,
    /// Sessions folded into the baseline
    pub sessions_observed: u32,
}

impl LearnedBaseline {
    /// Fold one observed session into the rolling means.
    pub fn absorbing(&self, nav_seconds_per_page: Option<f64>, session_minutes: f64) -> Self {
        let n = self.sessions_observed as f64;
        let merge = |prior: Option<f64>, obs: f64| match prior {
            Some(p) => Some((p * n + obs) / (n + 1.0)),
            None => Some(obs),
        };
        Self {
            nav_seconds_per_page: match nav_seconds_per_page {
                Some(gap) => merge(self.nav_seconds_per_page, gap),
                None => self.nav_seconds_per_page,
            },
            mean_session_minutes: merge(self.mean_session_minutes, session_minutes),
            sessions_observed: self.sessions_observed + 1,
        }
    }
}

/// Per-user crisis profile, persisted locally and never synchronized
/// off-device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCrisisProfile {
    /// Stable profile identifier
    pub id: Uuid,
    /// Declared conditions with threshold multipliers
    pub conditions: Vec<DeclaredCondition>,
    /// Learned baseline behavior
    pub baseline: LearnedBaseline,
    /// User-authored custom indicators
    pub custom_indicators: Vec<CustomIndicator>,
    /// Preferred response mode; `None` falls back to the category default
    pub preferred_response: Option<ResponseMode>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for UserCrisisProfile {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            conditions: Vec::new(),
            baseline: LearnedBaseline::default(),
            custom_indicators: Vec::new(),
            preferred_response: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl UserCrisisProfile {
    /// Copy-on-write: add a declared condition.
    pub fn with_condition(&self, condition: DeclaredCondition) -> Self {
        let mut next = self.clone();
        next.conditions.retain(|c| c.name != condition.name);
        next.conditions.push(condition);
        next.updated_at = Utc::now();
        next
    }

    /// Copy-on-write: add a custom indicator.
    pub fn with_custom_indicator(&self, indicator: CustomIndicator) -> Self {
        let mut next = self.clone();
        next.custom_indicators.push(indicator);
        next.updated_at = Utc::now();
        next
    }

    /// Copy-on-write: set the preferred response mode.
    pub fn with_preferred_response(&self, mode: Option<ResponseMode>) -> Self {
        let mut next = self.clone();
        next.preferred_response = mode;
        next.updated_at = Utc::now();
        next
    }

    /// Copy-on-write: fold an observed session into the learned baseline.
    pub fn with_observed_session(
        &self,
        nav_seconds_per_page: Option<f64>,
        session_minutes: f64,
    ) -> Self {
        let mut next = self.clone();
        next.baseline = self.baseline.absorbing(nav_seconds_per_page, session_minutes);
        next.updated_at = Utc::now();
        next
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Adjusted thresholds for one classification pass
#[derive(Debug, Clone)]
pub struct ThresholdTable {
    signal_multipliers: HashMap<String, f64>,
    effective: HashMap<String, f64>,
}

impl ThresholdTable {
    /// Build the threshold table from an immutable profile snapshot.
    ///
    /// `recovery_hint` is the longitudinal feedback multiplier (1.0 neutral);
    /// it is clamped so the loop can only nudge, never dominate.
    pub fn build(
        profile: &UserCrisisProfile,
        registry: &SignatureRegistry,
        recovery_hint: f64,
    ) -> Self {
        let mut multipliers: HashMap<String, f64> = HashMap::new();

        for condition in &profile.conditions {
            for (signal, factor) in &condition.adjustments {
                let factor = factor.clamp(CONDITION_FACTOR_MIN, CONDITION_FACTOR_MAX);
                *multipliers.entry(signal.clone()).or_insert(1.0) *= factor;
            }
        }

        // Compare the user to themselves: a habitually fast navigator gets a
        // proportionally higher navigation-entropy bar.
        if let Some(user_gap) = profile.baseline.nav_seconds_per_page {
            if user_gap > 0.0 && POPULATION_NAV_SECONDS_PER_PAGE / user_gap >= MATERIAL_BASELINE_RATIO
            {
                let scale =
                    (POPULATION_NAV_SECONDS_PER_PAGE / user_gap).min(NAV_BASELINE_MAX_SCALE);
                *multipliers
                    .entry(collectors::SIG_NAVIGATION_ENTROPY.to_string())
                    .or_insert(1.0) *= scale;
            }
        }

        let hint = recovery_hint.clamp(0.8, 1.2);
        let mut effective = HashMap::new();
        for signature in registry.iter() {
            let weight_sum: f64 = signature.markers.iter().map(|m| m.weight).sum();
            let multiplier = if weight_sum > 0.0 {
                signature
                    .markers
                    .iter()
                    .map(|m| m.weight * multipliers.get(&m.signal).copied().unwrap_or(1.0))
                    .sum::<f64>()
                    / weight_sum
            } else {
                1.0
            };
            let threshold = (signature.base_threshold * multiplier * hint).clamp(0.05, 0.95);
            effective.insert(signature.category.clone(), threshold);
        }

        Self {
            signal_multipliers: multipliers,
            effective,
        }
    }

    /// Effective threshold for a category (falls back to 0.95 for an unknown
    /// category so nothing fires accidentally)
    pub fn effective_threshold(&self, category: &str) -> f64 {
        self.effective.get(category).copied().unwrap_or(0.95)
    }

    /// Combined multiplier applied to a signal's thresholds
    pub fn signal_multiplier(&self, signal: &str) -> f64 {
        self.signal_multipliers.get(signal).copied().unwrap_or(1.0)
    }
}

/// Scan current signals and the event window against the user's custom
/// indicators; every match is injected as a high-confidence self-reported
/// signal.
pub fn match_custom_indicators(
    profile: &UserCrisisProfile,
    computed: &[DetectedSignal],
    window: &[InteractionEvent],
) -> Vec<DetectedSignal> {
    let mut injected = Vec::new();

    for indicator in &profile.custom_indicators {
        for tag in &indicator.trigger_tags {
            let signal_match = computed.iter().any(|s| s.name == *tag);
            let event_match = window.iter().any(|e| e.kind.as_str() == tag);
            if signal_match || event_match {
                injected.push(DetectedSignal::self_reported(
                    tag.clone(),
                    SELF_REPORT_CONFIDENCE,
                    indicator.description.clone(),
                ));
            }
        }
    }

    injected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{SIG_NAVIGATION_ENTROPY, SIG_PREFERENCE_CHURN};
    use crate::signatures::{SENSORY_OVERLOAD, PANIC_ATTACK};

    #[test]
    fn test_default_profile_has_neutral_thresholds() {
        let profile = UserCrisisProfile::default();
        let registry = SignatureRegistry::builtin();
        let table = ThresholdTable::build(&profile, &registry, 1.0);

        for signature in registry.iter() {
            assert!(
                (table.effective_threshold(&signature.category) - signature.base_threshold).abs()
                    < 1e-9
            );
        }
    }

    #[test]
    fn test_condition_factor_raises_threshold() {
        let registry = SignatureRegistry::builtin();
        let profile = UserCrisisProfile::default().with_condition(
            DeclaredCondition::new("adhd").with_adjustment(SIG_PREFERENCE_CHURN, 1.5),
        );
        let table = ThresholdTable::build(&profile, &registry, 1.0);

        let base = registry.get(SENSORY_OVERLOAD).unwrap().base_threshold;
        assert!(table.effective_threshold(SENSORY_OVERLOAD) > base);
        // Unrelated category is untouched
        let panic_base = registry.get(PANIC_ATTACK).unwrap().base_threshold;
        assert!((table.effective_threshold(PANIC_ATTACK) - panic_base).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_monotonicity_in_factor() {
        let registry = SignatureRegistry::builtin();
        let mut previous = 0.0;
        for step in 0..12 {
            let factor = 1.0 + step as f64 * 0.25;
            let profile = UserCrisisProfile::default().with_condition(
                DeclaredCondition::new("adhd").with_adjustment(SIG_PREFERENCE_CHURN, factor),
            );
            let table = ThresholdTable::build(&profile, &registry, 1.0);
            let threshold = table.effective_threshold(SENSORY_OVERLOAD);
            assert!(
                threshold >= previous,
                "threshold decreased at factor {}",
                factor
            );
            previous = threshold;
        }
    }

    #[test]
    fn test_fast_navigator_baseline_raises_navigation_bar() {
        let registry = SignatureRegistry::builtin();
        let fast = UserCrisisProfile::default().with_observed_session(Some(3.0), 12.0);
        let table = ThresholdTable::build(&fast, &registry, 1.0);

        assert!(table.signal_multiplier(SIG_NAVIGATION_ENTROPY) > 1.0);
        let base = registry.get(PANIC_ATTACK).unwrap().base_threshold;
        assert!(table.effective_threshold(PANIC_ATTACK) > base);
    }

    #[test]
    fn test_average_navigator_baseline_is_neutral() {
        let registry = SignatureRegistry::builtin();
        let average = UserCrisisProfile::default().with_observed_session(Some(8.0), 10.0);
        let table = ThresholdTable::build(&average, &registry, 1.0);
        assert!((table.signal_multiplier(SIG_NAVIGATION_ENTROPY) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_absorbing_rolls_means() {
        let baseline = LearnedBaseline::default()
            .absorbing(Some(4.0), 10.0)
            .absorbing(Some(6.0), 20.0);
        assert!((baseline.nav_seconds_per_page.unwrap() - 5.0).abs() < 1e-9);
        assert!((baseline.mean_session_minutes.unwrap() - 15.0).abs() < 1e-9);
        assert_eq!(baseline.sessions_observed, 2);
    }

    #[test]
    fn test_copy_on_write_leaves_original_untouched() {
        let original = UserCrisisProfile::default();
        let edited = original.with_preferred_response(Some(ResponseMode::GentlePrompt));

        assert!(original.preferred_response.is_none());
        assert_eq!(edited.preferred_response, Some(ResponseMode::GentlePrompt));
        assert_eq!(original.id, edited.id);
    }

    #[test]
    fn test_custom_indicator_signal_match() {
        let profile = UserCrisisProfile::default().with_custom_indicator(CustomIndicator {
            description: "I toggle dark mode when light hurts".to_string(),
            trigger_tags: vec![SIG_PREFERENCE_CHURN.to_string()],
        });
        let computed = vec![DetectedSignal::computed(SIG_PREFERENCE_CHURN, 0.6, "churn")];

        let injected = match_custom_indicators(&profile, &computed, &[]);
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].name, SIG_PREFERENCE_CHURN);
        assert_eq!(injected[0].confidence, SELF_REPORT_CONFIDENCE);
        assert_eq!(injected[0].source, crate::types::SignalSource::SelfReported);
    }

    #[test]
    fn test_custom_indicator_event_kind_match() {
        let profile = UserCrisisProfile::default().with_custom_indicator(CustomIndicator {
            description: "Backing out of forms means I am struggling".to_string(),
            trigger_tags: vec!["form_abandon".to_string()],
        });
        let window = vec![InteractionEvent::new(
            Utc::now(),
            crate::types::EventKind::FormAbandon,
        )];

        let injected = match_custom_indicators(&profile, &[], &window);
        assert_eq!(injected.len(), 1);
        assert_eq!(injected[0].name, "form_abandon");
    }

    #[test]
    fn test_no_indicator_match_injects_nothing() {
        let profile = UserCrisisProfile::default().with_custom_indicator(CustomIndicator {
            description: "irrelevant".to_string(),
            trigger_tags: vec!["abrupt_exit".to_string()],
        });
        assert!(match_custom_indicators(&profile, &[], &[]).is_empty());
    }

    #[test]
    fn test_profile_json_round_trip() {
        let profile = UserCrisisProfile::default()
            .with_condition(DeclaredCondition::new("cfs").with_adjustment("repetition", 1.3))
            .with_preferred_response(Some(ResponseMode::ShowResources));

        let json = profile.to_json().unwrap();
        let parsed = UserCrisisProfile::from_json(&json).unwrap();
        assert_eq!(parsed, profile);
    }
}
