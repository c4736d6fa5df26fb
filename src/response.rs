//! Response controller
//!
//! A small state machine translating classification results into bounded,
//! reversible interface adaptations:
//! `Idle → Monitoring → Intervening → Cooldown → Idle`.
//!
//! Directives are values handed back to the host; the engine never touches
//! UI state itself. Every transition is logged locally for the recovery
//! tracker and for user-facing transparency, never for transmission.

use crate::profile::ResponseMode;
use crate::signatures::{InterventionUrgency, SignatureRegistry};
use crate::types::CrisisAssessment;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Seconds the triggering category must stay below threshold before an
/// intervention is lifted
pub const DEFAULT_CLEAR_SUSTAIN_SEC: i64 = 90;

/// Minimum dwell in cooldown before the controller can intervene again
pub const DEFAULT_COOLDOWN_DWELL_SEC: i64 = 600;

/// Transition log entries kept in memory
const MAX_TRANSITION_LOG: usize = 256;

/// Controller phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Idle,
    Monitoring,
    Intervening,
    Cooldown,
}

/// An adaptation currently applied to the interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationDirective {
    /// What the host should render
    pub mode: ResponseMode,
    /// Category that triggered the adaptation
    pub category: String,
    /// Whether the user can dismiss it
    pub dismissible: bool,
    /// When the adaptation was applied
    pub applied_at: DateTime<Utc>,
}

/// Change pushed to the host after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum AdaptationChange {
    /// A new adaptation should be rendered
    Applied(AdaptationDirective),
    /// The active adaptation should be removed
    Revoked {
        category: String,
        at: DateTime<Utc>,
        /// Minutes from intervention start to release
        recovery_minutes: f64,
    },
}

/// One logged state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub at: DateTime<Utc>,
    pub from: ControllerState,
    pub to: ControllerState,
    /// Category involved, when the transition concerns one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Action taken, e.g. "applied gentle_prompt" or "released"
    pub action: String,
}

/// Timing knobs for the controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimings {
    pub clear_sustain_sec: i64,
    pub cooldown_dwell_sec: i64,
}

impl Default for ResponseTimings {
    fn default() -> Self {
        Self {
            clear_sustain_sec: DEFAULT_CLEAR_SUSTAIN_SEC,
            cooldown_dwell_sec: DEFAULT_COOLDOWN_DWELL_SEC,
        }
    }
}

/// The response state machine
#[derive(Debug, Clone)]
pub struct ResponseController {
    state: ControllerState,
    active: Option<AdaptationDirective>,
    intervening_since: Option<DateTime<Utc>>,
    below_since: Option<DateTime<Utc>>,
    cooldown_since: Option<DateTime<Utc>>,
    transitions: Vec<TransitionRecord>,
    timings: ResponseTimings,
}

impl Default for ResponseController {
    fn default() -> Self {
        Self::new(ResponseTimings::default())
    }
}

impl ResponseController {
    pub fn new(timings: ResponseTimings) -> Self {
        Self {
            state: ControllerState::Idle,
            active: None,
            intervening_since: None,
            below_since: None,
            cooldown_since: None,
            transitions: Vec::new(),
            timings,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Currently applied adaptation, if any
    pub fn active_directive(&self) -> Option<&AdaptationDirective> {
        self.active.as_ref()
    }

    /// Local transition log, oldest first
    pub fn transition_log(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// Advance the state machine with one assessment.
    ///
    /// Called exactly once per analysis tick, after the assessment is fully
    /// computed, so a cancelled tick can never leave a partial transition.
    pub fn apply(
        &mut self,
        assessment: &CrisisAssessment,
        preferred: Option<ResponseMode>,
        registry: &SignatureRegistry,
        now: DateTime<Utc>,
    ) -> Option<AdaptationChange> {
        match self.state {
            ControllerState::Idle => {
                self.transition(ControllerState::Monitoring, now, None, "analysis active");
                self.intervene_if_detected(assessment, preferred, registry, now)
            }
            ControllerState::Monitoring => {
                self.intervene_if_detected(assessment, preferred, registry, now)
            }
            ControllerState::Intervening => {
                let triggering = self.active.as_ref().map(|d| d.category.clone());
                let still_elevated = assessment.detected_crisis.is_some()
                    && assessment.detected_crisis == triggering;

                if still_elevated {
                    self.below_since = None;
                    return None;
                }

                let below_since = *self.below_since.get_or_insert(now);
                if (now - below_since) < Duration::seconds(self.timings.clear_sustain_sec) {
                    return None;
                }

                let directive = self.active.take();
                let category = directive
                    .as_ref()
                    .map(|d| d.category.clone())
                    .unwrap_or_default();
                let recovery_minutes = self
                    .intervening_since
                    .map(|since| (now - since).num_milliseconds() as f64 / 60_000.0)
                    .unwrap_or(0.0);

                self.below_since = None;
                self.cooldown_since = Some(now);
                self.transition(
                    ControllerState::Cooldown,
                    now,
                    Some(category.clone()),
                    "released",
                );

                Some(AdaptationChange::Revoked {
                    category,
                    at: now,
                    recovery_minutes,
                })
            }
            ControllerState::Cooldown => {
                if assessment.detected_crisis.is_some() {
                    log::debug!(
                        "detection during cooldown suppressed: {:?}",
                        assessment.detected_crisis
                    );
                }
                let since = self.cooldown_since.unwrap_or(now);
                if (now - since) >= Duration::seconds(self.timings.cooldown_dwell_sec) {
                    self.cooldown_since = None;
                    self.intervening_since = None;
                    self.transition(ControllerState::Idle, now, None, "cooldown elapsed");
                }
                None
            }
        }
    }

    fn intervene_if_detected(
        &mut self,
        assessment: &CrisisAssessment,
        preferred: Option<ResponseMode>,
        registry: &SignatureRegistry,
        now: DateTime<Utc>,
    ) -> Option<AdaptationChange> {
        let category = assessment.detected_crisis.as_ref()?;

        let urgency = registry
            .get(category)
            .map(|s| s.urgency)
            .unwrap_or(InterventionUrgency::Gentle);
        let mode = preferred.unwrap_or_else(|| default_mode(urgency));

        let directive = AdaptationDirective {
            mode,
            category: category.clone(),
            dismissible: dismissible(mode),
            applied_at: now,
        };

        self.active = Some(directive.clone());
        self.intervening_since = Some(now);
        self.below_since = None;
        self.transition(
            ControllerState::Intervening,
            now,
            Some(category.clone()),
            format!("applied {}", mode_name(mode)),
        );

        Some(AdaptationChange::Applied(directive))
    }

    fn transition(
        &mut self,
        to: ControllerState,
        at: DateTime<Utc>,
        category: Option<String>,
        action: impl Into<String>,
    ) {
        let record = TransitionRecord {
            at,
            from: self.state,
            to,
            category,
            action: action.into(),
        };
        log::info!(
            "response controller {:?} -> {:?} ({})",
            record.from,
            record.to,
            record.action
        );
        self.state = to;
        self.transitions.push(record);
        if self.transitions.len() > MAX_TRANSITION_LOG {
            let excess = self.transitions.len() - MAX_TRANSITION_LOG;
            self.transitions.drain(..excess);
        }
    }
}

/// Fallback adaptation for a category's urgency when the user expressed no
/// preference
fn default_mode(urgency: InterventionUrgency) -> ResponseMode {
    match urgency {
        InterventionUrgency::Immediate => ResponseMode::SimplifyImmediately,
        InterventionUrgency::Gentle => ResponseMode::GentlePrompt,
        InterventionUrgency::Delayed => ResponseMode::ShowResources,
    }
}

fn dismissible(mode: ResponseMode) -> bool {
    !matches!(mode, ResponseMode::SimplifyImmediately)
}

fn mode_name(mode: ResponseMode) -> &'static str {
    match mode {
        ResponseMode::GentlePrompt => "gentle_prompt",
        ResponseMode::ShowResources => "show_resources",
        ResponseMode::SimplifyImmediately => "simplify_immediately",
        ResponseMode::DoNothing => "do_nothing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::{DISSOCIATION, PANIC_ATTACK};
    use crate::types::{AssessmentQualityFlag, CrisisAssessment};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn ts(sec: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::seconds(sec)
    }

    fn assessment(detected: Option<&str>, at: DateTime<Utc>) -> CrisisAssessment {
        CrisisAssessment {
            id: Uuid::new_v4(),
            assessed_at: at,
            detected_crisis: detected.map(|s| s.to_string()),
            confidence: if detected.is_some() { 0.8 } else { 0.7 },
            signals: vec![],
            alternative_hypotheses: vec![],
            coverage: 1.0,
            quality_flags: Vec::<AssessmentQualityFlag>::new(),
        }
    }

    fn controller() -> ResponseController {
        ResponseController::new(ResponseTimings {
            clear_sustain_sec: 90,
            cooldown_dwell_sec: 600,
        })
    }

    #[test]
    fn test_idle_moves_to_monitoring_on_first_tick() {
        let registry = SignatureRegistry::builtin();
        let mut ctl = controller();

        let change = ctl.apply(&assessment(None, ts(0)), None, &registry, ts(0));
        assert!(change.is_none());
        assert_eq!(ctl.state(), ControllerState::Monitoring);
    }

    #[test]
    fn test_detection_applies_urgency_default_mode() {
        let registry = SignatureRegistry::builtin();
        let mut ctl = controller();

        ctl.apply(&assessment(None, ts(0)), None, &registry, ts(0));
        let change = ctl
            .apply(&assessment(Some(PANIC_ATTACK), ts(5)), None, &registry, ts(5))
            .unwrap();

        match change {
            AdaptationChange::Applied(directive) => {
                assert_eq!(directive.mode, ResponseMode::SimplifyImmediately);
                assert_eq!(directive.category, PANIC_ATTACK);
                assert!(!directive.dismissible);
            }
            other => panic!("expected Applied, got {:?}", other),
        }
        assert_eq!(ctl.state(), ControllerState::Intervening);
    }

    #[test]
    fn test_preferred_mode_overrides_default() {
        let registry = SignatureRegistry::builtin();
        let mut ctl = controller();

        ctl.apply(&assessment(None, ts(0)), None, &registry, ts(0));
        let change = ctl
            .apply(
                &assessment(Some(PANIC_ATTACK), ts(5)),
                Some(ResponseMode::GentlePrompt),
                &registry,
                ts(5),
            )
            .unwrap();

        match change {
            AdaptationChange::Applied(directive) => {
                assert_eq!(directive.mode, ResponseMode::GentlePrompt);
                assert!(directive.dismissible);
            }
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[test]
    fn test_release_requires_sustained_clearance() {
        let registry = SignatureRegistry::builtin();
        let mut ctl = controller();

        ctl.apply(&assessment(None, ts(0)), None, &registry, ts(0));
        ctl.apply(&assessment(Some(DISSOCIATION), ts(5)), None, &registry, ts(5));

        // First clear tick starts the sustain clock; no release yet
        assert!(ctl
            .apply(&assessment(None, ts(30)), None, &registry, ts(30))
            .is_none());
        assert_eq!(ctl.state(), ControllerState::Intervening);

        // A re-detection resets the clock
        ctl.apply(&assessment(Some(DISSOCIATION), ts(60)), None, &registry, ts(60));
        assert!(ctl
            .apply(&assessment(None, ts(100)), None, &registry, ts(100))
            .is_none());

        // Sustained clearance releases
        let change = ctl
            .apply(&assessment(None, ts(200)), None, &registry, ts(200))
            .unwrap();
        match change {
            AdaptationChange::Revoked {
                category,
                recovery_minutes,
                ..
            } => {
                assert_eq!(category, DISSOCIATION);
                assert!(recovery_minutes > 0.0);
            }
            other => panic!("expected Revoked, got {:?}", other),
        }
        assert_eq!(ctl.state(), ControllerState::Cooldown);
    }

    #[test]
    fn test_cooldown_suppresses_reintervention_until_dwell() {
        let registry = SignatureRegistry::builtin();
        let mut ctl = controller();

        ctl.apply(&assessment(None, ts(0)), None, &registry, ts(0));
        ctl.apply(&assessment(Some(PANIC_ATTACK), ts(5)), None, &registry, ts(5));
        ctl.apply(&assessment(None, ts(10)), None, &registry, ts(10));
        ctl.apply(&assessment(None, ts(150)), None, &registry, ts(150));
        assert_eq!(ctl.state(), ControllerState::Cooldown);

        // Detection during cooldown is suppressed
        let change = ctl.apply(
            &assessment(Some(PANIC_ATTACK), ts(200)),
            None,
            &registry,
            ts(200),
        );
        assert!(change.is_none());
        assert_eq!(ctl.state(), ControllerState::Cooldown);

        // After the dwell the controller returns to idle
        ctl.apply(&assessment(None, ts(800)), None, &registry, ts(800));
        assert_eq!(ctl.state(), ControllerState::Idle);

        // And can intervene again on the next pass
        ctl.apply(&assessment(None, ts(805)), None, &registry, ts(805));
        let change = ctl.apply(
            &assessment(Some(PANIC_ATTACK), ts(810)),
            None,
            &registry,
            ts(810),
        );
        assert!(matches!(change, Some(AdaptationChange::Applied(_))));
    }

    #[test]
    fn test_transitions_are_logged() {
        let registry = SignatureRegistry::builtin();
        let mut ctl = controller();

        ctl.apply(&assessment(None, ts(0)), None, &registry, ts(0));
        ctl.apply(&assessment(Some(PANIC_ATTACK), ts(5)), None, &registry, ts(5));

        let log = ctl.transition_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].from, ControllerState::Idle);
        assert_eq!(log[0].to, ControllerState::Monitoring);
        assert_eq!(log[1].to, ControllerState::Intervening);
        assert_eq!(log[1].category.as_deref(), Some(PANIC_ATTACK));
        assert!(log[1].action.contains("simplify_immediately"));
    }

    #[test]
    fn test_do_nothing_preference_logs_but_stays_invisible() {
        let registry = SignatureRegistry::builtin();
        let mut ctl = controller();

        ctl.apply(&assessment(None, ts(0)), None, &registry, ts(0));
        let change = ctl
            .apply(
                &assessment(Some(DISSOCIATION), ts(5)),
                Some(ResponseMode::DoNothing),
                &registry,
                ts(5),
            )
            .unwrap();

        match change {
            AdaptationChange::Applied(directive) => {
                assert_eq!(directive.mode, ResponseMode::DoNothing);
                assert!(directive.dismissible);
            }
            other => panic!("expected Applied, got {:?}", other),
        }
        assert!(ctl
            .transition_log()
            .last()
            .unwrap()
            .action
            .contains("do_nothing"));
    }
}
