//! Engine orchestration
//!
//! [`CrisisEngine`] wires the pipeline together: buffered events are pulled
//! through the collectors, personalized thresholds, and the classifier inside
//! a single synchronous analysis tick, and the resulting assessment drives
//! the response controller and the recovery tracker. Ticks are serialized by
//! a re-entrancy guard; a tick that cannot run is dropped and logged, never
//! queued behind a running one.

use crate::buffer::{EventBuffer, DEFAULT_BUFFER_CAPACITY, DEFAULT_BUFFER_MAX_AGE_SEC};
use crate::classifier;
use crate::collectors::{self, CollectorSet};
use crate::collectors::flows::FlowCatalog;
use crate::error::EngineError;
use crate::profile::{self, ThresholdTable, UserCrisisProfile};
use crate::recovery::RecoveryTracker;
use crate::response::{
    AdaptationChange, AdaptationDirective, ControllerState, ResponseController, ResponseTimings,
    TransitionRecord,
};
use crate::signatures::SignatureRegistry;
use crate::storage::StateStore;
use crate::types::{CrisisAssessment, InteractionEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engine construction knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum buffered events
    pub buffer_capacity: usize,
    /// Maximum buffered event age in seconds
    pub buffer_max_age_sec: i64,
    /// Expected multi-step flows of the host app
    pub flow_catalog: FlowCatalog,
    /// Response controller timings
    pub timings: ResponseTimings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            buffer_max_age_sec: DEFAULT_BUFFER_MAX_AGE_SEC,
            flow_catalog: FlowCatalog::health_tracking_defaults(),
            timings: ResponseTimings::default(),
        }
    }
}

/// Result of one analysis tick
#[derive(Debug, Clone)]
pub struct TickOutcome {
    /// True when the tick was dropped by the re-entrancy guard
    pub dropped: bool,
    /// The assessment produced (absent for a dropped tick)
    pub assessment: Option<CrisisAssessment>,
    /// Adaptation change for the host to render, if any
    pub change: Option<AdaptationChange>,
}

impl TickOutcome {
    fn dropped() -> Self {
        Self {
            dropped: true,
            assessment: None,
            change: None,
        }
    }
}

/// The behavioral crisis detection engine
pub struct CrisisEngine {
    registry: SignatureRegistry,
    collectors: CollectorSet,
    buffer: EventBuffer,
    profile: UserCrisisProfile,
    controller: ResponseController,
    tracker: RecoveryTracker,
    store: Option<Box<dyn StateStore>>,
    in_tick: bool,
}

impl CrisisEngine {
    /// Build an engine with the built-in signature registry.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_registry(config, SignatureRegistry::builtin())
    }

    /// Build an engine with a custom signature registry.
    ///
    /// Registry misconfiguration (a marker no collector produces) is fatal
    /// here rather than a runtime surprise.
    pub fn with_registry(
        config: EngineConfig,
        registry: SignatureRegistry,
    ) -> Result<Self, EngineError> {
        registry.validate(collectors::known_signals())?;
        Ok(Self {
            registry,
            collectors: CollectorSet::new(config.flow_catalog.clone()),
            buffer: EventBuffer::new(config.buffer_capacity, config.buffer_max_age_sec),
            profile: UserCrisisProfile::default(),
            controller: ResponseController::new(config.timings),
            tracker: RecoveryTracker::new(),
            store: None,
            in_tick: false,
        })
    }

    /// Build an engine backed by an injected local store.
    ///
    /// A malformed persisted profile falls back to population defaults and is
    /// logged locally; it never fails construction. An unreadable snapshot
    /// history degrades to an empty one the same way.
    pub fn with_store(
        config: EngineConfig,
        store: Box<dyn StateStore>,
    ) -> Result<Self, EngineError> {
        let mut engine = Self::new(config)?;

        match store.load_profile() {
            Ok(Some(profile)) => engine.profile = profile,
            Ok(None) => {}
            Err(e) => {
                log::warn!("personalization reset: stored profile unusable ({})", e);
            }
        }
        match store.load_snapshots() {
            Ok(snapshots) => engine.tracker = RecoveryTracker::with_snapshots(snapshots),
            Err(e) => {
                log::warn!("snapshot history unavailable, starting empty ({})", e);
            }
        }

        engine.store = Some(store);
        Ok(engine)
    }

    /// Ingest one interaction event. Fire-and-forget: never blocks, never
    /// fails.
    pub fn record_event(&mut self, event: InteractionEvent) {
        self.tracker.observe_event(&event);
        self.buffer.push(event);
    }

    /// Run one analysis tick at `now`.
    ///
    /// The assessment is computed fully before any state is mutated, so a
    /// tick abandoned mid-computation leaves the controller untouched. Two
    /// ticks never interleave: a tick arriving while one is in progress is
    /// dropped and logged.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if self.in_tick {
            log::warn!("analysis tick dropped: previous tick still in progress");
            return TickOutcome::dropped();
        }
        self.in_tick = true;

        let newly_finalized = self.tracker.finalize_through(now);
        if newly_finalized > 0 {
            self.persist_snapshots();
        }

        let output = self.collectors.collect(self.buffer.window(), now);
        let mut signals = output.signals;
        let injected =
            profile::match_custom_indicators(&self.profile, &signals, self.buffer.window());
        signals.extend(injected);

        let thresholds = ThresholdTable::build(
            &self.profile,
            &self.registry,
            self.tracker.sensitivity_hint(),
        );
        let assessment =
            classifier::classify(&self.registry, &thresholds, signals, output.coverage, now);

        if assessment.detected_crisis.is_some() {
            self.tracker.observe_assessment(&assessment);
        }

        let change = self.controller.apply(
            &assessment,
            self.profile.preferred_response,
            &self.registry,
            now,
        );
        if let Some(AdaptationChange::Revoked {
            recovery_minutes, ..
        }) = &change
        {
            self.tracker.observe_recovery(*recovery_minutes, now);
        }

        self.in_tick = false;
        TickOutcome {
            dropped: false,
            assessment: Some(assessment),
            change,
        }
    }

    /// Current profile snapshot.
    pub fn profile(&self) -> &UserCrisisProfile {
        &self.profile
    }

    /// Apply an explicit, user-initiated profile edit (copy-on-write) and
    /// persist it.
    pub fn update_profile(
        &mut self,
        edit: impl FnOnce(&UserCrisisProfile) -> UserCrisisProfile,
    ) {
        self.profile = edit(&self.profile);
        if let Some(store) = self.store.as_mut() {
            if let Err(e) = store.save_profile(&self.profile) {
                log::warn!("profile not persisted ({})", e);
            }
        }
    }

    /// Response controller phase.
    pub fn state(&self) -> ControllerState {
        self.controller.state()
    }

    /// Adaptation currently applied, if any.
    pub fn active_directive(&self) -> Option<&AdaptationDirective> {
        self.controller.active_directive()
    }

    /// Local transition log for user-facing transparency.
    pub fn transition_log(&self) -> &[TransitionRecord] {
        self.controller.transition_log()
    }

    /// Longitudinal recovery tracker.
    pub fn tracker(&self) -> &RecoveryTracker {
        &self.tracker
    }

    /// Active signature registry.
    pub fn registry(&self) -> &SignatureRegistry {
        &self.registry
    }

    /// Number of events currently buffered.
    pub fn buffered_events(&self) -> usize {
        self.buffer.len()
    }

    fn persist_snapshots(&mut self) {
        if let Some(store) = self.store.as_mut() {
            let snapshots = self.tracker.export_snapshots();
            if let Err(e) = store.save_snapshots(&snapshots) {
                log::warn!("snapshots not persisted ({})", e);
            }
        }
    }

    #[cfg(test)]
    fn set_tick_guard(&mut self, engaged: bool) {
        self.in_tick = engaged;
    }
}
