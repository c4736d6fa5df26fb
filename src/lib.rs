//! Havenlight - On-device behavioral crisis detection and adaptive response
//!
//! Havenlight observes low-level interaction telemetry from a personal
//! health-tracking app, classifies which of several distress states (if any)
//! is occurring, and drives a bounded, reversible adaptation of the
//! interface. Everything runs on-device: raw events live only in a bounded
//! rolling window, only derived aggregates are persisted, and no network
//! interface exists anywhere in the crate.
//!
//! ## Pipeline
//!
//! Host events → rolling buffer → signal collectors → personalized
//! classification → response state machine, with weekly aggregates feeding a
//! longitudinal recovery tracker whose output tunes the thresholds in turn.

pub mod buffer;
pub mod classifier;
pub mod collectors;
pub mod engine;
pub mod error;
pub mod profile;
pub mod recovery;
pub mod response;
pub mod signatures;
pub mod storage;
pub mod types;

pub use engine::{CrisisEngine, EngineConfig, TickOutcome};
pub use error::EngineError;
pub use profile::{DeclaredCondition, ResponseMode, UserCrisisProfile};
pub use response::{AdaptationChange, AdaptationDirective, ControllerState};
pub use signatures::{CrisisSignature, SignatureRegistry};
pub use types::{CrisisAssessment, DetectedSignal, EventKind, InteractionEvent};

/// Engine version embedded in exported reports
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for exported reports
pub const PRODUCER_NAME: &str = "havenlight";
