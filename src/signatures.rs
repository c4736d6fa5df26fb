//! Crisis signature registry
//!
//! Behavioral signatures are data, not code: each crisis category is a record
//! of weighted signal markers plus temporal metadata. New categories are added
//! by registering a signature (and, if needed, a collector for its markers),
//! never by modifying the classifier.

use crate::collectors;
use crate::error::EngineError;
use serde::{Deserialize, Serialize};

/// Built-in category: chronic pain flare-up
pub const PAIN_FLARE: &str = "pain_flare";
/// Built-in category: acute panic attack
pub const PANIC_ATTACK: &str = "panic_attack";
/// Built-in category: dissociative episode
pub const DISSOCIATION: &str = "dissociation";
/// Built-in category: sensory overload
pub const SENSORY_OVERLOAD: &str = "sensory_overload";

/// How a crisis typically develops over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalPattern {
    Rapid,
    Gradual,
    Sudden,
    Cyclical,
}

/// How quickly the interface should respond to a detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionUrgency {
    Immediate,
    Gentle,
    Delayed,
}

impl InterventionUrgency {
    /// Ordering for tie-breaks: under-reacting costs more than over-reacting
    /// for acute states, so higher rank wins.
    pub fn rank(&self) -> u8 {
        match self {
            InterventionUrgency::Immediate => 2,
            InterventionUrgency::Gentle => 1,
            InterventionUrgency::Delayed => 0,
        }
    }
}

/// One weighted behavioral marker within a signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Signal name; must resolve to a collector output
    pub signal: String,
    /// Relative weight within the signature
    pub weight: f64,
}

impl Marker {
    pub fn new(signal: impl Into<String>, weight: f64) -> Self {
        Self {
            signal: signal.into(),
            weight,
        }
    }
}

/// Behavioral signature of one crisis category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisSignature {
    /// Category identifier
    pub category: String,
    /// Weighted signal markers
    pub markers: Vec<Marker>,
    /// Typical onset pattern
    pub temporal_pattern: TemporalPattern,
    /// Minimum plausible episode length (minutes)
    pub min_duration_min: f64,
    /// Maximum plausible episode length (minutes)
    pub max_duration_min: f64,
    /// Known benign causes of a matching trace (documentation and tests only)
    pub false_positive_causes: Vec<String>,
    /// How quickly to intervene on detection
    pub urgency: InterventionUrgency,
    /// Score the category must reach before personalization (0-1)
    pub base_threshold: f64,
}

/// Registry of all active crisis signatures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureRegistry {
    signatures: Vec<CrisisSignature>,
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SignatureRegistry {
    pub fn new(signatures: Vec<CrisisSignature>) -> Self {
        Self { signatures }
    }

    /// The four built-in categories with starting-calibration weights
    pub fn builtin() -> Self {
        Self::new(vec![
            CrisisSignature {
                category: PANIC_ATTACK.to_string(),
                markers: vec![
                    Marker::new(collectors::SIG_NAVIGATION_ENTROPY, 0.45),
                    Marker::new(collectors::SIG_ABRUPT_EXIT, 0.35),
                    Marker::new(collectors::SIG_ABANDONED_FLOWS, 0.2),
                ],
                temporal_pattern: TemporalPattern::Rapid,
                min_duration_min: 2.0,
                max_duration_min: 30.0,
                false_positive_causes: vec![
                    "hurried but purposeful use under external time pressure".to_string(),
                    "accidental app closure".to_string(),
                ],
                urgency: InterventionUrgency::Immediate,
                base_threshold: 0.55,
            },
            CrisisSignature {
                category: DISSOCIATION.to_string(),
                markers: vec![
                    Marker::new(collectors::SIG_UNEXPLAINED_INACTIVITY, 0.5),
                    Marker::new(collectors::SIG_REPETITION, 0.3),
                    Marker::new(collectors::SIG_ABANDONED_FLOWS, 0.2),
                ],
                temporal_pattern: TemporalPattern::Sudden,
                min_duration_min: 10.0,
                max_duration_min: 90.0,
                false_positive_causes: vec![
                    "phone set down without backgrounding the app".to_string(),
                    "interruption by another person".to_string(),
                ],
                urgency: InterventionUrgency::Delayed,
                base_threshold: 0.45,
            },
            CrisisSignature {
                category: SENSORY_OVERLOAD.to_string(),
                markers: vec![
                    Marker::new(collectors::SIG_PREFERENCE_CHURN, 0.6),
                    Marker::new(collectors::SIG_REPETITION, 0.25),
                    Marker::new(collectors::SIG_NAVIGATION_ENTROPY, 0.15),
                ],
                temporal_pattern: TemporalPattern::Rapid,
                min_duration_min: 3.0,
                max_duration_min: 45.0,
                false_positive_causes: vec![
                    "first-run settings exploration".to_string(),
                    "trying out a new theme".to_string(),
                ],
                urgency: InterventionUrgency::Gentle,
                base_threshold: 0.45,
            },
            CrisisSignature {
                category: PAIN_FLARE.to_string(),
                markers: vec![
                    Marker::new(collectors::SIG_INPUT_CHAOS, 0.5),
                    Marker::new(collectors::SIG_ABANDONED_FLOWS, 0.3),
                    Marker::new(collectors::SIG_REPETITION, 0.2),
                ],
                temporal_pattern: TemporalPattern::Gradual,
                min_duration_min: 5.0,
                max_duration_min: 120.0,
                false_positive_causes: vec![
                    "typing on an unfamiliar keyboard".to_string(),
                    "distracted multitasking".to_string(),
                ],
                urgency: InterventionUrgency::Gentle,
                base_threshold: 0.5,
            },
        ])
    }

    /// Add a signature for a new category.
    pub fn register(&mut self, signature: CrisisSignature) -> Result<(), EngineError> {
        if self.get(&signature.category).is_some() {
            return Err(EngineError::InvalidSignature(format!(
                "duplicate category '{}'",
                signature.category
            )));
        }
        self.signatures.push(signature);
        Ok(())
    }

    pub fn get(&self, category: &str) -> Option<&CrisisSignature> {
        self.signatures.iter().find(|s| s.category == category)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CrisisSignature> {
        self.signatures.iter()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Validate every signature against the set of producible signal names.
    ///
    /// A marker with no producing collector is a configuration error, fatal
    /// at engine construction rather than a runtime surprise.
    pub fn validate(&self, known_signals: &[&str]) -> Result<(), EngineError> {
        for signature in &self.signatures {
            if signature.markers.is_empty() {
                return Err(EngineError::InvalidSignature(format!(
                    "category '{}' has no markers",
                    signature.category
                )));
            }
            if !(0.0 < signature.base_threshold && signature.base_threshold < 1.0) {
                return Err(EngineError::InvalidSignature(format!(
                    "category '{}' threshold {} outside (0, 1)",
                    signature.category, signature.base_threshold
                )));
            }
            if signature.min_duration_min > signature.max_duration_min {
                return Err(EngineError::InvalidSignature(format!(
                    "category '{}' duration bounds inverted",
                    signature.category
                )));
            }
            for marker in &signature.markers {
                if marker.weight <= 0.0 {
                    return Err(EngineError::InvalidSignature(format!(
                        "category '{}' marker '{}' has non-positive weight",
                        signature.category, marker.signal
                    )));
                }
                if !known_signals.contains(&marker.signal.as_str()) {
                    return Err(EngineError::InvalidSignature(format!(
                        "category '{}' marker '{}' has no producing collector",
                        signature.category, marker.signal
                    )));
                }
            }
        }
        Ok(())
    }
}
