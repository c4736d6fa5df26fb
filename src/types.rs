//! Core types for the Havenlight detection engine
//!
//! This module defines the value types that flow between components: raw
//! interaction events, detected signals, and the per-tick crisis assessment.
//! All of them are immutable once produced and never leave the device.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of raw interaction event emitted by the host UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Page/screen navigation
    Navigation,
    /// Text or numeric input into a field
    FieldEntry,
    /// Deletion inside a field
    FieldDelete,
    /// Form submitted
    FormSubmit,
    /// Form explicitly abandoned (closed without submit)
    FormAbandon,
    /// Preference/settings value changed
    PreferenceChange,
    /// A pain/mood entry was saved
    EntrySaved,
    /// App moved to foreground
    AppForeground,
    /// App moved to background
    AppBackground,
    /// App closed by the user
    AppClose,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Navigation => "navigation",
            EventKind::FieldEntry => "field_entry",
            EventKind::FieldDelete => "field_delete",
            EventKind::FormSubmit => "form_submit",
            EventKind::FormAbandon => "form_abandon",
            EventKind::PreferenceChange => "preference_change",
            EventKind::EntrySaved => "entry_saved",
            EventKind::AppForeground => "app_foreground",
            EventKind::AppBackground => "app_background",
            EventKind::AppClose => "app_close",
        }
    }
}

/// Atomic interaction event recorded by the host UI.
///
/// Events live only in the bounded in-memory window used for detection; they
/// are never written to long-term storage. Only derived aggregates survive
/// past the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    /// Event timestamp (UTC)
    pub timestamp: DateTime<Utc>,
    /// Event kind
    pub kind: EventKind,
    /// Page/screen identifier (present for navigation and flow steps)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    /// Field or preference key (present for input and preference events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Entered/selected value (present for input and preference events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl InteractionEvent {
    /// Bare event with no page/field/value payload
    pub fn new(timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            timestamp,
            kind,
            page: None,
            field: None,
            value: None,
        }
    }

    /// Navigation to a page
    pub fn navigation(timestamp: DateTime<Utc>, page: impl Into<String>) -> Self {
        Self {
            page: Some(page.into()),
            ..Self::new(timestamp, EventKind::Navigation)
        }
    }

    /// Input into a field
    pub fn field_entry(
        timestamp: DateTime<Utc>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            value: Some(value.into()),
            ..Self::new(timestamp, EventKind::FieldEntry)
        }
    }

    /// Deletion inside a field
    pub fn field_delete(timestamp: DateTime<Utc>, field: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            ..Self::new(timestamp, EventKind::FieldDelete)
        }
    }

    /// Preference/settings change
    pub fn preference_change(
        timestamp: DateTime<Utc>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: Some(key.into()),
            value: Some(value.into()),
            ..Self::new(timestamp, EventKind::PreferenceChange)
        }
    }
}

/// Origin of a detected signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Computed from the event window by a collector
    Computed,
    /// Injected from a user-authored custom indicator match
    SelfReported,
}

/// A named, confidence-scored observation produced during one analysis pass.
///
/// Ephemeral: signals are embedded in the assessment that used them and are
/// not tracked independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedSignal {
    /// Signal name (must match a collector output or custom indicator tag)
    pub name: String,
    /// Confidence (0-1)
    pub confidence: f64,
    /// Where the signal came from
    pub source: SignalSource,
    /// Human-readable detail, free of raw event content
    pub details: String,
}

impl DetectedSignal {
    pub fn computed(name: impl Into<String>, confidence: f64, details: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: SignalSource::Computed,
            details: details.into(),
        }
    }

    pub fn self_reported(
        name: impl Into<String>,
        confidence: f64,
        details: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source: SignalSource::SelfReported,
            details: details.into(),
        }
    }
}

/// A category's score within one classification pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Crisis category identifier
    pub category: String,
    /// Weighted score (0-1)
    pub score: f64,
}

/// Quality flags attached to an assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentQualityFlag {
    /// Event window was empty
    NoEvents,
    /// Fewer than half of the collectors had enough data to judge
    InsufficientData,
    /// One or more signals came from user-authored custom indicators
    SelfReportedSignals,
}

/// Output of one classification pass.
///
/// Immutable once created. Negative results carry an explicit `coverage` so a
/// low-data "no crisis" is distinguishable from a confident one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisAssessment {
    /// Unique assessment identifier
    pub id: Uuid,
    /// When the assessment was produced
    pub assessed_at: DateTime<Utc>,
    /// Best-match crisis category, if any score cleared its threshold
    pub detected_crisis: Option<String>,
    /// Confidence in the detection (or in the negative, scaled by coverage)
    pub confidence: f64,
    /// Signals that fed this pass (computed and self-reported)
    pub signals: Vec<DetectedSignal>,
    /// Remaining categories ranked by score, winner excluded
    pub alternative_hypotheses: Vec<CategoryScore>,
    /// Fraction of collectors that had enough data to judge (0-1)
    pub coverage: f64,
    /// Data-quality flags
    pub quality_flags: Vec<AssessmentQualityFlag>,
}

impl CrisisAssessment {
    /// True when no crisis was detected but the window was too sparse to call
    /// it a confident negative
    pub fn is_inconclusive(&self) -> bool {
        self.detected_crisis.is_none()
            && self
                .quality_flags
                .iter()
                .any(|f| matches!(f, AssessmentQualityFlag::InsufficientData | AssessmentQualityFlag::NoEvents))
    }
}
