//! Input-chaos detection
//!
//! Measures the deletion-to-entry ratio and the submission-abandonment rate
//! on text/numeric fields. Heavy deleting and abandoned forms together
//! indicate struggling input.

use crate::types::{EventKind, InteractionEvent};

/// Minimum field/form events before the collector judges the window
pub const MIN_INPUT_EVENTS: u32 = 3;

/// Weight of the deletion component
const DELETION_WEIGHT: f64 = 0.6;
/// Weight of the abandonment component
const ABANDONMENT_WEIGHT: f64 = 0.4;

/// Input behavior over one window
#[derive(Debug, Clone, PartialEq)]
pub struct InputReport {
    /// Field entry events
    pub entries: u32,
    /// Field deletion events
    pub deletions: u32,
    /// Forms submitted
    pub submissions: u32,
    /// Forms abandoned
    pub abandonments: u32,
    /// Deletions per entry
    pub deletion_ratio: f64,
    /// Abandoned forms over concluded forms
    pub abandonment_rate: f64,
    /// Combined chaos score (0-1)
    pub chaos: f64,
}

impl InputReport {
    /// Total input-related events seen
    pub fn event_count(&self) -> u32 {
        self.entries + self.deletions + self.submissions + self.abandonments
    }
}

/// Analyze text/numeric input behavior over the window.
pub fn analyze(window: &[InteractionEvent]) -> InputReport {
    let mut entries = 0u32;
    let mut deletions = 0u32;
    let mut submissions = 0u32;
    let mut abandonments = 0u32;

    for event in window {
        match event.kind {
            EventKind::FieldEntry => entries += 1,
            EventKind::FieldDelete => deletions += 1,
            EventKind::FormSubmit => submissions += 1,
            EventKind::FormAbandon => abandonments += 1,
            _ => {}
        }
    }

    let deletion_ratio = if entries > 0 {
        deletions as f64 / entries as f64
    } else if deletions > 0 {
        // Deleting with no entries at all is maximal churn
        2.0
    } else {
        0.0
    };

    let concluded = submissions + abandonments;
    let abandonment_rate = if concluded > 0 {
        abandonments as f64 / concluded as f64
    } else {
        0.0
    };

    // Saturating map: a 1:1 deletion ratio lands at ~63% concern
    let deletion_component = 1.0 - (-deletion_ratio).exp();
    let chaos = (DELETION_WEIGHT * deletion_component + ABANDONMENT_WEIGHT * abandonment_rate)
        .clamp(0.0, 1.0);

    InputReport {
        entries,
        deletions,
        submissions,
        abandonments,
        deletion_ratio,
        abandonment_rate,
        chaos,
    }
}
