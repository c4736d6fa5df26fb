//! Abandoned-flow detection
//!
//! A flow is a named ordered list of pages a user steps through (logging a
//! pain entry, generating a report). A flow counts as abandoned when the
//! window shows a strict, non-empty prefix of its steps and no further
//! progress within the flow's timeout.

use crate::types::{EventKind, InteractionEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One expected multi-step flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    /// Flow name
    pub name: String,
    /// Ordered page identifiers making up the flow
    pub steps: Vec<String>,
    /// Seconds without progress after which a started flow is stale
    pub timeout_sec: i64,
}

/// Catalog of expected flows for the host application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowCatalog {
    flows: Vec<FlowSpec>,
}

impl Default for FlowCatalog {
    fn default() -> Self {
        Self::health_tracking_defaults()
    }
}

impl FlowCatalog {
    pub fn new(flows: Vec<FlowSpec>) -> Self {
        Self { flows }
    }

    /// Flows of the host health-tracking app
    pub fn health_tracking_defaults() -> Self {
        Self::new(vec![
            FlowSpec {
                name: "log_pain_entry".to_string(),
                steps: vec![
                    "entry/new".to_string(),
                    "entry/severity".to_string(),
                    "entry/notes".to_string(),
                    "entry/save".to_string(),
                ],
                timeout_sec: 180,
            },
            FlowSpec {
                name: "log_mood".to_string(),
                steps: vec![
                    "mood/new".to_string(),
                    "mood/scale".to_string(),
                    "mood/save".to_string(),
                ],
                timeout_sec: 180,
            },
            FlowSpec {
                name: "weekly_report".to_string(),
                steps: vec![
                    "report/open".to_string(),
                    "report/range".to_string(),
                    "report/view".to_string(),
                ],
                timeout_sec: 300,
            },
        ])
    }

    pub fn flows(&self) -> &[FlowSpec] {
        &self.flows
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

/// A flow started but not finished within its timeout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbandonedFlow {
    /// Flow name
    pub flow: String,
    /// Steps completed (strict, non-empty prefix)
    pub completed_steps: u32,
    /// Total steps in the flow
    pub total_steps: u32,
    /// Timestamp of the last completed step
    pub abandoned_at: DateTime<Utc>,
    /// Seconds between first and last completed step
    pub time_in_flow_sec: f64,
}

impl AbandonedFlow {
    /// Fraction of the flow that was completed before abandonment
    pub fn depth(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }
}

/// Detect abandoned flows in the window, evaluated at `now`.
pub fn detect(
    catalog: &FlowCatalog,
    window: &[InteractionEvent],
    now: DateTime<Utc>,
) -> Vec<AbandonedFlow> {
    let mut abandoned = Vec::new();

    for spec in catalog.flows() {
        if spec.steps.is_empty() {
            continue;
        }

        let mut matched = 0usize;
        let mut first_at: Option<DateTime<Utc>> = None;
        let mut last_at: Option<DateTime<Utc>> = None;

        for event in window {
            if !matches!(event.kind, EventKind::Navigation | EventKind::FormSubmit) {
                continue;
            }
            if matched < spec.steps.len()
                && event.page.as_deref() == Some(spec.steps[matched].as_str())
            {
                matched += 1;
                first_at.get_or_insert(event.timestamp);
                last_at = Some(event.timestamp);
            }
        }

        // Strict non-empty prefix only: untouched and completed flows are fine
        if matched == 0 || matched == spec.steps.len() {
            continue;
        }

        let (first_at, last_at) = match (first_at, last_at) {
            (Some(f), Some(l)) => (f, l),
            _ => continue,
        };

        let stale_sec = (now - last_at).num_seconds();
        if stale_sec < spec.timeout_sec {
            continue;
        }

        abandoned.push(AbandonedFlow {
            flow: spec.name.clone(),
            completed_steps: matched as u32,
            total_steps: spec.steps.len() as u32,
            abandoned_at: last_at,
            time_in_flow_sec: (last_at - first_at).num_milliseconds() as f64 / 1000.0,
        });
    }

    abandoned
}

/// Collapse abandoned flows into a single confidence: deeper abandonment and
/// more abandoned flows raise concern.
pub fn confidence(abandoned: &[AbandonedFlow]) -> f64 {
    if abandoned.is_empty() {
        return 0.0;
    }
    let max_depth = abandoned.iter().map(|a| a.depth()).fold(0.0, f64::max);
    let extra = (abandoned.len() as f64 - 1.0) * 0.1;
    (0.35 + 0.45 * max_depth + extra).clamp(0.0, 0.95)
}
