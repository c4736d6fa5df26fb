//! Setback vs relapse classification
//!
//! Recovery is non-monotonic: a transient spike that resolves quickly is an
//! ordinary setback, while sustained elevation over consecutive weeks is a
//! relapse. The distinction gates which intervention tier is recommended,
//! scaled by estimated severity rather than by category.

use crate::recovery::trends::TrendDirection;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Weeks of pre-spike history used as the baseline
const PRE_BASELINE_WEEKS: usize = 4;

/// Weeks a spike may persist and still count as a setback
const SETBACK_MAX_WEEKS: u32 = 2;

/// Consecutive elevated weeks that make a relapse
const RELAPSE_MIN_WEEKS: u32 = 4;

/// Kind of recovery regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegressionKind {
    /// Transient spike, resolved back to the pre-spike trend
    Setback,
    /// Sustained elevation above the pre-spike baseline
    Relapse,
}

/// Recommended intervention tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    GentleReminder,
    SupportOffer,
    CrisisSupport,
}

/// A classified regression in the weekly crisis-count series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionAnalysis {
    pub kind: RegressionKind,
    /// Week the spike began
    pub spike_week: NaiveDate,
    /// Mean weekly crisis count over the pre-spike baseline
    pub baseline: f64,
    /// Peak weekly crisis count during the elevation
    pub peak: f64,
    /// Consecutive weeks at or above the elevated level
    pub elevated_weeks: u32,
}

impl RegressionAnalysis {
    /// Peak relative to baseline, floored to avoid divide-by-zero on quiet
    /// histories
    pub fn severity_ratio(&self) -> f64 {
        self.peak / self.baseline.max(0.5)
    }
}

/// Derived warning, recomputed on demand and never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelapseWarning {
    /// Week the regression began
    pub week: NaiveDate,
    /// Names of the observations backing the warning
    pub signals: Vec<String>,
    /// Current crisis-frequency trend
    pub trend: TrendDirection,
    /// Confidence in the classification (0-1)
    pub confidence: f64,
    /// Intervention tier, scaled by severity
    pub recommended_action: RecommendedAction,
}

/// Classify the most recent regression in a weekly crisis-count series.
///
/// Returns `None` when there is no spike, or when a spike is still too fresh
/// to separate setback from relapse.
pub fn classify_regression(series: &[(NaiveDate, f64)]) -> Option<RegressionAnalysis> {
    if series.len() <= PRE_BASELINE_WEEKS {
        return None;
    }

    let counts: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

    let mut result = None;
    let mut i = PRE_BASELINE_WEEKS;
    while i < counts.len() {
        let baseline_window = &counts[i - PRE_BASELINE_WEEKS..i];
        let baseline =
            baseline_window.iter().sum::<f64>() / baseline_window.len() as f64;
        let spike_margin = (baseline * 0.5).max(1.5);
        if counts[i] <= baseline + spike_margin {
            i += 1;
            continue;
        }

        // Spike found; follow the elevation forward
        let tolerance = (baseline * 0.25).max(0.75);
        let mut elevated = 0u32;
        let mut peak = 0.0f64;
        let mut j = i;
        while j < counts.len() && counts[j] > baseline + tolerance {
            elevated += 1;
            peak = peak.max(counts[j]);
            j += 1;
        }
        let resolved = j < counts.len();

        let analysis = if elevated >= RELAPSE_MIN_WEEKS {
            Some(RegressionAnalysis {
                kind: RegressionKind::Relapse,
                spike_week: series[i].0,
                baseline,
                peak,
                elevated_weeks: elevated,
            })
        } else if resolved && elevated <= SETBACK_MAX_WEEKS {
            Some(RegressionAnalysis {
                kind: RegressionKind::Setback,
                spike_week: series[i].0,
                baseline,
                peak,
                elevated_weeks: elevated,
            })
        } else {
            // Elevated at the end of the data but not yet long enough to
            // call: undetermined
            None
        };

        if analysis.is_some() {
            result = analysis;
        }
        i = j.max(i + 1);
    }

    result
}

/// Build a user-facing warning from a classified regression.
pub fn warning_for(analysis: &RegressionAnalysis, trend: TrendDirection) -> RelapseWarning {
    let ratio = analysis.severity_ratio();

    let recommended_action = match analysis.kind {
        RegressionKind::Setback => {
            if ratio >= 4.0 {
                RecommendedAction::SupportOffer
            } else {
                RecommendedAction::GentleReminder
            }
        }
        RegressionKind::Relapse => {
            if ratio >= 4.0 {
                RecommendedAction::CrisisSupport
            } else {
                RecommendedAction::SupportOffer
            }
        }
    };

    let mut signals = vec![format!(
        "crisis frequency {:.1}x pre-spike baseline",
        ratio
    )];
    signals.push(match analysis.kind {
        RegressionKind::Setback => format!(
            "resolved within {} week(s)",
            analysis.elevated_weeks.max(1)
        ),
        RegressionKind::Relapse => format!(
            "elevated for {} consecutive weeks",
            analysis.elevated_weeks
        ),
    });

    let confidence = match analysis.kind {
        RegressionKind::Setback => 0.6 + (ratio / 20.0).min(0.2),
        RegressionKind::Relapse => {
            0.6 + 0.05 * analysis.elevated_weeks.saturating_sub(RELAPSE_MIN_WEEKS) as f64
                + (ratio / 20.0).min(0.2)
        }
    }
    .clamp(0.0, 0.95);

    RelapseWarning {
        week: analysis.spike_week,
        signals,
        trend,
        confidence,
        recommended_action,
    }
}
