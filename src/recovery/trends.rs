//! Trend analysis over weekly snapshots
//!
//! Trend direction is derived from a Theil-Sen slope (median of pairwise
//! slopes, robust to single-week outliers) with a minimum-effect-size gate so
//! noise cannot flip a trend.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Weeks of history required before a trend is computed
pub const MIN_TREND_WEEKS: usize = 4;

/// Trailing window used for trend estimation
pub const TREND_WINDOW_WEEKS: usize = 8;

/// Habit-detection window
pub const HABIT_WINDOW_WEEKS: usize = 4;

/// Direction of a weekly series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Flat,
}

/// Tracked longitudinal series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendMetric {
    /// Detected crises per week
    CrisisFrequency,
    /// Mean confidence of detected crises
    CrisisSeverity,
    /// Minutes from intervention to release
    RecoveryTime,
    /// Distinct features used per week
    EngagementBreadth,
}

impl TrendMetric {
    /// Minimum total change across the window before a trend registers
    pub fn min_effect(&self) -> f64 {
        match self {
            TrendMetric::CrisisFrequency => 1.0,
            TrendMetric::CrisisSeverity => 0.08,
            TrendMetric::RecoveryTime => 4.0,
            TrendMetric::EngagementBreadth => 1.0,
        }
    }
}

/// One computed trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub metric: TrendMetric,
    /// Theil-Sen slope per week
    pub slope: f64,
    pub direction: TrendDirection,
    /// Weeks that fed the estimate
    pub weeks: u32,
}

/// Theil-Sen estimator: median of all pairwise slopes.
fn theil_sen_slope(values: &[f64]) -> f64 {
    let mut slopes = Vec::new();
    for i in 0..values.len() {
        for j in (i + 1)..values.len() {
            slopes.push((values[j] - values[i]) / (j - i) as f64);
        }
    }
    if slopes.is_empty() {
        return 0.0;
    }
    slopes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = slopes.len() / 2;
    if slopes.len() % 2 == 1 {
        slopes[mid]
    } else {
        (slopes[mid - 1] + slopes[mid]) / 2.0
    }
}

/// Compute the trend of a weekly series. Returns `None` below
/// [`MIN_TREND_WEEKS`] points.
pub fn trend(metric: TrendMetric, values: &[f64]) -> Option<TrendReport> {
    if values.len() < MIN_TREND_WEEKS {
        return None;
    }
    let tail_start = values.len().saturating_sub(TREND_WINDOW_WEEKS);
    let tail = &values[tail_start..];

    let slope = theil_sen_slope(tail);
    let total_change = slope * (tail.len() as f64 - 1.0);
    let direction = if total_change >= metric.min_effect() {
        TrendDirection::Increasing
    } else if total_change <= -metric.min_effect() {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Flat
    };

    Some(TrendReport {
        metric,
        slope,
        direction,
        weeks: tail.len() as u32,
    })
}

/// A formed habit: a behavior whose weekly count became both regular and
/// useful
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitReport {
    /// The tracked behavior, e.g. "entry_logging"
    pub behavior: String,
    /// Last week of the earliest qualifying window
    pub formed_week: NaiveDate,
    /// Mean weekly count inside that window
    pub mean: f64,
    /// Count variance inside that window
    pub variance: f64,
}

/// Detect habit formation: the earliest trailing window whose count variance
/// drops below `max_variance` while the mean stays at or above `min_mean`.
pub fn detect_habit(
    series: &[(NaiveDate, f64)],
    behavior: &str,
    min_mean: f64,
    max_variance: f64,
) -> Option<HabitReport> {
    if series.len() < HABIT_WINDOW_WEEKS {
        return None;
    }
    for window in series.windows(HABIT_WINDOW_WEEKS) {
        let values: Vec<f64> = window.iter().map(|(_, v)| *v).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        if mean >= min_mean && variance <= max_variance {
            return Some(HabitReport {
                behavior: behavior.to_string(),
                formed_week: window[HABIT_WINDOW_WEEKS - 1].0,
                mean,
                variance,
            });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap() + chrono::Duration::weeks(n as i64)
    }

    #[test]
    fn test_too_few_weeks_is_none() {
        assert!(trend(TrendMetric::CrisisFrequency, &[3.0, 2.0, 4.0]).is_none());
    }

    #[test]
    fn test_increasing_series() {
        let report = trend(TrendMetric::CrisisFrequency, &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(report.direction, TrendDirection::Increasing);
        assert!((report.slope - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_decreasing_series() {
        let report =
            trend(TrendMetric::EngagementBreadth, &[8.0, 7.0, 5.0, 4.0, 3.0]).unwrap();
        assert_eq!(report.direction, TrendDirection::Decreasing);
        assert!(report.slope < 0.0);
    }

    #[test]
    fn test_small_change_gated_to_flat() {
        // Total change 0.4 over the window, below the 1.0 gate
        let report =
            trend(TrendMetric::CrisisFrequency, &[2.0, 2.1, 2.2, 2.3, 2.4]).unwrap();
        assert_eq!(report.direction, TrendDirection::Flat);
    }

    #[test]
    fn test_outlier_does_not_flip_trend() {
        // One spike in an otherwise flat series; least squares would tilt,
        // Theil-Sen stays flat
        let report =
            trend(TrendMetric::CrisisFrequency, &[2.0, 2.0, 9.0, 2.0, 2.0, 2.0]).unwrap();
        assert_eq!(report.direction, TrendDirection::Flat);
    }

    #[test]
    fn test_trend_uses_trailing_window() {
        // Old rise, recent fall; only the trailing 8 weeks count
        let values = [
            1.0, 2.0, 3.0, 4.0, 9.0, 9.0, 8.0, 7.0, 6.0, 5.0, 4.0, 3.0,
        ];
        let report = trend(TrendMetric::CrisisFrequency, &values).unwrap();
        assert_eq!(report.direction, TrendDirection::Decreasing);
        assert_eq!(report.weeks, 8);
    }

    #[test]
    fn test_habit_detected_at_earliest_window() {
        let series: Vec<(NaiveDate, f64)> = vec![
            (week(0), 0.0),
            (week(1), 7.0),
            (week(2), 1.0),
            (week(3), 1.0),
            // Regular logging starts here
            (week(4), 5.0),
            (week(5), 5.0),
            (week(6), 6.0),
            (week(7), 5.0),
            (week(8), 5.0),
        ];
        let habit = detect_habit(&series, "entry_logging", 3.0, 1.0).unwrap();
        assert_eq!(habit.behavior, "entry_logging");
        assert_eq!(habit.formed_week, week(7));
        assert!(habit.mean >= 3.0);
        assert!(habit.variance <= 1.0);
    }

    #[test]
    fn test_regular_but_useless_is_not_a_habit() {
        let series: Vec<(NaiveDate, f64)> = (0..6).map(|n| (week(n), 0.0)).collect();
        assert!(detect_habit(&series, "entry_logging", 3.0, 1.0).is_none());
    }

    #[test]
    fn test_useful_but_erratic_is_not_a_habit() {
        let series: Vec<(NaiveDate, f64)> = vec![
            (week(0), 10.0),
            (week(1), 0.0),
            (week(2), 12.0),
            (week(3), 1.0),
            (week(4), 9.0),
            (week(5), 0.0),
        ];
        assert!(detect_habit(&series, "entry_logging", 3.0, 1.0).is_none());
    }
}
