//! Crisis classification
//!
//! Scores every registered signature against the current signals, resolves
//! the top candidate against its personalized threshold, and always returns
//! the full ranked list of alternatives for transparency and differential
//! testing.

use crate::profile::ThresholdTable;
use crate::signatures::SignatureRegistry;
use crate::types::{
    AssessmentQualityFlag, CategoryScore, CrisisAssessment, DetectedSignal, SignalSource,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Categories scoring within this distance of each other are tied
pub const SCORE_EPSILON: f64 = 0.05;

/// Coverage below which a negative is flagged as insufficient data
const MIN_CONFIDENT_COVERAGE: f64 = 0.5;

/// Classify one analysis pass.
///
/// `signals` carries both computed and self-reported entries; the best
/// confidence per signal name feeds the score, and the full list is embedded
/// in the assessment. Insufficient data is never reported as a confident
/// negative: coverage scales the confidence of a null result and flags it.
pub fn classify(
    registry: &SignatureRegistry,
    thresholds: &ThresholdTable,
    signals: Vec<DetectedSignal>,
    coverage: f64,
    now: DateTime<Utc>,
) -> CrisisAssessment {
    let mut best_by_name: HashMap<&str, f64> = HashMap::new();
    for signal in &signals {
        let entry = best_by_name.entry(signal.name.as_str()).or_insert(0.0);
        if signal.confidence > *entry {
            *entry = signal.confidence;
        }
    }

    let mut ranked: Vec<CategoryScore> = registry
        .iter()
        .map(|signature| {
            let weight_sum: f64 = signature.markers.iter().map(|m| m.weight).sum();
            let weighted: f64 = signature
                .markers
                .iter()
                .map(|m| m.weight * best_by_name.get(m.signal.as_str()).copied().unwrap_or(0.0))
                .sum();
            CategoryScore {
                category: signature.category.clone(),
                score: if weight_sum > 0.0 { weighted / weight_sum } else { 0.0 },
            }
        })
        .collect();

    // Stable ranking: score descending, category name as deterministic tie-break
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });

    let top_score = ranked.first().map(|c| c.score).unwrap_or(0.0);

    let candidates: Vec<&CategoryScore> = ranked
        .iter()
        .filter(|c| c.score >= thresholds.effective_threshold(&c.category))
        .collect();

    // Among near-tied candidates, prefer the more urgent category: for acute
    // states, under-reacting costs more than over-reacting.
    let winner = candidates
        .iter()
        .filter(|c| (candidates[0].score - c.score) < SCORE_EPSILON)
        .max_by_key(|c| {
            registry
                .get(&c.category)
                .map(|s| s.urgency.rank())
                .unwrap_or(0)
        })
        .map(|c| c.category.clone());

    let mut quality_flags = Vec::new();
    if signals.is_empty() && coverage == 0.0 {
        quality_flags.push(AssessmentQualityFlag::NoEvents);
    } else if coverage < MIN_CONFIDENT_COVERAGE {
        quality_flags.push(AssessmentQualityFlag::InsufficientData);
    }
    if signals.iter().any(|s| s.source == SignalSource::SelfReported) {
        quality_flags.push(AssessmentQualityFlag::SelfReportedSignals);
    }

    let confidence = match &winner {
        // Reported confidence is the top raw score, so alternatives can never
        // exceed it even when urgency promoted a near-tied category
        Some(_) => top_score,
        None if coverage < MIN_CONFIDENT_COVERAGE => (coverage * 0.4).clamp(0.0, 0.3),
        None => (coverage * (1.0 - top_score)).clamp(0.0, 1.0),
    };

    let alternative_hypotheses: Vec<CategoryScore> = ranked
        .into_iter()
        .filter(|c| Some(&c.category) != winner.as_ref())
        .collect();

    CrisisAssessment {
        id: Uuid::new_v4(),
        assessed_at: now,
        detected_crisis: winner,
        confidence,
        signals,
        alternative_hypotheses,
        coverage,
        quality_flags,
    }
}
