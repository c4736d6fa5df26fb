//! Repetition detection
//!
//! Looks for repeated event subsequences (pattern lengths 2-5) and for runs
//! of consecutive identical events ("echoes"). Events are compared as full
//! tokens (kind + page + field + value) so ordinary varied activity does not
//! register as repetition.

use crate::types::{EventKind, InteractionEvent};
use std::collections::HashMap;

/// Shortest repeated pattern considered
const MIN_PATTERN_LEN: usize = 2;

/// Longest repeated pattern considered
const MAX_PATTERN_LEN: usize = 5;

/// Sliding-window occurrences below this are not reportable
pub const MIN_REPEATS: u32 = 3;

/// Consecutive identical events below this are not reportable
pub const MIN_ECHO_LEN: u32 = 3;

type Token<'a> = (
    EventKind,
    Option<&'a str>,
    Option<&'a str>,
    Option<&'a str>,
);

/// Repetition findings over one window
#[derive(Debug, Clone, PartialEq)]
pub struct RepetitionReport {
    /// Highest sliding-window count of any repeated pattern (0 when none
    /// reached [`MIN_REPEATS`])
    pub max_repeats: u32,
    /// Length of the most-repeated pattern
    pub pattern_len: u32,
    /// Longest run of consecutive identical events (0 below [`MIN_ECHO_LEN`])
    pub max_echo: u32,
}

impl RepetitionReport {
    pub fn is_reportable(&self) -> bool {
        self.max_repeats >= MIN_REPEATS || self.max_echo >= MIN_ECHO_LEN
    }
}

fn token(event: &InteractionEvent) -> Token<'_> {
    (
        event.kind,
        event.page.as_deref(),
        event.field.as_deref(),
        event.value.as_deref(),
    )
}

/// Analyze the window for repeated patterns and echoes.
pub fn analyze(window: &[InteractionEvent]) -> RepetitionReport {
    let tokens: Vec<Token> = window.iter().map(token).collect();

    let mut max_repeats = 0u32;
    let mut pattern_len = 0u32;
    for len in MIN_PATTERN_LEN..=MAX_PATTERN_LEN {
        if tokens.len() < len * 2 {
            break;
        }
        let mut counts: HashMap<&[Token], u32> = HashMap::new();
        for chunk in tokens.windows(len) {
            *counts.entry(chunk).or_insert(0) += 1;
        }
        if let Some(best) = counts.values().max() {
            if *best >= MIN_REPEATS && *best > max_repeats {
                max_repeats = *best;
                pattern_len = len as u32;
            }
        }
    }

    let mut max_echo = 0u32;
    let mut run = 0u32;
    for pair in tokens.windows(2) {
        if pair[0] == pair[1] {
            run += 1;
            max_echo = max_echo.max(run + 1);
        } else {
            run = 0;
        }
    }
    if max_echo < MIN_ECHO_LEN {
        max_echo = 0;
    }

    RepetitionReport {
        max_repeats,
        pattern_len,
        max_echo,
    }
}

/// Concern level for a repetition report, scaled by repeat count.
pub fn confidence(report: &RepetitionReport) -> f64 {
    let pattern = if report.max_repeats >= MIN_REPEATS {
        1.0 - (-((report.max_repeats - MIN_REPEATS + 1) as f64) / 3.0).exp()
    } else {
        0.0
    };
    let echo = if report.max_echo >= MIN_ECHO_LEN {
        (0.5 + 0.15 * (report.max_echo - MIN_ECHO_LEN) as f64).clamp(0.0, 0.95)
    } else {
        0.0
    };
    pattern.max(echo).clamp(0.0, 0.95)
}
