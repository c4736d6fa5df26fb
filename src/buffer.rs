//! Bounded rolling event buffer
//!
//! Raw interaction events are retained only here, bounded by both count and
//! age. Nothing in this buffer is ever persisted; long-term storage sees only
//! derived aggregates.

use crate::types::InteractionEvent;
use chrono::{DateTime, Duration, Utc};

/// Default maximum number of buffered events
pub const DEFAULT_BUFFER_CAPACITY: usize = 512;

/// Default maximum event age in seconds (2 hours)
pub const DEFAULT_BUFFER_MAX_AGE_SEC: i64 = 7200;

/// Bounded rolling window of raw interaction events
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: Vec<InteractionEvent>,
    capacity: usize,
    max_age: Duration,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY, DEFAULT_BUFFER_MAX_AGE_SEC)
    }
}

impl EventBuffer {
    /// Create a buffer bounded by event count and age
    pub fn new(capacity: usize, max_age_sec: i64) -> Self {
        Self {
            events: Vec::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            max_age: Duration::seconds(max_age_sec.max(1)),
        }
    }

    /// Append an event, evicting anything over capacity or past max age.
    ///
    /// Events are expected in roughly chronological order; a late event is
    /// inserted at its sorted position so collectors always see an ordered
    /// window.
    pub fn push(&mut self, event: InteractionEvent) {
        let cutoff = event.timestamp - self.max_age;

        let pos = self
            .events
            .iter()
            .rposition(|e| e.timestamp <= event.timestamp)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.events.insert(pos, event);

        let stale = self.events.iter().take_while(|e| e.timestamp < cutoff).count();
        if stale > 0 {
            self.events.drain(..stale);
        }
        if self.events.len() > self.capacity {
            let excess = self.events.len() - self.capacity;
            self.events.drain(..excess);
        }
    }

    /// Current window, oldest first
    pub fn window(&self) -> &[InteractionEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Time span covered by the window in seconds
    pub fn span_sec(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0
            }
            _ => 0.0,
        }
    }

    /// Drop all buffered events (e.g. on host teardown)
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Timestamp of the newest buffered event
    pub fn last_event_at(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }
}
