//! Scripted anomaly scenarios.
//!
//! The entry list is immutable once built; consumption is tracked by a
//! cursor so the same scenario can be replayed with [`Scenario::rewind`].

use std::time::Duration;

use time::OffsetDateTime;

use crate::anomaly::AnomalyKind;

/// Force `kind` once simulated time reaches `at`, for `duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScriptedAnomaly {
    pub at: OffsetDateTime,
    pub kind: AnomalyKind,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct Scenario {
    entries: Vec<ScriptedAnomaly>,
    cursor: usize,
}

impl Scenario {
    /// Entries must already be ordered by trigger time; they are consumed
    /// strictly in the given order.
    pub fn new(entries: Vec<ScriptedAnomaly>) -> Self {
        Self { entries, cursor: 0 }
    }

    pub fn entries(&self) -> &[ScriptedAnomaly] {
        &self.entries
    }

    /// Next unconsumed entry, if any.
    pub fn peek(&self) -> Option<&ScriptedAnomaly> {
        self.entries.get(self.cursor)
    }

    /// Consume and return the next entry if its trigger time has passed.
    pub fn take_due(&mut self, now: OffsetDateTime) -> Option<ScriptedAnomaly> {
        let next = *self.peek()?;
        if now >= next.at {
            self.cursor += 1;
            Some(next)
        } else {
            None
        }
    }

    pub fn consumed(&self) -> usize {
        self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.entries.len()
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }
}
