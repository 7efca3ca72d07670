//! Entry/exit tallies.
//!
//! Only confirmed crossings mutate the counters.  The net total is never
//! stored; it is derived from the two tallies on every read.

use crate::fsm::context::Direction;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    entries: u32,
    exits: u32,
    last_event: Option<Direction>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tally one confirmed crossing.
    pub fn record(&mut self, direction: Direction) {
        match direction {
            Direction::In => self.entries = self.entries.saturating_add(1),
            Direction::Out => self.exits = self.exits.saturating_add(1),
        }
        self.last_event = Some(direction);
    }

    /// Zero both tallies and forget the last event.  Idempotent.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn entries(&self) -> u32 {
        self.entries
    }

    pub fn exits(&self) -> u32 {
        self.exits
    }

    /// Net occupancy: entries − exits.
    pub fn total(&self) -> i64 {
        i64::from(self.entries) - i64::from(self.exits)
    }

    pub fn last_event(&self) -> Option<Direction> {
        self.last_event
    }
}
