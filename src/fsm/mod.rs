//! Function-pointer finite state machine engine for the gate detector.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  PhaseTable                                                  │
//! │  ┌───────────────┬───────────┬──────────┬───────────────────┐│
//! │  │ Phase         │ on_enter  │ on_exit  │ on_update         ││
//! │  ├───────────────┼───────────┼──────────┼───────────────────┤│
//! │  │ Uncalibrated  │ fn(ctx)   │ —        │ fn(ctx)->Option<> ││
//! │  │ Idle          │ fn(ctx)   │ —        │ fn(ctx)->Option<> ││
//! │  │ PendingEntry  │ fn(ctx)   │ —        │ fn(ctx)->Option<> ││
//! │  │ PendingExit   │ fn(ctx)   │ —        │ fn(ctx)->Option<> ││
//! │  └───────────────┴───────────┴──────────┴───────────────────┘│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** phase.  If
//! it returns `Some(next)`, the engine runs `on_exit` for the current
//! phase, then `on_enter` for the next.  The guards that apply to every
//! phase (debounce, sequence timeout) run in
//! [`GateService`](crate::app::service::GateService) before the engine.

pub mod context;
pub mod states;

use context::GateContext;
use log::debug;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Detector phases.
/// Must stay in sync with the table built in [`states::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Phase {
    /// No baseline yet; detection disabled.
    Uncalibrated = 0,
    /// No pending crossing.
    Idle = 1,
    /// Sensor A fired, waiting for B.
    PendingEntry = 2,
    /// Sensor B fired, waiting for A.
    PendingExit = 3,
}

impl Phase {
    /// Total number of phases — used to size the table array.
    pub const COUNT: usize = 4;

    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Uncalibrated,
            1 => Self::Idle,
            2 => Self::PendingEntry,
            3 => Self::PendingExit,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Idle
            }
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Self::PendingEntry | Self::PendingExit)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type PhaseActionFn = fn(&mut GateContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type PhaseUpdateFn = fn(&mut GateContext) -> Option<Phase>;

/// Static descriptor for a single phase.
pub struct PhaseDescriptor {
    pub id: Phase,
    pub name: &'static str,
    pub on_enter: Option<PhaseActionFn>,
    pub on_exit: Option<PhaseActionFn>,
    pub on_update: PhaseUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Fixed-size table indexed by `Phase as usize`.
    table: [PhaseDescriptor; Phase::COUNT],
    current: usize,
    tick_count: u64,
}

impl Fsm {
    pub fn new(table: [PhaseDescriptor; Phase::COUNT], initial: Phase) -> Self {
        Self {
            table,
            current: initial as usize,
            tick_count: 0,
        }
    }

    /// Run the initial `on_enter` for the starting phase.
    pub fn start(&mut self, ctx: &mut GateContext) {
        debug!("FSM starting in phase: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    pub fn tick(&mut self, ctx: &mut GateContext) {
        self.tick_count += 1;

        let next = (self.table[self.current].on_update)(ctx);

        if let Some(next_id) = next {
            self.transition(next_id, ctx);
        }
    }

    /// Jump to `next` outside the normal update path (timeouts,
    /// calibration).  Re-entering the current phase is a no-op.
    pub fn force_transition(&mut self, next: Phase, ctx: &mut GateContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_phase(&self) -> Phase {
        Phase::from_index(self.current)
    }

    /// Ticks processed by the engine since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    fn transition(&mut self, next_id: Phase, ctx: &mut GateContext) {
        let next_idx = next_id as usize;

        debug!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
