//! Concrete phase handler functions and table builder.
//!
//! ```text
//!  UNCALIBRATED ──[both readings valid]──▶ IDLE
//!
//!  IDLE ──[A detected]──▶ PENDING_ENTRY ──[B detected]──▶ IDLE  (+1 in)
//!    │
//!    └──[B detected]──▶ PENDING_EXIT ──[A detected]──▶ IDLE  (+1 out)
//! ```
//!
//! When both sensors fire on the same tick from `Idle`, sensor A is
//! evaluated first and the tick opens `PendingEntry`.  This tie-break is
//! deterministic but arbitrary; it says nothing about who actually
//! crossed first.

use super::context::{Direction, GateContext};
use super::{Phase, PhaseDescriptor};
use crate::calibration::Baseline;
use log::{debug, info};

/// Build the static phase table.  Called once at startup.
pub fn build_phase_table() -> [PhaseDescriptor; Phase::COUNT] {
    [
        PhaseDescriptor {
            id: Phase::Uncalibrated,
            name: "Uncalibrated",
            on_enter: Some(clear_triggers),
            on_exit: None,
            on_update: uncalibrated_update,
        },
        PhaseDescriptor {
            id: Phase::Idle,
            name: "Idle",
            on_enter: Some(clear_triggers),
            on_exit: None,
            on_update: idle_update,
        },
        PhaseDescriptor {
            id: Phase::PendingEntry,
            name: "PendingEntry",
            on_enter: Some(pending_entry_enter),
            on_exit: None,
            on_update: pending_entry_update,
        },
        PhaseDescriptor {
            id: Phase::PendingExit,
            name: "PendingExit",
            on_enter: Some(pending_exit_enter),
            on_exit: None,
            on_update: pending_exit_update,
        },
    ]
}

fn clear_triggers(ctx: &mut GateContext) {
    ctx.gate.clear_triggers();
}

// ═══════════════════════════════════════════════════════════════════════════
//  UNCALIBRATED
// ═══════════════════════════════════════════════════════════════════════════

/// Adopt the first pair of valid readings as the baseline.
fn uncalibrated_update(ctx: &mut GateContext) -> Option<Phase> {
    match (ctx.dist_a.cm(), ctx.dist_b.cm()) {
        (Some(a), Some(b)) => {
            ctx.baselines = Some((Baseline::new(a), Baseline::new(b)));
            info!("Baseline adopted: A={:.1}cm B={:.1}cm", a, b);
            Some(Phase::Idle)
        }
        _ => {
            debug!("Waiting for valid readings: A={} B={}", ctx.dist_a, ctx.dist_b);
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(ctx: &mut GateContext) -> Option<Phase> {
    if ctx.detected_a {
        Some(Phase::PendingEntry)
    } else if ctx.detected_b {
        Some(Phase::PendingExit)
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PENDING_ENTRY
// ═══════════════════════════════════════════════════════════════════════════

fn pending_entry_enter(ctx: &mut GateContext) {
    ctx.gate.sensor_a.trigger(ctx.now_ms);
}

fn pending_entry_update(ctx: &mut GateContext) -> Option<Phase> {
    if ctx.detected_b {
        ctx.confirm(Direction::In);
        Some(Phase::Idle)
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  PENDING_EXIT
// ═══════════════════════════════════════════════════════════════════════════

fn pending_exit_enter(ctx: &mut GateContext) {
    ctx.gate.sensor_b.trigger(ctx.now_ms);
}

fn pending_exit_update(ctx: &mut GateContext) -> Option<Phase> {
    if ctx.detected_a {
        ctx.confirm(Direction::Out);
        Some(Phase::Idle)
    } else {
        None
    }
}
