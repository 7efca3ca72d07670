//! Outbound application events.
//!
//! The [`GateService`](super::service::GateService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them — log to serial, forward to telemetry, etc.

use crate::calibration::BaselinePair;
use crate::error::{CalibrationError, CommsError};
use crate::fsm::Phase;
use crate::fsm::context::Direction;
use crate::sensors::SensorId;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// The service has started (carries initial phase).
    Started(Phase),

    /// A new baseline is in effect.
    Calibrated(BaselinePair),

    /// A calibration run failed; the previous baseline (if any) stays.
    CalibrationFailed(CalibrationError),

    /// One sensor fired and opened a crossing sequence.
    SequenceStarted { first: SensorId, at_ms: u64 },

    /// A pending sequence timed out or the gate went clear; no event.
    SequenceAbandoned { phase: Phase, at_ms: u64 },

    /// A crossing was confirmed and counted.
    Crossing {
        direction: Direction,
        entries: u32,
        exits: u32,
        total: i64,
    },

    /// The collector did not accept a crossing report.
    ReportFailed { direction: Direction, error: CommsError },

    /// Counters were zeroed on request.
    CountersReset,
}
