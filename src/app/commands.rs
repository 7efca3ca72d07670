//! Inbound commands to the application service.
//!
//! These represent the narrow read/reset/calibrate interface the local
//! query server is allowed to use.  The transport never touches gate
//! state directly; it hands an [`AppCommand`] to the
//! [`GateService`](super::service::GateService) and renders the
//! [`AppReply`] it gets back.

use serde::Serialize;

use crate::calibration::BaselinePair;
use crate::error::CalibrationError;
use crate::fsm::Phase;
use crate::sensors::DistanceSample;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Read-only snapshot of counters and the latest readings.
    Snapshot,

    /// Zero all counters.
    ResetCounters,

    /// Re-run baseline calibration synchronously.
    Recalibrate,
}

/// Replies produced by [`GateService::handle_command`](super::service::GateService::handle_command).
#[derive(Debug, Clone, PartialEq)]
pub enum AppReply {
    Snapshot(GateSnapshot),
    CountersReset,
    Calibrated(BaselinePair),
    CalibrationFailed(CalibrationError),
}

/// Point-in-time view of the gate, serialised as the `/data` body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GateSnapshot {
    pub entries: u32,
    pub exits: u32,
    pub total: i64,
    /// `"in"`, `"out"` or `"none"`.
    pub last_event: &'static str,
    /// Latest reading of sensor A (`-1` when invalid).
    pub sensor_a_cm: DistanceSample,
    pub sensor_b_cm: DistanceSample,
    pub phase: Phase,
    pub calibrated: bool,
}
