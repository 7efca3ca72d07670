//! Shared mutable context threaded through every phase handler.
//!
//! `GateContext` is the single struct that phase handlers read from and
//! write to: the readings of the current tick, the derived detection
//! flags, the baselines, and the [`GateState`] bookkeeping.  A handler
//! that confirms a crossing leaves it in [`GateContext::confirmed`] for the
//! service to pick up after the tick.

use core::fmt;

use serde::{Serialize, Serializer};

use crate::calibration::BaselinePair;
use crate::config::SystemConfig;
use crate::sensors::DistanceSample;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Direction of a confirmed crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// A then B.
    In,
    /// B then A.
    Out,
}

impl Direction {
    /// Wire name used by the collector and the query snapshot.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Per-sensor and per-gate state
// ---------------------------------------------------------------------------

/// Trigger bookkeeping for one sensor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorState {
    /// The sensor opened the pending crossing sequence.
    pub triggered: bool,
    /// Tick time (ms) the sequence started, while `triggered`.
    pub since_ms: Option<u64>,
}

impl SensorState {
    pub fn trigger(&mut self, now_ms: u64) {
        self.triggered = true;
        self.since_ms = Some(now_ms);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Aggregate gate bookkeeping, mutated only by the detector's tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    pub sensor_a: SensorState,
    pub sensor_b: SensorState,
    pub last_direction: Option<Direction>,
    pub last_event_ms: Option<u64>,
    /// Neither sensor detected anything on the previous tick.
    pub prev_both_clear: bool,
}

impl Default for GateState {
    fn default() -> Self {
        Self {
            sensor_a: SensorState::default(),
            sensor_b: SensorState::default(),
            last_direction: None,
            last_event_ms: None,
            prev_both_clear: true,
        }
    }
}

impl GateState {
    /// Start time of the pending sequence, if one is open.
    pub fn pending_since(&self) -> Option<u64> {
        self.sensor_a.since_ms.or(self.sensor_b.since_ms)
    }

    pub fn clear_triggers(&mut self) {
        self.sensor_a.clear();
        self.sensor_b.clear();
    }
}

// ---------------------------------------------------------------------------
// Detection parameters
// ---------------------------------------------------------------------------

/// The subset of [`SystemConfig`] the detector reads every tick.
#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    pub min_distance_change_cm: f32,
    pub detection_timeout_ms: u64,
    pub debounce_ms: u64,
}

impl From<&SystemConfig> for DetectionParams {
    fn from(c: &SystemConfig) -> Self {
        Self {
            min_distance_change_cm: c.min_distance_change_cm,
            detection_timeout_ms: u64::from(c.detection_timeout_ms),
            debounce_ms: u64::from(c.debounce_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// GateContext
// ---------------------------------------------------------------------------

/// The shared context passed to every phase handler function.
pub struct GateContext {
    // -- Timing --
    /// Time of the current tick (ms since boot).
    pub now_ms: u64,

    // -- Readings --
    pub dist_a: DistanceSample,
    pub dist_b: DistanceSample,
    /// Sensor A deviates from its baseline by more than the threshold.
    pub detected_a: bool,
    pub detected_b: bool,

    // -- Calibration --
    pub baselines: Option<BaselinePair>,

    // -- Bookkeeping --
    pub gate: GateState,
    /// Crossing confirmed during this tick, drained by the service.
    pub confirmed: Option<Direction>,

    pub params: DetectionParams,
}

impl GateContext {
    pub fn new(params: DetectionParams) -> Self {
        Self {
            now_ms: 0,
            dist_a: DistanceSample::Invalid,
            dist_b: DistanceSample::Invalid,
            detected_a: false,
            detected_b: false,
            baselines: None,
            gate: GateState::default(),
            confirmed: None,
            params,
        }
    }

    /// Record a crossing; the phase handler then returns to `Idle`.
    pub fn confirm(&mut self, direction: Direction) {
        self.confirmed = Some(direction);
        self.gate.last_direction = Some(direction);
        self.gate.last_event_ms = Some(self.now_ms);
    }

    /// Whether `now_ms` falls inside the post-event quiet period.
    pub fn debouncing(&self) -> bool {
        self.gate
            .last_event_ms
            .is_some_and(|t| self.now_ms.saturating_sub(t) < self.params.debounce_ms)
    }

    /// Whether the pending sequence has outlived the detection timeout.
    pub fn sequence_expired(&self) -> bool {
        self.gate
            .pending_since()
            .is_some_and(|t| self.now_ms.saturating_sub(t) > self.params.detection_timeout_ms)
    }

    /// Recompute the per-sensor detection flags against the baselines.
    pub fn update_detection(&mut self) {
        let Some((base_a, base_b)) = self.baselines else {
            self.detected_a = false;
            self.detected_b = false;
            return;
        };
        let threshold = self.params.min_distance_change_cm;
        self.detected_a = base_a.deviation(self.dist_a).is_some_and(|d| d > threshold);
        self.detected_b = base_b.deviation(self.dist_b).is_some_and(|d| d > threshold);
    }
}
