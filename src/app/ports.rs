//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ GateService (domain)
//! ```
//!
//! Driven adapters (rangers, HTTP reporter, event sinks, clocks) implement
//! these traits.  The [`GateService`](super::service::GateService) consumes
//! them via generics, so the domain core never touches hardware directly.
//! Blocking delays use `embedded_hal::delay::DelayNs` directly.

use crate::error::CommsError;
use crate::fsm::context::Direction;
use crate::sensors::{DistanceSample, SensorId};

// ───────────────────────────────────────────────────────────────
// Ranging port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain one filtered distance.
pub trait RangingPort {
    /// Measure one sensor to completion.  Never blocks beyond the
    /// configured echo timeout; a missing echo yields
    /// [`DistanceSample::Invalid`].
    fn measure(&mut self, sensor: SensorId) -> DistanceSample;
}

// ───────────────────────────────────────────────────────────────
// Reporter port (driven adapter: domain → remote collector)
// ───────────────────────────────────────────────────────────────

/// Delivers a confirmed crossing to the remote collector.
///
/// Delivery is at-most-once and best-effort: the service logs a failure
/// and moves on, the counters stay authoritative.
pub trait EventReporter {
    fn report(&mut self, direction: Direction) -> Result<(), CommsError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic time source used to time echo pulses and loop periods.
pub trait MonotonicClock {
    /// Microseconds since boot.
    fn now_us(&self) -> u64;

    /// Milliseconds since boot.
    fn now_ms(&self) -> u64 {
        self.now_us() / 1000
    }
}
