//! Application service — the hexagonal core.
//!
//! [`GateService`] owns the phase engine, the shared [`GateContext`] and
//! the [`Counters`].  It exposes a hardware-agnostic API: the driver loop
//! feeds it one pair of readings per tick, and the query adapter talks to
//! it through [`AppCommand`].
//!
//! ```text
//!  (distA, distB, now) ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!                          │       GateService        │
//!  AppCommand ───────────▶ │ guards · FSM · counters  │ ──▶ EventReporter
//!                          └─────────────────────────┘
//! ```
//!
//! Everything runs on the loop thread; the service is not `Sync` and
//! needs no locking.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::calibration::{self, BaselinePair};
use crate::config::SystemConfig;
use crate::counter::Counters;
use crate::error::CalibrationError;
use crate::fsm::context::{DetectionParams, Direction, GateContext, GateState};
use crate::fsm::states::build_phase_table;
use crate::fsm::{Fsm, Phase};
use crate::sensors::{DistanceSample, SensorId};

use super::commands::{AppCommand, AppReply, GateSnapshot};
use super::events::AppEvent;
use super::ports::{EventReporter, EventSink, RangingPort};

pub struct GateService {
    fsm: Fsm,
    ctx: GateContext,
    counters: Counters,
    config: SystemConfig,
}

impl GateService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM — call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        let ctx = GateContext::new(DetectionParams::from(&config));
        let fsm = Fsm::new(build_phase_table(), Phase::Uncalibrated);
        Self {
            fsm,
            ctx,
            counters: Counters::new(),
            config,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        sink.emit(&AppEvent::Started(self.fsm.current_phase()));
        info!("GateService started in {:?}", self.fsm.current_phase());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one detection tick on a pair of readings.
    ///
    /// Returns the direction of a crossing confirmed on this tick.  The
    /// counter update and the report happen before this returns; a report
    /// failure is logged and never rolls the counter back.
    pub fn tick(
        &mut self,
        dist_a: DistanceSample,
        dist_b: DistanceSample,
        now_ms: u64,
        reporter: &mut impl EventReporter,
        sink: &mut impl EventSink,
    ) -> Option<Direction> {
        self.ctx.now_ms = now_ms;
        self.ctx.dist_a = dist_a;
        self.ctx.dist_b = dist_b;

        // 1. No baseline: the tick is an implicit calibration attempt.
        if self.fsm.current_phase() == Phase::Uncalibrated {
            self.fsm.tick(&mut self.ctx);
            if let Some(pair) = self.ctx.baselines {
                sink.emit(&AppEvent::Calibrated(pair));
            }
            return None;
        }

        // 2. Per-sensor detection against the baselines.
        self.ctx.update_detection();
        let both_clear = !self.ctx.detected_a && !self.ctx.detected_b;

        // 3. Debounce: bookkeeping only.
        if self.ctx.debouncing() {
            self.ctx.gate.prev_both_clear = both_clear;
            return None;
        }

        // 4. Drop a stale half-sequence.
        let phase = self.fsm.current_phase();
        if phase.is_pending()
            && (self.ctx.sequence_expired() || (both_clear && self.ctx.gate.prev_both_clear))
        {
            info!("Sequence {:?} abandoned (timeout/clear), resetting", phase);
            self.fsm.force_transition(Phase::Idle, &mut self.ctx);
            sink.emit(&AppEvent::SequenceAbandoned { phase, at_ms: now_ms });
        }
        self.ctx.gate.prev_both_clear = both_clear;

        // 5/6. Entry and exit sequences.
        let before = self.fsm.current_phase();
        self.fsm.tick(&mut self.ctx);
        let after = self.fsm.current_phase();

        if let Some(direction) = self.ctx.confirmed.take() {
            self.counters.record(direction);
            info!(
                "Crossing {} | A={} B={} | in={} out={} total={}",
                direction,
                dist_a,
                dist_b,
                self.counters.entries(),
                self.counters.exits(),
                self.counters.total()
            );
            sink.emit(&AppEvent::Crossing {
                direction,
                entries: self.counters.entries(),
                exits: self.counters.exits(),
                total: self.counters.total(),
            });
            if let Err(error) = reporter.report(direction) {
                warn!("Report of '{}' failed: {}", direction, error);
                sink.emit(&AppEvent::ReportFailed { direction, error });
            }
            return Some(direction);
        }

        if before == Phase::Idle && after.is_pending() {
            let first = if after == Phase::PendingEntry {
                SensorId::A
            } else {
                SensorId::B
            };
            sink.emit(&AppEvent::SequenceStarted {
                first,
                at_ms: now_ms,
            });
        }
        None
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a command from the query adapter.
    ///
    /// `Recalibrate` blocks the caller for the whole calibration run.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        ranging: &mut impl RangingPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> AppReply {
        match cmd {
            AppCommand::Snapshot => AppReply::Snapshot(self.snapshot()),
            AppCommand::ResetCounters => {
                self.reset_counters(sink);
                AppReply::CountersReset
            }
            AppCommand::Recalibrate => match self.recalibrate(ranging, delay, sink) {
                Ok(pair) => AppReply::Calibrated(pair),
                Err(e) => AppReply::CalibrationFailed(e),
            },
        }
    }

    /// Zero entries, exits and the last event.
    pub fn reset_counters(&mut self, sink: &mut impl EventSink) {
        self.counters.reset();
        sink.emit(&AppEvent::CountersReset);
        info!("Counters reset");
    }

    /// Run the baseline calibrator with detection suspended.
    ///
    /// Any pending sequence is dropped first.  On failure the previous
    /// baseline stays in effect (or the gate stays uncalibrated).
    pub fn recalibrate(
        &mut self,
        ranging: &mut impl RangingPort,
        delay: &mut impl DelayNs,
        sink: &mut impl EventSink,
    ) -> Result<BaselinePair, CalibrationError> {
        if self.fsm.current_phase().is_pending() {
            self.fsm.force_transition(Phase::Idle, &mut self.ctx);
        }

        match calibration::calibrate(ranging, delay, &self.config) {
            Ok(pair) => {
                self.ctx.baselines = Some(pair);
                self.fsm.force_transition(Phase::Idle, &mut self.ctx);
                sink.emit(&AppEvent::Calibrated(pair));
                Ok(pair)
            }
            Err(e) => {
                sink.emit(&AppEvent::CalibrationFailed(e));
                Err(e)
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self) -> GateSnapshot {
        GateSnapshot {
            entries: self.counters.entries(),
            exits: self.counters.exits(),
            total: self.counters.total(),
            last_event: self.counters.last_event().map_or("none", Direction::as_str),
            sensor_a_cm: self.ctx.dist_a,
            sensor_b_cm: self.ctx.dist_b,
            phase: self.fsm.current_phase(),
            calibrated: self.ctx.baselines.is_some(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.fsm.current_phase()
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn gate_state(&self) -> &GateState {
        &self.ctx.gate
    }

    pub fn baselines(&self) -> Option<BaselinePair> {
        self.ctx.baselines
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }
}
