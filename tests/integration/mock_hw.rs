//! Mock hardware for integration tests.
//!
//! Scripted rangers, recording reporters and sinks, and a delay that only
//! keeps count, so tests can drive the gate tick by tick without real
//! GPIO or network.

use std::cell::Cell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use gatecount::app::events::AppEvent;
use gatecount::app::ports::{EventReporter, EventSink, MonotonicClock, RangingPort};
use gatecount::error::CommsError;
use gatecount::fsm::context::Direction;
use gatecount::sensors::{DistanceSample, SensorId};

pub fn cm(v: f32) -> DistanceSample {
    DistanceSample::Valid(v)
}

// ── ScriptedRanging ───────────────────────────────────────────

/// Returns queued samples per sensor, then a fixed fallback.
pub struct ScriptedRanging {
    a: VecDeque<DistanceSample>,
    b: VecDeque<DistanceSample>,
    pub fallback: DistanceSample,
    pub order: Vec<SensorId>,
}

#[allow(dead_code)]
impl ScriptedRanging {
    pub fn new() -> Self {
        Self {
            a: VecDeque::new(),
            b: VecDeque::new(),
            fallback: DistanceSample::Invalid,
            order: Vec::new(),
        }
    }

    pub fn with(a: &[DistanceSample], b: &[DistanceSample]) -> Self {
        let mut r = Self::new();
        r.a.extend(a.iter().copied());
        r.b.extend(b.iter().copied());
        r
    }
}

impl Default for ScriptedRanging {
    fn default() -> Self {
        Self::new()
    }
}

impl RangingPort for ScriptedRanging {
    fn measure(&mut self, sensor: SensorId) -> DistanceSample {
        self.order.push(sensor);
        let queue = match sensor {
            SensorId::A => &mut self.a,
            SensorId::B => &mut self.b,
        };
        queue.pop_front().unwrap_or(self.fallback)
    }
}

// ── Reporters ─────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingReporter {
    pub sent: Vec<Direction>,
}

impl EventReporter for RecordingReporter {
    fn report(&mut self, direction: Direction) -> Result<(), CommsError> {
        self.sent.push(direction);
        Ok(())
    }
}

/// Collector that answers every report with the given error.
pub struct FailingReporter {
    pub error: CommsError,
    pub attempts: u32,
}

impl FailingReporter {
    pub fn new(error: CommsError) -> Self {
        Self { error, attempts: 0 }
    }
}

impl EventReporter for FailingReporter {
    fn report(&mut self, _direction: Direction) -> Result<(), CommsError> {
        self.attempts += 1;
        Err(self.error)
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Returns immediately; remembers how long it was asked to wait.
#[derive(Default)]
pub struct NoDelay {
    pub total_ns: u64,
}

#[allow(dead_code)]
impl NoDelay {
    pub fn total_ms(&self) -> u64 {
        self.total_ns / 1_000_000
    }
}

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

// ── LogSink ───────────────────────────────────────────────────

/// Event sink that stores every event for later inspection.
#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn crossings(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::Crossing { .. }))
            .count()
    }

    pub fn has(&self, pred: impl Fn(&AppEvent) -> bool) -> bool {
        self.events.iter().any(pred)
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Simulated HC-SR04 ─────────────────────────────────────────

/// Time advanced by every echo poll (µs); native GPIO reads are faster.
pub const ECHO_POLL_US: u64 = 1;
/// Delay between the trigger falling edge and the echo rising edge (µs).
const ECHO_LEAD_US: u64 = 200;

/// Physical model of one HC-SR04: the echo line goes high shortly after a
/// trigger pulse and stays high for `distance × 58 µs`.  Time only moves
/// when the echo is polled or a delay elapses.
#[derive(Default)]
pub struct EchoModel {
    now_us: Cell<u64>,
    fired_at: Cell<Option<u64>>,
    trigger_high: Cell<bool>,
    distance_cm: Cell<Option<f32>>,
}

#[allow(dead_code)]
impl EchoModel {
    pub fn new(distance_cm: Option<f32>) -> Rc<Self> {
        let m = Self::default();
        m.distance_cm.set(distance_cm);
        Rc::new(m)
    }

    /// Move the reflecting object (`None` = nothing in range, no echo).
    pub fn set_distance(&self, cm: Option<f32>) {
        self.distance_cm.set(cm);
    }

    pub fn now_us(&self) -> u64 {
        self.now_us.get()
    }

    fn advance(&self, us: u64) {
        self.now_us.set(self.now_us.get() + us);
    }

    fn echo_high(&self) -> bool {
        let (Some(t0), Some(cm)) = (self.fired_at.get(), self.distance_cm.get()) else {
            return false;
        };
        let start = t0 + ECHO_LEAD_US;
        let width = (cm * 58.0) as u64;
        let now = self.now_us.get();
        now >= start && now < start + width
    }
}

pub struct ModelTrigger(pub Rc<EchoModel>);

impl embedded_hal::digital::ErrorType for ModelTrigger {
    type Error = Infallible;
}

impl OutputPin for ModelTrigger {
    fn set_low(&mut self) -> Result<(), Infallible> {
        if self.0.trigger_high.replace(false) {
            self.0.fired_at.set(Some(self.0.now_us()));
        }
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.trigger_high.set(true);
        Ok(())
    }
}

pub struct ModelEcho(pub Rc<EchoModel>);

impl embedded_hal::digital::ErrorType for ModelEcho {
    type Error = Infallible;
}

impl InputPin for ModelEcho {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        self.0.advance(ECHO_POLL_US);
        Ok(self.0.echo_high())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|h| !h)
    }
}

pub struct ModelClock(pub Rc<EchoModel>);

impl MonotonicClock for ModelClock {
    fn now_us(&self) -> u64 {
        self.0.now_us()
    }
}

/// Delay that advances the model's clock.
pub struct ModelDelay(pub Rc<EchoModel>);

impl DelayNs for ModelDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(u64::from(ns) / 1000);
    }
}
