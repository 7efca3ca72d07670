//! Integration tests for the readings → GateService → counters/reporter
//! pipeline, driven tick by tick with mock adapters.

use crate::mock_hw::{FailingReporter, LogSink, NoDelay, RecordingReporter, ScriptedRanging, cm};

use gatecount::app::commands::{AppCommand, AppReply};
use gatecount::app::events::AppEvent;
use gatecount::app::service::GateService;
use gatecount::calibration::Baseline;
use gatecount::config::SystemConfig;
use gatecount::error::{CalibrationError, CommsError};
use gatecount::fsm::Phase;
use gatecount::fsm::context::Direction;
use gatecount::sensors::{DistanceSample, SensorId};

const BASE_A: f32 = 50.0;
const BASE_B: f32 = 60.0;
/// A reading well inside the detection threshold of either baseline.
const NEAR: f32 = 10.0;

/// Service calibrated implicitly at t=0 to A=50cm, B=60cm.
fn make_gate() -> (GateService, RecordingReporter, LogSink) {
    let mut svc = GateService::new(SystemConfig::default());
    let mut rep = RecordingReporter::default();
    let mut sink = LogSink::new();
    svc.start(&mut sink);
    svc.tick(cm(BASE_A), cm(BASE_B), 0, &mut rep, &mut sink);
    assert_eq!(svc.phase(), Phase::Idle);
    (svc, rep, sink)
}

fn a_only() -> (DistanceSample, DistanceSample) {
    (cm(NEAR), cm(BASE_B))
}

fn b_only() -> (DistanceSample, DistanceSample) {
    (cm(BASE_A), cm(NEAR))
}

fn clear() -> (DistanceSample, DistanceSample) {
    (cm(BASE_A), cm(BASE_B))
}

fn tick(
    svc: &mut GateService,
    rep: &mut RecordingReporter,
    sink: &mut LogSink,
    (a, b): (DistanceSample, DistanceSample),
    now_ms: u64,
) -> Option<Direction> {
    svc.tick(a, b, now_ms, rep, sink)
}

// ── Implicit calibration ──────────────────────────────────────

#[test]
fn first_valid_pair_becomes_baseline() {
    let (svc, _, sink) = make_gate();
    assert_eq!(
        svc.baselines(),
        Some((Baseline::new(BASE_A), Baseline::new(BASE_B)))
    );
    assert!(sink.has(|e| matches!(e, AppEvent::Calibrated(_))));
    assert_eq!(svc.counters().entries(), 0);
}

#[test]
fn invalid_reading_keeps_gate_uncalibrated() {
    let mut svc = GateService::new(SystemConfig::default());
    let mut rep = RecordingReporter::default();
    let mut sink = LogSink::new();
    svc.start(&mut sink);

    svc.tick(DistanceSample::Invalid, cm(60.0), 0, &mut rep, &mut sink);
    assert_eq!(svc.phase(), Phase::Uncalibrated);
    svc.tick(cm(10.0), cm(10.0), 150, &mut rep, &mut sink);
    assert_eq!(svc.phase(), Phase::Idle, "any valid pair calibrates");
    assert!(rep.sent.is_empty(), "calibration tick never detects");
}

// ── Entry / exit ──────────────────────────────────────────────

#[test]
fn a_then_b_counts_one_entry() {
    let (mut svc, mut rep, mut sink) = make_gate();

    assert_eq!(tick(&mut svc, &mut rep, &mut sink, a_only(), 1000), None);
    assert_eq!(svc.phase(), Phase::PendingEntry);
    assert_eq!(
        tick(&mut svc, &mut rep, &mut sink, b_only(), 1150),
        Some(Direction::In)
    );

    let snap = svc.snapshot();
    assert_eq!((snap.entries, snap.exits, snap.total), (1, 0, 1));
    assert_eq!(snap.last_event, "in");
    assert_eq!(rep.sent, vec![Direction::In]);
    assert_eq!(svc.phase(), Phase::Idle);
    assert!(!svc.gate_state().sensor_a.triggered);
    assert!(!svc.gate_state().sensor_b.triggered);
    assert!(sink.has(|e| matches!(
        e,
        AppEvent::SequenceStarted {
            first: SensorId::A,
            at_ms: 1000
        }
    )));
}

#[test]
fn b_then_a_counts_one_exit() {
    let (mut svc, mut rep, mut sink) = make_gate();

    tick(&mut svc, &mut rep, &mut sink, b_only(), 1000);
    assert_eq!(svc.phase(), Phase::PendingExit);
    assert_eq!(
        tick(&mut svc, &mut rep, &mut sink, a_only(), 1150),
        Some(Direction::Out)
    );

    let snap = svc.snapshot();
    assert_eq!((snap.entries, snap.exits, snap.total), (0, 1, -1));
    assert_eq!(rep.sent, vec![Direction::Out]);
}

#[test]
fn lingering_on_a_does_not_count() {
    let (mut svc, mut rep, mut sink) = make_gate();
    for i in 0..10 {
        tick(&mut svc, &mut rep, &mut sink, a_only(), 1000 + i * 150);
    }
    assert_eq!(svc.phase(), Phase::PendingEntry);
    assert_eq!(sink.crossings(), 0);
}

#[test]
fn simultaneous_trigger_opens_entry_and_needs_another_b() {
    let (mut svc, mut rep, mut sink) = make_gate();

    assert_eq!(
        tick(&mut svc, &mut rep, &mut sink, (cm(NEAR), cm(NEAR)), 1000),
        None
    );
    assert_eq!(svc.phase(), Phase::PendingEntry);
    assert_eq!(
        tick(&mut svc, &mut rep, &mut sink, b_only(), 1150),
        Some(Direction::In)
    );
}

// ── Stale sequences ───────────────────────────────────────────

#[test]
fn late_second_sensor_after_timeout_is_not_an_entry() {
    let (mut svc, mut rep, mut sink) = make_gate();

    tick(&mut svc, &mut rep, &mut sink, a_only(), 1000);
    // 4200 ms later: past DETECTION_TIMEOUT.
    assert_eq!(tick(&mut svc, &mut rep, &mut sink, b_only(), 5200), None);

    assert!(sink.has(|e| matches!(
        e,
        AppEvent::SequenceAbandoned {
            phase: Phase::PendingEntry,
            at_ms: 5200
        }
    )));
    assert_eq!(svc.counters().entries(), 0);
    assert_eq!(svc.phase(), Phase::PendingExit, "B now opens a fresh exit sequence");
}

#[test]
fn second_sensor_just_inside_timeout_still_counts() {
    let (mut svc, mut rep, mut sink) = make_gate();
    tick(&mut svc, &mut rep, &mut sink, a_only(), 1000);
    assert_eq!(
        tick(&mut svc, &mut rep, &mut sink, b_only(), 5000),
        Some(Direction::In)
    );
}

#[test]
fn two_clear_ticks_abandon_a_pending_sequence() {
    let (mut svc, mut rep, mut sink) = make_gate();

    tick(&mut svc, &mut rep, &mut sink, a_only(), 1000);
    tick(&mut svc, &mut rep, &mut sink, clear(), 1150);
    assert_eq!(svc.phase(), Phase::PendingEntry, "one clear tick is not enough");
    tick(&mut svc, &mut rep, &mut sink, clear(), 1300);
    assert_eq!(svc.phase(), Phase::Idle);

    assert_eq!(tick(&mut svc, &mut rep, &mut sink, b_only(), 1450), None);
    assert_eq!(svc.phase(), Phase::PendingExit);
    assert_eq!(svc.counters().entries(), 0);
}

// ── Debounce ──────────────────────────────────────────────────

#[test]
fn crossings_inside_debounce_window_are_ignored() {
    let (mut svc, mut rep, mut sink) = make_gate();

    tick(&mut svc, &mut rep, &mut sink, a_only(), 1000);
    tick(&mut svc, &mut rep, &mut sink, b_only(), 1150);

    // Immediate reverse crossing: inside the 800 ms quiet period.
    assert_eq!(tick(&mut svc, &mut rep, &mut sink, b_only(), 1300), None);
    assert_eq!(tick(&mut svc, &mut rep, &mut sink, a_only(), 1450), None);
    assert_eq!(svc.phase(), Phase::Idle);
    assert_eq!(sink.crossings(), 1);

    // Quiet period over.
    tick(&mut svc, &mut rep, &mut sink, b_only(), 1950);
    assert_eq!(
        tick(&mut svc, &mut rep, &mut sink, a_only(), 2100),
        Some(Direction::Out)
    );
    assert_eq!(rep.sent, vec![Direction::In, Direction::Out]);
}

#[test]
fn readings_still_update_while_debouncing() {
    let (mut svc, mut rep, mut sink) = make_gate();
    tick(&mut svc, &mut rep, &mut sink, a_only(), 1000);
    tick(&mut svc, &mut rep, &mut sink, b_only(), 1150);
    tick(&mut svc, &mut rep, &mut sink, (cm(42.0), DistanceSample::Invalid), 1300);

    let snap = svc.snapshot();
    assert_eq!(snap.sensor_a_cm, cm(42.0));
    assert_eq!(snap.sensor_b_cm, DistanceSample::Invalid);
}

// ── Reporting ─────────────────────────────────────────────────

#[test]
fn failed_report_keeps_the_count() {
    let (mut svc, _, mut sink) = make_gate();
    let mut rep = FailingReporter::new(CommsError::ReportRejected(500));

    svc.tick(cm(NEAR), cm(BASE_B), 1000, &mut rep, &mut sink);
    let dir = svc.tick(cm(BASE_A), cm(NEAR), 1150, &mut rep, &mut sink);

    assert_eq!(dir, Some(Direction::In));
    assert_eq!(rep.attempts, 1, "at-most-once: no retry");
    assert_eq!(svc.counters().entries(), 1);
    assert!(sink.has(|e| matches!(
        e,
        AppEvent::ReportFailed {
            direction: Direction::In,
            error: CommsError::ReportRejected(500)
        }
    )));

    // The next tick proceeds normally.
    svc.tick(cm(BASE_A), cm(BASE_B), 1300, &mut rep, &mut sink);
    assert_eq!(svc.phase(), Phase::Idle);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn reset_is_idempotent_and_clears_last_event() {
    let (mut svc, mut rep, mut sink) = make_gate();
    let mut ranging = ScriptedRanging::new();
    let mut delay = NoDelay::default();

    tick(&mut svc, &mut rep, &mut sink, a_only(), 1000);
    tick(&mut svc, &mut rep, &mut sink, b_only(), 1150);
    assert_eq!(svc.snapshot().entries, 1);

    for _ in 0..3 {
        let reply = svc.handle_command(AppCommand::ResetCounters, &mut ranging, &mut delay, &mut sink);
        assert_eq!(reply, AppReply::CountersReset);
        let snap = svc.snapshot();
        assert_eq!((snap.entries, snap.exits, snap.total), (0, 0, 0));
        assert_eq!(snap.last_event, "none");
    }
    assert!(ranging.order.is_empty(), "reset never touches the sensors");
}

#[test]
fn snapshot_command_is_read_only() {
    let (mut svc, mut rep, mut sink) = make_gate();
    let mut ranging = ScriptedRanging::new();
    let mut delay = NoDelay::default();
    tick(&mut svc, &mut rep, &mut sink, a_only(), 1000);

    let before = *svc.gate_state();
    let reply = svc.handle_command(AppCommand::Snapshot, &mut ranging, &mut delay, &mut sink);
    let AppReply::Snapshot(snap) = reply else {
        panic!("expected a snapshot, got {:?}", reply);
    };
    assert_eq!(snap.phase, Phase::PendingEntry);
    assert!(snap.calibrated);
    assert_eq!(*svc.gate_state(), before);
}

#[test]
fn recalibrate_sets_mean_of_valid_samples() {
    let (mut svc, _, mut sink) = make_gate();
    let mut ranging = ScriptedRanging::with(
        &[cm(50.0), cm(52.0), cm(51.0), cm(49.0), cm(50.0)],
        &[cm(60.0), cm(61.0), cm(59.0), cm(60.0), cm(62.0)],
    );
    let mut delay = NoDelay::default();

    let reply = svc.handle_command(AppCommand::Recalibrate, &mut ranging, &mut delay, &mut sink);
    let AppReply::Calibrated((a, b)) = reply else {
        panic!("expected success, got {:?}", reply);
    };
    assert!((a.cm() - 50.4).abs() < 0.01);
    assert!((b.cm() - 60.4).abs() < 0.01);
    assert_eq!(svc.baselines(), Some((a, b)));

    // A before B in every pair.
    let expected: Vec<SensorId> = (0..5).flat_map(|_| [SensorId::A, SensorId::B]).collect();
    assert_eq!(ranging.order, expected);

    // Pre-delay plus five (in-pair + inter-pair) gaps.
    let cfg = SystemConfig::default();
    let expected_ms = u64::from(cfg.calibration_predelay_ms)
        + 5 * u64::from(cfg.calibration_pair_gap_ms + cfg.calibration_sample_interval_ms);
    assert_eq!(delay.total_ms(), expected_ms);
}

#[test]
fn failed_recalibration_keeps_prior_baseline() {
    let (mut svc, _, mut sink) = make_gate();
    let invalid = DistanceSample::Invalid;
    let mut ranging = ScriptedRanging::with(
        &[cm(30.0), cm(31.0), cm(30.0), cm(29.0), cm(30.0)],
        &[cm(60.0), invalid, cm(61.0), invalid, invalid],
    );
    let mut delay = NoDelay::default();

    let reply = svc.handle_command(AppCommand::Recalibrate, &mut ranging, &mut delay, &mut sink);
    assert_eq!(
        reply,
        AppReply::CalibrationFailed(CalibrationError::InsufficientData {
            sensor: SensorId::B,
            valid: 2,
            required: 3,
        })
    );
    assert_eq!(
        svc.baselines(),
        Some((Baseline::new(BASE_A), Baseline::new(BASE_B)))
    );
    assert!(sink.has(|e| matches!(e, AppEvent::CalibrationFailed(_))));
}

#[test]
fn failed_recalibration_without_baseline_stays_uncalibrated() {
    let mut svc = GateService::new(SystemConfig::default());
    let mut rep = RecordingReporter::default();
    let mut sink = LogSink::new();
    svc.start(&mut sink);

    let mut ranging = ScriptedRanging::new();
    let mut delay = NoDelay::default();
    assert!(svc.recalibrate(&mut ranging, &mut delay, &mut sink).is_err());
    assert_eq!(svc.phase(), Phase::Uncalibrated);

    // The implicit first-valid-tick calibration still applies.
    svc.tick(cm(70.0), cm(80.0), 5000, &mut rep, &mut sink);
    assert_eq!(svc.phase(), Phase::Idle);
}

#[test]
fn recalibration_drops_a_pending_sequence() {
    let (mut svc, mut rep, mut sink) = make_gate();
    tick(&mut svc, &mut rep, &mut sink, a_only(), 1000);
    assert_eq!(svc.phase(), Phase::PendingEntry);

    let mut ranging = ScriptedRanging::new();
    ranging.fallback = cm(55.0);
    let mut delay = NoDelay::default();
    svc.recalibrate(&mut ranging, &mut delay, &mut sink).unwrap();

    assert_eq!(svc.phase(), Phase::Idle);
    assert!(!svc.gate_state().sensor_a.triggered);
    // B alone must not complete the old entry.
    assert_eq!(svc.tick(cm(55.0), cm(NEAR), 1300, &mut rep, &mut sink), None);
    assert_eq!(svc.counters().entries(), 0);
}
