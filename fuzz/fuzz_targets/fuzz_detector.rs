//! Fuzz target: GateService detection tick
//!
//! Decodes the input as a stream of `(gap_ms, dist_a, dist_b)` records and
//! drives them through a freshly started service.
//!
//! Invariants checked:
//! - No panics for any reading sequence (NaN and ±inf included)
//! - `total == entries − exits` after every tick
//! - Confirmed events are at least one debounce window apart
//!
//! cargo fuzz run fuzz_detector

#![no_main]

use gatecount::app::events::AppEvent;
use gatecount::app::ports::{EventReporter, EventSink};
use gatecount::app::service::GateService;
use gatecount::config::SystemConfig;
use gatecount::error::CommsError;
use gatecount::fsm::context::Direction;
use gatecount::sensors::DistanceSample;
use libfuzzer_sys::fuzz_target;

struct Null;

impl EventSink for Null {
    fn emit(&mut self, _event: &AppEvent) {}
}

impl EventReporter for Null {
    fn report(&mut self, _direction: Direction) -> Result<(), CommsError> {
        Ok(())
    }
}

fn sample(raw: [u8; 4]) -> DistanceSample {
    let cm = f32::from_le_bytes(raw);
    if cm > 0.0 {
        DistanceSample::Valid(cm)
    } else {
        DistanceSample::Invalid
    }
}

fuzz_target!(|data: &[u8]| {
    let config = SystemConfig::default();
    let debounce = u64::from(config.debounce_ms);
    let mut svc = GateService::new(config);
    svc.start(&mut Null);

    let mut now = 0u64;
    let mut last_event: Option<u64> = None;
    for chunk in data.chunks_exact(10) {
        now += u64::from(u16::from_le_bytes([chunk[0], chunk[1]]));
        let a = sample([chunk[2], chunk[3], chunk[4], chunk[5]]);
        let b = sample([chunk[6], chunk[7], chunk[8], chunk[9]]);

        if svc.tick(a, b, now, &mut Null, &mut Null).is_some() {
            if let Some(prev) = last_event {
                assert!(now - prev >= debounce);
            }
            last_event = Some(now);
        }

        let snap = svc.snapshot();
        assert_eq!(snap.total, i64::from(snap.entries) - i64::from(snap.exits));
    }
});
