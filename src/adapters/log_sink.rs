//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART / USB-CDC on the device, stderr in the simulation).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(phase) => {
                info!("START | initial_phase={:?}", phase);
            }
            AppEvent::Calibrated((a, b)) => {
                info!("CALIB | baseline A={:.1}cm B={:.1}cm", a.cm(), b.cm());
            }
            AppEvent::CalibrationFailed(e) => {
                warn!("CALIB | failed: {}", e);
            }
            AppEvent::SequenceStarted { first, at_ms } => {
                info!("SEQ   | sensor {} triggered at {}ms, waiting for the other", first, at_ms);
            }
            AppEvent::SequenceAbandoned { phase, at_ms } => {
                info!("SEQ   | {:?} abandoned at {}ms", phase, at_ms);
            }
            AppEvent::Crossing {
                direction,
                entries,
                exits,
                total,
            } => {
                info!(
                    "CROSS | {} | in={} out={} total={}",
                    direction, entries, exits, total
                );
            }
            AppEvent::ReportFailed { direction, error } => {
                warn!("REPORT| '{}' not delivered: {}", direction, error);
            }
            AppEvent::CountersReset => {
                info!("RESET | counters zeroed");
            }
        }
    }
}
