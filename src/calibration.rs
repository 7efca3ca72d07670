//! Baseline calibration.
//!
//! A baseline is the distance each sensor sees across an empty gate.  The
//! calibrator samples both sensors in pairs, drops invalid readings and
//! averages what is left.  At least `calibration_min_valid` good samples
//! per sensor are required; otherwise the caller keeps whatever baseline
//! it had before.

use embedded_hal::delay::DelayNs;
use log::{info, warn};
use serde::Serialize;

use crate::app::ports::RangingPort;
use crate::config::SystemConfig;
use crate::error::CalibrationError;
use crate::sensors::{DistanceSample, SensorId};

/// "Clear gate" reference distance for one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Baseline {
    cm: f32,
}

impl Baseline {
    pub fn new(cm: f32) -> Self {
        Self { cm }
    }

    pub fn cm(self) -> f32 {
        self.cm
    }

    /// Absolute deviation of a valid sample from this baseline.
    pub fn deviation(self, sample: DistanceSample) -> Option<f32> {
        sample.cm().map(|cm| (cm - self.cm).abs())
    }
}

/// Baselines for sensor A and sensor B.
pub type BaselinePair = (Baseline, Baseline);

/// Run a full calibration: pre-delay, then paired samples of A and B.
///
/// Blocks for roughly `predelay + n × (pair_gap + interval)` plus the
/// ranging time; callers suspend detection for the duration.
pub fn calibrate(
    ranging: &mut impl RangingPort,
    delay: &mut impl DelayNs,
    config: &SystemConfig,
) -> Result<BaselinePair, CalibrationError> {
    info!(
        "Calibration: sampling in {} ms, keep the gate clear",
        config.calibration_predelay_ms
    );
    delay.delay_ms(config.calibration_predelay_ms);

    let (mut acc_a, mut acc_b) = (ValidMean::default(), ValidMean::default());

    for _ in 0..config.calibration_samples {
        acc_a.add(ranging.measure(SensorId::A));
        delay.delay_ms(config.calibration_pair_gap_ms);
        acc_b.add(ranging.measure(SensorId::B));
        delay.delay_ms(config.calibration_sample_interval_ms);
    }

    let min_valid = config.calibration_min_valid as usize;
    let result = acc_a
        .baseline(SensorId::A, min_valid)
        .and_then(|a| acc_b.baseline(SensorId::B, min_valid).map(|b| (a, b)));
    match &result {
        Ok((a, b)) => info!("Calibration: baseline A={:.1}cm B={:.1}cm", a.cm(), b.cm()),
        Err(e) => warn!("Calibration failed: {}", e),
    }
    result
}

/// Running sum and count of the valid samples seen for one sensor.
#[derive(Debug, Default)]
struct ValidMean {
    sum: f32,
    valid: usize,
}

impl ValidMean {
    fn add(&mut self, sample: DistanceSample) {
        if let Some(cm) = sample.cm() {
            self.sum += cm;
            self.valid += 1;
        }
    }

    fn baseline(&self, sensor: SensorId, min_valid: usize) -> Result<Baseline, CalibrationError> {
        if self.valid < min_valid {
            return Err(CalibrationError::InsufficientData {
                sensor,
                valid: self.valid,
                required: min_valid,
            });
        }
        Ok(Baseline::new(self.sum / self.valid as f32))
    }
}
