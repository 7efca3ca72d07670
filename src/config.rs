//! System configuration parameters
//!
//! All tunable parameters for the GateCount people counter.  Network
//! credentials and the collector URL are baked in at build time from the
//! `GATE_WIFI_SSID`, `GATE_WIFI_PASSWORD` and `GATE_REPORT_URL` environment
//! variables; everything else uses the defaults below.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const DEFAULT_WIFI_SSID: &str = "gatecount";
const DEFAULT_WIFI_PASSWORD: &str = "";
const DEFAULT_REPORT_URL: &str = "http://192.168.1.10:5000/api/sensor";

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Ranging ---
    /// Echo duration (µs) per centimetre of distance.
    pub calibration_divisor: f32,
    /// Shortest plausible distance (cm); closer readings are rejected.
    pub min_valid_distance_cm: f32,
    /// Longest plausible distance (cm); further readings are rejected.
    pub max_valid_distance_cm: f32,
    /// Raw samples averaged into one reading.
    pub samples_per_reading: u8,
    /// Delay after each raw sample (milliseconds).
    pub sample_settle_ms: u32,
    /// Longest wait (µs) for each echo edge; must cover the echo of the
    /// farthest valid distance.
    pub echo_timeout_us: u32,
    /// Poll iterations allowed per echo edge, a backstop behind
    /// `echo_timeout_us` should the clock stall.
    pub echo_spin_budget: u32,
    /// Trigger line held low before the pulse (microseconds).
    pub trigger_settle_us: u32,
    /// Trigger pulse width (microseconds).
    pub trigger_pulse_us: u32,

    // --- Detection ---
    /// Deviation from baseline (cm) that counts as "object present".
    pub min_distance_change_cm: f32,
    /// Maximum time (ms) between the first and second sensor of a crossing.
    pub detection_timeout_ms: u32,
    /// Quiet period (ms) after a confirmed event.
    pub debounce_ms: u32,

    // --- Calibration ---
    /// Paired samples taken per calibration run.
    pub calibration_samples: u8,
    /// Valid samples required per sensor for calibration to succeed.
    pub calibration_min_valid: u8,
    /// Wait before sampling so the gate can be cleared (milliseconds).
    pub calibration_predelay_ms: u32,
    /// Delay between the A and B sample of a pair (milliseconds).
    pub calibration_pair_gap_ms: u32,
    /// Delay after each pair (milliseconds).
    pub calibration_sample_interval_ms: u32,

    // --- Timing ---
    /// Detection loop period (milliseconds).
    pub poll_interval_ms: u32,
    /// Delay between measuring sensor A and sensor B (milliseconds).
    pub inter_sensor_delay_ms: u32,
    /// Back-off after a failed loop iteration (milliseconds).
    pub error_backoff_ms: u32,

    // --- Network ---
    pub wifi_ssid: String<32>,
    pub wifi_password: String<64>,
    /// Collector endpoint receiving `{"direction": ...}` POSTs.
    pub report_url: String<128>,
    /// Upper bound on one report round-trip (milliseconds).
    pub report_timeout_ms: u32,
    /// TCP port of the local query server.
    pub query_port: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Ranging (HC-SR04)
            calibration_divisor: 58.0,
            min_valid_distance_cm: 1.0,
            max_valid_distance_cm: 400.0,
            samples_per_reading: 2,
            sample_settle_ms: 20,
            echo_timeout_us: 30_000,
            echo_spin_budget: 1_000_000,
            trigger_settle_us: 2000,
            trigger_pulse_us: 10,

            // Detection
            min_distance_change_cm: 30.0,
            detection_timeout_ms: 4000,
            debounce_ms: 800,

            // Calibration
            calibration_samples: 5,
            calibration_min_valid: 3,
            calibration_predelay_ms: 3000,
            calibration_pair_gap_ms: 100,
            calibration_sample_interval_ms: 200,

            // Timing
            poll_interval_ms: 150,
            inter_sensor_delay_ms: 30,
            error_backoff_ms: 1000,

            // Network
            wifi_ssid: bounded(option_env!("GATE_WIFI_SSID").unwrap_or(DEFAULT_WIFI_SSID)),
            wifi_password: bounded(
                option_env!("GATE_WIFI_PASSWORD").unwrap_or(DEFAULT_WIFI_PASSWORD),
            ),
            report_url: bounded(option_env!("GATE_REPORT_URL").unwrap_or(DEFAULT_REPORT_URL)),
            report_timeout_ms: 5000,
            query_port: 80,
        }
    }
}

/// Copy `s` into a fixed-capacity string, truncating at a char boundary.
fn bounded<const N: usize>(s: &str) -> String<N> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

impl SystemConfig {
    /// Reject parameter combinations the detector cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.calibration_divisor <= 0.0 {
            return Err(Error::Config("calibration_divisor must be positive"));
        }
        if self.min_valid_distance_cm <= 0.0
            || self.max_valid_distance_cm <= self.min_valid_distance_cm
        {
            return Err(Error::Config("valid distance range is empty"));
        }
        if self.samples_per_reading == 0 {
            return Err(Error::Config("samples_per_reading must be at least 1"));
        }
        if self.echo_spin_budget == 0 {
            return Err(Error::Config("echo_spin_budget must be at least 1"));
        }
        if (self.echo_timeout_us as f32) < self.max_valid_distance_cm * self.calibration_divisor {
            return Err(Error::Config(
                "echo_timeout_us shorter than the echo of max_valid_distance_cm",
            ));
        }
        if self.min_distance_change_cm <= 0.0 {
            return Err(Error::Config("min_distance_change_cm must be positive"));
        }
        if self.detection_timeout_ms == 0 {
            return Err(Error::Config("detection_timeout_ms must be positive"));
        }
        if self.calibration_samples < 5 {
            return Err(Error::Config("calibration_samples must be at least 5"));
        }
        if self.calibration_min_valid < 3 || self.calibration_min_valid > self.calibration_samples
        {
            return Err(Error::Config(
                "calibration_min_valid must be in 3..=calibration_samples",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive"));
        }
        if self.report_timeout_ms == 0 {
            return Err(Error::Config("report_timeout_ms must be positive"));
        }
        if self.report_url.is_empty() {
            return Err(Error::Config("report_url is empty"));
        }
        Ok(())
    }
}
