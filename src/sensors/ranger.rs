//! HC-SR04 ultrasonic ranger driver.
//!
//! One measurement = a 10 µs trigger pulse followed by timing the echo
//! line's high phase.  Both echo edges are awaited against the ranger's
//! clock: a missing echo costs at most `echo_timeout_us` (with
//! `echo_spin_budget` polls as a backstop) and degrades to "no reading
//! this sample" instead of hanging the loop.
//!
//! [`Ranger::measure`] takes `samples_per_reading` raw samples, discards
//! the ones that timed out or fell outside the plausible range, and
//! averages the rest.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::trace;

use super::{DistanceSample, SensorId};
use crate::app::ports::MonotonicClock;
use crate::config::SystemConfig;
use crate::error::SensorError;

/// Ranging parameters copied out of [`SystemConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RangerSettings {
    pub divisor: f32,
    pub min_cm: f32,
    pub max_cm: f32,
    pub samples: u8,
    pub settle_ms: u32,
    pub echo_timeout_us: u64,
    pub spin_budget: u32,
    pub trigger_settle_us: u32,
    pub trigger_pulse_us: u32,
}

impl From<&SystemConfig> for RangerSettings {
    fn from(c: &SystemConfig) -> Self {
        Self {
            divisor: c.calibration_divisor,
            min_cm: c.min_valid_distance_cm,
            max_cm: c.max_valid_distance_cm,
            samples: c.samples_per_reading,
            settle_ms: c.sample_settle_ms,
            echo_timeout_us: u64::from(c.echo_timeout_us),
            spin_budget: c.echo_spin_budget,
            trigger_settle_us: c.trigger_settle_us,
            trigger_pulse_us: c.trigger_pulse_us,
        }
    }
}

/// Driver for one trigger/echo pin pair.
pub struct Ranger<T, E, D, C> {
    id: SensorId,
    trigger: T,
    echo: E,
    delay: D,
    clock: C,
    settings: RangerSettings,
}

impl<T, E, D, C> Ranger<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: MonotonicClock,
{
    pub fn new(id: SensorId, trigger: T, echo: E, delay: D, clock: C, settings: RangerSettings) -> Self {
        Self {
            id,
            trigger,
            echo,
            delay,
            clock,
            settings,
        }
    }

    pub fn id(&self) -> SensorId {
        self.id
    }

    /// Take the configured number of raw samples and average the good ones.
    pub fn measure(&mut self) -> DistanceSample {
        let mut sum = 0.0_f32;
        let mut valid = 0_u32;

        for _ in 0..self.settings.samples {
            match self.sample_cm() {
                Ok(cm) => {
                    sum += cm;
                    valid += 1;
                }
                Err(e) => trace!("ranger {}: sample dropped ({})", self.id, e),
            }
            self.delay.delay_ms(self.settings.settle_ms);
        }

        if valid == 0 {
            DistanceSample::Invalid
        } else {
            DistanceSample::Valid(sum / valid as f32)
        }
    }

    /// One raw sample converted to centimetres and range-checked.
    fn sample_cm(&mut self) -> Result<f32, SensorError> {
        let duration_us = self.pulse_echo_us()?;
        let cm = duration_us as f32 / self.settings.divisor;
        if (self.settings.min_cm..=self.settings.max_cm).contains(&cm) {
            Ok(cm)
        } else {
            Err(SensorError::OutOfRange)
        }
    }

    /// Fire the trigger and time the echo high phase (µs).
    fn pulse_echo_us(&mut self) -> Result<u64, SensorError> {
        self.trigger.set_low().map_err(|_| SensorError::GpioWriteFailed)?;
        self.delay.delay_us(self.settings.trigger_settle_us);
        self.trigger.set_high().map_err(|_| SensorError::GpioWriteFailed)?;
        self.delay.delay_us(self.settings.trigger_pulse_us);
        self.trigger.set_low().map_err(|_| SensorError::GpioWriteFailed)?;

        let fired = self.clock.now_us();
        let rise = self.wait_while(false, fired)?;
        let fall = self.wait_while(true, rise)?;

        Ok(fall.saturating_sub(rise))
    }

    /// Poll the echo line until it leaves `level`; returns the time of the
    /// edge.  Gives up once `echo_timeout_us` has passed since `since_us`
    /// or the spin budget is spent, whichever comes first.
    fn wait_while(&mut self, level: bool, since_us: u64) -> Result<u64, SensorError> {
        for _ in 0..self.settings.spin_budget {
            let high = self.echo.is_high().map_err(|_| SensorError::GpioReadFailed)?;
            let now = self.clock.now_us();
            if high != level {
                return Ok(now);
            }
            if now.saturating_sub(since_us) > self.settings.echo_timeout_us {
                break;
            }
        }
        Err(SensorError::EchoTimeout)
    }
}
