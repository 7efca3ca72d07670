//! Sensor subsystem — the HC-SR04 [`Ranger`] driver and the [`SensorHub`]
//! that owns both gate sensors.
//!
//! Sensor A sits on the outside of the gate, sensor B on the inside; an
//! A→B crossing is an entry.

pub mod ranger;

use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use serde::{Serialize, Serializer};

use crate::app::ports::{MonotonicClock, RangingPort};
pub use ranger::Ranger;

/// Identity of one of the two gate sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorId {
    /// Outer sensor (first to fire on entry).
    A,
    /// Inner sensor (first to fire on exit).
    B,
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// One filtered distance reading for one sensor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum DistanceSample {
    /// Averaged in-range distance in centimetres.
    Valid(f32),
    /// No sample passed the echo and range checks.
    #[default]
    Invalid,
}

impl DistanceSample {
    pub fn cm(self) -> Option<f32> {
        match self {
            Self::Valid(cm) => Some(cm),
            Self::Invalid => None,
        }
    }

    /// Wire representation: distance in cm, or `-1` when invalid.
    pub fn as_wire(self) -> f32 {
        self.cm().unwrap_or(-1.0)
    }
}

impl fmt::Display for DistanceSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(cm) => write!(f, "{cm:.1}cm"),
            Self::Invalid => write!(f, "--"),
        }
    }
}

impl Serialize for DistanceSample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f32(self.as_wire())
    }
}

// ---------------------------------------------------------------------------
// SensorHub
// ---------------------------------------------------------------------------

/// Owns both rangers and measures them strictly one after the other.
pub struct SensorHub<T, E, D, C> {
    a: Ranger<T, E, D, C>,
    b: Ranger<T, E, D, C>,
}

impl<T, E, D, C> SensorHub<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: MonotonicClock,
{
    pub fn new(a: Ranger<T, E, D, C>, b: Ranger<T, E, D, C>) -> Self {
        Self { a, b }
    }
}

impl<T, E, D, C> RangingPort for SensorHub<T, E, D, C>
where
    T: OutputPin,
    E: InputPin,
    D: DelayNs,
    C: MonotonicClock,
{
    fn measure(&mut self, sensor: SensorId) -> DistanceSample {
        match sensor {
            SensorId::A => self.a.measure(),
            SensorId::B => self.b.measure(),
        }
    }
}

// ---------------------------------------------------------------------------
// Host simulation
// ---------------------------------------------------------------------------

/// Simulated distances in f32 bits; the negative sentinel means "no echo".
static SIM_DISTANCE_A: AtomicU32 = AtomicU32::new(0x4248_0000); // 50.0
static SIM_DISTANCE_B: AtomicU32 = AtomicU32::new(0x4270_0000); // 60.0

/// Inject the distance the simulated sensor reports (`None` = no echo).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_distance(sensor: SensorId, cm: Option<f32>) {
    let bits = cm.unwrap_or(-1.0).to_bits();
    match sensor {
        SensorId::A => SIM_DISTANCE_A.store(bits, Ordering::Relaxed),
        SensorId::B => SIM_DISTANCE_B.store(bits, Ordering::Relaxed),
    }
}

/// Parse one simulation console line: `<a|b> <cm|none>`.
///
/// `a 20` puts an object 20 cm in front of sensor A; `b none` makes
/// sensor B miss its echo.
#[cfg(not(target_os = "espidf"))]
pub fn parse_sim_command(line: &str) -> Option<(SensorId, Option<f32>)> {
    let mut words = line.split_whitespace();
    let sensor = match words.next()? {
        "a" | "A" => SensorId::A,
        "b" | "B" => SensorId::B,
        _ => return None,
    };
    let cm = match words.next()? {
        "none" | "-" => None,
        value => Some(value.parse::<f32>().ok().filter(|cm| *cm > 0.0)?),
    };
    words.next().is_none().then_some((sensor, cm))
}

/// Ranging port backed by the injectable simulation values.
#[derive(Debug, Default)]
pub struct SimRanging;

impl RangingPort for SimRanging {
    fn measure(&mut self, sensor: SensorId) -> DistanceSample {
        let bits = match sensor {
            SensorId::A => SIM_DISTANCE_A.load(Ordering::Relaxed),
            SensorId::B => SIM_DISTANCE_B.load(Ordering::Relaxed),
        };
        let cm = f32::from_bits(bits);
        if cm > 0.0 {
            DistanceSample::Valid(cm)
        } else {
            DistanceSample::Invalid
        }
    }
}
