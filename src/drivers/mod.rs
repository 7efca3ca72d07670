//! Peripheral helpers outside the sensor path.

pub mod watchdog;
