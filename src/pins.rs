//! GPIO pin assignments for the gate sensor board.
//!
//! Single source of truth — the hardware adapter references this module
//! rather than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Sensor A (outer side of the gate)
// ---------------------------------------------------------------------------

/// HC-SR04 trigger input, driven as a digital output.
pub const TRIG_A_GPIO: i32 = 5;
/// HC-SR04 echo output, read as a pulled-down digital input.
pub const ECHO_A_GPIO: i32 = 18;

// ---------------------------------------------------------------------------
// Sensor B (inner side of the gate)
// ---------------------------------------------------------------------------

pub const TRIG_B_GPIO: i32 = 19;
pub const ECHO_B_GPIO: i32 = 21;
