//! GateCount firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod calibration;
pub mod config;
pub mod counter;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod sensors;

// The adapters and drivers compile on every target; their ESP-IDF halves
// are guarded by cfg attributes inside.
pub mod adapters;
pub mod drivers;
