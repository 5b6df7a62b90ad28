//! Test harness
//!
//! Seeded end-to-end simulation of a kiosk session against a simulated
//! backend, with invariant checks on every published view.

pub mod simulator;

pub use simulator::*;
