//! Kiosk Rotation - overflow detection and seamless rotation
//!
//! Two pieces, both free of timers and I/O so they can be driven by any
//! event loop and tested without a rendering surface:
//! - [`ContentMeasurer`]: turns per-block extents reported by the rendering
//!   layer into cumulative offsets and an overflow verdict
//! - [`RotationScheduler`]: the active-index state machine, including the
//!   duplicate-block wraparound and generation-tagged timers
//!
//! The caller owns the actual timers. Every directive the scheduler returns
//! names the [`Generation`] it belongs to; feeding a timer back with an older
//! generation is a no-op.
//!
//! # Example
//!
//! ```rust
//! use kiosk_rotation::{Measurement, RotationDirective, RotationScheduler, RotationTiming};
//!
//! let mut scheduler = RotationScheduler::new(RotationTiming::default());
//! let RotationDirective::ScheduleSettle { generation, .. } = scheduler.reset(4) else {
//!     unreachable!()
//! };
//!
//! let measurement = Measurement::from_extents(&[300, 300, 300, 300], 800);
//! let directive = scheduler.apply_measurement(generation, &measurement);
//! assert!(matches!(directive, RotationDirective::StartAdvancing { .. }));
//! assert_eq!(scheduler.state().offsets, vec![0, 300, 600, 900, 1200]);
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod measurer;
pub mod scheduler;

pub use error::TimingError;
pub use measurer::{ContentMeasurer, ExtentProvider, Measurement, TextExtentEstimator};
pub use scheduler::{
    Generation, RotationDirective, RotationPhase, RotationScheduler, RotationState,
    RotationTiming,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
