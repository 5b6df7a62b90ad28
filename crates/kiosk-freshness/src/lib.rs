//! Kiosk Freshness - cheap upstream change detection
//!
//! The full analysis load is expensive; a probe returning only the latest raw
//! observation is cheap. The [`FreshnessPoller`] decides, tick by tick:
//! - whether to send a probe (never two at once)
//! - whether a probe result means the displayed data is out of date
//! - whether a reload may start now (never while one is in flight)
//!
//! The poller never records the fingerprint it saw. Only a successful full
//! reload updates the session's fingerprint, so a failed reload is detected
//! again on the next tick instead of being forgotten.

#![warn(unreachable_pub)]

pub mod poller;

pub use poller::{FreshnessPoller, PollAction, PollVerdict, PollerStats};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
