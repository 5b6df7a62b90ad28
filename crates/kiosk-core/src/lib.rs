//! Kiosk Core - session orchestration for the briefing kiosk
//!
//! A session displays one airport with one aircraft profile:
//! 1. **Resolve**: fetch the kiosk configuration, redirect on a bad profile
//! 2. **Load**: full analysis load, retried with backoff until it succeeds
//! 3. **Steady**: clock, wake lock, freshness polling and section rotation
//!
//! Each session is one tokio task owning all of its state. Timers and network
//! calls are child tasks posting events back into it; teardown aborts them.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use kiosk_core::prelude::*;
//!
//! let deps = SessionDeps::new(api, shell, Arc::new(NoWakeLock), extents);
//! let mut host = KioskHost::new(deps, KioskSettings::default())?;
//! host.open("/kiosk/KSTS/medium".parse()?).await;
//!
//! let view = host.current().map(SessionHandle::view);
//! ```

#![warn(unreachable_pub)]

pub mod api;
pub mod error;
pub mod host;
pub mod retry;
pub mod session;
pub mod settings;
pub mod shell;
pub mod tasks;
pub mod view;

// Test harness
pub mod test_harness;

pub use api::{BriefingApi, SessionContext};
pub use error::{ApiError, SessionError, SettingsError};
pub use host::{KioskHost, NavigationRequest};
pub use retry::RetryPolicy;
pub use session::{KioskSession, SessionDeps, SessionHandle, SessionId, SessionOrchestrator, SessionOutcome};
pub use settings::KioskSettings;
pub use shell::{KioskShell, NoWakeLock, ScreenWakeLock, TracingShell, WakeLockError};
pub use tasks::{TimerFired, TimerKind};
pub use view::{notam_marquee_period, KioskView, SessionPhase};

/// Common imports for embedding the kiosk
pub mod prelude {
    pub use crate::{
        BriefingApi, KioskHost, KioskSettings, KioskShell, KioskView, NoWakeLock, ScreenWakeLock, SessionContext,
        SessionDeps, SessionHandle, SessionOrchestrator, SessionPhase,
    };
    pub use kiosk_rotation::{ExtentProvider, TextExtentEstimator};
    pub use kiosk_types::{KioskRoute, NavigationMode, ProfileId, TargetId};
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
