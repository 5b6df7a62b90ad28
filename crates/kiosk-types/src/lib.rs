//! Kiosk Types - shared vocabulary of the briefing kiosk
//!
//! Defines the data the rotation and freshness engine passes around:
//! - Identifiers for targets (airports), profiles and upstream sources
//! - Briefing sections and the analysis bundle they are derived from
//! - Forecast cards, condition readouts and the crosswind verdict
//! - Remote kiosk configuration and profile resolution
//! - Freshness fingerprints, probe requests and responses
//! - Kiosk routes and navigation modes
//! - Observation-time parsing for raw weather reports
//!
//! # Example
//!
//! ```rust
//! use kiosk_types::{Fingerprint, KioskRoute};
//!
//! let a = Fingerprint::from_observation("KSFO 251853Z 28012KT  10SM");
//! let b = Fingerprint::from_observation("KSFO 251853Z 28012KT 10SM");
//! assert_eq!(a, b);
//!
//! let route: KioskRoute = "/kiosk/ksfo/small".parse().unwrap();
//! assert_eq!(route.to_string(), "/kiosk/KSFO/small");
//! ```

#![warn(unreachable_pub)]

pub mod briefing;
pub mod config;
pub mod error;
pub mod forecast;
pub mod freshness;
pub mod ids;
pub mod observation;
pub mod route;

pub use briefing::{AnalysisBundle, AnalysisRequest, BriefingAnalysis, BriefingSection, RawSupportingData, SectionId};
pub use config::{KioskConfig, ProfileDecision};
pub use error::TypeError;
pub use forecast::{
    ConditionBubbles, CrosswindStatus, ForecastCard, ForecastHorizon, ForecastPeriod, ForecastTimeline, Readout,
};
pub use freshness::{Fingerprint, FreshnessSignal, ProbeRequest, ProbeResponse, ProbeStatus};
pub use ids::{ProfileId, SourceId, TargetId};
pub use observation::{is_special_observation, ObservationTime};
pub use route::{KioskRoute, NavigationMode};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
