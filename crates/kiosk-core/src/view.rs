//! Render snapshot published by a session
//!
//! The renderer never reads session state directly. After every transition
//! the session publishes a fresh [`KioskView`] on a watch channel.

use crate::session::SessionId;
use chrono::{DateTime, Utc};
use kiosk_rotation::RotationState;
use kiosk_types::{AnalysisBundle, BriefingSection, CrosswindStatus, ForecastCard, ObservationTime, ProfileId, Readout, TargetId};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    /// Created, nothing started
    Initializing,
    /// Fetching the kiosk configuration
    ResolvingConfig,
    /// Profile was missing or disallowed; navigating away
    Redirecting,
    /// Initial analysis load running or retrying
    Loading,
    /// Briefing displayed; clock, poller and rotation running
    Steady,
    /// Initial load exhausted its retry budget; still retrying
    Stalled,
    /// Configuration could not be resolved
    Error,
    /// Torn down
    Disposed,
}

impl SessionPhase {
    /// No further transitions happen
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Redirecting | Self::Error | Self::Disposed)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initializing => "initializing",
            Self::ResolvingConfig => "resolving-config",
            Self::Redirecting => "redirecting",
            Self::Loading => "loading",
            Self::Steady => "steady",
            Self::Stalled => "stalled",
            Self::Error => "error",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// NOTAM marquee scroll period for `count` notices
#[must_use]
pub fn notam_marquee_period(count: usize) -> Duration {
    let per_notice = Duration::from_secs(10).saturating_mul(u32::try_from(count).unwrap_or(u32::MAX));
    per_notice.max(Duration::from_secs(30))
}

/// Everything the renderer needs
#[derive(Debug, Clone)]
pub struct KioskView {
    /// Session that produced this view
    pub session_id: SessionId,
    /// Lifecycle phase
    pub phase: SessionPhase,
    /// Airport shown
    pub target: TargetId,
    /// Resolved profile, once known
    pub profile: Option<ProfileId>,
    /// Document title, once loaded
    pub title: Option<String>,
    /// Wall clock at the last tick
    pub now: DateTime<Utc>,
    /// Ordered briefing sections
    pub sections: Arc<[BriefingSection]>,
    /// Last successfully loaded bundle
    pub bundle: Option<Arc<AnalysisBundle>>,
    /// Rotation position
    pub rotation: RotationState,
    /// A full load is running
    pub reloading: bool,
    /// An initial-load retry is scheduled
    pub retry_scheduled: bool,
    /// When the displayed bundle was loaded
    pub last_loaded_at: Option<DateTime<Utc>>,
    /// Issue time of the displayed observation
    pub observation_time: Option<ObservationTime>,
    /// Displayed observation is a special (off-cycle) report
    pub special_observation: bool,
    /// Operator-visible error
    pub error: Option<String>,
}

impl KioskView {
    /// Empty view for a new session
    #[must_use]
    pub fn new(session_id: SessionId, target: TargetId, profile: Option<ProfileId>) -> Self {
        Self {
            session_id,
            phase: SessionPhase::Initializing,
            target,
            profile,
            title: None,
            now: Utc::now(),
            sections: Arc::from(Vec::new()),
            bundle: None,
            rotation: RotationState::default(),
            reloading: false,
            retry_scheduled: false,
            last_loaded_at: None,
            observation_time: None,
            special_observation: false,
            error: None,
        }
    }

    /// Blocks to draw, with the first repeated at the end while looping
    #[must_use]
    pub fn render_sequence(&self) -> Vec<&BriefingSection> {
        let mut blocks: Vec<&BriefingSection> = self.sections.iter().collect();
        if self.rotation.loop_enabled {
            if let Some(first) = self.sections.first() {
                blocks.push(first);
            }
        }
        blocks
    }

    /// Section currently in view
    #[must_use]
    pub fn active_section(&self) -> Option<&BriefingSection> {
        if self.sections.is_empty() {
            return None;
        }
        self.sections.get(self.rotation.active_index % self.sections.len())
    }

    /// Crosswind limit of the resolved profile
    #[must_use]
    pub fn crosswind_limit_kts(&self) -> Option<u32> {
        self.profile.as_ref().and_then(ProfileId::crosswind_limit_kts)
    }

    /// NOTAM marquee period for the displayed bundle
    #[must_use]
    pub fn notam_marquee_period(&self) -> Duration {
        let count = self.bundle.as_ref().map_or(0, |b| b.raw_data.notams.len());
        notam_marquee_period(count)
    }

    /// Observation issue time on the airport's clock
    #[must_use]
    pub fn observation_local_time(&self) -> Option<String> {
        let tz = self.bundle.as_ref().and_then(|b| b.airport_tz.as_deref());
        self.observation_time.map(|t| t.local_label(tz))
    }

    /// Forecast cards for the displayed bundle
    #[must_use]
    pub fn forecast_cards(&self) -> Vec<ForecastCard> {
        self.bundle
            .as_ref()
            .map(|b| b.forecast_cards(&self.target))
            .unwrap_or_default()
    }

    /// Current-condition readouts for the displayed bundle
    #[must_use]
    pub fn readouts(&self) -> Vec<Readout> {
        self.bundle
            .as_ref()
            .map(|b| b.analysis.bubbles.readouts())
            .unwrap_or_default()
    }

    /// Crosswind verdict, `Unknown` until a bundle says otherwise
    #[must_use]
    pub fn crosswind_status(&self) -> CrosswindStatus {
        self.bundle
            .as_ref()
            .and_then(|b| b.analysis.crosswind_status)
            .unwrap_or_default()
    }

    /// Age of the displayed observation at the last clock tick
    #[must_use]
    pub fn observation_age(&self) -> Option<chrono::Duration> {
        self.observation_time.map(|t| t.age(self.now))
    }
}
