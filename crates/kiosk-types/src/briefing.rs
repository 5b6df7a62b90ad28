//! Briefing content
//!
//! The analysis backend returns one bundle per load. The kiosk derives an
//! ordered list of [`BriefingSection`]s from it; the order is the rotation
//! sequence. Sections are replaced wholesale on every successful load.

use crate::forecast::{ConditionBubbles, CrosswindStatus, ForecastCard, ForecastTimeline};
use crate::freshness::Fingerprint;
use crate::ids::{ProfileId, SourceId, TargetId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder shown for a section whose summary is empty
pub const NO_DATA: &str = "No data.";

/// Stable identifier of a briefing section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionId {
    /// Current weather summary
    Weather,
    /// Crosswind assessment for the target runway
    Crosswind,
    /// Airspace summary
    Airspace,
    /// Notable NOTAMs
    Notams,
}

impl SectionId {
    /// Lower-case name used in keys and logs
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionId::Weather => "weather",
            SectionId::Crosswind => "crosswind",
            SectionId::Airspace => "airspace",
            SectionId::Notams => "notams",
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One block of briefing text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefingSection {
    /// Section identifier
    pub id: SectionId,
    /// Heading
    pub title: String,
    /// Body text
    pub content: String,
}

impl BriefingSection {
    /// Create a section, substituting the no-data placeholder for empty bodies
    #[must_use]
    pub fn new(id: SectionId, title: impl Into<String>, content: Option<&str>) -> Self {
        let content = match content.map(str::trim) {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => NO_DATA.to_string(),
        };
        Self {
            id,
            title: title.into(),
            content,
        }
    }
}

/// Full analysis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Airport to analyze
    #[serde(rename = "icao")]
    pub target: TargetId,
    /// Aircraft profile
    #[serde(rename = "plane_size")]
    pub profile: ProfileId,
    /// Bypass any server-side cached result
    pub force: bool,
}

/// Structured analysis summaries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefingAnalysis {
    /// Weather narrative
    pub summary_weather: Option<String>,
    /// Crosswind narrative
    pub summary_crosswind: Option<String>,
    /// Airspace narrative
    pub summary_airspace: Option<String>,
    /// NOTAM narrative
    pub summary_notams: Option<String>,
    /// Flight category (VFR, MVFR, IFR, LIFR)
    pub flight_category: Option<String>,
    /// Permanent airspace warnings
    pub airspace_warnings: Vec<String>,
    /// Crosswind verdict for the profile
    pub crosswind_status: Option<CrosswindStatus>,
    /// Short current-condition values
    pub bubbles: ConditionBubbles,
    /// Forecast periods
    pub timeline: ForecastTimeline,
}

/// Raw data the analysis was produced from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSupportingData {
    /// Raw observation (METAR) used for fingerprinting
    pub metar: Option<String>,
    /// Raw terminal forecast
    pub taf: Option<String>,
    /// Raw NOTAM texts
    pub notams: Vec<String>,
    /// Upstream station the observation came from
    pub weather_source: Option<SourceId>,
}

/// Result of a full analysis load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisBundle {
    /// Display name of the airport
    #[serde(default)]
    pub airport_name: Option<String>,
    /// IANA time zone of the airport
    #[serde(default)]
    pub airport_tz: Option<String>,
    /// Summaries
    #[serde(default)]
    pub analysis: BriefingAnalysis,
    /// Raw data
    #[serde(default)]
    pub raw_data: RawSupportingData,
    /// Whether the backend answered from its cache
    #[serde(default)]
    pub is_cached: bool,
}

impl AnalysisBundle {
    /// Ordered briefing sections for display
    ///
    /// Headings name the upstream station when the observation was borrowed
    /// from somewhere other than the target.
    #[must_use]
    pub fn sections(&self, target: &TargetId) -> Vec<BriefingSection> {
        let borrowed = self.borrowed_source(target);

        let (weather_title, target_suffix) = match borrowed {
            Some(source) => (
                format!("CURRENT WEATHER ({source})"),
                format!(" ({target})"),
            ),
            None => ("CURRENT WEATHER".to_string(), String::new()),
        };

        let analysis = &self.analysis;
        vec![
            BriefingSection::new(
                SectionId::Weather,
                weather_title,
                analysis.summary_weather.as_deref(),
            ),
            BriefingSection::new(
                SectionId::Crosswind,
                format!("CROSSWIND FOR {target}"),
                analysis.summary_crosswind.as_deref(),
            ),
            BriefingSection::new(
                SectionId::Airspace,
                format!("AIRSPACE{target_suffix}"),
                analysis.summary_airspace.as_deref(),
            ),
            BriefingSection::new(
                SectionId::Notams,
                format!("NOTABLE NOTAMS{target_suffix}"),
                analysis.summary_notams.as_deref(),
            ),
        ]
    }

    /// Forecast cards, headed like the weather section
    #[must_use]
    pub fn forecast_cards(&self, target: &TargetId) -> Vec<ForecastCard> {
        self.analysis.timeline.cards(self.borrowed_source(target))
    }

    /// Upstream station, when it is not the target itself
    #[must_use]
    pub fn borrowed_source(&self, target: &TargetId) -> Option<&SourceId> {
        self.source().filter(|source| target.differs_from(source))
    }

    /// Fingerprint of the raw observation this bundle was built from
    #[must_use]
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        self.raw_data
            .metar
            .as_deref()
            .map(Fingerprint::from_observation)
    }

    /// Upstream station resolved for this bundle
    #[inline]
    #[must_use]
    pub fn source(&self) -> Option<&SourceId> {
        self.raw_data.weather_source.as_ref()
    }
}
