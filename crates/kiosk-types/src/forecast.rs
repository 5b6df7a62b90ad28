//! Forecast timeline and condition readouts
//!
//! Alongside the narrative sections the analysis carries two forecast
//! periods derived from the terminal forecast, a handful of short current
//! condition values and a crosswind verdict against the aircraft profile.

use crate::ids::SourceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shown on a forecast card whose period has no summary
pub const NO_FORECAST: &str = "No Forecast Available";

/// Shown for a condition value the analysis left out
pub const MISSING_VALUE: &str = "--";

/// One forecast period
///
/// The backend sends either a bare summary string or an object with a
/// label for the period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForecastPeriod {
    /// Summary only
    Text(String),
    /// Labelled period
    Detailed {
        /// Period label, e.g. "18Z-00Z"
        #[serde(default)]
        time_label: Option<String>,
        /// Forecast summary
        #[serde(default)]
        summary: Option<String>,
    },
}

impl ForecastPeriod {
    /// Non-blank period label
    #[must_use]
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Text(_) => None,
            Self::Detailed { time_label, .. } => non_blank(time_label.as_deref()),
        }
    }

    /// Non-blank summary
    #[must_use]
    pub fn summary(&self) -> Option<&str> {
        match self {
            Self::Text(text) => non_blank(Some(text.as_str())),
            Self::Detailed { summary, .. } => non_blank(summary.as_deref()),
        }
    }
}

/// Forecast periods ahead of now
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastTimeline {
    /// Next six hours
    pub t_06: Option<ForecastPeriod>,
    /// Six to twelve hours out
    pub t_12: Option<ForecastPeriod>,
}

/// Which forecast period a card shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastHorizon {
    /// `t_06`
    SixHours,
    /// `t_12`
    TwelveHours,
}

impl ForecastHorizon {
    /// Label used when the period carries none
    #[must_use]
    pub fn default_label(self) -> &'static str {
        match self {
            Self::SixHours => "Next 6 Hours",
            Self::TwelveHours => "Next 12 Hours",
        }
    }
}

/// A forecast card ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastCard {
    /// Period shown
    pub horizon: ForecastHorizon,
    /// Heading
    pub title: String,
    /// Body text
    pub summary: String,
}

impl ForecastTimeline {
    /// Cards for both periods, in order
    ///
    /// `borrowed` is the upstream station when the forecast was taken from
    /// somewhere other than the target; it is appended to every heading.
    #[must_use]
    pub fn cards(&self, borrowed: Option<&SourceId>) -> Vec<ForecastCard> {
        [
            (ForecastHorizon::SixHours, self.t_06.as_ref()),
            (ForecastHorizon::TwelveHours, self.t_12.as_ref()),
        ]
        .into_iter()
        .map(|(horizon, period)| {
            let label = period.and_then(ForecastPeriod::label).unwrap_or(horizon.default_label());
            let title = match borrowed {
                Some(source) => format!("Weather {label} ({source})"),
                None => format!("Weather {label}"),
            };
            let summary = period.and_then(ForecastPeriod::summary).unwrap_or(NO_FORECAST);
            ForecastCard {
                horizon,
                title,
                summary: summary.to_string(),
            }
        })
        .collect()
    }
}

/// Crosswind verdict against the profile limit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrosswindStatus {
    /// Comfortably inside the limit
    #[serde(rename = "WITHIN LIMITS")]
    WithinLimits,
    /// Close to the limit
    #[serde(rename = "NEAR LIMITS")]
    NearLimits,
    /// Over the limit for the profile
    #[serde(rename = "EXCEEDS PROFILE")]
    ExceedsProfile,
    /// Not determined
    #[default]
    #[serde(rename = "UNK", other)]
    Unknown,
}

impl CrosswindStatus {
    /// Display text
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WithinLimits => "WITHIN LIMITS",
            Self::NearLimits => "NEAR LIMITS",
            Self::ExceedsProfile => "EXCEEDS PROFILE",
            Self::Unknown => "UNK",
        }
    }

    /// Whether the kiosk should highlight the crosswind readout
    #[inline]
    #[must_use]
    pub fn needs_attention(self) -> bool {
        matches!(self, Self::NearLimits | Self::ExceedsProfile)
    }
}

impl fmt::Display for CrosswindStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short current-condition values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionBubbles {
    /// Wind, e.g. "270@8"
    pub wind: Option<String>,
    /// Crosswind component on the runway in use
    pub x_wind: Option<String>,
    /// Runway the crosswind was computed for
    pub rwy: Option<String>,
    /// Visibility
    pub visibility: Option<String>,
    /// Ceiling
    pub ceiling: Option<String>,
    /// Temperature
    pub temp: Option<String>,
}

/// A labelled condition value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Readout {
    /// Label
    pub label: String,
    /// Value, or [`MISSING_VALUE`]
    pub value: String,
}

impl Readout {
    fn new(label: impl Into<String>, value: Option<&str>) -> Self {
        Self {
            label: label.into(),
            value: non_blank(value).unwrap_or(MISSING_VALUE).to_string(),
        }
    }
}

impl ConditionBubbles {
    /// Heading of the crosswind readout
    #[must_use]
    pub fn crosswind_label(&self) -> String {
        format!("CROSSWIND RWY {}", non_blank(self.rwy.as_deref()).unwrap_or("??"))
    }

    /// Readouts in display order
    #[must_use]
    pub fn readouts(&self) -> Vec<Readout> {
        vec![
            Readout::new("WIND", self.wind.as_deref()),
            Readout::new(self.crosswind_label(), self.x_wind.as_deref()),
            Readout::new("CEILING", self.ceiling.as_deref()),
            Readout::new("VISIBILITY", self.visibility.as_deref()),
            Readout::new("TEMP", self.temp.as_deref()),
        ]
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn periods_decode_from_text_or_object() {
        let json = r#"{
            "t_06": { "time_label": "18Z-00Z", "summary": "VFR, light winds." },
            "t_12": "MVFR in mist after 06Z."
        }"#;
        let timeline: ForecastTimeline = serde_json::from_str(json).unwrap();

        assert_eq!(timeline.t_06.as_ref().and_then(ForecastPeriod::label), Some("18Z-00Z"));
        assert_eq!(timeline.t_06.as_ref().and_then(ForecastPeriod::summary), Some("VFR, light winds."));
        assert_eq!(timeline.t_12.as_ref().and_then(ForecastPeriod::label), None);
        assert_eq!(
            timeline.t_12.as_ref().and_then(ForecastPeriod::summary),
            Some("MVFR in mist after 06Z.")
        );
    }

    #[test]
    fn cards_fall_back_to_default_labels_and_placeholder() {
        let timeline = ForecastTimeline {
            t_06: Some(ForecastPeriod::Detailed {
                time_label: Some("  ".into()),
                summary: None,
            }),
            t_12: None,
        };
        let cards = timeline.cards(None);

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].title, "Weather Next 6 Hours");
        assert_eq!(cards[0].summary, NO_FORECAST);
        assert_eq!(cards[1].horizon, ForecastHorizon::TwelveHours);
        assert_eq!(cards[1].title, "Weather Next 12 Hours");
    }

    #[test]
    fn cards_name_borrowed_station() {
        let timeline = ForecastTimeline {
            t_06: Some(ForecastPeriod::Detailed {
                time_label: Some("18Z-00Z".into()),
                summary: Some("VFR".into()),
            }),
            t_12: Some(ForecastPeriod::Text("IFR".into())),
        };
        let cards = timeline.cards(Some(&SourceId::new("KSTS")));

        assert_eq!(cards[0].title, "Weather 18Z-00Z (KSTS)");
        assert_eq!(cards[1].title, "Weather Next 12 Hours (KSTS)");
        assert_eq!(cards[1].summary, "IFR");
    }

    #[test]
    fn crosswind_status_decodes_backend_values() {
        let decode = |raw: &str| serde_json::from_str::<CrosswindStatus>(raw).unwrap();

        assert_eq!(decode(r#""WITHIN LIMITS""#), CrosswindStatus::WithinLimits);
        assert_eq!(decode(r#""EXCEEDS PROFILE""#), CrosswindStatus::ExceedsProfile);
        assert_eq!(decode(r#""UNK""#), CrosswindStatus::Unknown);
        assert_eq!(decode(r#""GUSTY""#), CrosswindStatus::Unknown);
        assert!(decode(r#""NEAR LIMITS""#).needs_attention());
        assert!(!CrosswindStatus::WithinLimits.needs_attention());
    }

    #[test]
    fn readouts_mark_missing_values() {
        let bubbles = ConditionBubbles {
            wind: Some("270@8".into()),
            x_wind: Some("3kt".into()),
            visibility: Some("10SM".into()),
            ..Default::default()
        };
        let readouts = bubbles.readouts();

        assert_eq!(bubbles.crosswind_label(), "CROSSWIND RWY ??");
        assert_eq!(readouts[0], Readout::new("WIND", Some("270@8")));
        assert_eq!(readouts[1].label, "CROSSWIND RWY ??");
        assert_eq!(readouts[1].value, "3kt");
        assert_eq!(readouts[2].value, MISSING_VALUE);
        assert_eq!(readouts[3].value, "10SM");
    }
}
