//! Freshness fingerprints and probe payloads
//!
//! A fingerprint is the raw observation with all whitespace removed, so two
//! reports that differ only in spacing or line breaks compare equal.

use crate::ids::{SourceId, TargetId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whitespace-normalized form of a raw observation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Normalize a raw observation
    #[must_use]
    pub fn from_observation(raw: &str) -> Self {
        Self(raw.chars().filter(|c| !c.is_whitespace()).collect())
    }

    /// Normalized text
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the observation was blank
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fingerprint together with when it was observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreshnessSignal {
    /// Normalized observation
    pub fingerprint: Fingerprint,
    /// When the probe returned it
    pub observed_at: DateTime<Utc>,
}

impl FreshnessSignal {
    /// Build a signal from a raw observation
    #[must_use]
    pub fn new(raw_observation: &str, observed_at: DateTime<Utc>) -> Self {
        Self {
            fingerprint: Fingerprint::from_observation(raw_observation),
            observed_at,
        }
    }

    /// Whether this signal differs from the last fingerprint a load produced
    ///
    /// No previous fingerprint counts as different.
    #[must_use]
    pub fn differs_from(&self, last: Option<&Fingerprint>) -> bool {
        last != Some(&self.fingerprint)
    }
}

/// Lightweight change-detection request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    /// Target being displayed
    pub target: TargetId,
    /// Upstream station resolved by the last full load, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceId>,
}

/// Status reported by the probe endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// Probe found an observation
    Success,
    /// Anything else the endpoint reports
    #[serde(other)]
    Unavailable,
}

/// Probe result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResponse {
    /// Endpoint status
    pub status: ProbeStatus,
    /// Current raw observation
    #[serde(default, rename = "raw_metar")]
    pub raw_observation: Option<String>,
}

impl ProbeResponse {
    /// Successful probe carrying an observation
    #[must_use]
    pub fn success(raw_observation: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Success,
            raw_observation: Some(raw_observation.into()),
        }
    }

    /// Probe that found nothing usable
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            status: ProbeStatus::Unavailable,
            raw_observation: None,
        }
    }

    /// Raw observation if the probe succeeded and returned non-blank text
    #[must_use]
    pub fn observation(&self) -> Option<&str> {
        match (self.status, self.raw_observation.as_deref()) {
            (ProbeStatus::Success, Some(raw)) if !raw.trim().is_empty() => Some(raw),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn whitespace_is_ignored() {
        let a = Fingerprint::from_observation("KSFO 251853Z\n 28012KT");
        let b = Fingerprint::from_observation("KSFO251853Z 28012KT ");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "KSFO251853Z28012KT");
    }

    #[test]
    fn missing_fingerprint_counts_as_different() {
        let signal = FreshnessSignal::new("KSFO 251853Z", Utc::now());
        assert!(signal.differs_from(None));
        assert!(!signal.differs_from(Some(&Fingerprint::from_observation("KSFO  251853Z"))));
    }

    #[test]
    fn probe_response_decodes_endpoint_payload() {
        let ok: ProbeResponse =
            serde_json::from_str(r#"{"status":"success","raw_metar":"KSFO 251853Z"}"#).unwrap();
        assert_eq!(ok.observation(), Some("KSFO 251853Z"));

        let other: ProbeResponse = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert_eq!(other.status, ProbeStatus::Unavailable);
        assert_eq!(other.observation(), None);
    }

    #[test]
    fn blank_observation_is_not_usable() {
        assert_eq!(ProbeResponse::success("   ").observation(), None);
    }

    proptest! {
        #[test]
        fn prop_inserted_whitespace_never_changes_fingerprint(
            words in proptest::collection::vec("[A-Z0-9/]{1,8}", 1..8),
            gap in "[ \t\n]{1,3}",
        ) {
            let compact = words.join(" ");
            let spread = words.join(&gap);
            prop_assert_eq!(
                Fingerprint::from_observation(&compact),
                Fingerprint::from_observation(&spread)
            );
        }
    }
}
