//! Kiosk settings
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! [rotation]
//! advance_period_ms = 8000
//! transition_ms = 2000
//!
//! [freshness]
//! poll_interval_ms = 60000
//!
//! [requests]
//! timeout_ms = 20000
//! ```

use crate::error::SettingsError;
use crate::retry::RetryPolicy;
use kiosk_rotation::RotationTiming;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Rotation timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationSettings {
    /// Time between advances
    pub advance_period_ms: u64,
    /// Slide animation length
    pub transition_ms: u64,
    /// Wait after a content or viewport change before measuring
    pub settle_delay_ms: u64,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            advance_period_ms: 8_000,
            transition_ms: 2_000,
            settle_delay_ms: 100,
        }
    }
}

/// Freshness polling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FreshnessSettings {
    /// Time between probes
    pub poll_interval_ms: u64,
}

impl Default for FreshnessSettings {
    fn default() -> Self {
        Self { poll_interval_ms: 60_000 }
    }
}

/// Wall clock display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Clock refresh interval
    pub tick_interval_ms: u64,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self { tick_interval_ms: 1_000 }
    }
}

/// Backend requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Longest wait for any single backend answer
    pub timeout_ms: u64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self { timeout_ms: 20_000 }
    }
}

/// Layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutSettings {
    /// Viewport extent assumed until the renderer reports one
    pub viewport_extent: u32,
    /// Suffix of the document title
    pub title_suffix: String,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            viewport_extent: 800,
            title_suffix: "WxDecoder".to_string(),
        }
    }
}

/// All kiosk settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskSettings {
    /// Rotation timing
    pub rotation: RotationSettings,
    /// Freshness polling
    pub freshness: FreshnessSettings,
    /// Clock tick
    pub clock: ClockSettings,
    /// Initial load backoff
    pub retry: RetryPolicy,
    /// Backend request deadline
    pub requests: RequestSettings,
    /// Layout
    pub layout: LayoutSettings,
}

impl KioskSettings {
    /// Default settings
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from TOML text and validate
    ///
    /// # Errors
    /// Returns `SettingsError` if the text is not valid TOML or a value is out of range
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load from a TOML file and validate
    ///
    /// # Errors
    /// Returns `SettingsError` if the file cannot be read, parsed or validated
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text)?;
        tracing::info!("Loaded kiosk settings from {}", path.display());
        Ok(settings)
    }

    /// Serialize to TOML
    ///
    /// # Errors
    /// Returns `SettingsError::Invalid` if serialization fails
    pub fn to_toml_string(&self) -> Result<String, SettingsError> {
        toml::to_string_pretty(self).map_err(|e| SettingsError::Invalid(e.to_string()))
    }

    /// Check every value
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.rotation_timing()?;

        if self.freshness.poll_interval_ms == 0 {
            return Err(SettingsError::Invalid("freshness.poll_interval_ms must be > 0".into()));
        }
        if self.clock.tick_interval_ms == 0 {
            return Err(SettingsError::Invalid("clock.tick_interval_ms must be > 0".into()));
        }
        if self.retry.initial_delay_ms == 0 {
            return Err(SettingsError::Invalid("retry.initial_delay_ms must be > 0".into()));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(SettingsError::Invalid(
                "retry.max_delay_ms must be >= retry.initial_delay_ms".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SettingsError::Invalid("retry.max_attempts must be > 0".into()));
        }
        if self.requests.timeout_ms == 0 {
            return Err(SettingsError::Invalid("requests.timeout_ms must be > 0".into()));
        }
        if self.layout.viewport_extent == 0 {
            return Err(SettingsError::Invalid("layout.viewport_extent must be > 0".into()));
        }
        Ok(())
    }

    /// Rotation timing derived from the settings
    ///
    /// # Errors
    /// Returns `SettingsError::Timing` if the timing is inconsistent
    pub fn rotation_timing(&self) -> Result<RotationTiming, SettingsError> {
        Ok(RotationTiming::new(
            Duration::from_millis(self.rotation.advance_period_ms),
            Duration::from_millis(self.rotation.transition_ms),
            Duration::from_millis(self.rotation.settle_delay_ms),
        )?)
    }

    /// Freshness poll interval
    #[inline]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.freshness.poll_interval_ms)
    }

    /// Clock tick interval
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.clock.tick_interval_ms)
    }

    /// Deadline for a single backend request
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.requests.timeout_ms)
    }

    /// Set rotation timing
    #[must_use]
    pub fn with_rotation(mut self, advance_period: Duration, transition: Duration) -> Self {
        self.rotation.advance_period_ms = duration_ms(advance_period);
        self.rotation.transition_ms = duration_ms(transition);
        self
    }

    /// Set settle delay
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.rotation.settle_delay_ms = duration_ms(delay);
        self
    }

    /// Set poll interval
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.freshness.poll_interval_ms = duration_ms(interval);
        self
    }

    /// Set clock tick
    #[must_use]
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.clock.tick_interval_ms = duration_ms(interval);
        self
    }

    /// Set retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set request deadline
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.requests.timeout_ms = duration_ms(timeout);
        self
    }

    /// Set initial viewport extent
    #[must_use]
    pub fn with_viewport_extent(mut self, extent: u32) -> Self {
        self.layout.viewport_extent = extent;
        self
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_document_gives_defaults() {
        let settings = KioskSettings::from_toml_str("").unwrap();
        assert_eq!(settings, KioskSettings::default());
        assert_eq!(settings.poll_interval(), Duration::from_secs(60));
        assert_eq!(settings.request_timeout(), Duration::from_secs(20));
        assert_eq!(settings.rotation_timing().unwrap(), RotationTiming::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let settings = KioskSettings::from_toml_str(
            r#"
            [rotation]
            advance_period_ms = 5000

            [retry]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(settings.rotation.advance_period_ms, 5_000);
        assert_eq!(settings.rotation.transition_ms, 2_000);
        assert_eq!(settings.retry.max_attempts, 3);
        assert_eq!(settings.retry.initial_delay_ms, 2_000);
        assert_eq!(settings.layout.title_suffix, "WxDecoder");
    }

    #[test]
    fn transition_longer_than_period_is_rejected() {
        let err = KioskSettings::from_toml_str(
            r#"
            [rotation]
            advance_period_ms = 1000
            transition_ms = 2000
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, SettingsError::Timing(_)));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let settings = KioskSettings::new().with_poll_interval(Duration::ZERO);
        assert!(matches!(settings.validate(), Err(SettingsError::Invalid(_))));
    }

    #[test]
    fn request_timeout_is_read_and_checked() {
        let settings = KioskSettings::from_toml_str("[requests]\ntimeout_ms = 5000\n").unwrap();
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));

        let err = KioskSettings::from_toml_str("[requests]\ntimeout_ms = 0\n").unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(m) if m.contains("timeout_ms")));
    }

    #[test]
    fn unknown_toml_is_a_parse_error() {
        let err = KioskSettings::from_toml_str("[rotation\n").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn load_round_trips_through_file() {
        let settings = KioskSettings::new()
            .with_rotation(Duration::from_secs(6), Duration::from_millis(1500))
            .with_viewport_extent(1080);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(settings.to_toml_string().unwrap().as_bytes()).unwrap();

        let loaded = KioskSettings::load(file.path()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = KioskSettings::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
