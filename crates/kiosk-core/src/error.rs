//! Error types for the kiosk core
//!
//! Session failures fall into four groups:
//! - Config resolution: fatal to the session, which redirects to the listing
//! - Invalid profile: not an error to the operator, handled by a redirect
//! - Load: recoverable, retried with backoff; displayed content is kept
//! - Probe: transient, the poll loop carries on

use crate::shell::WakeLockError;
use kiosk_rotation::TimingError;
use kiosk_types::{ProfileId, TargetId};
use std::path::PathBuf;

/// Failure reported by a [`BriefingApi`](crate::api::BriefingApi) implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Connection-level failure
    #[error("request failed: {0}")]
    Transport(String),

    /// Server answered with an error status
    #[error("server returned {status}: {detail}")]
    Status {
        /// HTTP-like status code
        status: u16,
        /// Server-provided detail
        detail: String,
    },

    /// Response body could not be decoded
    #[error("malformed response: {0}")]
    Decode(String),

    /// No answer in time
    #[error("request timed out")]
    Timeout,
}

impl ApiError {
    /// Whether trying again later can help
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode(_) => false,
        }
    }
}

/// Session-level failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Configuration for the target could not be fetched
    #[error("could not resolve kiosk configuration for {target}: {source}")]
    ConfigResolution {
        /// Target being configured
        target: TargetId,
        /// Underlying failure
        source: ApiError,
    },

    /// Requested profile is missing or not allowed
    #[error("profile {requested:?} is not allowed for {target}; redirecting to {default}")]
    ProfileInvalid {
        /// Target being displayed
        target: TargetId,
        /// Profile from the route
        requested: Option<ProfileId>,
        /// Profile redirected to
        default: ProfileId,
    },

    /// Full analysis load failed
    #[error("analysis load failed (attempt {attempt}): {source}")]
    Load {
        /// Consecutive failures so far
        attempt: u32,
        /// Underlying failure
        source: ApiError,
    },

    /// Freshness probe failed
    #[error("freshness probe failed: {0}")]
    Probe(#[source] ApiError),

    /// Screen wake lock could not be acquired
    #[error("wake lock unavailable: {0}")]
    WakeLock(#[from] WakeLockError),
}

impl SessionError {
    /// Whether the session cannot continue
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConfigResolution { .. })
    }

    /// Whether the operation is retried automatically
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Probe(_))
    }
}

/// Settings loading and validation failures
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file could not be read
    #[error("failed to read settings from {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying failure
        source: std::io::Error,
    },

    /// Settings file is not valid TOML for these settings
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// Rotation timing is inconsistent
    #[error("invalid rotation timing: {0}")]
    Timing(#[from] TimingError),

    /// Some other value is out of range
    #[error("invalid setting: {0}")]
    Invalid(String),
}
