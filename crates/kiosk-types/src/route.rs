//! Kiosk routes
//!
//! `/kiosk` is the listing of kiosks; `/kiosk/{target}/{profile}` is a
//! display. Redirects replace the current history entry so intermediate
//! redirect states never pile up.

use crate::error::TypeError;
use crate::ids::{ProfileId, TargetId};
use std::fmt;
use std::str::FromStr;

const ROOT: &str = "kiosk";

/// Where the kiosk shell is pointed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KioskRoute {
    /// Fallback listing of available kiosks
    Listing,
    /// Briefing display for a target
    Display {
        /// Airport
        target: TargetId,
        /// Requested profile; resolved against the config when absent
        profile: Option<ProfileId>,
    },
}

impl KioskRoute {
    /// Display route for a target and profile
    #[inline]
    #[must_use]
    pub fn display(target: TargetId, profile: Option<ProfileId>) -> Self {
        Self::Display { target, profile }
    }

    /// Target of a display route
    #[inline]
    #[must_use]
    pub fn target(&self) -> Option<&TargetId> {
        match self {
            Self::Listing => None,
            Self::Display { target, .. } => Some(target),
        }
    }
}

impl fmt::Display for KioskRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listing => write!(f, "/{ROOT}"),
            Self::Display {
                target,
                profile: None,
            } => write!(f, "/{ROOT}/{target}"),
            Self::Display {
                target,
                profile: Some(profile),
            } => write!(f, "/{ROOT}/{target}/{profile}"),
        }
    }
}

impl FromStr for KioskRoute {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TypeError::InvalidRoute(s.to_string());
        let mut parts = s.trim().trim_matches('/').split('/');

        if parts.next() != Some(ROOT) {
            return Err(invalid());
        }

        let route = match (parts.next(), parts.next()) {
            (None | Some(""), None) => Self::Listing,
            (Some(target), profile) => Self::Display {
                target: TargetId::new(target)?,
                profile: profile.map(ProfileId::new).transpose()?,
            },
            (None, Some(_)) => return Err(invalid()),
        };

        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(route)
    }
}

/// How a navigation affects history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationMode {
    /// Add a history entry
    Push,
    /// Overwrite the current history entry
    Replace,
}
