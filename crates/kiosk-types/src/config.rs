//! Remote kiosk configuration
//!
//! Each target publishes which profiles a kiosk may display and which one to
//! fall back to. The orchestrator uses it to decide between loading and
//! redirecting.

use crate::ids::ProfileId;
use serde::{Deserialize, Serialize};

/// Per-target kiosk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KioskConfig {
    /// Profile to redirect to when none (or a disallowed one) is requested
    pub default_profile: ProfileId,
    /// Profiles this target may display
    pub allowed_profiles: Vec<ProfileId>,
    /// Any further fields the backend sends
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Outcome of matching a requested profile against the configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileDecision {
    /// Requested profile is allowed; proceed to load
    Accept(ProfileId),
    /// Replace the route with the default profile
    Redirect(ProfileId),
}

impl KioskConfig {
    /// Create a configuration with no extra fields
    #[must_use]
    pub fn new(default_profile: ProfileId, allowed_profiles: Vec<ProfileId>) -> Self {
        Self {
            default_profile,
            allowed_profiles,
            extra: serde_json::Map::new(),
        }
    }

    /// Whether a profile is in the allowed set
    #[inline]
    #[must_use]
    pub fn allows(&self, profile: &ProfileId) -> bool {
        self.allowed_profiles.contains(profile)
    }

    /// Whether the default profile is itself in the allowed set
    #[inline]
    #[must_use]
    pub fn default_is_allowed(&self) -> bool {
        self.allows(&self.default_profile)
    }

    /// Decide what to do with the requested profile
    ///
    /// The default profile is always accepted, even when the allowed set
    /// leaves it out, so following a redirect never redirects again.
    #[must_use]
    pub fn resolve_profile(&self, requested: Option<&ProfileId>) -> ProfileDecision {
        match requested {
            Some(profile) if self.allows(profile) || *profile == self.default_profile => {
                ProfileDecision::Accept(profile.clone())
            }
            _ => ProfileDecision::Redirect(self.default_profile.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KioskConfig {
        KioskConfig::new(
            ProfileId::new("medium").unwrap(),
            vec![ProfileId::new("small").unwrap(), ProfileId::new("medium").unwrap()],
        )
    }

    #[test]
    fn accepts_allowed_profile() {
        let small = ProfileId::new("small").unwrap();
        assert_eq!(
            config().resolve_profile(Some(&small)),
            ProfileDecision::Accept(small)
        );
    }

    #[test]
    fn redirects_missing_profile() {
        assert_eq!(
            config().resolve_profile(None),
            ProfileDecision::Redirect(ProfileId::new("medium").unwrap())
        );
    }

    #[test]
    fn redirects_disallowed_profile() {
        let large = ProfileId::new("large").unwrap();
        assert!(matches!(
            config().resolve_profile(Some(&large)),
            ProfileDecision::Redirect(p) if p.as_str() == "medium"
        ));
    }

    #[test]
    fn default_outside_allowed_set_is_accepted() {
        let medium = ProfileId::new("medium").unwrap();
        let config = KioskConfig::new(medium.clone(), vec![ProfileId::new("small").unwrap()]);
        assert!(!config.default_is_allowed());

        // None redirects to medium, and medium then loads instead of redirecting again
        let ProfileDecision::Redirect(next) = config.resolve_profile(None) else {
            panic!("missing profile should redirect");
        };
        assert_eq!(config.resolve_profile(Some(&next)), ProfileDecision::Accept(medium));
    }

    #[test]
    fn keeps_unknown_fields() {
        let json = r#"{"default_profile":"small","allowed_profiles":["small"],"theme":"dark"}"#;
        let config: KioskConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.extra.get("theme").and_then(|v| v.as_str()), Some("dark"));
    }
}
