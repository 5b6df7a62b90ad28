//! Error types for kiosk types

/// Errors raised while parsing identifiers and routes
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// Target identifier is empty or contains non-alphanumeric characters
    #[error("invalid target identifier: {0:?}")]
    InvalidTarget(String),

    /// Profile identifier is empty or malformed
    #[error("invalid profile identifier: {0:?}")]
    InvalidProfile(String),

    /// Path does not describe a kiosk route
    #[error("invalid kiosk route: {0:?}")]
    InvalidRoute(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_error_display() {
        let err = TypeError::InvalidRoute("/admin".to_string());
        assert!(err.to_string().contains("invalid kiosk route"));
    }
}
