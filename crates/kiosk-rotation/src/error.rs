//! Error types for rotation timing

/// Invalid rotation timing configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimingError {
    /// Advance period or transition is zero
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// The slide must finish before the next advance
    #[error("transition ({transition_ms}ms) must be shorter than the advance period ({period_ms}ms)")]
    TransitionTooLong {
        /// Transition length
        transition_ms: u64,
        /// Advance period
        period_ms: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_error_display() {
        let err = TimingError::TransitionTooLong {
            transition_ms: 9000,
            period_ms: 8000,
        };
        assert!(err.to_string().contains("shorter than the advance period"));
        assert_eq!(TimingError::Zero("advance period").to_string(), "advance period must be greater than zero");
    }
}
