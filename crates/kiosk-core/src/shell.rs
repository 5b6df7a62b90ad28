//! Host shell capabilities: navigation, document title, screen wake lock

use kiosk_types::{KioskRoute, NavigationMode};

/// Wake lock failures; never fatal to a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WakeLockError {
    /// Platform has no wake lock
    #[error("screen wake lock is not supported on this platform")]
    Unsupported,

    /// Platform refused the request
    #[error("wake lock request denied: {0}")]
    Denied(String),
}

/// Navigation and title surface of the kiosk
#[cfg_attr(test, mockall::automock)]
pub trait KioskShell: Send + Sync {
    /// Point the shell at a route
    fn navigate(&self, route: KioskRoute, mode: NavigationMode);

    /// Set the document title
    fn set_title(&self, title: &str);
}

/// Keeps the display awake while a briefing is shown
#[cfg_attr(test, mockall::automock)]
pub trait ScreenWakeLock: Send + Sync {
    /// Acquire the lock
    ///
    /// # Errors
    /// Returns `WakeLockError` when the platform cannot hold the screen on
    fn acquire(&self) -> Result<(), WakeLockError>;

    /// Release a previously acquired lock
    fn release(&self);
}

/// Wake lock for platforms without one
#[derive(Debug, Clone, Copy, Default)]
pub struct NoWakeLock;

impl ScreenWakeLock for NoWakeLock {
    fn acquire(&self) -> Result<(), WakeLockError> {
        Err(WakeLockError::Unsupported)
    }

    fn release(&self) {}
}

/// Shell that only logs; used headless
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingShell;

impl KioskShell for TracingShell {
    fn navigate(&self, route: KioskRoute, mode: NavigationMode) {
        tracing::info!("Navigate ({:?}) to {}", mode, route);
    }

    fn set_title(&self, title: &str) {
        tracing::debug!("Title set to {:?}", title);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_wake_lock_is_unsupported() {
        assert_eq!(NoWakeLock.acquire(), Err(WakeLockError::Unsupported));
        NoWakeLock.release();
    }

    #[test]
    fn mock_shell_records_replace() {
        let mut shell = MockKioskShell::new();
        shell
            .expect_navigate()
            .withf(|route, mode| *route == KioskRoute::Listing && *mode == NavigationMode::Replace)
            .times(1)
            .return_const(());

        shell.navigate(KioskRoute::Listing, NavigationMode::Replace);
    }
}
