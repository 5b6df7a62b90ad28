//! Route host
//!
//! Owns navigation history and at most one running session. Every navigation
//! disposes the current session and waits for its teardown before the next
//! one starts, so two sessions never overlap.

use crate::error::SettingsError;
use crate::session::{SessionDeps, SessionHandle, SessionOrchestrator, SessionOutcome};
use crate::settings::KioskSettings;
use crate::shell::KioskShell;
use kiosk_types::{KioskRoute, NavigationMode};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A navigation to apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationRequest {
    /// Destination
    pub route: KioskRoute,
    /// History effect
    pub mode: NavigationMode,
}

impl NavigationRequest {
    /// Operator navigation
    #[inline]
    #[must_use]
    pub fn push(route: KioskRoute) -> Self {
        Self {
            route,
            mode: NavigationMode::Push,
        }
    }

    /// Navigation overwriting the current entry
    #[inline]
    #[must_use]
    pub fn replace(route: KioskRoute) -> Self {
        Self {
            route,
            mode: NavigationMode::Replace,
        }
    }
}

/// Shell handed to sessions: navigation goes back to the host, titles pass through
struct HostShell {
    requests: mpsc::UnboundedSender<NavigationRequest>,
    inner: Arc<dyn KioskShell>,
}

impl KioskShell for HostShell {
    fn navigate(&self, route: KioskRoute, mode: NavigationMode) {
        let _ = self.requests.send(NavigationRequest { route, mode });
    }

    fn set_title(&self, title: &str) {
        self.inner.set_title(title);
    }
}

/// Navigation host
pub struct KioskHost {
    orchestrator: SessionOrchestrator,
    shell: Arc<dyn KioskShell>,
    requests: mpsc::UnboundedReceiver<NavigationRequest>,
    history: Vec<KioskRoute>,
    current: Option<SessionHandle>,
    sessions_started: u64,
}

impl KioskHost {
    /// Create host; `deps.shell` receives every navigation the host applies
    ///
    /// # Errors
    /// Returns `SettingsError` if the settings do not validate
    pub fn new(deps: SessionDeps, settings: KioskSettings) -> Result<Self, SettingsError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let shell = deps.shell.clone();
        let session_deps = SessionDeps {
            shell: Arc::new(HostShell {
                requests: tx,
                inner: shell.clone(),
            }),
            ..deps
        };

        Ok(Self {
            orchestrator: SessionOrchestrator::new(session_deps, settings)?,
            shell,
            requests: rx,
            history: Vec::new(),
            current: None,
            sessions_started: 0,
        })
    }

    /// Operator opens a route
    pub async fn open(&mut self, route: KioskRoute) -> Option<SessionOutcome> {
        self.navigate(NavigationRequest::push(route)).await
    }

    /// Apply a navigation; returns how the previous session ended
    pub async fn navigate(&mut self, request: NavigationRequest) -> Option<SessionOutcome> {
        let previous = self.close_current().await;

        let NavigationRequest { route, mode } = request;
        match mode {
            NavigationMode::Push => self.history.push(route.clone()),
            NavigationMode::Replace => {
                self.history.pop();
                self.history.push(route.clone());
            }
        }
        tracing::info!("Host navigating ({:?}) to {}", mode, route);
        self.shell.navigate(route.clone(), mode);

        if let KioskRoute::Display { target, profile } = route {
            self.current = Some(self.orchestrator.init(target, profile));
            self.sessions_started += 1;
        }
        previous
    }

    /// Wait for the next navigation a session asks for and apply it
    ///
    /// Returns `None` once the request channel has closed.
    pub async fn follow_next(&mut self) -> Option<SessionOutcome> {
        let request = self.requests.recv().await?;
        self.navigate(request).await
    }

    /// Dispose the current session, waiting for its teardown
    pub async fn close_current(&mut self) -> Option<SessionOutcome> {
        let handle = self.current.take()?;
        let id = handle.id();
        let outcome = handle.dispose().await;
        tracing::debug!("Session {} closed: {:?}", id, outcome);
        Some(outcome)
    }

    /// Running session, if any
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&SessionHandle> {
        self.current.as_ref()
    }

    /// Route currently shown
    #[must_use]
    pub fn current_route(&self) -> Option<&KioskRoute> {
        self.history.last()
    }

    /// Navigation history, oldest first
    #[inline]
    #[must_use]
    pub fn history(&self) -> &[KioskRoute] {
        &self.history
    }

    /// Sessions started so far
    #[inline]
    #[must_use]
    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Dispose the current session and stop
    pub async fn shutdown(mut self) -> Option<SessionOutcome> {
        self.close_current().await
    }
}

impl std::fmt::Debug for KioskHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KioskHost")
            .field("history", &self.history)
            .field("current", &self.current.as_ref().map(SessionHandle::id))
            .field("sessions_started", &self.sessions_started)
            .finish_non_exhaustive()
    }
}
