//! Briefing backend interface
//!
//! The orchestrator never talks HTTP itself; it calls a [`BriefingApi`]
//! implementation with an explicit [`SessionContext`] on every request.

use crate::error::ApiError;
use async_trait::async_trait;
use kiosk_types::{AnalysisBundle, AnalysisRequest, KioskConfig, ProbeRequest, ProbeResponse, TargetId};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Per-session request context
#[derive(Clone, PartialEq, Eq)]
pub struct SessionContext {
    /// Stable client identifier sent with every request
    pub client_id: Uuid,
    /// Optional operator key granting admin access
    pub admin_key: Option<String>,
}

impl SessionContext {
    /// Context with a fresh random client id and no admin key
    #[must_use]
    pub fn new() -> Self {
        Self {
            client_id: Uuid::new_v4(),
            admin_key: None,
        }
    }

    /// Use a persisted client id
    #[must_use]
    pub fn with_client_id(mut self, client_id: Uuid) -> Self {
        self.client_id = client_id;
        self
    }

    /// Attach an admin key
    #[must_use]
    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_key = Some(key.into());
        self
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("client_id", &self.client_id)
            .field("admin_key", &self.admin_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Backend the kiosk loads briefings from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BriefingApi: Send + Sync {
    /// Kiosk configuration for a target
    async fn fetch_config(&self, ctx: &SessionContext, target: &TargetId) -> Result<KioskConfig, ApiError>;

    /// Full analysis load
    async fn load_analysis(
        &self,
        ctx: &SessionContext,
        request: &AnalysisRequest,
    ) -> Result<AnalysisBundle, ApiError>;

    /// Cheap freshness probe returning the latest raw observation
    async fn probe(&self, ctx: &SessionContext, request: &ProbeRequest) -> Result<ProbeResponse, ApiError>;
}

/// Bound a backend call; an answer that takes longer than `limit` becomes [`ApiError::Timeout`]
pub(crate) async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::time::timeout(limit, call).await.unwrap_or(Err(ApiError::Timeout))
}
