//! Kiosk session orchestrator
//!
//! One session displays one target with one profile. It runs as a single
//! tokio task that owns all session state and handles one event at a time:
//! - commands from the [`SessionHandle`] (viewport changes, dispose)
//! - results of network calls it spawned
//! - timer firings from its [`TimerRegistry`]
//!
//! Network calls and timers are child tasks whose handles the session owns.
//! Teardown aborts all of them, releases the wake lock and bumps the epoch so
//! nothing scheduled before teardown can act afterwards.

use crate::api::{with_deadline, BriefingApi, SessionContext};
use crate::error::{ApiError, SessionError, SettingsError};
use crate::settings::KioskSettings;
use crate::shell::{KioskShell, ScreenWakeLock};
use crate::tasks::{IoTasks, TimerFired, TimerKind, TimerRegistry};
use crate::view::{KioskView, SessionPhase};
use chrono::{DateTime, Utc};
use kiosk_freshness::{FreshnessPoller, PollAction, PollVerdict};
use kiosk_rotation::{ContentMeasurer, ExtentProvider, Generation, RotationDirective, RotationScheduler};
use kiosk_types::{
    is_special_observation, AnalysisBundle, AnalysisRequest, BriefingSection, Fingerprint, KioskConfig,
    KioskRoute, NavigationMode, ObservationTime, ProbeResponse, ProfileDecision, ProfileId, SourceId, TargetId,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use ulid::Ulid;

/// Unique session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Ulid);

impl SessionId {
    /// Fresh identifier
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Underlying ULID
    #[inline]
    #[must_use]
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mutable record of one session
#[derive(Debug, Clone)]
pub struct KioskSession {
    /// Identifier
    pub id: SessionId,
    /// Airport displayed
    pub target: TargetId,
    /// Profile requested, then resolved
    pub profile: Option<ProfileId>,
    /// Resolved configuration
    pub config: Option<KioskConfig>,
    /// Fingerprint of the last successful full load
    pub last_fingerprint: Option<Fingerprint>,
    /// When the last successful full load finished
    pub last_loaded_at: Option<DateTime<Utc>>,
    /// A full load is running
    pub load_in_flight: bool,
    /// Upstream station resolved by the last full load
    pub source: Option<SourceId>,
}

impl KioskSession {
    fn new(target: TargetId, profile: Option<ProfileId>) -> Self {
        Self {
            id: SessionId::new(),
            target,
            profile,
            config: None,
            last_fingerprint: None,
            last_loaded_at: None,
            load_in_flight: false,
            source: None,
        }
    }
}

/// Collaborators a session talks to
#[derive(Clone)]
pub struct SessionDeps {
    /// Briefing backend
    pub api: Arc<dyn BriefingApi>,
    /// Navigation and title
    pub shell: Arc<dyn KioskShell>,
    /// Screen wake lock
    pub wake_lock: Arc<dyn ScreenWakeLock>,
    /// Rendered extent of each block
    pub extents: Arc<dyn ExtentProvider>,
    /// Request context
    pub context: SessionContext,
}

impl SessionDeps {
    /// Bundle collaborators with a fresh context
    #[must_use]
    pub fn new(
        api: Arc<dyn BriefingApi>,
        shell: Arc<dyn KioskShell>,
        wake_lock: Arc<dyn ScreenWakeLock>,
        extents: Arc<dyn ExtentProvider>,
    ) -> Self {
        Self {
            api,
            shell,
            wake_lock,
            extents,
            context: SessionContext::new(),
        }
    }

    /// Use a specific request context
    #[must_use]
    pub fn with_context(mut self, context: SessionContext) -> Self {
        self.context = context;
        self
    }
}

impl fmt::Debug for SessionDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDeps")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Disposed by its owner
    Disposed,
    /// Navigated elsewhere on its own
    Redirected(KioskRoute),
    /// Configuration could not be resolved
    Failed(String),
}

/// Events delivered to the session loop
#[derive(Debug)]
pub(crate) enum SessionEvent {
    /// A timer went off
    Timer(TimerFired),
    /// Config fetch finished
    ConfigResolved(Result<KioskConfig, ApiError>),
    /// Full load finished
    LoadFinished {
        force: bool,
        result: Result<AnalysisBundle, ApiError>,
    },
    /// Freshness probe finished
    ProbeFinished(Result<ProbeResponse, ApiError>),
}

#[derive(Debug)]
enum SessionCommand {
    ViewportChanged(u32),
    Dispose,
}

/// Creates sessions
#[derive(Debug, Clone)]
pub struct SessionOrchestrator {
    deps: SessionDeps,
    settings: KioskSettings,
}

impl SessionOrchestrator {
    /// Create orchestrator
    ///
    /// # Errors
    /// Returns `SettingsError` if the settings do not validate
    pub fn new(deps: SessionDeps, settings: KioskSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self { deps, settings })
    }

    /// Start a session for a target; must be called inside a tokio runtime
    ///
    /// Dropping the returned handle disposes the session.
    #[must_use]
    pub fn init(&self, target: TargetId, profile: Option<ProfileId>) -> SessionHandle {
        let session = KioskSession::new(target.clone(), profile.clone());
        let id = session.id;

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(KioskView::new(id, target.clone(), profile));

        let runtime = SessionRuntime::new(session, self.deps.clone(), self.settings.clone(), events_tx, view_tx);
        let task = tokio::spawn(runtime.run(commands_rx, events_rx));

        tracing::info!("Kiosk session {} created for {}", id, target);
        SessionHandle {
            id,
            target,
            commands: commands_tx,
            view: view_rx,
            task,
        }
    }

    /// Settings sessions are created with
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &KioskSettings {
        &self.settings
    }
}

/// Owner's end of a running session
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    target: TargetId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    view: watch::Receiver<KioskView>,
    task: JoinHandle<SessionOutcome>,
}

impl SessionHandle {
    /// Session identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Airport displayed
    #[inline]
    #[must_use]
    pub fn target(&self) -> &TargetId {
        &self.target
    }

    /// Latest published view
    #[must_use]
    pub fn view(&self) -> KioskView {
        self.view.borrow().clone()
    }

    /// Receiver for view updates
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<KioskView> {
        self.view.clone()
    }

    /// Renderer reported a new viewport extent
    pub fn set_viewport(&self, extent: u32) {
        let _ = self.commands.send(SessionCommand::ViewportChanged(extent));
    }

    /// Whether the session task has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Tear the session down and wait for teardown to complete
    pub async fn dispose(self) -> SessionOutcome {
        let _ = self.commands.send(SessionCommand::Dispose);
        Self::join(self.id, self.task).await
    }

    /// Wait for the session to end on its own (redirect or error)
    pub async fn finished(self) -> SessionOutcome {
        let Self { id, commands, task, .. } = self;
        // keep the command channel open so waiting does not dispose
        let outcome = Self::join(id, task).await;
        drop(commands);
        outcome
    }

    async fn join(id: SessionId, task: JoinHandle<SessionOutcome>) -> SessionOutcome {
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Kiosk session {} task failed: {}", id, e);
                SessionOutcome::Failed(e.to_string())
            }
        }
    }
}

/// State owned by the session task
struct SessionRuntime {
    session: KioskSession,
    phase: SessionPhase,
    deps: SessionDeps,
    settings: KioskSettings,
    measurer: ContentMeasurer<Arc<dyn ExtentProvider>>,
    rotation: RotationScheduler,
    poller: FreshnessPoller,
    timers: TimerRegistry,
    io: IoTasks,
    events: mpsc::UnboundedSender<SessionEvent>,
    view: watch::Sender<KioskView>,
    // bumped at teardown; clock, poll and retry timers carry it
    epoch: Generation,
    sections: Arc<[BriefingSection]>,
    bundle: Option<Arc<AnalysisBundle>>,
    viewport: u32,
    now: DateTime<Utc>,
    title: Option<String>,
    observation_time: Option<ObservationTime>,
    load_failures: u32,
    last_error: Option<String>,
    wake_lock_held: bool,
    torn_down: bool,
    outcome: Option<SessionOutcome>,
}

impl SessionRuntime {
    fn new(
        session: KioskSession,
        deps: SessionDeps,
        settings: KioskSettings,
        events: mpsc::UnboundedSender<SessionEvent>,
        view: watch::Sender<KioskView>,
    ) -> Self {
        // settings were validated by the orchestrator
        let timing = settings.rotation_timing().unwrap_or_default();
        Self {
            session,
            phase: SessionPhase::Initializing,
            measurer: ContentMeasurer::new(deps.extents.clone()),
            rotation: RotationScheduler::new(timing),
            poller: FreshnessPoller::new(settings.poll_interval()),
            timers: TimerRegistry::new(events.clone()),
            io: IoTasks::default(),
            events,
            view,
            epoch: Generation::default(),
            sections: Arc::from(Vec::new()),
            bundle: None,
            viewport: settings.layout.viewport_extent,
            now: Utc::now(),
            title: None,
            observation_time: None,
            load_failures: 0,
            last_error: None,
            wake_lock_held: false,
            torn_down: false,
            outcome: None,
            deps,
            settings,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> SessionOutcome {
        self.start();

        let outcome = loop {
            if let Some(outcome) = self.outcome.take() {
                break outcome;
            }

            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(SessionCommand::ViewportChanged(extent)) => self.on_viewport_changed(extent),
                    Some(SessionCommand::Dispose) | None => break SessionOutcome::Disposed,
                },

                Some(event) = events.recv() => self.handle_event(event),
            }
        };

        self.teardown();
        outcome
    }

    fn start(&mut self) {
        tracing::info!("Kiosk session {} resolving config for {}", self.session.id, self.session.target);
        self.set_phase(SessionPhase::ResolvingConfig);

        let api = self.deps.api.clone();
        let ctx = self.deps.context.clone();
        let target = self.session.target.clone();
        let events = self.events.clone();
        let deadline = self.settings.request_timeout();
        self.io.spawn(async move {
            let result = with_deadline(deadline, api.fetch_config(&ctx, &target)).await;
            let _ = events.send(SessionEvent::ConfigResolved(result));
        });
    }

    fn handle_event(&mut self, event: SessionEvent) {
        if self.torn_down {
            return;
        }
        match event {
            SessionEvent::Timer(fired) => self.on_timer(fired),
            SessionEvent::ConfigResolved(result) => self.on_config(result),
            SessionEvent::LoadFinished { force, result } => self.on_load_finished(force, result),
            SessionEvent::ProbeFinished(result) => self.on_probe_finished(result),
        }
    }

    fn on_config(&mut self, result: Result<KioskConfig, ApiError>) {
        let config = match result {
            Ok(config) => config,
            Err(source) => {
                let err = SessionError::ConfigResolution {
                    target: self.session.target.clone(),
                    source,
                };
                tracing::error!("Kiosk session {}: {}", self.session.id, err);
                metrics::counter!("kiosk_config_failures_total").increment(1);
                self.last_error = Some(err.to_string());
                self.set_phase(SessionPhase::Error);
                self.deps.shell.navigate(KioskRoute::Listing, NavigationMode::Replace);
                self.outcome = Some(SessionOutcome::Failed(err.to_string()));
                return;
            }
        };

        if !config.default_is_allowed() {
            tracing::warn!(
                "Kiosk config for {} lists default profile {} outside its allowed profiles",
                self.session.target,
                config.default_profile
            );
        }
        let decision = config.resolve_profile(self.session.profile.as_ref());
        self.session.config = Some(config);

        match decision {
            ProfileDecision::Redirect(default) => {
                let err = SessionError::ProfileInvalid {
                    target: self.session.target.clone(),
                    requested: self.session.profile.clone(),
                    default: default.clone(),
                };
                tracing::info!("Kiosk session {}: {}", self.session.id, err);
                self.set_phase(SessionPhase::Redirecting);

                let route = KioskRoute::display(self.session.target.clone(), Some(default));
                self.deps.shell.navigate(route.clone(), NavigationMode::Replace);
                self.outcome = Some(SessionOutcome::Redirected(route));
            }
            ProfileDecision::Accept(profile) => {
                tracing::info!("Kiosk session {} loading {} for {}", self.session.id, self.session.target, profile);
                self.session.profile = Some(profile);
                self.set_phase(SessionPhase::Loading);
                self.start_load(false);
            }
        }
    }

    /// Start a full load unless one is already running
    fn start_load(&mut self, force: bool) -> bool {
        if self.session.load_in_flight {
            tracing::debug!("Load already in flight for {}; not starting another", self.session.target);
            return false;
        }
        let Some(profile) = self.session.profile.clone() else {
            return false;
        };

        self.session.load_in_flight = true;
        if force {
            metrics::counter!("kiosk_reloads_total").increment(1);
        }

        let request = AnalysisRequest {
            target: self.session.target.clone(),
            profile,
            force,
        };
        let api = self.deps.api.clone();
        let ctx = self.deps.context.clone();
        let events = self.events.clone();
        let deadline = self.settings.request_timeout();
        self.io.spawn(async move {
            let result = with_deadline(deadline, api.load_analysis(&ctx, &request)).await;
            let _ = events.send(SessionEvent::LoadFinished { force, result });
        });

        self.publish();
        true
    }

    fn on_load_finished(&mut self, force: bool, result: Result<AnalysisBundle, ApiError>) {
        self.session.load_in_flight = false;
        match result {
            Ok(bundle) => self.apply_bundle(bundle),
            Err(source) => self.on_load_failed(force, source),
        }
        self.publish();
    }

    fn apply_bundle(&mut self, bundle: AnalysisBundle) {
        let now = Utc::now();
        let target = self.session.target.clone();

        self.session.last_fingerprint = bundle.fingerprint();
        self.session.last_loaded_at = Some(now);
        self.session.source = bundle.source().cloned();
        self.observation_time = bundle
            .raw_data
            .metar
            .as_deref()
            .and_then(|raw| ObservationTime::parse(raw, now));

        let title = format!("{} | {}", target, self.settings.layout.title_suffix);
        self.deps.shell.set_title(&title);
        self.title = Some(title);

        tracing::info!(
            "Loaded briefing for {} (cached: {}, source: {})",
            target,
            bundle.is_cached,
            self.session.source.as_ref().map_or("-", SourceId::as_str)
        );

        self.sections = bundle.sections(&target).into();
        self.bundle = Some(Arc::new(bundle));
        self.load_failures = 0;
        self.last_error = None;

        if matches!(self.phase, SessionPhase::Loading | SessionPhase::Stalled) {
            self.enter_steady();
        }
        self.restart_rotation();
    }

    fn enter_steady(&mut self) {
        self.set_phase(SessionPhase::Steady);
        self.timers.cancel(TimerKind::RetryLoad);
        self.timers.every(TimerKind::Clock, self.settings.tick_interval(), self.epoch);
        self.acquire_wake_lock();
        self.timers.every(TimerKind::Poll, self.poller.interval(), self.epoch);
        tracing::info!("Kiosk session {} steady; polling every {:?}", self.session.id, self.poller.interval());
    }

    fn acquire_wake_lock(&mut self) {
        if self.wake_lock_held {
            return;
        }
        match self.deps.wake_lock.acquire() {
            Ok(()) => {
                self.wake_lock_held = true;
                tracing::debug!("Wake lock acquired for session {}", self.session.id);
            }
            Err(e) => {
                tracing::warn!("Kiosk session {}: {}", self.session.id, SessionError::from(e));
            }
        }
    }

    fn on_load_failed(&mut self, force: bool, source: ApiError) {
        if self.phase == SessionPhase::Steady {
            tracing::warn!(
                "Reload for {} failed (forced: {}), keeping displayed briefing: {}",
                self.session.target,
                force,
                source
            );
            metrics::counter!("kiosk_reload_failures_total").increment(1);
            return;
        }

        self.load_failures = self.load_failures.saturating_add(1);
        let transient = source.is_transient();
        let err = SessionError::Load {
            attempt: self.load_failures,
            source,
        };
        let delay = self.settings.retry.delay_for(self.load_failures);

        if self.settings.retry.is_exhausted(self.load_failures) {
            if self.phase != SessionPhase::Stalled {
                tracing::error!(
                    "Initial load for {} failed {} times; showing error and retrying every {:?}",
                    self.session.target,
                    self.load_failures,
                    delay
                );
                self.set_phase(SessionPhase::Stalled);
            }
            self.last_error = Some(err.to_string());
        } else {
            tracing::warn!("{}; retrying in {:?} (transient: {})", err, delay, transient);
        }

        self.timers.once(TimerKind::RetryLoad, delay, self.epoch);
    }

    fn on_timer(&mut self, fired: TimerFired) {
        match fired.kind {
            TimerKind::Clock | TimerKind::Poll | TimerKind::RetryLoad if fired.generation != self.epoch => {
                tracing::trace!("Ignoring {:?} timer from {}", fired.kind, fired.generation);
                metrics::counter!("kiosk_stale_timers_total").increment(1);
            }
            TimerKind::Clock => {
                self.now = Utc::now();
                self.publish();
            }
            TimerKind::Poll => self.on_poll_tick(),
            TimerKind::RetryLoad => {
                if matches!(self.phase, SessionPhase::Loading | SessionPhase::Stalled) {
                    self.start_load(false);
                }
            }
            TimerKind::Settle => {
                let measurement = self.measurer.measure(&self.sections, self.viewport);
                let directive = self.rotation.apply_measurement(fired.generation, &measurement);
                self.apply_rotation(directive);
            }
            TimerKind::Advance => {
                let directive = self.rotation.advance(fired.generation);
                self.apply_rotation(directive);
            }
            TimerKind::Snap => {
                let directive = self.rotation.snap(fired.generation);
                self.apply_rotation(directive);
            }
        }
    }

    fn apply_rotation(&mut self, directive: RotationDirective) {
        match directive {
            RotationDirective::Stale => {
                tracing::trace!("Dropping stale rotation timer");
                metrics::counter!("kiosk_stale_timers_total").increment(1);
                return;
            }
            RotationDirective::Idle => {}
            RotationDirective::ScheduleSettle { generation, after } => {
                self.timers.once(TimerKind::Settle, after, generation);
            }
            RotationDirective::StartAdvancing { generation, every } => {
                self.timers.every(TimerKind::Advance, every, generation);
            }
            RotationDirective::ScheduleSnap { generation, after } => {
                self.timers.once(TimerKind::Snap, after, generation);
            }
        }
        self.publish();
    }

    fn restart_rotation(&mut self) {
        self.timers.cancel(TimerKind::Settle);
        self.timers.cancel(TimerKind::Advance);
        self.timers.cancel(TimerKind::Snap);

        let directive = self.rotation.reset(self.sections.len());
        self.apply_rotation(directive);
    }

    fn on_viewport_changed(&mut self, extent: u32) {
        if self.torn_down || extent == self.viewport {
            return;
        }
        tracing::debug!("Viewport changed {} -> {}", self.viewport, extent);
        self.viewport = extent;
        if !self.sections.is_empty() {
            self.restart_rotation();
        }
    }

    fn on_poll_tick(&mut self) {
        if self.phase != SessionPhase::Steady {
            return;
        }

        match self.poller.on_tick(&self.session.target, self.session.source.as_ref()) {
            PollAction::Probe(request) => {
                metrics::counter!("kiosk_probes_total").increment(1);
                let api = self.deps.api.clone();
                let ctx = self.deps.context.clone();
                let events = self.events.clone();
                let deadline = self.settings.request_timeout();
                self.io.spawn(async move {
                    let result = with_deadline(deadline, api.probe(&ctx, &request)).await;
                    let _ = events.send(SessionEvent::ProbeFinished(result));
                });
            }
            PollAction::SkipOutstanding => {}
        }
    }

    fn on_probe_finished(&mut self, result: Result<ProbeResponse, ApiError>) {
        let verdict = self.poller.on_probe_result(
            result.map_err(SessionError::Probe),
            self.session.last_fingerprint.as_ref(),
            self.session.load_in_flight,
            Utc::now(),
        );

        match verdict {
            PollVerdict::ReloadRequested(signal) => {
                tracing::info!("Observation for {} changed to {}", self.session.target, signal.fingerprint.as_str());
                self.start_load(true);
            }
            PollVerdict::ReloadSuppressed(_) => {
                metrics::counter!("kiosk_reloads_suppressed_total").increment(1);
            }
            PollVerdict::ProbeFailed(_) | PollVerdict::NoObservation => {
                metrics::counter!("kiosk_probe_failures_total").increment(1);
            }
            PollVerdict::Unchanged => {}
        }
    }

    fn set_phase(&mut self, phase: SessionPhase) {
        if self.phase != phase {
            tracing::debug!("Kiosk session {} {} -> {}", self.session.id, self.phase, phase);
            self.phase = phase;
        }
        self.publish();
    }

    fn snapshot(&self) -> KioskView {
        let special = self
            .bundle
            .as_ref()
            .and_then(|b| b.raw_data.metar.as_deref())
            .is_some_and(is_special_observation);

        KioskView {
            session_id: self.session.id,
            phase: self.phase,
            target: self.session.target.clone(),
            profile: self.session.profile.clone(),
            title: self.title.clone(),
            now: self.now,
            sections: self.sections.clone(),
            bundle: self.bundle.clone(),
            rotation: self.rotation.state().clone(),
            reloading: self.session.load_in_flight,
            retry_scheduled: self.timers.is_armed(TimerKind::RetryLoad),
            last_loaded_at: self.session.last_loaded_at,
            observation_time: self.observation_time,
            special_observation: special,
            error: self.last_error.clone(),
        }
    }

    fn publish(&self) {
        self.view.send_replace(self.snapshot());
    }

    /// Stop everything the session started; safe to call repeatedly
    fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        self.epoch = self.epoch.next();
        self.timers.cancel_all();
        let aborted = self.io.abort_all();
        self.poller.on_probe_abandoned();
        self.session.load_in_flight = false;

        if self.wake_lock_held {
            self.deps.wake_lock.release();
            self.wake_lock_held = false;
        }
        self.rotation.invalidate();

        if !matches!(self.phase, SessionPhase::Error | SessionPhase::Redirecting) {
            self.phase = SessionPhase::Disposed;
        }

        let stats = self.poller.stats();
        tracing::info!(
            "Kiosk session {} torn down ({} requests aborted, {} probes, {} reloads requested)",
            self.session.id,
            aborted,
            stats.probes_sent,
            stats.reloads_requested
        );
        self.publish();
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        self.teardown();
    }
}
