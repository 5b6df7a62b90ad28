//! Testing utilities for the kiosk workspace
//!
//! Shared fixtures, a scripted backend and recording fakes for the shell
//! capabilities.

#![allow(missing_docs)]

use async_trait::async_trait;
use kiosk_core::{
    ApiError, BriefingApi, KioskSettings, KioskShell, ScreenWakeLock, SessionContext, SessionDeps,
    SessionOrchestrator, WakeLockError,
};
use kiosk_rotation::ExtentProvider;
use kiosk_types::{
    AnalysisBundle, AnalysisRequest, BriefingAnalysis, BriefingSection, ConditionBubbles, CrosswindStatus,
    ForecastPeriod, ForecastTimeline, KioskConfig, KioskRoute, NavigationMode, ProbeRequest, ProbeResponse,
    ProfileId, RawSupportingData, SourceId, TargetId,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub fn target() -> TargetId {
    TargetId::new("KSTS").unwrap()
}

pub fn profile(name: &str) -> ProfileId {
    ProfileId::new(name).unwrap()
}

pub fn kiosk_config() -> KioskConfig {
    KioskConfig::new(
        profile("medium"),
        vec![profile("small"), profile("medium"), profile("large")],
    )
}

/// Raw observation issued at `time` (DDHHMMZ)
pub fn observation(time: &str) -> String {
    format!("KSTS {time} 27008KT 10SM FEW040 18/09 A3002")
}

pub fn bundle(metar: &str) -> AnalysisBundle {
    AnalysisBundle {
        airport_name: Some("Charles M. Schulz-Sonoma County".into()),
        airport_tz: Some("America/Los_Angeles".into()),
        analysis: BriefingAnalysis {
            summary_weather: Some("VFR. Light westerly wind, few clouds at 4000.".into()),
            summary_crosswind: Some("Runway 32: 3 kt crosswind, within limits.".into()),
            summary_airspace: Some("Class D surface area, tower open 0700-2100.".into()),
            summary_notams: Some("Taxiway A closed between A3 and A5.".into()),
            flight_category: Some("VFR".into()),
            airspace_warnings: Vec::new(),
            crosswind_status: Some(CrosswindStatus::WithinLimits),
            bubbles: ConditionBubbles {
                wind: Some("270@8".into()),
                x_wind: Some("3kt".into()),
                rwy: Some("32".into()),
                visibility: Some("10SM".into()),
                ceiling: Some("FEW040".into()),
                temp: Some("18C".into()),
            },
            timeline: ForecastTimeline {
                t_06: Some(ForecastPeriod::Detailed {
                    time_label: Some("18Z-00Z".into()),
                    summary: Some("VFR, wind 290 at 10.".into()),
                }),
                t_12: Some(ForecastPeriod::Text("Marine layer, MVFR after 06Z.".into())),
            },
        },
        raw_data: RawSupportingData {
            metar: Some(metar.to_string()),
            taf: None,
            notams: vec!["!STS 10/001 TWY A CLSD".into()],
            weather_source: Some(SourceId::new("KSTS")),
        },
        is_cached: false,
    }
}

/// Every block reports the same extent
#[derive(Debug, Clone, Copy)]
pub struct UniformExtents(pub u32);

impl ExtentProvider for UniformExtents {
    fn extent(&self, _section: &BriefingSection) -> u32 {
        self.0
    }
}

/// Backend whose answers are queued by the test
///
/// Loads without a queued answer return [`bundle`] built from the current
/// upstream observation, so a reload after a change picks the change up.
pub struct ScriptedApi {
    configs: Mutex<VecDeque<Result<KioskConfig, ApiError>>>,
    loads: Mutex<VecDeque<Result<AnalysisBundle, ApiError>>>,
    probe_errors: Mutex<VecDeque<ApiError>>,
    observation: Mutex<String>,
    config_latency: Mutex<Duration>,
    load_latency: Mutex<Duration>,
    probe_latency: Mutex<Duration>,
    load_requests: Mutex<Vec<AnalysisRequest>>,
    probe_requests: Mutex<Vec<ProbeRequest>>,
    config_requests: AtomicUsize,
    loads_in_flight: AtomicUsize,
    max_loads_in_flight: AtomicUsize,
}

impl ScriptedApi {
    pub fn new(initial_observation: &str) -> Self {
        Self {
            configs: Mutex::new(VecDeque::new()),
            loads: Mutex::new(VecDeque::new()),
            probe_errors: Mutex::new(VecDeque::new()),
            observation: Mutex::new(initial_observation.to_string()),
            config_latency: Mutex::new(Duration::ZERO),
            load_latency: Mutex::new(Duration::ZERO),
            probe_latency: Mutex::new(Duration::ZERO),
            load_requests: Mutex::new(Vec::new()),
            probe_requests: Mutex::new(Vec::new()),
            config_requests: AtomicUsize::new(0),
            loads_in_flight: AtomicUsize::new(0),
            max_loads_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn push_config(&self, result: Result<KioskConfig, ApiError>) {
        self.configs.lock().push_back(result);
    }

    pub fn push_load(&self, result: Result<AnalysisBundle, ApiError>) {
        self.loads.lock().push_back(result);
    }

    pub fn fail_next_loads(&self, count: usize) {
        for _ in 0..count {
            self.push_load(Err(ApiError::Status {
                status: 503,
                detail: "briefing service unavailable".into(),
            }));
        }
    }

    pub fn fail_next_probe(&self, error: ApiError) {
        self.probe_errors.lock().push_back(error);
    }

    /// Change what the upstream reports
    pub fn set_observation(&self, raw: &str) {
        *self.observation.lock() = raw.to_string();
    }

    pub fn set_config_latency(&self, latency: Duration) {
        *self.config_latency.lock() = latency;
    }

    pub fn set_load_latency(&self, latency: Duration) {
        *self.load_latency.lock() = latency;
    }

    pub fn set_probe_latency(&self, latency: Duration) {
        *self.probe_latency.lock() = latency;
    }

    pub fn load_requests(&self) -> Vec<AnalysisRequest> {
        self.load_requests.lock().clone()
    }

    pub fn forced_loads(&self) -> usize {
        self.load_requests.lock().iter().filter(|r| r.force).count()
    }

    pub fn probe_requests(&self) -> Vec<ProbeRequest> {
        self.probe_requests.lock().clone()
    }

    pub fn config_requests(&self) -> usize {
        self.config_requests.load(Ordering::SeqCst)
    }

    pub fn max_concurrent_loads(&self) -> usize {
        self.max_loads_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BriefingApi for ScriptedApi {
    async fn fetch_config(&self, _ctx: &SessionContext, _target: &TargetId) -> Result<KioskConfig, ApiError> {
        self.config_requests.fetch_add(1, Ordering::SeqCst);
        let latency = *self.config_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let queued = self.configs.lock().pop_front();
        queued.unwrap_or_else(|| Ok(kiosk_config()))
    }

    async fn load_analysis(
        &self,
        _ctx: &SessionContext,
        request: &AnalysisRequest,
    ) -> Result<AnalysisBundle, ApiError> {
        self.load_requests.lock().push(request.clone());
        let running = self.loads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_loads_in_flight.fetch_max(running, Ordering::SeqCst);

        {
            // an abandoned load still leaves the in-flight count
            let _running = InFlight(&self.loads_in_flight);
            let latency = *self.load_latency.lock();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
        }

        let queued = self.loads.lock().pop_front();
        queued.unwrap_or_else(|| Ok(bundle(&self.observation.lock())))
    }

    async fn probe(&self, _ctx: &SessionContext, request: &ProbeRequest) -> Result<ProbeResponse, ApiError> {
        self.probe_requests.lock().push(request.clone());

        let latency = *self.probe_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let queued = self.probe_errors.lock().pop_front();
        match queued {
            Some(error) => Err(error),
            None => Ok(ProbeResponse::success(self.observation.lock().clone())),
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shell that records every call
#[derive(Debug, Default)]
pub struct RecordingShell {
    navigations: Mutex<Vec<(KioskRoute, NavigationMode)>>,
    titles: Mutex<Vec<String>>,
}

impl RecordingShell {
    pub fn navigations(&self) -> Vec<(KioskRoute, NavigationMode)> {
        self.navigations.lock().clone()
    }

    pub fn titles(&self) -> Vec<String> {
        self.titles.lock().clone()
    }
}

impl KioskShell for RecordingShell {
    fn navigate(&self, route: KioskRoute, mode: NavigationMode) {
        self.navigations.lock().push((route, mode));
    }

    fn set_title(&self, title: &str) {
        self.titles.lock().push(title.to_string());
    }
}

/// Wake lock that counts calls
#[derive(Debug)]
pub struct CountingWakeLock {
    supported: bool,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CountingWakeLock {
    pub fn supported() -> Self {
        Self {
            supported: true,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::supported()
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ScreenWakeLock for CountingWakeLock {
    fn acquire(&self) -> Result<(), WakeLockError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        if self.supported {
            Ok(())
        } else {
            Err(WakeLockError::Unsupported)
        }
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything a session test needs, with handles kept for assertions
pub struct Rig {
    pub api: Arc<ScriptedApi>,
    pub shell: Arc<RecordingShell>,
    pub wake_lock: Arc<CountingWakeLock>,
    pub extents: Arc<UniformExtents>,
}

impl Rig {
    /// Backend reporting `initial_observation`; blocks of 300 in an 800 viewport
    pub fn new(initial_observation: &str) -> Self {
        Self {
            api: Arc::new(ScriptedApi::new(initial_observation)),
            shell: Arc::new(RecordingShell::default()),
            wake_lock: Arc::new(CountingWakeLock::supported()),
            extents: Arc::new(UniformExtents(300)),
        }
    }

    pub fn with_extent(mut self, extent: u32) -> Self {
        self.extents = Arc::new(UniformExtents(extent));
        self
    }

    pub fn with_wake_lock(mut self, wake_lock: CountingWakeLock) -> Self {
        self.wake_lock = Arc::new(wake_lock);
        self
    }

    pub fn deps(&self) -> SessionDeps {
        SessionDeps::new(
            self.api.clone(),
            self.shell.clone(),
            self.wake_lock.clone(),
            self.extents.clone(),
        )
    }

    pub fn orchestrator(&self, settings: KioskSettings) -> SessionOrchestrator {
        SessionOrchestrator::new(self.deps(), settings).unwrap()
    }
}

/// Let virtual time pass
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}
