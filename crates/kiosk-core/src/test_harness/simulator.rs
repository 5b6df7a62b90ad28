//! Kiosk simulator
//!
//! Runs one full session against a seeded simulated backend and watches the
//! published views for rotation and concurrency violations. Time can be
//! compressed so an hour of kiosk time runs in seconds.

use crate::api::{BriefingApi, SessionContext};
use crate::error::ApiError;
use crate::session::{SessionDeps, SessionOrchestrator, SessionOutcome};
use crate::settings::KioskSettings;
use crate::shell::{ScreenWakeLock, TracingShell, WakeLockError};
use crate::view::{KioskView, SessionPhase};
use async_trait::async_trait;
use kiosk_rotation::TextExtentEstimator;
use kiosk_types::{
    AnalysisBundle, AnalysisRequest, BriefingAnalysis, CrosswindStatus, ForecastPeriod, ForecastTimeline,
    KioskConfig, ProbeRequest, ProbeResponse, ProfileId, RawSupportingData, SourceId, TargetId,
};
use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const WORDS: &[&str] = &[
    "wind", "variable", "gusting", "ceiling", "broken", "overcast", "visibility", "runway", "closed",
    "taxiway", "crane", "lighted", "tower", "class", "delta", "surface", "temporary", "restriction",
    "density", "altitude", "crosswind", "component", "within", "limits", "marginal",
];

/// Simulator configuration
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Kiosk time to simulate
    pub duration: Duration,
    /// Divide every configured delay by this factor
    pub time_scale: u32,
    /// Airport displayed
    pub target: TargetId,
    /// Profile requested
    pub profile: ProfileId,
    /// Initial viewport extent
    pub viewport_extent: u32,
    /// Switch between two viewport extents this often
    pub viewport_change_every: Option<Duration>,
    /// Chance that a probe sees a new observation
    pub observation_change_rate: f64,
    /// Chance that a probe fails
    pub probe_failure_rate: f64,
    /// Chance that a full load fails
    pub load_failure_rate: f64,
    /// Upper bound of full load latency
    pub max_load_latency: Duration,
    /// Settings before compression
    pub settings: KioskSettings,
}

impl SimulatorConfig {
    /// Thirty minutes of kiosk time for a target with moderate churn
    #[must_use]
    pub fn new(target: TargetId, profile: ProfileId) -> Self {
        Self {
            seed: 42,
            duration: Duration::from_secs(30 * 60),
            time_scale: 1,
            target,
            profile,
            viewport_extent: 800,
            viewport_change_every: Some(Duration::from_secs(7 * 60)),
            observation_change_rate: 0.2,
            probe_failure_rate: 0.1,
            load_failure_rate: 0.1,
            max_load_latency: Duration::from_secs(3),
            settings: KioskSettings::default(),
        }
    }

    fn scale(&self, duration: Duration) -> Duration {
        duration / self.time_scale.max(1)
    }

    /// Settings with every delay divided by the time scale
    #[must_use]
    pub fn compressed_settings(&self) -> KioskSettings {
        let factor = u64::from(self.time_scale.max(1));
        let mut settings = self.settings.clone();
        settings.rotation.advance_period_ms = (settings.rotation.advance_period_ms / factor).max(2);
        settings.rotation.transition_ms =
            (settings.rotation.transition_ms / factor).clamp(1, settings.rotation.advance_period_ms - 1);
        settings.rotation.settle_delay_ms /= factor;
        settings.freshness.poll_interval_ms = (settings.freshness.poll_interval_ms / factor).max(1);
        settings.clock.tick_interval_ms = (settings.clock.tick_interval_ms / factor).max(1);
        settings.retry.initial_delay_ms = (settings.retry.initial_delay_ms / factor).max(1);
        settings.retry.max_delay_ms = (settings.retry.max_delay_ms / factor).max(settings.retry.initial_delay_ms);
        settings.requests.timeout_ms = (settings.requests.timeout_ms / factor).max(1);
        settings
    }
}

/// Backend-side counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackendStats {
    /// Config fetches
    pub config_fetches: u64,
    /// Full loads started
    pub loads: u64,
    /// Full loads with `force`
    pub forced_loads: u64,
    /// Full loads that failed
    pub load_failures: u64,
    /// Probes answered
    pub probes: u64,
    /// Probes that failed
    pub probe_failures: u64,
    /// Times the upstream observation changed
    pub observation_changes: u64,
    /// Highest number of loads running at once
    pub max_concurrent_loads: usize,
}

struct BackendState {
    rng: StdRng,
    observation_seq: u32,
    stats: BackendStats,
}

/// Seeded stand-in for the briefing backend
pub struct SimulatedBackend {
    config: SimulatorConfig,
    state: Mutex<BackendState>,
    loads_in_flight: AtomicUsize,
}

impl SimulatedBackend {
    /// Create backend
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            state: Mutex::new(BackendState {
                rng,
                observation_seq: 0,
                stats: BackendStats::default(),
            }),
            loads_in_flight: AtomicUsize::new(0),
        }
    }

    /// Counters so far
    #[must_use]
    pub fn stats(&self) -> BackendStats {
        self.state.lock().stats
    }

    fn observation(&self, seq: u32) -> String {
        let hour = (18 + seq / 60) % 24;
        let minute = (53 + seq) % 60;
        format!("{} 15{hour:02}{minute:02}Z 27008KT 10SM FEW040 18/09 A3002", self.config.target)
    }

    fn summary(rng: &mut StdRng) -> String {
        let words = rng.random_range(4..90);
        let mut text = String::new();
        for i in 0..words {
            if i > 0 {
                text.push(' ');
            }
            text.push_str(WORDS[rng.random_range(0..WORDS.len())]);
        }
        text
    }
}

#[async_trait]
impl BriefingApi for SimulatedBackend {
    async fn fetch_config(&self, _ctx: &SessionContext, _target: &TargetId) -> Result<KioskConfig, ApiError> {
        self.state.lock().stats.config_fetches += 1;
        let allowed = ["small", "medium", "large"]
            .iter()
            .filter_map(|p| ProfileId::new(p).ok())
            .collect();
        Ok(KioskConfig::new(self.config.profile.clone(), allowed))
    }

    async fn load_analysis(
        &self,
        _ctx: &SessionContext,
        request: &AnalysisRequest,
    ) -> Result<AnalysisBundle, ApiError> {
        let running = self.loads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let (latency, fails) = {
            let mut state = self.state.lock();
            state.stats.loads += 1;
            if request.force {
                state.stats.forced_loads += 1;
            }
            state.stats.max_concurrent_loads = state.stats.max_concurrent_loads.max(running);
            let max_ms = u64::try_from(self.config.max_load_latency.as_millis()).unwrap_or(u64::MAX);
            let latency = Duration::from_millis(state.rng.random_range(0..=max_ms));
            let fails = state.rng.random_bool(self.config.load_failure_rate);
            (latency, fails)
        };

        tokio::time::sleep(self.config.scale(latency)).await;
        self.loads_in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock();
        if fails {
            state.stats.load_failures += 1;
            return Err(ApiError::Status {
                status: 502,
                detail: "upstream weather service unavailable".into(),
            });
        }

        let seq = state.observation_seq;
        let notams = (0..state.rng.random_range(0..8))
            .map(|i| format!("!{} 10/{:03} RWY 09/27 CLSD", request.target, i + 1))
            .collect();
        let analysis = BriefingAnalysis {
            summary_weather: Some(Self::summary(&mut state.rng)),
            summary_crosswind: Some(Self::summary(&mut state.rng)),
            summary_airspace: Some(Self::summary(&mut state.rng)),
            summary_notams: Some(Self::summary(&mut state.rng)),
            flight_category: Some("VFR".into()),
            airspace_warnings: Vec::new(),
            crosswind_status: Some(CrosswindStatus::WithinLimits),
            timeline: ForecastTimeline {
                t_06: Some(ForecastPeriod::Text(Self::summary(&mut state.rng))),
                t_12: Some(ForecastPeriod::Text(Self::summary(&mut state.rng))),
            },
            ..Default::default()
        };
        Ok(AnalysisBundle {
            airport_name: Some("Simulated Field".into()),
            airport_tz: Some("America/Los_Angeles".into()),
            analysis,
            raw_data: RawSupportingData {
                metar: Some(self.observation(seq)),
                taf: None,
                notams,
                weather_source: Some(SourceId::new(request.target.as_str())),
            },
            is_cached: !request.force,
        })
    }

    async fn probe(&self, _ctx: &SessionContext, _request: &ProbeRequest) -> Result<ProbeResponse, ApiError> {
        let mut state = self.state.lock();
        state.stats.probes += 1;

        if state.rng.random_bool(self.config.probe_failure_rate) {
            state.stats.probe_failures += 1;
            return Err(ApiError::Timeout);
        }
        if state.rng.random_bool(self.config.observation_change_rate) {
            state.observation_seq += 1;
            state.stats.observation_changes += 1;
        }

        let mut raw = self.observation(state.observation_seq);
        // same report, different spacing
        if state.rng.random_bool(0.25) {
            raw = raw.replace(' ', "  ");
        }
        Ok(ProbeResponse::success(raw))
    }
}

/// Wake lock that counts calls
#[derive(Debug, Default)]
pub struct SimulatedWakeLock {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl SimulatedWakeLock {
    /// (acquisitions, releases)
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (self.acquired.load(Ordering::SeqCst), self.released.load(Ordering::SeqCst))
    }
}

impl ScreenWakeLock for SimulatedWakeLock {
    fn acquire(&self) -> Result<(), WakeLockError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A violation seen during simulation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Violation {
    /// Active index outside the offsets
    IndexOutOfRange {
        /// Index shown
        index: usize,
        /// Positions available
        positions: usize,
    },
    /// Returned to the first block with an animation
    AnimatedReturnToStart {
        /// Transition used
        transition_ms: u64,
    },
    /// Offsets decreased
    OffsetsNotMonotonic {
        /// Offsets published
        offsets: Vec<u32>,
    },
    /// Position count does not match the section count
    PositionCountMismatch {
        /// Sections
        sections: usize,
        /// Offsets
        positions: usize,
        /// Loop flag
        loop_enabled: bool,
    },
    /// More than one full load ran at once
    ConcurrentLoads {
        /// Highest count seen
        max: usize,
    },
    /// Wake lock acquisitions and releases differ after teardown
    WakeLockImbalance {
        /// Acquisitions
        acquired: usize,
        /// Releases
        released: usize,
    },
}

/// What the watcher saw
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionObservations {
    /// Views received
    pub views_seen: u64,
    /// Forward moves seen
    pub advances_seen: u64,
    /// Returns to the first block seen
    pub snaps_seen: u64,
    /// Successful loads seen
    pub loads_seen: u64,
    /// Final phase before dispose
    pub final_phase: Option<SessionPhase>,
}

/// Final report
#[derive(Debug, Clone)]
pub struct SimulatorReport {
    /// Configuration used
    pub config: SimulatorConfig,
    /// Backend counters
    pub backend: BackendStats,
    /// Watcher counters
    pub observed: SessionObservations,
    /// How the session ended
    pub outcome: SessionOutcome,
    /// Violations found
    pub violations: Vec<Violation>,
}

impl SimulatorReport {
    /// Whether no violation was found
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human readable report
    #[must_use]
    pub fn generate_text(&self) -> String {
        let mut report = String::new();
        let b = &self.backend;
        let o = &self.observed;

        let _ = writeln!(report, "=== Kiosk Simulator Report ===\n");
        let _ = writeln!(report, "Seed: {}", self.config.seed);
        let _ = writeln!(report, "Target: {} ({})", self.config.target, self.config.profile);
        let _ = writeln!(report, "Simulated: {:?} (scale 1/{})", self.config.duration, self.config.time_scale);
        let _ = writeln!(report, "Config fetches: {}", b.config_fetches);
        let _ = writeln!(report, "Loads: {} ({} forced, {} failed)", b.loads, b.forced_loads, b.load_failures);
        let _ = writeln!(report, "Probes: {} ({} failed)", b.probes, b.probe_failures);
        let _ = writeln!(report, "Observation changes: {}", b.observation_changes);
        let _ = writeln!(report, "Max concurrent loads: {}", b.max_concurrent_loads);
        let _ = writeln!(report, "Views: {}", o.views_seen);
        let _ = writeln!(report, "Advances: {}, snaps: {}", o.advances_seen, o.snaps_seen);
        let _ = writeln!(report, "Loads displayed: {}", o.loads_seen);
        let _ = writeln!(
            report,
            "Final phase: {}",
            o.final_phase.map_or_else(|| "-".to_string(), |p| p.to_string())
        );
        let _ = writeln!(report, "Outcome: {:?}", self.outcome);
        let _ = writeln!(report, "Violations: {}", self.violations.len());

        if !self.violations.is_empty() {
            let _ = writeln!(report, "\n=== Violations ===");
            for (i, v) in self.violations.iter().enumerate() {
                let _ = writeln!(report, "{}. {:?}", i + 1, v);
            }
        }

        let _ = writeln!(report, "\n=== Result: {} ===", if self.passed() { "PASS" } else { "FAIL" });
        report
    }

    /// Machine readable report
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "seed": self.config.seed,
            "target": self.config.target.as_str(),
            "profile": self.config.profile.as_str(),
            "simulated_secs": self.config.duration.as_secs(),
            "time_scale": self.config.time_scale,
            "backend": self.backend,
            "observed": self.observed,
            "outcome": format!("{:?}", self.outcome),
            "violations": self.violations,
            "passed": self.passed(),
        })
    }
}

fn check_view(
    previous: Option<&KioskView>,
    view: &KioskView,
    observed: &mut SessionObservations,
    violations: &mut Vec<Violation>,
) {
    let rotation = &view.rotation;
    observed.views_seen += 1;

    if !rotation.offsets.is_empty() {
        if rotation.active_index >= rotation.offsets.len() {
            violations.push(Violation::IndexOutOfRange {
                index: rotation.active_index,
                positions: rotation.offsets.len(),
            });
        }
        if rotation.offsets.windows(2).any(|w| w[0] > w[1]) {
            violations.push(Violation::OffsetsNotMonotonic {
                offsets: rotation.offsets.clone(),
            });
        }
        let expected = view.sections.len() + usize::from(rotation.loop_enabled);
        if rotation.offsets.len() != expected {
            violations.push(Violation::PositionCountMismatch {
                sections: view.sections.len(),
                positions: rotation.offsets.len(),
                loop_enabled: rotation.loop_enabled,
            });
        }
    }
    if rotation.active_index == 0 && rotation.transition_duration_ms != 0 {
        violations.push(Violation::AnimatedReturnToStart {
            transition_ms: rotation.transition_duration_ms,
        });
    }

    let Some(previous) = previous else {
        return;
    };
    if rotation.active_index > previous.rotation.active_index {
        observed.advances_seen += 1;
    } else if rotation.active_index == 0 && previous.rotation.at_duplicate() && rotation.loop_enabled {
        observed.snaps_seen += 1;
    }
    if view.last_loaded_at.is_some() && view.last_loaded_at != previous.last_loaded_at {
        observed.loads_seen += 1;
    }
}

/// Run one session against the simulated backend
pub async fn run_simulator(config: SimulatorConfig) -> SimulatorReport {
    let backend = Arc::new(SimulatedBackend::new(config.clone()));
    let wake_lock = Arc::new(SimulatedWakeLock::default());
    let deps = SessionDeps::new(
        backend.clone(),
        Arc::new(TracingShell),
        wake_lock.clone(),
        Arc::new(TextExtentEstimator::default()),
    );

    let mut violations = Vec::new();
    let mut observed = SessionObservations::default();

    let orchestrator = match SessionOrchestrator::new(deps, config.compressed_settings()) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            return SimulatorReport {
                config,
                backend: backend.stats(),
                observed,
                outcome: SessionOutcome::Failed(e.to_string()),
                violations,
            };
        }
    };

    let handle = orchestrator.init(config.target.clone(), Some(config.profile.clone()));
    let mut views = handle.subscribe();
    let mut previous: Option<KioskView> = None;

    let deadline = tokio::time::Instant::now() + config.scale(config.duration);
    let resize_every = config.viewport_change_every.map(|d| config.scale(d));
    let mut next_resize = resize_every.map(|d| tokio::time::Instant::now() + d);
    let mut wide = false;

    loop {
        let resize_at = next_resize.unwrap_or(deadline);
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                check_view(previous.as_ref(), &view, &mut observed, &mut violations);
                previous = Some(view);
            }
            () = tokio::time::sleep_until(resize_at), if next_resize.is_some() => {
                wide = !wide;
                let extent = if wide { config.viewport_extent * 3 / 2 } else { config.viewport_extent };
                handle.set_viewport(extent);
                next_resize = resize_every.map(|d| resize_at + d);
            }
            () = tokio::time::sleep_until(deadline) => break,
        }
    }

    observed.final_phase = previous.as_ref().map(|v| v.phase);
    let outcome = handle.dispose().await;

    let stats = backend.stats();
    if stats.max_concurrent_loads > 1 {
        violations.push(Violation::ConcurrentLoads {
            max: stats.max_concurrent_loads,
        });
    }
    let (acquired, released) = wake_lock.counts();
    if acquired != released {
        violations.push(Violation::WakeLockImbalance { acquired, released });
    }

    SimulatorReport {
        config,
        backend: stats,
        observed,
        outcome,
        violations,
    }
}
