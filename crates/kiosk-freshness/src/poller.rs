//! Freshness poller decision logic
//!
//! Pure state; the session owns the interval timer and the network call and
//! reports back here.

use chrono::{DateTime, Utc};
use kiosk_types::{Fingerprint, FreshnessSignal, ProbeRequest, ProbeResponse, SourceId, TargetId};
use std::fmt::Display;
use std::time::Duration;

/// What to do on a poll tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollAction {
    /// Send this probe
    Probe(ProbeRequest),
    /// Previous probe still outstanding; skip this tick
    SkipOutstanding,
}

/// Interpretation of a probe result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollVerdict {
    /// Observation matches what is displayed
    Unchanged,
    /// Observation changed; start a forced reload
    ReloadRequested(FreshnessSignal),
    /// Observation changed but a reload is already in flight
    ReloadSuppressed(FreshnessSignal),
    /// Probe succeeded without a usable observation
    NoObservation,
    /// Probe failed; the loop carries on
    ProbeFailed(String),
}

impl PollVerdict {
    /// Whether the caller should start a forced reload
    #[inline]
    #[must_use]
    pub fn wants_reload(&self) -> bool {
        matches!(self, Self::ReloadRequested(_))
    }
}

/// Poller statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Ticks seen
    pub ticks: u64,
    /// Probes sent
    pub probes_sent: u64,
    /// Ticks skipped because a probe was outstanding
    pub ticks_skipped: u64,
    /// Probes that failed or returned nothing usable
    pub probe_failures: u64,
    /// Changes detected
    pub changes_detected: u64,
    /// Reloads requested
    pub reloads_requested: u64,
    /// Reloads suppressed by an in-flight load
    pub reloads_suppressed: u64,
}

/// Change detector for one session
#[derive(Debug, Clone)]
pub struct FreshnessPoller {
    interval: Duration,
    probe_in_flight: bool,
    last_signal: Option<FreshnessSignal>,
    stats: PollerStats,
}

impl FreshnessPoller {
    /// Create poller
    #[inline]
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            probe_in_flight: false,
            last_signal: None,
            stats: PollerStats::default(),
        }
    }

    /// Poll tick
    ///
    /// # Arguments
    /// * `target` - Target being displayed
    /// * `source` - Upstream station resolved by the last full load
    pub fn on_tick(&mut self, target: &TargetId, source: Option<&SourceId>) -> PollAction {
        self.stats.ticks += 1;

        if self.probe_in_flight {
            self.stats.ticks_skipped += 1;
            tracing::debug!("Skipping freshness tick for {}: probe outstanding", target);
            return PollAction::SkipOutstanding;
        }

        self.probe_in_flight = true;
        self.stats.probes_sent += 1;
        PollAction::Probe(ProbeRequest {
            target: target.clone(),
            source: source.cloned(),
        })
    }

    /// Probe finished
    ///
    /// # Arguments
    /// * `result` - Probe outcome
    /// * `last_fingerprint` - Fingerprint of the last successful full load
    /// * `load_in_flight` - Whether a full load is currently running
    /// * `observed_at` - When the result arrived
    pub fn on_probe_result<E: Display>(
        &mut self,
        result: Result<ProbeResponse, E>,
        last_fingerprint: Option<&Fingerprint>,
        load_in_flight: bool,
        observed_at: DateTime<Utc>,
    ) -> PollVerdict {
        self.probe_in_flight = false;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.stats.probe_failures += 1;
                tracing::warn!("Freshness probe failed: {}", e);
                return PollVerdict::ProbeFailed(e.to_string());
            }
        };

        let Some(raw) = response.observation() else {
            self.stats.probe_failures += 1;
            tracing::debug!("Freshness probe returned no observation ({:?})", response.status);
            return PollVerdict::NoObservation;
        };

        let signal = FreshnessSignal::new(raw, observed_at);
        self.last_signal = Some(signal.clone());

        if !signal.differs_from(last_fingerprint) {
            return PollVerdict::Unchanged;
        }

        self.stats.changes_detected += 1;
        if load_in_flight {
            self.stats.reloads_suppressed += 1;
            tracing::debug!("New observation detected while a load is in flight; not starting another");
            return PollVerdict::ReloadSuppressed(signal);
        }

        self.stats.reloads_requested += 1;
        tracing::info!("New observation detected, requesting forced reload");
        PollVerdict::ReloadRequested(signal)
    }

    /// Outstanding probe was abandoned (session teardown)
    #[inline]
    pub fn on_probe_abandoned(&mut self) {
        self.probe_in_flight = false;
    }

    /// Poll interval
    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a probe is outstanding
    #[inline]
    #[must_use]
    pub fn probe_in_flight(&self) -> bool {
        self.probe_in_flight
    }

    /// Most recent usable probe observation
    #[inline]
    #[must_use]
    pub fn last_signal(&self) -> Option<&FreshnessSignal> {
        self.last_signal.as_ref()
    }

    /// Statistics so far
    #[inline]
    #[must_use]
    pub fn stats(&self) -> PollerStats {
        self.stats
    }
}

impl Default for FreshnessPoller {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn target() -> TargetId {
        TargetId::new("O69").unwrap()
    }

    fn probe(poller: &mut FreshnessPoller) {
        assert!(matches!(poller.on_tick(&target(), None), PollAction::Probe(_)));
    }

    #[test]
    fn tick_probes_resolved_source() {
        let mut poller = FreshnessPoller::default();
        let source = SourceId::new("KSTS");

        let action = poller.on_tick(&target(), Some(&source));

        assert_eq!(
            action,
            PollAction::Probe(ProbeRequest {
                target: target(),
                source: Some(source),
            })
        );
        assert!(poller.probe_in_flight());
    }

    #[test]
    fn outstanding_probe_skips_tick() {
        let mut poller = FreshnessPoller::default();
        probe(&mut poller);

        assert_eq!(poller.on_tick(&target(), None), PollAction::SkipOutstanding);
        assert_eq!(poller.stats().ticks_skipped, 1);
        assert_eq!(poller.stats().probes_sent, 1);
    }

    #[test]
    fn whitespace_only_difference_is_unchanged() {
        let mut poller = FreshnessPoller::default();
        let last = Fingerprint::from_observation("KSTS 251853Z 00000KT 10SM");
        probe(&mut poller);

        let verdict = poller.on_probe_result::<String>(
            Ok(ProbeResponse::success("KSTS  251853Z\n00000KT 10SM ")),
            Some(&last),
            false,
            Utc::now(),
        );

        assert_eq!(verdict, PollVerdict::Unchanged);
        assert!(!poller.probe_in_flight());
    }

    #[test]
    fn change_requests_reload() {
        let mut poller = FreshnessPoller::default();
        let last = Fingerprint::from_observation("KSTS 251853Z");
        probe(&mut poller);

        let verdict = poller.on_probe_result::<String>(
            Ok(ProbeResponse::success("KSTS 251953Z")),
            Some(&last),
            false,
            Utc::now(),
        );

        assert!(verdict.wants_reload());
        assert_eq!(poller.stats().reloads_requested, 1);
        assert_eq!(
            poller.last_signal().map(|s| s.fingerprint.as_str()),
            Some("KSTS251953Z")
        );
    }

    #[test]
    fn change_during_load_is_suppressed() {
        let mut poller = FreshnessPoller::default();
        probe(&mut poller);

        let verdict = poller.on_probe_result::<String>(
            Ok(ProbeResponse::success("KSTS 251953Z")),
            None,
            true,
            Utc::now(),
        );

        assert!(matches!(verdict, PollVerdict::ReloadSuppressed(_)));
        assert!(!verdict.wants_reload());
        assert_eq!(poller.stats().reloads_suppressed, 1);
    }

    #[test]
    fn failures_are_not_fatal() {
        let mut poller = FreshnessPoller::default();
        probe(&mut poller);

        let verdict = poller.on_probe_result(
            Err::<ProbeResponse, _>("connection reset"),
            None,
            false,
            Utc::now(),
        );
        assert_eq!(verdict, PollVerdict::ProbeFailed("connection reset".to_string()));

        // next tick still probes
        probe(&mut poller);
        let verdict = poller.on_probe_result::<String>(
            Ok(ProbeResponse::unavailable()),
            None,
            false,
            Utc::now(),
        );
        assert_eq!(verdict, PollVerdict::NoObservation);
        assert_eq!(poller.stats().probe_failures, 2);
    }

    #[test]
    fn repeated_change_is_redetected() {
        let mut poller = FreshnessPoller::default();
        let last = Fingerprint::from_observation("KSTS 251853Z");

        for _ in 0..3 {
            probe(&mut poller);
            let verdict = poller.on_probe_result::<String>(
                Ok(ProbeResponse::success("KSTS 251953Z")),
                Some(&last),
                false,
                Utc::now(),
            );
            assert!(verdict.wants_reload());
        }
        assert_eq!(poller.stats().reloads_requested, 3);
    }
}
