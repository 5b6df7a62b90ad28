//! Freshness polling end to end: probes, change detection, forced reloads

use kiosk_core::{ApiError, KioskSettings, SessionHandle, SessionPhase};
use kiosk_test_utils::{bundle, observation, profile, target, Rig};
use kiosk_types::{Fingerprint, SourceId};
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::time::Instant;

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn displayed_fingerprint(handle: &SessionHandle) -> Option<Fingerprint> {
    handle.view().bundle.and_then(|b| b.fingerprint())
}

async fn steady_session(rig: &Rig) -> (SessionHandle, Instant) {
    let start = Instant::now();
    let handle = rig.orchestrator(KioskSettings::default()).init(target(), Some(profile("medium")));
    tokio::time::sleep_until(start + Duration::from_millis(500)).await;
    assert_eq!(handle.view().phase, SessionPhase::Steady);
    (handle, start)
}

#[tokio::test(start_paused = true)]
async fn test_whitespace_only_change_does_not_reload() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;

    rig.api.set_observation("KSTS  151853Z 27008KT   10SM FEW040 18/09 A3002\n");
    tokio::time::sleep_until(start + secs(61)).await;

    assert_eq!(rig.api.probe_requests().len(), 1);
    assert_eq!(rig.api.load_requests().len(), 1);
    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_changed_observation_triggers_single_forced_reload() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;
    let before = displayed_fingerprint(&handle);

    rig.api.set_observation(&observation("151953Z"));
    tokio::time::sleep_until(start + secs(61)).await;

    let loads = rig.api.load_requests();
    assert_eq!(loads.len(), 2);
    assert!(loads[1].force);
    let after = displayed_fingerprint(&handle);
    assert_ne!(after, before);
    assert_eq!(after, Some(Fingerprint::from_observation(&observation("151953Z"))));

    // next probe sees the same observation
    tokio::time::sleep_until(start + secs(121)).await;
    assert_eq!(rig.api.probe_requests().len(), 2);
    assert_eq!(rig.api.load_requests().len(), 2);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_reload_keeps_content_and_retriggers() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;
    let before = displayed_fingerprint(&handle);

    rig.api.set_observation(&observation("151953Z"));
    rig.api.fail_next_loads(1);

    tokio::time::sleep_until(start + secs(61)).await;
    let view = handle.view();
    assert_eq!(rig.api.forced_loads(), 1);
    assert_eq!(view.phase, SessionPhase::Steady);
    assert_eq!(view.sections.len(), 4);
    assert_eq!(displayed_fingerprint(&handle), before);

    tokio::time::sleep_until(start + secs(121)).await;
    assert_eq!(rig.api.forced_loads(), 2);
    assert_eq!(
        displayed_fingerprint(&handle),
        Some(Fingerprint::from_observation(&observation("151953Z")))
    );

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_change_during_inflight_reload_is_suppressed() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;

    rig.api.set_load_latency(secs(90));
    rig.api.set_observation(&observation("151953Z"));

    // reload starts at 60 and runs until 150; the 120 probe still sees a change
    tokio::time::sleep_until(start + secs(130)).await;
    assert_eq!(rig.api.probe_requests().len(), 2);
    assert_eq!(rig.api.load_requests().len(), 2);
    assert!(handle.view().reloading);

    tokio::time::sleep_until(start + secs(185)).await;
    assert!(!handle.view().reloading);
    assert_eq!(rig.api.probe_requests().len(), 3);
    assert_eq!(rig.api.load_requests().len(), 2);
    assert_eq!(rig.api.max_concurrent_loads(), 1);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_probe_targets_resolved_source() {
    let rig = Rig::new(&observation("151853Z"));
    let mut borrowed = bundle(&observation("151853Z"));
    borrowed.raw_data.weather_source = Some(SourceId::new("KO69"));
    rig.api.push_load(Ok(borrowed));

    let (handle, start) = steady_session(&rig).await;
    assert_eq!(handle.view().sections[0].title, "CURRENT WEATHER (KO69)");

    tokio::time::sleep_until(start + secs(61)).await;
    let probes = rig.api.probe_requests();
    assert_eq!(probes.len(), 1);
    assert_eq!(probes[0].target, target());
    assert_eq!(probes[0].source, Some(SourceId::new("KO69")));

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_probe_failure_keeps_polling() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;

    rig.api.fail_next_probe(ApiError::Timeout);
    rig.api.set_observation(&observation("151953Z"));

    tokio::time::sleep_until(start + secs(61)).await;
    assert_eq!(handle.view().phase, SessionPhase::Steady);
    assert_eq!(rig.api.load_requests().len(), 1);

    tokio::time::sleep_until(start + secs(121)).await;
    assert_eq!(rig.api.probe_requests().len(), 2);
    assert_eq!(rig.api.forced_loads(), 1);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_probe_skips_next_tick() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;
    rig.api.set_probe_latency(secs(90));

    // probe sent at 60 answers at 150; the 120 tick is skipped
    tokio::time::sleep_until(start + secs(170)).await;
    assert_eq!(rig.api.probe_requests().len(), 1);

    tokio::time::sleep_until(start + secs(185)).await;
    assert_eq!(rig.api.probe_requests().len(), 2);

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_freshness_check_is_abandoned() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;
    rig.api.set_probe_latency(secs(360_000));

    // the check sent at 60 is given up at 80, so polling is not wedged
    tokio::time::sleep_until(start + secs(90)).await;
    assert_eq!(rig.api.probe_requests().len(), 1);
    assert_eq!(handle.view().phase, SessionPhase::Steady);

    rig.api.set_probe_latency(Duration::ZERO);
    rig.api.set_observation(&observation("151953Z"));
    tokio::time::sleep_until(start + secs(121)).await;
    assert_eq!(rig.api.probe_requests().len(), 2);
    assert_eq!(rig.api.forced_loads(), 1);
    assert_eq!(
        displayed_fingerprint(&handle),
        Some(Fingerprint::from_observation(&observation("151953Z")))
    );

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_reload_is_abandoned_and_retried() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;
    let before = displayed_fingerprint(&handle);

    rig.api.set_load_latency(secs(360_000));
    rig.api.set_observation(&observation("151953Z"));

    // reload sent at 60 is given up at 80 and the old content stays
    tokio::time::sleep_until(start + secs(90)).await;
    let view = handle.view();
    assert_eq!(rig.api.forced_loads(), 1);
    assert!(!view.reloading);
    assert_eq!(view.phase, SessionPhase::Steady);
    assert_eq!(displayed_fingerprint(&handle), before);

    rig.api.set_load_latency(Duration::ZERO);
    tokio::time::sleep_until(start + secs(121)).await;
    assert_eq!(rig.api.forced_loads(), 2);
    assert_eq!(rig.api.max_concurrent_loads(), 1);
    assert_eq!(
        displayed_fingerprint(&handle),
        Some(Fingerprint::from_observation(&observation("151953Z")))
    );

    handle.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_special_observation_is_flagged() {
    let rig = Rig::new(&observation("151853Z"));
    let (handle, start) = steady_session(&rig).await;

    rig.api.set_observation("SPECI KSTS 151912Z 31015G25KT 3SM BR OVC008 14/12 A2998");
    tokio::time::sleep_until(start + secs(61)).await;

    let view = handle.view();
    assert!(view.special_observation);
    assert_eq!(view.observation_time.map(|t| t.to_string()).as_deref(), Some("19:12Z"));

    handle.dispose().await;
}
