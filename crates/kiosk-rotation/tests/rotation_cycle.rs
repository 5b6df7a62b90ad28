//! Drives the rotation scheduler on a virtual clock and checks the
//! observable index timeline.

use kiosk_rotation::{Generation, Measurement, RotationDirective, RotationScheduler, RotationTiming};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Kind {
    Settle,
    Snap,
    Advance,
}

/// Minimal timer wheel: one-shot settle/snap and a repeating advance
struct VirtualClock {
    now_ms: u64,
    seq: u64,
    queue: BinaryHeap<Reverse<(u64, u64, Kind, u64)>>,
    advance_period_ms: Option<u64>,
}

impl VirtualClock {
    fn new() -> Self {
        Self {
            now_ms: 0,
            seq: 0,
            queue: BinaryHeap::new(),
            advance_period_ms: None,
        }
    }

    fn arm(&mut self, kind: Kind, after: Duration, generation: Generation) {
        self.seq += 1;
        let at = self.now_ms + u64::try_from(after.as_millis()).unwrap();
        self.queue.push(Reverse((at, self.seq, kind, generation.value())));
    }

    fn apply(&mut self, directive: RotationDirective) {
        match directive {
            RotationDirective::ScheduleSettle { generation, after } => {
                self.arm(Kind::Settle, after, generation);
            }
            RotationDirective::StartAdvancing { generation, every } => {
                self.advance_period_ms = Some(u64::try_from(every.as_millis()).unwrap());
                self.arm(Kind::Advance, every, generation);
            }
            RotationDirective::ScheduleSnap { generation, after } => {
                self.arm(Kind::Snap, after, generation);
            }
            RotationDirective::Idle | RotationDirective::Stale => {}
        }
    }
}

/// Run until `until_ms`, recording (time, index, transition) after each change
fn run(
    scheduler: &mut RotationScheduler,
    clock: &mut VirtualClock,
    measurement: &Measurement,
    until_ms: u64,
) -> Vec<(u64, usize, u64)> {
    let mut timeline = Vec::new();
    while let Some(&Reverse((at, _, kind, gen))) = clock.queue.peek() {
        if at > until_ms {
            break;
        }
        clock.queue.pop();
        clock.now_ms = at;
        let generation = (0..gen).fold(Generation::default(), |g, _| g.next());
        let directive = match kind {
            Kind::Settle => scheduler.apply_measurement(generation, measurement),
            Kind::Advance => {
                if let Some(period) = clock.advance_period_ms {
                    clock.arm(Kind::Advance, Duration::from_millis(period), generation);
                }
                scheduler.advance(generation)
            }
            Kind::Snap => scheduler.snap(generation),
        };
        clock.apply(directive);
        if directive != RotationDirective::Stale {
            let state = scheduler.state();
            timeline.push((at, state.active_index, state.transition_duration_ms));
        }
    }
    timeline
}

#[test]
fn test_four_blocks_first_pass_spans_forty_seconds() {
    let timing = RotationTiming::new(Duration::from_secs(8), Duration::from_secs(2), Duration::ZERO).unwrap();
    let mut scheduler = RotationScheduler::new(timing);
    let mut clock = VirtualClock::new();
    let measurement = Measurement::from_extents(&[300, 300, 300, 300], 800);

    clock.apply(scheduler.reset(4));
    let timeline = run(&mut scheduler, &mut clock, &measurement, 80_000);

    let expected = vec![
        (0, 0, 0),
        (8_000, 1, 2000),
        (16_000, 2, 2000),
        (24_000, 3, 2000),
        (32_000, 4, 2000),
        (34_000, 0, 0),
        (40_000, 1, 2000),
        (48_000, 2, 2000),
        (56_000, 3, 2000),
        (64_000, 4, 2000),
        (66_000, 0, 0),
        (72_000, 1, 2000),
        (80_000, 2, 2000),
    ];
    assert_eq!(timeline, expected);
}

#[test]
fn test_fitting_content_never_arms_advance() {
    let mut scheduler = RotationScheduler::new(RotationTiming::default());
    let mut clock = VirtualClock::new();
    let measurement = Measurement::from_extents(&[150, 150, 150, 150], 800);

    clock.apply(scheduler.reset(4));
    let timeline = run(&mut scheduler, &mut clock, &measurement, 120_000);

    assert_eq!(timeline, vec![(100, 0, 0)]);
    assert!(clock.advance_period_ms.is_none());
    assert!(clock.queue.is_empty());
}

#[test]
fn test_reset_mid_slide_drops_pending_snap() {
    let timing = RotationTiming::new(Duration::from_secs(8), Duration::from_secs(2), Duration::ZERO).unwrap();
    let mut scheduler = RotationScheduler::new(timing);
    let mut clock = VirtualClock::new();
    let overflowing = Measurement::from_extents(&[300; 3], 800);

    clock.apply(scheduler.reset(3));
    // 0 -> settle, 8s -> 1, 16s -> 2, 24s -> 3 (duplicate), snap armed for 26s
    run(&mut scheduler, &mut clock, &overflowing, 25_000);
    assert_eq!(scheduler.state().active_index, 3);

    // new content arrives before the snap fires
    clock.now_ms = 25_000;
    clock.advance_period_ms = None;
    clock.apply(scheduler.reset(3));
    assert_eq!(scheduler.state().active_index, 0);
    assert_eq!(scheduler.state().transition_duration_ms, 0);

    let fitting = Measurement::from_extents(&[100; 3], 800);
    let timeline = run(&mut scheduler, &mut clock, &fitting, 60_000);

    // the old snap and advance fire as stale no-ops; only the settle is visible
    assert_eq!(timeline, vec![(25_000, 0, 0)]);
    assert!(!scheduler.state().loop_enabled);
}
