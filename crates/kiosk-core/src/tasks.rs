//! Timer and I/O task ownership for one session
//!
//! Every timer is a spawned tokio task that posts a [`TimerFired`] event into
//! the session loop. The registry keeps one handle per [`TimerKind`]; arming a
//! kind again aborts the previous task, and dropping the registry aborts all
//! of them.

use crate::session::SessionEvent;
use kiosk_rotation::Generation;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Timer slots owned by a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Wall clock refresh
    Clock,
    /// Freshness poll
    Poll,
    /// Initial load retry
    RetryLoad,
    /// Rotation settle-then-measure
    Settle,
    /// Rotation advance
    Advance,
    /// Rotation snap back to the first block
    Snap,
}

impl TimerKind {
    /// Whether the timer belongs to the rotation scheduler
    #[inline]
    #[must_use]
    pub fn is_rotation(self) -> bool {
        matches!(self, Self::Settle | Self::Advance | Self::Snap)
    }
}

/// A timer went off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerFired {
    /// Which slot
    pub kind: TimerKind,
    /// Generation the timer was armed under
    pub generation: Generation,
}

/// One-shot and repeating timers keyed by kind
#[derive(Debug)]
pub(crate) struct TimerRegistry {
    events: mpsc::UnboundedSender<SessionEvent>,
    handles: HashMap<TimerKind, JoinHandle<()>>,
}

impl TimerRegistry {
    pub(crate) fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            events,
            handles: HashMap::new(),
        }
    }

    /// Fire once after `after`
    pub(crate) fn once(&mut self, kind: TimerKind, after: Duration, generation: Generation) {
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            time::sleep(after).await;
            let _ = events.send(SessionEvent::Timer(TimerFired { kind, generation }));
        });
        self.replace(kind, handle);
    }

    /// Fire every `period`, first after one full period
    pub(crate) fn every(&mut self, kind: TimerKind, period: Duration, generation: Generation) {
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if events.send(SessionEvent::Timer(TimerFired { kind, generation })).is_err() {
                    break;
                }
            }
        });
        self.replace(kind, handle);
    }

    /// Cancel one slot
    pub(crate) fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.handles.remove(&kind) {
            handle.abort();
        }
    }

    /// Cancel every slot
    pub(crate) fn cancel_all(&mut self) {
        for (kind, handle) in self.handles.drain() {
            tracing::trace!("Cancelling {:?} timer", kind);
            handle.abort();
        }
    }

    /// Whether a slot is armed
    pub(crate) fn is_armed(&self, kind: TimerKind) -> bool {
        self.handles.get(&kind).is_some_and(|h| !h.is_finished())
    }

    fn replace(&mut self, kind: TimerKind, handle: JoinHandle<()>) {
        if let Some(previous) = self.handles.insert(kind, handle) {
            previous.abort();
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// In-flight network calls
#[derive(Debug, Default)]
pub(crate) struct IoTasks {
    handles: Vec<JoinHandle<()>>,
}

impl IoTasks {
    pub(crate) fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(tokio::spawn(future));
    }

    /// Abort everything still running; returns how many were cut off
    pub(crate) fn abort_all(&mut self) -> usize {
        let mut aborted = 0;
        for handle in self.handles.drain(..) {
            if !handle.is_finished() {
                aborted += 1;
            }
            handle.abort();
        }
        aborted
    }
}

impl Drop for IoTasks {
    fn drop(&mut self) {
        self.abort_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn fired(event: SessionEvent) -> TimerFired {
        match event {
            SessionEvent::Timer(fired) => fired,
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn once_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerRegistry::new(tx);
        let generation = Generation::default().next();

        timers.once(TimerKind::Snap, Duration::from_secs(2), generation);
        let start = Instant::now();
        let event = fired(rx.recv().await.unwrap());

        assert_eq!(event, TimerFired { kind: TimerKind::Snap, generation });
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn every_repeats_on_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerRegistry::new(tx);
        let start = Instant::now();

        timers.every(TimerKind::Advance, Duration::from_secs(8), Generation::default());
        for n in 1..=3u32 {
            let event = fired(rx.recv().await.unwrap());
            assert_eq!(event.kind, TimerKind::Advance);
            assert_eq!(start.elapsed(), Duration::from_secs(8) * n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_previous_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerRegistry::new(tx);
        let old = Generation::default();
        let new = old.next();

        timers.once(TimerKind::Settle, Duration::from_millis(100), old);
        timers.once(TimerKind::Settle, Duration::from_millis(100), new);

        assert_eq!(fired(rx.recv().await.unwrap()).generation, new);
        time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_silences_everything() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timers = TimerRegistry::new(tx);

        timers.every(TimerKind::Clock, Duration::from_secs(1), Generation::default());
        timers.once(TimerKind::RetryLoad, Duration::from_secs(2), Generation::default());
        assert!(timers.is_armed(TimerKind::Clock));

        timers.cancel_all();
        time::sleep(Duration::from_secs(5)).await;

        assert!(rx.try_recv().is_err());
        assert!(!timers.is_armed(TimerKind::Clock));
    }

    #[tokio::test]
    async fn abort_all_counts_running_tasks() {
        let mut io = IoTasks::default();
        io.spawn(std::future::pending::<()>());
        io.spawn(async {});
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert_eq!(io.abort_all(), 1);
        assert_eq!(io.abort_all(), 0);
    }

    #[test]
    fn rotation_kinds() {
        assert!(TimerKind::Snap.is_rotation());
        assert!(!TimerKind::Poll.is_rotation());
    }
}
