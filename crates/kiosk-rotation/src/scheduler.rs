//! Rotation state machine
//!
//! Phases:
//! - `Settling`: content or viewport just changed; index and transition are
//!   zeroed and a measurement is pending
//! - `Disabled`: everything fits (or there is at most one block); index 0
//!   forever, no timers
//! - `Enabled`: blocks rotate through N+1 positions, the last being a copy
//!   of the first. Each advance slides with the transition length; reaching
//!   the copy schedules a zero-length snap back to position 0, which is
//!   invisible because both positions show the same block
//! - `Disposed`: the owning session has ended
//!
//! Timers are owned by the caller. A directive names the generation it was
//! issued under and the caller hands that generation back when the timer
//! fires. Every reset bumps the generation, so timers armed against old
//! content turn into no-ops instead of moving the new content.

use crate::error::TimingError;
use crate::measurer::Measurement;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Monotonic tag identifying one content/viewport epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    /// Following generation
    #[inline]
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Raw counter value
    #[inline]
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Rotation cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationTiming {
    advance_period: Duration,
    transition: Duration,
    settle_delay: Duration,
}

impl RotationTiming {
    /// Create timing
    ///
    /// # Errors
    /// - `TimingError::Zero` if the period or transition is zero
    /// - `TimingError::TransitionTooLong` if the slide would outlast the period
    pub fn new(
        advance_period: Duration,
        transition: Duration,
        settle_delay: Duration,
    ) -> Result<Self, TimingError> {
        if advance_period.is_zero() {
            return Err(TimingError::Zero("advance period"));
        }
        if transition.is_zero() {
            return Err(TimingError::Zero("transition"));
        }
        if transition >= advance_period {
            return Err(TimingError::TransitionTooLong {
                transition_ms: duration_ms(transition),
                period_ms: duration_ms(advance_period),
            });
        }
        Ok(Self {
            advance_period,
            transition,
            settle_delay,
        })
    }

    /// Time between advances
    #[inline]
    #[must_use]
    pub fn advance_period(&self) -> Duration {
        self.advance_period
    }

    /// Length of one slide
    #[inline]
    #[must_use]
    pub fn transition(&self) -> Duration {
        self.transition
    }

    /// Delay between a content change and its measurement
    #[inline]
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }
}

impl Default for RotationTiming {
    fn default() -> Self {
        Self {
            advance_period: Duration::from_secs(8),
            transition: Duration::from_secs(2),
            settle_delay: Duration::from_millis(100),
        }
    }
}

/// What the renderer needs to position the content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationState {
    /// Position currently shown
    pub active_index: usize,
    /// Animation length for the move into `active_index`
    pub transition_duration_ms: u64,
    /// Offset of every position, duplicate included when looping
    pub offsets: Vec<u32>,
    /// Whether the duplicate block is rendered and the loop runs
    pub loop_enabled: bool,
}

impl RotationState {
    /// Offset to translate the content by
    #[inline]
    #[must_use]
    pub fn current_offset(&self) -> u32 {
        self.offsets.get(self.active_index).copied().unwrap_or(0)
    }

    /// Number of rendered positions
    #[inline]
    #[must_use]
    pub fn position_count(&self) -> usize {
        self.offsets.len()
    }

    /// Whether the duplicate block is showing
    #[inline]
    #[must_use]
    pub fn at_duplicate(&self) -> bool {
        self.loop_enabled && self.active_index + 1 == self.offsets.len()
    }
}

/// Scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationPhase {
    /// Waiting for a measurement
    Settling,
    /// Content fits; nothing moves
    Disabled,
    /// Content rotates
    Enabled,
    /// Owning session ended
    Disposed,
}

/// Timer work the caller must arrange after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDirective {
    /// Nothing to schedule
    Idle,
    /// The timer belonged to an older generation and was ignored
    Stale,
    /// Measure after the content settles
    ScheduleSettle {
        /// Generation to hand back
        generation: Generation,
        /// Delay before measuring
        after: Duration,
    },
    /// Start the repeating advance timer
    StartAdvancing {
        /// Generation to hand back
        generation: Generation,
        /// Period of the timer
        every: Duration,
    },
    /// Arm the one-shot snap timer
    ScheduleSnap {
        /// Generation to hand back
        generation: Generation,
        /// Delay before snapping
        after: Duration,
    },
}

/// Active-index state machine
#[derive(Debug, Clone)]
pub struct RotationScheduler {
    timing: RotationTiming,
    state: RotationState,
    generation: Generation,
    phase: RotationPhase,
    section_count: usize,
}

impl RotationScheduler {
    /// Create scheduler with no content
    #[must_use]
    pub fn new(timing: RotationTiming) -> Self {
        Self {
            timing,
            state: RotationState::default(),
            generation: Generation::default(),
            phase: RotationPhase::Disabled,
            section_count: 0,
        }
    }

    /// Content or viewport changed
    ///
    /// Zeroes index and transition immediately and invalidates every timer of
    /// the previous generation. The caller must cancel its rotation timers
    /// and arm the returned settle timer.
    pub fn reset(&mut self, section_count: usize) -> RotationDirective {
        if self.phase == RotationPhase::Disposed {
            return RotationDirective::Idle;
        }

        self.generation = self.generation.next();
        self.state = RotationState::default();
        self.section_count = section_count;
        self.phase = RotationPhase::Settling;

        tracing::debug!(
            "Rotation reset for {} sections ({})",
            section_count,
            self.generation
        );

        RotationDirective::ScheduleSettle {
            generation: self.generation,
            after: self.timing.settle_delay,
        }
    }

    /// Apply a measurement taken after the settle delay
    ///
    /// Decides between the enabled and disabled phases. Rotation needs more
    /// than one block: a single duplicated block would show no motion.
    pub fn apply_measurement(
        &mut self,
        generation: Generation,
        measurement: &Measurement,
    ) -> RotationDirective {
        if self.is_stale(generation) || self.phase != RotationPhase::Settling {
            return RotationDirective::Stale;
        }

        let loop_enabled = measurement.overflow && self.section_count > 1;
        self.state = RotationState {
            active_index: 0,
            transition_duration_ms: 0,
            offsets: if loop_enabled {
                measurement.loop_offsets()
            } else {
                measurement.offsets.clone()
            },
            loop_enabled,
        };

        if loop_enabled {
            self.phase = RotationPhase::Enabled;
            tracing::info!(
                "Rotation enabled: {} positions every {:?}",
                self.state.position_count(),
                self.timing.advance_period
            );
            RotationDirective::StartAdvancing {
                generation,
                every: self.timing.advance_period,
            }
        } else {
            self.phase = RotationPhase::Disabled;
            tracing::debug!("Rotation disabled: content fits");
            RotationDirective::Idle
        }
    }

    /// Advance timer fired
    ///
    /// Slides to the next position. Entering the duplicate arms the snap.
    pub fn advance(&mut self, generation: Generation) -> RotationDirective {
        if self.is_stale(generation) || self.phase != RotationPhase::Enabled {
            return RotationDirective::Stale;
        }

        let positions = self.state.position_count();
        let next = self.state.active_index + 1;
        self.state.active_index = if next >= positions { 0 } else { next };
        self.state.transition_duration_ms = duration_ms(self.timing.transition);

        if self.state.at_duplicate() {
            RotationDirective::ScheduleSnap {
                generation,
                after: self.timing.transition,
            }
        } else {
            RotationDirective::Idle
        }
    }

    /// Snap timer fired
    ///
    /// Jumps from the duplicate back to position 0 without animation.
    pub fn snap(&mut self, generation: Generation) -> RotationDirective {
        if self.is_stale(generation) || self.phase != RotationPhase::Enabled {
            return RotationDirective::Stale;
        }

        if self.state.at_duplicate() {
            self.state.active_index = 0;
            self.state.transition_duration_ms = 0;
            tracing::trace!("Rotation snapped to start ({})", generation);
        }
        RotationDirective::Idle
    }

    /// Owning session ended; outstanding timers become no-ops
    pub fn invalidate(&mut self) {
        self.generation = self.generation.next();
        self.phase = RotationPhase::Disposed;
    }

    /// Whether a timer generation is out of date
    #[inline]
    #[must_use]
    pub fn is_stale(&self, generation: Generation) -> bool {
        generation != self.generation
    }

    /// Items to draw: the unique ones, plus a copy of the first when looping
    #[must_use]
    pub fn render_sequence<'a, T>(&self, items: &'a [T]) -> Vec<&'a T> {
        let mut sequence: Vec<&T> = items.iter().collect();
        if self.state.loop_enabled {
            if let Some(first) = items.first() {
                sequence.push(first);
            }
        }
        sequence
    }

    /// Current rotation state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &RotationState {
        &self.state
    }

    /// Current generation
    #[inline]
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> RotationPhase {
        self.phase
    }

    /// Cadence in use
    #[inline]
    #[must_use]
    pub fn timing(&self) -> &RotationTiming {
        &self.timing
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
