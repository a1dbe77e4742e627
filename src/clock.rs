//! Wall clock and the re-armable timer used by the engines.

use chrono::{DateTime, Utc};
use tokio::time::{Duration, Instant};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Single-slot timer. Arming replaces any pending deadline, so at most one
/// wake-up is ever outstanding.
///
/// The owner polls it from its `select!` loop through [`Timer::sleep_duration`]
/// and confirms a wake-up with [`Timer::take_due`]. Each arm bumps a generation
/// counter; a wake-up is only honored when the generation observed at sleep
/// time still matches, which discards stale fires after a re-arm.
#[derive(Debug, Default)]
pub struct Timer {
    deadline: Option<Instant>,
    generation: u64,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any pending deadline and arm a new one `after` from `now`.
    pub fn arm(&mut self, now: Instant, after: Duration) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.deadline = Some(now + after);
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time left until the deadline, or None when disarmed.
    pub fn sleep_duration(&self, now: Instant) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(now))
    }

    /// Disarm and return true when the deadline has passed and `generation`
    /// is still current.
    pub fn take_due(&mut self, now: Instant, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
