//! Sliding inactivity window for the monitored channel.

use chrono::{DateTime, Utc};

/// Result of feeding one qualifying message into the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The author already holds the marker; the window was left untouched.
    CurrentHolder,
    /// The chat was still alive. The deadline moved to `next_deadline`.
    Alive { next_deadline: DateTime<Utc> },
    /// The chat was dead and this message revived it.
    Revived { next_deadline: DateTime<Utc> },
}

/// Tracks when the channel next counts as dead.
///
/// Every qualifying message pushes the deadline to its own timestamp plus the
/// window length, so the window slides rather than resetting on revivals only.
#[derive(Debug, Clone)]
pub struct RevivalWindow {
    revive_deadline: DateTime<Utc>,
    window_length: chrono::Duration,
}

impl RevivalWindow {
    /// A fresh window requires one full window of silence from `start`
    /// before the first revival.
    pub fn new(start: DateTime<Utc>, window_length: chrono::Duration) -> Self {
        Self {
            revive_deadline: deadline_after(start, window_length),
            window_length,
        }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.revive_deadline
    }

    pub fn window_length(&self) -> chrono::Duration {
        self.window_length
    }

    pub fn observe(&mut self, author_holds_marker: bool, timestamp: DateTime<Utc>) -> Transition {
        if author_holds_marker {
            return Transition::CurrentHolder;
        }

        let was_dead = timestamp >= self.revive_deadline;
        self.revive_deadline = deadline_after(timestamp, self.window_length);

        if was_dead {
            Transition::Revived {
                next_deadline: self.revive_deadline,
            }
        } else {
            Transition::Alive {
                next_deadline: self.revive_deadline,
            }
        }
    }
}

/// Saturates at the latest representable instant instead of overflowing.
fn deadline_after(timestamp: DateTime<Utc>, window_length: chrono::Duration) -> DateTime<Utc> {
    timestamp
        .checked_add_signed(window_length)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::{RevivalWindow, Transition};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    /// 15 minute window whose last activity was at `t0()`.
    fn window_last_active_at_t0() -> RevivalWindow {
        RevivalWindow::new(t0(), Duration::minutes(15))
    }

    #[test]
    fn initial_deadline_is_one_window_after_start() {
        let window = window_last_active_at_t0();
        assert_eq!(window.deadline(), t0() + Duration::minutes(15));
        assert_eq!(window.window_length(), Duration::minutes(15));
    }

    #[test]
    fn message_after_deadline_revives() {
        let mut window = window_last_active_at_t0();
        let transition = window.observe(false, t0() + Duration::minutes(20));

        assert_eq!(
            transition,
            Transition::Revived {
                next_deadline: t0() + Duration::minutes(35)
            }
        );
        assert_eq!(window.deadline(), t0() + Duration::minutes(35));
    }

    #[test]
    fn message_before_deadline_slides_window() {
        let mut window = window_last_active_at_t0();
        let transition = window.observe(false, t0() + Duration::minutes(5));

        assert_eq!(
            transition,
            Transition::Alive {
                next_deadline: t0() + Duration::minutes(20)
            }
        );
        assert_eq!(window.deadline(), t0() + Duration::minutes(20));
    }

    #[test]
    fn sliding_window_postpones_revival() {
        let mut window = window_last_active_at_t0();

        // Each message lands inside the window pushed out by the previous one.
        for minutes in [10, 20, 30, 40] {
            assert!(matches!(
                window.observe(false, t0() + Duration::minutes(minutes)),
                Transition::Alive { .. }
            ));
        }
        assert!(matches!(
            window.observe(false, t0() + Duration::minutes(55)),
            Transition::Revived { .. }
        ));
    }

    #[test]
    fn message_exactly_at_deadline_revives() {
        let mut window = window_last_active_at_t0();
        assert!(matches!(
            window.observe(false, t0() + Duration::minutes(15)),
            Transition::Revived { .. }
        ));
    }

    #[test]
    fn current_holder_leaves_deadline_untouched() {
        let mut window = window_last_active_at_t0();
        let transition = window.observe(true, t0() + Duration::hours(3));

        assert_eq!(transition, Transition::CurrentHolder);
        assert_eq!(window.deadline(), t0() + Duration::minutes(15));
    }

    #[test]
    fn back_to_back_messages_revive_once() {
        let mut window = window_last_active_at_t0();
        let revived_at = t0() + Duration::minutes(30);

        assert!(matches!(window.observe(false, revived_at), Transition::Revived { .. }));
        assert!(matches!(window.observe(false, revived_at), Transition::Alive { .. }));
    }

    #[test]
    fn oversized_window_saturates() {
        let mut window = RevivalWindow::new(t0(), Duration::weeks(52 * 1_000_000));
        assert_eq!(window.deadline(), DateTime::<Utc>::MAX_UTC);

        let transition = window.observe(false, t0() + Duration::minutes(1));
        assert_eq!(
            transition,
            Transition::Alive {
                next_deadline: DateTime::<Utc>::MAX_UTC
            }
        );
    }
}
