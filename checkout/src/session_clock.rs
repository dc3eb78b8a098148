//! Remaining time until the hold deadline.
//!
//! The clock is a projection of a single server-issued deadline. It holds
//! no network state and only moves the deadline forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session deadline and its last computed remaining time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClock {
    deadline: Option<DateTime<Utc>>,
    remaining: Duration,
}

impl SessionClock {
    /// Clock with no deadline yet
    #[must_use]
    pub const fn new() -> Self {
        Self {
            deadline: None,
            remaining: Duration::ZERO,
        }
    }

    /// Moves the deadline to `deadline` if that is later.
    ///
    /// Returns whether the deadline changed. An earlier instant is ignored.
    pub fn extend_to(&mut self, deadline: DateTime<Utc>) -> bool {
        match self.deadline {
            Some(current) if current >= deadline => false,
            _ => {
                self.deadline = Some(deadline);
                true
            },
        }
    }

    /// Current deadline
    #[must_use]
    pub const fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    /// Recomputes the displayed remaining time
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Duration {
        self.remaining = self.remaining_at(now);
        self.remaining
    }

    /// Remaining time as of the last [`refresh`](Self::refresh)
    #[must_use]
    pub const fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Time left at `now`; zero without a deadline or once it has passed
    #[must_use]
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        self.deadline
            .and_then(|deadline| (deadline - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Whether a deadline exists and `now` has reached it
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Remaining time as `mm:ss`
    #[must_use]
    pub fn display(&self) -> String {
        let secs = self.remaining.as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    #[test]
    fn no_deadline_never_expires() {
        let clock = SessionClock::new();
        assert!(!clock.is_expired(t0()));
        assert_eq!(clock.remaining_at(t0()), Duration::ZERO);
    }

    #[test]
    fn refresh_counts_down_and_formats() {
        let mut clock = SessionClock::new();
        clock.extend_to(t0() + TimeDelta::seconds(600));
        assert_eq!(clock.refresh(t0()), Duration::from_secs(600));
        assert_eq!(clock.display(), "10:00");
        clock.refresh(t0() + TimeDelta::seconds(535));
        assert_eq!(clock.display(), "01:05");
    }

    #[test]
    fn expires_exactly_at_deadline() {
        let mut clock = SessionClock::new();
        clock.extend_to(t0() + TimeDelta::seconds(10));
        assert!(!clock.is_expired(t0() + TimeDelta::seconds(9)));
        assert!(clock.is_expired(t0() + TimeDelta::seconds(10)));
        assert_eq!(clock.refresh(t0() + TimeDelta::seconds(30)), Duration::ZERO);
    }

    #[test]
    fn earlier_deadline_is_ignored() {
        let mut clock = SessionClock::new();
        assert!(clock.extend_to(t0() + TimeDelta::seconds(600)));
        assert!(!clock.extend_to(t0() + TimeDelta::seconds(300)));
        assert_eq!(clock.deadline(), Some(t0() + TimeDelta::seconds(600)));
    }

    proptest! {
        #[test]
        fn deadline_is_non_decreasing(offsets in prop::collection::vec(-3_600_i64..3_600, 1..50)) {
            let mut clock = SessionClock::new();
            let mut previous = None;
            for offset in offsets {
                clock.extend_to(t0() + TimeDelta::seconds(offset));
                let current = clock.deadline();
                prop_assert!(current >= previous);
                previous = current;
            }
        }
    }
}
