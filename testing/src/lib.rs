//! # Boxoffice Testing
//!
//! Testing utilities and helpers for the boxoffice reducer architecture.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `TestClock`)
//! - The `ReducerTest` Given/When/Then harness
//! - Assertion and inspection helpers for returned effects
//!
//! ## Example
//!
//! ```ignore
//! use boxoffice_testing::{ReducerTest, TestClock};
//!
//! let clock = TestClock::default();
//! ReducerTest::new(CheckoutReducer::new())
//!     .with_env(test_env(&clock))
//!     .given_state(state_in_seats())
//!     .when_action(CheckoutAction::SelectSeat { seat_id: SeatId::new(101) })
//!     .then_state(|state| assert_eq!(state.selection().len(), 1))
//!     .run();
//! ```

use boxoffice_core::environment::Clock;
use chrono::{DateTime, Utc};


/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use boxoffice_testing::mocks::FixedClock;
    /// use boxoffice_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Manually advanced clock
    ///
    /// Clones share the same time, so a test keeps one handle and gives
    /// another to the environment under test.
    ///
    /// ```
    /// use boxoffice_testing::mocks::TestClock;
    /// use boxoffice_core::environment::Clock;
    /// use std::time::Duration;
    ///
    /// let clock = TestClock::default();
    /// let start = clock.now();
    /// clock.advance(Duration::from_secs(600));
    /// assert_eq!((clock.now() - start).num_seconds(), 600);
    /// ```
    #[derive(Debug, Clone)]
    pub struct TestClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl TestClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move time forward
        pub fn advance(&self, by: std::time::Duration) {
            let by = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new(epoch())
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// 2025-01-01 00:00:00 UTC, the start time of every test clock
    #[must_use]
    pub fn epoch() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }
}

// Re-export commonly used items
pub use mocks::{epoch, test_clock, FixedClock, TestClock};
pub use reducer_test::{assertions, ReducerTest};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), epoch());
    }

    #[test]
    fn test_clock_clones_share_time() {
        let clock = TestClock::default();
        let env_copy = clock.clone();
        clock.advance(Duration::from_secs(90));
        assert_eq!((env_copy.now() - epoch()).num_seconds(), 90);
    }
}
