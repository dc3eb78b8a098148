//! Lifecycle for recurring timers built from `Effect::Delay`.
//!
//! A reducer cannot cancel a `Delay` that the runtime already scheduled.
//! Instead every run of an [`Interval`] gets a fresh [`Generation`]; each
//! tick action carries the generation it was armed with, and the reducer
//! drops ticks whose generation is not the live one. Stopping an interval
//! therefore takes effect immediately, even if a tick is already in flight.
//!
//! ```
//! use boxoffice_core::timer::Interval;
//!
//! let mut heartbeat = Interval::new("heartbeat");
//! let generation = heartbeat.start().unwrap();
//! assert!(heartbeat.start().is_none()); // already running
//! assert!(heartbeat.accepts(generation));
//!
//! heartbeat.stop();
//! assert!(!heartbeat.accepts(generation)); // late tick is ignored
//! assert!(!heartbeat.stop()); // stopping twice is harmless
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one run of an [`Interval`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Start/stop state of a recurring timer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interval {
    name: &'static str,
    next: u64,
    active: Option<Generation>,
}

impl Interval {
    /// Creates a stopped interval
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            next: 0,
            active: None,
        }
    }

    /// Name used in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Starts a new run.
    ///
    /// Returns `None` when the interval is already running, so a second
    /// start never produces a second tick chain.
    pub fn start(&mut self) -> Option<Generation> {
        if self.active.is_some() {
            return None;
        }
        self.next += 1;
        let generation = Generation(self.next);
        self.active = Some(generation);
        Some(generation)
    }

    /// Stops the current run. Returns whether anything was running.
    pub fn stop(&mut self) -> bool {
        self.active.take().is_some()
    }

    /// Whether a tick armed with `generation` belongs to the live run
    #[must_use]
    pub fn accepts(&self, generation: Generation) -> bool {
        self.active == Some(generation)
    }

    /// Whether the interval is running
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Generation of the live run, if any
    #[must_use]
    pub const fn current(&self) -> Option<Generation> {
        self.active
    }
}
