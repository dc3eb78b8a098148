//! Configuration for the checkout orchestrator.
//!
//! Loads configuration from `CHECKOUT_*` environment variables with defaults
//! matching the production booking site.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The heartbeat would let the server reclaim a live session
    #[error("heartbeat interval {heartbeat_ms}ms must be shorter than the session reclaim window {reclaim_ms}ms")]
    HeartbeatTooSlow {
        /// Configured heartbeat interval
        heartbeat_ms: u64,
        /// Configured reclaim window
        reclaim_ms: u64,
    },

    /// A timer interval of zero would spin
    #[error("{name} must be greater than zero")]
    ZeroInterval {
        /// Offending setting
        name: &'static str,
    },

    /// The selection cap must allow at least one seat
    #[error("max seats must be at least 1")]
    NoSeatsAllowed,

    /// The checkout window does not fit on the screen
    #[error("checkout window {width}x{height} does not fit the screen")]
    WindowTooLarge {
        /// Window width
        width: u32,
        /// Window height
        height: u32,
    },
}

/// Timer intervals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Queue admission poll interval in milliseconds (default: 10000)
    pub queue_poll_ms: u64,
    /// Heartbeat ping interval in milliseconds (default: 30000)
    pub heartbeat_ms: u64,
    /// Server-side session reclaim window in milliseconds (default: 60000)
    pub session_reclaim_ms: u64,
    /// Session clock display tick in milliseconds (default: 1000)
    pub clock_tick_ms: u64,
    /// Host-side checkout window closure poll in milliseconds (default: 500)
    pub window_poll_ms: u64,
    /// How long the host waits for a last message after seeing the window
    /// closed, in milliseconds (default: 1000)
    pub close_grace_ms: u64,
}

/// Checkout window placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Page opened in the checkout window
    pub checkout_url: String,
    /// Window width (default: 900)
    pub width: u32,
    /// Window height (default: 780)
    pub height: u32,
    /// Screen width used for centering (default: 1920)
    pub screen_width: u32,
    /// Screen height used for centering (default: 1080)
    pub screen_height: u32,
}

/// Orchestrator configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Timer intervals
    pub timing: TimingConfig,
    /// Maximum number of seats in one selection (default: 4)
    pub max_seats: usize,
    /// Origin shared by host and checkout windows
    pub origin: String,
    /// Checkout window placement
    pub window: WindowConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timing: TimingConfig {
                queue_poll_ms: 10_000,
                heartbeat_ms: 30_000,
                session_reclaim_ms: 60_000,
                clock_tick_ms: 1_000,
                window_poll_ms: 500,
                close_grace_ms: 1_000,
            },
            max_seats: 4,
            origin: "http://localhost:3000".to_string(),
            window: WindowConfig {
                checkout_url: "http://localhost:3000/booking/checkout".to_string(),
                width: 900,
                height: 780,
                screen_width: 1920,
                screen_height: 1080,
            },
        }
    }
}

fn var_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults; call
    /// [`Config::validate`] before use.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            timing: TimingConfig {
                queue_poll_ms: var_or("CHECKOUT_QUEUE_POLL_MS", defaults.timing.queue_poll_ms),
                heartbeat_ms: var_or("CHECKOUT_HEARTBEAT_MS", defaults.timing.heartbeat_ms),
                session_reclaim_ms: var_or(
                    "CHECKOUT_SESSION_RECLAIM_MS",
                    defaults.timing.session_reclaim_ms,
                ),
                clock_tick_ms: var_or("CHECKOUT_CLOCK_TICK_MS", defaults.timing.clock_tick_ms),
                window_poll_ms: var_or("CHECKOUT_WINDOW_POLL_MS", defaults.timing.window_poll_ms),
                close_grace_ms: var_or("CHECKOUT_CLOSE_GRACE_MS", defaults.timing.close_grace_ms),
            },
            max_seats: var_or("CHECKOUT_MAX_SEATS", defaults.max_seats),
            origin: env::var("CHECKOUT_ORIGIN").unwrap_or(defaults.origin),
            window: WindowConfig {
                checkout_url: env::var("CHECKOUT_URL").unwrap_or(defaults.window.checkout_url),
                width: var_or("CHECKOUT_WINDOW_WIDTH", defaults.window.width),
                height: var_or("CHECKOUT_WINDOW_HEIGHT", defaults.window.height),
                screen_width: var_or("CHECKOUT_SCREEN_WIDTH", defaults.window.screen_width),
                screen_height: var_or("CHECKOUT_SCREEN_HEIGHT", defaults.window.screen_height),
            },
        }
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an interval is zero, the heartbeat is not
    /// strictly shorter than the reclaim window, the seat cap is zero, or
    /// the window is larger than the screen.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("queue poll interval", self.timing.queue_poll_ms),
            ("heartbeat interval", self.timing.heartbeat_ms),
            ("clock tick", self.timing.clock_tick_ms),
            ("window poll interval", self.timing.window_poll_ms),
            ("window close grace", self.timing.close_grace_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, ms)| *ms == 0) {
            return Err(ConfigError::ZeroInterval { name: *name });
        }

        if self.timing.heartbeat_ms >= self.timing.session_reclaim_ms {
            return Err(ConfigError::HeartbeatTooSlow {
                heartbeat_ms: self.timing.heartbeat_ms,
                reclaim_ms: self.timing.session_reclaim_ms,
            });
        }

        if self.max_seats == 0 {
            return Err(ConfigError::NoSeatsAllowed);
        }

        if self.window.width > self.window.screen_width
            || self.window.height > self.window.screen_height
        {
            return Err(ConfigError::WindowTooLarge {
                width: self.window.width,
                height: self.window.height,
            });
        }

        Ok(())
    }

    /// Queue admission poll interval
    #[must_use]
    pub const fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.timing.queue_poll_ms)
    }

    /// Heartbeat ping interval
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.timing.heartbeat_ms)
    }

    /// Session clock tick
    #[must_use]
    pub const fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.timing.clock_tick_ms)
    }

    /// Checkout window closure poll interval
    #[must_use]
    pub const fn window_poll_interval(&self) -> Duration {
        Duration::from_millis(self.timing.window_poll_ms)
    }

    /// Wait for a trailing message once the checkout window is seen closed
    #[must_use]
    pub const fn close_grace(&self) -> Duration {
        Duration::from_millis(self.timing.close_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.queue_poll_interval(), Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.window_poll_interval(), Duration::from_millis(500));
        assert_eq!(config.close_grace(), Duration::from_secs(1));
        assert_eq!(config.max_seats, 4);
    }

    #[test]
    fn heartbeat_must_beat_reclaim_window() {
        let mut config = Config::default();
        config.timing.heartbeat_ms = config.timing.session_reclaim_ms;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::HeartbeatTooSlow { .. })
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = Config::default();
        config.timing.window_poll_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval {
                name: "window poll interval"
            })
        );
    }

    #[test]
    fn window_must_fit_screen() {
        let mut config = Config::default();
        config.window.width = 2000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::WindowTooLarge { width: 2000, .. })
        ));
    }
}
