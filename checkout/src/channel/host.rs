//! Host side of the checkout channel.
//!
//! The host opens at most one checkout window, watches it for being closed
//! directly by the user, and turns the first trusted terminal message (or
//! the closure) into a [`TerminalOutcome`].
//!
//! A closed window is not reported at once: the checkout closes its own
//! window right after posting its outcome, so the host gives a message
//! still in transit `close_grace` to arrive before settling on a
//! cancellation.

use super::launch::{CheckoutRequest, LaunchSpec};
use super::message::CheckoutMessage;
use super::origin::Origin;
use super::transport::HostInbox;
use super::window::{CheckoutWindow, WindowLauncher};
use crate::config::Config;
use crate::types::TerminalOutcome;
use boxoffice_core::timer::{Generation, Interval};
use boxoffice_core::{effect::Effect, reducer::Reducer, smallvec, SmallVec};
use boxoffice_macros::Action;
use boxoffice_runtime::Store;
use std::sync::Arc;
use thiserror::Error;

/// Host-side failure shown to the user
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The platform refused to open the checkout window
    #[error("the checkout window was blocked; allow pop-ups for this site and try again")]
    PopupBlocked,
}

/// Actions for the host
#[derive(Action, Clone, Debug)]
pub enum HostAction {
    /// Open the checkout window, or focus the one already open
    #[command]
    OpenCheckout {
        /// What to book
        request: CheckoutRequest,
    },

    /// Bring the open checkout window to the front
    #[command]
    FocusExisting,

    /// Closure check timer
    #[tick]
    WindowPollTick {
        /// Run of the poll timer that armed this tick
        generation: Generation,
    },

    /// The launcher opened the window
    #[event]
    WindowOpened {
        /// Handle to the new window
        window: Arc<dyn CheckoutWindow>,
    },

    /// The launcher could not open the window
    #[event]
    PopupBlocked,

    /// The window was found closed without a message
    #[event]
    WindowClosed,

    /// No message arrived in the grace period after the window closed
    #[tick]
    CloseGraceElapsed {
        /// Run of the grace timer that armed this tick
        generation: Generation,
    },

    /// Something arrived on the channel
    #[event]
    MessageReceived {
        /// Declared sender origin
        origin: Origin,
        /// Raw payload
        data: String,
    },

    /// The checkout is over and its window is closed
    #[event]
    CheckoutFinished {
        /// How it ended
        outcome: TerminalOutcome,
    },
}

/// Host state
#[derive(Clone, Debug)]
pub struct HostState {
    /// The open checkout window
    pub window: Option<Arc<dyn CheckoutWindow>>,
    /// A launch is in progress
    pub opening: bool,
    /// Closure poll timer
    pub poll: Interval,
    /// Running while a closed window waits for a trailing message
    pub grace: Interval,
    /// Outcome of the last checkout
    pub outcome: Option<TerminalOutcome>,
    /// Error shown to the user
    pub last_error: Option<HostError>,
}

impl HostState {
    /// No checkout open
    #[must_use]
    pub const fn new() -> Self {
        Self {
            window: None,
            opening: false,
            poll: Interval::new("window-poll"),
            grace: Interval::new("close-grace"),
            outcome: None,
            last_error: None,
        }
    }

    /// Whether a checkout window is open
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.window.is_some()
    }
}

impl Default for HostState {
    fn default() -> Self {
        Self::new()
    }
}

/// Host dependencies
#[derive(Clone)]
pub struct HostEnvironment {
    /// Opens checkout windows
    pub launcher: Arc<dyn WindowLauncher>,
    /// The host's own origin; messages from anywhere else are dropped
    pub origin: Origin,
    /// Window placement and poll interval
    pub config: Config,
}

impl HostEnvironment {
    /// Environment trusting `config.origin`
    #[must_use]
    pub fn new(launcher: Arc<dyn WindowLauncher>, config: Config) -> Self {
        Self {
            launcher,
            origin: Origin::new(&config.origin),
            config,
        }
    }
}

/// Store running the host reducer
pub type HostStore = Store<HostState, HostAction, HostEnvironment, HostReducer>;

/// Reducer for the host side
#[derive(Clone, Debug, Default)]
pub struct HostReducer;

impl HostReducer {
    /// Creates a new `HostReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn focus(window: &Arc<dyn CheckoutWindow>) -> Effect<HostAction> {
        let window = Arc::clone(window);
        Effect::future(async move {
            window.focus();
            None
        })
    }

    /// Ends the checkout: stops polling, forgets the window and closes it
    fn finish(
        state: &mut HostState,
        outcome: TerminalOutcome,
    ) -> SmallVec<[Effect<HostAction>; 4]> {
        let Some(window) = state.window.take() else {
            return SmallVec::new();
        };
        state.poll.stop();
        state.grace.stop();
        state.outcome = Some(outcome.clone());
        metrics::counter!("checkout.host.finished", "kind" => outcome.kind()).increment(1);
        tracing::info!(outcome = outcome.kind(), "Checkout finished");

        smallvec![Effect::future(async move {
            window.close();
            Some(HostAction::CheckoutFinished { outcome })
        })]
    }
}

impl Reducer for HostReducer {
    type State = HostState;
    type Action = HostAction;
    type Environment = HostEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            HostAction::OpenCheckout { request } => {
                if let Some(window) = &state.window {
                    tracing::debug!("Checkout already open, focusing it");
                    return smallvec![Self::focus(window)];
                }
                if state.opening {
                    return SmallVec::new();
                }

                state.opening = true;
                state.last_error = None;
                let spec = LaunchSpec::new(&request, &env.config.window);
                let launcher = Arc::clone(&env.launcher);
                tracing::info!(schedule_id = %request.schedule_id, url = %spec.url, "Opening checkout");

                smallvec![Effect::future(async move {
                    Some(match launcher.open(&spec) {
                        Some(window) => HostAction::WindowOpened { window },
                        None => HostAction::PopupBlocked,
                    })
                })]
            },

            HostAction::FocusExisting => match &state.window {
                Some(window) => smallvec![Self::focus(window)],
                None => SmallVec::new(),
            },

            HostAction::WindowOpened { window } => {
                state.opening = false;
                state.window = Some(window);
                state.outcome = None;

                match state.poll.start() {
                    Some(generation) => smallvec![Effect::delay(
                        env.config.window_poll_interval(),
                        HostAction::WindowPollTick { generation },
                    )],
                    None => SmallVec::new(),
                }
            },

            HostAction::PopupBlocked => {
                state.opening = false;
                state.last_error = Some(HostError::PopupBlocked);
                metrics::counter!("checkout.host.popup_blocked").increment(1);
                tracing::warn!("Checkout window was blocked");
                SmallVec::new()
            },

            HostAction::WindowPollTick { generation } => {
                if !state.poll.accepts(generation) {
                    tracing::trace!(%generation, "Stale window poll tick");
                    return SmallVec::new();
                }
                let Some(window) = state.window.clone() else {
                    return SmallVec::new();
                };

                smallvec![
                    Effect::future(async move {
                        window.is_closed().then_some(HostAction::WindowClosed)
                    }),
                    Effect::delay(
                        env.config.window_poll_interval(),
                        HostAction::WindowPollTick { generation },
                    ),
                ]
            },

            HostAction::WindowClosed => {
                if state.window.is_none() {
                    return SmallVec::new();
                }
                state.poll.stop();
                match state.grace.start() {
                    Some(generation) => {
                        tracing::debug!("Checkout window closed, waiting for a last message");
                        smallvec![Effect::delay(
                            env.config.close_grace(),
                            HostAction::CloseGraceElapsed { generation },
                        )]
                    },
                    None => SmallVec::new(),
                }
            },

            HostAction::CloseGraceElapsed { generation } => {
                if !state.grace.accepts(generation) {
                    return SmallVec::new();
                }
                tracing::debug!("Checkout window closed without a message");
                Self::finish(state, TerminalOutcome::Cancelled)
            },

            HostAction::MessageReceived { origin, data } => {
                if origin != env.origin {
                    tracing::trace!(%origin, "Dropped message from foreign origin");
                    return SmallVec::new();
                }
                let message = match CheckoutMessage::from_json(&data) {
                    Ok(message) => message,
                    Err(error) => {
                        tracing::debug!(%error, "Dropped malformed checkout message");
                        return SmallVec::new();
                    },
                };
                Self::finish(state, message.into())
            },

            HostAction::CheckoutFinished { .. } => SmallVec::new(),
        }
    }
}

/// Pumps the transport into the host store until either side goes away
pub async fn forward_inbox(mut inbox: HostInbox, store: HostStore) {
    while let Some(inbound) = inbox.recv().await {
        let action = HostAction::MessageReceived {
            origin: inbound.origin,
            data: inbound.data,
        };
        if store.send(action).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::channel::transport::local_channel;
    use crate::types::{Performance, ScheduleId};
    use boxoffice_testing::{assertions, ReducerTest};

    fn env() -> HostEnvironment {
        let channel = local_channel(Origin::new("http://localhost:3000"));
        HostEnvironment::new(channel.launcher, Config::default())
    }

    fn open_state() -> (HostState, Generation) {
        let channel = local_channel(Origin::new("http://localhost:3000"));
        let spec = LaunchSpec::new(
            &CheckoutRequest {
                schedule_id: ScheduleId::new(42),
                performance: Performance::default(),
            },
            &Config::default().window,
        );
        let mut state = HostState::new();
        state.window = channel.launcher.open(&spec);
        let generation = state.poll.start().unwrap();
        (state, generation)
    }

    #[test]
    fn foreign_origin_changes_nothing() {
        let (state, generation) = open_state();
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HostAction::MessageReceived {
                origin: Origin::new("https://evil.example"),
                data: CheckoutMessage::BookingCancelled.to_json().unwrap(),
            })
            .then_state(move |state| {
                assert!(state.is_open());
                assert!(state.poll.accepts(generation));
                assert_eq!(state.outcome, None);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn malformed_message_is_dropped() {
        let (state, _) = open_state();
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HostAction::MessageReceived {
                origin: Origin::new("http://localhost:3000"),
                data: "{\"type\":\"BOOKING_ERROR\"}".to_string(),
            })
            .then_state(|state| {
                assert!(state.is_open());
                assert_eq!(state.outcome, None);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn trusted_message_finishes_and_stops_polling() {
        let (state, generation) = open_state();
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HostAction::MessageReceived {
                origin: Origin::new("http://localhost:3000"),
                data: CheckoutMessage::SessionExpired.to_json().unwrap(),
            })
            .then_state(move |state| {
                assert!(!state.is_open());
                assert!(!state.poll.accepts(generation));
                assert_eq!(state.outcome, Some(TerminalOutcome::Expired));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn closed_window_waits_for_a_last_message() {
        let (state, generation) = open_state();
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HostAction::WindowClosed)
            .then_state(move |state| {
                assert!(state.is_open());
                assert!(state.grace.is_running());
                assert!(!state.poll.accepts(generation));
                assert_eq!(state.outcome, None);
            })
            .then_effects(|effects| {
                assert!(matches!(
                    assertions::delayed_actions(effects)[..],
                    [HostAction::CloseGraceElapsed { .. }]
                ));
            })
            .run();
    }

    #[test]
    fn silent_close_is_a_cancellation() {
        let (mut state, _) = open_state();
        state.poll.stop();
        let generation = state.grace.start().unwrap();
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HostAction::CloseGraceElapsed { generation })
            .then_state(|state| {
                assert!(!state.is_open());
                assert!(!state.grace.is_running());
                assert_eq!(state.outcome, Some(TerminalOutcome::Cancelled));
            })
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[test]
    fn message_during_grace_wins_over_closure() {
        let (mut state, _) = open_state();
        state.poll.stop();
        let generation = state.grace.start().unwrap();
        let reservation_id = crate::types::ReservationId::new();
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HostAction::MessageReceived {
                origin: Origin::new("http://localhost:3000"),
                data: CheckoutMessage::BookingCompleted {
                    reservation_id,
                    booking_number: None,
                }
                .to_json()
                .unwrap(),
            })
            .then_state(move |state| {
                assert!(!state.grace.accepts(generation));
                assert_eq!(
                    state.outcome,
                    Some(TerminalOutcome::Completed {
                        reservation_id,
                        booking_number: None,
                    })
                );
            })
            .run();
    }

    #[test]
    fn stale_poll_tick_is_ignored() {
        let (mut state, generation) = open_state();
        state.poll.stop();
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HostAction::WindowPollTick { generation })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn second_open_focuses_instead() {
        let (state, _) = open_state();
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(HostAction::OpenCheckout {
                request: CheckoutRequest {
                    schedule_id: ScheduleId::new(42),
                    performance: Performance::default(),
                },
            })
            .then_state(|state| assert!(!state.opening))
            .then_effects(|effects| assert_eq!(assertions::future_count(effects), 1))
            .run();
    }

    #[test]
    fn blocked_popup_is_reported() {
        ReducerTest::new(HostReducer::new())
            .with_env(env())
            .given_state(HostState {
                opening: true,
                ..HostState::new()
            })
            .when_action(HostAction::PopupBlocked)
            .then_state(|state| {
                assert!(!state.opening);
                assert_eq!(state.last_error, Some(HostError::PopupBlocked));
            })
            .run();
    }
}
