//! Keep-alive ping while a session is live.
//!
//! One ping per interval, each tick re-arming the next. A failed ping is
//! counted and logged; the next tick tries again.

use super::actions::CheckoutAction;
use super::environment::CheckoutEnvironment;
use super::state::CheckoutState;
use super::Effects;
use crate::api::ApiError;
use boxoffice_core::effect::Effect;
use boxoffice_core::timer::Generation;
use boxoffice_core::{smallvec, SmallVec};
use std::sync::Arc;

/// Starts pinging. Returns `None` when the heartbeat is already running.
pub(super) fn start(
    state: &mut CheckoutState,
    env: &CheckoutEnvironment,
) -> Option<Effect<CheckoutAction>> {
    let generation = state.heartbeat.start()?;
    tracing::debug!(%generation, "Heartbeat started");
    Some(Effect::delay(
        env.config.heartbeat_interval(),
        CheckoutAction::HeartbeatTick { generation },
    ))
}

/// Stops pinging; safe to call when already stopped
pub(super) fn stop(state: &mut CheckoutState) {
    if state.heartbeat.stop() {
        tracing::debug!("Heartbeat stopped");
    }
}

pub(super) fn tick(
    state: &CheckoutState,
    generation: Generation,
    env: &CheckoutEnvironment,
) -> Effects {
    if !state.heartbeat.accepts(generation) {
        tracing::trace!(%generation, "Stale heartbeat tick");
        return SmallVec::new();
    }
    let Some(schedule_id) = state.schedule_id else {
        return SmallVec::new();
    };

    let api = Arc::clone(&env.api);
    smallvec![
        Effect::future(async move {
            Some(match api.ping(schedule_id).await {
                Ok(()) => CheckoutAction::HeartbeatAcked,
                Err(error) => CheckoutAction::HeartbeatFailed { error },
            })
        }),
        Effect::delay(
            env.config.heartbeat_interval(),
            CheckoutAction::HeartbeatTick { generation },
        ),
    ]
}

pub(super) fn acked(state: &mut CheckoutState) -> Effects {
    state.heartbeat_failures = 0;
    SmallVec::new()
}

pub(super) fn failed(state: &mut CheckoutState, error: &ApiError) -> Effects {
    state.heartbeat_failures += 1;
    metrics::counter!("checkout.heartbeat.failed").increment(1);
    tracing::warn!(
        %error,
        consecutive = state.heartbeat_failures,
        "Heartbeat ping failed"
    );
    SmallVec::new()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::testing::env;
    use crate::types::ScheduleId;
    use boxoffice_testing::assertions;

    fn running() -> (CheckoutState, Generation) {
        let mut state = CheckoutState::new(4);
        state.schedule_id = Some(ScheduleId::new(42));
        let generation = state.heartbeat.start().unwrap();
        (state, generation)
    }

    #[test]
    fn second_start_is_a_no_op() {
        let (env, _) = env();
        let mut state = CheckoutState::new(4);
        assert!(start(&mut state, &env).is_some());
        assert!(start(&mut state, &env).is_none());
        assert!(state.heartbeat.is_running());
    }

    #[test]
    fn live_tick_pings_and_rearms() {
        let (env, _) = env();
        let (state, generation) = running();
        let effects = tick(&state, generation, &env);
        assert_eq!(assertions::future_count(&effects), 1);
        assert_eq!(
            assertions::delayed_actions(&effects),
            vec![&CheckoutAction::HeartbeatTick { generation }]
        );
    }

    #[test]
    fn tick_after_stop_does_nothing() {
        let (env, _) = env();
        let (mut state, generation) = running();
        stop(&mut state);
        stop(&mut state);
        assertions::assert_no_effects(&tick(&state, generation, &env));
    }

    #[test]
    fn failures_are_counted_until_an_ack() {
        let (mut state, _) = running();
        failed(&mut state, &ApiError::Network("timeout".to_string()));
        failed(&mut state, &ApiError::Network("timeout".to_string()));
        assert_eq!(state.heartbeat_failures, 2);
        acked(&mut state);
        assert_eq!(state.heartbeat_failures, 0);
        assert!(state.heartbeat.is_running());
    }
}
