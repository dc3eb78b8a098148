//! Waiting-queue admission and session bootstrap.
//!
//! A join is issued at most once per checkout. While waiting, a single
//! poll timer asks for admission; at most one poll is in flight and a
//! failed poll just waits for the next tick. Admission runs the bootstrap
//! chain (session, reservation, seat inventory) as one effect so a partial
//! bootstrap is reported as a single failure.

use super::actions::CheckoutAction;
use super::environment::CheckoutEnvironment;
use super::heartbeat;
use super::reducer::finish;
use super::state::CheckoutState;
use super::step::StepEvent;
use super::Effects;
use crate::api::{AdmissionError, ApiError, BookingApi, ReservationDraft, SessionGrant};
use crate::types::{QueueTicket, ScheduleId, Seat, SeatMap, Step, TerminalOutcome};
use boxoffice_core::effect::Effect;
use boxoffice_core::timer::Generation;
use boxoffice_core::{smallvec, SmallVec};
use std::sync::Arc;

pub(super) fn join(
    state: &mut CheckoutState,
    schedule_id: ScheduleId,
    env: &CheckoutEnvironment,
) -> Effects {
    if state.join_in_flight || state.queue.is_active() || state.step() != Step::Queue {
        tracing::debug!(%schedule_id, "Duplicate queue join ignored");
        return SmallVec::new();
    }

    state.join_in_flight = true;
    state.schedule_id = Some(schedule_id);
    state.last_error = None;
    tracing::info!(%schedule_id, "Joining queue");

    let api = Arc::clone(&env.api);
    smallvec![Effect::future(async move {
        Some(match api.join_queue(schedule_id).await {
            Ok(ticket) => CheckoutAction::QueueJoined { ticket },
            Err(error) => CheckoutAction::QueueJoinFailed {
                error: error.into(),
            },
        })
    })]
}

pub(super) fn joined(
    state: &mut CheckoutState,
    ticket: QueueTicket,
    env: &CheckoutEnvironment,
) -> Effects {
    state.join_in_flight = false;
    state.queue = ticket;

    if ticket.is_admitted() {
        return bootstrap(state, env);
    }

    tracing::info!(position = ?ticket.position, "Waiting in queue");
    match state.queue_poll.start() {
        Some(generation) => smallvec![Effect::delay(
            env.config.queue_poll_interval(),
            CheckoutAction::QueuePollTick { generation },
        )],
        None => SmallVec::new(),
    }
}

pub(super) fn join_failed(
    state: &mut CheckoutState,
    error: &AdmissionError,
    env: &CheckoutEnvironment,
) -> Effects {
    state.join_in_flight = false;
    tracing::warn!(%error, refusal = error.is_admission_refusal(), "Queue join failed");
    finish(
        state,
        TerminalOutcome::Errored {
            reason: error.to_string(),
        },
        env,
    )
}

pub(super) fn poll_tick(
    state: &mut CheckoutState,
    generation: Generation,
    env: &CheckoutEnvironment,
) -> Effects {
    if !state.queue_poll.accepts(generation) {
        tracing::trace!(%generation, "Stale queue poll tick");
        return SmallVec::new();
    }
    let Some(schedule_id) = state.schedule_id else {
        return SmallVec::new();
    };

    let rearm = Effect::delay(
        env.config.queue_poll_interval(),
        CheckoutAction::QueuePollTick { generation },
    );
    if state.poll_in_flight {
        tracing::debug!("Previous admission poll still pending");
        return smallvec![rearm];
    }

    state.poll_in_flight = true;
    let api = Arc::clone(&env.api);
    smallvec![
        Effect::future(async move {
            Some(match api.poll_queue(schedule_id).await {
                Ok(ticket) => CheckoutAction::QueuePolled { ticket },
                Err(error) => CheckoutAction::QueuePollFailed { error },
            })
        }),
        rearm,
    ]
}

pub(super) fn polled(
    state: &mut CheckoutState,
    ticket: QueueTicket,
    env: &CheckoutEnvironment,
) -> Effects {
    state.poll_in_flight = false;
    if !state.queue_poll.is_running() {
        return SmallVec::new();
    }

    state.queue = ticket;
    if ticket.is_admitted() {
        state.queue_poll.stop();
        return bootstrap(state, env);
    }
    tracing::debug!(position = ?ticket.position, "Queue position updated");
    SmallVec::new()
}

pub(super) fn poll_failed(
    state: &mut CheckoutState,
    error: ApiError,
    env: &CheckoutEnvironment,
) -> Effects {
    state.poll_in_flight = false;
    let error = AdmissionError::from(error);
    if error.is_admission_refusal() {
        tracing::warn!(%error, "Admission refused while waiting");
        return finish(
            state,
            TerminalOutcome::Errored {
                reason: error.to_string(),
            },
            env,
        );
    }
    tracing::warn!(%error, "Admission poll failed, retrying on next tick");
    SmallVec::new()
}

fn bootstrap(state: &CheckoutState, env: &CheckoutEnvironment) -> Effects {
    let Some(schedule_id) = state.schedule_id else {
        return SmallVec::new();
    };
    tracing::info!(%schedule_id, "Admitted, starting session");

    let api = Arc::clone(&env.api);
    smallvec![Effect::future(async move {
        Some(run_bootstrap(api.as_ref(), schedule_id).await)
    })]
}

async fn run_bootstrap(api: &dyn BookingApi, schedule_id: ScheduleId) -> CheckoutAction {
    let grant = match api.create_session(schedule_id).await {
        Ok(grant) => grant,
        Err(error) => {
            return CheckoutAction::BootstrapFailed {
                error,
                session_created: false,
            }
        },
    };

    let loaded = async {
        let draft = api.create_reservation(schedule_id).await?;
        let seats = api.fetch_seats(schedule_id).await?;
        Ok::<_, ApiError>((draft, seats))
    }
    .await;

    match loaded {
        Ok((draft, seats)) => CheckoutAction::SessionBootstrapped {
            grant,
            draft,
            seats,
        },
        Err(error) => CheckoutAction::BootstrapFailed {
            error,
            session_created: true,
        },
    }
}

pub(super) fn bootstrapped(
    state: &mut CheckoutState,
    grant: SessionGrant,
    draft: ReservationDraft,
    seats: Vec<Seat>,
    env: &CheckoutEnvironment,
) -> Effects {
    state.session_started = true;
    if let Err(error) = state.step.advance(StepEvent::Admitted) {
        tracing::warn!(%error, "Session bootstrapped outside the queue step");
        return SmallVec::new();
    }

    state.queue = QueueTicket::default();
    state.reservation_id = Some(draft.reservation_id);
    state.performance = draft.performance;
    state.seats = SeatMap::new(seats);
    state.clock.extend_to(grant.expires_at);
    state.clock.refresh(env.clock.now());
    tracing::info!(
        reservation_id = %draft.reservation_id,
        seats = state.seats.len(),
        remaining = %state.clock.display(),
        "Session ready"
    );

    let mut effects = SmallVec::new();
    effects.extend(heartbeat::start(state, env));
    if let Some(generation) = state.clock_tick.start() {
        effects.push(Effect::delay(
            env.config.clock_tick(),
            CheckoutAction::ClockTick { generation },
        ));
    }
    effects
}

pub(super) fn bootstrap_failed(
    state: &mut CheckoutState,
    error: &ApiError,
    session_created: bool,
    env: &CheckoutEnvironment,
) -> Effects {
    state.session_started = session_created;
    tracing::warn!(%error, session_created, "Session bootstrap failed");
    finish(
        state,
        TerminalOutcome::Errored {
            reason: error.to_string(),
        },
        env,
    )
}
