//! The checkout reducer.
//!
//! Dispatches every action to the queue, hold and heartbeat handlers, owns
//! the delivery and payment steps, and runs the single closing path shared
//! by cancel, fatal errors, expiry and completion.

use super::actions::CheckoutAction;
use super::environment::CheckoutEnvironment;
use super::state::CheckoutState;
use super::step::StepEvent;
use super::{heartbeat, hold, queue, Effects};
use crate::api::ApiError;
use crate::channel::CheckoutMessage;
use crate::payment::{PaymentOutcome, PaymentRequest};
use crate::types::{DeliveryMethod, Recipient, ScheduleId, SeatStatus, Step, TerminalOutcome};
use boxoffice_core::effect::Effect;
use boxoffice_core::reducer::Reducer;
use boxoffice_core::{smallvec, SmallVec};
use std::sync::Arc;

/// Reducer for one checkout process
#[derive(Clone, Debug, Default)]
pub struct CheckoutReducer;

impl CheckoutReducer {
    /// Creates a new `CheckoutReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Handles actions arriving after the checkout ended.
    ///
    /// Nothing changes state any more. Server-side leftovers from requests
    /// that were in flight at close are cleaned up.
    fn after_close(
        state: &CheckoutState,
        action: CheckoutAction,
        env: &CheckoutEnvironment,
    ) -> Effects {
        match action {
            CheckoutAction::HoldResolved { response } if !response.held.is_empty() => {
                let Some(reservation_id) = state.reservation_id else {
                    return SmallVec::new();
                };
                tracing::info!(seats = ?response.held, "Releasing seats held after close");
                let api = Arc::clone(&env.api);
                smallvec![Effect::future(async move {
                    if let Err(error) = api.release_seats(reservation_id, &response.held).await {
                        tracing::warn!(%error, "Late release failed");
                    }
                    None
                })]
            },
            CheckoutAction::SessionBootstrapped { .. }
            | CheckoutAction::BootstrapFailed {
                session_created: true,
                ..
            } => match state.schedule_id {
                Some(schedule_id) => {
                    tracing::info!(%schedule_id, "Leaving session created after close");
                    smallvec![leave(env, schedule_id)]
                },
                None => SmallVec::new(),
            },
            other => {
                tracing::trace!(action = other.name(), step = %state.step(), "Ignored after close");
                SmallVec::new()
            },
        }
    }

    fn cancel(state: &mut CheckoutState, env: &CheckoutEnvironment) -> Effects {
        tracing::info!(step = %state.step(), "Checkout cancelled");
        finish(state, TerminalOutcome::Cancelled, env)
    }

    fn save_delivery(
        state: &mut CheckoutState,
        method: DeliveryMethod,
        recipient: Recipient,
        env: &CheckoutEnvironment,
    ) -> Effects {
        if state.step() != Step::Delivery || state.delivery_in_flight || state.release_in_flight {
            return SmallVec::new();
        }
        let Some(reservation_id) = state.reservation_id else {
            return SmallVec::new();
        };
        if let Err(error) = recipient.validate(method) {
            state.last_error = Some(error.to_string());
            return SmallVec::new();
        }

        state.delivery_in_flight = true;
        state.last_error = None;
        let api = Arc::clone(&env.api);
        smallvec![Effect::future(async move {
            Some(
                match api.save_delivery(reservation_id, method, &recipient).await {
                    Ok(()) => CheckoutAction::DeliverySaved { method, recipient },
                    Err(error) => CheckoutAction::DeliveryFailed { error },
                },
            )
        })]
    }

    fn delivery_saved(
        state: &mut CheckoutState,
        method: DeliveryMethod,
        recipient: Recipient,
    ) -> Effects {
        state.delivery_in_flight = false;
        match state.step.advance(StepEvent::DeliverySaved) {
            Ok(_) => {
                tracing::info!(?method, "Delivery saved");
                state.delivery_method = Some(method);
                state.recipient = Some(recipient);
            },
            Err(error) => tracing::warn!(%error, "Delivery saved outside delivery step"),
        }
        SmallVec::new()
    }

    fn back_to_delivery(state: &mut CheckoutState) -> Effects {
        if state.payment_in_flight {
            return SmallVec::new();
        }
        if let Err(error) = state.step.advance(StepEvent::BackToDelivery) {
            tracing::debug!(%error, "Back to delivery ignored");
        }
        SmallVec::new()
    }

    fn request_payment(state: &mut CheckoutState, env: &CheckoutEnvironment) -> Effects {
        if state.step() != Step::Payment || state.payment_in_flight {
            return SmallVec::new();
        }
        let (Some(order_id), Some(buyer)) = (state.reservation_id, state.recipient.clone()) else {
            return SmallVec::new();
        };

        let order_name = match state.held.len() {
            0 | 1 => state.performance.title.clone(),
            count => format!("{} ({count} seats)", state.performance.title),
        };
        let request = PaymentRequest {
            order_id,
            order_name,
            amount: state.seats.total_price(&state.held),
            buyer,
        };
        state.payment_in_flight = true;
        state.last_error = None;
        tracing::info!(%order_id, amount = %request.amount, "Requesting payment");

        let payment = Arc::clone(&env.payment);
        smallvec![Effect::future(async move {
            Some(match payment.request_payment(request).await {
                Ok(outcome) => CheckoutAction::PaymentResolved { outcome },
                Err(error) => CheckoutAction::PaymentFailed { error },
            })
        })]
    }

    fn payment_resolved(
        state: &mut CheckoutState,
        outcome: PaymentOutcome,
        env: &CheckoutEnvironment,
    ) -> Effects {
        state.payment_in_flight = false;
        match outcome {
            PaymentOutcome::Success { booking_number } => {
                let Some(reservation_id) = state.reservation_id else {
                    return SmallVec::new();
                };
                state.seats.reconcile(&state.held, SeatStatus::Sold);
                state.booking_number.clone_from(&booking_number);
                finish(
                    state,
                    TerminalOutcome::Completed {
                        reservation_id,
                        booking_number,
                    },
                    env,
                )
            },
            PaymentOutcome::UserCancelled => {
                tracing::info!("Payment sheet closed by the user");
                SmallVec::new()
            },
            PaymentOutcome::Failed { code, reason } => {
                tracing::warn!(%code, %reason, "Payment refused");
                finish(state, TerminalOutcome::Errored { reason }, env)
            },
        }
    }

    fn recoverable(state: &mut CheckoutState, what: &str, error: &ApiError) -> Effects {
        tracing::warn!(%error, "{what} failed");
        state.last_error = Some(error.to_string());
        SmallVec::new()
    }
}

/// Leaves the server session; failures are only logged
fn leave(env: &CheckoutEnvironment, schedule_id: ScheduleId) -> Effect<CheckoutAction> {
    let api = Arc::clone(&env.api);
    Effect::future(async move {
        if let Err(error) = api.leave_session(schedule_id).await {
            tracing::warn!(%error, "Leaving session failed");
        }
        None
    })
}

/// Ends the checkout with `outcome`.
///
/// Stops every timer in this reduction, so no tick armed before the close
/// is accepted afterwards. The cleanup then runs in order: release held
/// seats, leave the session, tell the host, close the window.
pub(super) fn finish(
    state: &mut CheckoutState,
    outcome: TerminalOutcome,
    env: &CheckoutEnvironment,
) -> Effects {
    let event = match outcome {
        TerminalOutcome::Completed { .. } => StepEvent::PaymentSucceeded,
        _ => StepEvent::Close,
    };
    if let Err(error) = state.step.advance(event) {
        tracing::debug!(%error, outcome = outcome.kind(), "Checkout already finished");
        return SmallVec::new();
    }

    state.queue_poll.stop();
    heartbeat::stop(state);
    state.clock_tick.stop();
    state.outcome = Some(outcome.clone());
    metrics::counter!("checkout.outcome", "kind" => outcome.kind()).increment(1);
    tracing::info!(outcome = outcome.kind(), step = %state.step(), "Checkout finished");

    let mut cleanup = Vec::with_capacity(4);

    let to_release = if matches!(outcome, TerminalOutcome::Completed { .. }) {
        Vec::new()
    } else {
        std::mem::take(&mut state.held)
    };
    if let Some(reservation_id) = state.reservation_id.filter(|_| !to_release.is_empty()) {
        let api = Arc::clone(&env.api);
        cleanup.push(Effect::future(async move {
            if let Err(error) = api.release_seats(reservation_id, &to_release).await {
                tracing::warn!(%error, seats = ?to_release, "Release on close failed");
            }
            None
        }));
    }

    if let (true, Some(schedule_id)) = (state.session_started, state.schedule_id) {
        cleanup.push(leave(env, schedule_id));
    }

    let message = CheckoutMessage::from(outcome);
    let port = Arc::clone(&env.port);
    cleanup.push(Effect::future(async move {
        if let Err(error) = port.post(&message) {
            tracing::warn!(%error, kind = ?message.kind(), "Could not notify host");
        }
        None
    }));

    let port = Arc::clone(&env.port);
    cleanup.push(Effect::future(async move {
        port.close_window();
        None
    }));

    smallvec![Effect::chain(cleanup)]
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        if state.step.is_terminal() {
            return Self::after_close(state, action, env);
        }

        if state.step().has_session() && state.clock.is_expired(env.clock.now()) {
            match &action {
                CheckoutAction::HoldResolved { response } => state.add_held(&response.held),
                CheckoutAction::SeatsReleased { seats } => state.remove_held(seats),
                _ => {},
            }
            tracing::info!(step = %state.step(), preempted = action.name(), "Session expired");
            return finish(state, TerminalOutcome::Expired, env);
        }

        match action {
            // Queue
            CheckoutAction::JoinQueue { schedule_id } => queue::join(state, schedule_id, env),
            CheckoutAction::QueueJoined { ticket } => queue::joined(state, ticket, env),
            CheckoutAction::QueueJoinFailed { error } => queue::join_failed(state, &error, env),
            CheckoutAction::QueuePollTick { generation } => {
                queue::poll_tick(state, generation, env)
            },
            CheckoutAction::QueuePolled { ticket } => queue::polled(state, ticket, env),
            CheckoutAction::QueuePollFailed { error } => queue::poll_failed(state, error, env),
            CheckoutAction::SessionBootstrapped { grant, draft, seats } => {
                queue::bootstrapped(state, grant, draft, seats, env)
            },
            CheckoutAction::BootstrapFailed {
                error,
                session_created,
            } => queue::bootstrap_failed(state, &error, session_created, env),

            // Seats
            CheckoutAction::SelectSeat { seat_id } => hold::select(state, seat_id),
            CheckoutAction::DeselectSeat { seat_id } => hold::deselect(state, seat_id),
            CheckoutAction::HoldSeats => hold::hold(state, env),
            CheckoutAction::HoldResolved { response } => hold::resolved(state, response, env),
            CheckoutAction::HoldFailed { error } => hold::hold_failed(state, &error),
            CheckoutAction::BackToSeats => hold::back_to_seats(state, env),
            CheckoutAction::SeatsReleased { seats } => hold::released(state, &seats),
            CheckoutAction::ReleaseFailed { seats, error } => {
                hold::release_failed(state, &seats, &error)
            },
            CheckoutAction::ClockTick { generation } => hold::clock_tick(state, generation, env),

            // Delivery
            CheckoutAction::SaveDelivery { method, recipient } => {
                Self::save_delivery(state, method, recipient, env)
            },
            CheckoutAction::DeliverySaved { method, recipient } => {
                Self::delivery_saved(state, method, recipient)
            },
            CheckoutAction::DeliveryFailed { error } => {
                state.delivery_in_flight = false;
                Self::recoverable(state, "Saving delivery", &error)
            },

            // Payment
            CheckoutAction::BackToDelivery => Self::back_to_delivery(state),
            CheckoutAction::RequestPayment => Self::request_payment(state, env),
            CheckoutAction::PaymentResolved { outcome } => {
                Self::payment_resolved(state, outcome, env)
            },
            CheckoutAction::PaymentFailed { error } => {
                state.payment_in_flight = false;
                Self::recoverable(state, "Payment request", &error)
            },

            // Heartbeat
            CheckoutAction::HeartbeatTick { generation } => {
                heartbeat::tick(state, generation, env)
            },
            CheckoutAction::HeartbeatAcked => heartbeat::acked(state),
            CheckoutAction::HeartbeatFailed { error } => heartbeat::failed(state, &error),

            CheckoutAction::Cancel => Self::cancel(state, env),
            CheckoutAction::WindowClosed => {
                tracing::info!(step = %state.step(), "Checkout window closed by the user");
                finish(state, TerminalOutcome::Cancelled, env)
            },
        }
    }
}
