//! Seat selection, holds and releases, and the session clock tick.
//!
//! Selection is local and never calls the server. A hold either takes
//! every selected seat or none: when another buyer got some of them first,
//! the seats we did get are released again, the lost ones are flagged in
//! `conflicts` and dropped from the selection, and the user stays on
//! seat selection.

use super::actions::CheckoutAction;
use super::environment::CheckoutEnvironment;
use super::state::CheckoutState;
use super::step::StepEvent;
use super::Effects;
use crate::api::{ApiError, HoldResponse};
use crate::selection::SelectionChange;
use crate::types::{SeatId, SeatStatus, Step};
use boxoffice_core::effect::Effect;
use boxoffice_core::timer::Generation;
use boxoffice_core::{smallvec, SmallVec};
use std::sync::Arc;

fn selection_locked(state: &CheckoutState) -> bool {
    state.step() != Step::Seats || state.hold_in_flight || state.release_in_flight
}

pub(super) fn select(state: &mut CheckoutState, seat_id: SeatId) -> Effects {
    if selection_locked(state) {
        return SmallVec::new();
    }
    match state.selection.select(seat_id, &state.seats) {
        SelectionChange::Added => {
            state.conflicts.retain(|seat| *seat != seat_id);
            state.last_error = None;
        },
        change => tracing::debug!(%seat_id, ?change, "Seat not added"),
    }
    SmallVec::new()
}

pub(super) fn deselect(state: &mut CheckoutState, seat_id: SeatId) -> Effects {
    if !selection_locked(state) {
        state.selection.deselect(seat_id);
    }
    SmallVec::new()
}

pub(super) fn hold(state: &mut CheckoutState, env: &CheckoutEnvironment) -> Effects {
    if selection_locked(state) {
        return SmallVec::new();
    }
    let Some(reservation_id) = state.reservation_id else {
        return SmallVec::new();
    };
    if state.selection.is_empty() {
        state.last_error = Some("select at least one seat".to_string());
        return SmallVec::new();
    }

    state.hold_in_flight = true;
    state.conflicts.clear();
    state.last_error = None;
    let seats = state.selection.ids().to_vec();
    tracing::info!(%reservation_id, ?seats, "Holding seats");

    let api = Arc::clone(&env.api);
    smallvec![Effect::future(async move {
        Some(match api.hold_seats(reservation_id, &seats).await {
            Ok(response) => CheckoutAction::HoldResolved { response },
            Err(error) => CheckoutAction::HoldFailed { error },
        })
    })]
}

pub(super) fn resolved(
    state: &mut CheckoutState,
    response: HoldResponse,
    env: &CheckoutEnvironment,
) -> Effects {
    state.hold_in_flight = false;
    state.add_held(&response.held);

    if response.is_complete() {
        state.seats.reconcile(&response.held, SeatStatus::Held);
        if let Some(expires_at) = response.expires_at {
            state.clock.extend_to(expires_at);
            state.clock.refresh(env.clock.now());
        }
        if let Err(error) = state.step.advance(StepEvent::HoldSucceeded) {
            tracing::warn!(%error, "Hold resolved outside seat selection");
            return SmallVec::new();
        }
        tracing::info!(
            seats = ?response.held,
            remaining = %state.clock.display(),
            "Seats held"
        );
        return SmallVec::new();
    }

    let lost = response.rejected;
    metrics::counter!("checkout.hold.rejected").increment(lost.len() as u64);
    tracing::info!(rejected = ?lost, rolled_back = ?response.held, "Hold partly rejected");
    state.seats.reconcile(&lost, SeatStatus::Held);
    state.selection.retain(|seat| !lost.contains(&seat));
    state.last_error = Some(if lost.is_empty() {
        "the seats could not be held, please try again".to_string()
    } else {
        format!("{} of the selected seats were just taken", lost.len())
    });
    state.conflicts = lost;

    if response.held.is_empty() {
        return SmallVec::new();
    }
    release(state, response.held, env)
}

pub(super) fn hold_failed(state: &mut CheckoutState, error: &ApiError) -> Effects {
    state.hold_in_flight = false;
    state.last_error = Some(error.to_string());
    tracing::warn!(%error, code = ?error.code(), "Hold request failed");
    SmallVec::new()
}

pub(super) fn back_to_seats(state: &mut CheckoutState, env: &CheckoutEnvironment) -> Effects {
    if state.step() != Step::Delivery || state.delivery_in_flight || state.release_in_flight {
        return SmallVec::new();
    }
    if state.held.is_empty() {
        if let Err(error) = state.step.advance(StepEvent::BackToSeats) {
            tracing::warn!(%error, "Cannot return to seat selection");
        }
        return SmallVec::new();
    }
    let seats = state.held.clone();
    release(state, seats, env)
}

/// Gives `seats` back; the step only changes once the server confirms
fn release(state: &mut CheckoutState, seats: Vec<SeatId>, env: &CheckoutEnvironment) -> Effects {
    let Some(reservation_id) = state.reservation_id else {
        return SmallVec::new();
    };
    state.release_in_flight = true;
    tracing::info!(%reservation_id, ?seats, "Releasing seats");

    let api = Arc::clone(&env.api);
    smallvec![Effect::future(async move {
        Some(match api.release_seats(reservation_id, &seats).await {
            Ok(()) => CheckoutAction::SeatsReleased { seats },
            Err(error) => CheckoutAction::ReleaseFailed { seats, error },
        })
    })]
}

pub(super) fn released(state: &mut CheckoutState, seats: &[SeatId]) -> Effects {
    state.release_in_flight = false;
    state.remove_held(seats);
    state.seats.reconcile(seats, SeatStatus::Available);

    if state.step() == Step::Delivery {
        match state.step.advance(StepEvent::BackToSeats) {
            Ok(_) => tracing::info!(?seats, "Seats released, back to selection"),
            Err(error) => tracing::warn!(%error, "Cannot return to seat selection"),
        }
    }
    SmallVec::new()
}

pub(super) fn release_failed(
    state: &mut CheckoutState,
    seats: &[SeatId],
    error: &ApiError,
) -> Effects {
    state.release_in_flight = false;
    state.last_error = Some(error.to_string());
    tracing::warn!(%error, ?seats, "Release failed, seats remain held");
    SmallVec::new()
}

pub(super) fn clock_tick(
    state: &mut CheckoutState,
    generation: Generation,
    env: &CheckoutEnvironment,
) -> Effects {
    if !state.clock_tick.accepts(generation) {
        return SmallVec::new();
    }
    state.clock.refresh(env.clock.now());
    tracing::trace!(remaining = %state.clock.display(), "Session clock");
    smallvec![Effect::delay(
        env.config.clock_tick(),
        CheckoutAction::ClockTick { generation },
    )]
}
