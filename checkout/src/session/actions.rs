//! Actions for the checkout session.

use crate::api::{AdmissionError, ApiError, HoldResponse, ReservationDraft, SessionGrant};
use crate::payment::PaymentOutcome;
use crate::types::{DeliveryMethod, QueueTicket, Recipient, ScheduleId, Seat, SeatId};
use boxoffice_core::timer::Generation;
use boxoffice_macros::Action;
use serde::{Deserialize, Serialize};

/// Everything the checkout reducer reacts to: user commands, timer ticks,
/// and the results of server calls fed back by effects
#[derive(Action, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckoutAction {
    // Commands
    /// Enter the waiting queue for a schedule
    #[command]
    JoinQueue {
        /// Schedule to book
        schedule_id: ScheduleId,
    },

    /// Abandon the checkout
    #[command]
    Cancel,

    /// Add a seat to the selection
    #[command]
    SelectSeat {
        /// Seat to add
        seat_id: SeatId,
    },

    /// Remove a seat from the selection
    #[command]
    DeselectSeat {
        /// Seat to remove
        seat_id: SeatId,
    },

    /// Hold the selected seats
    #[command]
    HoldSeats,

    /// Return from delivery to seat selection
    #[command]
    BackToSeats,

    /// Save the delivery choice and move on to payment
    #[command]
    SaveDelivery {
        /// How tickets are delivered
        method: DeliveryMethod,
        /// Who receives them
        recipient: Recipient,
    },

    /// Return from payment to delivery
    #[command]
    BackToDelivery,

    /// Open the payment sheet
    #[command]
    RequestPayment,

    // Timers
    /// Queue admission poll
    #[tick]
    QueuePollTick {
        /// Run of the poll timer that armed this tick
        generation: Generation,
    },

    /// Keep-alive ping
    #[tick]
    HeartbeatTick {
        /// Run of the heartbeat that armed this tick
        generation: Generation,
    },

    /// Session clock refresh
    #[tick]
    ClockTick {
        /// Run of the clock timer that armed this tick
        generation: Generation,
    },

    // Events
    /// The queue accepted the join
    #[event]
    QueueJoined {
        /// Initial ticket
        ticket: QueueTicket,
    },

    /// The queue refused the join
    #[event]
    QueueJoinFailed {
        /// Why
        error: AdmissionError,
    },

    /// A poll answered
    #[event]
    QueuePolled {
        /// Updated ticket
        ticket: QueueTicket,
    },

    /// A poll failed
    #[event]
    QueuePollFailed {
        /// Why
        error: ApiError,
    },

    /// Session, reservation and seat inventory are ready
    #[event]
    SessionBootstrapped {
        /// Session deadline
        grant: SessionGrant,
        /// Reservation to hold seats under
        draft: ReservationDraft,
        /// Seat inventory
        seats: Vec<Seat>,
    },

    /// One of the bootstrap calls failed
    #[event]
    BootstrapFailed {
        /// Why
        error: ApiError,
        /// Whether the server session was already created
        session_created: bool,
    },

    /// The server answered a hold request
    #[event]
    HoldResolved {
        /// Held and rejected seats
        response: HoldResponse,
    },

    /// A hold request failed
    #[event]
    HoldFailed {
        /// Why
        error: ApiError,
    },

    /// Seats were given back
    #[event]
    SeatsReleased {
        /// Released seats
        seats: Vec<SeatId>,
    },

    /// Giving seats back failed
    #[event]
    ReleaseFailed {
        /// Seats still held
        seats: Vec<SeatId>,
        /// Why
        error: ApiError,
    },

    /// Delivery choice persisted
    #[event]
    DeliverySaved {
        /// Saved method
        method: DeliveryMethod,
        /// Saved recipient
        recipient: Recipient,
    },

    /// Persisting the delivery choice failed
    #[event]
    DeliveryFailed {
        /// Why
        error: ApiError,
    },

    /// The payment provider answered
    #[event]
    PaymentResolved {
        /// Provider outcome
        outcome: PaymentOutcome,
    },

    /// The payment provider could not be reached
    #[event]
    PaymentFailed {
        /// Why
        error: ApiError,
    },

    /// Keep-alive ping succeeded
    #[event]
    HeartbeatAcked,

    /// Keep-alive ping failed
    #[event]
    HeartbeatFailed {
        /// Why
        error: ApiError,
    },
    /// The user closed the checkout window directly
    #[event]
    WindowClosed,
}
