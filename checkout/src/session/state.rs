//! State of one checkout.

use super::step::StepMachine;
use crate::selection::SelectionSet;
use crate::session_clock::SessionClock;
use crate::types::{
    BookingNumber, DeliveryMethod, Performance, QueueTicket, Recipient, ReservationId,
    ScheduleId, SeatId, SeatMap, Step, TerminalOutcome,
};
use boxoffice_core::timer::Interval;

/// The single live session of a checkout process
///
/// Created empty in `Queue`; the session half is filled in on admission and
/// dropped with the process once a terminal step is reached.
#[derive(Clone, Debug)]
pub struct CheckoutState {
    /// Schedule being booked, set by the join
    pub schedule_id: Option<ScheduleId>,

    // Queue
    /// Waiting-queue ticket; reset once the session supersedes it
    pub queue: QueueTicket,
    /// A join request is pending
    pub join_in_flight: bool,
    /// An admission poll is pending
    pub poll_in_flight: bool,

    // Session
    /// The server created a session that must be left on close
    pub session_started: bool,
    /// Reservation seats are held under
    pub reservation_id: Option<ReservationId>,
    /// Display metadata
    pub performance: Performance,
    /// Seat inventory fetched at admission
    pub seats: SeatMap,
    /// Seats the user picked
    pub selection: SelectionSet,
    /// Seats the server holds for this session
    pub held: Vec<SeatId>,
    /// A hold request is pending
    pub hold_in_flight: bool,
    /// A release request is pending
    pub release_in_flight: bool,
    /// Seats another buyer got first, from the last hold attempt
    pub conflicts: Vec<SeatId>,
    /// Saved delivery method
    pub delivery_method: Option<DeliveryMethod>,
    /// Saved recipient
    pub recipient: Option<Recipient>,
    /// A delivery save is pending
    pub delivery_in_flight: bool,
    /// The payment sheet is open
    pub payment_in_flight: bool,
    /// Time left until the hold deadline
    pub clock: SessionClock,
    /// Current step
    pub step: StepMachine,

    // Outcome
    /// How the checkout ended
    pub outcome: Option<TerminalOutcome>,
    /// Message for the last recoverable failure
    pub last_error: Option<String>,
    /// Provider booking number after payment
    pub booking_number: Option<BookingNumber>,

    // Timers
    /// Admission poll
    pub queue_poll: Interval,
    /// Keep-alive ping
    pub heartbeat: Interval,
    /// Remaining-time refresh
    pub clock_tick: Interval,
    /// Consecutive failed pings
    pub heartbeat_failures: u32,
}

impl CheckoutState {
    /// Fresh checkout allowing `max_seats` per booking
    #[must_use]
    pub fn new(max_seats: usize) -> Self {
        Self {
            schedule_id: None,
            queue: QueueTicket::default(),
            join_in_flight: false,
            poll_in_flight: false,
            session_started: false,
            reservation_id: None,
            performance: Performance::default(),
            seats: SeatMap::default(),
            selection: SelectionSet::new(max_seats),
            held: Vec::new(),
            hold_in_flight: false,
            release_in_flight: false,
            conflicts: Vec::new(),
            delivery_method: None,
            recipient: None,
            delivery_in_flight: false,
            payment_in_flight: false,
            clock: SessionClock::new(),
            step: StepMachine::new(),
            outcome: None,
            last_error: None,
            booking_number: None,
            queue_poll: Interval::new("queue-poll"),
            heartbeat: Interval::new("heartbeat"),
            clock_tick: Interval::new("session-clock"),
            heartbeat_failures: 0,
        }
    }

    /// Current step
    #[must_use]
    pub const fn step(&self) -> Step {
        self.step.current()
    }

    /// Whether any timer is still running
    #[must_use]
    pub const fn has_live_timers(&self) -> bool {
        self.queue_poll.is_running() || self.heartbeat.is_running() || self.clock_tick.is_running()
    }

    /// Records seats the server reports as held by us
    pub(crate) fn add_held(&mut self, seats: &[SeatId]) {
        for seat in seats {
            if !self.held.contains(seat) {
                self.held.push(*seat);
            }
        }
    }

    /// Forgets seats the server released
    pub(crate) fn remove_held(&mut self, seats: &[SeatId]) {
        self.held.retain(|seat| !seats.contains(seat));
    }
}
