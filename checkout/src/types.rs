//! Domain types for the booking session.
//!
//! Seats are snapshots fetched once per session. Their status only changes
//! through explicit hold and release responses, never by local inference.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Performance schedule a booking is made for
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ScheduleId(u64);

impl ScheduleId {
    /// Wraps a raw schedule id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque seat identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatId(u64);

impl SeatId {
    /// Wraps a raw seat id
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reservation identifier assigned by the server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Booking number issued by the payment provider
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingNumber(String);

impl BookingNumber {
    /// Wraps a provider booking number
    #[must_use]
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Borrow as str
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Money
// ============================================================================

/// Amount in won (the currency has no minor unit)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from won
    #[must_use]
    pub const fn from_won(won: u64) -> Self {
        Self(won)
    }

    /// Returns the amount in won
    #[must_use]
    pub const fn amount(&self) -> u64 {
        self.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₩{}", self.0)
    }
}

// ============================================================================
// Seats
// ============================================================================

/// Seat availability as last reported by the server
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    /// Can be selected
    Available,
    /// Held by some session (possibly ours)
    Held,
    /// Sold
    Sold,
    /// Not for sale
    Disabled,
}

/// Where a seat is in the venue
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatLocation {
    /// Floor label, e.g. "1F"
    pub floor: String,
    /// Block label
    pub block: String,
    /// Row label
    pub row: String,
    /// Seat number within the row
    pub number: u32,
}

impl fmt::Display for SeatLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} block, row {}, seat {}",
            self.floor, self.block, self.row, self.number
        )
    }
}

/// A purchasable seat
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Identity
    pub id: SeatId,
    /// Location
    pub location: SeatLocation,
    /// Price
    pub price: Money,
    /// Grade label, e.g. "VIP"
    pub grade: String,
    /// Last reported status
    pub status: SeatStatus,
}

/// Seat inventory for one session, ordered by seat id
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMap {
    seats: BTreeMap<SeatId, Seat>,
}

impl SeatMap {
    /// Builds the map from a server listing
    #[must_use]
    pub fn new(seats: impl IntoIterator<Item = Seat>) -> Self {
        Self {
            seats: seats.into_iter().map(|seat| (seat.id, seat)).collect(),
        }
    }

    /// Looks up a seat
    #[must_use]
    pub fn get(&self, id: SeatId) -> Option<&Seat> {
        self.seats.get(&id)
    }

    /// Last known status of a seat
    #[must_use]
    pub fn status(&self, id: SeatId) -> Option<SeatStatus> {
        self.seats.get(&id).map(|seat| seat.status)
    }

    /// Applies a status reported by a hold or release response
    pub fn reconcile(&mut self, ids: &[SeatId], status: SeatStatus) {
        for id in ids {
            if let Some(seat) = self.seats.get_mut(id) {
                seat.status = status;
            }
        }
    }

    /// Sum of the prices of `ids`; unknown ids count as zero
    #[must_use]
    pub fn total_price(&self, ids: &[SeatId]) -> Money {
        ids.iter()
            .filter_map(|id| self.seats.get(id))
            .map(|seat| seat.price)
            .sum()
    }

    /// Number of seats
    #[must_use]
    pub fn len(&self) -> usize {
        self.seats.len()
    }

    /// True when no inventory was loaded
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }

    /// Iterates seats by id
    pub fn iter(&self) -> impl Iterator<Item = &Seat> {
        self.seats.values()
    }
}

// ============================================================================
// Performance and delivery
// ============================================================================

/// Display metadata of the performance being booked
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    /// Title
    pub title: String,
    /// Date and time, as displayed
    pub date: String,
    /// Venue name
    pub venue: String,
}

/// How tickets reach the buyer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryMethod {
    /// Collected at the venue
    OnSitePickup,
    /// Mobile ticket
    Mobile,
    /// Posted to an address
    Mail,
}

/// Why a recipient was refused
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecipientError {
    /// Name is blank
    #[error("recipient name is required")]
    MissingName,
    /// Phone is blank
    #[error("recipient phone number is required")]
    MissingPhone,
    /// Mail delivery without an address
    #[error("a postal address is required for mail delivery")]
    MissingAddress,
}

/// Who receives the tickets
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Full name
    pub name: String,
    /// Contact phone
    pub phone: String,
    /// Postal address, required for mail delivery
    pub address: Option<String>,
}

impl Recipient {
    /// Checks the recipient against the chosen delivery method
    ///
    /// # Errors
    ///
    /// Returns [`RecipientError`] for a blank name or phone, or a mail
    /// delivery without an address.
    pub fn validate(&self, method: DeliveryMethod) -> Result<(), RecipientError> {
        if self.name.trim().is_empty() {
            return Err(RecipientError::MissingName);
        }
        if self.phone.trim().is_empty() {
            return Err(RecipientError::MissingPhone);
        }
        let has_address = self
            .address
            .as_deref()
            .is_some_and(|address| !address.trim().is_empty());
        if method == DeliveryMethod::Mail && !has_address {
            return Err(RecipientError::MissingAddress);
        }
        Ok(())
    }
}

// ============================================================================
// Queue and steps
// ============================================================================

/// Position in the waiting queue
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueStatus {
    /// Waiting for admission
    Waiting,
    /// Admitted; a session may be created
    Admitted,
}

/// Ephemeral queue state, superseded by the session on admission
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTicket {
    /// `None` before joining
    pub status: Option<QueueStatus>,
    /// Position while waiting
    pub position: Option<u32>,
}

impl QueueTicket {
    /// Ticket for a waiting user
    #[must_use]
    pub const fn waiting(position: u32) -> Self {
        Self {
            status: Some(QueueStatus::Waiting),
            position: Some(position),
        }
    }

    /// Ticket for an admitted user
    #[must_use]
    pub const fn admitted() -> Self {
        Self {
            status: Some(QueueStatus::Admitted),
            position: None,
        }
    }

    /// Whether a join is pending or done
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.status.is_some()
    }

    /// Whether the queue admitted the user
    #[must_use]
    pub fn is_admitted(&self) -> bool {
        self.status == Some(QueueStatus::Admitted)
    }
}

/// Checkout phase
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    /// Waiting in the queue
    #[default]
    Queue,
    /// Choosing seats
    Seats,
    /// Choosing delivery
    Delivery,
    /// Paying
    Payment,
    /// Paid
    Complete,
    /// Cancelled, errored or expired
    Closed,
}

impl Step {
    /// `Complete` and `Closed` accept no further transitions
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Closed)
    }

    /// Steps during which a session and its heartbeat are live
    #[must_use]
    pub const fn has_session(self) -> bool {
        matches!(self, Self::Seats | Self::Delivery | Self::Payment)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Queue => "QUEUE",
            Self::Seats => "SEATS",
            Self::Delivery => "DELIVERY",
            Self::Payment => "PAYMENT",
            Self::Complete => "COMPLETE",
            Self::Closed => "CLOSED",
        };
        f.write_str(label)
    }
}

/// How a checkout ended
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminalOutcome {
    /// Paid
    Completed {
        /// Reservation that was paid
        reservation_id: ReservationId,
        /// Provider booking number, when one was issued
        booking_number: Option<BookingNumber>,
    },
    /// User gave up, or closed the window
    Cancelled,
    /// Fatal failure
    Errored {
        /// User-facing reason
        reason: String,
    },
    /// Session deadline passed
    Expired,
}

impl TerminalOutcome {
    /// Short label for logs and metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Cancelled => "cancelled",
            Self::Errored { .. } => "errored",
            Self::Expired => "expired",
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Four seats in row A, ids 101..=104, 50,000 won each
    pub fn seat_map() -> SeatMap {
        SeatMap::new((101..=104).map(|id| seat(id, SeatStatus::Available)))
    }

    pub fn seat(id: u64, status: SeatStatus) -> Seat {
        Seat {
            id: SeatId::new(id),
            location: SeatLocation {
                floor: "1F".to_string(),
                block: "A".to_string(),
                row: "A".to_string(),
                number: u32::try_from(id % 100).unwrap_or(0),
            },
            price: Money::from_won(50_000),
            grade: "R".to_string(),
            status,
        }
    }
}
