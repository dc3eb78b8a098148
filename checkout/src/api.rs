//! Booking server interface.
//!
//! The authenticated HTTP client lives outside this crate; the orchestrator
//! only sees the [`BookingApi`] trait. [`ScriptedApi`] is an in-memory
//! implementation with scripted queue progress, seat contention and failure
//! injection, used by the tests and the demo binary.

use crate::types::{
    DeliveryMethod, Money, Performance, QueueTicket, Recipient, ReservationId, ScheduleId, Seat,
    SeatId, SeatLocation, SeatStatus,
};
use async_trait::async_trait;
use boxoffice_core::environment::Clock;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Failed server call
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiError {
    /// The request did not get a response
    #[error("network error: {0}")]
    Network(String),

    /// The server refused the request
    #[error("{message} ({code})")]
    Rejected {
        /// Machine-readable rejection code
        code: String,
        /// Human-readable message
        message: String,
    },
}

impl ApiError {
    /// Shorthand for a business-rule rejection
    #[must_use]
    pub fn rejected(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Rejection code, if the server answered
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Network(_) => None,
            Self::Rejected { code, .. } => Some(code),
        }
    }
}

/// Why the queue refused to admit the user
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionError {
    /// Unknown or invalid schedule
    #[error("this performance schedule does not exist")]
    InvalidSchedule,

    /// No seats left
    #[error("this performance is sold out")]
    SoldOut,

    /// Booking window closed
    #[error("booking is closed for this performance")]
    Closed,

    /// Any other failure
    #[error(transparent)]
    Api(ApiError),
}

impl AdmissionError {
    /// Admission errors other than plain API failures end the flow
    #[must_use]
    pub const fn is_admission_refusal(&self) -> bool {
        !matches!(self, Self::Api(_))
    }
}

impl From<ApiError> for AdmissionError {
    fn from(error: ApiError) -> Self {
        match error.code() {
            Some("INVALID_SCHEDULE") => Self::InvalidSchedule,
            Some("SOLD_OUT") => Self::SoldOut,
            Some("CLOSED") => Self::Closed,
            _ => Self::Api(error),
        }
    }
}

/// Session granted on admission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    /// Instant the server reclaims the session unless holds extend it
    pub expires_at: DateTime<Utc>,
}

/// Reservation shell created right after the session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDraft {
    /// Server-assigned reservation id
    pub reservation_id: ReservationId,
    /// Display metadata
    pub performance: Performance,
}

/// Server answer to a hold request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldResponse {
    /// Seats now held by this session
    pub held: Vec<SeatId>,
    /// Seats someone else got first
    pub rejected: Vec<SeatId>,
    /// New hold deadline, present when anything was held
    pub expires_at: Option<DateTime<Utc>>,
}

impl HoldResponse {
    /// Whether every requested seat was held
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.rejected.is_empty() && !self.held.is_empty()
    }
}

/// Booking server operations used by the checkout flow
#[async_trait]
pub trait BookingApi: Send + Sync {
    /// Register in the waiting queue
    async fn join_queue(&self, schedule: ScheduleId) -> Result<QueueTicket, ApiError>;

    /// Current queue position, or admission
    async fn poll_queue(&self, schedule: ScheduleId) -> Result<QueueTicket, ApiError>;

    /// Open a booking session after admission
    async fn create_session(&self, schedule: ScheduleId) -> Result<SessionGrant, ApiError>;

    /// Create the reservation the seats will be held under
    async fn create_reservation(
        &self,
        schedule: ScheduleId,
    ) -> Result<ReservationDraft, ApiError>;

    /// Seat inventory for the schedule
    async fn fetch_seats(&self, schedule: ScheduleId) -> Result<Vec<Seat>, ApiError>;

    /// Hold `seats` for the reservation
    async fn hold_seats(
        &self,
        reservation: ReservationId,
        seats: &[SeatId],
    ) -> Result<HoldResponse, ApiError>;

    /// Give `seats` back
    async fn release_seats(
        &self,
        reservation: ReservationId,
        seats: &[SeatId],
    ) -> Result<(), ApiError>;

    /// Persist the delivery choice
    async fn save_delivery(
        &self,
        reservation: ReservationId,
        method: DeliveryMethod,
        recipient: &Recipient,
    ) -> Result<(), ApiError>;

    /// Keep the session alive
    async fn ping(&self, schedule: ScheduleId) -> Result<(), ApiError>;

    /// Abandon the session
    async fn leave_session(&self, schedule: ScheduleId) -> Result<(), ApiError>;
}

// ============================================================================
// Scripted in-memory server
// ============================================================================

/// Server operation, used to inject failures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `join_queue`
    JoinQueue,
    /// `poll_queue`
    PollQueue,
    /// `create_session`
    CreateSession,
    /// `create_reservation`
    CreateReservation,
    /// `fetch_seats`
    FetchSeats,
    /// `hold_seats`
    HoldSeats,
    /// `release_seats`
    ReleaseSeats,
    /// `save_delivery`
    SaveDelivery,
    /// `ping`
    Ping,
    /// `leave_session`
    LeaveSession,
}

/// A recorded call to [`ScriptedApi`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ApiCall {
    /// `join_queue`
    JoinQueue(ScheduleId),
    /// `poll_queue`
    PollQueue(ScheduleId),
    /// `create_session`
    CreateSession(ScheduleId),
    /// `create_reservation`
    CreateReservation(ScheduleId),
    /// `fetch_seats`
    FetchSeats(ScheduleId),
    /// `hold_seats`
    HoldSeats(Vec<SeatId>),
    /// `release_seats`
    ReleaseSeats(Vec<SeatId>),
    /// `save_delivery`
    SaveDelivery(DeliveryMethod),
    /// `ping`
    Ping(ScheduleId),
    /// `leave_session`
    LeaveSession(ScheduleId),
}

impl ApiCall {
    /// Which endpoint was called
    #[must_use]
    pub const fn endpoint(&self) -> Endpoint {
        match self {
            Self::JoinQueue(_) => Endpoint::JoinQueue,
            Self::PollQueue(_) => Endpoint::PollQueue,
            Self::CreateSession(_) => Endpoint::CreateSession,
            Self::CreateReservation(_) => Endpoint::CreateReservation,
            Self::FetchSeats(_) => Endpoint::FetchSeats,
            Self::HoldSeats(_) => Endpoint::HoldSeats,
            Self::ReleaseSeats(_) => Endpoint::ReleaseSeats,
            Self::SaveDelivery(_) => Endpoint::SaveDelivery,
            Self::Ping(_) => Endpoint::Ping,
            Self::LeaveSession(_) => Endpoint::LeaveSession,
        }
    }
}

struct Script {
    positions: VecDeque<u32>,
    session_ttl: Duration,
    hold_ttl: Duration,
    max_seats: usize,
    performance: Performance,
    seats: Vec<Seat>,
    taken: BTreeSet<SeatId>,
    held: BTreeSet<SeatId>,
    failures: HashMap<Endpoint, ApiError>,
    latency: HashMap<Endpoint, Duration>,
    calls: Vec<ApiCall>,
}

/// In-memory booking server
///
/// The queue admits after the scripted positions run out. Seats marked
/// taken are rejected by holds; everything else is held for `hold_ttl`.
///
/// ```
/// use checkout::api::{BookingApi, ScriptedApi};
/// use checkout::types::ScheduleId;
/// use boxoffice_core::environment::SystemClock;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let api = ScriptedApi::new(Arc::new(SystemClock)).with_queue([57, 31]);
/// let ticket = api.join_queue(ScheduleId::new(42)).await.unwrap();
/// assert_eq!(ticket.position, Some(57));
/// # });
/// ```
pub struct ScriptedApi {
    clock: Arc<dyn Clock>,
    script: Mutex<Script>,
}

impl ScriptedApi {
    /// Server that admits immediately, with ten available seats 101..=110
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            script: Mutex::new(Script {
                positions: VecDeque::new(),
                session_ttl: Duration::from_secs(600),
                hold_ttl: Duration::from_secs(600),
                max_seats: 4,
                performance: Performance {
                    title: "Spring Concert".to_string(),
                    date: "2025-05-03 19:00".to_string(),
                    venue: "Olympic Hall".to_string(),
                },
                seats: demo_seats(),
                taken: BTreeSet::new(),
                held: BTreeSet::new(),
                failures: HashMap::new(),
                latency: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Queue positions: the join returns the first, each poll the next,
    /// and the poll after the last one admits
    #[must_use]
    pub fn with_queue(self, positions: impl IntoIterator<Item = u32>) -> Self {
        self.lock().positions = positions.into_iter().collect();
        self
    }

    /// Session lifetime granted on admission
    #[must_use]
    pub fn with_session_ttl(self, ttl: Duration) -> Self {
        self.lock().session_ttl = ttl;
        self
    }

    /// Hold lifetime granted by each successful hold
    #[must_use]
    pub fn with_hold_ttl(self, ttl: Duration) -> Self {
        self.lock().hold_ttl = ttl;
        self
    }

    /// Replaces the seat inventory
    #[must_use]
    pub fn with_seats(self, seats: Vec<Seat>) -> Self {
        self.lock().seats = seats;
        self
    }

    /// Display metadata returned with the reservation
    #[must_use]
    pub fn with_performance(self, performance: Performance) -> Self {
        self.lock().performance = performance;
        self
    }

    /// Delays every call to `endpoint`
    #[must_use]
    pub fn with_latency(self, endpoint: Endpoint, latency: Duration) -> Self {
        self.lock().latency.insert(endpoint, latency);
        self
    }

    /// Another buyer holds `seat` from now on
    pub fn take_seat(&self, seat: SeatId) {
        self.lock().taken.insert(seat);
    }

    /// Every call to `endpoint` fails with `error` until [`recover`](Self::recover)
    pub fn fail(&self, endpoint: Endpoint, error: ApiError) {
        self.lock().failures.insert(endpoint, error);
    }

    /// Stops failing `endpoint`
    pub fn recover(&self, endpoint: Endpoint) {
        self.lock().failures.remove(&endpoint);
    }

    /// Calls received so far, in order
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.lock().calls.clone()
    }

    /// Number of calls to `endpoint`
    #[must_use]
    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.endpoint() == endpoint)
            .count()
    }

    /// Seats this session currently holds on the server
    #[must_use]
    pub fn held_seats(&self) -> Vec<SeatId> {
        self.lock().held.iter().copied().collect()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the call, waits out any scripted latency, then applies
    /// the scripted failure for its endpoint
    async fn enter(&self, call: ApiCall) -> Result<(), ApiError> {
        let endpoint = call.endpoint();
        let latency = {
            let mut script = self.lock();
            script.calls.push(call);
            script.latency.get(&endpoint).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.lock().failures.get(&endpoint) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    /// `now + ttl`, saturating at the latest representable instant
    fn deadline(&self, ttl: Duration) -> DateTime<Utc> {
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| self.clock.now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[async_trait]
impl BookingApi for ScriptedApi {
    async fn join_queue(&self, schedule: ScheduleId) -> Result<QueueTicket, ApiError> {
        self.enter(ApiCall::JoinQueue(schedule)).await?;
        Ok(match self.lock().positions.pop_front() {
            Some(position) => QueueTicket::waiting(position),
            None => QueueTicket::admitted(),
        })
    }

    async fn poll_queue(&self, schedule: ScheduleId) -> Result<QueueTicket, ApiError> {
        self.enter(ApiCall::PollQueue(schedule)).await?;
        Ok(match self.lock().positions.pop_front() {
            Some(position) => QueueTicket::waiting(position),
            None => QueueTicket::admitted(),
        })
    }

    async fn create_session(&self, schedule: ScheduleId) -> Result<SessionGrant, ApiError> {
        self.enter(ApiCall::CreateSession(schedule)).await?;
        let ttl = self.lock().session_ttl;
        Ok(SessionGrant {
            expires_at: self.deadline(ttl),
        })
    }

    async fn create_reservation(
        &self,
        schedule: ScheduleId,
    ) -> Result<ReservationDraft, ApiError> {
        self.enter(ApiCall::CreateReservation(schedule)).await?;
        Ok(ReservationDraft {
            reservation_id: ReservationId::new(),
            performance: self.lock().performance.clone(),
        })
    }

    async fn fetch_seats(&self, schedule: ScheduleId) -> Result<Vec<Seat>, ApiError> {
        self.enter(ApiCall::FetchSeats(schedule)).await?;
        let script = self.lock();
        Ok(script
            .seats
            .iter()
            .cloned()
            .map(|mut seat| {
                if script.taken.contains(&seat.id) {
                    seat.status = SeatStatus::Held;
                }
                seat
            })
            .collect())
    }

    async fn hold_seats(
        &self,
        _reservation: ReservationId,
        seats: &[SeatId],
    ) -> Result<HoldResponse, ApiError> {
        self.enter(ApiCall::HoldSeats(seats.to_vec())).await?;
        let (held, rejected, ttl) = {
            let mut script = self.lock();
            if seats.len() > script.max_seats {
                return Err(ApiError::rejected(
                    "TOO_MANY_SEATS",
                    format!("at most {} seats per booking", script.max_seats),
                ));
            }
            let (rejected, held): (Vec<SeatId>, Vec<SeatId>) = seats
                .iter()
                .partition(|seat| script.taken.contains(*seat));
            script.held.extend(held.iter().copied());
            (held, rejected, script.hold_ttl)
        };
        let expires_at = (!held.is_empty()).then(|| self.deadline(ttl));
        Ok(HoldResponse {
            held,
            rejected,
            expires_at,
        })
    }

    async fn release_seats(
        &self,
        _reservation: ReservationId,
        seats: &[SeatId],
    ) -> Result<(), ApiError> {
        self.enter(ApiCall::ReleaseSeats(seats.to_vec())).await?;
        let mut script = self.lock();
        for seat in seats {
            script.held.remove(seat);
        }
        Ok(())
    }

    async fn save_delivery(
        &self,
        _reservation: ReservationId,
        method: DeliveryMethod,
        _recipient: &Recipient,
    ) -> Result<(), ApiError> {
        self.enter(ApiCall::SaveDelivery(method)).await
    }

    async fn ping(&self, schedule: ScheduleId) -> Result<(), ApiError> {
        self.enter(ApiCall::Ping(schedule)).await
    }

    async fn leave_session(&self, schedule: ScheduleId) -> Result<(), ApiError> {
        self.enter(ApiCall::LeaveSession(schedule)).await
    }
}

/// Ten R-grade seats, ids 101..=110, in block A row 1
#[must_use]
pub fn demo_seats() -> Vec<Seat> {
    (1..=10_u32)
        .map(|number| Seat {
            id: SeatId::new(100 + u64::from(number)),
            location: SeatLocation {
                floor: "1F".to_string(),
                block: "A".to_string(),
                row: "1".to_string(),
                number,
            },
            price: Money::from_won(132_000),
            grade: "R".to_string(),
            status: SeatStatus::Available,
        })
        .collect()
}
