//! Payment provider interface.
//!
//! The provider SDK is external. It reports a user backing out of its
//! payment sheet with a dedicated code, which is modelled here as
//! [`PaymentOutcome::UserCancelled`] so callers never compare strings.

use crate::api::ApiError;
use crate::types::{BookingNumber, Money, Recipient, ReservationId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Provider code for a user closing the payment sheet
pub const USER_CANCEL_CODE: &str = "USER_CANCEL";

/// What the provider is asked to charge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Reservation the payment settles
    pub order_id: ReservationId,
    /// Shown on the payment sheet
    pub order_name: String,
    /// Amount to charge
    pub amount: Money,
    /// Buyer contact details
    pub buyer: Recipient,
}

/// Provider answer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    /// Charged
    Success {
        /// Booking number, when the provider issues one
        booking_number: Option<BookingNumber>,
    },
    /// The user closed the payment sheet; they may try again
    UserCancelled,
    /// The provider refused the payment
    Failed {
        /// Provider error code
        code: String,
        /// Human-readable reason
        reason: String,
    },
}

impl PaymentOutcome {
    /// Maps a raw provider failure code
    #[must_use]
    pub fn from_code(code: &str, reason: impl Into<String>) -> Self {
        if code == USER_CANCEL_CODE {
            Self::UserCancelled
        } else {
            Self::Failed {
                code: code.to_string(),
                reason: reason.into(),
            }
        }
    }
}

/// Payment provider SDK
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Shows the payment sheet and waits for the result.
    ///
    /// `Err` means the provider could not be reached at all.
    async fn request_payment(&self, request: PaymentRequest) -> Result<PaymentOutcome, ApiError>;
}

/// Provider that answers from a script, then succeeds
///
/// ```
/// use checkout::payment::{PaymentOutcome, ScriptedPayment};
///
/// let provider = ScriptedPayment::new().then(PaymentOutcome::from_code("USER_CANCEL", ""));
/// assert!(provider.requests().is_empty());
/// ```
#[derive(Default)]
pub struct ScriptedPayment {
    script: Mutex<VecDeque<Result<PaymentOutcome, ApiError>>>,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl ScriptedPayment {
    /// Provider that always succeeds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an outcome for the next request
    #[must_use]
    pub fn then(self, outcome: PaymentOutcome) -> Self {
        lock(&self.script).push_back(Ok(outcome));
        self
    }

    /// Queues a transport failure for the next request
    #[must_use]
    pub fn then_unreachable(self, error: ApiError) -> Self {
        lock(&self.script).push_back(Err(error));
        self
    }

    /// Requests received so far
    #[must_use]
    pub fn requests(&self) -> Vec<PaymentRequest> {
        lock(&self.requests).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl PaymentProvider for ScriptedPayment {
    async fn request_payment(&self, request: PaymentRequest) -> Result<PaymentOutcome, ApiError> {
        let number = lock(&self.requests).len() + 1;
        tracing::info!(
            order_id = %request.order_id,
            amount = request.amount.amount(),
            "Scripted payment requested"
        );
        lock(&self.requests).push(request);
        lock(&self.script).pop_front().unwrap_or_else(|| {
            Ok(PaymentOutcome::Success {
                booking_number: Some(BookingNumber::new(format!("T{number:08}"))),
            })
        })
    }
}
