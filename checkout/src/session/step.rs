//! The checkout step machine.
//!
//! [`StepMachine::advance`] is the only way the step changes. It knows the
//! legal transitions and nothing else; side effects belong to the reducer.

use crate::types::Step;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Something that moves the checkout between steps
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepEvent {
    /// The queue admitted the user and the session is ready
    Admitted,
    /// Every selected seat is held
    HoldSucceeded,
    /// Delivery choice persisted
    DeliverySaved,
    /// User went back from delivery, seats released
    BackToSeats,
    /// User went back from payment
    BackToDelivery,
    /// The provider charged the buyer
    PaymentSucceeded,
    /// Cancel, fatal error or expiry
    Close,
}

/// Refused transition
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// The checkout already ended
    #[error("checkout already ended in {step}")]
    Terminal {
        /// Terminal step
        step: Step,
    },

    /// The event does not apply to the current step
    #[error("{event:?} is not allowed in {from}")]
    Invalid {
        /// Current step
        from: Step,
        /// Refused event
        event: StepEvent,
    },
}

/// Current step plus the transition table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMachine {
    current: Step,
}

impl StepMachine {
    /// Starts in `Queue`
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: Step::Queue,
        }
    }

    /// Current step
    #[must_use]
    pub const fn current(&self) -> Step {
        self.current
    }

    /// Whether the checkout ended
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Applies `event`, returning the new step.
    ///
    /// # Errors
    ///
    /// [`TransitionError::Terminal`] once `Complete` or `Closed` is reached,
    /// [`TransitionError::Invalid`] for any event the current step does not
    /// accept. The step is unchanged on error.
    pub fn advance(&mut self, event: StepEvent) -> Result<Step, TransitionError> {
        let from = self.current;
        if from.is_terminal() {
            return Err(TransitionError::Terminal { step: from });
        }

        let to = match (from, event) {
            (_, StepEvent::Close) => Step::Closed,
            (Step::Queue, StepEvent::Admitted) => Step::Seats,
            (Step::Seats, StepEvent::HoldSucceeded) | (Step::Payment, StepEvent::BackToDelivery) => {
                Step::Delivery
            },
            (Step::Delivery, StepEvent::DeliverySaved) => Step::Payment,
            (Step::Delivery, StepEvent::BackToSeats) => Step::Seats,
            (Step::Payment, StepEvent::PaymentSucceeded) => Step::Complete,
            _ => return Err(TransitionError::Invalid { from, event }),
        };

        tracing::debug!(%from, %to, ?event, "Step transition");
        self.current = to;
        Ok(to)
    }
}
