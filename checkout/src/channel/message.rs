//! Wire format of checkout outcome messages.
//!
//! Every message is a JSON envelope `{ "type": ..., "payload": ... }` with
//! an upper-case type tag and camelCase payload fields. The payload is
//! omitted for kinds that carry no data.

use super::ChannelError;
use crate::types::{BookingNumber, ReservationId, TerminalOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope type tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Payment went through
    BookingCompleted,
    /// User cancelled
    BookingCancelled,
    /// Fatal error
    BookingError,
    /// Hold deadline passed
    SessionExpired,
}

/// Raw envelope as sent over the transport
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message kind
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Kind-specific data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletedPayload {
    reservation_id: ReservationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    booking_number: Option<BookingNumber>,
}

#[derive(Serialize, Deserialize)]
struct ErrorPayload {
    error: String,
}

/// Typed checkout outcome message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutMessage {
    /// `BOOKING_COMPLETED { reservationId, bookingNumber? }`
    BookingCompleted {
        /// Paid reservation
        reservation_id: ReservationId,
        /// Provider booking number
        booking_number: Option<BookingNumber>,
    },
    /// `BOOKING_CANCELLED {}`
    BookingCancelled,
    /// `BOOKING_ERROR { error }`
    BookingError {
        /// User-facing reason
        error: String,
    },
    /// `SESSION_EXPIRED {}`
    SessionExpired,
}

impl CheckoutMessage {
    /// Envelope tag for this message
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::BookingCompleted { .. } => MessageKind::BookingCompleted,
            Self::BookingCancelled => MessageKind::BookingCancelled,
            Self::BookingError { .. } => MessageKind::BookingError,
            Self::SessionExpired => MessageKind::SessionExpired,
        }
    }

    /// Wraps the message in its envelope
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] if the payload cannot be encoded.
    pub fn to_envelope(&self) -> Result<Envelope, ChannelError> {
        let payload = match self {
            Self::BookingCompleted {
                reservation_id,
                booking_number,
            } => Some(encode(&CompletedPayload {
                reservation_id: *reservation_id,
                booking_number: booking_number.clone(),
            })?),
            Self::BookingError { error } => Some(encode(&ErrorPayload {
                error: error.clone(),
            })?),
            Self::BookingCancelled | Self::SessionExpired => None,
        };
        Ok(Envelope {
            kind: self.kind(),
            payload,
        })
    }

    /// Unwraps a typed message from an envelope
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] when a required payload is missing
    /// or has the wrong shape.
    pub fn from_envelope(envelope: Envelope) -> Result<Self, ChannelError> {
        match envelope.kind {
            MessageKind::BookingCompleted => {
                let payload: CompletedPayload = decode(envelope.payload)?;
                Ok(Self::BookingCompleted {
                    reservation_id: payload.reservation_id,
                    booking_number: payload.booking_number,
                })
            },
            MessageKind::BookingError => {
                let payload: ErrorPayload = decode(envelope.payload)?;
                Ok(Self::BookingError {
                    error: payload.error,
                })
            },
            MessageKind::BookingCancelled => Ok(Self::BookingCancelled),
            MessageKind::SessionExpired => Ok(Self::SessionExpired),
        }
    }

    /// Encodes the message as a JSON envelope
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] if encoding fails.
    pub fn to_json(&self) -> Result<String, ChannelError> {
        serde_json::to_string(&self.to_envelope()?)
            .map_err(|error| ChannelError::Malformed(error.to_string()))
    }

    /// Decodes a JSON envelope
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Malformed`] for invalid JSON, an unknown type
    /// tag, or a bad payload.
    pub fn from_json(data: &str) -> Result<Self, ChannelError> {
        let envelope: Envelope = serde_json::from_str(data)
            .map_err(|error| ChannelError::Malformed(error.to_string()))?;
        Self::from_envelope(envelope)
    }
}

impl From<TerminalOutcome> for CheckoutMessage {
    fn from(outcome: TerminalOutcome) -> Self {
        match outcome {
            TerminalOutcome::Completed {
                reservation_id,
                booking_number,
            } => Self::BookingCompleted {
                reservation_id,
                booking_number,
            },
            TerminalOutcome::Cancelled => Self::BookingCancelled,
            TerminalOutcome::Errored { reason } => Self::BookingError { error: reason },
            TerminalOutcome::Expired => Self::SessionExpired,
        }
    }
}

impl From<CheckoutMessage> for TerminalOutcome {
    fn from(message: CheckoutMessage) -> Self {
        match message {
            CheckoutMessage::BookingCompleted {
                reservation_id,
                booking_number,
            } => Self::Completed {
                reservation_id,
                booking_number,
            },
            CheckoutMessage::BookingCancelled => Self::Cancelled,
            CheckoutMessage::BookingError { error } => Self::Errored { reason: error },
            CheckoutMessage::SessionExpired => Self::Expired,
        }
    }
}

fn encode<T: Serialize>(payload: &T) -> Result<Value, ChannelError> {
    serde_json::to_value(payload).map_err(|error| ChannelError::Malformed(error.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(payload: Option<Value>) -> Result<T, ChannelError> {
    let payload = payload.ok_or_else(|| ChannelError::Malformed("missing payload".to_string()))?;
    serde_json::from_value(payload).map_err(|error| ChannelError::Malformed(error.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn completed_uses_camel_case_payload() {
        let reservation_id = ReservationId::from_uuid(Uuid::nil());
        let message = CheckoutMessage::BookingCompleted {
            reservation_id,
            booking_number: Some(BookingNumber::new("T00000001")),
        };
        let value: Value = serde_json::from_str(&message.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "BOOKING_COMPLETED",
                "payload": {
                    "reservationId": "00000000-0000-0000-0000-000000000000",
                    "bookingNumber": "T00000001"
                }
            })
        );
    }

    #[test]
    fn cancelled_has_no_payload() {
        let json = CheckoutMessage::BookingCancelled.to_json().unwrap();
        assert_eq!(json, r#"{"type":"BOOKING_CANCELLED"}"#);
    }

    #[test]
    fn empty_payload_object_is_accepted_for_data_free_kinds() {
        let message =
            CheckoutMessage::from_json(r#"{"type":"SESSION_EXPIRED","payload":{}}"#).unwrap();
        assert_eq!(message, CheckoutMessage::SessionExpired);
    }

    #[test]
    fn booking_number_is_optional() {
        let message = CheckoutMessage::from_json(
            r#"{"type":"BOOKING_COMPLETED","payload":{"reservationId":"00000000-0000-0000-0000-000000000000"}}"#,
        )
        .unwrap();
        assert!(matches!(
            message,
            CheckoutMessage::BookingCompleted {
                booking_number: None,
                ..
            }
        ));
    }

    #[test]
    fn malformed_input_is_rejected() {
        for data in [
            "not json",
            r#"{"type":"BOOKING_REFUNDED"}"#,
            r#"{"type":"BOOKING_ERROR"}"#,
            r#"{"type":"BOOKING_ERROR","payload":{"error":42}}"#,
            r#"{"payload":{}}"#,
        ] {
            assert!(
                matches!(CheckoutMessage::from_json(data), Err(ChannelError::Malformed(_))),
                "accepted {data}"
            );
        }
    }

    #[test]
    fn outcome_conversion_preserves_reason() {
        let message = CheckoutMessage::from(TerminalOutcome::Errored {
            reason: "card declined".to_string(),
        });
        assert_eq!(
            message,
            CheckoutMessage::BookingError {
                error: "card declined".to_string()
            }
        );
        assert_eq!(
            TerminalOutcome::from(message),
            TerminalOutcome::Errored {
                reason: "card declined".to_string()
            }
        );
    }
}
