//! Booking session orchestrator.
//!
//! Takes a buyer from a virtual waiting queue, through holding contended
//! seats under a server deadline, to a completed payment, and reports the
//! result from the detached checkout window back to the host that opened it.
//!
//! # Architecture
//!
//! ```text
//!  Host process                          Checkout process
//! ┌──────────────────┐   LaunchSpec    ┌───────────────────────────────┐
//! │   HostReducer    │ ──────────────▶ │        CheckoutReducer        │
//! │ single window    │                 │ queue ─▶ seats ─▶ delivery ─▶ │
//! │ closure polling  │ ◀────────────── │ payment   (heartbeat, clock)  │
//! │ origin check     │ CheckoutMessage └───────────────────────────────┘
//! └──────────────────┘                         │
//!                                              ▼
//!                                   BookingApi / PaymentProvider
//! ```
//!
//! Both sides are reducers run by a `boxoffice_runtime::Store`; the server
//! and payment SDK are injected behind [`api::BookingApi`] and
//! [`payment::PaymentProvider`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod channel;
pub mod config;
pub mod payment;
pub mod selection;
pub mod session;
pub mod session_clock;
pub mod types;

pub use channel::{CheckoutMessage, HostAction, HostReducer, HostState, Origin};
pub use config::Config;
pub use session::{
    cancel_on_close, CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState,
    CheckoutStore,
};
pub use types::*;
