//! Checkout orchestrator.
//!
//! One [`CheckoutReducer`] drives a checkout from the waiting queue to a
//! terminal outcome:
//!
//! ```text
//! QUEUE ──admitted──▶ SEATS ──hold──▶ DELIVERY ──saved──▶ PAYMENT ──paid──▶ COMPLETE
//!                       ▲               │  ▲                │
//!                       └──released─────┘  └─────back───────┘
//!
//! any non-terminal step ──cancel / error / expiry──▶ CLOSED
//! ```
//!
//! The queue poll, heartbeat and session clock are [`Interval`]s re-armed
//! with `Effect::Delay`; closing stops all three in the same reduction, so
//! a tick that was already scheduled is dropped when it arrives. A window
//! closed by the user goes down the same closing path as a cancel.
//!
//! [`Interval`]: boxoffice_core::timer::Interval

mod actions;
mod environment;
mod heartbeat;
mod hold;
mod queue;
mod reducer;
mod state;
pub mod step;

pub use actions::CheckoutAction;
pub use environment::CheckoutEnvironment;
pub use reducer::CheckoutReducer;
pub use state::CheckoutState;
pub use step::{StepEvent, StepMachine, TransitionError};

use crate::channel::LocalWindow;
use boxoffice_core::effect::Effect;
use boxoffice_core::SmallVec;
use boxoffice_runtime::Store;
use std::sync::Arc;

type Effects = SmallVec<[Effect<CheckoutAction>; 4]>;

/// Store running one checkout
pub type CheckoutStore = Store<CheckoutState, CheckoutAction, CheckoutEnvironment, CheckoutReducer>;

/// Cancels the checkout in `store` once `window` is closed.
///
/// The checkout closes its own window when it finishes; that close reaches
/// a finished store and changes nothing.
pub async fn cancel_on_close(window: Arc<LocalWindow>, store: CheckoutStore) {
    window.closed().await;
    if let Err(error) = store.send(CheckoutAction::WindowClosed).await {
        tracing::debug!(%error, "Checkout store gone before its window closed");
    }
}
