//! Dependencies of the checkout reducer.

use crate::api::BookingApi;
use crate::channel::MessagePort;
use crate::config::Config;
use crate::payment::PaymentProvider;
use boxoffice_core::environment::Clock;
use std::sync::Arc;

/// Everything the checkout talks to
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Deadline comparisons
    pub clock: Arc<dyn Clock>,
    /// Booking server
    pub api: Arc<dyn BookingApi>,
    /// Payment provider SDK
    pub payment: Arc<dyn PaymentProvider>,
    /// Channel back to the host
    pub port: Arc<dyn MessagePort>,
    /// Timing and limits
    pub config: Config,
}

impl CheckoutEnvironment {
    /// Bundles the dependencies
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        api: Arc<dyn BookingApi>,
        payment: Arc<dyn PaymentProvider>,
        port: Arc<dyn MessagePort>,
        config: Config,
    ) -> Self {
        Self {
            clock,
            api,
            payment,
            port,
            config,
        }
    }
}
