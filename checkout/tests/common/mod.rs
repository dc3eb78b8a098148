//! Shared fixtures for the checkout integration tests.
//!
//! Every test runs with tokio time paused, so queue polls, heartbeats and
//! clock ticks fire as soon as the runtime is idle. Session deadlines are
//! read from a [`TestClock`] that only moves when a test advances it.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use boxoffice_runtime::Store;
use boxoffice_testing::TestClock;
use checkout::api::ScriptedApi;
use checkout::channel::{MessagePort, RecordingPort};
use checkout::payment::ScriptedPayment;
use checkout::{
    CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState, CheckoutStore, Config,
    DeliveryMethod, Recipient, ScheduleId, SeatId, Step,
};
use std::sync::Arc;
use std::time::Duration;

pub const SCHEDULE: ScheduleId = ScheduleId::new(42);

/// Virtual time any single wait may take
const PATIENCE: Duration = Duration::from_secs(900);

/// A checkout store wired to scripted collaborators
pub struct Harness {
    pub clock: TestClock,
    pub api: Arc<ScriptedApi>,
    pub payment: Arc<ScriptedPayment>,
    pub port: Arc<RecordingPort>,
    pub store: CheckoutStore,
}

impl Harness {
    /// Default server that admits after positions 57 and 31
    pub fn new() -> Self {
        Self::build(|api| api.with_queue([57, 31]), ScriptedPayment::new())
    }

    pub fn build(api: impl FnOnce(ScriptedApi) -> ScriptedApi, payment: ScriptedPayment) -> Self {
        let port = Arc::new(RecordingPort::new());
        Self::with_port(api, payment, Arc::clone(&port) as Arc<dyn MessagePort>, port)
    }

    /// Harness posting through `port`; `recorder` is kept for inspection
    pub fn with_port(
        api: impl FnOnce(ScriptedApi) -> ScriptedApi,
        payment: ScriptedPayment,
        port: Arc<dyn MessagePort>,
        recorder: Arc<RecordingPort>,
    ) -> Self {
        let clock = TestClock::default();
        let api = Arc::new(api(ScriptedApi::new(Arc::new(clock.clone()))));
        let payment = Arc::new(payment);
        let env = CheckoutEnvironment::new(
            Arc::new(clock.clone()),
            Arc::clone(&api) as _,
            Arc::clone(&payment) as _,
            port,
            Config::default(),
        );
        let store = Store::new(CheckoutState::new(4), CheckoutReducer::new(), env);
        Self {
            clock,
            api,
            payment,
            port: recorder,
            store,
        }
    }

    /// Sends `action` and waits until its direct effects were reduced
    pub async fn send(&self, action: CheckoutAction) {
        let mut handle = self.store.send(action).await.unwrap();
        handle.wait_with_timeout(PATIENCE).await.unwrap();
    }

    pub async fn step(&self) -> Step {
        self.store.state(CheckoutState::step).await
    }

    /// Waits, letting virtual time run, until `predicate` holds for the state
    pub async fn until(&self, predicate: impl Fn(&CheckoutState) -> bool) {
        tokio::time::timeout(PATIENCE, async {
            while !self.store.state(&predicate).await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("checkout never reached the expected state");
    }

    /// Waits until the closing sequence finished
    pub async fn until_window_closed(&self) {
        tokio::time::timeout(PATIENCE, async {
            while !self.port.window_closed() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("checkout window was never closed");
    }

    /// Joins the queue and waits for the seat map
    pub async fn admit(&self) {
        self.send(CheckoutAction::JoinQueue {
            schedule_id: SCHEDULE,
        })
        .await;
        self.until(|s| s.step() == Step::Seats).await;
    }

    pub async fn select(&self, seats: &[u64]) {
        for seat in seats {
            self.send(CheckoutAction::SelectSeat {
                seat_id: SeatId::new(*seat),
            })
            .await;
        }
    }

    /// Admits, then holds `seats`
    pub async fn reach_delivery(&self, seats: &[u64]) {
        self.admit().await;
        self.select(seats).await;
        self.send(CheckoutAction::HoldSeats).await;
        assert_eq!(self.step().await, Step::Delivery);
    }

    /// Admits, holds `seats` and saves a mobile delivery
    pub async fn reach_payment(&self, seats: &[u64]) {
        self.reach_delivery(seats).await;
        self.send(CheckoutAction::SaveDelivery {
            method: DeliveryMethod::Mobile,
            recipient: recipient(),
        })
        .await;
        assert_eq!(self.step().await, Step::Payment);
    }
}

pub fn recipient() -> Recipient {
    Recipient {
        name: "Kim Minji".to_string(),
        phone: "010-1234-5678".to_string(),
        address: None,
    }
}

pub fn seat_ids(ids: &[u64]) -> Vec<SeatId> {
    ids.iter().copied().map(SeatId::new).collect()
}
