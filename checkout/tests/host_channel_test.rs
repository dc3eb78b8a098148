//! Host and checkout window talking over the in-process channel.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use boxoffice_runtime::Store;
use checkout::api::Endpoint;
use checkout::channel::{
    forward_inbox, ChannelError, CheckoutRequest, CheckoutWindow, HostAction, HostEnvironment,
    HostError, HostReducer, HostState, HostStore, InboundMessage, Launched, LocalLauncher,
    LocalPort, LocalWindow, MessagePort, RecordingPort,
};
use checkout::payment::ScriptedPayment;
use checkout::{
    cancel_on_close, CheckoutAction, CheckoutMessage, Config, Origin, Performance, Step,
    TerminalOutcome,
};
use common::{Harness, SCHEDULE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;

struct Host {
    store: HostStore,
    launcher: Arc<LocalLauncher>,
    launches: mpsc::UnboundedReceiver<Launched>,
    actions: broadcast::Receiver<HostAction>,
}

impl Host {
    fn new() -> Self {
        let config = Config::default();
        let channel = checkout::channel::local_channel(Origin::new(&config.origin));
        let store: HostStore = Store::new(
            HostState::new(),
            HostReducer::new(),
            HostEnvironment::new(channel.launcher.clone(), config),
        );
        tokio::spawn(forward_inbox(channel.inbox, store.clone()));
        let actions = store.subscribe_actions();
        Self {
            store,
            launcher: channel.launcher,
            launches: channel.launches,
            actions,
        }
    }

    async fn open(&self) {
        let mut handle = self
            .store
            .send(HostAction::OpenCheckout { request: request() })
            .await
            .unwrap();
        handle.wait().await;
    }

    /// Opens the window and starts a checkout flow inside it
    async fn launch(&mut self) -> (Harness, Arc<LocalWindow>) {
        self.launch_over(|port| Arc::new(port) as Arc<dyn MessagePort>).await
    }

    /// Like [`Host::launch`], with the checkout posting through `wrap(port)`
    async fn launch_over(
        &mut self,
        wrap: impl FnOnce(LocalPort) -> Arc<dyn MessagePort>,
    ) -> (Harness, Arc<LocalWindow>) {
        self.open().await;
        let launched = self.launches.recv().await.unwrap();
        let window = launched.port.window();
        let checkout = Harness::with_port(
            |api| api,
            ScriptedPayment::new(),
            wrap(launched.port),
            Arc::new(RecordingPort::new()),
        );
        tokio::spawn(cancel_on_close(Arc::clone(&window), checkout.store.clone()));
        (checkout, window)
    }

    async fn finished(&mut self) -> TerminalOutcome {
        tokio::time::timeout(Duration::from_secs(60), async {
            loop {
                match self.actions.recv().await {
                    Ok(HostAction::CheckoutFinished { outcome }) => return outcome,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {},
                    Err(broadcast::error::RecvError::Closed) => panic!("host store dropped"),
                }
            }
        })
        .await
        .expect("host never finished the checkout")
    }
}

/// Port whose messages take `delay` to reach the host
struct SlowPort {
    inner: LocalPort,
    delay: Duration,
}

impl MessagePort for SlowPort {
    fn post(&self, message: &CheckoutMessage) -> Result<(), ChannelError> {
        let inner = self.inner.clone();
        let message = message.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.post(&message).unwrap();
        });
        Ok(())
    }

    fn close_window(&self) {
        self.inner.close_window();
    }
}

fn request() -> CheckoutRequest {
    CheckoutRequest {
        schedule_id: SCHEDULE,
        performance: Performance {
            title: "Spring Concert".to_string(),
            date: "2025-05-03 19:00".to_string(),
            venue: "Olympic Hall".to_string(),
        },
    }
}

#[tokio::test(start_paused = true)]
async fn closing_the_window_reads_as_cancelled() {
    let mut host = Host::new();
    let (checkout, window) = host.launch().await;
    checkout.reach_delivery(&[101, 102]).await;

    let closed_at = Instant::now();
    window.close_by_user();
    let outcome = host.finished().await;

    assert!(closed_at.elapsed() <= Duration::from_millis(500));
    assert_eq!(outcome, TerminalOutcome::Cancelled);
    assert!(!host.store.state(HostState::is_open).await);
}

#[tokio::test(start_paused = true)]
async fn closing_the_window_ends_the_server_session() {
    let mut host = Host::new();
    let (checkout, window) = host.launch().await;
    checkout.reach_delivery(&[101, 102]).await;

    window.close_by_user();
    checkout.until(|s| s.step() == Step::Closed).await;
    let pings = checkout.api.count(Endpoint::Ping);
    tokio::time::sleep(Duration::from_secs(120)).await;

    let state = checkout.store.state(Clone::clone).await;
    assert_eq!(state.outcome, Some(TerminalOutcome::Cancelled));
    assert!(!state.has_live_timers());
    assert_eq!(checkout.api.count(Endpoint::Ping), pings);
    assert!(checkout.api.held_seats().is_empty());
    assert_eq!(checkout.api.count(Endpoint::LeaveSession), 1);
    assert_eq!(host.finished().await, TerminalOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn silent_close_is_reported_after_the_grace_period() {
    let mut host = Host::new();
    host.open().await;
    let window = host.launcher.last_window().unwrap();

    let closed_at = Instant::now();
    window.close_by_user();
    assert_eq!(host.finished().await, TerminalOutcome::Cancelled);

    let config = Config::default();
    let elapsed = closed_at.elapsed();
    assert!(elapsed >= config.close_grace());
    assert!(elapsed <= config.window_poll_interval() + config.close_grace());
}

#[tokio::test(start_paused = true)]
async fn late_outcome_message_beats_the_closed_window() {
    let mut host = Host::new();
    let (checkout, window) = host
        .launch_over(|port| {
            Arc::new(SlowPort {
                inner: port,
                delay: Duration::from_millis(600),
            }) as Arc<dyn MessagePort>
        })
        .await;
    checkout.reach_payment(&[101]).await;

    checkout.send(CheckoutAction::RequestPayment).await;
    let outcome = host.finished().await;

    assert_eq!(checkout.step().await, Step::Complete);
    assert!(matches!(outcome, TerminalOutcome::Completed { .. }));
    assert!(window.is_closed());
}

#[tokio::test(start_paused = true)]
async fn explicit_cancel_matches_a_closed_window() {
    let mut host = Host::new();
    let (checkout, window) = host.launch().await;
    checkout.reach_delivery(&[101]).await;

    checkout.send(CheckoutAction::Cancel).await;
    let outcome = host.finished().await;

    assert_eq!(outcome, TerminalOutcome::Cancelled);
    assert_eq!(
        host.store.state(|s| s.outcome.clone()).await,
        Some(TerminalOutcome::Cancelled)
    );
    assert!(window.is_closed());
}

#[tokio::test(start_paused = true)]
async fn foreign_and_malformed_messages_are_ignored() {
    let mut host = Host::new();
    host.open().await;
    let raw = host.launcher.raw_sender();
    let cancelled = CheckoutMessage::BookingCancelled.to_json().unwrap();

    raw.send(InboundMessage {
        origin: Origin::new("https://tickets.example.net"),
        data: cancelled.clone(),
    })
    .unwrap();
    raw.send(InboundMessage {
        origin: Origin::new(&Config::default().origin),
        data: r#"{"type":"BOOKING_COMPLETED"}"#.to_string(),
    })
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = host.store.state(Clone::clone).await;
    assert!(state.is_open());
    assert_eq!(state.outcome, None);

    raw.send(InboundMessage {
        origin: Origin::new(&Config::default().origin),
        data: cancelled,
    })
    .unwrap();
    assert_eq!(host.finished().await, TerminalOutcome::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn second_open_focuses_the_existing_window() {
    let host = Host::new();
    host.open().await;
    host.open().await;

    assert_eq!(host.launcher.open_count(), 1);
    assert_eq!(host.launcher.last_window().unwrap().focus_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn blocked_popup_is_reported() {
    let host = Host::new();
    host.launcher.block_popups(true);
    host.open().await;

    let state = host.store.state(Clone::clone).await;
    assert!(!state.is_open());
    assert!(!state.opening);
    assert_eq!(state.last_error, Some(HostError::PopupBlocked));

    host.launcher.block_popups(false);
    host.open().await;
    let state = host.store.state(Clone::clone).await;
    assert!(state.is_open());
    assert_eq!(state.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn completed_booking_reaches_the_host_once() {
    let mut host = Host::new();
    let (checkout, window) = host.launch().await;
    checkout.reach_payment(&[103]).await;
    let reservation_id = checkout.store.state(|s| s.reservation_id).await.unwrap();

    checkout.send(CheckoutAction::RequestPayment).await;
    let outcome = host.finished().await;

    assert_eq!(checkout.step().await, Step::Complete);
    assert!(matches!(
        outcome,
        TerminalOutcome::Completed { reservation_id: id, booking_number: Some(_) } if id == reservation_id
    ));
    assert!(window.is_closed());

    // the poll sees the closed window afterwards but the outcome stands
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(host.store.state(|s| s.outcome.clone()).await, Some(outcome));
}
