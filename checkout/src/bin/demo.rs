//! Checkout demo
//!
//! Runs one booking end to end in a single process, with an in-memory
//! booking server and payment provider:
//! - Host opens the checkout window
//! - Queue admission after two polls
//! - Seat hold, going back (release), holding again
//! - Delivery, a cancelled payment sheet, then a successful payment
//! - Host receives the outcome and closes the window
//!
//! # Usage
//!
//! ```bash
//! CHECKOUT_QUEUE_POLL_MS=1000 cargo run --bin demo
//! ```

use anyhow::{Context, bail};
use boxoffice_core::environment::SystemClock;
use boxoffice_runtime::Store;
use checkout::api::ScriptedApi;
use checkout::channel::{
    CheckoutRequest, HostAction, HostEnvironment, HostReducer, HostState, HostStore,
    forward_inbox, local_channel,
};
use checkout::payment::{PaymentOutcome, ScriptedPayment};
use checkout::{
    cancel_on_close, CheckoutAction, CheckoutEnvironment, CheckoutReducer, CheckoutState,
    CheckoutStore, Config, DeliveryMethod, Origin, Performance, Recipient, ScheduleId, SeatId,
    Step,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const WAIT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,checkout=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    config.validate().context("invalid configuration")?;

    println!("\n🎫 ============================================");
    println!("   Checkout - Live Demo");
    println!("============================================\n");

    // ========== Host ==========
    let mut channel = local_channel(Origin::new(&config.origin));
    let host: HostStore = Store::new(
        HostState::new(),
        HostReducer::new(),
        HostEnvironment::new(channel.launcher.clone(), config.clone()),
    );
    tokio::spawn(forward_inbox(channel.inbox, host.clone()));
    let mut host_actions = host.subscribe_actions();

    let request = CheckoutRequest {
        schedule_id: ScheduleId::new(42),
        performance: Performance {
            title: "Spring Concert".to_string(),
            date: "2025-05-03 19:00".to_string(),
            venue: "Olympic Hall".to_string(),
        },
    };
    println!("1️⃣  Host opening checkout for schedule {}", request.schedule_id);
    host.send(HostAction::OpenCheckout { request }).await?;

    let launched = channel
        .launches
        .recv()
        .await
        .context("launcher closed before opening a window")?;
    println!("   ✓ Window opened: {}\n", launched.spec.window_features());

    // ========== Checkout window ==========
    let request = CheckoutRequest::from_url(&launched.spec.url)?;
    let window = launched.port.window();
    let clock = Arc::new(SystemClock);
    let api = Arc::new(
        ScriptedApi::new(clock.clone())
            .with_queue([57, 31])
            .with_performance(request.performance.clone()),
    );
    let payment = Arc::new(ScriptedPayment::new().then(PaymentOutcome::UserCancelled));
    let checkout: CheckoutStore = Store::new(
        CheckoutState::new(config.max_seats),
        CheckoutReducer::new(),
        CheckoutEnvironment::new(
            clock,
            api,
            payment,
            Arc::new(launched.port),
            config.clone(),
        ),
    );
    tokio::spawn(cancel_on_close(window, checkout.clone()));

    println!("2️⃣  Joining the queue...");
    checkout
        .send_and_wait_for(
            CheckoutAction::JoinQueue {
                schedule_id: request.schedule_id,
            },
            |action| {
                matches!(
                    action,
                    CheckoutAction::SessionBootstrapped { .. }
                        | CheckoutAction::BootstrapFailed { .. }
                        | CheckoutAction::QueueJoinFailed { .. }
                )
            },
            WAIT,
        )
        .await?;
    expect_step(&checkout, Step::Seats).await?;
    let (seats, remaining) = checkout
        .state(|s| (s.seats.len(), s.clock.display()))
        .await;
    println!("   ✓ Admitted: {seats} seats on sale, {remaining} left\n");

    println!("3️⃣  Holding seats 101 and 102...");
    hold(&checkout, &[101, 102]).await?;
    expect_step(&checkout, Step::Delivery).await?;
    println!("   ✓ Held, now choosing delivery\n");

    println!("4️⃣  Going back to seat selection...");
    checkout
        .send_and_wait_for(
            CheckoutAction::BackToSeats,
            |action| {
                matches!(
                    action,
                    CheckoutAction::SeatsReleased { .. } | CheckoutAction::ReleaseFailed { .. }
                )
            },
            WAIT,
        )
        .await?;
    expect_step(&checkout, Step::Seats).await?;
    let selected = checkout.state(|s| s.selection.ids().to_vec()).await;
    println!("   ✓ Released, selection kept: {selected:?}\n");

    println!("5️⃣  Holding again and saving delivery...");
    hold(&checkout, &[]).await?;
    checkout
        .send_and_wait_for(
            CheckoutAction::SaveDelivery {
                method: DeliveryMethod::Mobile,
                recipient: Recipient {
                    name: "Kim Minji".to_string(),
                    phone: "010-1234-5678".to_string(),
                    address: None,
                },
            },
            |action| {
                matches!(
                    action,
                    CheckoutAction::DeliverySaved { .. } | CheckoutAction::DeliveryFailed { .. }
                )
            },
            WAIT,
        )
        .await?;
    expect_step(&checkout, Step::Payment).await?;
    println!("   ✓ Delivery saved\n");

    println!("6️⃣  Paying (the first sheet gets closed by the buyer)...");
    pay(&checkout).await?;
    expect_step(&checkout, Step::Payment).await?;
    println!("   ✓ Still in payment after the cancelled sheet");
    pay(&checkout).await?;

    // ========== Outcome ==========
    let outcome = tokio::time::timeout(WAIT, async {
        loop {
            match host_actions.recv().await {
                Ok(HostAction::CheckoutFinished { outcome }) => return Ok(outcome),
                Ok(_) => {},
                Err(error) => return Err(error),
            }
        }
    })
    .await
    .context("host never heard back")??;

    println!("\n✅ Host received: {outcome:?}");
    println!(
        "   Checkout window closed: {}",
        !host.state(HostState::is_open).await
    );
    Ok(())
}

async fn expect_step(store: &CheckoutStore, expected: Step) -> anyhow::Result<()> {
    let (step, error) = store.state(|s| (s.step(), s.last_error.clone())).await;
    if step != expected {
        bail!("expected {expected}, checkout is in {step} ({error:?})");
    }
    Ok(())
}

/// Selects `seats` (none to keep the current selection) and holds them
async fn hold(store: &CheckoutStore, seats: &[u64]) -> anyhow::Result<()> {
    for seat in seats {
        store
            .send(CheckoutAction::SelectSeat {
                seat_id: SeatId::new(*seat),
            })
            .await?;
    }
    store
        .send_and_wait_for(
            CheckoutAction::HoldSeats,
            |action| {
                matches!(
                    action,
                    CheckoutAction::HoldResolved { .. } | CheckoutAction::HoldFailed { .. }
                )
            },
            WAIT,
        )
        .await?;
    Ok(())
}

async fn pay(store: &CheckoutStore) -> anyhow::Result<()> {
    store
        .send_and_wait_for(
            CheckoutAction::RequestPayment,
            |action| {
                matches!(
                    action,
                    CheckoutAction::PaymentResolved { .. } | CheckoutAction::PaymentFailed { .. }
                )
            },
            WAIT,
        )
        .await?;
    Ok(())
}
