//! Message transport between the checkout window and the host.
//!
//! [`MessagePort`] is the checkout side. [`local_channel`] wires an
//! in-process transport over tokio channels: the host gets a
//! [`LocalLauncher`] and a [`HostInbox`], and every window the launcher
//! opens is announced as a [`Launched`] carrying its [`LocalPort`].

use super::launch::LaunchSpec;
use super::message::CheckoutMessage;
use super::origin::Origin;
use super::window::{CheckoutWindow, WindowLauncher};
use super::ChannelError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{mpsc, watch};

/// Checkout side of the channel
pub trait MessagePort: Send + Sync {
    /// Sends `message` to the host
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] if the message cannot be encoded or the
    /// host is gone.
    fn post(&self, message: &CheckoutMessage) -> Result<(), ChannelError>;

    /// Closes the checkout window this port belongs to
    fn close_window(&self);
}

/// A message as received by the host, before any checks
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Origin declared by the sender
    pub origin: Origin,
    /// Raw payload
    pub data: String,
}

/// Host side receiver
#[derive(Debug)]
pub struct HostInbox {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl HostInbox {
    /// Next message; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }
}

/// In-process checkout window
#[derive(Debug)]
pub struct LocalWindow {
    spec: LaunchSpec,
    closed: watch::Sender<bool>,
    focused: AtomicUsize,
}

impl LocalWindow {
    fn new(spec: LaunchSpec) -> Self {
        Self {
            spec,
            closed: watch::Sender::new(false),
            focused: AtomicUsize::new(0),
        }
    }

    /// How the window was opened
    #[must_use]
    pub const fn spec(&self) -> &LaunchSpec {
        &self.spec
    }

    /// Simulates the user closing the window directly
    pub fn close_by_user(&self) {
        self.closed.send_replace(true);
    }

    /// Resolves once the window is closed, by anyone
    pub async fn closed(&self) {
        let mut closed = self.closed.subscribe();
        // the sender lives in `self`, so the wait cannot fail
        let _ = closed.wait_for(|closed| *closed).await;
    }

    /// Number of focus requests
    #[must_use]
    pub fn focus_count(&self) -> usize {
        self.focused.load(Ordering::SeqCst)
    }
}

impl CheckoutWindow for LocalWindow {
    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn focus(&self) {
        self.focused.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// Checkout side of an in-process window
#[derive(Debug, Clone)]
pub struct LocalPort {
    origin: Origin,
    tx: mpsc::UnboundedSender<InboundMessage>,
    window: Arc<LocalWindow>,
}

impl LocalPort {
    /// The window this port posts from
    #[must_use]
    pub fn window(&self) -> Arc<LocalWindow> {
        Arc::clone(&self.window)
    }
}

impl MessagePort for LocalPort {
    fn post(&self, message: &CheckoutMessage) -> Result<(), ChannelError> {
        let data = message.to_json()?;
        self.tx
            .send(InboundMessage {
                origin: self.origin.clone(),
                data,
            })
            .map_err(|_| ChannelError::Disconnected)
    }

    fn close_window(&self) {
        self.window.close();
    }
}

/// A window the launcher opened, handed to whoever runs the checkout flow
#[derive(Debug)]
pub struct Launched {
    /// Launch parameters
    pub spec: LaunchSpec,
    /// Checkout side port
    pub port: LocalPort,
}

/// In-process window launcher
#[derive(Debug)]
pub struct LocalLauncher {
    origin: Origin,
    tx: mpsc::UnboundedSender<InboundMessage>,
    launches: mpsc::UnboundedSender<Launched>,
    blocked: AtomicBool,
    opened: AtomicUsize,
    last: Mutex<Option<Arc<LocalWindow>>>,
}

impl LocalLauncher {
    /// Makes every following `open` fail as if blocked by the platform
    pub fn block_popups(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Number of windows opened
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Most recently opened window
    #[must_use]
    pub fn last_window(&self) -> Option<Arc<LocalWindow>> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Raw sender into the host inbox, for messages from arbitrary origins
    #[must_use]
    pub fn raw_sender(&self) -> mpsc::UnboundedSender<InboundMessage> {
        self.tx.clone()
    }
}

impl WindowLauncher for LocalLauncher {
    fn open(&self, spec: &LaunchSpec) -> Option<Arc<dyn CheckoutWindow>> {
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }
        let window = Arc::new(LocalWindow::new(spec.clone()));
        self.opened.fetch_add(1, Ordering::SeqCst);
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&window));

        let port = LocalPort {
            origin: self.origin.clone(),
            tx: self.tx.clone(),
            window: Arc::clone(&window),
        };
        if self
            .launches
            .send(Launched {
                spec: spec.clone(),
                port,
            })
            .is_err()
        {
            tracing::debug!(url = %spec.url, "Nobody is running launched checkout windows");
        }
        Some(window as Arc<dyn CheckoutWindow>)
    }
}

/// Both ends of an in-process channel
#[derive(Debug)]
pub struct LocalChannel {
    /// Host side launcher
    pub launcher: Arc<LocalLauncher>,
    /// Host side inbox
    pub inbox: HostInbox,
    /// Windows opened by the launcher
    pub launches: mpsc::UnboundedReceiver<Launched>,
}

/// Creates an in-process channel whose windows post from `origin`
#[must_use]
pub fn local_channel(origin: Origin) -> LocalChannel {
    let (tx, rx) = mpsc::unbounded_channel();
    let (launches_tx, launches) = mpsc::unbounded_channel();
    LocalChannel {
        launcher: Arc::new(LocalLauncher {
            origin,
            tx,
            launches: launches_tx,
            blocked: AtomicBool::new(false),
            opened: AtomicUsize::new(0),
            last: Mutex::new(None),
        }),
        inbox: HostInbox { rx },
        launches,
    }
}

/// Port that records what the checkout flow sent
#[derive(Debug, Default)]
pub struct RecordingPort {
    posted: Mutex<Vec<CheckoutMessage>>,
    closed: AtomicBool,
}

impl RecordingPort {
    /// Empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages posted so far
    #[must_use]
    pub fn posted(&self) -> Vec<CheckoutMessage> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether the window was closed
    #[must_use]
    pub fn window_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl MessagePort for RecordingPort {
    fn post(&self, message: &CheckoutMessage) -> Result<(), ChannelError> {
        self.posted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        Ok(())
    }

    fn close_window(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::channel::launch::CheckoutRequest;
    use crate::config::Config;
    use crate::types::{Performance, ScheduleId};

    fn spec() -> LaunchSpec {
        let request = CheckoutRequest {
            schedule_id: ScheduleId::new(42),
            performance: Performance::default(),
        };
        LaunchSpec::new(&request, &Config::default().window)
    }

    #[tokio::test]
    async fn port_posts_json_with_its_origin() {
        let mut channel = local_channel(Origin::new("http://localhost:3000"));
        channel.launcher.open(&spec()).unwrap();
        let launched = channel.launches.recv().await.unwrap();

        launched.port.post(&CheckoutMessage::SessionExpired).unwrap();
        let inbound = channel.inbox.recv().await.unwrap();
        assert_eq!(inbound.origin, Origin::new("http://localhost:3000"));
        assert_eq!(inbound.data, r#"{"type":"SESSION_EXPIRED"}"#);
    }

    #[tokio::test]
    async fn closing_through_port_closes_host_handle() {
        let mut channel = local_channel(Origin::new("http://localhost:3000"));
        let window = channel.launcher.open(&spec()).unwrap();
        let launched = channel.launches.recv().await.unwrap();
        assert!(!window.is_closed());
        launched.port.close_window();
        assert!(window.is_closed());
    }

    #[tokio::test]
    async fn closed_resolves_when_the_user_closes_the_window() {
        let mut channel = local_channel(Origin::new("http://localhost:3000"));
        channel.launcher.open(&spec()).unwrap();
        let window = channel.launches.recv().await.unwrap().port.window();

        let waiter = tokio::spawn({
            let window = Arc::clone(&window);
            async move { window.closed().await }
        });
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        window.close_by_user();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn blocked_launcher_opens_nothing() {
        let channel = local_channel(Origin::new("http://localhost:3000"));
        channel.launcher.block_popups(true);
        assert!(channel.launcher.open(&spec()).is_none());
        assert_eq!(channel.launcher.open_count(), 0);
    }
}
