//! Messaging between the host and the detached checkout window.
//!
//! The checkout window reports exactly one terminal outcome to the host.
//! Everything here is transport-neutral except [`transport`], which
//! provides an in-process implementation over tokio channels.

use thiserror::Error;

pub mod host;
pub mod launch;
pub mod message;
pub mod origin;
pub mod transport;
pub mod window;

pub use host::{
    forward_inbox, HostAction, HostEnvironment, HostError, HostReducer, HostState, HostStore,
};
pub use launch::{CheckoutRequest, LaunchSpec, WindowGeometry};
pub use message::{CheckoutMessage, Envelope, MessageKind};
pub use origin::Origin;
pub use transport::{
    local_channel, HostInbox, InboundMessage, Launched, LocalChannel, LocalLauncher, LocalPort,
    LocalWindow, MessagePort, RecordingPort,
};
pub use window::{CheckoutWindow, WindowLauncher};

/// Channel protocol or transport failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// Payload could not be decoded
    #[error("malformed message: {0}")]
    Malformed(String),

    /// The other side is gone
    #[error("channel disconnected")]
    Disconnected,
}
