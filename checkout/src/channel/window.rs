//! Handles to the detached checkout window.

use super::launch::LaunchSpec;
use std::fmt;
use std::sync::Arc;

/// A checkout window opened by the host
pub trait CheckoutWindow: Send + Sync + fmt::Debug {
    /// Whether the window is gone, however it was closed
    fn is_closed(&self) -> bool;

    /// Brings the window to the front
    fn focus(&self);

    /// Closes the window. Closing twice is harmless.
    fn close(&self);
}

/// Opens checkout windows
pub trait WindowLauncher: Send + Sync {
    /// Opens a window for `spec`; `None` when the platform blocked it
    fn open(&self, spec: &LaunchSpec) -> Option<Arc<dyn CheckoutWindow>>;
}
