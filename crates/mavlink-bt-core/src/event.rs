//! Lifecycle events reported to the owning application

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

/// Upward notification about the single active link
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkEvent {
    /// The link reached ready. `name` falls back to the address when the
    /// peripheral did not report one.
    Connected {
        address: String,
        name: String,
        is_ble: bool,
    },
    /// An attempt ended before the link became ready
    ConnectionFailed {
        address: String,
        message: String,
        is_ble: bool,
    },
    /// A link that had become ready (or a pending attempt the caller
    /// cancelled) was torn down
    Disconnected {
        address: String,
        message: String,
        is_ble: bool,
    },
}

impl LinkEvent {
    pub fn address(&self) -> &str {
        match self {
            LinkEvent::Connected { address, .. }
            | LinkEvent::ConnectionFailed { address, .. }
            | LinkEvent::Disconnected { address, .. } => address,
        }
    }

    pub fn is_ble(&self) -> bool {
        match self {
            LinkEvent::Connected { is_ble, .. }
            | LinkEvent::ConnectionFailed { is_ble, .. }
            | LinkEvent::Disconnected { is_ble, .. } => *is_ble,
        }
    }
}

// ----------------------------------------------------------------------------
// Event Sink
// ----------------------------------------------------------------------------

pub type EventSender = mpsc::UnboundedSender<LinkEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<LinkEvent>;

pub fn create_event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Consumer of link events. Called on the forwarder worker; implementations
/// must not block.
pub trait EventSink: Send + 'static {
    fn emit(&self, event: LinkEvent);
}

impl EventSink for EventSender {
    fn emit(&self, event: LinkEvent) {
        if let Err(e) = self.send(event) {
            debug!("Event receiver dropped, discarding {:?}", e.0);
        }
    }
}

/// Adapts a callback (for example a host-side listener binding) into a sink
pub struct CallbackSink<F>(pub F);

impl<F> EventSink for CallbackSink<F>
where
    F: Fn(LinkEvent) + Send + 'static,
{
    fn emit(&self, event: LinkEvent) {
        (self.0)(event)
    }
}
