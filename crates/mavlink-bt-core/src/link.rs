//! Link state machine state
//!
//! Every piece of per-connection data (identity, transport handle, write
//! queue, MTU, pending deadline) lives inside the [`LinkState`] variant it
//! belongs to. Leaving a state moves or drops its payload, so a closed handle
//! can never be observed again.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::protocol::Mtu;
use crate::queue::WriteQueue;
use crate::transport::{GattClient, SppSocket, TransportKind};

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// Remote peripheral targeted by the current attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkIdentity {
    pub address: String,
    /// Learned once the transport connects
    pub name: Option<String>,
    pub transport: TransportKind,
}

impl LinkIdentity {
    pub fn new(address: String, transport: TransportKind) -> Self {
        Self {
            address,
            name: None,
            transport,
        }
    }

    /// Name reported upward; falls back to the address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.address)
    }

    pub fn matches(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

// ----------------------------------------------------------------------------
// Phase
// ----------------------------------------------------------------------------

/// State names of the link state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkPhase {
    Idle,
    Scanning,
    GattConnecting,
    DiscoveringServices,
    NegotiatingMtu,
    Ready,
    Disconnecting,
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LinkPhase::Idle => "idle",
            LinkPhase::Scanning => "scanning",
            LinkPhase::GattConnecting => "connecting GATT",
            LinkPhase::DiscoveringServices => "discovering services",
            LinkPhase::NegotiatingMtu => "negotiating MTU",
            LinkPhase::Ready => "ready",
            LinkPhase::Disconnecting => "disconnecting",
        };
        f.write_str(text)
    }
}

/// Point-in-time view of the link for host diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub phase: LinkPhase,
    pub identity: Option<LinkIdentity>,
    /// Negotiated payload size; only set for a ready BLE link
    pub mtu: Option<Mtu>,
    /// Fragments waiting behind the in-flight write
    pub queued_fragments: usize,
    pub write_in_flight: bool,
}

// ----------------------------------------------------------------------------
// Deadlines
// ----------------------------------------------------------------------------

/// Timer task posting a deadline into the inbox; aborted when dropped
#[derive(Debug)]
pub(crate) struct Deadline(JoinHandle<()>);

impl Deadline {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self(handle)
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.0.abort();
    }
}

// ----------------------------------------------------------------------------
// State
// ----------------------------------------------------------------------------

/// Transport handle of a ready link
pub(crate) enum ActiveLink {
    Ble {
        client: Box<dyn GattClient>,
        queue: WriteQueue,
        mtu: Mtu,
    },
    Spp {
        socket: Box<dyn SppSocket>,
    },
}

/// The single current connection attempt
#[derive(Default)]
pub(crate) enum LinkState {
    #[default]
    Idle,
    Scanning {
        identity: LinkIdentity,
        deadline: Deadline,
    },
    GattConnecting {
        identity: LinkIdentity,
        client: Box<dyn GattClient>,
        deadline: Option<Deadline>,
    },
    DiscoveringServices {
        identity: LinkIdentity,
        client: Box<dyn GattClient>,
        deadline: Option<Deadline>,
    },
    NegotiatingMtu {
        identity: LinkIdentity,
        client: Box<dyn GattClient>,
        write_without_response: bool,
        deadline: Option<Deadline>,
    },
    Ready {
        identity: LinkIdentity,
        link: ActiveLink,
    },
    Disconnecting {
        identity: LinkIdentity,
    },
}

impl LinkState {
    pub(crate) fn phase(&self) -> LinkPhase {
        match self {
            LinkState::Idle => LinkPhase::Idle,
            LinkState::Scanning { .. } => LinkPhase::Scanning,
            LinkState::GattConnecting { .. } => LinkPhase::GattConnecting,
            LinkState::DiscoveringServices { .. } => LinkPhase::DiscoveringServices,
            LinkState::NegotiatingMtu { .. } => LinkPhase::NegotiatingMtu,
            LinkState::Ready { .. } => LinkPhase::Ready,
            LinkState::Disconnecting { .. } => LinkPhase::Disconnecting,
        }
    }

    pub(crate) fn identity(&self) -> Option<&LinkIdentity> {
        match self {
            LinkState::Idle => None,
            LinkState::Scanning { identity, .. }
            | LinkState::GattConnecting { identity, .. }
            | LinkState::DiscoveringServices { identity, .. }
            | LinkState::NegotiatingMtu { identity, .. }
            | LinkState::Ready { identity, .. }
            | LinkState::Disconnecting { identity } => Some(identity),
        }
    }

    pub(crate) fn snapshot(&self) -> LinkSnapshot {
        let (mtu, queued_fragments, write_in_flight) = match self {
            LinkState::Ready {
                link: ActiveLink::Ble { queue, mtu, .. },
                ..
            } => (Some(*mtu), queue.len(), queue.in_flight()),
            _ => (None, 0, false),
        };
        LinkSnapshot {
            phase: self.phase(),
            identity: self.identity().cloned(),
            mtu,
            queued_fragments,
            write_in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matching_ignores_case() {
        let identity = LinkIdentity::new("AA:BB:CC:DD:EE:FF".into(), TransportKind::Ble);
        assert!(identity.matches("aa:bb:cc:dd:ee:ff"));
        assert!(!identity.matches("AA:BB:CC:DD:EE:00"));
    }

    #[test]
    fn test_display_name_falls_back_to_address() {
        let mut identity = LinkIdentity::new("AA:BB:CC:DD:EE:FF".into(), TransportKind::Ble);
        assert_eq!(identity.display_name(), "AA:BB:CC:DD:EE:FF");
        identity.name = Some("SkyLink".into());
        assert_eq!(identity.display_name(), "SkyLink");
    }

    #[test]
    fn test_idle_snapshot() {
        let snapshot = LinkState::Idle.snapshot();
        assert_eq!(snapshot.phase, LinkPhase::Idle);
        assert!(snapshot.identity.is_none());
        assert!(snapshot.mtu.is_none());
    }
}
