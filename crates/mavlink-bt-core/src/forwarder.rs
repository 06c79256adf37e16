//! Serialized forwarder worker and its command surface
//!
//! All link state is owned by one Tokio task consuming a single ordered
//! inbox. Commands from [`Forwarder`] handles, completions from transport
//! adapters and deadline timers are all posted into that inbox, so state is
//! only ever touched by the worker and events are handled in arrival order.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::ForwarderConfig;
use crate::error::{LinkError, Result};
use crate::event::{create_event_channel, EventReceiver, EventSink, LinkEvent};
use crate::link::{ActiveLink, Deadline, LinkIdentity, LinkPhase, LinkSnapshot, LinkState};
use crate::protocol::{Mtu, NUS_RX_CHARACTERISTIC_UUID, NUS_SERVICE_UUID};
use crate::queue::WriteQueue;
use crate::transport::{
    BleCentral, GattClient, GattService, SppConnector, TransportEvent, TransportEventSender,
    TransportKind,
};

/// Message reported when the owning application asks for a disconnect
const DISCONNECTED_BY_REQUEST: &str = "Disconnected by request";

/// Message reported when the peripheral drops the GATT connection
const PERIPHERAL_DISCONNECTED: &str = "peripheral disconnected";

// ----------------------------------------------------------------------------
// Inbox
// ----------------------------------------------------------------------------

/// Everything the worker reacts to
#[derive(Debug)]
pub(crate) enum Inbox {
    Command(Command),
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    ScanDeadline {
        generation: u64,
    },
    PhaseDeadline {
        generation: u64,
        phase: LinkPhase,
    },
}

#[derive(Debug)]
pub(crate) enum Command {
    Connect(String),
    Disconnect { notify: bool },
    Send(Vec<u8>),
    Snapshot(oneshot::Sender<LinkSnapshot>),
    Release,
}

// ----------------------------------------------------------------------------
// Command Surface
// ----------------------------------------------------------------------------

/// Handle used by the owning application and the byte producer.
///
/// Every method posts onto the worker and returns immediately; outcomes are
/// reported only through the event sink. Clones share one worker, which is
/// released once the last clone is dropped.
#[derive(Clone)]
pub struct Forwarder {
    inbox: mpsc::UnboundedSender<Inbox>,
    _release: Arc<ReleaseOnDrop>,
}

struct ReleaseOnDrop(mpsc::UnboundedSender<Inbox>);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        let _ = self.0.send(Inbox::Command(Command::Release));
    }
}

impl Forwarder {
    /// Spawn the worker on the current Tokio runtime
    pub fn spawn<S: EventSink>(
        config: ForwarderConfig,
        central: Box<dyn BleCentral>,
        spp: Box<dyn SppConnector>,
        sink: S,
    ) -> Result<(Self, JoinHandle<()>)> {
        config.validate()?;

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let task = ForwarderTask {
            config,
            central,
            spp,
            sink: Box::new(sink),
            state: LinkState::Idle,
            generation: 0,
            inbox_tx: inbox_tx.clone(),
            inbox: inbox_rx,
            running: true,
        };
        let worker = tokio::spawn(task.run());

        let forwarder = Self {
            inbox: inbox_tx.clone(),
            _release: Arc::new(ReleaseOnDrop(inbox_tx)),
        };
        Ok((forwarder, worker))
    }

    /// Spawn the worker with an unbounded event channel as its sink
    pub fn spawn_with_channel(
        config: ForwarderConfig,
        central: Box<dyn BleCentral>,
        spp: Box<dyn SppConnector>,
    ) -> Result<(Self, EventReceiver, JoinHandle<()>)> {
        let (events_tx, events_rx) = create_event_channel();
        let (forwarder, worker) = Self::spawn(config, central, spp, events_tx)?;
        Ok((forwarder, events_rx, worker))
    }

    /// Connect to `address`, silently superseding any current link
    pub fn connect(&self, address: impl Into<String>) {
        self.post(Command::Connect(address.into()));
    }

    /// Tear the current link down and report `Disconnected`
    pub fn disconnect(&self) {
        self.post(Command::Disconnect { notify: true });
    }

    /// Tear the current link down without reporting it
    pub fn disconnect_silently(&self) {
        self.post(Command::Disconnect { notify: false });
    }

    /// Forward `bytes` over the ready link.
    ///
    /// The bytes are copied before this returns, so the caller may reuse its
    /// buffer. Empty buffers, and buffers sent while no link is ready, are
    /// dropped without any report.
    pub fn send(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.post(Command::Send(bytes.to_vec()));
    }

    /// Current link state, once every earlier command has been handled.
    /// Returns `None` after the worker has stopped.
    pub async fn snapshot(&self) -> Option<LinkSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.post(Command::Snapshot(reply_tx));
        reply_rx.await.ok()
    }

    /// Silently tear down the link and stop the worker
    pub fn release(&self) {
        self.post(Command::Release);
    }

    fn post(&self, command: Command) {
        if let Err(e) = self.inbox.send(Inbox::Command(command)) {
            debug!("Forwarder worker stopped, dropping {:?}", e.0);
        }
    }
}

/// Upstream producer of raw MAVLink frames
pub trait RawFrameSink: Send + Sync {
    /// Hand one outbound frame to the link. The frame is copied before the
    /// call returns.
    fn on_raw_frame(&self, frame: &[u8]);
}

impl RawFrameSink for Forwarder {
    fn on_raw_frame(&self, frame: &[u8]) {
        self.send(frame);
    }
}

// ----------------------------------------------------------------------------
// Worker
// ----------------------------------------------------------------------------

struct ForwarderTask {
    config: ForwarderConfig,
    central: Box<dyn BleCentral>,
    spp: Box<dyn SppConnector>,
    sink: Box<dyn EventSink>,
    state: LinkState,
    /// Connection attempt counter; events stamped with an older value are stale
    generation: u64,
    inbox_tx: mpsc::UnboundedSender<Inbox>,
    inbox: mpsc::UnboundedReceiver<Inbox>,
    running: bool,
}

impl ForwarderTask {
    async fn run(mut self) {
        info!("Link forwarder starting");

        while self.running {
            let Some(message) = self.inbox.recv().await else {
                break;
            };
            match message {
                Inbox::Command(command) => self.handle_command(command).await,
                Inbox::Transport { generation, event } => {
                    if generation != self.generation {
                        debug!("Ignoring stale {:?} from attempt {}", event, generation);
                        continue;
                    }
                    self.handle_transport_event(event).await;
                }
                Inbox::ScanDeadline { generation } => {
                    if generation == self.generation
                        && self.state.phase() == LinkPhase::Scanning
                    {
                        warn!("BLE scan timed out");
                        self.fail_link(LinkError::ScanTimeout).await;
                    }
                }
                Inbox::PhaseDeadline { generation, phase } => {
                    if generation == self.generation && self.state.phase() == phase {
                        warn!("Link attempt timed out while {}", phase);
                        self.fail_link(LinkError::PhaseTimeout(phase)).await;
                    }
                }
            }
        }

        info!("Link forwarder stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(address) => self.connect(address).await,
            Command::Disconnect { notify } => self.close_link(notify).await,
            Command::Send(payload) => self.send(payload).await,
            Command::Snapshot(reply) => {
                let _ = reply.send(self.state.snapshot());
            }
            Command::Release => {
                self.close_link(false).await;
                self.running = false;
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ScanMatched { address } => self.on_scan_matched(address),
            TransportEvent::ScanFailed { code } => {
                if self.state.phase() == LinkPhase::Scanning {
                    error!("BLE scan failed: {}", code);
                    self.fail_link(LinkError::ScanError(code)).await;
                }
            }
            TransportEvent::ConnectionStateChanged {
                connected: true,
                name,
            } => self.on_gatt_connected(name),
            TransportEvent::ConnectionStateChanged {
                connected: false, ..
            } => {
                info!("BLE peripheral disconnected");
                self.fail_link(LinkError::TransportFault(PERIPHERAL_DISCONNECTED.to_string()))
                    .await;
            }
            TransportEvent::ConnectionError(e) => {
                error!("BLE connection error: {}", e);
                self.fail_link(e).await;
            }
            TransportEvent::ServicesDiscovered(services) => self.on_services_discovered(services),
            TransportEvent::ServiceDiscoveryFailed(e) => {
                if self.state.phase() == LinkPhase::DiscoveringServices {
                    error!("BLE service discovery failed: {}", e);
                    self.fail_link(e).await;
                }
            }
            TransportEvent::MtuChanged { mtu, success } => self.on_mtu_changed(mtu, success),
            TransportEvent::WriteCompleted {
                characteristic,
                success,
            } => self.on_write_completed(characteristic, success).await,
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    async fn connect(&mut self, address: String) {
        let transport = self.config.transport.resolve();
        if address.trim().is_empty() {
            warn!("Connect requested without a target address");
            self.report_failure(
                LinkIdentity::new(address, transport),
                false,
                LinkError::AddressInvalid,
            );
            return;
        }

        // superseding the current link is never reported
        self.close_link(false).await;

        let identity = LinkIdentity::new(address, transport);
        match transport {
            TransportKind::Ble => self.start_scan(identity),
            TransportKind::Spp => self.connect_spp(identity).await,
        }
    }

    fn start_scan(&mut self, identity: LinkIdentity) {
        info!("Starting BLE scan for address: {}", identity.address);
        if let Err(e) = self
            .central
            .start_scan(&identity.address, self.transport_events())
        {
            error!("Failed to start BLE scan: {}", e);
            self.abandon_attempt(identity, e);
            return;
        }

        let deadline = self.arm_deadline(
            self.config.scan_timeout,
            Inbox::ScanDeadline {
                generation: self.generation,
            },
        );
        self.state = LinkState::Scanning { identity, deadline };
    }

    async fn connect_spp(&mut self, mut identity: LinkIdentity) {
        info!("Opening SPP stream to {}", identity.address);
        match self.spp.connect(&identity.address).await {
            Ok((socket, name)) => {
                identity.name = name;
                info!("SPP link to {} ready", identity.address);
                self.sink.emit(LinkEvent::Connected {
                    address: identity.address.clone(),
                    name: identity.display_name().to_string(),
                    is_ble: false,
                });
                self.state = LinkState::Ready {
                    identity,
                    link: ActiveLink::Spp { socket },
                };
            }
            Err(e) => {
                error!("SPP connect to {} failed: {}", identity.address, e);
                self.abandon_attempt(identity, e);
            }
        }
    }

    async fn send(&mut self, payload: Vec<u8>) {
        let failure = match &mut self.state {
            LinkState::Ready {
                link: ActiveLink::Ble { client, queue, mtu },
                ..
            } => {
                let queued = queue.enqueue(&payload, *mtu);
                trace!("Queued {} bytes as {} fragments", payload.len(), queued);
                if queue.in_flight() || Self::dispatch_next(client, queue) {
                    None
                } else {
                    Some(LinkError::WriteFailed)
                }
            }
            LinkState::Ready {
                link: ActiveLink::Spp { socket },
                ..
            } => socket.write_all(&payload).await.err(),
            other => {
                trace!(
                    "Dropping {} bytes, no ready link ({})",
                    payload.len(),
                    other.phase()
                );
                None
            }
        };

        if let Some(e) = failure {
            error!("Link write failed: {}", e);
            self.fail_link(e).await;
        }
    }

    // ------------------------------------------------------------------------
    // BLE Transitions
    // ------------------------------------------------------------------------

    fn on_scan_matched(&mut self, address: String) {
        let identity = match std::mem::take(&mut self.state) {
            LinkState::Scanning { identity, deadline } if identity.matches(&address) => {
                drop(deadline);
                identity
            }
            other => {
                trace!("Ignoring scan result for {} while {}", address, other.phase());
                self.state = other;
                return;
            }
        };

        self.central.stop_scan();
        info!("BLE scan matched device: {}", address);

        match self
            .central
            .connect_gatt(&identity.address, self.transport_events())
        {
            Ok(client) => {
                let deadline = self.arm_phase_deadline(LinkPhase::GattConnecting);
                self.state = LinkState::GattConnecting {
                    identity,
                    client,
                    deadline,
                };
            }
            Err(e) => {
                error!("Failed to connect GATT to {}: {}", identity.address, e);
                self.abandon_attempt(identity, e);
            }
        }
    }

    fn on_gatt_connected(&mut self, name: Option<String>) {
        let (mut identity, mut client) = match std::mem::take(&mut self.state) {
            LinkState::GattConnecting {
                identity, client, ..
            } => (identity, client),
            other => {
                debug!("Ignoring GATT connected event while {}", other.phase());
                self.state = other;
                return;
            }
        };

        if name.is_some() {
            identity.name = name;
        }
        debug!("BLE connected to {}, discovering services", identity.address);

        match client.discover_services() {
            Ok(()) => {
                let deadline = self.arm_phase_deadline(LinkPhase::DiscoveringServices);
                self.state = LinkState::DiscoveringServices {
                    identity,
                    client,
                    deadline,
                };
            }
            Err(e) => {
                client.close();
                self.abandon_attempt(identity, e);
            }
        }
    }

    fn on_services_discovered(&mut self, services: Vec<GattService>) {
        let (identity, mut client) = match std::mem::take(&mut self.state) {
            LinkState::DiscoveringServices {
                identity, client, ..
            } => (identity, client),
            other => {
                debug!("Ignoring service discovery result while {}", other.phase());
                self.state = other;
                return;
            }
        };

        let Some(service) = services.iter().find(|s| s.uuid == NUS_SERVICE_UUID) else {
            client.close();
            self.abandon_attempt(identity, LinkError::ServiceNotFound);
            return;
        };
        let Some(rx) = service.characteristic(NUS_RX_CHARACTERISTIC_UUID) else {
            client.close();
            self.abandon_attempt(identity, LinkError::CharacteristicNotFound);
            return;
        };
        let write_without_response = rx.write_without_response;

        if client.request_mtu(self.config.requested_mtu) {
            debug!("BLE request MTU {}", self.config.requested_mtu);
            let deadline = self.arm_phase_deadline(LinkPhase::NegotiatingMtu);
            self.state = LinkState::NegotiatingMtu {
                identity,
                client,
                write_without_response,
                deadline,
            };
        } else {
            warn!("BLE MTU request failed, using fallback chunk size");
            self.finish_ble_connection(identity, client, Mtu::fallback(write_without_response));
        }
    }

    fn on_mtu_changed(&mut self, granted: u16, success: bool) {
        let (identity, client) = match std::mem::take(&mut self.state) {
            LinkState::NegotiatingMtu {
                identity, client, ..
            } => (identity, client),
            other => {
                debug!("Ignoring MTU change while {}", other.phase());
                self.state = other;
                return;
            }
        };

        let mtu = if success {
            debug!("BLE MTU changed: {}", granted);
            Mtu::from_granted(granted)
        } else {
            warn!("BLE MTU negotiation rejected, using minimum chunk size");
            Mtu::DEFAULT
        };
        self.finish_ble_connection(identity, client, mtu);
    }

    fn finish_ble_connection(
        &mut self,
        identity: LinkIdentity,
        client: Box<dyn GattClient>,
        mtu: Mtu,
    ) {
        info!("BLE link to {} ready, chunk size {}", identity.address, mtu);
        self.sink.emit(LinkEvent::Connected {
            address: identity.address.clone(),
            name: identity.display_name().to_string(),
            is_ble: true,
        });
        self.state = LinkState::Ready {
            identity,
            link: ActiveLink::Ble {
                client,
                queue: WriteQueue::new(),
                mtu,
            },
        };
    }

    async fn on_write_completed(&mut self, characteristic: Uuid, success: bool) {
        if characteristic != NUS_RX_CHARACTERISTIC_UUID {
            return;
        }

        let failure = match &mut self.state {
            LinkState::Ready {
                link: ActiveLink::Ble { client, queue, .. },
                ..
            } if queue.in_flight() => {
                if !success {
                    Some(LinkError::WriteFailed)
                } else if Self::dispatch_next(client, queue) {
                    None
                } else {
                    Some(LinkError::WriteFailed)
                }
            }
            other => {
                debug!("Ignoring write completion while {}", other.phase());
                None
            }
        };

        if let Some(e) = failure {
            error!("BLE write failed");
            self.fail_link(e).await;
        }
    }

    /// Issue the next queued fragment; false when the write could not start
    fn dispatch_next(client: &mut Box<dyn GattClient>, queue: &mut WriteQueue) -> bool {
        let Some(fragment) = queue.next_for_dispatch() else {
            return true;
        };
        let len = fragment.len();
        if client.write(fragment) {
            trace!("Dispatched {} byte fragment, {} queued", len, queue.len());
            true
        } else {
            error!("BLE writeCharacteristic failed to initiate");
            false
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Caller-initiated teardown to idle
    async fn close_link(&mut self, notify: bool) {
        let Some((identity, _)) = self.teardown().await else {
            return;
        };
        info!("Link to {} closed", identity.address);
        if notify {
            self.sink.emit(LinkEvent::Disconnected {
                address: identity.address,
                message: DISCONNECTED_BY_REQUEST.to_string(),
                is_ble: identity.transport.is_ble(),
            });
        }
    }

    /// Failure teardown to idle, reported exactly once
    async fn fail_link(&mut self, error: LinkError) {
        match self.teardown().await {
            Some((identity, reached_ready)) => self.report_failure(identity, reached_ready, error),
            None => debug!("Ignoring {} while idle", error),
        }
    }

    /// Report a failure for an attempt whose state was already taken apart
    fn abandon_attempt(&mut self, identity: LinkIdentity, error: LinkError) {
        self.generation += 1;
        self.state = LinkState::Idle;
        self.report_failure(identity, false, error);
    }

    /// Stop the scan, close the handle and flush queued writes; leaves the
    /// state idle and returns the identity that was active
    async fn teardown(&mut self) -> Option<(LinkIdentity, bool)> {
        let state = std::mem::take(&mut self.state);
        self.generation += 1;

        let identity = match state {
            LinkState::Idle => return None,
            LinkState::Scanning { identity, deadline } => {
                drop(deadline);
                self.central.stop_scan();
                identity
            }
            LinkState::GattConnecting {
                identity,
                mut client,
                ..
            }
            | LinkState::DiscoveringServices {
                identity,
                mut client,
                ..
            }
            | LinkState::NegotiatingMtu {
                identity,
                mut client,
                ..
            } => {
                client.close();
                identity
            }
            LinkState::Ready { identity, link } => {
                self.state = LinkState::Disconnecting {
                    identity: identity.clone(),
                };
                Self::close_active(link).await;
                self.state = LinkState::Idle;
                return Some((identity, true));
            }
            LinkState::Disconnecting { identity } => identity,
        };

        Some((identity, false))
    }

    async fn close_active(link: ActiveLink) {
        match link {
            ActiveLink::Ble {
                mut client,
                mut queue,
                ..
            } => {
                let dropped = queue.flush();
                if dropped > 0 {
                    debug!("Dropped {} queued fragments", dropped);
                }
                client.close();
            }
            ActiveLink::Spp { mut socket } => socket.close().await,
        }
    }

    fn report_failure(&mut self, identity: LinkIdentity, reached_ready: bool, error: LinkError) {
        let is_ble = identity.transport.is_ble();
        let message = error.to_string();
        if reached_ready {
            warn!("Link to {} lost: {}", identity.address, message);
            self.sink.emit(LinkEvent::Disconnected {
                address: identity.address,
                message,
                is_ble,
            });
        } else {
            warn!("Connection to {} failed: {}", identity.address, message);
            self.sink.emit(LinkEvent::ConnectionFailed {
                address: identity.address,
                message,
                is_ble,
            });
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn transport_events(&self) -> TransportEventSender {
        TransportEventSender {
            generation: self.generation,
            inbox: self.inbox_tx.clone(),
        }
    }

    fn arm_deadline(&self, after: Duration, message: Inbox) -> Deadline {
        let inbox = self.inbox_tx.clone();
        Deadline::new(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = inbox.send(message);
        }))
    }

    fn arm_phase_deadline(&self, phase: LinkPhase) -> Option<Deadline> {
        self.config.phase_timeout.map(|after| {
            self.arm_deadline(
                after,
                Inbox::PhaseDeadline {
                    generation: self.generation,
                    phase,
                },
            )
        })
    }
}
