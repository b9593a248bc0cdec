use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::{InboundFrame, OutboundFrame};

use super::address::SessionAddress;

/// Outbound frames queued but not yet written to the socket.
const OUTBOUND_BUFFER: usize = 64;

/// Lifecycle of the single streaming connection.
///
/// There is no reconnecting state: every failure terminates at `Closed`
/// and recovery takes an explicit new `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

impl ConnectionState {
    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Closed => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Open => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Closed => write!(f, "closed"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
        }
    }
}

/// Snapshot of the live handle's attributes.
#[derive(Debug, Clone)]
pub struct TransportDiagnostics {
    pub state: ConnectionState,
    pub address: Option<String>,
    pub pending_outbound: bool,
}

/// Owns zero-or-one live WebSocket connection.
///
/// The transport is the only component that touches the raw socket. All
/// operations return without blocking; lifecycle outcomes surface through
/// `state()` and the inbound frame channel handed to `connect`.
#[derive(Debug)]
pub struct SessionTransport {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    state: AtomicU8,
    // Bumped whenever the current handle is invalidated. A connection task
    // whose generation is stale may no longer transition state or deliver
    // frames.
    generation: AtomicU64,
    handle: Mutex<Option<HandleSlot>>,
}

#[derive(Debug)]
struct HandleSlot {
    address: String,
    outbound: mpsc::Sender<OutboundFrame>,
    shutdown: watch::Sender<bool>,
}

impl SessionTransport {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(ConnectionState::Closed.as_u8()),
                generation: AtomicU64::new(0),
                handle: Mutex::new(None),
            }),
        }
    }

    /// Open a connection against `address`, delivering inbound frames to
    /// `frames`. Any live handle is closed first, together with its
    /// consumer binding, so a frame meant for the old consumer can never
    /// reach the new one.
    pub fn connect(&self, address: SessionAddress, frames: mpsc::Sender<InboundFrame>) {
        let mut slot = self
            .shared
            .handle
            .lock()
            .expect("connection handle lock poisoned");
        if slot.is_some() {
            debug!("Superseding live connection before dialing {}", address);
        }
        self.shared.release_current(&mut slot);
        let generation = self.shared.generation.load(Ordering::SeqCst);
        self.shared
            .state
            .store(ConnectionState::Connecting.as_u8(), Ordering::SeqCst);

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let connection_id = Uuid::new_v4().to_string();
        info!("Connection {} dialing {}", connection_id, address);

        *slot = Some(HandleSlot {
            address: address.to_string(),
            outbound: outbound_tx,
            shutdown: shutdown_tx,
        });
        tokio::spawn(run_connection(
            Arc::clone(&self.shared),
            generation,
            connection_id,
            address,
            frames,
            outbound_rx,
            shutdown_rx,
        ));
    }

    /// Close the live connection, if any. Safe to call repeatedly; the
    /// handle slot is cleared before this returns, so a following
    /// `connect` never sees a stale handle.
    pub fn disconnect(&self) {
        let mut slot = self
            .shared
            .handle
            .lock()
            .expect("connection handle lock poisoned");
        if slot.is_none() {
            debug!("Disconnect with no live connection, nothing to do");
            return;
        }
        self.shared.release_current(&mut slot);
    }

    /// Queue the full current document content for sending. Fire and
    /// forget: with no open connection (or a full queue) the frame is
    /// dropped and the drop is only visible in the logs.
    pub fn send_message(&self, payload: &str) {
        let slot = self
            .shared
            .handle
            .lock()
            .expect("connection handle lock poisoned");
        match slot.as_ref() {
            Some(handle) if self.state() == ConnectionState::Open => {
                if let Err(e) = handle.outbound.try_send(OutboundFrame::from(payload)) {
                    warn!("Dropping outbound frame, send queue unavailable: {}", e);
                }
            }
            _ => {
                warn!("Dropping outbound frame, no open connection");
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.shared.state.load(Ordering::SeqCst))
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn diagnostics(&self) -> TransportDiagnostics {
        let slot = self
            .shared
            .handle
            .lock()
            .expect("connection handle lock poisoned");
        TransportDiagnostics {
            state: self.state(),
            address: slot.as_ref().map(|handle| handle.address.clone()),
            pending_outbound: slot
                .as_ref()
                .map(|handle| handle.outbound.capacity() < handle.outbound.max_capacity())
                .unwrap_or(false),
        }
    }
}

impl Default for SessionTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Shared {
    /// Invalidate and release the current handle. The caller holds the
    /// slot lock, so invalidation and consumer replacement stay one
    /// ordered step.
    fn release_current(&self, slot: &mut Option<HandleSlot>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(handle) = slot.take() {
            let _ = handle.shutdown.send(true);
            info!("Closed connection against {}", handle.address);
        }
        self.state
            .store(ConnectionState::Closed.as_u8(), Ordering::SeqCst);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Transition to open, unless this connection was superseded or
    /// disconnected while the handshake was in flight.
    fn mark_open_if_current(&self, generation: u64) -> bool {
        let _slot = self
            .handle
            .lock()
            .expect("connection handle lock poisoned");
        if !self.is_current(generation) {
            return false;
        }
        self.state
            .store(ConnectionState::Open.as_u8(), Ordering::SeqCst);
        true
    }

    /// Terminal transition driven by the connection task itself (dial
    /// failure, peer close or transport error).
    fn close_if_current(&self, generation: u64) {
        let mut slot = self
            .handle
            .lock()
            .expect("connection handle lock poisoned");
        if !self.is_current(generation) {
            return;
        }
        *slot = None;
        self.state
            .store(ConnectionState::Closed.as_u8(), Ordering::SeqCst);
    }
}

async fn run_connection(
    shared: Arc<Shared>,
    generation: u64,
    connection_id: String,
    address: SessionAddress,
    frames: mpsc::Sender<InboundFrame>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    mut shutdown: watch::Receiver<bool>,
) {
    let stream = tokio::select! {
        biased;
        _ = shutdown.changed() => {
            debug!("Connection {} cancelled before the handshake finished", connection_id);
            return;
        }
        result = connect_async(address.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                error!("Connection {} failed to open {}: {}", connection_id, address, e);
                shared.close_if_current(generation);
                return;
            }
        }
    };

    let (mut sink, mut source) = stream.split();
    if !shared.mark_open_if_current(generation) {
        debug!("Connection {} superseded during the handshake", connection_id);
        let _ = sink.close().await;
        return;
    }
    info!("Connection {} open against {}", connection_id, address);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                debug!("Connection {} shutting down", connection_id);
                break;
            }
            frame = outbound.recv() => match frame {
                Some(frame) => {
                    if let Err(e) = sink.send(Message::Text(frame.into_payload().into())).await {
                        warn!("Connection {} failed to send frame: {}", connection_id, e);
                        break;
                    }
                }
                None => break,
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if !shared.is_current(generation) {
                        break;
                    }
                    if frames.send(InboundFrame(text.to_string())).await.is_err() {
                        debug!("Connection {} inbound consumer dropped", connection_id);
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!("Connection {} closed by peer", connection_id);
                    break;
                }
                // Binary and control frames carry no document content.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!("Connection {} transport error: {}", connection_id, e);
                    break;
                }
            },
        }
    }

    let _ = sink.close().await;
    shared.close_if_current(generation);
}
