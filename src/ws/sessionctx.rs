use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use crate::models::InboundFrame;

use super::address::SessionAddress;
use super::transport::{ConnectionState, SessionTransport, TransportDiagnostics};

/// Owns the session transport for one active editing area.
///
/// Dropping the scope disconnects the transport, so a dismounted editing
/// area can never leak its socket. Consumers reach the transport through
/// `SessionCtx` handles from `ctx()`.
#[derive(Debug)]
pub struct SessionScope {
    transport: Arc<SessionTransport>,
}

impl SessionScope {
    pub fn new() -> Self {
        Self {
            transport: Arc::new(SessionTransport::new()),
        }
    }

    /// Hand out a context handle for consumers inside this scope.
    pub fn ctx(&self) -> SessionCtx {
        SessionCtx {
            transport: Arc::downgrade(&self.transport),
        }
    }
}

impl Default for SessionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionScope {
    fn drop(&mut self) {
        debug!("Session scope dropped, disconnecting transport");
        self.transport.disconnect();
    }
}

/// Cheap handle exposing the transport operations to any consumer in the
/// call tree.
///
/// Must not outlive its `SessionScope`: every operation panics once the
/// scope is dropped.
#[derive(Debug, Clone)]
pub struct SessionCtx {
    transport: Weak<SessionTransport>,
}

impl SessionCtx {
    fn transport(&self) -> Arc<SessionTransport> {
        self.transport
            .upgrade()
            .expect("Session scope is gone. SessionCtx must not outlive the SessionScope it came from.")
    }

    pub fn connect(&self, address: SessionAddress, frames: mpsc::Sender<InboundFrame>) {
        self.transport().connect(address, frames);
    }

    pub fn disconnect(&self) {
        self.transport().disconnect();
    }

    pub fn send_message(&self, payload: &str) {
        self.transport().send_message(payload);
    }

    pub fn is_connected(&self) -> bool {
        self.transport().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.transport().state()
    }

    pub fn diagnostics(&self) -> TransportDiagnostics {
        self.transport().diagnostics()
    }
}
