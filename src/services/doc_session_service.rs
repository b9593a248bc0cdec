use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::models::{DocumentMeta, InboundFrame};
use crate::ws::{SessionAddress, SessionCtx};

/// Inbound frames queued for the session before the pump applies them.
const FRAME_BUFFER: usize = 64;

/// The active document session: identity plus the latest authoritative
/// content received over the live connection.
///
/// Content starts empty and is only ever written from inbound frames, so
/// the server echo stays the source of truth even for local edits.
#[derive(Debug, Clone)]
pub struct DocSession {
    pub meta: DocumentMeta,
    pub content: String,
    // Connect attempt this session is bound to. A pump for an older
    // attempt can never write into a newer session.
    epoch: u64,
}

impl DocSession {
    fn opened(meta: DocumentMeta, epoch: u64) -> Self {
        Self {
            meta,
            content: String::new(),
            epoch,
        }
    }
}

/// Binds one document identity at a time to the session transport.
///
/// Inbound frames overwrite the session content published on the watch
/// channel; local edits go out verbatim through the context handle.
#[derive(Debug)]
pub struct DocSessionService {
    ctx: SessionCtx,
    ws_url: String,
    session: Arc<watch::Sender<Option<DocSession>>>,
    pump: Option<JoinHandle<()>>,
    epoch: u64,
}

impl DocSessionService {
    pub fn new(ctx: SessionCtx, ws_url: impl Into<String>) -> Self {
        let (session_tx, _) = watch::channel(None);
        Self {
            ctx,
            ws_url: ws_url.into(),
            session: Arc::new(session_tx),
            pump: None,
            epoch: 0,
        }
    }

    /// Watch the active session. `None` means no document is open.
    pub fn view(&self) -> watch::Receiver<Option<DocSession>> {
        self.session.subscribe()
    }

    /// Open a live session for `meta` acting as `acting_user_email`,
    /// replacing any active session outright. The previous session's
    /// state is discarded, not merged.
    pub fn open_session(&mut self, meta: DocumentMeta, acting_user_email: &str) {
        self.stop_pump();
        self.epoch += 1;
        let epoch = self.epoch;

        let address = SessionAddress::new(&self.ws_url, acting_user_email, &meta.doc_id);
        info!(
            "Opening session for document {} as {}",
            meta.doc_id, acting_user_email
        );

        let (frames_tx, mut frames_rx) = mpsc::channel::<InboundFrame>(FRAME_BUFFER);
        // The transport swaps in the new consumer and closes any previous
        // handle as one ordered step.
        self.ctx.connect(address, frames_tx);
        self.session.send_replace(Some(DocSession::opened(meta, epoch)));

        let session = Arc::clone(&self.session);
        self.pump = Some(tokio::spawn(async move {
            while let Some(frame) = frames_rx.recv().await {
                session.send_if_modified(|slot| match slot {
                    Some(active) if active.epoch == epoch => {
                        active.content = frame.into_content();
                        true
                    }
                    _ => false,
                });
            }
            debug!("Inbound pump finished");
        }));
    }

    /// Forward a local edit as a full-content frame. Fire and forget: not
    /// being connected only shows up in the logs.
    pub fn submit_edit(&self, new_content: &str) {
        self.ctx.send_message(new_content);
    }

    /// Disconnect and clear the active session so the view falls back to
    /// the document listing.
    pub fn close_session(&mut self) {
        self.ctx.disconnect();
        self.stop_pump();
        if self.session.send_replace(None).is_some() {
            info!("Session closed");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.ctx.is_connected()
    }

    fn stop_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}
