//! Sandboxed Frame Transport
//!
//! Fallback for hosts without worker support. The embedded document runs on
//! a `farcall-frame` thread and shares one [`Window`] with the controller.
//! Both directions travel over that window, scoped to `domain`, so each side
//! filters out its own echoes: the controller drops Request Envelopes and
//! the document drops anything without a `command`.

use farcall_common::codec::JsonCodec;
use farcall_common::protocol::error::{FarcallError, Result};
use farcall_common::protocol::{Envelope, RequestEnvelope};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use super::window::{ListenerId, Window, WindowMessage, ANY_ORIGIN};
use super::{spawn_remote, InboundHandler, TransportKind};
use crate::runtime::{RemoteContext, Turn};

const FRAME_THREAD: &str = "farcall-frame";

enum DocumentTask {
    Message(WindowMessage),
    Remove,
}

struct Frame {
    window: Window,
    tx: mpsc::Sender<DocumentTask>,
    removed: Arc<AtomicBool>,
    controller_listener: ListenerId,
    document_listener: ListenerId,
    thread: JoinHandle<()>,
}

/// Transport backed by a hidden embedded document.
pub struct FrameTransport {
    domain: String,
    frame: Option<Frame>,
}

impl FrameTransport {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            frame: None,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_active(&self) -> bool {
        self.frame.is_some()
    }

    /// The window shared with the embedded document, while attached.
    pub fn window(&self) -> Option<&Window> {
        self.frame.as_ref().map(|f| &f.window)
    }

    /// Attaches the document, injects `program` and subscribes to its window.
    pub fn start(&mut self, program: String, handler: Arc<dyn InboundHandler>) -> Result<()> {
        if self.frame.is_some() {
            return Err(FarcallError::AlreadyStarted);
        }

        let window = Window::new();
        let (tx, rx) = mpsc::channel();

        let document_tx = tx.clone();
        let document_listener = window.add_listener(self.domain.clone(), move |message| {
            let _ = document_tx.send(DocumentTask::Message(message.clone()));
        });

        let domain = self.domain.clone();
        let controller_listener = window.add_listener(self.domain.clone(), move |message| {
            on_controller_message(message, &domain, handler.as_ref())
        });

        let document_window = window.clone();
        let domain = self.domain.clone();
        let removed = Arc::new(AtomicBool::new(false));
        let document_removed = Arc::clone(&removed);
        let spawned = spawn_remote(FRAME_THREAD, TransportKind::SandboxedFrame, move |ctx| {
            run_document(ctx, program, rx, document_window, domain, &document_removed)
        });

        let thread = match spawned {
            Ok(thread) => thread,
            Err(e) => {
                window.remove_listener(document_listener);
                window.remove_listener(controller_listener);
                return Err(e);
            }
        };

        tracing::info!(domain = %self.domain, "sandboxed frame attached");
        self.frame = Some(Frame {
            window,
            tx,
            removed,
            controller_listener,
            document_listener,
            thread,
        });
        Ok(())
    }

    /// Posts the serialized request to the document's window, targeted at `domain`.
    pub fn send(&self, request: &RequestEnvelope) -> Result<()> {
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| FarcallError::Transport("sandboxed frame is not attached".into()))?;
        let text = JsonCodec::encode_request(request)?;

        frame.window.post_message(&text, &self.domain, &self.domain);
        Ok(())
    }

    /// Removes the document. Without an attached frame this does nothing.
    pub fn terminate(&mut self) -> Result<()> {
        let Some(frame) = self.frame.take() else {
            tracing::debug!("terminate called with no sandboxed frame attached");
            return Ok(());
        };

        frame.window.remove_listener(frame.controller_listener);
        frame.window.remove_listener(frame.document_listener);
        frame.removed.store(true, Ordering::SeqCst);
        let _ = frame.tx.send(DocumentTask::Remove);
        drop(frame.thread);

        tracing::info!(domain = %self.domain, "sandboxed frame removed");
        Ok(())
    }
}

impl Drop for FrameTransport {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

impl std::fmt::Debug for FrameTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameTransport")
            .field("domain", &self.domain)
            .field("active", &self.is_active())
            .finish()
    }
}

fn on_controller_message(message: &WindowMessage, domain: &str, handler: &dyn InboundHandler) {
    if message.origin != domain {
        tracing::debug!(origin = %message.origin, "ignoring message from foreign origin");
        return;
    }

    match JsonCodec::decode_envelope(&message.data) {
        Ok(Envelope::Response(response)) => handler.on_response(response),
        Ok(Envelope::Request(request)) => {
            tracing::trace!(message_id = request.message_id, "ignoring request echo");
        }
        Err(e) => tracing::warn!("dropping unrecognized frame message: {}", e),
    }
}

fn run_document(
    mut ctx: RemoteContext,
    program: String,
    rx: mpsc::Receiver<DocumentTask>,
    window: Window,
    domain: String,
    removed: &AtomicBool,
) {
    match ctx.evaluate(&program) {
        Ok(turn) => flush_turn(turn, &window, &domain),
        Err(e) => tracing::error!("frame bootstrap failed: {}", e),
    }

    while let Ok(task) = rx.recv() {
        if removed.load(Ordering::SeqCst) {
            break;
        }
        match task {
            DocumentTask::Message(message) => match ctx.deliver(&message.data, &message.origin) {
                Ok(turn) => flush_turn(turn, &window, &domain),
                Err(e) => tracing::error!("frame failed to process message: {}", e),
            },
            DocumentTask::Remove => break,
        }
    }

    tracing::debug!("frame thread exiting");
}

fn flush_turn(turn: Turn, window: &Window, domain: &str) {
    for post in turn.posts {
        let target = post.target_origin.as_deref().unwrap_or(ANY_ORIGIN);
        window.post_message(&post.text(), target, domain);
    }

    // Frame errors stay inside the document; only the worker raises error events.
    for description in turn.uncaught {
        tracing::warn!("uncaught error in sandboxed frame: {}", description);
    }
}
