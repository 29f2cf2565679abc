//! Dedicated Context Transport
//!
//! Runs the bootstrap program on a `farcall-worker` thread and feeds it
//! serialized Request Envelopes over a channel. Everything the worker posts
//! is parsed as a Response Envelope; errors thrown outside a call surface as
//! [`ErrorEvent`]s.

use farcall_common::codec::JsonCodec;
use farcall_common::protocol::error::{FarcallError, Result};
use farcall_common::protocol::RequestEnvelope;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use super::{spawn_remote, ErrorEvent, InboundHandler, TransportKind};
use crate::runtime::{RemoteContext, Turn};

const WORKER_THREAD: &str = "farcall-worker";

enum WorkerTask {
    Message(String),
    Terminate,
}

struct Worker {
    tx: mpsc::Sender<WorkerTask>,
    stopped: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl Worker {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let _ = self.tx.send(WorkerTask::Terminate);
    }
}

/// Transport backed by a dedicated worker thread.
#[derive(Default)]
pub struct DedicatedTransport {
    worker: Option<Worker>,
}

impl DedicatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.worker.is_some()
    }

    /// Spawns the worker and evaluates `program` in it.
    ///
    /// Scripts listed in the program load eagerly; a failure there is an
    /// error event, not a start failure.
    pub fn start(&mut self, program: String, handler: Arc<dyn InboundHandler>) -> Result<()> {
        if self.worker.is_some() {
            return Err(FarcallError::AlreadyStarted);
        }

        let (tx, rx) = mpsc::channel();
        let stopped = Arc::new(AtomicBool::new(false));
        let worker_stopped = Arc::clone(&stopped);
        let thread = spawn_remote(WORKER_THREAD, TransportKind::Dedicated, move |ctx| {
            run_worker(ctx, program, rx, handler, &worker_stopped)
        })?;

        tracing::info!("dedicated worker started");
        self.worker = Some(Worker { tx, stopped, thread });
        Ok(())
    }

    pub fn send(&self, request: &RequestEnvelope) -> Result<()> {
        let worker = self.worker.as_ref().ok_or(FarcallError::NoActiveWorker)?;
        let text = JsonCodec::encode_request(request)?;

        worker
            .tx
            .send(WorkerTask::Message(text))
            .map_err(|_| FarcallError::Transport("worker thread has exited".into()))
    }

    /// Stops the worker. Fails with `NoActiveWorker` if none is running.
    ///
    /// The thread is detached: a command that is still executing finishes
    /// on its own, and nothing it posts is delivered. Queued commands are
    /// skipped.
    pub fn terminate(&mut self) -> Result<()> {
        let worker = self.worker.take().ok_or(FarcallError::NoActiveWorker)?;
        worker.stop();
        drop(worker.thread);
        tracing::info!("dedicated worker terminated");
        Ok(())
    }
}

impl Drop for DedicatedTransport {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}

impl std::fmt::Debug for DedicatedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedicatedTransport")
            .field("active", &self.is_active())
            .finish()
    }
}

fn run_worker(
    mut ctx: RemoteContext,
    program: String,
    rx: mpsc::Receiver<WorkerTask>,
    handler: Arc<dyn InboundHandler>,
    stopped: &AtomicBool,
) {
    match ctx.evaluate(&program) {
        Ok(turn) => dispatch_turn(turn, handler.as_ref()),
        Err(e) => tracing::error!("worker bootstrap failed: {}", e),
    }

    while let Ok(task) = rx.recv() {
        if stopped.load(Ordering::SeqCst) {
            break;
        }
        match task {
            WorkerTask::Message(text) => match ctx.deliver(&text, "") {
                Ok(turn) => dispatch_turn(turn, handler.as_ref()),
                Err(e) => tracing::error!("worker failed to process message: {}", e),
            },
            WorkerTask::Terminate => break,
        }
    }

    tracing::debug!("worker thread exiting");
}

fn dispatch_turn(turn: Turn, handler: &dyn InboundHandler) {
    for post in turn.posts {
        match JsonCodec::decode_response(&post.text()) {
            Ok(response) => handler.on_response(response),
            Err(e) => tracing::warn!("dropping worker message that is not a response: {}", e),
        }
    }

    for description in turn.uncaught {
        handler.on_error(ErrorEvent::uncaught(&description));
    }
}
