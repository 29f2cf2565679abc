//! Transports between the controller and a remote context.
//!
//! Two interchangeable strategies sit behind [`Transport`]:
//!
//! - [`DedicatedTransport`]: a worker thread fed through a private channel.
//! - [`FrameTransport`]: an embedded document reached through a shared
//!   [`Window`] bus that carries both directions.
//!
//! Both host their [`RemoteContext`] on a thread of its own and report back
//! through an [`InboundHandler`].

pub mod dedicated;
pub mod frame;
pub mod window;

pub use dedicated::DedicatedTransport;
pub use frame::FrameTransport;
pub use window::{Window, WindowMessage, ANY_ORIGIN};

use farcall_common::protocol::error::{FarcallError, Result};
use farcall_common::protocol::{RequestEnvelope, ResponseEnvelope};
use std::fmt;
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use crate::runtime::RemoteContext;

/// Which isolated context a bridge runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Dedicated worker thread.
    Dedicated,
    /// Hidden embedded document sharing a window message channel.
    SandboxedFrame,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Dedicated => write!(f, "dedicated"),
            TransportKind::SandboxedFrame => write!(f, "sandboxed-frame"),
        }
    }
}

/// Error event raised by a worker for an error thrown outside any call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    /// `Uncaught <Type>: <message>`
    pub message: String,
}

impl ErrorEvent {
    pub(crate) fn uncaught(description: &str) -> Self {
        Self {
            message: format!("Uncaught {}", description),
        }
    }
}

/// Receives what a transport gets back from its remote context.
///
/// Called on the transport's thread, never on the controller's.
pub trait InboundHandler: Send + Sync {
    fn on_response(&self, response: ResponseEnvelope);
    fn on_error(&self, event: ErrorEvent);
}

/// The active transport strategy.
#[derive(Debug)]
pub enum Transport {
    Dedicated(DedicatedTransport),
    Frame(FrameTransport),
}

impl Transport {
    /// An idle transport of `kind`. `domain` scopes frame messaging.
    pub fn new(kind: TransportKind, domain: impl Into<String>) -> Self {
        match kind {
            TransportKind::Dedicated => Transport::Dedicated(DedicatedTransport::new()),
            TransportKind::SandboxedFrame => Transport::Frame(FrameTransport::new(domain)),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Transport::Dedicated(_) => TransportKind::Dedicated,
            Transport::Frame(_) => TransportKind::SandboxedFrame,
        }
    }

    pub fn start(&mut self, program: String, handler: Arc<dyn InboundHandler>) -> Result<()> {
        match self {
            Transport::Dedicated(t) => t.start(program, handler),
            Transport::Frame(t) => t.start(program, handler),
        }
    }

    pub fn send(&self, request: &RequestEnvelope) -> Result<()> {
        match self {
            Transport::Dedicated(t) => t.send(request),
            Transport::Frame(t) => t.send(request),
        }
    }

    pub fn terminate(&mut self) -> Result<()> {
        match self {
            Transport::Dedicated(t) => t.terminate(),
            Transport::Frame(t) => t.terminate(),
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            Transport::Dedicated(t) => t.is_active(),
            Transport::Frame(t) => t.is_active(),
        }
    }
}

/// Spawns `name` hosting a fresh [`RemoteContext`] of `kind`, then hands the
/// context to `run`. Returns once the context exists.
pub(crate) fn spawn_remote<F>(name: &str, kind: TransportKind, run: F) -> Result<JoinHandle<()>>
where
    F: FnOnce(RemoteContext) + Send + 'static,
{
    let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();

    let handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || match RemoteContext::new(kind) {
            Ok(ctx) => {
                let _ = ready_tx.send(Ok(()));
                run(ctx);
            }
            Err(e) => {
                let _ = ready_tx.send(Err(e));
            }
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => Err(FarcallError::Transport(format!(
            "{} thread exited during startup",
            name
        ))),
    }
}
