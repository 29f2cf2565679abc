//! Bridge Facade
//!
//! Ties the pieces together: picks a transport with the capability probe,
//! launches it with a bootstrap program built from the current definitions,
//! correlates responses to calls, and republishes uncaught remote errors as
//! exception events.

use farcall_common::protocol::error::{FarcallError, Result};
use farcall_common::protocol::{
    ErrorTypeRegistry, MessageId, RemoteError, RequestEnvelope, ResponseEnvelope,
};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::{broadcast, oneshot};

use crate::bootstrap::BootstrapBuilder;
use crate::config::BridgeOptions;
use crate::correlation::{CallOutcome, CorrelationTable, MessageIdCounter};
use crate::definitions::DefinitionRegistry;
use crate::transport::{ErrorEvent, InboundHandler, Transport, TransportKind};

const EXCEPTION_CHANNEL_CAPACITY: usize = 64;

/// Where a bridge is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Running,
    /// Reserved; no transition enters it.
    Idle,
    Terminated,
}

/// State the transport threads report into.
struct Shared {
    table: CorrelationTable,
    errors: ErrorTypeRegistry,
    exceptions: broadcast::Sender<RemoteError>,
    state: Mutex<LifecycleState>,
}

impl Shared {
    fn state(&self) -> LifecycleState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: LifecycleState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

impl InboundHandler for Shared {
    fn on_response(&self, response: ResponseEnvelope) {
        if self.state() == LifecycleState::Terminated {
            tracing::debug!(message_id = response.message_id, "dropping response after terminate");
            return;
        }
        self.table.settle(response, &self.errors);
    }

    fn on_error(&self, event: ErrorEvent) {
        if self.state() == LifecycleState::Terminated {
            return;
        }
        let error = self.errors.error_from_uncaught(&event.message);
        tracing::warn!("uncaught error in remote context: {}", error);
        // No subscribers is fine.
        let _ = self.exceptions.send(error);
    }
}

/// A remote execution context and the calls made into it.
///
/// # Example
///
/// ```no_run
/// use farcall::{Bridge, BridgeOptions};
/// use serde_json::json;
///
/// # async fn example() -> farcall::Result<()> {
/// let bridge = Bridge::new(BridgeOptions::new().with_definition("add", "(a, b) => a + b"));
/// bridge.start()?;
/// let sum = bridge.run("add", vec![json!(2), json!(3)]).await?;
/// assert_eq!(sum, json!(5));
/// bridge.terminate()?;
/// # Ok(())
/// # }
/// ```
pub struct Bridge {
    options: BridgeOptions,
    definitions: Mutex<DefinitionRegistry>,
    transport: Mutex<Option<Transport>>,
    started: AtomicBool,
    ids: MessageIdCounter,
    shared: Arc<Shared>,
}

impl Bridge {
    pub fn new(options: BridgeOptions) -> Self {
        let (exceptions, _) = broadcast::channel(EXCEPTION_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            table: CorrelationTable::new(),
            errors: options.error_types.clone(),
            exceptions,
            state: Mutex::new(LifecycleState::Created),
        });

        Self {
            definitions: Mutex::new(options.definitions.clone()),
            options,
            transport: Mutex::new(None),
            started: AtomicBool::new(false),
            ids: MessageIdCounter::new(),
            shared,
        }
    }

    /// Appends a definition. Only definitions added before [`start`](Self::start)
    /// reach the remote context.
    pub fn define(&self, key: impl Into<String>, source: impl Into<String>) {
        let key = key.into();
        if self.started.load(Ordering::SeqCst) {
            tracing::warn!(key = %key, "definition added after start will not reach the remote context");
        }
        self.lock_definitions().register(key, source);
    }

    /// Picks a transport and launches the remote context.
    ///
    /// Callable once; every later call fails with `AlreadyStarted`, including
    /// after a failed first attempt.
    pub fn start(&self) -> Result<TransportKind> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(FarcallError::AlreadyStarted);
        }

        self.options.validate()?;

        let kind = if self.options.capability_probe.supports_workers() {
            TransportKind::Dedicated
        } else {
            TransportKind::SandboxedFrame
        };

        let program = BootstrapBuilder::new(self.options.domain.clone())
            .with_import_scripts(self.options.import_scripts.iter().cloned())
            .with_definitions(&self.lock_definitions())
            .build(kind)?;

        let mut transport = Transport::new(kind, self.options.domain.clone());
        let handler: Arc<dyn InboundHandler> = self.shared.clone();
        transport.start(program, handler)?;

        *self.lock_transport() = Some(transport);
        self.shared.set_state(LifecycleState::Running);

        tracing::info!(transport = %kind, domain = %self.options.domain, "bridge started");
        Ok(kind)
    }

    /// Dispatches `command` and returns a future for its result.
    ///
    /// The request is already sent when this returns; awaiting only waits for
    /// the response. There is no timeout.
    pub fn run(&self, command: impl Into<String>, args: Vec<Value>) -> RemoteCall {
        match self.shared.state() {
            LifecycleState::Created => return RemoteCall::failed(FarcallError::NotStarted),
            LifecycleState::Terminated => return RemoteCall::failed(FarcallError::Terminated),
            LifecycleState::Running | LifecycleState::Idle => {}
        }

        let command = command.into();
        let guard = self.lock_transport();
        let Some(transport) = guard.as_ref() else {
            return RemoteCall::failed(FarcallError::NotStarted);
        };
        if !transport.is_active() {
            return RemoteCall::failed(FarcallError::Terminated);
        }

        let message_id = self.ids.next_id();
        let receiver = self.shared.table.insert(message_id, command.clone());
        tracing::debug!(message_id, command = %command, "dispatching call");

        let request = RequestEnvelope::new(message_id, command, args);
        if let Err(e) = transport.send(&request) {
            self.shared.table.remove(message_id);
            return RemoteCall {
                message_id: Some(message_id),
                state: CallState::Failed(Some(e)),
            };
        }

        RemoteCall {
            message_id: Some(message_id),
            state: CallState::Pending(receiver),
        }
    }

    /// Tears down the active transport and fails every pending call with
    /// `Terminated`.
    ///
    /// Without a transport this is `NotStarted`. Calling it again on a
    /// dedicated bridge is `NoActiveWorker`; on a frame bridge it is a no-op.
    pub fn terminate(&self) -> Result<()> {
        let mut guard = self.lock_transport();
        let transport = guard.as_mut().ok_or(FarcallError::NotStarted)?;

        transport.terminate()?;
        self.shared.set_state(LifecycleState::Terminated);

        let dropped = self.shared.table.clear();
        tracing::info!(transport = %transport.kind(), dropped, "bridge terminated");
        Ok(())
    }

    /// Subscribes to the `exception` event: uncaught remote errors not tied
    /// to a call. Dropping the receiver unsubscribes.
    pub fn subscribe_exceptions(&self) -> broadcast::Receiver<RemoteError> {
        self.shared.exceptions.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.state()
    }

    /// The transport chosen by [`start`](Self::start), if it ran.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.lock_transport().as_ref().map(Transport::kind)
    }

    /// Calls still waiting for a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.table.len()
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }

    /// Snapshot of the registered definitions.
    pub fn definitions(&self) -> DefinitionRegistry {
        self.lock_definitions().clone()
    }

    fn lock_definitions(&self) -> MutexGuard<'_, DefinitionRegistry> {
        self.definitions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_transport(&self) -> MutexGuard<'_, Option<Transport>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state())
            .field("transport", &self.transport_kind())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}

enum CallState {
    Pending(oneshot::Receiver<CallOutcome>),
    Failed(Option<FarcallError>),
    Done,
}

/// The result of [`Bridge::run`].
///
/// Resolves to the command's return value, `FarcallError::Remote` if it
/// threw, or `FarcallError::Terminated` if the bridge went away first.
#[must_use = "a remote call does nothing useful unless awaited"]
pub struct RemoteCall {
    message_id: Option<MessageId>,
    state: CallState,
}

impl RemoteCall {
    fn failed(error: FarcallError) -> Self {
        Self {
            message_id: None,
            state: CallState::Failed(Some(error)),
        }
    }

    /// The id the request was sent with, if it was sent.
    pub fn message_id(&self) -> Option<MessageId> {
        self.message_id
    }
}

impl Future for RemoteCall {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let output = match &mut this.state {
            CallState::Pending(receiver) => match Pin::new(receiver).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Ok(Ok(value))) => Ok(value),
                Poll::Ready(Ok(Err(remote))) => Err(FarcallError::Remote(remote)),
                Poll::Ready(Err(_)) => Err(FarcallError::Terminated),
            },
            CallState::Failed(error) => Err(error.take().unwrap_or(FarcallError::Terminated)),
            CallState::Done => Err(FarcallError::Transport("remote call polled after completion".into())),
        };
        this.state = CallState::Done;
        Poll::Ready(output)
    }
}

impl std::fmt::Debug for RemoteCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            CallState::Pending(_) => "pending",
            CallState::Failed(_) => "failed",
            CallState::Done => "done",
        };
        f.debug_struct("RemoteCall")
            .field("message_id", &self.message_id)
            .field("state", &state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CapabilityProbe;
    use serde_json::json;

    fn options() -> BridgeOptions {
        BridgeOptions::new()
            .with_domain("http://localhost")
            .with_capability_probe(CapabilityProbe::fixed(true))
    }

    #[tokio::test]
    async fn test_run_before_start() {
        let bridge = Bridge::new(options());
        let call = bridge.run("add", vec![]);
        assert_eq!(call.message_id(), None);
        assert!(matches!(call.await, Err(FarcallError::NotStarted)));
        assert_eq!(bridge.state(), LifecycleState::Created);
    }

    #[test]
    fn test_terminate_before_start() {
        let bridge = Bridge::new(options());
        assert!(matches!(bridge.terminate(), Err(FarcallError::NotStarted)));
    }

    #[test]
    fn test_start_picks_transport_from_probe() {
        let bridge = Bridge::new(options().with_capability_probe(CapabilityProbe::fixed(false)));
        assert_eq!(bridge.start().unwrap(), TransportKind::SandboxedFrame);
        assert_eq!(bridge.transport_kind(), Some(TransportKind::SandboxedFrame));
        assert_eq!(bridge.state(), LifecycleState::Running);
        bridge.terminate().unwrap();
    }

    #[test]
    fn test_failed_start_is_not_retryable() {
        let bridge = Bridge::new(options().with_domain("nope"));
        assert!(matches!(bridge.start(), Err(FarcallError::InvalidDomain(_))));
        assert!(matches!(bridge.start(), Err(FarcallError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_define_before_start() {
        let bridge = Bridge::new(options());
        bridge.define("triple", "x => x * 3");
        assert_eq!(bridge.definitions().len(), 1);

        bridge.start().unwrap();
        assert_eq!(bridge.run("triple", vec![json!(4)]).await.unwrap(), json!(12));
        bridge.terminate().unwrap();
    }

    #[tokio::test]
    async fn test_message_ids_increase() {
        let bridge = Bridge::new(options().with_definition("id", "x => x"));
        bridge.start().unwrap();

        let first = bridge.run("id", vec![json!(1)]);
        let second = bridge.run("id", vec![json!(2)]);
        let (a, b) = (first.message_id().unwrap(), second.message_id().unwrap());
        assert!(b > a);

        assert_eq!(first.await.unwrap(), json!(1));
        assert_eq!(second.await.unwrap(), json!(2));
        bridge.terminate().unwrap();
    }

    #[tokio::test]
    async fn test_run_after_terminate() {
        let bridge = Bridge::new(options().with_definition("id", "x => x"));
        bridge.start().unwrap();
        bridge.terminate().unwrap();

        assert_eq!(bridge.state(), LifecycleState::Terminated);
        assert!(matches!(bridge.run("id", vec![json!(1)]).await, Err(FarcallError::Terminated)));
    }
}
