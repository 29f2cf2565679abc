//! Correlation Table
//!
//! Maps outstanding message ids to the oneshot sender that completes the
//! caller's future. Entries are removed only when they settle, when a send
//! fails, or when the bridge terminates; there is no eviction.

use farcall_common::protocol::{ErrorTypeRegistry, MessageId, Outcome, RemoteError, ResponseEnvelope};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::oneshot;

/// What a settled call resolves to.
pub type CallOutcome = std::result::Result<Value, RemoteError>;

/// Strictly increasing message ids, starting at 1.
#[derive(Debug, Default)]
pub struct MessageIdCounter {
    last: AtomicU64,
}

impl MessageIdCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next unique id. Wrapping past `u64::MAX` is not handled.
    pub fn next_id(&self) -> MessageId {
        self.last.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    /// The most recently allocated id, or 0 if none.
    pub fn last_id(&self) -> MessageId {
        self.last.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct PendingCall {
    command: String,
    responder: oneshot::Sender<CallOutcome>,
}

/// Outstanding calls keyed by message id.
#[derive(Debug, Default)]
pub struct CorrelationTable {
    pending: Mutex<HashMap<MessageId, PendingCall>>,
}

impl CorrelationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a call and returns the receiver its response will arrive on.
    pub fn insert(&self, message_id: MessageId, command: impl Into<String>) -> oneshot::Receiver<CallOutcome> {
        let (responder, receiver) = oneshot::channel();
        let call = PendingCall {
            command: command.into(),
            responder,
        };
        self.lock().insert(message_id, call);
        receiver
    }

    /// Settles the call `response` answers, reconstructing exceptions with
    /// `errors`. Returns false if no call was waiting on that id.
    pub fn settle(&self, response: ResponseEnvelope, errors: &ErrorTypeRegistry) -> bool {
        let Some(call) = self.lock().remove(&response.message_id) else {
            tracing::warn!(
                message_id = response.message_id,
                "dropping response with no pending call"
            );
            return false;
        };

        let outcome = match response.outcome {
            Outcome::Result(value) => Ok(value),
            Outcome::Exception(exception) => Err(errors.error_from_envelope(&exception)),
        };

        tracing::debug!(
            message_id = response.message_id,
            command = %call.command,
            failed = outcome.is_err(),
            "settling call"
        );

        // The caller may have dropped its future already.
        let _ = call.responder.send(outcome);
        true
    }

    /// Forgets a call without settling it; its receiver sees the sender drop.
    pub fn remove(&self, message_id: MessageId) -> bool {
        self.lock().remove(&message_id).is_some()
    }

    /// Drops every pending call. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut pending = self.lock();
        let count = pending.len();
        pending.clear();
        count
    }

    pub fn contains(&self, message_id: MessageId) -> bool {
        self.lock().contains_key(&message_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MessageId, PendingCall>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
