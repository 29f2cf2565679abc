//! farcall Wire Envelopes
//!
//! This module defines the two self-contained message units that cross the
//! controller/remote boundary. Field names are the wire contract and are
//! serialized in camelCase (`messageId`) because the bootstrap program reads
//! and writes them with `JSON.parse` / `JSON.stringify`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Correlation id linking a request to its eventual response.
pub type MessageId = u64;

/// Key of a registered definition.
pub type CommandName = String;

/// A call into the remote context.
///
/// Produced once per `run` call and never mutated.
///
/// # Example
///
/// ```
/// use farcall_common::protocol::RequestEnvelope;
/// use serde_json::json;
///
/// let request = RequestEnvelope::new(7, "add", vec![json!(2), json!(3)]);
/// assert_eq!(request.message_id, 7);
/// assert_eq!(request.args.len(), 2);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Key referencing a definition
    pub command: CommandName,
    /// Positional arguments
    pub args: Vec<Value>,
    /// Correlation id
    pub message_id: MessageId,
}

impl RequestEnvelope {
    pub fn new(message_id: MessageId, command: impl Into<String>, args: Vec<Value>) -> Self {
        RequestEnvelope {
            command: command.into(),
            args,
            message_id,
        }
    }
}

/// Marshaled form of an error thrown inside the remote context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExceptionEnvelope {
    /// Constructor name of the thrown error (e.g. `RangeError`)
    #[serde(rename = "type")]
    pub type_name: String,
    /// The error's message
    pub message: String,
}

impl ExceptionEnvelope {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionEnvelope {
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

/// Exactly one of a result value or a marshaled exception.
///
/// Flattened into [`ResponseEnvelope`], so the variant name becomes the key
/// next to `messageId` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Result(Value),
    Exception(ExceptionEnvelope),
}

/// The answer to a [`RequestEnvelope`].
///
/// # Wire Format
///
/// ```text
/// {"messageId": 1, "result": 5}
/// {"messageId": 2, "exception": {"type": "RangeError", "message": "bad"}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Correlation id copied from the request
    pub message_id: MessageId,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl ResponseEnvelope {
    /// Creates a successful response.
    pub fn result(message_id: MessageId, result: Value) -> Self {
        ResponseEnvelope {
            message_id,
            outcome: Outcome::Result(result),
        }
    }

    /// Creates a response carrying a marshaled exception.
    pub fn exception(message_id: MessageId, exception: ExceptionEnvelope) -> Self {
        ResponseEnvelope {
            message_id,
            outcome: Outcome::Exception(exception),
        }
    }

    pub fn is_exception(&self) -> bool {
        matches!(self.outcome, Outcome::Exception(_))
    }
}

/// Any envelope observed on a shared bidirectional channel.
///
/// The sandboxed frame sees both directions on one window, so inbound text
/// has to be classified before it is dispatched. Requests are tried first
/// because they are the only shape carrying `command`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Envelope {
    Request(RequestEnvelope),
    Response(ResponseEnvelope),
}
