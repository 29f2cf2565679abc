//! Exception Marshaling
//!
//! Errors thrown inside the remote context travel as `{type, message}` and are
//! rebuilt on the controller side as a [`RemoteError`]. The set of error types
//! the controller recognizes is an explicit [`ErrorTypeRegistry`] supplied at
//! bridge construction; any name it does not contain degrades to a generic
//! `Error` carrying the original message.

use crate::protocol::envelopes::ExceptionEnvelope;
use std::collections::HashMap;
use std::fmt;

/// The constructor an error was rebuilt with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    Error,
    TypeError,
    RangeError,
    ReferenceError,
    SyntaxError,
    EvalError,
    UriError,
    AggregateError,
    /// A caller-registered error type, e.g. a `class ValidationError extends Error`
    Custom(String),
}

impl RemoteErrorKind {
    /// The ECMAScript standard error constructors.
    pub const STANDARD: [RemoteErrorKind; 8] = [
        RemoteErrorKind::Error,
        RemoteErrorKind::TypeError,
        RemoteErrorKind::RangeError,
        RemoteErrorKind::ReferenceError,
        RemoteErrorKind::SyntaxError,
        RemoteErrorKind::EvalError,
        RemoteErrorKind::UriError,
        RemoteErrorKind::AggregateError,
    ];

    /// Maps a constructor name to a kind; names outside the standard set become `Custom`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "Error" => RemoteErrorKind::Error,
            "TypeError" => RemoteErrorKind::TypeError,
            "RangeError" => RemoteErrorKind::RangeError,
            "ReferenceError" => RemoteErrorKind::ReferenceError,
            "SyntaxError" => RemoteErrorKind::SyntaxError,
            "EvalError" => RemoteErrorKind::EvalError,
            "URIError" => RemoteErrorKind::UriError,
            "AggregateError" => RemoteErrorKind::AggregateError,
            other => RemoteErrorKind::Custom(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            RemoteErrorKind::Error => "Error",
            RemoteErrorKind::TypeError => "TypeError",
            RemoteErrorKind::RangeError => "RangeError",
            RemoteErrorKind::ReferenceError => "ReferenceError",
            RemoteErrorKind::SyntaxError => "SyntaxError",
            RemoteErrorKind::EvalError => "EvalError",
            RemoteErrorKind::UriError => "URIError",
            RemoteErrorKind::AggregateError => "AggregateError",
            RemoteErrorKind::Custom(name) => name,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error reconstructed from the remote context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        RemoteError {
            kind,
            message: message.into(),
        }
    }

    /// A plain `Error`, used whenever the type name cannot be resolved.
    pub fn generic(message: impl Into<String>) -> Self {
        RemoteError::new(RemoteErrorKind::Error, message)
    }

    pub fn type_name(&self) -> &str {
        self.kind.name()
    }

    /// `toEnvelope`: `{type: constructor name, message}`.
    pub fn to_envelope(&self) -> ExceptionEnvelope {
        ExceptionEnvelope::new(self.kind.name(), self.message.clone())
    }
}

/// Closed registry of error types the controller reconstructs by name.
///
/// # Example
///
/// ```
/// use farcall_common::protocol::{ErrorTypeRegistry, ExceptionEnvelope, RemoteErrorKind};
///
/// let registry = ErrorTypeRegistry::standard().with_type("ValidationError");
///
/// let err = registry.error_from_envelope(&ExceptionEnvelope::new("RangeError", "bad"));
/// assert_eq!(err.kind, RemoteErrorKind::RangeError);
///
/// let err = registry.error_from_envelope(&ExceptionEnvelope::new("NoSuchError", "bad"));
/// assert_eq!(err.kind, RemoteErrorKind::Error);
/// assert_eq!(err.message, "bad");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorTypeRegistry {
    kinds: HashMap<String, RemoteErrorKind>,
}

impl Default for ErrorTypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ErrorTypeRegistry {
    /// A registry that resolves nothing; every error falls back to `Error`.
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
        }
    }

    /// The ECMAScript standard error constructors.
    pub fn standard() -> Self {
        let mut registry = Self::empty();
        for kind in RemoteErrorKind::STANDARD {
            registry.kinds.insert(kind.name().to_string(), kind);
        }
        registry
    }

    /// Adds an error type by constructor name.
    pub fn with_type(mut self, name: impl Into<String>) -> Self {
        self.register(name);
        self
    }

    pub fn register(&mut self, name: impl Into<String>) {
        let name = name.into();
        let kind = RemoteErrorKind::from_name(&name);
        self.kinds.insert(name, kind);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Option<&RemoteErrorKind> {
        self.kinds.get(name)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// `fromEnvelope`: rebuilds the error, falling back to a generic `Error`.
    pub fn error_from_envelope(&self, envelope: &ExceptionEnvelope) -> RemoteError {
        self.reconstruct(Some(&envelope.type_name), &envelope.message)
    }

    /// Rebuilds an out-of-band error from an `Uncaught <Type>: <message>` text.
    pub fn error_from_uncaught(&self, text: &str) -> RemoteError {
        let (type_name, message) = parse_uncaught(text);
        self.reconstruct(type_name, message)
    }

    fn reconstruct(&self, type_name: Option<&str>, message: &str) -> RemoteError {
        match type_name.and_then(|name| self.resolve(name)) {
            Some(kind) => RemoteError::new(kind.clone(), message),
            None => RemoteError::generic(message),
        }
    }
}

/// Splits an `Uncaught <Type>: <message>` text into its type name and message.
///
/// The `Uncaught ` prefix is optional. When the text has no identifier-shaped
/// type before the first `": "`, the whole remainder is the message.
///
/// ```
/// use farcall_common::protocol::parse_uncaught;
///
/// assert_eq!(parse_uncaught("Uncaught TypeError: x is not a function"), (Some("TypeError"), "x is not a function"));
/// assert_eq!(parse_uncaught("Uncaught boom"), (None, "boom"));
/// ```
pub fn parse_uncaught(text: &str) -> (Option<&str>, &str) {
    let rest = text.strip_prefix("Uncaught ").unwrap_or(text);

    match rest.split_once(": ") {
        Some((name, message)) if is_identifier(name) => (Some(name), message),
        _ => (None, rest),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' || first == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}
