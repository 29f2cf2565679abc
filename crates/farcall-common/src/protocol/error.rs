use crate::protocol::exception::RemoteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FarcallError {
    #[error("Bridge already started")]
    AlreadyStarted,

    #[error("Bridge has not been started")]
    NotStarted,

    #[error("No active worker to terminate")]
    NoActiveWorker,

    #[error("Bridge terminated")]
    Terminated,

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid script location: {0}")]
    InvalidScriptLocation(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("JavaScript execution error: {0}")]
    JavaScriptExecution(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FarcallError {
    /// Returns the reconstructed remote error if this is a remote execution failure.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            FarcallError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, FarcallError>;
