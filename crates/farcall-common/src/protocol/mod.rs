pub mod envelopes;
pub mod error;
pub mod exception;


pub use envelopes::{CommandName, Envelope, ExceptionEnvelope, MessageId, Outcome, RequestEnvelope, ResponseEnvelope};
pub use error::{FarcallError, Result};
pub use exception::{parse_uncaught, ErrorTypeRegistry, RemoteError, RemoteErrorKind};
