//! # farcall
//!
//! Offload named JavaScript functions to an isolated execution context and
//! await their results.
//!
//! A [`Bridge`] owns one remote context. On [`Bridge::start`] it asks a
//! capability probe whether a dedicated worker thread is available and falls
//! back to a sandboxed frame otherwise. Either way the remote side starts
//! blank and is populated only by the bootstrap program, which installs the
//! registered definitions and answers every Request Envelope with a Response
//! Envelope.
//!
//! ```no_run
//! use farcall::{Bridge, BridgeOptions};
//! use serde_json::json;
//!
//! # async fn example() -> farcall::Result<()> {
//! let bridge = Bridge::new(
//!     BridgeOptions::new().with_definition("fail", "() => { throw new RangeError('bad'); }"),
//! );
//! bridge.start()?;
//!
//! let err = bridge.run("fail", vec![]).await.unwrap_err();
//! assert_eq!(err.as_remote().unwrap().type_name(), "RangeError");
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod correlation;
pub mod definitions;
pub mod runtime;
pub mod scripts;
pub mod transport;

pub use bootstrap::BootstrapBuilder;
pub use bridge::{Bridge, LifecycleState, RemoteCall};
pub use config::{BridgeOptions, CapabilityProbe};
pub use correlation::{CorrelationTable, MessageIdCounter};
pub use definitions::{Definition, DefinitionRegistry};
pub use transport::{ErrorEvent, InboundHandler, Transport, TransportKind};

pub use farcall_common::{ErrorTypeRegistry, FarcallError, RemoteError, RemoteErrorKind, Result};
