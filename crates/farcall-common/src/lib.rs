//! farcall Common Types
//!
//! This crate provides the wire protocol shared by the controller side of the
//! farcall bridge and the bootstrap program running inside the remote
//! execution context.
//!
//! # Overview
//!
//! farcall offloads named units of work (JavaScript function definitions) to
//! an isolated execution context and turns fire-and-forget cross-context
//! messages into request/response calls. Everything that crosses the
//! boundary is copied through a textual serialization of two envelopes:
//!
//! - **Request Envelope**: `{command, args, messageId}`
//! - **Response Envelope**: `{messageId, result}` or `{messageId, exception: {type, message}}`
//!
//! # Components
//!
//! - [`protocol`] - Envelope types, the error type and the exception marshaler
//! - [`codec`] - JSON text encoding of envelopes
//!
//! # Example
//!
//! ```
//! use farcall_common::{JsonCodec, Outcome, RequestEnvelope};
//! use serde_json::json;
//!
//! let request = RequestEnvelope::new(1, "add", vec![json!(2), json!(3)]);
//! let text = JsonCodec::encode_request(&request).unwrap();
//! assert_eq!(text, r#"{"command":"add","args":[2,3],"messageId":1}"#);
//!
//! let response = JsonCodec::decode_response(r#"{"messageId":1,"result":5}"#).unwrap();
//! assert_eq!(response.outcome, Outcome::Result(json!(5)));
//! ```

pub mod codec;
pub mod protocol;

pub use codec::JsonCodec;
pub use protocol::*;
