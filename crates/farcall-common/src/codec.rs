//! Envelope Codec
//!
//! Envelopes cross the transport boundary as JSON text, exchanged verbatim.
//! The remote side reads them with `JSON.parse` and writes them with
//! `JSON.stringify`, so this codec is the only place the controller touches
//! the encoding.

use crate::protocol::error::{FarcallError, Result};
use crate::protocol::{Envelope, RequestEnvelope, ResponseEnvelope};

/// JSON text codec for farcall envelopes.
///
/// # Example
///
/// ```
/// use farcall_common::{Envelope, JsonCodec, RequestEnvelope};
/// use serde_json::json;
///
/// let request = RequestEnvelope::new(1, "echo", vec![json!("hi")]);
/// let text = JsonCodec::encode_request(&request).unwrap();
///
/// match JsonCodec::decode_envelope(&text).unwrap() {
///     Envelope::Request(decoded) => assert_eq!(decoded, request),
///     Envelope::Response(_) => unreachable!(),
/// }
/// ```
pub struct JsonCodec;

impl JsonCodec {
    pub fn encode_request(request: &RequestEnvelope) -> Result<String> {
        serde_json::to_string(request).map_err(FarcallError::from)
    }

    pub fn decode_request(data: &str) -> Result<RequestEnvelope> {
        serde_json::from_str(data)
            .map_err(|e| FarcallError::InvalidEnvelope(format!("Malformed request envelope: {}", e)))
    }

    pub fn encode_response(response: &ResponseEnvelope) -> Result<String> {
        serde_json::to_string(response).map_err(FarcallError::from)
    }

    /// Decodes a response envelope.
    ///
    /// # Errors
    ///
    /// Returns `FarcallError::InvalidEnvelope` if the text is not JSON, lacks
    /// `messageId`, or carries neither `result` nor `exception`.
    pub fn decode_response(data: &str) -> Result<ResponseEnvelope> {
        serde_json::from_str(data)
            .map_err(|e| FarcallError::InvalidEnvelope(format!("Malformed response envelope: {}", e)))
    }

    /// Classifies text seen on a bidirectional channel as a request or a response.
    pub fn decode_envelope(data: &str) -> Result<Envelope> {
        serde_json::from_str(data)
            .map_err(|e| FarcallError::InvalidEnvelope(format!("Unrecognized envelope: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ExceptionEnvelope, Outcome};
    use serde_json::json;

    #[test]
    fn test_encode_request_wire_shape() {
        let request = RequestEnvelope::new(42, "add", vec![json!(2), json!(3)]);
        let encoded = JsonCodec::encode_request(&request).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, json!({"command": "add", "args": [2, 3], "messageId": 42}));
    }

    #[test]
    fn test_decode_request() {
        let decoded = JsonCodec::decode_request(r#"{"command":"noop","args":[],"messageId":3}"#).unwrap();
        assert_eq!(decoded.command, "noop");
        assert!(decoded.args.is_empty());
        assert_eq!(decoded.message_id, 3);
    }

    #[test]
    fn test_encode_result_response_wire_shape() {
        let response = ResponseEnvelope::result(1, json!({"sum": 5}));
        let encoded = JsonCodec::encode_response(&response).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, json!({"messageId": 1, "result": {"sum": 5}}));
    }

    #[test]
    fn test_encode_exception_response_wire_shape() {
        let response = ResponseEnvelope::exception(9, ExceptionEnvelope::new("RangeError", "bad"));
        let encoded = JsonCodec::encode_response(&response).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(
            value,
            json!({"messageId": 9, "exception": {"type": "RangeError", "message": "bad"}})
        );
    }

    #[test]
    fn test_decode_null_result() {
        let decoded = JsonCodec::decode_response(r#"{"messageId":5,"result":null}"#).unwrap();
        assert_eq!(decoded.outcome, Outcome::Result(json!(null)));
    }

    #[test]
    fn test_decode_exception_response() {
        let decoded = JsonCodec::decode_response(
            r#"{"messageId":2,"exception":{"type":"TypeError","message":"nope"}}"#,
        )
        .unwrap();
        assert!(decoded.is_exception());
        assert_eq!(
            decoded.outcome,
            Outcome::Exception(ExceptionEnvelope::new("TypeError", "nope"))
        );
    }

    #[test]
    fn test_decode_response_without_outcome_fails() {
        let result = JsonCodec::decode_response(r#"{"messageId":2}"#);
        assert!(matches!(result, Err(FarcallError::InvalidEnvelope(_))));
    }

    #[test]
    fn test_decode_response_without_message_id_fails() {
        let result = JsonCodec::decode_response(r#"{"result":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(JsonCodec::decode_response("not json").is_err());
        assert!(JsonCodec::decode_envelope("").is_err());
    }

    #[test]
    fn test_decode_envelope_classifies_both_directions() {
        let request = JsonCodec::decode_envelope(r#"{"command":"a","args":[1],"messageId":1}"#).unwrap();
        assert!(matches!(request, Envelope::Request(_)));

        let response = JsonCodec::decode_envelope(r#"{"messageId":1,"result":1}"#).unwrap();
        assert!(matches!(response, Envelope::Response(_)));
    }
}
