//! Request body decoding.
//!
//! The server loop buffers the complete body (per `Content-Length`) before
//! dispatch, so by the time this module runs the body is a plain byte
//! buffer. Two decode policies exist:
//!
//! - [`decode_lenient`] — the dispatcher's default path. Empty and
//!   malformed bodies both become `{}`; a request never fails dispatch
//!   because of its body.
//! - [`decode`] — strict. Malformed JSON is an error. Handlers that
//!   require valid JSON reach this through
//!   [`RequestContext::json`](crate::context::RequestContext::json) and
//!   convert the failure to a 400 themselves.

use bytes::Bytes;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Errors produced by strict body decoding.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("invalid JSON body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Returns the canonical empty body value: `{}`.
pub fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Decodes `bytes` as JSON, degrading to `{}` on empty or malformed input.
pub fn decode_lenient(bytes: &Bytes) -> Value {
    if bytes.is_empty() {
        return empty_object();
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "malformed request body, using empty object");
            empty_object()
        }
    }
}

/// Decodes `bytes` as JSON. An empty body is `{}`; malformed input is an
/// error.
pub fn decode(bytes: &Bytes) -> Result<Value, BodyError> {
    if bytes.is_empty() {
        return Ok(empty_object());
    }
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lenient_empty_body_is_empty_object() {
        assert_eq!(decode_lenient(&Bytes::new()), json!({}));
    }

    #[test]
    fn lenient_malformed_body_is_empty_object() {
        assert_eq!(decode_lenient(&Bytes::from_static(b"{oops")), json!({}));
    }

    #[test]
    fn lenient_valid_body_round_trips() {
        let body = Bytes::from_static(br#"{"numbers":[1,2,3]}"#);
        assert_eq!(decode_lenient(&body), json!({"numbers": [1, 2, 3]}));
    }

    #[test]
    fn lenient_accepts_top_level_array() {
        let body = Bytes::from_static(b"[1,2,3]");
        assert_eq!(decode_lenient(&body), json!([1, 2, 3]));
    }

    #[test]
    fn strict_empty_body_is_empty_object() {
        assert_eq!(decode(&Bytes::new()).unwrap(), json!({}));
    }

    #[test]
    fn strict_malformed_body_errors() {
        assert!(decode(&Bytes::from_static(b"not json")).is_err());
    }
}
