//! Named codecs for intermediate object state
//!
//! A codec turns an object's JSON payload into bytes and back; which codec
//! a cache step uses is selected by name at execution time.

use serde_json::Value;
use thiserror::Error;

/// Codec failure.
#[derive(Debug, Error)]
pub enum CodecError {
  #[error("encode failed: {0}")]
  Encode(String),

  #[error("decode failed: {0}")]
  Decode(String),
}

/// Byte format for cached object payloads.
pub trait Codec: Send + Sync {
  fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;
  fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// Pretty-printed JSON, the default codec.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl Codec for JsonCodec {
  fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec_pretty(value).map_err(|e| CodecError::Encode(e.to_string()))
  }

  fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn json_round_trip() {
    let codec = JsonCodec;
    let value = json!({"a": 7, "nested": [1, 2, {"b": null}]});
    let bytes = codec.encode(&value).unwrap();
    assert_eq!(codec.decode(&bytes).unwrap(), value);
  }

  #[test]
  fn decode_rejects_garbage() {
    let codec = JsonCodec;
    assert!(matches!(codec.decode(b"not json"), Err(CodecError::Decode(_))));
  }
}
