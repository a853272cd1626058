// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Binary encoding for ledger entities and wire messages.
//!
//! Everything that crosses a process boundary (blocks, transactions,
//! message envelopes, stored blocks) goes through these two functions, so the
//! rest of the crate never names the serializer directly. The format is
//! bincode with its default (fixed-int, little-endian) configuration.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// Serializes `value` into a fresh buffer.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    bincode::serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Deserializes a `T` from `bytes`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bincode::deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_a_decode_error() {
        let err = decode::<(u64, String)>(&[0xff, 0x01]).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn encoding_is_deterministic() {
        let value = (7u32, vec![1u8, 2, 3], "x".to_string());
        assert_eq!(encode(&value).unwrap(), encode(&value).unwrap());
        let back: (u32, Vec<u8>, String) = decode(&encode(&value).unwrap()).unwrap();
        assert_eq!(back, value);
    }
}
