// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The opaque encode/decode capability carried by every collection.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::registry::CollectionKind;

/// Failure to turn a collection into bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The CBOR serializer rejected the value.
    #[error("CBOR encode failed: {0}")]
    Cbor(String),
}

/// Failure to turn bytes back into a collection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The bytes are not a valid CBOR encoding of the expected type.
    #[error("CBOR decode failed: {0}")]
    Cbor(String),
    /// A complete value was decoded but bytes were left over.
    #[error("{remaining} trailing bytes after {kind}")]
    TrailingBytes {
        /// Name of the type being decoded.
        kind: &'static str,
        /// Number of unconsumed bytes.
        remaining: usize,
    },
    /// No decoder is registered for this kind.
    #[error("no decoder registered for collection kind {0}")]
    Unregistered(CollectionKind),
}

/// Encode/decode capability of a collection.
///
/// `marshal` and `unmarshal` must round-trip: `C::unmarshal(&c.marshal()?)`
/// yields a value equal to `c`. `unmarshal` must consume the whole slice.
pub trait Message: Sized {
    /// Encodes `self` into an owned byte buffer.
    fn marshal(&self) -> Result<Vec<u8>, EncodeError>;

    /// Decodes a value from exactly `bytes`.
    fn unmarshal(bytes: &[u8]) -> Result<Self, DecodeError>;
}

/// Serializes `value` as CBOR.
pub(crate) fn to_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf).map_err(|e| EncodeError::Cbor(e.to_string()))?;
    Ok(buf)
}

/// Deserializes a CBOR value that must span all of `bytes`.
pub(crate) fn from_cbor<T: DeserializeOwned>(
    bytes: &[u8],
    kind: &'static str,
) -> Result<T, DecodeError> {
    let mut reader = bytes;
    let value = ciborium::de::from_reader(&mut reader).map_err(|e| DecodeError::Cbor(e.to_string()))?;
    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes {
            kind,
            remaining: reader.len(),
        });
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn from_cbor_rejects_trailing_bytes() {
        let mut bytes = to_cbor(&7u32).unwrap();
        bytes.push(0x00);
        let err = from_cbor::<u32>(&bytes, "u32").unwrap_err();
        assert_eq!(
            err,
            DecodeError::TrailingBytes {
                kind: "u32",
                remaining: 1
            }
        );
    }

    #[test]
    fn from_cbor_rejects_truncated_input() {
        let bytes = to_cbor(&"a fairly long string").unwrap();
        let err = from_cbor::<String>(&bytes[..bytes.len() - 3], "string").unwrap_err();
        assert!(matches!(err, DecodeError::Cbor(_)));
    }
}
