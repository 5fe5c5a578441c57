// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Event header (manifest) and its CBOR encoding.
//!
//! Wire layout (v1), a definite-length CBOR array:
//!
//! ```text
//! [ version: u8 = 1,
//!   run_number: u64,
//!   event_number: u64,
//!   [ [name: text, kind: u32, payload_size: u32], ... ] ]
//! ```
//!
//! The payload is not part of the header. It follows the header directly,
//! with collection byte ranges concatenated in manifest order.

use std::convert::Infallible;

use hepio_model::{CollectionKind, UnknownKind};
use minicbor::{Decoder, Encoder};
use thiserror::Error;

/// Current header wire version.
pub const HEADER_VERSION: u8 = 1;
/// Upper bound on collections per event accepted by the decoder.
pub const MAX_COLLECTIONS: usize = 1 << 16;

/// Errors produced while encoding or decoding an [`EventHeader`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    /// The CBOR structure is malformed or truncated.
    #[error("malformed event header: {0}")]
    Malformed(String),
    /// The header was written by an unsupported format version.
    #[error("unsupported event header version {0}")]
    UnsupportedVersion(u8),
    /// A collection header carries a kind tag outside the registry.
    #[error(transparent)]
    UnknownKind(#[from] UnknownKind),
    /// More collections than [`MAX_COLLECTIONS`].
    #[error("event header lists {0} collections, limit is {MAX_COLLECTIONS}")]
    TooManyCollections(u64),
    /// A complete header was decoded but bytes were left over.
    #[error("{0} trailing bytes after event header")]
    TrailingBytes(usize),
    /// The encoder failed.
    #[error("event header encode failed: {0}")]
    Encode(String),
}

impl From<minicbor::decode::Error> for HeaderError {
    fn from(err: minicbor::decode::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

impl From<minicbor::encode::Error<Infallible>> for HeaderError {
    fn from(err: minicbor::encode::Error<Infallible>) -> Self {
        Self::Encode(err.to_string())
    }
}

/// Manifest entry for one collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionHeader {
    /// Collection name. Case-sensitive; expected to be unique per event.
    pub name: String,
    /// Kind tag selecting the decoder.
    pub kind: CollectionKind,
    /// Length of this collection's byte range in the payload.
    pub payload_size: u32,
}

/// Event-level metadata plus the ordered collection manifest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventHeader {
    /// Run number.
    pub run_number: u64,
    /// Event number within the run.
    pub event_number: u64,
    /// Collection headers in append order.
    pub collections: Vec<CollectionHeader>,
}

impl EventHeader {
    /// Total payload length implied by the manifest.
    pub fn payload_len(&self) -> u64 {
        self.collections
            .iter()
            .map(|c| u64::from(c.payload_size))
            .sum()
    }

    /// Encodes the header to CBOR bytes.
    pub fn encode(&self) -> Result<Vec<u8>, HeaderError> {
        let mut buf = Vec::new();
        let mut e = Encoder::new(&mut buf);
        e.array(4)?;
        e.u8(HEADER_VERSION)?;
        e.u64(self.run_number)?;
        e.u64(self.event_number)?;
        e.array(self.collections.len() as u64)?;
        for coll in &self.collections {
            e.array(3)?;
            e.str(&coll.name)?;
            e.u32(coll.kind.wire())?;
            e.u32(coll.payload_size)?;
        }
        Ok(buf)
    }

    /// Decodes a header that must span all of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, HeaderError> {
        let (header, used) = Self::decode_prefix(bytes)?;
        if used < bytes.len() {
            return Err(HeaderError::TrailingBytes(bytes.len() - used));
        }
        Ok(header)
    }

    /// Decodes a header from the front of `bytes`, returning the header and
    /// the number of bytes it occupied.
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_COLLECTIONS
    pub fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize), HeaderError> {
        let mut d = Decoder::new(bytes);
        expect_array(&mut d, 4, "EventHeader")?;
        let version = d.u8()?;
        if version != HEADER_VERSION {
            return Err(HeaderError::UnsupportedVersion(version));
        }
        let run_number = d.u64()?;
        let event_number = d.u64()?;
        let count = d
            .array()?
            .ok_or_else(|| HeaderError::Malformed("expected definite array for collections".into()))?;
        if count > MAX_COLLECTIONS as u64 {
            return Err(HeaderError::TooManyCollections(count));
        }
        let mut collections = Vec::with_capacity(count as usize);
        for _ in 0..count {
            expect_array(&mut d, 3, "CollectionHeader")?;
            let name = String::from(d.str()?);
            let kind = CollectionKind::from_wire(d.u32()?)?;
            let payload_size = d.u32()?;
            collections.push(CollectionHeader {
                name,
                kind,
                payload_size,
            });
        }
        Ok((
            Self {
                run_number,
                event_number,
                collections,
            },
            d.position(),
        ))
    }
}

fn expect_array(d: &mut Decoder<'_>, fields: u64, what: &str) -> Result<(), HeaderError> {
    let len = d
        .array()?
        .ok_or_else(|| HeaderError::Malformed(format!("expected definite array for {what}")))?;
    if len != fields {
        return Err(HeaderError::Malformed(format!(
            "{what} expected {fields} fields, got {len}"
        )));
    }
    Ok(())
}
