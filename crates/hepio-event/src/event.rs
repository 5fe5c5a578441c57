// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The event container: an ordered manifest plus one concatenated payload.
//!
//! Byte offsets are never stored. The range of the k-th collection starts at
//! the sum of the sizes of the collections before it, so the manifest order is
//! the only thing addressing depends on. Events are append-only.

use std::ops::Range;

use hepio_model::{AnyCollection, Collection, CollectionKind, DecodeError, EncodeError};
use thiserror::Error;
use tracing::debug;

use crate::header::{CollectionHeader, EventHeader, HeaderError, MAX_COLLECTIONS};

/// Errors raised by [`Event`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// The collection type has no registered kind tag.
    #[error("collection {name:?} has no registered kind")]
    UnregisteredKind {
        /// Name the caller tried to store it under.
        name: String,
    },
    /// The collection's own encoder failed.
    #[error("failed to encode collection {name:?}")]
    Encode {
        /// Collection name.
        name: String,
        /// Underlying encoder failure.
        #[source]
        source: EncodeError,
    },
    /// The encoded collection does not fit a `u32` payload size.
    #[error("collection {name:?} encodes to {len} bytes, more than a u32 size allows")]
    PayloadTooLarge {
        /// Collection name.
        name: String,
        /// Encoded length.
        len: usize,
    },
    /// The event already holds the maximum number of collections.
    #[error("event already holds {MAX_COLLECTIONS} collections")]
    TooManyCollections,
    /// The byte range under a header does not decode as its declared kind.
    #[error("collection {name:?} ({kind}) is malformed")]
    Decode {
        /// Collection name.
        name: String,
        /// Kind declared in the header.
        kind: CollectionKind,
        /// Underlying decoder failure.
        #[source]
        source: DecodeError,
    },
    /// A typed lookup found a collection of another kind.
    #[error("collection {name:?} is {found}, not {expected}")]
    KindMismatch {
        /// Collection name.
        name: String,
        /// Kind requested by the caller.
        expected: CollectionKind,
        /// Kind recorded in the header.
        found: CollectionKind,
    },
    /// Header sizes and payload length disagree.
    #[error("header declares {declared} payload bytes, payload holds {actual}")]
    PayloadSizeMismatch {
        /// Sum of the header payload sizes.
        declared: u64,
        /// Actual payload length.
        actual: u64,
    },
    /// The header itself failed to encode or decode.
    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// One event: run/event numbers, the collection manifest and the payload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    header: EventHeader,
    payload: Vec<u8>,
}

impl Event {
    /// Creates an empty event.
    pub fn new(run_number: u64, event_number: u64) -> Self {
        Self {
            header: EventHeader {
                run_number,
                event_number,
                collections: Vec::new(),
            },
            payload: Vec::new(),
        }
    }

    /// Rebuilds an event from a decoded header and its payload.
    ///
    /// Fails when the payload length differs from the sum of header sizes.
    pub fn from_parts(header: EventHeader, payload: Vec<u8>) -> Result<Self, EventError> {
        let declared = header.payload_len();
        let actual = payload.len() as u64;
        if declared != actual {
            return Err(EventError::PayloadSizeMismatch { declared, actual });
        }
        Ok(Self { header, payload })
    }

    /// Decodes an event laid out as `header || payload`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        let (header, used) = EventHeader::decode_prefix(bytes)?;
        Self::from_parts(header, bytes[used..].to_vec())
    }

    /// Encodes the event as `header || payload`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EventError> {
        let mut out = self.header.encode()?;
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Splits the event into header and payload.
    pub fn into_parts(self) -> (EventHeader, Vec<u8>) {
        (self.header, self.payload)
    }

    /// Run number.
    pub fn run_number(&self) -> u64 {
        self.header.run_number
    }

    /// Sets the run number.
    pub fn set_run_number(&mut self, run_number: u64) {
        self.header.run_number = run_number;
    }

    /// Event number.
    pub fn event_number(&self) -> u64 {
        self.header.event_number
    }

    /// Sets the event number.
    pub fn set_event_number(&mut self, event_number: u64) {
        self.header.event_number = event_number;
    }

    /// Encodes `collection` and appends it under `name`.
    ///
    /// Returns the 1-based collection id the new collection occupies. On any
    /// failure the event is left unchanged.
    pub fn add_collection<C: Collection>(
        &mut self,
        collection: &C,
        name: impl Into<String>,
    ) -> Result<u32, EventError> {
        let name = name.into();
        if !C::KIND.is_registered() {
            return Err(EventError::UnregisteredKind { name });
        }
        if self.header.collections.len() >= MAX_COLLECTIONS {
            return Err(EventError::TooManyCollections);
        }
        let bytes = match collection.marshal() {
            Ok(bytes) => bytes,
            Err(source) => return Err(EventError::Encode { name, source }),
        };
        let Ok(payload_size) = u32::try_from(bytes.len()) else {
            return Err(EventError::PayloadTooLarge {
                name,
                len: bytes.len(),
            });
        };
        let kind = C::KIND;
        self.payload.extend_from_slice(&bytes);
        self.header.collections.push(CollectionHeader {
            name,
            kind,
            payload_size,
        });
        let id = self.collection_count();
        debug!(id, %kind, payload_size, "appended collection");
        Ok(id)
    }

    /// Number of collections in the manifest.
    #[allow(clippy::cast_possible_truncation)] // bounded by MAX_COLLECTIONS
    pub fn collection_count(&self) -> u32 {
        self.header.collections.len() as u32
    }

    /// Header at zero-based position `index`.
    pub fn header_at(&self, index: usize) -> Option<&CollectionHeader> {
        self.header.collections.get(index)
    }

    /// Collection headers in manifest order.
    pub fn collections(&self) -> impl ExactSizeIterator<Item = &CollectionHeader> + '_ {
        self.header.collections.iter()
    }

    /// Collection names in manifest order. Duplicates are repeated.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.header.collections.iter().map(|c| c.name.as_str())
    }

    /// The full event header.
    pub fn header(&self) -> &EventHeader {
        &self.header
    }

    /// The concatenated payload.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Byte range of the first collection named `name`.
    pub fn collection_range(&self, name: &str) -> Option<Range<usize>> {
        self.locate(|_, c| c.name == name).map(|(_, range)| range)
    }

    /// Decodes the first collection named `name`.
    ///
    /// `Ok(None)` means no header carries that name. A header that is
    /// present but whose bytes do not decode is an error.
    pub fn get_collection(&self, name: &str) -> Result<Option<AnyCollection>, EventError> {
        match self.locate(|_, c| c.name == name) {
            Some((index, range)) => self.decode_at(index, range).map(Some),
            None => Ok(None),
        }
    }

    /// Decodes the collection with 1-based id `collection_id`.
    ///
    /// Reaches collections that are shadowed by an earlier duplicate name.
    pub fn get_collection_by_id(
        &self,
        collection_id: u32,
    ) -> Result<Option<AnyCollection>, EventError> {
        let Some(target) = (collection_id as usize).checked_sub(1) else {
            return Ok(None);
        };
        match self.locate(|index, _| index == target) {
            Some((index, range)) => self.decode_at(index, range).map(Some),
            None => Ok(None),
        }
    }

    /// Decodes the first collection named `name` as the concrete type `C`.
    pub fn get_collection_as<C: Collection>(&self, name: &str) -> Result<Option<C>, EventError> {
        let Some((index, range)) = self.locate(|_, c| c.name == name) else {
            return Ok(None);
        };
        let header = &self.header.collections[index];
        if header.kind != C::KIND {
            return Err(EventError::KindMismatch {
                name: header.name.clone(),
                expected: C::KIND,
                found: header.kind,
            });
        }
        let bytes = self.slice(range)?;
        C::unmarshal(bytes)
            .map(Some)
            .map_err(|source| EventError::Decode {
                name: header.name.clone(),
                kind: header.kind,
                source,
            })
    }

    /// Walks the manifest accumulating offsets; returns the first match.
    fn locate(
        &self,
        mut pred: impl FnMut(usize, &CollectionHeader) -> bool,
    ) -> Option<(usize, Range<usize>)> {
        let mut offset = 0usize;
        for (index, coll) in self.header.collections.iter().enumerate() {
            let end = offset + coll.payload_size as usize;
            if pred(index, coll) {
                return Some((index, offset..end));
            }
            offset = end;
        }
        None
    }

    fn slice(&self, range: Range<usize>) -> Result<&[u8], EventError> {
        self.payload
            .get(range)
            .ok_or(EventError::PayloadSizeMismatch {
                declared: self.header.payload_len(),
                actual: self.payload.len() as u64,
            })
    }

    fn decode_at(&self, index: usize, range: Range<usize>) -> Result<AnyCollection, EventError> {
        let header = &self.header.collections[index];
        debug!(name = %header.name, kind = %header.kind, len = range.len(), "decoding collection");
        let bytes = self.slice(range)?;
        AnyCollection::decode(header.kind, bytes).map_err(|source| EventError::Decode {
            name: header.name.clone(),
            kind: header.kind,
            source,
        })
    }
}
