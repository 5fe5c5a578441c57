// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collection type registry.
//!
//! Maps the closed set of [`CollectionKind`] tags to the collection types that
//! can encode and decode them. The set is fixed at compile time: adding a kind
//! means adding one enum variant, one [`AnyCollection`] variant and one row in
//! the decoder table. The event container never changes for a new kind.
//!
//! Tag values are part of the wire format and must never be reused.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::records::{
    CalorimeterHitCollection, ClusterCollection, McParticleCollection, SimTrackerHitCollection,
    TrackCollection, TrackerHitCollection,
};
use crate::{DecodeError, Message};

/// Kind tag written into every collection header.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum CollectionKind {
    /// Reserved: unrecognized or unregistered kind.
    None = 0,
    /// [`McParticleCollection`].
    McParticle = 1,
    /// [`SimTrackerHitCollection`].
    SimTrackerHit = 2,
    /// [`TrackerHitCollection`].
    TrackerHit = 3,
    /// [`TrackCollection`].
    Track = 4,
    /// [`CalorimeterHitCollection`].
    CalorimeterHit = 5,
    /// [`ClusterCollection`].
    Cluster = 6,
}

/// Wire value that names no known kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown collection kind tag {0}")]
pub struct UnknownKind(pub u32);

impl CollectionKind {
    /// Every kind with a registered decoder, in tag order.
    pub const REGISTERED: [Self; 6] = [
        Self::McParticle,
        Self::SimTrackerHit,
        Self::TrackerHit,
        Self::Track,
        Self::CalorimeterHit,
        Self::Cluster,
    ];

    /// Wire value of this tag.
    pub const fn wire(self) -> u32 {
        self as u32
    }

    /// Parses a wire value. `0` maps to [`CollectionKind::None`].
    pub const fn from_wire(tag: u32) -> Result<Self, UnknownKind> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::McParticle),
            2 => Ok(Self::SimTrackerHit),
            3 => Ok(Self::TrackerHit),
            4 => Ok(Self::Track),
            5 => Ok(Self::CalorimeterHit),
            6 => Ok(Self::Cluster),
            n => Err(UnknownKind(n)),
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::McParticle => "MCParticle",
            Self::SimTrackerHit => "SimTrackerHit",
            Self::TrackerHit => "TrackerHit",
            Self::Track => "Track",
            Self::CalorimeterHit => "CalorimeterHit",
            Self::Cluster => "Cluster",
        }
    }

    /// Returns true when a decoder exists for this kind.
    pub fn is_registered(self) -> bool {
        entry(self).is_some()
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed collection that the registry can classify.
///
/// Types outside the closed set may implement this with
/// `KIND = CollectionKind::None`; the event container refuses to store them.
pub trait Collection: Message {
    /// Kind tag written into the header for this collection type.
    const KIND: CollectionKind;

    /// Number of entries.
    fn len(&self) -> usize;

    /// Returns true when the collection has no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Classifies an already-typed collection.
pub fn kind_of<C: Collection>(_collection: &C) -> CollectionKind {
    C::KIND
}

/// A decoded collection of any registered kind.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnyCollection {
    /// Truth particles.
    McParticles(McParticleCollection),
    /// Simulated tracker hits.
    SimTrackerHits(SimTrackerHitCollection),
    /// Reconstructed tracker hits.
    TrackerHits(TrackerHitCollection),
    /// Tracks.
    Tracks(TrackCollection),
    /// Calorimeter hits.
    CalorimeterHits(CalorimeterHitCollection),
    /// Clusters.
    Clusters(ClusterCollection),
}

impl AnyCollection {
    /// Decodes `bytes` with the decoder registered for `kind`.
    pub fn decode(kind: CollectionKind, bytes: &[u8]) -> Result<Self, DecodeError> {
        let entry = entry(kind).ok_or(DecodeError::Unregistered(kind))?;
        (entry.decode)(bytes)
    }

    /// Kind tag of the wrapped collection.
    pub const fn kind(&self) -> CollectionKind {
        match self {
            Self::McParticles(_) => CollectionKind::McParticle,
            Self::SimTrackerHits(_) => CollectionKind::SimTrackerHit,
            Self::TrackerHits(_) => CollectionKind::TrackerHit,
            Self::Tracks(_) => CollectionKind::Track,
            Self::CalorimeterHits(_) => CollectionKind::CalorimeterHit,
            Self::Clusters(_) => CollectionKind::Cluster,
        }
    }

    /// Number of entries in the wrapped collection.
    pub fn len(&self) -> usize {
        match self {
            Self::McParticles(c) => c.len(),
            Self::SimTrackerHits(c) => c.len(),
            Self::TrackerHits(c) => c.len(),
            Self::Tracks(c) => c.len(),
            Self::CalorimeterHits(c) => c.len(),
            Self::Clusters(c) => c.len(),
        }
    }

    /// Returns true when the wrapped collection has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One row of the registry table.
#[derive(Clone, Copy)]
pub struct KindEntry {
    /// Tag handled by this row.
    pub kind: CollectionKind,
    /// Builds an empty collection of this kind.
    pub empty: fn() -> AnyCollection,
    /// Decodes a payload range of this kind.
    pub decode: fn(&[u8]) -> Result<AnyCollection, DecodeError>,
}

impl fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindEntry").field("kind", &self.kind).finish()
    }
}

fn empty_of<C>() -> AnyCollection
where
    C: Collection + Default + Into<AnyCollection>,
{
    C::default().into()
}

fn decode_as<C>(bytes: &[u8]) -> Result<AnyCollection, DecodeError>
where
    C: Collection + Into<AnyCollection>,
{
    C::unmarshal(bytes).map(Into::into)
}

macro_rules! kind_entry {
    ($kind:ident, $ty:ty) => {
        KindEntry {
            kind: CollectionKind::$kind,
            empty: empty_of::<$ty>,
            decode: decode_as::<$ty>,
        }
    };
}

static TABLE: [KindEntry; 6] = [
    kind_entry!(McParticle, McParticleCollection),
    kind_entry!(SimTrackerHit, SimTrackerHitCollection),
    kind_entry!(TrackerHit, TrackerHitCollection),
    kind_entry!(Track, TrackCollection),
    kind_entry!(CalorimeterHit, CalorimeterHitCollection),
    kind_entry!(Cluster, ClusterCollection),
];

/// Looks up the registry row for `kind`. `None` for [`CollectionKind::None`].
pub fn entry(kind: CollectionKind) -> Option<&'static KindEntry> {
    TABLE.iter().find(|e| e.kind == kind)
}

/// All registry rows, in tag order.
pub fn entries() -> &'static [KindEntry] {
    &TABLE
}

/// Builds an empty, decodable collection for `kind`.
///
/// Returns `None` for [`CollectionKind::None`].
pub fn new_collection_for_kind(kind: CollectionKind) -> Option<AnyCollection> {
    entry(kind).map(|e| (e.empty)())
}
