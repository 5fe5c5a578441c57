// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Record kinds and addressing for hepio event containers.
//!
//! This crate is the leaf of the workspace. It owns:
//!
//! - the [`Message`] capability (`marshal` / `unmarshal`) every collection
//!   implements,
//! - [`Reference`], the `(collection, entry)` address that replaces in-memory
//!   identity links once an event is serialized,
//! - the concrete record and collection types (particles, hits, tracks,
//!   clusters), and
//! - the [`registry`]: the closed set of [`CollectionKind`] tags and the table
//!   that routes an encoded byte range back to the right decoder.
//!
//! Collection payloads are CBOR (via `serde` + `ciborium`). The container does
//! not care about that choice; it only sees bytes.
#![forbid(unsafe_code)]

mod message;
mod params;
mod records;
mod reference;
pub mod registry;

pub use message::{DecodeError, EncodeError, Message};
pub use params::Params;
pub use records::{
    CalorimeterHit, CalorimeterHitCollection, Cluster, ClusterCollection, McParticle,
    McParticleCollection, SimTrackerHit, SimTrackerHitCollection, Track, TrackCollection,
    TrackerHit, TrackerHitCollection,
};
pub use reference::Reference;
pub use registry::{kind_of, AnyCollection, Collection, CollectionKind, UnknownKind};
