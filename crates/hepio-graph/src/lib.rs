// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identity-graph events and their conversion to hepio containers.
//!
//! In memory, records point at each other by identity ([`source`]). On the
//! wire, a link is a [`Reference`](hepio_model::Reference): the 1-based
//! position of the target's collection in the event, and of the target in
//! that collection. [`resolve`] computes those addresses and [`converter`]
//! builds whole events with them. [`legacy`] loads identity graphs from JSON
//! event dumps.
#![forbid(unsafe_code)]

pub mod converter;
pub mod legacy;
pub mod resolve;
pub mod source;

pub use converter::{convert_event, ConvertError, EventConverter, Strategy};
pub use legacy::{parse_event, DumpReader, LoadError};
pub use resolve::{IdentityIndex, LinearScan, Resolve};
pub use source::{RecordId, SourceCollection, SourceEvent, SourceRecord, SourceRecords};
