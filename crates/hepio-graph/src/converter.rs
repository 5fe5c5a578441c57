// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identity graph to event container conversion.
//!
//! The collection order is fixed before anything is resolved: it is the
//! source event's order. Every relation is resolved against that complete
//! list, so links into collections that have not been appended yet are
//! fine. Collections are then appended in the same order, and each append
//! is checked against its planned position.

use std::rc::Rc;

use hepio_event::{Event, EventError};
use hepio_model::{
    CalorimeterHitCollection, ClusterCollection, McParticleCollection, SimTrackerHitCollection,
    TrackCollection, TrackerHitCollection,
};
use thiserror::Error;
use tracing::debug;

use crate::resolve::{IdentityIndex, LinearScan, Resolve};
use crate::source::{SourceCollection, SourceEvent, SourceRecord, SourceRecords};

/// Errors raised while converting a [`SourceEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    /// More collections than a `u32` collection id can address.
    #[error("event has {0} collections, more than a u32 id can address")]
    TooManyCollections(usize),
    /// More entries than a `u32` entry id can address.
    #[error("collection {name:?} has {len} records, more than a u32 id can address")]
    TooManyEntries {
        /// Collection name.
        name: String,
        /// Record count.
        len: usize,
    },
    /// The container assigned a different position than the one used for
    /// resolution.
    #[error("collection {name:?} was planned at position {planned} but landed at {actual}")]
    OrderMismatch {
        /// Collection name.
        name: String,
        /// 1-based position used while resolving references.
        planned: u32,
        /// 1-based position assigned by the container.
        actual: u32,
    },
    /// Appending to the container failed.
    #[error(transparent)]
    Event(#[from] EventError),
}

/// How relations are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Strategy {
    /// Build an [`IdentityIndex`] once per event.
    #[default]
    Index,
    /// Scan every collection per relation with [`LinearScan`].
    LinearScan,
}

/// Converts source events into containers.
#[derive(Clone, Copy, Debug, Default)]
pub struct EventConverter {
    strategy: Strategy,
}

impl EventConverter {
    /// Converter using the identity index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Converter using `strategy`.
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self { strategy }
    }

    /// Converts one event.
    pub fn convert(&self, source: &SourceEvent) -> Result<Event, ConvertError> {
        let plan = source.collections.as_slice();
        check_sizes(plan)?;
        match self.strategy {
            Strategy::Index => assemble(source, &IdentityIndex::build(plan)?),
            Strategy::LinearScan => assemble(source, &LinearScan::new(plan)),
        }
    }
}

/// Converts one event with the default strategy.
pub fn convert_event(source: &SourceEvent) -> Result<Event, ConvertError> {
    EventConverter::default().convert(source)
}

fn check_sizes(plan: &[SourceCollection]) -> Result<(), ConvertError> {
    if u32::try_from(plan.len()).is_err() {
        return Err(ConvertError::TooManyCollections(plan.len()));
    }
    for coll in plan {
        if u32::try_from(coll.records.len()).is_err() {
            return Err(ConvertError::TooManyEntries {
                name: coll.name.clone(),
                len: coll.records.len(),
            });
        }
    }
    Ok(())
}

fn entries<T: SourceRecord, R: Resolve>(records: &[Rc<T>], resolver: &R) -> Vec<T::Entry> {
    (1..)
        .zip(records)
        .map(|(id, record)| record.to_entry(id, resolver))
        .collect()
}

macro_rules! build {
    ($collection:ident, $coll:expr, $id:expr, $records:expr, $resolver:expr) => {
        $collection {
            id: $id,
            flags: $coll.flags,
            params: $coll.params.clone(),
            entries: entries($records, $resolver),
        }
    };
}

fn assemble<R: Resolve>(source: &SourceEvent, resolver: &R) -> Result<Event, ConvertError> {
    let mut event = Event::new(source.run_number, source.event_number);
    for (planned, coll) in (1u32..).zip(&source.collections) {
        let before = event.collection_count();
        if before + 1 != planned {
            return Err(ConvertError::OrderMismatch {
                name: coll.name.clone(),
                planned,
                actual: before + 1,
            });
        }
        let name = coll.name.as_str();
        let actual = match &coll.records {
            SourceRecords::McParticles(rs) => {
                event.add_collection(&build!(McParticleCollection, coll, planned, rs, resolver), name)
            }
            SourceRecords::SimTrackerHits(rs) => event.add_collection(
                &build!(SimTrackerHitCollection, coll, planned, rs, resolver),
                name,
            ),
            SourceRecords::TrackerHits(rs) => event.add_collection(
                &build!(TrackerHitCollection, coll, planned, rs, resolver),
                name,
            ),
            SourceRecords::Tracks(rs) => {
                event.add_collection(&build!(TrackCollection, coll, planned, rs, resolver), name)
            }
            SourceRecords::CalorimeterHits(rs) => event.add_collection(
                &build!(CalorimeterHitCollection, coll, planned, rs, resolver),
                name,
            ),
            SourceRecords::Clusters(rs) => {
                event.add_collection(&build!(ClusterCollection, coll, planned, rs, resolver), name)
            }
        }?;
        if actual != planned {
            return Err(ConvertError::OrderMismatch {
                name: coll.name.clone(),
                planned,
                actual,
            });
        }
        debug!(name, id = actual, records = coll.records.len(), "converted collection");
    }
    Ok(event)
}
