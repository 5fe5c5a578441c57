// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory identity graph: the form events take before conversion.
//!
//! Records are `Rc` allocations owned by their collection. Relations hold
//! `Weak` pointers, so parent/child cycles do not keep each other alive. A
//! record is identified by its allocation address ([`RecordId`]), never by
//! its contents: two records with equal fields are still two records.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use hepio_model::{self as model, CollectionKind, Params, Reference};

use crate::resolve::Resolve;

/// Identity of a live record: the address of its `Rc` allocation.
///
/// Only meaningful while the record is alive. Addresses of dropped records
/// may be reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(usize);

impl RecordId {
    /// Identity of the record behind `rc`.
    pub fn of<T>(rc: &Rc<T>) -> Self {
        Self(Rc::as_ptr(rc).cast::<()>().addr())
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({:#x})", self.0)
    }
}

/// Single relation to another record. Empty means no link.
pub struct Link<T>(RefCell<Weak<T>>);

impl<T> Link<T> {
    /// An unset link.
    pub fn new() -> Self {
        Self(RefCell::new(Weak::new()))
    }

    /// Points the link at `target`.
    pub fn set(&self, target: &Rc<T>) {
        *self.0.borrow_mut() = Rc::downgrade(target);
    }

    /// Points the link at a possibly dead target.
    pub fn set_weak(&self, target: Weak<T>) {
        *self.0.borrow_mut() = target;
    }

    /// The target, if set and still alive.
    pub fn get(&self) -> Option<Rc<T>> {
        self.0.borrow().upgrade()
    }

    /// Identity of the target, if set and still alive.
    pub fn id(&self) -> Option<RecordId> {
        self.get().map(|rc| RecordId::of(&rc))
    }

    /// Serializable address of the target, or `None` when it is unset, dead
    /// or outside the event being converted.
    pub fn resolve<R: Resolve>(&self, resolver: &R) -> Option<Reference> {
        self.id().and_then(|id| resolver.resolve(id))
    }
}

impl<T> Default for Link<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Link<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Link").field(&self.id()).finish()
    }
}

/// Repeated relation to other records, in insertion order.
pub struct Links<T>(RefCell<Vec<Weak<T>>>);

impl<T> Links<T> {
    /// An empty relation.
    pub fn new() -> Self {
        Self(RefCell::new(Vec::new()))
    }

    /// Appends `target`.
    pub fn push(&self, target: &Rc<T>) {
        self.0.borrow_mut().push(Rc::downgrade(target));
    }

    /// Appends a possibly dead target.
    pub fn push_weak(&self, target: Weak<T>) {
        self.0.borrow_mut().push(target);
    }

    /// Number of stored links, live or not.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Returns true when no links are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live targets in order. Dead links are skipped.
    pub fn targets(&self) -> Vec<Rc<T>> {
        self.0.borrow().iter().filter_map(Weak::upgrade).collect()
    }

    /// Identities of the live targets in order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.targets().iter().map(RecordId::of).collect()
    }

    /// Addresses of the targets that resolve, in order. Targets that are
    /// dead or outside the event are dropped.
    pub fn resolve<R: Resolve>(&self, resolver: &R) -> Vec<Reference> {
        resolver.resolve_all(self.ids())
    }
}

impl<T> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Links").field(&self.len()).finish()
    }
}

/// A record kind of the identity graph.
///
/// `to_entry` produces the serialized entry: the record's own fields with
/// `id` set and every relation replaced by resolved [`Reference`]s.
pub trait SourceRecord: Sized {
    /// Serialized entry type.
    type Entry;

    /// Kind tag of collections holding this record type.
    const KIND: CollectionKind;

    /// Wraps plain field values with empty relations.
    fn from_props(props: Self::Entry) -> Self;

    /// The records of `records` if they are of this type.
    fn select(records: &SourceRecords) -> Option<&[Rc<Self>]>;

    /// Builds the serialized entry with 1-based local id `id`.
    fn to_entry<R: Resolve>(&self, id: u32, resolver: &R) -> Self::Entry;
}

/// Truth particle.
#[derive(Debug, Default)]
pub struct McParticle {
    /// Field values. Relation fields and `id` are ignored.
    pub props: model::McParticle,
    /// Parent particles.
    pub parents: Links<McParticle>,
    /// Daughter particles.
    pub children: Links<McParticle>,
}

/// Simulated tracker hit.
#[derive(Debug, Default)]
pub struct SimTrackerHit {
    /// Field values. `mc` and `id` are overwritten on conversion.
    pub props: model::SimTrackerHit,
    /// Particle that caused the hit.
    pub mc: Link<McParticle>,
}

/// Reconstructed tracker hit.
#[derive(Debug, Default)]
pub struct TrackerHit {
    /// Field values.
    pub props: model::TrackerHit,
    /// Simulated hits it was built from.
    pub raw_hits: Links<SimTrackerHit>,
}

/// Track.
#[derive(Debug, Default)]
pub struct Track {
    /// Field values.
    pub props: model::Track,
    /// Tracks combined into this one.
    pub tracks: Links<Track>,
    /// Hits used in the fit.
    pub hits: Links<TrackerHit>,
}

/// Calorimeter hit. Has no relations.
#[derive(Debug, Default)]
pub struct CalorimeterHit {
    /// Field values. `id` is ignored.
    pub props: model::CalorimeterHit,
}

/// Calorimeter cluster.
#[derive(Debug, Default)]
pub struct Cluster {
    /// Field values. Relation fields and `id` are ignored.
    pub props: model::Cluster,
    /// Sub-clusters.
    pub clusters: Links<Cluster>,
    /// Member hits.
    pub hits: Links<CalorimeterHit>,
}

impl SourceRecord for McParticle {
    type Entry = model::McParticle;
    const KIND: CollectionKind = CollectionKind::McParticle;

    fn from_props(props: Self::Entry) -> Self {
        Self {
            props,
            ..Self::default()
        }
    }

    fn select(records: &SourceRecords) -> Option<&[Rc<Self>]> {
        match records {
            SourceRecords::McParticles(rs) => Some(rs.as_slice()),
            _ => None,
        }
    }

    fn to_entry<R: Resolve>(&self, id: u32, resolver: &R) -> Self::Entry {
        model::McParticle {
            id,
            parents: self.parents.resolve(resolver),
            children: self.children.resolve(resolver),
            ..self.props.clone()
        }
    }
}

impl SourceRecord for SimTrackerHit {
    type Entry = model::SimTrackerHit;
    const KIND: CollectionKind = CollectionKind::SimTrackerHit;

    fn from_props(props: Self::Entry) -> Self {
        Self {
            props,
            ..Self::default()
        }
    }

    fn select(records: &SourceRecords) -> Option<&[Rc<Self>]> {
        match records {
            SourceRecords::SimTrackerHits(rs) => Some(rs.as_slice()),
            _ => None,
        }
    }

    fn to_entry<R: Resolve>(&self, id: u32, resolver: &R) -> Self::Entry {
        model::SimTrackerHit {
            id,
            mc: self.mc.resolve(resolver),
            ..self.props.clone()
        }
    }
}

impl SourceRecord for TrackerHit {
    type Entry = model::TrackerHit;
    const KIND: CollectionKind = CollectionKind::TrackerHit;

    fn from_props(props: Self::Entry) -> Self {
        Self {
            props,
            ..Self::default()
        }
    }

    fn select(records: &SourceRecords) -> Option<&[Rc<Self>]> {
        match records {
            SourceRecords::TrackerHits(rs) => Some(rs.as_slice()),
            _ => None,
        }
    }

    fn to_entry<R: Resolve>(&self, id: u32, resolver: &R) -> Self::Entry {
        model::TrackerHit {
            id,
            raw_hits: self.raw_hits.resolve(resolver),
            ..self.props.clone()
        }
    }
}

impl SourceRecord for Track {
    type Entry = model::Track;
    const KIND: CollectionKind = CollectionKind::Track;

    fn from_props(props: Self::Entry) -> Self {
        Self {
            props,
            ..Self::default()
        }
    }

    fn select(records: &SourceRecords) -> Option<&[Rc<Self>]> {
        match records {
            SourceRecords::Tracks(rs) => Some(rs.as_slice()),
            _ => None,
        }
    }

    fn to_entry<R: Resolve>(&self, id: u32, resolver: &R) -> Self::Entry {
        model::Track {
            id,
            tracks: self.tracks.resolve(resolver),
            hits: self.hits.resolve(resolver),
            ..self.props.clone()
        }
    }
}

impl SourceRecord for CalorimeterHit {
    type Entry = model::CalorimeterHit;
    const KIND: CollectionKind = CollectionKind::CalorimeterHit;

    fn from_props(props: Self::Entry) -> Self {
        Self { props }
    }

    fn select(records: &SourceRecords) -> Option<&[Rc<Self>]> {
        match records {
            SourceRecords::CalorimeterHits(rs) => Some(rs.as_slice()),
            _ => None,
        }
    }

    fn to_entry<R: Resolve>(&self, id: u32, _resolver: &R) -> Self::Entry {
        model::CalorimeterHit {
            id,
            ..self.props.clone()
        }
    }
}

impl SourceRecord for Cluster {
    type Entry = model::Cluster;
    const KIND: CollectionKind = CollectionKind::Cluster;

    fn from_props(props: Self::Entry) -> Self {
        Self {
            props,
            ..Self::default()
        }
    }

    fn select(records: &SourceRecords) -> Option<&[Rc<Self>]> {
        match records {
            SourceRecords::Clusters(rs) => Some(rs.as_slice()),
            _ => None,
        }
    }

    fn to_entry<R: Resolve>(&self, id: u32, resolver: &R) -> Self::Entry {
        model::Cluster {
            id,
            clusters: self.clusters.resolve(resolver),
            hits: self.hits.resolve(resolver),
            ..self.props.clone()
        }
    }
}

/// The records of one source collection, one variant per kind.
#[derive(Debug)]
pub enum SourceRecords {
    /// Truth particles.
    McParticles(Vec<Rc<McParticle>>),
    /// Simulated tracker hits.
    SimTrackerHits(Vec<Rc<SimTrackerHit>>),
    /// Reconstructed tracker hits.
    TrackerHits(Vec<Rc<TrackerHit>>),
    /// Tracks.
    Tracks(Vec<Rc<Track>>),
    /// Calorimeter hits.
    CalorimeterHits(Vec<Rc<CalorimeterHit>>),
    /// Clusters.
    Clusters(Vec<Rc<Cluster>>),
}

macro_rules! each_variant {
    ($records:expr, $rs:ident => $body:expr) => {
        match $records {
            SourceRecords::McParticles($rs) => $body,
            SourceRecords::SimTrackerHits($rs) => $body,
            SourceRecords::TrackerHits($rs) => $body,
            SourceRecords::Tracks($rs) => $body,
            SourceRecords::CalorimeterHits($rs) => $body,
            SourceRecords::Clusters($rs) => $body,
        }
    };
}

impl SourceRecords {
    /// Kind tag the converted collection will carry.
    pub fn kind(&self) -> CollectionKind {
        match self {
            Self::McParticles(_) => McParticle::KIND,
            Self::SimTrackerHits(_) => SimTrackerHit::KIND,
            Self::TrackerHits(_) => TrackerHit::KIND,
            Self::Tracks(_) => Track::KIND,
            Self::CalorimeterHits(_) => CalorimeterHit::KIND,
            Self::Clusters(_) => Cluster::KIND,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        each_variant!(self, rs => rs.len())
    }

    /// Returns true when there are no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Identities of the records in insertion order.
    pub fn ids(&self) -> Vec<RecordId> {
        each_variant!(self, rs => rs.iter().map(RecordId::of).collect())
    }

    /// Zero-based position of the first record with identity `id`.
    pub fn position_of(&self, id: RecordId) -> Option<usize> {
        each_variant!(self, rs => rs.iter().position(|r| RecordId::of(r) == id))
    }
}

macro_rules! records_from {
    ($record:ident, $variant:ident) => {
        impl From<Vec<Rc<$record>>> for SourceRecords {
            fn from(records: Vec<Rc<$record>>) -> Self {
                Self::$variant(records)
            }
        }
    };
}

records_from!(McParticle, McParticles);
records_from!(SimTrackerHit, SimTrackerHits);
records_from!(TrackerHit, TrackerHits);
records_from!(Track, Tracks);
records_from!(CalorimeterHit, CalorimeterHits);
records_from!(Cluster, Clusters);

/// A named collection of source records.
#[derive(Debug)]
pub struct SourceCollection {
    /// Collection name.
    pub name: String,
    /// Collection flag bits, copied through.
    pub flags: u32,
    /// Collection parameters, copied through.
    pub params: Params,
    /// The records.
    pub records: SourceRecords,
}

impl SourceCollection {
    /// A collection with no flags or parameters.
    pub fn new(name: impl Into<String>, records: impl Into<SourceRecords>) -> Self {
        Self {
            name: name.into(),
            flags: 0,
            params: Params::default(),
            records: records.into(),
        }
    }
}

/// One event of the identity graph.
#[derive(Debug, Default)]
pub struct SourceEvent {
    /// Run number.
    pub run_number: u64,
    /// Event number.
    pub event_number: u64,
    /// Collections in traversal order. Conversion preserves this order.
    pub collections: Vec<SourceCollection>,
}

impl SourceEvent {
    /// An event with no collections.
    pub fn new(run_number: u64, event_number: u64) -> Self {
        Self {
            run_number,
            event_number,
            collections: Vec::new(),
        }
    }

    /// Appends a collection.
    pub fn push(&mut self, collection: SourceCollection) {
        self.collections.push(collection);
    }

    /// Collections named `name`, in event order.
    pub fn collections_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a SourceCollection> + 'a {
        self.collections.iter().filter(move |c| c.name == name)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_per_allocation() {
        let a = Rc::new(CalorimeterHit::default());
        let b = Rc::new(CalorimeterHit::default());
        assert_eq!(RecordId::of(&a), RecordId::of(&Rc::clone(&a)));
        assert_ne!(RecordId::of(&a), RecordId::of(&b));
    }

    #[test]
    fn dropped_targets_read_as_absent() {
        let link = Link::new();
        let links = Links::new();
        {
            let gone = Rc::new(McParticle::default());
            link.set(&gone);
            links.push(&gone);
            assert!(link.id().is_some());
            assert_eq!(links.ids().len(), 1);
        }
        assert_eq!(link.id(), None);
        assert!(links.ids().is_empty());
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn parent_child_cycles_do_not_leak() {
        let parent = Rc::new(McParticle::default());
        let child = Rc::new(McParticle::default());
        parent.children.push(&child);
        child.parents.push(&parent);
        assert_eq!(Rc::strong_count(&parent), 1);
        assert_eq!(Rc::strong_count(&child), 1);
    }

    #[test]
    fn records_report_positions() {
        let hits: Vec<_> = (0..3).map(|_| Rc::new(CalorimeterHit::default())).collect();
        let probe = RecordId::of(&hits[2]);
        let records = SourceRecords::from(hits);
        assert_eq!(records.kind(), CollectionKind::CalorimeterHit);
        assert_eq!(records.len(), 3);
        assert_eq!(records.position_of(probe), Some(2));
        assert_eq!(records.ids()[2], probe);
        assert!(CalorimeterHit::select(&records).is_some());
        assert!(Track::select(&records).is_none());
    }
}
