// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference resolution: record identity to `(collection, entry)` address.
//!
//! Both resolvers see the collections in the exact order they will be
//! appended to the container; addresses are 1-based positions in that
//! order. A record found in no collection resolves to `None`, which is a
//! legal dangling link rather than an error.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use hepio_model::Reference;
use tracing::debug;

use crate::converter::ConvertError;
use crate::source::{RecordId, SourceCollection};

/// Maps record identities to the addresses they will occupy.
pub trait Resolve {
    /// Address of `target`, or `None` if no collection contains it.
    fn resolve(&self, target: RecordId) -> Option<Reference>;

    /// Resolves each target in order, dropping the ones that do not resolve.
    fn resolve_all<I>(&self, targets: I) -> Vec<Reference>
    where
        I: IntoIterator<Item = RecordId>,
        Self: Sized,
    {
        targets
            .into_iter()
            .filter_map(|target| self.resolve(target))
            .collect()
    }
}

/// Address of the 0-based `(collection, entry)` pair, if both ids fit `u32`.
fn address(collection: usize, entry: usize) -> Option<Reference> {
    let collection_id = u32::try_from(collection.checked_add(1)?).ok()?;
    let entry_id = u32::try_from(entry.checked_add(1)?).ok()?;
    Some(Reference::new(collection_id, entry_id))
}

/// Scans every collection, entry by entry, on each call.
///
/// Stateless. Costs O(collections × entries) per lookup.
#[derive(Clone, Copy, Debug)]
pub struct LinearScan<'a> {
    collections: &'a [SourceCollection],
}

impl<'a> LinearScan<'a> {
    /// Resolver over `collections` in their final order.
    pub fn new(collections: &'a [SourceCollection]) -> Self {
        Self { collections }
    }
}

impl Resolve for LinearScan<'_> {
    fn resolve(&self, target: RecordId) -> Option<Reference> {
        self.collections
            .iter()
            .enumerate()
            .find_map(|(i, coll)| {
                coll.records
                    .position_of(target)
                    .map(|j| address(i, j))
            })
            .flatten()
    }
}

/// Identity-to-address map built once per event.
///
/// When a record appears in more than one collection, the first occurrence
/// in collection order wins, matching [`LinearScan`].
#[derive(Clone, Debug, Default)]
pub struct IdentityIndex {
    addresses: HashMap<RecordId, Reference>,
}

impl IdentityIndex {
    /// Indexes every record of `collections` in their final order.
    pub fn build(collections: &[SourceCollection]) -> Result<Self, ConvertError> {
        if u32::try_from(collections.len()).is_err() {
            return Err(ConvertError::TooManyCollections(collections.len()));
        }
        let capacity = collections.iter().map(|c| c.records.len()).sum();
        let mut addresses = HashMap::with_capacity(capacity);
        for (i, coll) in collections.iter().enumerate() {
            for (j, id) in coll.records.ids().into_iter().enumerate() {
                let Some(reference) = address(i, j) else {
                    return Err(ConvertError::TooManyEntries {
                        name: coll.name.clone(),
                        len: coll.records.len(),
                    });
                };
                if let Entry::Vacant(slot) = addresses.entry(id) {
                    slot.insert(reference);
                }
            }
        }
        debug!(records = addresses.len(), "built identity index");
        Ok(Self { addresses })
    }

    /// Number of distinct records indexed.
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Returns true when nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl Resolve for IdentityIndex {
    fn resolve(&self, target: RecordId) -> Option<Reference> {
        self.addresses.get(&target).copied()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::source::{CalorimeterHit, McParticle, SourceRecords};

    fn particles(n: usize) -> Vec<Rc<McParticle>> {
        (0..n).map(|_| Rc::new(McParticle::default())).collect()
    }

    fn hits(n: usize) -> Vec<Rc<CalorimeterHit>> {
        (0..n).map(|_| Rc::new(CalorimeterHit::default())).collect()
    }

    #[test]
    fn found_in_second_collection() {
        let a = particles(2);
        let b = hits(4);
        let target = RecordId::of(&b[2]);
        let colls = vec![
            SourceCollection::new("A", a),
            SourceCollection::new("B", b),
        ];
        let expected = Some(Reference::new(2, 3));
        assert_eq!(LinearScan::new(&colls).resolve(target), expected);
        assert_eq!(IdentityIndex::build(&colls).unwrap().resolve(target), expected);
    }

    #[test]
    fn record_outside_the_event_is_absent() {
        let colls = vec![SourceCollection::new("A", particles(3))];
        let stranger = Rc::new(McParticle::default());
        let id = RecordId::of(&stranger);
        assert_eq!(LinearScan::new(&colls).resolve(id), None);
        assert_eq!(IdentityIndex::build(&colls).unwrap().resolve(id), None);
    }

    #[test]
    fn equal_records_resolve_by_identity() {
        let a = particles(2);
        assert_eq!(a[0].props, a[1].props);
        let (first, second) = (RecordId::of(&a[0]), RecordId::of(&a[1]));
        let colls = vec![SourceCollection::new("A", a)];
        for resolver in [
            &LinearScan::new(&colls) as &dyn Resolve,
            &IdentityIndex::build(&colls).unwrap(),
        ] {
            assert_eq!(resolver.resolve(first), Some(Reference::new(1, 1)));
            assert_eq!(resolver.resolve(second), Some(Reference::new(1, 2)));
        }
    }

    #[test]
    fn resolve_all_drops_unresolved_and_keeps_order() {
        let a = hits(3);
        let stranger = Rc::new(CalorimeterHit::default());
        let targets = [
            RecordId::of(&a[2]),
            RecordId::of(&stranger),
            RecordId::of(&a[0]),
        ];
        let colls = vec![SourceCollection::new("A", a)];
        let expected = vec![Reference::new(1, 3), Reference::new(1, 1)];
        assert_eq!(LinearScan::new(&colls).resolve_all(targets), expected);
        assert_eq!(
            IdentityIndex::build(&colls).unwrap().resolve_all(targets),
            expected
        );
    }

    #[test]
    fn first_occurrence_wins() {
        let shared = particles(1);
        let id = RecordId::of(&shared[0]);
        let colls = vec![
            SourceCollection::new("first", SourceRecords::McParticles(particles(2))),
            SourceCollection::new("second", shared.clone()),
            SourceCollection::new("third", shared),
        ];
        let index = IdentityIndex::build(&colls).unwrap();
        assert_eq!(index.resolve(id), Some(Reference::new(2, 1)));
        assert_eq!(LinearScan::new(&colls).resolve(id), Some(Reference::new(2, 1)));
        assert_eq!(index.len(), 3);
    }
}
