// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used)]
//! The identity index answers exactly like the linear scan.

use std::rc::Rc;

use hepio_graph::source::{CalorimeterHit, McParticle};
use hepio_graph::{IdentityIndex, LinearScan, RecordId, Resolve, SourceCollection, SourceRecords};
use proptest::prelude::*;

fn build(sizes: &[(bool, usize)], shared: &Rc<McParticle>, share_in: &[usize]) -> Vec<SourceCollection> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, &(particles, n))| {
            let records = if particles {
                let mut rs: Vec<_> = (0..n).map(|_| Rc::new(McParticle::default())).collect();
                if share_in.contains(&i) {
                    rs.push(Rc::clone(shared));
                }
                SourceRecords::McParticles(rs)
            } else {
                SourceRecords::CalorimeterHits(
                    (0..n).map(|_| Rc::new(CalorimeterHit::default())).collect(),
                )
            };
            SourceCollection::new(format!("c{i}"), records)
        })
        .collect()
}

proptest! {
    #[test]
    fn index_and_scan_agree(
        sizes in prop::collection::vec((any::<bool>(), 0usize..8), 0..6),
        share_in in prop::collection::vec(0usize..6, 0..3),
    ) {
        let shared = Rc::new(McParticle::default());
        let outsider = Rc::new(McParticle::default());
        let colls = build(&sizes, &shared, &share_in);

        let scan = LinearScan::new(&colls);
        let index = IdentityIndex::build(&colls).unwrap();

        let mut probes: Vec<RecordId> = colls.iter().flat_map(|c| c.records.ids()).collect();
        probes.push(RecordId::of(&shared));
        probes.push(RecordId::of(&outsider));

        for &probe in &probes {
            prop_assert_eq!(scan.resolve(probe), index.resolve(probe));
        }
        prop_assert_eq!(scan.resolve_all(probes.clone()), index.resolve_all(probes));
        prop_assert_eq!(index.resolve(RecordId::of(&outsider)), None);
    }
}
