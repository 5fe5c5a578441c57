// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used)]
//! Dump to identity graph to container to stream and back.

use std::io::Cursor;

use hepio_event::{EventReader, EventWriter};
use hepio_graph::{convert_event, parse_event, EventConverter, Strategy};
use hepio_model::{
    ClusterCollection, McParticleCollection, Reference, SimTrackerHitCollection, TrackCollection,
    TrackerHitCollection,
};

const DUMP: &str = r#"{
  "run_number": 12, "event_number": 345,
  "collections": [
    { "name": "Tracks", "kind": "Track",
      "records": [ { "chi2": 3.5, "ndf": 5, "hits": [{"collection": "TrackerHits", "index": 1},
                                                      {"collection": "TrackerHits", "index": 0}] },
                   { "tracks": [{"collection": "Tracks", "index": 0}] } ] },
    { "name": "TrackerHits", "kind": "TrackerHit",
      "records": [ { "raw_hits": [{"collection": "SimHits", "index": 0}] },
                   { "raw_hits": [{"collection": "SimHits", "index": 1},
                                  {"collection": "SimHits", "index": 7}] } ] },
    { "name": "SimHits", "kind": "SimTrackerHit",
      "records": [ { "mc": {"collection": "MCParticle", "index": 1} },
                   { "mc": {"collection": "MCParticle", "index": 0} } ] },
    { "name": "MCParticle", "kind": "MCParticle",
      "records": [ { "pdg": 13, "children": [{"collection": "MCParticle", "index": 1}] },
                   { "pdg": 11, "parents": [{"collection": "MCParticle", "index": 0}] } ] },
    { "name": "Clusters", "kind": "Cluster",
      "records": [ { "energy": 2.5, "clusters": [] } ] }
  ] }"#;

#[test]
fn every_relation_survives_the_trip() {
    let source = parse_event(DUMP).unwrap();
    let event = convert_event(&source).unwrap();
    assert_eq!(
        event.names().collect::<Vec<_>>(),
        ["Tracks", "TrackerHits", "SimHits", "MCParticle", "Clusters"]
    );

    let mut writer = EventWriter::gzip(Vec::new());
    writer.push(&event).unwrap();
    let bytes = writer.finish().unwrap();
    let back = EventReader::gzip(Cursor::new(bytes)).next().unwrap().unwrap();
    assert_eq!(back, event);
    assert_eq!((back.run_number(), back.event_number()), (12, 345));

    let tracks = back.get_collection_as::<TrackCollection>("Tracks").unwrap().unwrap();
    assert_eq!(tracks.id, 1);
    assert_eq!(tracks.entries[0].hits, [Reference::new(2, 2), Reference::new(2, 1)]);
    assert_eq!(tracks.entries[1].tracks, [Reference::new(1, 1)]);

    let hits = back.get_collection_as::<TrackerHitCollection>("TrackerHits").unwrap().unwrap();
    assert_eq!(hits.entries[0].raw_hits, [Reference::new(3, 1)]);
    // Index 7 does not exist and is dropped.
    assert_eq!(hits.entries[1].raw_hits, [Reference::new(3, 2)]);

    let sim = back.get_collection_as::<SimTrackerHitCollection>("SimHits").unwrap().unwrap();
    assert_eq!(sim.entries[0].mc, Some(Reference::new(4, 2)));
    assert_eq!(sim.entries[1].mc, Some(Reference::new(4, 1)));

    let mc = back.get_collection_as::<McParticleCollection>("MCParticle").unwrap().unwrap();
    assert_eq!(mc.entries[0].pdg, 13);
    assert_eq!(mc.entries[0].children, [Reference::new(4, 2)]);
    assert_eq!(mc.entries[1].parents, [Reference::new(4, 1)]);

    let clusters = back.get_collection_as::<ClusterCollection>("Clusters").unwrap().unwrap();
    assert_eq!(clusters.id, 5);
    assert!(clusters.entries[0].clusters.is_empty());
    assert!(clusters.entries[0].hits.is_empty());
}

#[test]
fn both_strategies_write_identical_bytes() {
    let source = parse_event(DUMP).unwrap();
    let indexed = EventConverter::with_strategy(Strategy::Index).convert(&source).unwrap();
    let scanned = EventConverter::with_strategy(Strategy::LinearScan).convert(&source).unwrap();
    assert_eq!(indexed.to_bytes().unwrap(), scanned.to_bytes().unwrap());
}
