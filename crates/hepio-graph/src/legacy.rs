// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Legacy JSON event dumps.
//!
//! A dump is a stream of JSON documents, one per event:
//!
//! ```json
//! { "run_number": 1, "event_number": 7,
//!   "collections": [
//!     { "name": "MCParticle", "kind": "MCParticle", "flags": 0, "params": {},
//!       "records": [ { "pdg": 11, "children": [{"collection": "MCParticle", "index": 1}] },
//!                    { "pdg": 22, "parents":  [{"collection": "MCParticle", "index": 0}] } ] } ] }
//! ```
//!
//! Links name the target collection and a 0-based record index. The loader
//! turns them into `Weak` identity links. Links that name a missing
//! collection, a collection of the wrong kind, or an index past the end are
//! kept as dead links and logged; they convert to nothing. Record fields that
//! are absent take their default value. Collections of unknown kinds are
//! skipped with a warning.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::rc::{Rc, Weak};

use hepio_model::{CollectionKind, Params};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::de::IoRead;
use serde_json::{Map, StreamDeserializer, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::source::{
    self, Link, Links, SourceCollection, SourceEvent, SourceRecord, SourceRecords,
};

/// Errors raised while loading a dump.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Reading the input failed.
    #[error("failed to read dump: {0}")]
    Io(#[from] io::Error),
    /// The input is not a valid event document.
    #[error("malformed dump document: {0}")]
    Json(#[from] serde_json::Error),
    /// One record has fields or links of the wrong shape.
    #[error("record {index} of collection {collection:?} is malformed")]
    Record {
        /// Collection name.
        collection: String,
        /// 0-based record index.
        index: usize,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
}

type Fields = Map<String, Value>;

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    run_number: u64,
    #[serde(default)]
    event_number: u64,
    #[serde(default)]
    collections: Vec<RawCollection>,
}

#[derive(Deserialize)]
struct RawCollection {
    name: String,
    kind: String,
    #[serde(default)]
    flags: u32,
    #[serde(default)]
    params: Params,
    #[serde(default)]
    records: Vec<Fields>,
}

#[derive(Deserialize)]
struct RawLink {
    collection: String,
    index: usize,
}

/// Streaming reader over a dump.
pub struct DumpReader<R: Read> {
    docs: StreamDeserializer<'static, IoRead<R>, RawEvent>,
    read: u64,
}

impl<R: Read> DumpReader<R> {
    /// Reads documents from `reader` until it ends.
    pub fn new(reader: R) -> Self {
        Self {
            docs: serde_json::Deserializer::from_reader(reader).into_iter(),
            read: 0,
        }
    }

    /// Number of documents read so far.
    pub fn events_read(&self) -> u64 {
        self.read
    }
}

impl DumpReader<BufReader<File>> {
    /// Opens the dump at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> Iterator for DumpReader<R> {
    type Item = Result<SourceEvent, LoadError>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = match self.docs.next()? {
            Ok(raw) => raw,
            Err(err) => return Some(Err(err.into())),
        };
        self.read += 1;
        Some(build_event(raw))
    }
}

/// Parses a single event document.
pub fn parse_event(json: &str) -> Result<SourceEvent, LoadError> {
    build_event(serde_json::from_str(json)?)
}

fn build_event(raw: RawEvent) -> Result<SourceEvent, LoadError> {
    let mut event = SourceEvent::new(raw.run_number, raw.event_number);
    let mut pending = Vec::with_capacity(raw.collections.len());
    for coll in raw.collections {
        let Some(kind) = CollectionKind::REGISTERED
            .into_iter()
            .find(|k| k.name() == coll.kind)
        else {
            warn!(collection = %coll.name, kind = %coll.kind, "skipping collection of unsupported kind");
            continue;
        };
        let name = coll.name;
        let (records, links) = match kind {
            CollectionKind::McParticle => {
                split::<source::McParticle>(&name, coll.records, &["parents", "children"])?
            }
            CollectionKind::SimTrackerHit => {
                split::<source::SimTrackerHit>(&name, coll.records, &["mc"])?
            }
            CollectionKind::TrackerHit => {
                split::<source::TrackerHit>(&name, coll.records, &["raw_hits"])?
            }
            CollectionKind::Track => split::<source::Track>(&name, coll.records, &["tracks", "hits"])?,
            CollectionKind::CalorimeterHit => {
                split::<source::CalorimeterHit>(&name, coll.records, &[])?
            }
            CollectionKind::Cluster => {
                split::<source::Cluster>(&name, coll.records, &["clusters", "hits"])?
            }
            CollectionKind::None => continue,
        };
        event.push(SourceCollection {
            name,
            flags: coll.flags,
            params: coll.params,
            records,
        });
        pending.push(links);
    }

    for (coll, links) in event.collections.iter().zip(&pending) {
        let w = Wiring {
            event: &event,
            collection: &coll.name,
        };
        match &coll.records {
            SourceRecords::McParticles(rs) => {
                for (index, (r, l)) in rs.iter().zip(links).enumerate() {
                    w.many(&r.parents, l.get("parents"), index)?;
                    w.many(&r.children, l.get("children"), index)?;
                }
            }
            SourceRecords::SimTrackerHits(rs) => {
                for (index, (r, l)) in rs.iter().zip(links).enumerate() {
                    w.one(&r.mc, l.get("mc"), index)?;
                }
            }
            SourceRecords::TrackerHits(rs) => {
                for (index, (r, l)) in rs.iter().zip(links).enumerate() {
                    w.many(&r.raw_hits, l.get("raw_hits"), index)?;
                }
            }
            SourceRecords::Tracks(rs) => {
                for (index, (r, l)) in rs.iter().zip(links).enumerate() {
                    w.many(&r.tracks, l.get("tracks"), index)?;
                    w.many(&r.hits, l.get("hits"), index)?;
                }
            }
            SourceRecords::CalorimeterHits(_) => {}
            SourceRecords::Clusters(rs) => {
                for (index, (r, l)) in rs.iter().zip(links).enumerate() {
                    w.many(&r.clusters, l.get("clusters"), index)?;
                    w.many(&r.hits, l.get("hits"), index)?;
                }
            }
        }
    }
    debug!(
        run = event.run_number,
        event = event.event_number,
        collections = event.collections.len(),
        "loaded dump event"
    );
    Ok(event)
}

/// Builds the records of one collection and sets their link fields aside.
fn split<T>(
    collection: &str,
    raws: Vec<Fields>,
    link_keys: &[&str],
) -> Result<(SourceRecords, Vec<Fields>), LoadError>
where
    T: SourceRecord,
    T::Entry: Default + Serialize + DeserializeOwned,
    Vec<Rc<T>>: Into<SourceRecords>,
{
    let mut records = Vec::with_capacity(raws.len());
    let mut links = Vec::with_capacity(raws.len());
    for (index, mut raw) in raws.into_iter().enumerate() {
        let mut wired = Fields::new();
        for &key in link_keys {
            if let Some(value) = raw.remove(key) {
                wired.insert(key.to_owned(), value);
            }
        }
        let props = overlay::<T::Entry>(raw).map_err(|source| LoadError::Record {
            collection: collection.to_owned(),
            index,
            source,
        })?;
        records.push(Rc::new(T::from_props(props)));
        links.push(wired);
    }
    Ok((records.into(), links))
}

/// Deserializes `fields` on top of the type's default values.
fn overlay<E>(fields: Fields) -> Result<E, serde_json::Error>
where
    E: Default + Serialize + DeserializeOwned,
{
    let mut base = serde_json::to_value(E::default())?;
    if let Value::Object(map) = &mut base {
        map.extend(fields);
    }
    serde_json::from_value(base)
}

struct Wiring<'a> {
    event: &'a SourceEvent,
    collection: &'a str,
}

impl Wiring<'_> {
    fn one<T: SourceRecord>(
        &self,
        link: &Link<T>,
        value: Option<&Value>,
        index: usize,
    ) -> Result<(), LoadError> {
        let Some(value) = value else {
            return Ok(());
        };
        if let Some(raw) = Option::<RawLink>::deserialize(value).map_err(|e| self.bad(index, e))? {
            link.set_weak(self.target(&raw, index));
        }
        Ok(())
    }

    fn many<T: SourceRecord>(
        &self,
        links: &Links<T>,
        value: Option<&Value>,
        index: usize,
    ) -> Result<(), LoadError> {
        let Some(value) = value else {
            return Ok(());
        };
        for raw in Vec::<RawLink>::deserialize(value).map_err(|e| self.bad(index, e))? {
            links.push_weak(self.target(&raw, index));
        }
        Ok(())
    }

    /// The first collection with the link's name and the relation's kind
    /// supplies the target; same-named collections of other kinds are passed
    /// over.
    fn target<T: SourceRecord>(&self, raw: &RawLink, index: usize) -> Weak<T> {
        let found = self
            .event
            .collections_named(&raw.collection)
            .find_map(|c| T::select(&c.records))
            .and_then(|rs| rs.get(raw.index));
        match found {
            Some(rc) => Rc::downgrade(rc),
            None => {
                let expected = T::KIND;
                warn!(
                    from = self.collection,
                    record = index,
                    to = %raw.collection,
                    to_index = raw.index,
                    %expected,
                    "dangling link in dump"
                );
                Weak::new()
            }
        }
    }

    fn bad(&self, index: usize, source: serde_json::Error) -> LoadError {
        LoadError::Record {
            collection: self.collection.to_owned(),
            index,
            source,
        }
    }
}
