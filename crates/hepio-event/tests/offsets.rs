// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs, clippy::unwrap_used)]
//! Byte ranges are derived from the sizes of earlier collections.

use hepio_event::Event;
use hepio_model::{Collection, CollectionKind, DecodeError, EncodeError, Message};
use proptest::prelude::*;

/// Marshals to exactly the bytes it holds.
struct Raw(Vec<u8>);

impl Message for Raw {
    fn marshal(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(self.0.clone())
    }

    fn unmarshal(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(Self(bytes.to_vec()))
    }
}

impl Collection for Raw {
    const KIND: CollectionKind = CollectionKind::CalorimeterHit;

    fn len(&self) -> usize {
        self.0.len()
    }
}

proptest! {
    #[test]
    fn kth_range_starts_at_prefix_sum(
        blobs in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..12)
    ) {
        let mut event = Event::new(0, 0);
        for (k, blob) in blobs.iter().enumerate() {
            let id = event.add_collection(&Raw(blob.clone()), format!("c{k}")).unwrap();
            prop_assert_eq!(id as usize, k + 1);
        }

        let mut start = 0;
        for (k, blob) in blobs.iter().enumerate() {
            let range = event.collection_range(&format!("c{k}")).unwrap();
            prop_assert_eq!(range.clone(), start..start + blob.len());
            prop_assert_eq!(&event.payload()[range], &blob[..]);
            prop_assert_eq!(event.header_at(k).unwrap().payload_size as usize, blob.len());
            start += blob.len();
        }
        prop_assert_eq!(event.payload().len(), start);
        prop_assert_eq!(event.header().payload_len(), start as u64);
    }

    #[test]
    fn byte_form_preserves_every_range(
        sizes in prop::collection::vec(0usize..48, 1..8)
    ) {
        let mut event = Event::new(5, 6);
        for (k, &size) in sizes.iter().enumerate() {
            let blob: Vec<u8> = (0..size).map(|i| (i + k) as u8).collect();
            event.add_collection(&Raw(blob), format!("c{k}")).unwrap();
        }
        let back = Event::from_bytes(&event.to_bytes().unwrap()).unwrap();
        for k in 0..sizes.len() {
            let name = format!("c{k}");
            prop_assert_eq!(back.collection_range(&name), event.collection_range(&name));
        }
        prop_assert_eq!(back, event);
    }
}

#[test]
fn zero_length_collections_take_no_bytes() {
    let mut event = Event::default();
    event.add_collection(&Raw(vec![]), "empty").unwrap();
    event.add_collection(&Raw(vec![9, 9]), "two").unwrap();
    event.add_collection(&Raw(vec![]), "tail").unwrap();
    assert_eq!(event.collection_range("empty"), Some(0..0));
    assert_eq!(event.collection_range("two"), Some(0..2));
    assert_eq!(event.collection_range("tail"), Some(2..2));
    assert_eq!(event.collection_count(), 3);
}
