// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Serializable `(collection, entry)` addresses.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Address of one entry inside one event.
///
/// Both ids are 1-based. `collection_id` is the position of the collection in
/// the event manifest (1 = first appended), not its name. A `collection_id` of
/// zero is the null reference.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default, Serialize, Deserialize)]
pub struct Reference {
    /// 1-based manifest position of the collection.
    pub collection_id: u32,
    /// 1-based position of the entry inside that collection.
    pub entry_id: u32,
}

impl Reference {
    /// The null reference.
    pub const NULL: Self = Self {
        collection_id: 0,
        entry_id: 0,
    };

    /// Builds a reference from 1-based ids.
    pub const fn new(collection_id: u32, entry_id: u32) -> Self {
        Self {
            collection_id,
            entry_id,
        }
    }

    /// Returns true for the null reference.
    pub const fn is_null(&self) -> bool {
        self.collection_id == 0
    }

    /// Returns `None` for the null reference, `Some(self)` otherwise.
    pub const fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }

    /// Zero-based collection index, or `None` for the null reference.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn collection_index(&self) -> Option<usize> {
        if self.is_null() {
            None
        } else {
            Some((self.collection_id - 1) as usize)
        }
    }

    /// Zero-based entry index, or `None` if the reference is null or the
    /// entry id is zero.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn entry_index(&self) -> Option<usize> {
        if self.is_null() || self.entry_id == 0 {
            None
        } else {
            Some((self.entry_id - 1) as usize)
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("null")
        } else {
            write!(f, "{}:{}", self.collection_id, self.entry_id)
        }
    }
}
