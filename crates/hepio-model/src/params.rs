// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Named parameter bags attached to collections.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Free-form, collection-level parameters keyed by name.
///
/// Maps are ordered so that identical parameter sets encode to identical bytes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Integer arrays.
    #[serde(default)]
    pub ints: BTreeMap<String, Vec<i32>>,
    /// Float arrays.
    #[serde(default)]
    pub floats: BTreeMap<String, Vec<f32>>,
    /// String arrays.
    #[serde(default)]
    pub strings: BTreeMap<String, Vec<String>>,
}
