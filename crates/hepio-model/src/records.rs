// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Serialized record kinds.
//!
//! Every entry carries its 1-based local `id` (its position in the
//! collection). Links to other records are [`Reference`]s: single relations
//! are `Option<Reference>`, repeated relations are plain `Vec<Reference>`
//! that never contain nulls. An entry with no valid targets for a repeated
//! relation holds an empty list; there is no "absent list" state.

use serde::{Deserialize, Serialize};

use crate::message::{from_cbor, to_cbor};
use crate::registry::{AnyCollection, Collection, CollectionKind};
use crate::{DecodeError, EncodeError, Message, Params, Reference};

/// Monte-Carlo truth particle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct McParticle {
    /// 1-based local entry id.
    pub id: u32,
    /// Parent particles.
    #[serde(default)]
    pub parents: Vec<Reference>,
    /// Daughter particles.
    #[serde(default)]
    pub children: Vec<Reference>,
    /// PDG particle code.
    pub pdg: i32,
    /// Generator status.
    pub gen_status: i32,
    /// Simulation status bits.
    pub sim_status: i32,
    /// Production vertex (mm).
    pub vertex: [f64; 3],
    /// Creation time (ns).
    pub time: f32,
    /// Momentum at production (GeV).
    pub p: [f64; 3],
    /// Mass (GeV).
    pub mass: f64,
    /// Charge (e).
    pub charge: f32,
    /// Momentum at the end point (GeV).
    pub p_end_point: [f64; 3],
    /// Spin vector.
    pub spin: [f32; 3],
    /// Color flow indices.
    pub color_flow: [i32; 2],
}

/// Simulated energy deposit in a tracking detector.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimTrackerHit {
    /// 1-based local entry id.
    pub id: u32,
    /// Lower cell id word.
    pub cell_id0: i32,
    /// Upper cell id word.
    pub cell_id1: i32,
    /// Hit position (mm).
    pub pos: [f64; 3],
    /// Deposited energy (GeV).
    pub e_dep: f32,
    /// Hit time (ns).
    pub time: f32,
    /// Truth particle that caused the hit.
    pub mc: Option<Reference>,
    /// Particle momentum at the hit (GeV).
    pub p: [f32; 3],
    /// Path length inside the sensitive volume (mm).
    pub path_length: f32,
    /// Quality bits.
    pub quality: i32,
}

/// Reconstructed tracker hit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerHit {
    /// 1-based local entry id.
    pub id: u32,
    /// Lower cell id word.
    pub cell_id0: i32,
    /// Upper cell id word.
    pub cell_id1: i32,
    /// Hit position (mm).
    pub pos: [f64; 3],
    /// Packed lower-triangle covariance of the position.
    pub cov: [f64; 6],
    /// Hit type code.
    pub hit_type: i32,
    /// Deposited energy (GeV).
    pub e_dep: f32,
    /// Uncertainty of `e_dep`.
    pub e_dep_err: f32,
    /// Hit time (ns).
    pub time: f32,
    /// Quality bits.
    pub quality: i32,
    /// Raw/simulated hits this hit was built from.
    #[serde(default)]
    pub raw_hits: Vec<Reference>,
}

/// Reconstructed track.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// 1-based local entry id.
    pub id: u32,
    /// Track type code.
    pub track_type: i32,
    /// Fit chi-square.
    pub chi2: f32,
    /// Degrees of freedom of the fit.
    pub ndf: i32,
    /// Specific energy loss.
    pub dedx: f32,
    /// Uncertainty of `dedx`.
    pub dedx_err: f32,
    /// Radius of the innermost hit (mm).
    pub radius: f32,
    /// Hit counts per sub-detector.
    #[serde(default)]
    pub subdet_hits: Vec<i32>,
    /// Tracks combined into this one.
    #[serde(default)]
    pub tracks: Vec<Reference>,
    /// Tracker hits used in the fit.
    #[serde(default)]
    pub hits: Vec<Reference>,
}

/// Calibrated calorimeter hit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalorimeterHit {
    /// 1-based local entry id.
    pub id: u32,
    /// Lower cell id word.
    pub cell_id0: i32,
    /// Upper cell id word.
    pub cell_id1: i32,
    /// Energy (GeV).
    pub energy: f32,
    /// Uncertainty of `energy`.
    pub energy_err: f32,
    /// Hit time (ns).
    pub time: f32,
    /// Cell position (mm).
    pub pos: [f32; 3],
    /// Hit type code.
    pub hit_type: i32,
}

/// Calorimeter cluster.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    /// 1-based local entry id.
    pub id: u32,
    /// Cluster type code.
    pub cluster_type: i32,
    /// Energy (GeV).
    pub energy: f32,
    /// Uncertainty of `energy`.
    pub energy_err: f32,
    /// Energy-weighted position (mm).
    pub pos: [f32; 3],
    /// Polar angle of the cluster axis.
    pub theta: f32,
    /// Azimuth of the cluster axis.
    pub phi: f32,
    /// Shape parameters.
    #[serde(default)]
    pub shape: Vec<f32>,
    /// Sub-clusters merged into this one.
    #[serde(default)]
    pub clusters: Vec<Reference>,
    /// Calorimeter hits in the cluster.
    #[serde(default)]
    pub hits: Vec<Reference>,
    /// Per-hit energy weights, parallel to `hits`.
    #[serde(default)]
    pub weights: Vec<f32>,
}

macro_rules! collection_type {
    ($(#[$doc:meta])* $name:ident, $entry:ident, $kind:ident, $variant:ident) => {
        $(#[$doc])*
        #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            /// 1-based position of this collection in its event.
            pub id: u32,
            /// Collection flag bits.
            pub flags: u32,
            /// Collection-level parameters.
            #[serde(default)]
            pub params: Params,
            /// Entries in insertion order.
            #[serde(default)]
            pub entries: Vec<$entry>,
        }

        impl Message for $name {
            fn marshal(&self) -> Result<Vec<u8>, EncodeError> {
                to_cbor(self)
            }

            fn unmarshal(bytes: &[u8]) -> Result<Self, DecodeError> {
                from_cbor(bytes, stringify!($name))
            }
        }

        impl Collection for $name {
            const KIND: CollectionKind = CollectionKind::$kind;

            fn len(&self) -> usize {
                self.entries.len()
            }
        }

        impl From<$name> for AnyCollection {
            fn from(collection: $name) -> Self {
                Self::$variant(collection)
            }
        }
    };
}

collection_type!(
    /// Collection of [`McParticle`]s.
    McParticleCollection, McParticle, McParticle, McParticles
);
collection_type!(
    /// Collection of [`SimTrackerHit`]s.
    SimTrackerHitCollection, SimTrackerHit, SimTrackerHit, SimTrackerHits
);
collection_type!(
    /// Collection of [`TrackerHit`]s.
    TrackerHitCollection, TrackerHit, TrackerHit, TrackerHits
);
collection_type!(
    /// Collection of [`Track`]s.
    TrackCollection, Track, Track, Tracks
);
collection_type!(
    /// Collection of [`CalorimeterHit`]s.
    CalorimeterHitCollection, CalorimeterHit, CalorimeterHit, CalorimeterHits
);
collection_type!(
    /// Collection of [`Cluster`]s.
    ClusterCollection, Cluster, Cluster, Clusters
);
