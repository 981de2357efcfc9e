//! Network snapshot identity for provenance.
//!
//! A `NetworkSnapshot` fingerprints the extracted network before any analysis
//! runs, so every written result can name the exact topology it came from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Network;
use crate::canonical::{canonical_hash_hex, quantize};
use crate::SCHEMA_VERSION;

/// A deterministic fingerprint of the network state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// xxh64 of all components below.
    pub snapshot_id: String,
    /// Number of nodes.
    pub node_count: u64,
    /// Number of edges.
    pub edge_count: u64,
    /// Number of attached barriers.
    pub barrier_count: u64,
    /// Schema version.
    pub schema_version: String,
    /// Hash of sorted edge ids.
    pub edge_id_hash: String,
    /// Hash of sorted quantized (from, to) coordinate pairs.
    pub edge_pair_hash: String,
    /// Hash of sorted barrier ids.
    pub barrier_id_hash: String,
    /// When the snapshot was computed.
    pub computed_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct SnapshotIdInput<'a> {
    node_count: u64,
    edge_count: u64,
    barrier_count: u64,
    schema_version: &'a str,
    edge_id_hash: &'a str,
    edge_pair_hash: &'a str,
    barrier_id_hash: &'a str,
}

type QuantizedPair = ((i64, i64), (i64, i64));

impl NetworkSnapshot {
    /// Compute the snapshot of a network.
    pub fn compute(network: &Network) -> Self {
        let mut edge_ids: Vec<String> = network.edges().iter().map(|e| e.id().to_string()).collect();
        edge_ids.sort();
        let edge_id_hash = canonical_hash_hex(&edge_ids);

        let mut pairs: Vec<QuantizedPair> = network
            .edges()
            .iter()
            .map(|e| {
                let from = network.node(e.from()).coord();
                let to = network.node(e.to()).coord();
                (
                    (quantize(from.x), quantize(from.y)),
                    (quantize(to.x), quantize(to.y)),
                )
            })
            .collect();
        pairs.sort_unstable();
        let edge_pair_hash = canonical_hash_hex(&pairs);

        // Barriers iterate in id order already.
        let barrier_ids: Vec<String> = network.barriers().map(|b| b.id.to_string()).collect();
        let barrier_id_hash = canonical_hash_hex(&barrier_ids);

        let node_count = network.node_count() as u64;
        let edge_count = network.edge_count() as u64;
        let barrier_count = barrier_ids.len() as u64;

        let snapshot_id = canonical_hash_hex(&SnapshotIdInput {
            node_count,
            edge_count,
            barrier_count,
            schema_version: SCHEMA_VERSION,
            edge_id_hash: &edge_id_hash,
            edge_pair_hash: &edge_pair_hash,
            barrier_id_hash: &barrier_id_hash,
        });

        Self {
            snapshot_id,
            node_count,
            edge_count,
            barrier_count,
            schema_version: SCHEMA_VERSION.to_string(),
            edge_id_hash,
            edge_pair_hash,
            barrier_id_hash,
            computed_at: Utc::now(),
        }
    }

    /// Verify that this snapshot matches a network.
    pub fn verify(&self, network: &Network) -> bool {
        self.snapshot_id == Self::compute(network).snapshot_id
    }
}
