//! Dendritic Connectivity Index.
//!
//! For a species with total habitat length `H`:
//!
//! ```text
//! DCI = Σ over habitat edges of (length / H) × Π passability(barriers_down) × 100
//! ```
//!
//! The marginal DCI of a barrier is the gain from treating that barrier as
//! fully passable. Products are kept as a zero count plus a log sum, so a
//! single factor can be divided out exactly even when it is zero.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::network::{EdgeIndex, Network};
use crate::types::{BarrierId, SpeciesCode};

/// Product of passability scores in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassabilityProduct {
    zeros: usize,
    log_sum: f64,
}

impl PassabilityProduct {
    /// Multiply in a score.
    pub fn push(&mut self, score: f64) {
        if score <= 0.0 {
            self.zeros += 1;
        } else {
            self.log_sum += score.min(1.0).ln();
        }
    }

    /// Current product.
    pub fn value(&self) -> f64 {
        if self.zeros > 0 {
            0.0
        } else {
            self.log_sum.exp()
        }
    }

    /// Product with one previously pushed score removed.
    pub fn without(&self, score: f64) -> f64 {
        if score <= 0.0 {
            if self.zeros > 1 {
                0.0
            } else {
                self.log_sum.exp()
            }
        } else if self.zeros > 0 {
            0.0
        } else {
            (self.log_sum - score.min(1.0).ln()).exp()
        }
    }
}

/// DCI summary for one species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesDci {
    /// Species code.
    pub species: SpeciesCode,
    /// Total habitat length.
    pub total_habitat: f64,
    /// Base DCI in `[0, 100]`.
    pub dci: f64,
    /// Marginal DCI of each attached barrier, never negative.
    pub barriers: BTreeMap<BarrierId, f64>,
}

/// Compute base and marginal DCI for every species.
///
/// Writes each edge's contribution to its species state. Species with no
/// habitat are skipped with a warning.
pub fn compute_dci(network: &mut Network) -> Vec<SpeciesDci> {
    let species: Vec<_> = network
        .species()
        .iter()
        .map(|(i, s)| (i, s.code.clone()))
        .collect();
    let barrier_ids: Vec<BarrierId> = network.barriers().map(|b| b.id).collect();
    let mut out = Vec::new();

    for (s, code) in species {
        for i in 0..network.edge_count() {
            network.edge_mut(EdgeIndex(i)).species[s.0].dci = 0.0;
        }

        let total_habitat: f64 = network
            .edges()
            .iter()
            .filter(|e| e.species_state(s).habitat)
            .map(|e| e.length)
            .sum();
        if !(total_habitat > 0.0) {
            tracing::warn!(species = %code, "no habitat, connectivity index skipped");
            continue;
        }

        let mut marginal: BTreeMap<BarrierId, f64> = barrier_ids.iter().map(|id| (*id, 0.0)).collect();
        let mut dci = 0.0;

        for i in 0..network.edge_count() {
            let index = EdgeIndex(i);
            let edge = network.edge(index);
            let state = edge.species_state(s);
            if !state.habitat {
                continue;
            }

            let scores: Vec<(BarrierId, f64)> = state
                .barriers_down
                .iter()
                .map(|id| {
                    let score = network
                        .barrier(id)
                        .map(|b| b.passability_for(&code).score())
                        .unwrap_or(0.0);
                    (*id, score)
                })
                .collect();
            let mut product = PassabilityProduct::default();
            for (_, score) in &scores {
                product.push(*score);
            }

            let weight = edge.length / total_habitat * 100.0;
            let base = product.value();
            for (id, score) in &scores {
                let gain = weight * (product.without(*score) - base);
                *marginal.entry(*id).or_insert(0.0) += gain;
            }

            let contribution = weight * base;
            dci += contribution;
            network.edge_mut(index).species[s.0].dci = contribution;
        }

        for value in marginal.values_mut() {
            *value = value.max(0.0);
        }
        tracing::info!(species = %code, dci, total_habitat, "connectivity index computed");
        out.push(SpeciesDci {
            species: code,
            total_habitat,
            dci,
            barriers: marginal,
        });
    }
    out
}
