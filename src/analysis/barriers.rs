//! Upstream and downstream barrier aggregation.
//!
//! For every edge and species, collects the barriers that fish would have to
//! cross to reach the edge from the mouth (`barriers_down`) and the barriers
//! above it (`barriers_up`). Barriers passable for the species are ignored.
//! Gradient barriers are also tracked in separate subsets.

use std::collections::BTreeSet;

use crate::network::{Network, NetworkError, NodeIndex, PassStats, Propagator};
use crate::types::{BarrierId, SpeciesIndex};

/// Counters from barrier aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregationStats {
    /// Pass computing `barriers_up`.
    pub downstream: PassStats,
    /// Pass computing `barriers_down`.
    pub upstream: PassStats,
}

/// Barriers at a node that block a species, and the gradient-derived subset.
pub fn blocking_barriers(
    network: &Network,
    node: NodeIndex,
    species: SpeciesIndex,
) -> (BTreeSet<BarrierId>, BTreeSet<BarrierId>) {
    let code = &network.species().get(species).code;
    let mut all = BTreeSet::new();
    let mut gradient = BTreeSet::new();
    for id in &network.node(node).barriers {
        let Some(barrier) = network.barrier(id) else {
            continue;
        };
        if barrier.passability_for(code).is_passable() {
            continue;
        }
        all.insert(*id);
        if barrier.kind.is_gradient() {
            gradient.insert(*id);
        }
    }
    (all, gradient)
}

/// Compute barrier sets for every edge and species.
pub fn aggregate_barriers(network: &mut Network) -> Result<AggregationStats, NetworkError> {
    let species: Vec<SpeciesIndex> = network.species().iter().map(|(i, _)| i).collect();

    let downstream = Propagator::downstream().run(network, |net, node| {
        let Some(out) = net.node(node).downstream_edge() else {
            return;
        };
        for s in &species {
            let (mut up, mut gradient_up) = blocking_barriers(net, node, *s);
            for e in net.node(node).in_edges() {
                let state = net.edge(*e).species_state(*s);
                up.extend(state.barriers_up.iter().copied());
                gradient_up.extend(state.gradient_barriers_up.iter().copied());
            }
            let state = &mut net.edge_mut(out).species[s.0];
            state.barriers_up = up;
            state.gradient_barriers_up = gradient_up;
        }
    })?;

    let upstream = Propagator::upstream().run(network, |net, node| {
        let in_edges = net.node(node).in_edges().to_vec();
        if in_edges.is_empty() {
            return;
        }
        let below = net.node(node).downstream_edge();
        for s in &species {
            let (mut down, mut gradient_down) = blocking_barriers(net, node, *s);
            if let Some(d) = below {
                let state = net.edge(d).species_state(*s);
                down.extend(state.barriers_down.iter().copied());
                gradient_down.extend(state.gradient_barriers_down.iter().copied());
            }
            for e in &in_edges {
                let state = &mut net.edge_mut(*e).species[s.0];
                state.barriers_down = down.clone();
                state.gradient_barriers_down = gradient_down.clone();
            }
        }
    })?;

    tracing::debug!(
        barriers = network.barrier_count(),
        species = species.len(),
        "barriers aggregated"
    );
    Ok(AggregationStats { downstream, upstream })
}
