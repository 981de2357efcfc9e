//! Habitat model and upstream habitat lengths.
//!
//! A segment is spawning (rearing) habitat when it is reachable and its
//! gradient, discharge and channel confinement fall inside the species'
//! envelope. Habitat flags observed on the input record win over the model.

use crate::network::{Edge, EdgeIndex, Network, NetworkError, PassStats, Propagator, UpstreamLengths};
use crate::types::{HabitatEnvelope, Range, SpeciesIndex};

/// Check a habitat envelope against an edge.
///
/// A criterion the envelope defines fails when the edge lacks the value.
/// An empty envelope never matches.
pub fn envelope_matches(envelope: &HabitatEnvelope, edge: &Edge) -> bool {
    if envelope.is_empty() {
        return false;
    }
    let gradient = edge.max_vertex_gradient.or(edge.segment_gradient);
    let check = |range: &Option<Range>, value: Option<f64>| match range {
        None => true,
        Some(r) => value.is_some_and(|v| r.contains(v)),
    };
    check(&envelope.gradient, gradient)
        && check(&envelope.discharge, edge.discharge)
        && check(&envelope.channel_confinement, edge.channel_confinement)
}

/// Assign spawning, rearing and habitat flags to every edge.
///
/// Returns the number of habitat edges per species, in table order.
pub fn assign_habitat(network: &mut Network) -> Vec<usize> {
    let species: Vec<_> = network
        .species()
        .iter()
        .map(|(i, s)| (i, s.code.clone(), s.spawning.clone(), s.rearing.clone(), s.has_habitat_envelope()))
        .collect();

    for (_, code, _, _, modelled) in &species {
        let observed = network.edges().iter().any(|e| e.observed_habitat.contains_key(code));
        if !modelled && !observed {
            tracing::warn!(species = %code, "no habitat envelope or observations, habitat not assigned");
        }
    }

    let mut totals = vec![0; species.len()];
    for i in 0..network.edge_count() {
        let index = EdgeIndex(i);
        for (s, code, spawning_env, rearing_env, _) in &species {
            let edge = network.edge(index);
            let reachable = edge
                .species_state(*s)
                .accessibility
                .is_some_and(|a| a.is_reachable());
            let spawning = reachable && envelope_matches(spawning_env, edge);
            let rearing = reachable && envelope_matches(rearing_env, edge);
            let habitat = edge
                .observed_habitat
                .get(code)
                .copied()
                .unwrap_or(spawning || rearing);

            let state = &mut network.edge_mut(index).species[s.0];
            state.spawning = spawning;
            state.rearing = rearing;
            state.habitat = habitat;
            if habitat {
                totals[s.0] += 1;
            }
        }
    }
    totals
}

/// Accumulate upstream lengths for every edge and species.
///
/// Functional habitat restarts at any node holding a barrier that blocks
/// the species.
pub fn compute_upstream_lengths(network: &mut Network) -> Result<PassStats, NetworkError> {
    let species: Vec<SpeciesIndex> = network.species().iter().map(|(i, _)| i).collect();

    Propagator::downstream().run(network, |net, node| {
        let Some(out) = net.node(node).downstream_edge() else {
            return;
        };
        for s in &species {
            let blocked = !super::barriers::blocking_barriers(net, node, *s).0.is_empty();
            let mut above = UpstreamLengths::default();
            for e in net.node(node).in_edges() {
                let up = net.edge(*e).species_state(*s).upstream;
                above.accessible += up.accessible;
                above.habitat += up.habitat;
                above.functional_habitat += up.functional_habitat;
            }

            let edge = net.edge(out);
            let state = edge.species_state(*s);
            let own_accessible = if state.accessibility.is_some_and(|a| a.is_reachable()) {
                edge.length
            } else {
                0.0
            };
            let own_habitat = if state.habitat { edge.length } else { 0.0 };

            net.edge_mut(out).species[s.0].upstream = UpstreamLengths {
                accessible: above.accessible + own_accessible,
                habitat: above.habitat + own_habitat,
                functional_habitat: if blocked {
                    own_habitat
                } else {
                    above.functional_habitat + own_habitat
                },
            };
        }
    })
}
