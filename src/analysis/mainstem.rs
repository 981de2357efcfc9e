//! Mainstem resolution.
//!
//! A mainstem is the backbone path of a stream, walked from the mouth to its
//! source. At each confluence one inflowing edge continues the mainstem:
//!
//! 1. the in-edge with the same name as the outgoing edge, if it is named
//! 2. else, if the outgoing edge is named, the named in-edge with the
//!    longest upstream path
//! 3. else the in-edge with the longest upstream path
//!
//! Ties keep the first edge in input order. Every other in-edge starts a new
//! mainstem at measure 0. A mainstem takes the id of its downstream-most edge.

use std::collections::BTreeMap;

use crate::network::{EdgeIndex, Network, NetworkError, NodeIndex, PassStats, Propagator};
use crate::types::MainstemId;

/// Counters from mainstem resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MainstemStats {
    /// Up-length pass.
    pub downstream: PassStats,
    /// Assignment pass.
    pub upstream: PassStats,
    /// Distinct mainstems.
    pub mainstems: usize,
}

/// Resolve mainstem ids and route measures for every edge.
pub fn resolve_mainstems(network: &mut Network) -> Result<MainstemStats, NetworkError> {
    let downstream = Propagator::downstream().run(network, |net, node| {
        let up = net
            .node(node)
            .in_edges()
            .iter()
            .map(|e| {
                let edge = net.edge(*e);
                net.node(edge.from()).up_length + edge.length
            })
            .fold(0.0, f64::max);
        net.node_mut(node).up_length = up;
    })?;

    let upstream = Propagator::upstream().run(network, assign_at)?;

    let mainstems = network
        .edges()
        .iter()
        .filter_map(|e| e.mainstem)
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    tracing::debug!(mainstems, edges = network.edge_count(), "mainstems resolved");

    Ok(MainstemStats {
        downstream,
        upstream,
        mainstems,
    })
}

fn assign_at(net: &mut Network, node: NodeIndex) {
    let Some(chosen) = choose_continuation(net, node) else {
        return;
    };
    let current = net.node(node).mainstem;
    let measure = net.node(node).route_measure;

    let in_edges = net.node(node).in_edges().to_vec();
    for e in in_edges {
        let edge = net.edge_mut(e);
        match current {
            Some(id) if e == chosen => {
                edge.mainstem = Some(id);
                edge.downstream_measure = measure;
            }
            _ => {
                edge.mainstem = Some(MainstemId::starting_at(edge.id()));
                edge.downstream_measure = 0.0;
            }
        }
        let (mainstem, up_measure, from) = (edge.mainstem, edge.upstream_measure(), edge.from());
        let upstream_node = net.node_mut(from);
        upstream_node.mainstem = mainstem;
        upstream_node.route_measure = up_measure;
    }

    if current.is_none() {
        net.node_mut(node).mainstem = net.edge(chosen).mainstem;
    }
}

/// Pick the in-edge that continues the mainstem through `node`.
pub fn choose_continuation(net: &Network, node: NodeIndex) -> Option<EdgeIndex> {
    let in_edges = net.node(node).in_edges();
    let outgoing_name = net
        .node(node)
        .downstream_edge()
        .and_then(|e| net.edge(e).stream_name.as_deref());

    let upstream_length = |e: EdgeIndex| {
        let edge = net.edge(e);
        net.node(edge.from()).up_length + edge.length
    };
    let longest = |candidates: &mut dyn Iterator<Item = EdgeIndex>| {
        let mut best: Option<(EdgeIndex, f64)> = None;
        for e in candidates {
            let up = upstream_length(e);
            if best.map_or(true, |(_, b)| up > b) {
                best = Some((e, up));
            }
        }
        best.map(|(e, _)| e)
    };

    if let Some(name) = outgoing_name {
        let same_name = in_edges
            .iter()
            .copied()
            .find(|e| net.edge(*e).stream_name.as_deref() == Some(name));
        if same_name.is_some() {
            return same_name;
        }
        let named = longest(&mut in_edges.iter().copied().filter(|e| net.edge(*e).stream_name.is_some()));
        if named.is_some() {
            return named;
        }
    }
    longest(&mut in_edges.iter().copied())
}

/// Edges of each mainstem ordered by downstream measure (mouth first).
pub fn mainstem_edges(network: &Network) -> BTreeMap<MainstemId, Vec<EdgeIndex>> {
    let mut groups: BTreeMap<MainstemId, Vec<EdgeIndex>> = BTreeMap::new();
    for (i, edge) in network.edges().iter().enumerate() {
        if let Some(id) = edge.mainstem {
            groups.entry(id).or_default().push(EdgeIndex(i));
        }
    }
    for edges in groups.values_mut() {
        edges.sort_by(|a, b| {
            network
                .edge(*a)
                .downstream_measure
                .total_cmp(&network.edge(*b).downstream_measure)
        });
    }
    groups
}
