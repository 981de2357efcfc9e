//! Elevation smoothing.
//!
//! Raw elevations sampled from a DEM are noisy and can rise downstream.
//! Smoothing produces a profile that never increases in flow direction:
//!
//! 1. Upstream pass: `max_bound(n) = max(raw(n), max_bound(downstream))`
//! 2. Downstream pass: `min_bound(n) = min(raw(n), min_bound(upstream)...)`
//! 3. Node elevation is the mean of the two bounds
//! 4. Edge interiors are squeezed between their endpoint elevations
//!
//! NODATA is never treated as a number: bounds skip it, and a mean with an
//! unknown side is NODATA.

use crate::network::{EdgeIndex, Network, NetworkError, NodeIndex, PassStats, Propagator};
use crate::types::is_nodata;
use crate::NODATA;

/// Counters from a smoothing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothingStats {
    /// Upstream (max bound) pass.
    pub upstream: PassStats,
    /// Downstream (min bound) pass.
    pub downstream: PassStats,
    /// Nodes left without a smoothed elevation.
    pub nodata_nodes: usize,
}

fn max_known(a: f64, b: f64) -> f64 {
    match (is_nodata(a), is_nodata(b)) {
        (true, true) => NODATA,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a.max(b),
    }
}

fn min_known(a: f64, b: f64) -> f64 {
    match (is_nodata(a), is_nodata(b)) {
        (true, true) => NODATA,
        (true, false) => b,
        (false, true) => a,
        (false, false) => a.min(b),
    }
}

fn mean_known(a: f64, b: f64) -> f64 {
    if is_nodata(a) || is_nodata(b) {
        NODATA
    } else {
        (a + b) / 2.0
    }
}

/// Smooth node and vertex elevations in place.
pub fn smooth_elevations(network: &mut Network) -> Result<SmoothingStats, NetworkError> {
    let upstream = Propagator::upstream().run(network, |net, node| {
        let raw = net.node(node).raw_elevation;
        let below = net
            .node(node)
            .downstream_edge()
            .map(|e| net.node(net.edge(e).to()).max_bound)
            .unwrap_or(NODATA);
        net.node_mut(node).max_bound = max_known(raw, below);
    })?;

    let downstream = Propagator::downstream().run(network, |net, node| {
        let mut bound = net.node(node).raw_elevation;
        for e in net.node(node).in_edges() {
            bound = min_known(bound, net.node(net.edge(*e).from()).min_bound);
        }
        net.node_mut(node).min_bound = bound;
    })?;

    let mut nodata_nodes = 0;
    for i in 0..network.node_count() {
        let node = network.node_mut(NodeIndex(i));
        node.elevation = mean_known(node.min_bound, node.max_bound);
        if is_nodata(node.elevation) {
            nodata_nodes += 1;
        }
    }

    for i in 0..network.edge_count() {
        let index = EdgeIndex(i);
        let edge = network.edge(index);
        let top = network.node(edge.from()).elevation;
        let bottom = network.node(edge.to()).elevation;
        let raw: Vec<f64> = edge.geometry.iter().map(|v| v.z).collect();
        network.edge_mut(index).smoothed = smooth_profile(&raw, top, bottom);
    }

    if nodata_nodes > 0 {
        tracing::warn!(nodata_nodes, "nodes without elevation after smoothing");
    }
    tracing::debug!(
        nodes = network.node_count(),
        edges = network.edge_count(),
        "elevations smoothed"
    );

    Ok(SmoothingStats {
        upstream,
        downstream,
        nodata_nodes,
    })
}

/// Smooth one edge's vertex elevations between its endpoint elevations.
///
/// `raw` is ordered upstream first. A running minimum from the upstream end
/// (raw values clamped at or above `bottom`) and a running maximum from the
/// downstream end (raw values clamped at or below `top`) are averaged.
/// Endpoints are pinned to `top` and `bottom`.
pub fn smooth_profile(raw: &[f64], top: f64, bottom: f64) -> Vec<f64> {
    let size = raw.len();
    let mut out = vec![NODATA; size];
    if size == 0 {
        return out;
    }
    if is_nodata(top) || is_nodata(bottom) {
        out[0] = top;
        out[size - 1] = bottom;
        return out;
    }

    let mut lower_env = vec![top; size];
    let mut running = top;
    for i in 1..size {
        if !is_nodata(raw[i]) {
            running = running.min(raw[i].max(bottom));
        }
        lower_env[i] = running;
    }

    let mut upper_env = vec![bottom; size];
    let mut running = bottom;
    for i in (0..size - 1).rev() {
        if !is_nodata(raw[i]) {
            running = running.max(raw[i].min(top));
        }
        upper_env[i] = running;
    }

    for i in 0..size {
        out[i] = (lower_env[i] + upper_env[i]) / 2.0;
    }
    out[0] = top;
    out[size - 1] = bottom;
    out
}
