//! Vertex, segment and downstream gradients, and gradient break points.
//!
//! Vertex gradients look a fixed distance upstream along the vertex's
//! mainstem: `(z(m + d) - z(m)) / d`, with `z` linearly interpolated on the
//! smoothed profile. A break point is a vertex where the gradient first rises
//! above the smallest passable gradient of any species, walking upstream.

use serde::{Deserialize, Serialize};

use super::mainstem::mainstem_edges;
use crate::config::EngineConfig;
use crate::network::{Edge, EdgeIndex, Network, NetworkError, PassStats, Propagator};
use crate::types::{
    is_nodata, Barrier, BarrierId, BarrierKind, BreakPoint, Coord, EdgeId, MainstemId,
    Passability, SpeciesTable,
};

/// Gradient of one vertex along its mainstem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexGradient {
    /// Edge carrying the vertex.
    pub edge: EdgeId,
    /// Vertex index within the edge geometry.
    pub vertex: usize,
    /// Mainstem of the edge.
    pub mainstem: MainstemId,
    /// Route measure of the vertex.
    pub downstream_measure: f64,
    /// Vertex position.
    pub position: Coord,
    /// Smoothed elevation at the vertex.
    pub elevation: f64,
    /// Interpolated elevation one sample distance upstream.
    pub upstream_elevation: f64,
    /// Rise over run.
    pub gradient: f64,
    /// Grade class as a whole percent.
    pub grade_class: Option<u32>,
}

/// Route measure of every vertex of an edge.
///
/// Vertex 0 (upstream end) sits exactly at the upstream measure, the last
/// vertex exactly at the downstream measure. Interior vertices are placed by
/// planar distance from the upstream end, scaled to the edge length only when
/// the two differ.
pub fn vertex_measures(edge: &Edge) -> Vec<f64> {
    let n = edge.geometry.len();
    let mut cumulative = Vec::with_capacity(n);
    let mut total = 0.0;
    for (i, v) in edge.geometry.iter().enumerate() {
        if i > 0 {
            total += edge.geometry[i - 1].coord().distance(&v.coord());
        }
        cumulative.push(total);
    }

    cumulative
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let along = if i == 0 {
                0.0
            } else if i + 1 == n {
                edge.length
            } else if total == edge.length {
                *c
            } else if total > 0.0 {
                c * edge.length / total
            } else {
                edge.length * i as f64 / (n - 1) as f64
            };
            edge.downstream_measure + (edge.length - along)
        })
        .collect()
}

// (measure, elevation) pairs of one mainstem, ascending by measure.
struct Profile {
    points: Vec<(f64, f64)>,
}

impl Profile {
    fn build(network: &Network, edges: &[EdgeIndex]) -> Self {
        let mut points = Vec::new();
        for e in edges {
            let edge = network.edge(*e);
            for (m, z) in vertex_measures(edge).into_iter().zip(edge.smoothed.iter()) {
                points.push((m, *z));
            }
        }
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }

    fn elevation_at(&self, measure: f64) -> Option<f64> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if measure < first.0 || measure >= last.0 {
            return None;
        }
        let idx = self.points.partition_point(|p| p.0 <= measure);
        let (m0, z0) = self.points[idx - 1];
        let (m1, z1) = self.points[idx];
        if is_nodata(z0) || is_nodata(z1) {
            return None;
        }
        if m1 == m0 {
            return Some(z0);
        }
        Some(z0 + (z1 - z0) * (measure - m0) / (m1 - m0))
    }
}

/// Compute vertex gradients and per-edge maximum vertex gradient.
///
/// Returns the gradients ordered by mainstem, then route measure. The
/// downstream endpoint of each edge gets no gradient; it is covered by the
/// next edge of the mainstem.
pub fn compute_vertex_gradients(network: &mut Network, config: &EngineConfig) -> Vec<VertexGradient> {
    let distance = config.gradient_sample_distance;
    for i in 0..network.edge_count() {
        let edge = network.edge_mut(EdgeIndex(i));
        edge.vertex_gradients = vec![None; edge.geometry.len()];
        edge.max_vertex_gradient = None;
    }

    let mut out = Vec::new();
    for (mainstem, edges) in mainstem_edges(network) {
        let profile = Profile::build(network, &edges);
        let mut rows = Vec::new();

        for e in &edges {
            let edge = network.edge(*e);
            let measures = vertex_measures(edge);
            let mut gradients = vec![None; edge.geometry.len()];
            for i in 0..edge.geometry.len().saturating_sub(1) {
                let z = edge.smoothed[i];
                if is_nodata(z) {
                    continue;
                }
                let Some(upstream_elevation) = profile.elevation_at(measures[i] + distance) else {
                    continue;
                };
                let gradient = (upstream_elevation - z) / distance;
                gradients[i] = Some(gradient);
                rows.push(VertexGradient {
                    edge: edge.id(),
                    vertex: i,
                    mainstem,
                    downstream_measure: measures[i],
                    position: edge.geometry[i].coord(),
                    elevation: z,
                    upstream_elevation,
                    gradient,
                    grade_class: config.grade_class(gradient),
                });
            }

            let max = gradients.iter().flatten().copied().fold(None, |acc: Option<f64>, g| {
                Some(acc.map_or(g, |a| a.max(g)))
            });
            let edge = network.edge_mut(*e);
            edge.vertex_gradients = gradients;
            edge.max_vertex_gradient = max;
        }

        rows.sort_by(|a, b| a.downstream_measure.total_cmp(&b.downstream_measure));
        out.extend(rows);
    }

    tracing::debug!(vertices = out.len(), distance, "vertex gradients computed");
    out
}

/// Compute segment gradients and the maximum segment gradient downstream.
pub fn compute_segment_gradients(network: &mut Network) -> Result<PassStats, NetworkError> {
    for i in 0..network.edge_count() {
        let edge = network.edge_mut(EdgeIndex(i));
        edge.segment_gradient = segment_gradient(&edge.smoothed, edge.length);
        edge.max_downstream_gradient = None;
    }

    Propagator::upstream().run(network, |net, node| {
        let below = net
            .node(node)
            .downstream_edge()
            .and_then(|d| net.edge(d).max_downstream_gradient);
        let in_edges = net.node(node).in_edges().to_vec();
        for e in in_edges {
            let edge = net.edge_mut(e);
            edge.max_downstream_gradient = match (edge.segment_gradient, below) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }
    })
}

/// End-to-end gradient of a smoothed profile.
pub fn segment_gradient(smoothed: &[f64], length: f64) -> Option<f64> {
    let first = *smoothed.first()?;
    let last = *smoothed.last()?;
    if is_nodata(first) || is_nodata(last) || !(length > 0.0) {
        return None;
    }
    Some((first - last) / length)
}

/// Find gradient break points.
///
/// `gradients` must be ordered by mainstem, then route measure, as returned
/// by [`compute_vertex_gradients`]. Each row is compared with the row before
/// it; vertices without a gradient have no row, so the comparison is with
/// the nearest vertex downstream that has one. Returns no break points when
/// no species defines an accessibility gradient.
pub fn find_break_points(network: &Network, gradients: &[VertexGradient]) -> Vec<BreakPoint> {
    let Some(threshold) = network.species().min_accessibility_gradient() else {
        tracing::warn!("no species defines an accessibility gradient, skipping break points");
        return Vec::new();
    };

    let mut breaks = Vec::new();
    let mut previous: Option<&VertexGradient> = None;
    for g in gradients {
        let first_of_mainstem = previous.map_or(true, |p| p.mainstem != g.mainstem);
        if g.gradient > threshold {
            let below = if first_of_mainstem {
                downstream_neighbour_gradient(network, g)
            } else {
                previous.map(|p| p.gradient)
            };
            if below.is_some_and(|b| b <= threshold) {
                breaks.push(BreakPoint {
                    edge: g.edge,
                    vertex: g.vertex,
                    mainstem: g.mainstem,
                    downstream_measure: g.downstream_measure,
                    position: g.position,
                    gradient: g.gradient,
                });
            }
        }
        previous = Some(g);
    }

    tracing::info!(break_points = breaks.len(), threshold, "gradient break points found");
    breaks
}

// Gradient of the next vertex downstream through the network.
fn downstream_neighbour_gradient(network: &Network, g: &VertexGradient) -> Option<f64> {
    let index = network.edge_index(g.edge)?;
    let edge = network.edge(index);
    if g.vertex + 2 < edge.geometry.len() {
        return edge.vertex_gradients[g.vertex + 1];
    }
    let below = network.downstream_of(index)?;
    network.edge(below).vertex_gradients.first().copied().flatten()
}

/// Turn break points into gradient barriers.
///
/// A barrier blocks every species whose accessibility gradient is below the
/// break point gradient. Species without an accessibility gradient pass.
pub fn gradient_barriers(break_points: &[BreakPoint], species: &SpeciesTable) -> Vec<Barrier> {
    for (_, s) in species.iter() {
        if s.accessibility_gradient.is_none() {
            tracing::warn!(species = %s.code, "missing accessibility gradient, gradient barriers passable");
        }
    }

    break_points
        .iter()
        .map(|bp| {
            let mut barrier = Barrier::new(
                BarrierId::at_break_point(bp.edge, bp.vertex),
                BarrierKind::Gradient,
                bp.position,
            );
            for (_, s) in species.iter() {
                let passability = match s.accessibility_gradient {
                    Some(limit) if bp.gradient > limit => Passability::Barrier,
                    _ => Passability::Passable,
                };
                barrier.passability.insert(s.code.clone(), passability);
            }
            barrier
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::elevation::smooth_elevations;
    use crate::analysis::mainstem::resolve_mainstems;
    use crate::types::{Species, StreamRecord, Vertex};
    use uuid::Uuid;

    fn eid(n: u128) -> EdgeId {
        EdgeId::new(Uuid::from_u128(n))
    }

    fn config(distance: f64) -> EngineConfig {
        EngineConfig {
            gradient_sample_distance: distance,
            ..EngineConfig::default()
        }
    }

    fn prepare(records: Vec<StreamRecord>, species: Vec<Species>) -> Network {
        let mut net = Network::build(records, SpeciesTable::new(species)).unwrap();
        smooth_elevations(&mut net).unwrap();
        resolve_mainstems(&mut net).unwrap();
        net
    }

    // Single edge flowing south along x = 0, vertex every 10 units.
    fn line(n: u128, elevations: &[f64]) -> StreamRecord {
        let top = (elevations.len() - 1) as f64 * 10.0;
        StreamRecord::new(
            eid(n),
            elevations
                .iter()
                .enumerate()
                .map(|(i, z)| Vertex::new(0.0, top - i as f64 * 10.0, *z))
                .collect(),
        )
    }

    #[test]
    fn test_vertex_measures() {
        let net = prepare(vec![line(1, &[4.0, 3.0, 2.0, 1.0])], vec![]);
        let measures = vertex_measures(&net.edges()[0]);
        assert_eq!(measures.len(), 4);
        for (m, expected) in measures.iter().zip([30.0, 20.0, 10.0, 0.0]) {
            assert!((m - expected).abs() < 1e-9, "{measures:?}");
        }
        assert_eq!(measures[0], net.edges()[0].upstream_measure());
        assert_eq!(measures[3], net.edges()[0].downstream_measure);
    }

    #[test]
    fn test_vertex_measures_scaled_to_length() {
        // Planar length 30, recorded length 60, second edge below shifts measures by 7.
        let mut net = prepare(
            vec![
                line(1, &[4.0, 3.0, 2.0, 1.0]).with_length(60.0),
                StreamRecord::new(eid(2), vec![Vertex::new(0.0, 0.0, 1.0), Vertex::new(0.0, -7.0, 0.5)]),
            ],
            vec![],
        );
        let upper = net.edge_index(eid(1)).unwrap();
        assert_eq!(net.edge(upper).downstream_measure, 7.0);

        let measures = vertex_measures(net.edge(upper));
        for (m, expected) in measures.iter().zip([67.0, 47.0, 27.0, 7.0]) {
            assert!((m - expected).abs() < 1e-9, "{measures:?}");
        }
        assert_eq!(measures[0], 67.0);
        assert_eq!(measures[3], 7.0);

        net.edge_mut(upper).downstream_measure = 0.1;
        assert_eq!(vertex_measures(net.edge(upper))[0], net.edge(upper).upstream_measure());
    }

    #[test]
    fn test_vertex_gradient_lookahead() {
        let mut net = prepare(vec![line(1, &[6.0, 5.0, 4.0, 1.0, 0.0])], vec![]);
        let rows = compute_vertex_gradients(&mut net, &config(10.0));

        // Vertex 1 looks exactly at the mainstem top and vertex 0 past it.
        let vertices: Vec<usize> = rows.iter().map(|r| r.vertex).collect();
        assert_eq!(vertices, vec![3, 2]);
        assert!((rows[0].gradient - 0.3).abs() < 1e-12);
        assert!((rows[1].gradient - 0.1).abs() < 1e-12);
        assert_eq!(net.edges()[0].vertex_gradients[1], None);
        assert_eq!(net.edges()[0].vertex_gradients[4], None);
        assert!((net.edges()[0].max_vertex_gradient.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(rows[0].grade_class, Some(30));
    }

    #[test]
    fn test_segment_and_downstream_gradient() {
        let mut net = prepare(
            vec![
                StreamRecord::new(eid(1), vec![Vertex::new(0.0, 2.0, 30.0), Vertex::new(0.0, 1.0, 10.0)])
                    .with_length(100.0),
                StreamRecord::new(eid(2), vec![Vertex::new(0.0, 1.0, 10.0), Vertex::new(0.0, 0.0, 0.0)])
                    .with_length(20.0),
            ],
            vec![],
        );
        compute_segment_gradients(&mut net).unwrap();

        let upper = net.edge_by_id(eid(1)).unwrap();
        let lower = net.edge_by_id(eid(2)).unwrap();
        assert_eq!(upper.segment_gradient, Some(0.2));
        assert_eq!(lower.segment_gradient, Some(0.5));
        assert_eq!(lower.max_downstream_gradient, Some(0.5));
        assert_eq!(upper.max_downstream_gradient, Some(0.5));
    }

    #[test]
    fn test_segment_gradient_nodata() {
        assert_eq!(segment_gradient(&[crate::NODATA, 1.0], 10.0), None);
        assert_eq!(segment_gradient(&[2.0, 1.0], 0.0), None);
    }

    #[test]
    fn test_break_point_at_start_of_steep_reach() {
        // Flat lower reach, steep upper reach.
        let mut net = prepare(
            vec![line(1, &[12.0, 9.0, 6.0, 3.0, 2.9, 2.8, 2.7, 2.6])],
            vec![Species::new("bt", "Bull Trout", 0.2), Species::new("ws", "Westslope", 0.25)],
        );
        let rows = compute_vertex_gradients(&mut net, &config(10.0));
        let breaks = find_break_points(&net, &rows);

        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].vertex, 3);
        assert!((breaks[0].gradient - 0.3).abs() < 1e-9);

        let barriers = gradient_barriers(&breaks, net.species());
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].kind, BarrierKind::Gradient);
        assert_eq!(barriers[0].position, Coord::new(0.0, 40.0));
        assert_eq!(barriers[0].passability_for(&"bt".into()), Passability::Barrier);
        assert_eq!(barriers[0].passability_for(&"ws".into()), Passability::Barrier);
    }

    #[test]
    fn test_species_above_gradient_passes() {
        let bp = BreakPoint {
            edge: eid(1),
            vertex: 2,
            mainstem: MainstemId::starting_at(eid(1)),
            downstream_measure: 10.0,
            position: Coord::new(0.0, 0.0),
            gradient: 0.15,
        };
        let mut missing = Species::new("xx", "Unknown", 0.0);
        missing.accessibility_gradient = None;
        let species = SpeciesTable::new(vec![
            Species::new("bt", "Bull Trout", 0.1),
            Species::new("rb", "Rainbow", 0.2),
            missing,
        ]);

        let barrier = &gradient_barriers(&[bp], &species)[0];
        assert_eq!(barrier.passability_for(&"bt".into()), Passability::Barrier);
        assert_eq!(barrier.passability_for(&"rb".into()), Passability::Passable);
        assert_eq!(barrier.passability_for(&"xx".into()), Passability::Passable);
    }

    #[test]
    fn test_steep_at_mouth_is_not_a_break() {
        let mut net = prepare(
            vec![line(1, &[20.0, 15.0, 10.0, 5.0, 0.0])],
            vec![Species::new("bt", "Bull Trout", 0.2)],
        );
        let rows = compute_vertex_gradients(&mut net, &config(10.0));
        assert!(rows.iter().all(|r| r.gradient > 0.2));
        assert!(find_break_points(&net, &rows).is_empty());
    }
}
