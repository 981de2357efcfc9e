//! In-memory stream network.
//!
//! The network is a directed forest: every junction (node) has at most one
//! outgoing segment (edge), and flow runs from an edge's `from` node to its
//! `to` node. Nodes are identified by exact endpoint coordinates.
//!
//! A `Network` is owned by a single run. Analysis stages take it by `&mut`
//! and write their outputs into node and edge attributes; topology is fixed
//! once [`Network::build`] returns.

pub mod propagate;
pub mod snapshot;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::config::EngineConfig;
use crate::types::{
    is_nodata, Accessibility, Barrier, BarrierId, Coord, CoordKey, EdgeId, MainstemId,
    SpeciesCode, SpeciesIndex, SpeciesTable, StreamRecord, Vertex,
};
use crate::NODATA;

pub use propagate::{Direction, PassStats, Propagator};
pub use snapshot::NetworkSnapshot;

/// Error type for network construction and traversal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetworkError {
    /// A node has more than one outgoing edge.
    #[error("Malformed network: node {node} has {} outgoing edges {edges:?}", edges.len())]
    MalformedNetwork {
        /// Offending node.
        node: Coord,
        /// Its outgoing edges.
        edges: Vec<EdgeId>,
    },
    /// The same edge id appears twice.
    #[error("Duplicate edge id: {0}")]
    DuplicateEdge(EdgeId),
    /// An edge has fewer than two vertices.
    #[error("Edge {0} has fewer than two vertices")]
    DegenerateGeometry(EdgeId),
    /// A propagation pass could not visit every edge.
    #[error("Cycle detected during {direction} pass: {} edges never visited {edges:?}", edges.len())]
    CycleDetected {
        /// Pass direction.
        direction: Direction,
        /// Edges that were never (or twice) visited.
        edges: Vec<EdgeId>,
        /// Nodes left waiting on those edges.
        nodes: Vec<Coord>,
    },
}

/// Index of a node in its network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub usize);

/// Index of an edge in its network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeIndex(pub usize);

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A network junction.
#[derive(Debug, Clone)]
pub struct Node {
    coord: Coord,
    in_edges: Vec<EdgeIndex>,
    out_edges: Vec<EdgeIndex>,
    /// Raw elevation from the segment endpoints meeting here, or NODATA.
    pub raw_elevation: f64,
    /// Smallest elevation still at or below everything upstream.
    pub min_bound: f64,
    /// Largest elevation still at or above everything downstream.
    pub max_bound: f64,
    /// Smoothed elevation, or NODATA.
    pub elevation: f64,
    /// Barriers located at this junction.
    pub barriers: Vec<BarrierId>,
    /// Longest flow path length reaching this node.
    pub up_length: f64,
    /// Mainstem continuing upstream from this node.
    pub mainstem: Option<MainstemId>,
    /// Route measure of this node on `mainstem`.
    pub route_measure: f64,
}

impl Node {
    fn new(coord: Coord) -> Self {
        Self {
            coord,
            in_edges: Vec::new(),
            out_edges: Vec::new(),
            raw_elevation: NODATA,
            min_bound: NODATA,
            max_bound: NODATA,
            elevation: NODATA,
            barriers: Vec::new(),
            up_length: 0.0,
            mainstem: None,
            route_measure: 0.0,
        }
    }

    /// Junction coordinate.
    pub fn coord(&self) -> Coord {
        self.coord
    }

    /// Edges flowing into this node, in input order.
    pub fn in_edges(&self) -> &[EdgeIndex] {
        &self.in_edges
    }

    /// Edges flowing out of this node (at most one).
    pub fn out_edges(&self) -> &[EdgeIndex] {
        &self.out_edges
    }

    /// The single downstream edge, if any.
    pub fn downstream_edge(&self) -> Option<EdgeIndex> {
        self.out_edges.first().copied()
    }

    /// No incoming edges.
    pub fn is_headwater(&self) -> bool {
        self.in_edges.is_empty()
    }

    /// No outgoing edges.
    pub fn is_mouth(&self) -> bool {
        self.out_edges.is_empty()
    }

    // Returns true when a conflicting value was overridden.
    fn add_raw_elevation(&mut self, z: f64) -> bool {
        if is_nodata(z) {
            return false;
        }
        let conflict = !is_nodata(self.raw_elevation) && self.raw_elevation != z;
        if conflict {
            tracing::warn!(
                node = %self.coord,
                previous = self.raw_elevation,
                value = z,
                "different elevation values at same position"
            );
        }
        self.raw_elevation = z;
        conflict
    }
}

/// Upstream cumulative lengths for one species.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpstreamLengths {
    /// Length of accessible or potentially accessible segments upstream, inclusive.
    pub accessible: f64,
    /// Habitat length upstream, inclusive.
    pub habitat: f64,
    /// Habitat length upstream before the next impassable barrier, inclusive.
    pub functional_habitat: f64,
}

/// Per-species state of an edge.
#[derive(Debug, Clone, Default)]
pub struct SpeciesState {
    /// Accessibility label.
    pub accessibility: Option<Accessibility>,
    /// Spawning habitat flag.
    pub spawning: bool,
    /// Rearing habitat flag.
    pub rearing: bool,
    /// Habitat flag (spawning, rearing or observed).
    pub habitat: bool,
    /// Impassable barriers upstream.
    pub barriers_up: BTreeSet<BarrierId>,
    /// Impassable barriers downstream.
    pub barriers_down: BTreeSet<BarrierId>,
    /// Gradient barriers upstream (subset of `barriers_up`).
    pub gradient_barriers_up: BTreeSet<BarrierId>,
    /// Gradient barriers downstream (subset of `barriers_down`).
    pub gradient_barriers_down: BTreeSet<BarrierId>,
    /// Upstream cumulative lengths.
    pub upstream: UpstreamLengths,
    /// Contribution of this edge to the species DCI.
    pub dci: f64,
}

/// A directed stream segment.
#[derive(Debug, Clone)]
pub struct Edge {
    id: EdgeId,
    from: NodeIndex,
    to: NodeIndex,
    pub(crate) visited: bool,
    /// Segment length.
    pub length: f64,
    /// Stream name, `None` when unnamed.
    pub stream_name: Option<String>,
    /// Raw geometry, upstream end first.
    pub geometry: Vec<Vertex>,
    /// Mean annual discharge.
    pub discharge: Option<f64>,
    /// Channel confinement.
    pub channel_confinement: Option<f64>,
    /// Observed habitat flags from the input record.
    pub observed_habitat: BTreeMap<SpeciesCode, bool>,
    /// Smoothed elevation per vertex.
    pub smoothed: Vec<f64>,
    /// Mainstem this edge belongs to.
    pub mainstem: Option<MainstemId>,
    /// Distance from the mouth of the mainstem to the downstream end.
    pub downstream_measure: f64,
    /// Gradient per vertex; `None` where it cannot be computed.
    pub vertex_gradients: Vec<Option<f64>>,
    /// End-to-end gradient of the smoothed geometry.
    pub segment_gradient: Option<f64>,
    /// Maximum vertex gradient.
    pub max_vertex_gradient: Option<f64>,
    /// Maximum segment gradient from here to the mouth.
    pub max_downstream_gradient: Option<f64>,
    /// State per species, indexed by [`SpeciesIndex`].
    pub species: Vec<SpeciesState>,
}

impl Edge {
    /// Edge identity.
    pub fn id(&self) -> EdgeId {
        self.id
    }

    /// Upstream node.
    pub fn from(&self) -> NodeIndex {
        self.from
    }

    /// Downstream node.
    pub fn to(&self) -> NodeIndex {
        self.to
    }

    /// Whether the last propagation pass visited this edge.
    pub fn is_visited(&self) -> bool {
        self.visited
    }

    /// Distance from the mouth of the mainstem to the upstream end.
    pub fn upstream_measure(&self) -> f64 {
        self.downstream_measure + self.length
    }

    /// State for one species.
    pub fn species_state(&self, index: SpeciesIndex) -> &SpeciesState {
        &self.species[index.0]
    }

    /// Smoothed geometry, falling back to raw elevations before smoothing.
    pub fn smoothed_geometry(&self) -> Vec<Vertex> {
        self.geometry
            .iter()
            .enumerate()
            .map(|(i, v)| Vertex::new(v.x, v.y, self.smoothed.get(i).copied().unwrap_or(v.z)))
            .collect()
    }
}

/// Counters collected while building a network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Shared coordinates where edges disagreed on elevation.
    pub elevation_conflicts: usize,
}

/// The stream network of one watershed run.
#[derive(Debug, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_lookup: BTreeMap<CoordKey, NodeIndex>,
    edge_lookup: BTreeMap<EdgeId, EdgeIndex>,
    species: SpeciesTable,
    barriers: BTreeMap<BarrierId, Barrier>,
    barrier_nodes: BTreeMap<BarrierId, NodeIndex>,
    build_stats: BuildStats,
}

impl Network {
    /// Build a network with the default configuration.
    pub fn build(records: Vec<StreamRecord>, species: SpeciesTable) -> Result<Self, NetworkError> {
        Self::build_with(records, species, &EngineConfig::default())
    }

    /// Build a network from stream records.
    ///
    /// Fails with [`NetworkError::MalformedNetwork`] if any node ends up with
    /// more than one outgoing edge.
    pub fn build_with(
        records: Vec<StreamRecord>,
        species: SpeciesTable,
        config: &EngineConfig,
    ) -> Result<Self, NetworkError> {
        let mut network = Self {
            nodes: Vec::new(),
            edges: Vec::with_capacity(records.len()),
            node_lookup: BTreeMap::new(),
            edge_lookup: BTreeMap::new(),
            species,
            barriers: BTreeMap::new(),
            barrier_nodes: BTreeMap::new(),
            build_stats: BuildStats::default(),
        };

        for record in records {
            network.add_record(record, config)?;
        }

        for node in &network.nodes {
            if node.out_edges.len() > 1 {
                return Err(NetworkError::MalformedNetwork {
                    node: node.coord,
                    edges: node.out_edges.iter().map(|e| network.edges[e.0].id).collect(),
                });
            }
        }

        tracing::debug!(
            nodes = network.nodes.len(),
            edges = network.edges.len(),
            elevation_conflicts = network.build_stats.elevation_conflicts,
            "network built"
        );
        Ok(network)
    }

    fn add_record(&mut self, record: StreamRecord, config: &EngineConfig) -> Result<(), NetworkError> {
        if record.geometry.len() < 2 {
            return Err(NetworkError::DegenerateGeometry(record.id));
        }
        if self.edge_lookup.contains_key(&record.id) {
            return Err(NetworkError::DuplicateEdge(record.id));
        }

        let length = record.effective_length();
        let first = record.geometry[0];
        let last = record.geometry[record.geometry.len() - 1];
        let from = self.node_for(first.coord());
        let to = self.node_for(last.coord());

        let index = EdgeIndex(self.edges.len());
        let stream_name = record
            .stream_name
            .filter(|n| !n.trim().is_empty() && n != &config.unnamed_stream_label);

        self.edges.push(Edge {
            id: record.id,
            from,
            to,
            visited: false,
            length,
            stream_name,
            smoothed: vec![NODATA; record.geometry.len()],
            vertex_gradients: vec![None; record.geometry.len()],
            geometry: record.geometry,
            discharge: record.discharge,
            channel_confinement: record.channel_confinement,
            observed_habitat: record.habitat,
            mainstem: None,
            downstream_measure: 0.0,
            segment_gradient: None,
            max_vertex_gradient: None,
            max_downstream_gradient: None,
            species: vec![SpeciesState::default(); self.species.len()],
        });
        self.edge_lookup.insert(record.id, index);

        self.nodes[from.0].out_edges.push(index);
        self.nodes[to.0].in_edges.push(index);
        if self.nodes[from.0].add_raw_elevation(first.z) {
            self.build_stats.elevation_conflicts += 1;
        }
        if self.nodes[to.0].add_raw_elevation(last.z) {
            self.build_stats.elevation_conflicts += 1;
        }
        Ok(())
    }

    fn node_for(&mut self, coord: Coord) -> NodeIndex {
        let key = coord.key();
        if let Some(index) = self.node_lookup.get(&key) {
            return *index;
        }
        let index = NodeIndex(self.nodes.len());
        self.nodes.push(Node::new(coord));
        self.node_lookup.insert(key, index);
        index
    }

    /// Attach barriers to the nodes they sit on.
    ///
    /// A barrier whose position matches no node is skipped with a warning.
    /// Returns the number of barriers attached.
    pub fn attach_barriers(&mut self, barriers: impl IntoIterator<Item = Barrier>) -> usize {
        let mut attached = 0;
        for barrier in barriers {
            if self.barriers.contains_key(&barrier.id) {
                tracing::warn!(barrier = %barrier.id, "duplicate barrier id ignored");
                continue;
            }
            let Some(node) = self.node_lookup.get(&barrier.position.key()).copied() else {
                tracing::warn!(
                    barrier = %barrier.id,
                    position = %barrier.position,
                    "barrier is not located on a network node"
                );
                continue;
            };
            for code in barrier.passability.keys() {
                if self.species.index_of(code).is_none() {
                    tracing::warn!(barrier = %barrier.id, species = %code, "passability for unknown species");
                }
            }
            self.nodes[node.0].barriers.push(barrier.id);
            self.barrier_nodes.insert(barrier.id, node);
            self.barriers.insert(barrier.id, barrier);
            attached += 1;
        }
        attached
    }

    /// All nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges, in input order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get a node.
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.0]
    }

    /// Get a node mutably.
    pub fn node_mut(&mut self, index: NodeIndex) -> &mut Node {
        &mut self.nodes[index.0]
    }

    /// Get an edge.
    pub fn edge(&self, index: EdgeIndex) -> &Edge {
        &self.edges[index.0]
    }

    /// Get an edge mutably.
    pub fn edge_mut(&mut self, index: EdgeIndex) -> &mut Edge {
        &mut self.edges[index.0]
    }

    /// Find an edge by id.
    pub fn edge_index(&self, id: EdgeId) -> Option<EdgeIndex> {
        self.edge_lookup.get(&id).copied()
    }

    /// Find an edge by id.
    pub fn edge_by_id(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_index(id).map(|i| &self.edges[i.0])
    }

    /// Find the node at an exact coordinate.
    pub fn node_at(&self, coord: Coord) -> Option<NodeIndex> {
        self.node_lookup.get(&coord.key()).copied()
    }

    /// The edge directly downstream of an edge.
    pub fn downstream_of(&self, edge: EdgeIndex) -> Option<EdgeIndex> {
        self.nodes[self.edges[edge.0].to.0].downstream_edge()
    }

    /// Nodes with no incoming edges.
    pub fn headwaters(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_headwater())
            .map(|(i, _)| NodeIndex(i))
    }

    /// Nodes with no outgoing edges.
    pub fn mouths(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_mouth())
            .map(|(i, _)| NodeIndex(i))
    }

    /// Species of this run.
    pub fn species(&self) -> &SpeciesTable {
        &self.species
    }

    /// Attached barriers, ordered by id.
    pub fn barriers(&self) -> impl Iterator<Item = &Barrier> {
        self.barriers.values()
    }

    /// Number of attached barriers.
    pub fn barrier_count(&self) -> usize {
        self.barriers.len()
    }

    /// Get an attached barrier.
    pub fn barrier(&self, id: &BarrierId) -> Option<&Barrier> {
        self.barriers.get(id)
    }

    /// Node a barrier is attached to.
    pub fn barrier_node(&self, id: &BarrierId) -> Option<NodeIndex> {
        self.barrier_nodes.get(id).copied()
    }

    /// Counters from construction.
    pub fn build_stats(&self) -> BuildStats {
        self.build_stats
    }
}
