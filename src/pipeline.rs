//! Watershed run pipeline.
//!
//! Runs every analysis stage against one spatial store, in order:
//!
//! ```text
//! load → split at barriers → build
//!      → [smooth → mainstem → vertex gradient → break points → split → rebuild]
//!      → smooth → mainstem → gradients → attach barriers → aggregate → classify
//!      → habitat → upstream lengths → dci → stats → write
//! ```
//!
//! The bracketed stages run only when splitting at gradient breaks is
//! enabled. When no segment is split there, the profile from the first pass
//! is reused instead of being computed again. Any stage error aborts the run
//! before anything is written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{
    aggregate_barriers, assign_habitat, classify_accessibility, compute_dci,
    compute_segment_gradients, compute_upstream_lengths, compute_vertex_gradients,
    find_break_points, gradient_barriers, resolve_mainstems, smooth_elevations, watershed_stats,
    SpeciesDci, VertexGradient, WatershedStats,
};
use crate::config::{ConfigError, EngineConfig};
use crate::network::{Network, NetworkError, NetworkSnapshot, PassStats};
use crate::store::{barrier_split_points, SpatialStore};
use crate::types::{
    Accessibility, BarrierId, BarrierKind, BreakPoint, Coord, EdgeId, MainstemId, SpeciesCode,
    SpeciesTable, SplitPoint, Vertex,
};

/// Error type for a watershed run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Network construction or traversal failed.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),
    /// Invalid engine configuration.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// Store error.
    #[error("Store error: {0}")]
    StoreError(String),
}

impl PipelineError {
    /// Create a store error from any error type.
    pub fn from_store<E: std::error::Error>(e: E) -> Self {
        Self::StoreError(e.to_string())
    }
}

/// Per-species result for one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesEdgeResult {
    /// Species code.
    pub species: SpeciesCode,
    /// Accessibility label.
    pub accessibility: Option<Accessibility>,
    /// Spawning habitat.
    pub spawning: bool,
    /// Rearing habitat.
    pub rearing: bool,
    /// Habitat.
    pub habitat: bool,
    /// Impassable barriers upstream.
    pub barriers_up: Vec<BarrierId>,
    /// Impassable barriers downstream.
    pub barriers_down: Vec<BarrierId>,
    /// Number of barriers upstream.
    pub barrier_up_count: usize,
    /// Number of barriers downstream.
    pub barrier_down_count: usize,
    /// Number of gradient barriers upstream.
    pub gradient_barrier_up_count: usize,
    /// Number of gradient barriers downstream.
    pub gradient_barrier_down_count: usize,
    /// Accessible length upstream, inclusive.
    pub accessible_up: f64,
    /// Habitat length upstream, inclusive.
    pub habitat_up: f64,
    /// Habitat length upstream before the next impassable barrier.
    pub functional_habitat_up: f64,
    /// Contribution to the species DCI.
    pub dci: f64,
}

/// Result for one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeResult {
    /// Edge id.
    pub id: EdgeId,
    /// Segment length.
    pub length: f64,
    /// Mainstem id.
    pub mainstem: Option<MainstemId>,
    /// Downstream route measure.
    pub downstream_measure: f64,
    /// Upstream route measure.
    pub upstream_measure: f64,
    /// Geometry with smoothed elevations.
    pub smoothed_geometry: Vec<Vertex>,
    /// Gradient per vertex.
    pub vertex_gradients: Vec<Option<f64>>,
    /// Segment gradient.
    pub segment_gradient: Option<f64>,
    /// Maximum vertex gradient.
    pub max_vertex_gradient: Option<f64>,
    /// Maximum segment gradient downstream.
    pub max_downstream_gradient: Option<f64>,
    /// Results per species, in species table order.
    pub species: Vec<SpeciesEdgeResult>,
}

/// Per-species result for one barrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesBarrierResult {
    /// Species code.
    pub species: SpeciesCode,
    /// Impassable barriers upstream.
    pub barriers_up: Vec<BarrierId>,
    /// Impassable barriers downstream.
    pub barriers_down: Vec<BarrierId>,
    /// Number of barriers upstream.
    pub barrier_up_count: usize,
    /// Number of barriers downstream.
    pub barrier_down_count: usize,
    /// Accessible length upstream.
    pub accessible_up: f64,
    /// Habitat length upstream.
    pub habitat_up: f64,
    /// Habitat length upstream before the next impassable barrier.
    pub functional_habitat_up: f64,
    /// Marginal DCI; `None` when the species' DCI was skipped.
    pub dci: Option<f64>,
}

/// Result for one barrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierResult {
    /// Barrier id.
    pub id: BarrierId,
    /// Barrier kind.
    pub kind: BarrierKind,
    /// Barrier name.
    pub name: Option<String>,
    /// Junction position.
    pub position: Coord,
    /// Edges flowing into the barrier's junction.
    pub upstream_edges: Vec<EdgeId>,
    /// Edge flowing out of the barrier's junction.
    pub downstream_edge: Option<EdgeId>,
    /// Results per species, in species table order.
    pub species: Vec<SpeciesBarrierResult>,
}

/// Everything a run writes back to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatershedResults {
    /// Fingerprint of the analysed network.
    pub snapshot: NetworkSnapshot,
    /// Hash of the engine config.
    pub config_hash: String,
    /// Per-edge results, in network order.
    pub edges: Vec<EdgeResult>,
    /// Per-barrier results, ordered by id.
    pub barriers: Vec<BarrierResult>,
    /// Vertex gradients, ordered by mainstem then measure.
    pub vertex_gradients: Vec<VertexGradient>,
    /// Gradient break points.
    pub break_points: Vec<BreakPoint>,
    /// DCI per species.
    pub dci: Vec<SpeciesDci>,
    /// Summary statistics.
    pub stats: WatershedStats,
}

/// Passes run by one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage name.
    pub stage: String,
    /// Propagation passes.
    pub passes: Vec<PassStats>,
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Fingerprint of the analysed network.
    pub snapshot: NetworkSnapshot,
    /// Hash of the engine config.
    pub config_hash: String,
    /// Stages with propagation passes, in run order.
    pub stages: Vec<StageReport>,
    /// Gradient break points found.
    pub break_points: usize,
    /// Segments added by splitting.
    pub segments_added: usize,
    /// Barriers attached to the network.
    pub barriers_attached: usize,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
}

/// One watershed run against a store.
pub struct WatershedRun<S: SpatialStore> {
    store: S,
    config: EngineConfig,
    stages: Vec<StageReport>,
}

impl<S: SpatialStore> WatershedRun<S> {
    /// Create a run.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            stages: Vec::new(),
        }
    }

    /// Borrow the store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Take the store back.
    pub fn into_store(self) -> S {
        self.store
    }

    fn record(&mut self, stage: &str, passes: Vec<PassStats>) {
        self.stages.push(StageReport {
            stage: stage.to_string(),
            passes,
        });
    }

    fn load_network(&self, species: &SpeciesTable) -> Result<Network, PipelineError> {
        let records = self.store.load_streams().map_err(PipelineError::from_store)?;
        let _span = tracing::info_span!("stage", name = "build").entered();
        let network = Network::build_with(records, species.clone(), &self.config)?;
        tracing::info!(
            nodes = network.node_count(),
            edges = network.edge_count(),
            "network loaded"
        );
        Ok(network)
    }

    // smooth → mainstem → vertex gradients
    fn profile(&mut self, network: &mut Network) -> Result<Vec<VertexGradient>, PipelineError> {
        {
            let _span = tracing::info_span!("stage", name = "smooth").entered();
            let stats = smooth_elevations(network)?;
            self.record("smooth", vec![stats.upstream, stats.downstream]);
        }
        {
            let _span = tracing::info_span!("stage", name = "mainstem").entered();
            let stats = resolve_mainstems(network)?;
            tracing::info!(mainstems = stats.mainstems, "mainstems resolved");
            self.record("mainstem", vec![stats.downstream, stats.upstream]);
        }
        let _span = tracing::info_span!("stage", name = "vertex_gradient").entered();
        Ok(compute_vertex_gradients(network, &self.config))
    }

    /// Execute every stage and write the results.
    pub fn run(&mut self) -> Result<RunReport, PipelineError> {
        self.config.validate()?;
        self.stages.clear();
        let started_at = Utc::now();
        let config_hash = self.config.params_hash();
        tracing::info!(config_hash = %config_hash, "watershed run started");

        let species = SpeciesTable::new(self.store.load_species().map_err(PipelineError::from_store)?);
        let physical = self.store.load_barriers().map_err(PipelineError::from_store)?;

        let mut segments_added = 0;
        {
            let records = self.store.load_streams().map_err(PipelineError::from_store)?;
            let points = barrier_split_points(&records, &physical);
            if !points.is_empty() {
                let _span = tracing::info_span!("stage", name = "split_barriers").entered();
                segments_added = self
                    .store
                    .split_streams(&points)
                    .map_err(PipelineError::from_store)?;
                tracing::info!(barriers = points.len(), segments_added, "streams split at barriers");
            }
        }
        let mut network = self.load_network(&species)?;

        let mut break_points = None;
        let mut gradients = None;
        if self.config.split_at_gradient_breaks {
            let profiled = self.profile(&mut network)?;
            let found = find_break_points(&network, &profiled);
            let points: Vec<SplitPoint> = found.iter().map(SplitPoint::from).collect();
            let added = if points.is_empty() {
                0
            } else {
                let _span = tracing::info_span!("stage", name = "split").entered();
                let added = self
                    .store
                    .split_streams(&points)
                    .map_err(PipelineError::from_store)?;
                tracing::info!(break_points = found.len(), segments_added = added, "streams split");
                added
            };
            if added > 0 {
                segments_added += added;
                network = self.load_network(&species)?;
            } else {
                gradients = Some(profiled);
            }
            break_points = Some(found);
        }

        let vertex_gradients = match gradients {
            Some(profiled) => profiled,
            None => self.profile(&mut network)?,
        };
        {
            let _span = tracing::info_span!("stage", name = "segment_gradient").entered();
            let stats = compute_segment_gradients(&mut network)?;
            self.record("segment_gradient", vec![stats]);
        }
        let break_points = match break_points {
            Some(found) => found,
            None => find_break_points(&network, &vertex_gradients),
        };

        let barriers_attached = {
            let _span = tracing::info_span!("stage", name = "attach_barriers").entered();
            let synthetic = gradient_barriers(&break_points, network.species());
            let total = physical.len() + synthetic.len();
            let attached = network.attach_barriers(physical.into_iter().chain(synthetic));
            if attached < total {
                tracing::warn!(attached, skipped = total - attached, "barriers not attached");
            }
            attached
        };
        let snapshot = NetworkSnapshot::compute(&network);

        {
            let _span = tracing::info_span!("stage", name = "aggregate_barriers").entered();
            let stats = aggregate_barriers(&mut network)?;
            self.record("aggregate_barriers", vec![stats.downstream, stats.upstream]);
        }
        {
            let _span = tracing::info_span!("stage", name = "accessibility").entered();
            classify_accessibility(&mut network);
        }
        {
            let _span = tracing::info_span!("stage", name = "habitat").entered();
            assign_habitat(&mut network);
            let stats = compute_upstream_lengths(&mut network)?;
            self.record("upstream_lengths", vec![stats]);
        }
        let dci = {
            let _span = tracing::info_span!("stage", name = "dci").entered();
            compute_dci(&mut network)
        };
        let stats = watershed_stats(&network);

        let results = WatershedResults {
            snapshot: snapshot.clone(),
            config_hash: config_hash.clone(),
            edges: edge_results(&network),
            barriers: barrier_results(&network, &dci),
            vertex_gradients,
            break_points,
            dci,
            stats,
        };
        {
            let _span = tracing::info_span!("stage", name = "write").entered();
            self.store
                .write_results(&results)
                .map_err(PipelineError::from_store)?;
        }

        let finished_at = Utc::now();
        tracing::info!(
            snapshot_id = %snapshot.snapshot_id,
            edges = results.edges.len(),
            barriers = results.barriers.len(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "watershed run complete"
        );
        Ok(RunReport {
            snapshot,
            config_hash,
            stages: self.stages.clone(),
            break_points: results.break_points.len(),
            segments_added,
            barriers_attached,
            started_at,
            finished_at,
        })
    }
}

/// Collect per-edge results.
pub fn edge_results(network: &Network) -> Vec<EdgeResult> {
    let codes: Vec<SpeciesCode> = network.species().iter().map(|(_, s)| s.code.clone()).collect();
    network
        .edges()
        .iter()
        .map(|edge| EdgeResult {
            id: edge.id(),
            length: edge.length,
            mainstem: edge.mainstem,
            downstream_measure: edge.downstream_measure,
            upstream_measure: edge.upstream_measure(),
            smoothed_geometry: edge.smoothed_geometry(),
            vertex_gradients: edge.vertex_gradients.clone(),
            segment_gradient: edge.segment_gradient,
            max_vertex_gradient: edge.max_vertex_gradient,
            max_downstream_gradient: edge.max_downstream_gradient,
            species: edge
                .species
                .iter()
                .zip(&codes)
                .map(|(state, code)| SpeciesEdgeResult {
                    species: code.clone(),
                    accessibility: state.accessibility,
                    spawning: state.spawning,
                    rearing: state.rearing,
                    habitat: state.habitat,
                    barriers_up: state.barriers_up.iter().copied().collect(),
                    barriers_down: state.barriers_down.iter().copied().collect(),
                    barrier_up_count: state.barriers_up.len(),
                    barrier_down_count: state.barriers_down.len(),
                    gradient_barrier_up_count: state.gradient_barriers_up.len(),
                    gradient_barrier_down_count: state.gradient_barriers_down.len(),
                    accessible_up: state.upstream.accessible,
                    habitat_up: state.upstream.habitat,
                    functional_habitat_up: state.upstream.functional_habitat,
                    dci: state.dci,
                })
                .collect(),
        })
        .collect()
}

/// Collect per-barrier results.
///
/// Upstream values sum over the edges flowing into the barrier's junction;
/// downstream barriers come from the edge flowing out of it.
pub fn barrier_results(network: &Network, dci: &[SpeciesDci]) -> Vec<BarrierResult> {
    network
        .barriers()
        .filter_map(|barrier| {
            let node = network.node(network.barrier_node(&barrier.id)?);
            let below = node.downstream_edge().map(|e| network.edge(e));
            let species = network
                .species()
                .iter()
                .map(|(s, sp)| {
                    let mut barriers_up = std::collections::BTreeSet::new();
                    let (mut accessible_up, mut habitat_up, mut functional_habitat_up) = (0.0, 0.0, 0.0);
                    for e in node.in_edges() {
                        let state = network.edge(*e).species_state(s);
                        barriers_up.extend(state.barriers_up.iter().copied());
                        accessible_up += state.upstream.accessible;
                        habitat_up += state.upstream.habitat;
                        functional_habitat_up += state.upstream.functional_habitat;
                    }
                    let barriers_down: Vec<BarrierId> = below
                        .map(|e| e.species_state(s).barriers_down.iter().copied().collect())
                        .unwrap_or_default();
                    SpeciesBarrierResult {
                        species: sp.code.clone(),
                        barrier_up_count: barriers_up.len(),
                        barrier_down_count: barriers_down.len(),
                        barriers_up: barriers_up.into_iter().collect(),
                        barriers_down,
                        accessible_up,
                        habitat_up,
                        functional_habitat_up,
                        dci: dci
                            .iter()
                            .find(|d| d.species == sp.code)
                            .and_then(|d| d.barriers.get(&barrier.id).copied()),
                    }
                })
                .collect();

            Some(BarrierResult {
                id: barrier.id,
                kind: barrier.kind,
                name: barrier.name.clone(),
                position: barrier.position,
                upstream_edges: node.in_edges().iter().map(|e| network.edge(*e).id()).collect(),
                downstream_edge: below.map(|e| e.id()),
                species,
            })
        })
        .collect()
}
