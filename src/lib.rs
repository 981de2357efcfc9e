//! # stream-connectivity
//!
//! Fish passage connectivity analysis over stream networks.
//!
//! For every stream segment the kernel answers:
//!
//! > Which barriers lie between this segment and the mouth, and what does
//! > each barrier cost the species that would use it?
//!
//! ## Core Contract
//!
//! 1. Build a directed forest from extracted stream segments (flow = downstream)
//! 2. Smooth elevations, resolve mainstems and find gradient break points
//! 3. Aggregate barriers upstream and downstream of every segment per species
//! 4. Classify accessibility, model habitat and compute the Dendritic
//!    Connectivity Index (DCI) with each barrier's marginal contribution
//!
//! ## Architecture
//!
//! ```text
//! SpatialStore → Network → Propagator passes → WatershedResults → SpatialStore
//!                               ↓
//!            elevation, mainstem, gradient, barriers, habitat, dci
//! ```
//!
//! ## Determinism Guarantees
//!
//! - Same records + same barriers + same config → identical results
//! - Ties in mainstem selection keep input order
//! - Mainstem ids derive from their downstream-most edge
//! - The network snapshot id is a canonical hash of sorted topology

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod canonical;
pub mod config;
pub mod network;
pub mod pipeline;
pub mod store;
pub mod telemetry;
pub mod types;

// Re-exports
pub use types::{
    Accessibility, Barrier, BarrierId, BarrierKind, BreakPoint, Coord, EdgeId, HabitatEnvelope,
    MainstemId, Passability, Range, Species, SpeciesCode, SpeciesIndex, SpeciesTable,
    SplitPoint, StreamRecord, Vertex,
};
pub use network::{
    Direction, Edge, EdgeIndex, Network, NetworkError, NetworkSnapshot, Node, NodeIndex,
    PassStats, Propagator,
};
pub use config::{ConfigError, EngineConfig};
pub use store::{barrier_split_points, InMemoryError, InMemorySpatialStore, SpatialStore, WatershedInput};
pub use pipeline::{
    BarrierResult, EdgeResult, PipelineError, RunReport, WatershedResults, WatershedRun,
};
pub use analysis::{SpeciesDci, VertexGradient, WatershedStats};
pub use canonical::{canonical_hash, canonical_hash_hex, to_canonical_bytes};
pub use telemetry::{init_tracing, LogFormat};

/// Sentinel for unknown elevation.
pub const NODATA: f64 = -999999.0;

/// Schema version of persisted results and snapshots.
pub const SCHEMA_VERSION: &str = "1.0.0";
