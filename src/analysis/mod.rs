//! Connectivity analysis stages.
//!
//! Each stage reads and writes node and edge attributes of a [`Network`]
//! through propagation passes. Stages must run in order:
//!
//! ```text
//! elevation → mainstem → gradient → barriers → accessibility → habitat → dci → stats
//! ```
//!
//! [`Network`]: crate::network::Network

pub mod accessibility;
pub mod barriers;
pub mod dci;
pub mod elevation;
pub mod gradient;
pub mod habitat;
pub mod mainstem;
pub mod stats;

pub use accessibility::classify_accessibility;
pub use barriers::{aggregate_barriers, AggregationStats};
pub use dci::{compute_dci, PassabilityProduct, SpeciesDci};
pub use elevation::{smooth_elevations, SmoothingStats};
pub use gradient::{
    compute_segment_gradients, compute_vertex_gradients, find_break_points, gradient_barriers,
    VertexGradient,
};
pub use habitat::{assign_habitat, compute_upstream_lengths};
pub use mainstem::{resolve_mainstems, MainstemStats};
pub use stats::{watershed_stats, SpeciesStats, WatershedStats};
