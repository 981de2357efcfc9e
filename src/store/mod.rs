//! Spatial storage backends.
//!
//! The engine never talks to a database or file format directly. A store
//! hands over already-extracted records and receives computed results.

pub mod memory;

use crate::pipeline::WatershedResults;
use crate::types::{Barrier, Species, SplitPoint, StreamRecord};

/// Trait for spatial storage backends.
///
/// Implementations must return records in a stable order; mainstem tie
/// breaking follows record order.
pub trait SpatialStore {
    /// Error type for store operations.
    type Error: std::error::Error;

    /// Load fish species parameters.
    fn load_species(&self) -> Result<Vec<Species>, Self::Error>;

    /// Load stream segments with raw elevation.
    fn load_streams(&self) -> Result<Vec<StreamRecord>, Self::Error>;

    /// Load barriers snapped to network junctions.
    fn load_barriers(&self) -> Result<Vec<Barrier>, Self::Error>;

    /// Split stream segments at the given vertices.
    ///
    /// Points on a segment endpoint are ignored. Returns the number of
    /// segments added.
    fn split_streams(&mut self, points: &[SplitPoint]) -> Result<usize, Self::Error>;

    /// Persist the results of a run.
    fn write_results(&mut self, results: &WatershedResults) -> Result<(), Self::Error>;
}

/// Interior vertices that carry a barrier.
///
/// A barrier snapped onto the middle of a segment can only be attached once
/// the segment is cut there. Barriers on segment endpoints need no split.
pub fn barrier_split_points(records: &[StreamRecord], barriers: &[Barrier]) -> Vec<SplitPoint> {
    let mut points = Vec::new();
    for barrier in barriers {
        let key = barrier.position.key();
        for record in records {
            let n = record.geometry.len();
            if n < 3 {
                continue;
            }
            if record.geometry[1..n - 1].iter().any(|v| v.coord().key() == key) {
                points.push(SplitPoint {
                    edge: record.id,
                    position: barrier.position,
                });
            }
        }
    }
    points
}

pub use memory::{InMemoryError, InMemorySpatialStore, WatershedInput};
