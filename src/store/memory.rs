//! In-memory spatial store for testing and embedding.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::SpatialStore;
use crate::pipeline::WatershedResults;
use crate::types::{planar_length, Barrier, Coord, EdgeId, Species, SplitPoint, StreamRecord};

/// Error type for in-memory store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InMemoryError {
    /// Split point on an edge the store does not hold.
    #[error("Stream segment not found: {0}")]
    EdgeNotFound(EdgeId),
    /// Split point position matches no vertex of its edge.
    #[error("No vertex of {edge} at {position}")]
    VertexNotFound {
        /// Edge named by the split point.
        edge: EdgeId,
        /// Split point position.
        position: Coord,
    },
}

/// Extracted watershed data, as loaded into an [`InMemorySpatialStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatershedInput {
    /// Species parameters.
    #[serde(default)]
    pub species: Vec<Species>,
    /// Stream segments, upstream vertex first.
    pub streams: Vec<StreamRecord>,
    /// Snapped barriers.
    #[serde(default)]
    pub barriers: Vec<Barrier>,
}

/// In-memory spatial store.
///
/// Streams keep insertion order; a split replaces a segment in place with
/// its pieces, upstream piece first.
#[derive(Debug, Clone, Default)]
pub struct InMemorySpatialStore {
    species: Vec<Species>,
    streams: Vec<StreamRecord>,
    barriers: Vec<Barrier>,
    results: Option<WatershedResults>,
}

impl InMemorySpatialStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding extracted watershed data.
    pub fn from_input(input: WatershedInput) -> Self {
        Self {
            species: input.species,
            streams: input.streams,
            barriers: input.barriers,
            results: None,
        }
    }

    /// Parse watershed data from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::from_input(serde_json::from_str(json)?))
    }

    /// Add a species.
    pub fn add_species(&mut self, species: Species) {
        self.species.push(species);
    }

    /// Add a stream segment.
    pub fn add_stream(&mut self, record: StreamRecord) {
        self.streams.push(record);
    }

    /// Add a barrier.
    pub fn add_barrier(&mut self, barrier: Barrier) {
        self.barriers.push(barrier);
    }

    /// Get all stream segments.
    pub fn streams(&self) -> &[StreamRecord] {
        &self.streams
    }

    /// Get number of stream segments.
    pub fn num_streams(&self) -> usize {
        self.streams.len()
    }

    /// Results of the last run, if any.
    pub fn results(&self) -> Option<&WatershedResults> {
        self.results.as_ref()
    }
}

// Split one record at the given interior vertex indices.
fn split_record(record: &StreamRecord, cuts: &BTreeSet<usize>) -> Vec<StreamRecord> {
    let total_planar = planar_length(&record.geometry);
    let mut bounds: Vec<usize> = vec![0];
    bounds.extend(cuts.iter().copied());
    bounds.push(record.geometry.len() - 1);

    bounds
        .windows(2)
        .enumerate()
        .map(|(part, w)| {
            let geometry = record.geometry[w[0]..=w[1]].to_vec();
            let length = record.length.map(|len| {
                if total_planar > 0.0 {
                    len * planar_length(&geometry) / total_planar
                } else {
                    len / (bounds.len() - 1) as f64
                }
            });
            StreamRecord {
                id: record.id.split_part(part),
                length,
                geometry,
                ..record.clone()
            }
        })
        .collect()
}

impl SpatialStore for InMemorySpatialStore {
    type Error = InMemoryError;

    fn load_species(&self) -> Result<Vec<Species>, Self::Error> {
        Ok(self.species.clone())
    }

    fn load_streams(&self) -> Result<Vec<StreamRecord>, Self::Error> {
        Ok(self.streams.clone())
    }

    fn load_barriers(&self) -> Result<Vec<Barrier>, Self::Error> {
        Ok(self.barriers.clone())
    }

    fn split_streams(&mut self, points: &[SplitPoint]) -> Result<usize, Self::Error> {
        let mut cuts: BTreeMap<EdgeId, BTreeSet<usize>> = BTreeMap::new();
        for bp in points {
            let record = self
                .streams
                .iter()
                .find(|r| r.id == bp.edge)
                .ok_or(InMemoryError::EdgeNotFound(bp.edge))?;
            let key = bp.position.key();
            let vertex = record
                .geometry
                .iter()
                .position(|v| v.coord().key() == key)
                .ok_or(InMemoryError::VertexNotFound {
                    edge: bp.edge,
                    position: bp.position,
                })?;
            // Endpoints are already junctions.
            if vertex > 0 && vertex + 1 < record.geometry.len() {
                cuts.entry(bp.edge).or_default().insert(vertex);
            }
        }

        let before = self.streams.len();
        let mut split = Vec::with_capacity(before + points.len());
        for record in self.streams.drain(..) {
            match cuts.get(&record.id) {
                Some(at) => split.extend(split_record(&record, at)),
                None => split.push(record),
            }
        }
        self.streams = split;

        let added = self.streams.len() - before;
        tracing::debug!(segments = cuts.len(), added, "streams split");
        Ok(added)
    }

    fn write_results(&mut self, results: &WatershedResults) -> Result<(), Self::Error> {
        self.results = Some(results.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vertex;
    use uuid::Uuid;

    fn eid(n: u128) -> EdgeId {
        EdgeId::new(Uuid::from_u128(n))
    }

    fn break_at(edge: EdgeId, x: f64, y: f64) -> SplitPoint {
        SplitPoint {
            edge,
            position: Coord::new(x, y),
        }
    }

    fn store() -> InMemorySpatialStore {
        let mut store = InMemorySpatialStore::new();
        store.add_stream(
            StreamRecord::new(
                eid(1),
                (0..5).map(|i| Vertex::new(0.0, 40.0 - 10.0 * i as f64, 10.0 - i as f64)).collect(),
            )
            .with_length(80.0)
            .with_name("Bow"),
        );
        store.add_stream(StreamRecord::new(eid(2), vec![Vertex::flat(5.0, 5.0), Vertex::flat(5.0, 0.0)]));
        store
    }

    #[test]
    fn test_split_at_interior_vertices() {
        let mut store = store();
        let added = store
            .split_streams(&[break_at(eid(1), 0.0, 10.0), break_at(eid(1), 0.0, 30.0), break_at(eid(1), 0.0, 10.0)])
            .unwrap();

        assert_eq!(added, 2);
        let streams = store.load_streams().unwrap();
        assert_eq!(streams.len(), 4);
        assert_eq!(streams[0].id, eid(1).split_part(0));
        assert_eq!(streams[0].geometry.len(), 2);
        assert_eq!(streams[1].geometry.len(), 3);
        assert_eq!(streams[2].geometry[0].coord(), Coord::new(0.0, 10.0));
        assert_eq!(streams[0].length, Some(20.0));
        assert_eq!(streams[1].length, Some(40.0));
        assert_eq!(streams[2].stream_name.as_deref(), Some("Bow"));
        assert_eq!(streams[3].id, eid(2));
    }

    #[test]
    fn test_endpoint_break_is_noop() {
        let mut store = store();
        assert_eq!(store.split_streams(&[break_at(eid(1), 0.0, 40.0)]).unwrap(), 0);
        assert_eq!(store.num_streams(), 2);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "species": [{"code": "bt", "name": "Bull Trout", "accessibility_gradient": 0.25}],
            "streams": [{
                "id": "00000000-0000-0000-0000-000000000001",
                "stream_name": "Bow",
                "geometry": [{"x": 0.0, "y": 1.0, "z": 5.0}, {"x": 0.0, "y": 0.0, "z": 4.0}]
            }]
        }"#;
        let store = InMemorySpatialStore::from_json(json).unwrap();
        assert_eq!(store.num_streams(), 1);
        assert_eq!(store.streams()[0].id, eid(1));
        assert_eq!(store.load_species().unwrap()[0].accessibility_gradient, Some(0.25));
        assert!(store.load_barriers().unwrap().is_empty());
    }

    #[test]
    fn test_split_errors() {
        let mut store = store();
        assert_eq!(
            store.split_streams(&[break_at(eid(9), 0.0, 0.0)]).unwrap_err(),
            InMemoryError::EdgeNotFound(eid(9))
        );
        assert!(matches!(
            store.split_streams(&[break_at(eid(1), 0.5, 10.0)]),
            Err(InMemoryError::VertexNotFound { .. })
        ));
        assert_eq!(store.num_streams(), 2);
    }
}
