//! Stream segment records as extracted from the spatial store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::geometry::{planar_length, Vertex};
use super::ids::{EdgeId, SpeciesCode};

/// One stream segment as delivered by the spatial store.
///
/// Geometry is ordered in flow direction: the first vertex is the upstream
/// end, the last vertex the downstream end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    /// Segment identity.
    pub id: EdgeId,
    /// Segment length; derived from the planar geometry when absent.
    #[serde(default)]
    pub length: Option<f64>,
    /// Stream name.
    #[serde(default)]
    pub stream_name: Option<String>,
    /// Vertices with raw elevation.
    pub geometry: Vec<Vertex>,
    /// Mean annual discharge.
    #[serde(default)]
    pub discharge: Option<f64>,
    /// Channel confinement.
    #[serde(default)]
    pub channel_confinement: Option<f64>,
    /// Observed habitat flags per species; these override the habitat model.
    #[serde(default)]
    pub habitat: BTreeMap<SpeciesCode, bool>,
}

impl StreamRecord {
    /// Create a record from geometry alone.
    pub fn new(id: EdgeId, geometry: Vec<Vertex>) -> Self {
        Self {
            id,
            length: None,
            stream_name: None,
            geometry,
            discharge: None,
            channel_confinement: None,
            habitat: BTreeMap::new(),
        }
    }

    /// Set the stream name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.stream_name = Some(name.into());
        self
    }

    /// Set an explicit length.
    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }

    /// Flag observed habitat for a species.
    pub fn with_habitat(mut self, code: impl Into<SpeciesCode>, habitat: bool) -> Self {
        self.habitat.insert(code.into(), habitat);
        self
    }

    /// Effective length of the segment.
    pub fn effective_length(&self) -> f64 {
        self.length.unwrap_or_else(|| planar_length(&self.geometry))
    }
}
