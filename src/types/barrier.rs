//! Barrier types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::geometry::Coord;
use super::ids::{BarrierId, EdgeId, MainstemId, SpeciesCode};

/// Kind of barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierKind {
    /// Dam.
    Dam,
    /// Waterfall.
    Waterfall,
    /// Road or rail stream crossing (culvert, bridge).
    StreamCrossing,
    /// Synthetic barrier inferred from a gradient break point.
    Gradient,
}

impl BarrierKind {
    /// Whether the barrier was inferred from terrain steepness.
    ///
    /// Only these count toward the gradient barrier tallies that make a
    /// segment NOT ACCESSIBLE rather than POTENTIALLY ACCESSIBLE. Waterfalls
    /// and other physical structures are ordinary barriers.
    pub fn is_gradient(&self) -> bool {
        matches!(self, Self::Gradient)
    }
}

impl fmt::Display for BarrierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dam => write!(f, "dam"),
            Self::Waterfall => write!(f, "waterfall"),
            Self::StreamCrossing => write!(f, "stream_crossing"),
            Self::Gradient => write!(f, "gradient_barrier"),
        }
    }
}

/// Passability of a barrier for one species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Passability {
    /// Fish pass freely.
    Passable,
    /// Fish cannot pass.
    Barrier,
    /// Partially passable with a score in `[0, 1]`.
    Partial(f64),
}

impl Passability {
    /// Passability score in `[0, 1]`.
    pub fn score(&self) -> f64 {
        match self {
            Self::Passable => 1.0,
            Self::Barrier => 0.0,
            Self::Partial(s) if s.is_nan() => 0.0,
            Self::Partial(s) => s.clamp(0.0, 1.0),
        }
    }

    /// Whether the barrier is fully passable and should be ignored.
    pub fn is_passable(&self) -> bool {
        self.score() >= 1.0
    }
}

/// A barrier snapped onto a network junction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barrier {
    /// Barrier identifier.
    pub id: BarrierId,
    /// Barrier kind.
    pub kind: BarrierKind,
    /// Optional display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Snapped position; must coincide exactly with a network node.
    pub position: Coord,
    /// Passability per species. A species with no entry is treated as blocked.
    #[serde(default)]
    pub passability: BTreeMap<SpeciesCode, Passability>,
}

impl Barrier {
    /// Create a barrier with no passability entries.
    pub fn new(id: BarrierId, kind: BarrierKind, position: Coord) -> Self {
        Self {
            id,
            kind,
            name: None,
            position,
            passability: BTreeMap::new(),
        }
    }

    /// Set passability for a species.
    pub fn with_passability(mut self, code: impl Into<SpeciesCode>, passability: Passability) -> Self {
        self.passability.insert(code.into(), passability);
        self
    }

    /// Passability for a species, blocked when unknown.
    pub fn passability_for(&self, code: &SpeciesCode) -> Passability {
        self.passability.get(code).copied().unwrap_or(Passability::Barrier)
    }
}

/// A vertex where the gradient first exceeds the passable threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakPoint {
    /// Edge carrying the vertex.
    pub edge: EdgeId,
    /// Vertex index within the edge geometry.
    pub vertex: usize,
    /// Mainstem of the edge.
    pub mainstem: MainstemId,
    /// Downstream route measure of the vertex.
    pub downstream_measure: f64,
    /// Vertex position.
    pub position: Coord,
    /// Vertex gradient.
    pub gradient: f64,
}

/// A vertex at which a stream segment is cut into two.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitPoint {
    /// Edge carrying the vertex.
    pub edge: EdgeId,
    /// Vertex position.
    pub position: Coord,
}

impl From<&BreakPoint> for SplitPoint {
    fn from(bp: &BreakPoint) -> Self {
        Self {
            edge: bp.edge,
            position: bp.position,
        }
    }
}
