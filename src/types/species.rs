//! Fish species reference parameters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::ids::SpeciesCode;

/// Half-open numeric range `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    /// Inclusive lower bound.
    pub min: f64,
    /// Exclusive upper bound.
    pub max: f64,
}

impl Range {
    /// Create a range.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Check whether a value falls inside the range.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value < self.max
    }
}

/// Habitat envelope for one life stage (spawning or rearing).
///
/// Each criterion is optional; an absent criterion is not applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitatEnvelope {
    /// Gradient range (rise over run).
    pub gradient: Option<Range>,
    /// Discharge range (m³/s).
    pub discharge: Option<Range>,
    /// Channel confinement range.
    pub channel_confinement: Option<Range>,
}

impl HabitatEnvelope {
    /// Whether this envelope defines no criteria at all.
    pub fn is_empty(&self) -> bool {
        self.gradient.is_none() && self.discharge.is_none() && self.channel_confinement.is_none()
    }
}

/// Reference parameters for a fish species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// Species code.
    pub code: SpeciesCode,
    /// Display name.
    pub name: String,
    /// Maximum passable gradient. `None` means the parameter row is missing.
    pub accessibility_gradient: Option<f64>,
    /// Spawning habitat envelope.
    #[serde(default)]
    pub spawning: HabitatEnvelope,
    /// Rearing habitat envelope.
    #[serde(default)]
    pub rearing: HabitatEnvelope,
}

impl Species {
    /// Create a species with an accessibility threshold and no habitat envelope.
    pub fn new(code: impl Into<String>, name: impl Into<String>, accessibility_gradient: f64) -> Self {
        Self {
            code: SpeciesCode::new(code),
            name: name.into(),
            accessibility_gradient: Some(accessibility_gradient),
            spawning: HabitatEnvelope::default(),
            rearing: HabitatEnvelope::default(),
        }
    }

    /// Whether a habitat model can be evaluated for this species.
    pub fn has_habitat_envelope(&self) -> bool {
        !(self.spawning.is_empty() && self.rearing.is_empty())
    }
}

/// Position of a species in the per-species state vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpeciesIndex(pub usize);

/// The species of a run, resolved to dense indices once at run start.
#[derive(Debug, Clone, Default)]
pub struct SpeciesTable {
    species: Vec<Species>,
    by_code: BTreeMap<SpeciesCode, SpeciesIndex>,
}

impl SpeciesTable {
    /// Build a table. Later duplicates of a code are dropped.
    pub fn new(species: Vec<Species>) -> Self {
        let mut table = Self::default();
        for s in species {
            if table.by_code.contains_key(&s.code) {
                tracing::warn!(species = %s.code, "duplicate species code ignored");
                continue;
            }
            table.by_code.insert(s.code.clone(), SpeciesIndex(table.species.len()));
            table.species.push(s);
        }
        table
    }

    /// Number of species.
    pub fn len(&self) -> usize {
        self.species.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Look up a species index by code.
    pub fn index_of(&self, code: &SpeciesCode) -> Option<SpeciesIndex> {
        self.by_code.get(code).copied()
    }

    /// Get a species by index.
    pub fn get(&self, index: SpeciesIndex) -> &Species {
        &self.species[index.0]
    }

    /// Iterate `(index, species)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (SpeciesIndex, &Species)> {
        self.species.iter().enumerate().map(|(i, s)| (SpeciesIndex(i), s))
    }

    /// Minimum accessibility gradient over species that define one.
    pub fn min_accessibility_gradient(&self) -> Option<f64> {
        self.species
            .iter()
            .filter_map(|s| s.accessibility_gradient)
            .fold(None, |acc: Option<f64>, g| Some(acc.map_or(g, |a| a.min(g))))
    }
}
