//! Coordinates and vertices.
//!
//! Node identity is exact: two endpoints are the same junction only when
//! their coordinates are bitwise equal. Snapping to a tolerance is the job
//! of whoever prepares the geometry.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::NODATA;

/// A planar coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coord {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
}

impl Coord {
    /// Create a coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Exact lookup key for this coordinate.
    pub fn key(&self) -> CoordKey {
        CoordKey::from(*self)
    }

    /// Planar distance to another coordinate.
    pub fn distance(&self, other: &Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT({} {})", self.x, self.y)
    }
}

/// Hashable, totally ordered key for exact coordinate matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoordKey {
    x: u64,
    y: u64,
}

impl From<Coord> for CoordKey {
    fn from(c: Coord) -> Self {
        Self {
            x: normalized_bits(c.x),
            y: normalized_bits(c.y),
        }
    }
}

// -0.0 and 0.0 compare equal, so they must share a key.
fn normalized_bits(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// A 3D vertex. `z` may be [`NODATA`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Easting.
    pub x: f64,
    /// Northing.
    pub y: f64,
    /// Elevation, or NODATA.
    pub z: f64,
}

impl Vertex {
    /// Create a vertex.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Create a vertex with no elevation.
    pub fn flat(x: f64, y: f64) -> Self {
        Self { x, y, z: NODATA }
    }

    /// The planar part of this vertex.
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

/// Check whether an elevation is the NODATA sentinel.
pub fn is_nodata(z: f64) -> bool {
    z == NODATA || z.is_nan()
}

/// Planar length of a polyline.
pub fn planar_length(vertices: &[Vertex]) -> f64 {
    vertices
        .windows(2)
        .map(|w| w[0].coord().distance(&w[1].coord()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_zero_shares_key() {
        assert_eq!(Coord::new(0.0, 1.0).key(), Coord::new(-0.0, 1.0).key());
    }

    #[test]
    fn test_exact_match_only() {
        assert_ne!(Coord::new(1.0, 1.0).key(), Coord::new(1.0 + 1e-12, 1.0).key());
    }

    #[test]
    fn test_planar_length() {
        let line = [Vertex::flat(0.0, 0.0), Vertex::flat(3.0, 4.0), Vertex::flat(3.0, 6.0)];
        assert!((planar_length(&line) - 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_nodata() {
        assert!(is_nodata(NODATA));
        assert!(!is_nodata(0.0));
    }
}
