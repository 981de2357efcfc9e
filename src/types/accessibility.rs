//! Accessibility labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-state accessibility of a segment for one species.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Accessibility {
    /// No barrier of any kind between the segment and the mouth.
    Accessible,
    /// Only removable or assessable barriers downstream.
    PotentiallyAccessible,
    /// A gradient barrier blocks passage downstream.
    NotAccessible,
}

impl Accessibility {
    /// Classify from downstream barrier counts.
    ///
    /// `barrier_down` counts every impassable barrier downstream, including
    /// gradient barriers; `gradient_down` counts the gradient barriers only.
    pub fn classify(gradient_down: usize, barrier_down: usize) -> Self {
        match (gradient_down, barrier_down) {
            (0, 0) => Self::Accessible,
            (0, _) => Self::PotentiallyAccessible,
            _ => Self::NotAccessible,
        }
    }

    /// Whether fish could reach the segment once removable barriers are fixed.
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Accessible | Self::PotentiallyAccessible)
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accessible => write!(f, "ACCESSIBLE"),
            Self::PotentiallyAccessible => write!(f, "POTENTIALLY ACCESSIBLE"),
            Self::NotAccessible => write!(f, "NOT ACCESSIBLE"),
        }
    }
}
