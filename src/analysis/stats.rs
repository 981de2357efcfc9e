//! Watershed summary statistics.

use serde::{Deserialize, Serialize};

use crate::network::Network;
use crate::types::{Accessibility, SpeciesCode};

/// Habitat summary for one species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesStats {
    /// Species code.
    pub species: SpeciesCode,
    /// Habitat length on accessible edges.
    pub accessible_habitat: f64,
    /// Habitat length on potentially accessible edges.
    pub potentially_accessible_habitat: f64,
    /// All habitat length.
    pub total_habitat: f64,
    /// `accessible / (accessible + potentially accessible)`, when defined.
    pub connectivity_status: Option<f64>,
}

/// Summary of one watershed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatershedStats {
    /// Total length of all edges.
    pub total_length: f64,
    /// Per-species habitat summary, in species table order.
    pub species: Vec<SpeciesStats>,
}

/// Summarize habitat and accessibility.
pub fn watershed_stats(network: &Network) -> WatershedStats {
    let total_length = network.edges().iter().map(|e| e.length).sum();

    let species = network
        .species()
        .iter()
        .map(|(s, sp)| {
            let mut accessible_habitat = 0.0;
            let mut potentially_accessible_habitat = 0.0;
            let mut total_habitat = 0.0;
            for edge in network.edges() {
                let state = edge.species_state(s);
                if !state.habitat {
                    continue;
                }
                total_habitat += edge.length;
                match state.accessibility {
                    Some(Accessibility::Accessible) => accessible_habitat += edge.length,
                    Some(Accessibility::PotentiallyAccessible) => {
                        potentially_accessible_habitat += edge.length
                    }
                    _ => {}
                }
            }
            let reachable = accessible_habitat + potentially_accessible_habitat;
            SpeciesStats {
                species: sp.code.clone(),
                accessible_habitat,
                potentially_accessible_habitat,
                total_habitat,
                connectivity_status: (reachable > 0.0).then(|| accessible_habitat / reachable),
            }
        })
        .collect();

    WatershedStats {
        total_length,
        species,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::EdgeIndex;
    use crate::types::{EdgeId, Species, SpeciesIndex, SpeciesTable, StreamRecord, Vertex};
    use uuid::Uuid;

    #[test]
    fn test_connectivity_status() {
        let records = (0..3u128)
            .map(|n| {
                let x = n as f64;
                StreamRecord::new(EdgeId::new(Uuid::from_u128(n + 1)), vec![Vertex::flat(x, 1.0), Vertex::flat(x, 0.0)])
                    .with_length(10.0 * (n + 1) as f64)
            })
            .collect();
        let mut net = Network::build(
            records,
            SpeciesTable::new(vec![Species::new("bt", "Bull Trout", 0.25), Species::new("rb", "Rainbow", 0.3)]),
        )
        .unwrap();
        let labels = [
            Accessibility::Accessible,
            Accessibility::PotentiallyAccessible,
            Accessibility::NotAccessible,
        ];
        for (i, label) in labels.iter().enumerate() {
            let state = &mut net.edge_mut(EdgeIndex(i)).species[0];
            state.accessibility = Some(*label);
            state.habitat = true;
        }

        let stats = watershed_stats(&net);
        assert_eq!(stats.total_length, 60.0);
        let bt = &stats.species[SpeciesIndex(0).0];
        assert_eq!(bt.accessible_habitat, 10.0);
        assert_eq!(bt.potentially_accessible_habitat, 20.0);
        assert_eq!(bt.total_habitat, 60.0);
        assert!((bt.connectivity_status.unwrap() - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(stats.species[1].connectivity_status, None);
    }
}
