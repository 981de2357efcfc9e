//! Accessibility classification.

use std::collections::BTreeMap;

use crate::network::{EdgeIndex, Network};
use crate::types::{Accessibility, SpeciesCode};

/// Label every edge for every species from its downstream barrier sets.
///
/// Returns the number of edges per species and label.
pub fn classify_accessibility(network: &mut Network) -> BTreeMap<SpeciesCode, BTreeMap<Accessibility, usize>> {
    let mut counts: BTreeMap<SpeciesCode, BTreeMap<Accessibility, usize>> = BTreeMap::new();
    let codes: Vec<SpeciesCode> = network.species().iter().map(|(_, s)| s.code.clone()).collect();

    for i in 0..network.edge_count() {
        let edge = network.edge_mut(EdgeIndex(i));
        for (state, code) in edge.species.iter_mut().zip(&codes) {
            let label = Accessibility::classify(
                state.gradient_barriers_down.len(),
                state.barriers_down.len(),
            );
            state.accessibility = Some(label);
            *counts.entry(code.clone()).or_default().entry(label).or_default() += 1;
        }
    }

    for (code, labels) in &counts {
        tracing::debug!(species = %code, ?labels, "accessibility classified");
    }
    counts
}
