//! Property tests over random stream forests.

use proptest::prelude::*;
use proptest::sample::Index;

use stream_connectivity::analysis::{
    aggregate_barriers, assign_habitat, classify_accessibility, compute_dci,
    compute_upstream_lengths, resolve_mainstems, smooth_elevations,
};
use stream_connectivity::{
    Accessibility, Barrier, BarrierId, BarrierKind, Coord, EdgeId, EdgeIndex, Network,
    Passability, Propagator, Species, SpeciesTable, StreamRecord, Vertex, NODATA,
};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Reach {
    parent: Index,
    length: f64,
    elevation: Option<f64>,
    interior: Option<f64>,
    habitat: bool,
}

#[derive(Debug, Clone)]
struct Obstruction {
    node: Index,
    kind: BarrierKind,
    passability: Passability,
}

fn reach() -> impl Strategy<Value = Reach> {
    (
        any::<Index>(),
        1.0..100.0f64,
        prop::option::weighted(0.9, 0.0..500.0f64),
        prop::option::of(0.0..500.0f64),
        any::<bool>(),
    )
        .prop_map(|(parent, length, elevation, interior, habitat)| Reach {
            parent,
            length,
            elevation,
            interior,
            habitat,
        })
}

fn obstruction() -> impl Strategy<Value = Obstruction> {
    let kind = prop_oneof![
        Just(BarrierKind::Dam),
        Just(BarrierKind::Waterfall),
        Just(BarrierKind::StreamCrossing),
        Just(BarrierKind::Gradient),
    ];
    let passability = prop_oneof![
        Just(Passability::Passable),
        Just(Passability::Barrier),
        (0.0..1.0f64).prop_map(Passability::Partial),
    ];
    (any::<Index>(), kind, passability).prop_map(|(node, kind, passability)| Obstruction {
        node,
        kind,
        passability,
    })
}

fn coord(node: usize) -> (f64, f64) {
    (node as f64, 0.0)
}

// Node 0 drains to the mouth; node k > 0 drains to a node below k.
fn make_network(reaches: &[Reach], obstructions: &[Obstruction]) -> Network {
    let z = |node: usize| match node {
        0 => Some(0.0),
        k => reaches[k - 1].elevation,
    };
    let vertex = |(x, y): (f64, f64), z: Option<f64>| Vertex::new(x, y, z.unwrap_or(NODATA));

    let mut records = vec![StreamRecord::new(
        EdgeId::new(Uuid::from_u128(1)),
        vec![vertex(coord(0), z(0)), Vertex::new(-1.0, 0.0, NODATA)],
    )
    .with_length(10.0)
    .with_habitat("bt", true)];

    for (i, r) in reaches.iter().enumerate() {
        let node = i + 1;
        let parent = r.parent.index(node);
        let (x0, _) = coord(node);
        let (x1, _) = coord(parent);
        records.push(
            StreamRecord::new(
                EdgeId::new(Uuid::from_u128(node as u128 + 1)),
                vec![
                    vertex(coord(node), z(node)),
                    Vertex::new((x0 + x1) / 2.0, 1.0 + node as f64, r.interior.unwrap_or(NODATA)),
                    vertex(coord(parent), z(parent)),
                ],
            )
            .with_length(r.length)
            .with_habitat("bt", r.habitat),
        );
    }

    let species = SpeciesTable::new(vec![
        Species::new("bt", "Bull Trout", 0.25),
        Species::new("ch", "Chinook", 0.5),
    ]);
    let mut net = Network::build(records, species).unwrap();

    let barriers = obstructions.iter().enumerate().map(|(i, o)| {
        let (x, y) = coord(o.node.index(reaches.len() + 1));
        Barrier::new(BarrierId::new(Uuid::from_u128(1000 + i as u128)), o.kind, Coord::new(x, y))
            .with_passability("bt", o.passability)
            .with_passability("ch", Passability::Passable)
    });
    net.attach_barriers(barriers);
    net
}

fn analysed(reaches: &[Reach], obstructions: &[Obstruction]) -> Network {
    let mut net = make_network(reaches, obstructions);
    smooth_elevations(&mut net).unwrap();
    resolve_mainstems(&mut net).unwrap();
    aggregate_barriers(&mut net).unwrap();
    classify_accessibility(&mut net);
    assign_habitat(&mut net);
    compute_upstream_lengths(&mut net).unwrap();
    net
}

fn known(z: f64) -> bool {
    z != NODATA
}

proptest! {
    #[test]
    fn prop_every_pass_visits_every_edge(
        reaches in prop::collection::vec(reach(), 0..40),
    ) {
        let mut net = make_network(&reaches, &[]);
        let edges = net.edge_count();

        let down = Propagator::downstream().run(&mut net, |_, _| {}).unwrap();
        prop_assert_eq!(down.edges_visited, edges);
        prop_assert_eq!(down.nodes_visited, net.node_count());

        let up = Propagator::upstream().run(&mut net, |_, _| {}).unwrap();
        prop_assert_eq!(up.edges_visited, edges);
        prop_assert_eq!(up.nodes_visited, net.node_count());
    }

    #[test]
    fn prop_smoothed_elevation_never_rises_downstream(
        reaches in prop::collection::vec(reach(), 0..40),
    ) {
        let mut net = make_network(&reaches, &[]);
        smooth_elevations(&mut net).unwrap();

        for edge in net.edges() {
            let top = net.node(edge.from()).elevation;
            let bottom = net.node(edge.to()).elevation;
            if known(top) && known(bottom) {
                prop_assert!(top >= bottom - 1e-9, "{} < {}", top, bottom);
            }
            for pair in edge.smoothed.windows(2) {
                if known(pair[0]) && known(pair[1]) {
                    prop_assert!(pair[0] >= pair[1] - 1e-9, "{:?}", edge.smoothed);
                }
            }
        }
    }

    #[test]
    fn prop_route_measures_continue_along_mainstem(
        reaches in prop::collection::vec(reach(), 0..40),
    ) {
        let mut net = make_network(&reaches, &[]);
        resolve_mainstems(&mut net).unwrap();

        for (i, edge) in net.edges().iter().enumerate() {
            prop_assert!(edge.mainstem.is_some());
            prop_assert!(edge.upstream_measure() > edge.downstream_measure);
            match net.downstream_of(EdgeIndex(i)) {
                Some(below) if net.edge(below).mainstem == edge.mainstem => {
                    let expected = net.edge(below).upstream_measure();
                    prop_assert!((edge.downstream_measure - expected).abs() < 1e-6);
                }
                _ => prop_assert_eq!(edge.downstream_measure, 0.0),
            }
        }
    }

    #[test]
    fn prop_accessibility_matches_barriers_below(
        reaches in prop::collection::vec(reach(), 0..30),
        obstructions in prop::collection::vec(obstruction(), 0..8),
    ) {
        let net = analysed(&reaches, &obstructions);

        for (i, edge) in net.edges().iter().enumerate() {
            for (s, _) in net.species().iter() {
                let state = edge.species_state(s);
                prop_assert!(state.gradient_barriers_down.is_subset(&state.barriers_down));
                let expected = if !state.gradient_barriers_down.is_empty() {
                    Accessibility::NotAccessible
                } else if !state.barriers_down.is_empty() {
                    Accessibility::PotentiallyAccessible
                } else {
                    Accessibility::Accessible
                };
                prop_assert_eq!(state.accessibility, Some(expected));

                // Nothing above an unreachable edge is reachable.
                if let Some(below) = net.downstream_of(EdgeIndex(i)) {
                    let below = net.edge(below).species_state(s);
                    prop_assert!(below.barriers_down.is_subset(&state.barriers_down));
                    if below.accessibility == Some(Accessibility::NotAccessible) {
                        prop_assert_eq!(state.accessibility, Some(Accessibility::NotAccessible));
                    }
                }
            }
        }
    }

    #[test]
    fn prop_dci_is_bounded_and_marginals_non_negative(
        reaches in prop::collection::vec(reach(), 0..30),
        obstructions in prop::collection::vec(obstruction(), 0..8),
    ) {
        let mut net = analysed(&reaches, &obstructions);
        let results = compute_dci(&mut net);

        for species in &results {
            prop_assert!(species.total_habitat > 0.0);
            prop_assert!(species.dci >= -1e-9 && species.dci <= 100.0 + 1e-6);
            prop_assert_eq!(species.barriers.len(), net.barrier_count());
            for marginal in species.barriers.values() {
                prop_assert!(*marginal >= 0.0);
                prop_assert!(species.dci + marginal <= 100.0 + 1e-6);
            }
        }
    }
}
