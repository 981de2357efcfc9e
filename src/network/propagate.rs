//! Topological propagation over the stream network.
//!
//! A pass visits every node exactly once, and only after all of the node's
//! inbound edges (for the pass direction) have been visited:
//!
//! - **Downstream**: seeded at headwaters, inbound = incoming edges
//! - **Upstream**: seeded at mouths, inbound = outgoing edges
//!
//! Each node keeps a pending-edge counter; a node enters the worklist when
//! its counter reaches zero. After the visit callback returns, the node's
//! outbound edges are marked visited and their far nodes decremented.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use super::{EdgeIndex, Network, NetworkError, Node, NodeIndex};

/// Direction of a propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// From headwaters toward mouths.
    Downstream,
    /// From mouths toward headwaters.
    Upstream,
}

impl Direction {
    fn inbound(self, node: &Node) -> &[EdgeIndex] {
        match self {
            Self::Downstream => node.in_edges(),
            Self::Upstream => node.out_edges(),
        }
    }

    fn outbound(self, node: &Node) -> &[EdgeIndex] {
        match self {
            Self::Downstream => node.out_edges(),
            Self::Upstream => node.in_edges(),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downstream => write!(f, "downstream"),
            Self::Upstream => write!(f, "upstream"),
        }
    }
}

/// Counters reported by a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    /// Pass direction.
    pub direction: Direction,
    /// Nodes handed to the visit callback.
    pub nodes_visited: usize,
    /// Edges marked visited.
    pub edges_visited: usize,
}

/// Worklist propagator for one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propagator {
    direction: Direction,
}

impl Propagator {
    /// Create a propagator.
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }

    /// Headwaters-first pass.
    pub fn downstream() -> Self {
        Self::new(Direction::Downstream)
    }

    /// Mouths-first pass.
    pub fn upstream() -> Self {
        Self::new(Direction::Upstream)
    }

    /// Pass direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Run the pass, calling `visit` once per node.
    ///
    /// The callback may mutate node and edge attributes but not topology.
    /// Returns [`NetworkError::CycleDetected`] when an edge is reached twice
    /// or the worklist drains with edges left unvisited.
    pub fn run<F>(&self, network: &mut Network, mut visit: F) -> Result<PassStats, NetworkError>
    where
        F: FnMut(&mut Network, NodeIndex),
    {
        let direction = self.direction;
        for edge in network.edges.iter_mut() {
            edge.visited = false;
        }

        let mut pending: Vec<usize> = network
            .nodes
            .iter()
            .map(|n| direction.inbound(n).len())
            .collect();
        let mut queue: VecDeque<NodeIndex> = pending
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == 0)
            .map(|(i, _)| NodeIndex(i))
            .collect();

        let mut stats = PassStats {
            direction,
            nodes_visited: 0,
            edges_visited: 0,
        };

        while let Some(node) = queue.pop_front() {
            visit(network, node);
            stats.nodes_visited += 1;

            let fanout = direction.outbound(&network.nodes[node.0]).len();
            for k in 0..fanout {
                let index = direction.outbound(&network.nodes[node.0])[k];
                let edge = &mut network.edges[index.0];
                if edge.visited {
                    return Err(NetworkError::CycleDetected {
                        direction,
                        edges: vec![edge.id()],
                        nodes: vec![network.nodes[node.0].coord()],
                    });
                }
                edge.visited = true;
                stats.edges_visited += 1;

                let far = match direction {
                    Direction::Downstream => edge.to(),
                    Direction::Upstream => edge.from(),
                };
                pending[far.0] = pending[far.0].saturating_sub(1);
                if pending[far.0] == 0 {
                    queue.push_back(far);
                }
            }
        }

        if stats.edges_visited != network.edges.len() {
            let edges = network
                .edges
                .iter()
                .filter(|e| !e.visited)
                .map(|e| e.id())
                .collect();
            let nodes = pending
                .iter()
                .enumerate()
                .filter(|(_, count)| **count > 0)
                .map(|(i, _)| network.nodes[i].coord())
                .collect();
            return Err(NetworkError::CycleDetected { direction, edges, nodes });
        }

        tracing::trace!(
            %direction,
            nodes = stats.nodes_visited,
            edges = stats.edges_visited,
            "propagation pass complete"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EdgeId, Species, SpeciesTable, StreamRecord, Vertex};
    use uuid::Uuid;

    fn seg(n: u128, from: (f64, f64), to: (f64, f64)) -> StreamRecord {
        StreamRecord::new(
            EdgeId::new(Uuid::from_u128(n)),
            vec![Vertex::flat(from.0, from.1), Vertex::flat(to.0, to.1)],
        )
    }

    fn species() -> SpeciesTable {
        SpeciesTable::new(vec![Species::new("bt", "Bull Trout", 0.25)])
    }

    // Two tributaries joining, then a single outlet.
    fn confluence() -> Network {
        Network::build(
            vec![
                seg(1, (0.0, 3.0), (0.0, 2.0)),
                seg(2, (1.0, 3.0), (0.0, 2.0)),
                seg(3, (0.0, 2.0), (0.0, 1.0)),
                seg(4, (0.0, 1.0), (0.0, 0.0)),
            ],
            species(),
        )
        .unwrap()
    }

    #[test]
    fn test_downstream_visits_after_all_inflows() {
        let mut net = confluence();
        let mut order = Vec::new();
        let stats = Propagator::downstream()
            .run(&mut net, |net, node| {
                for e in net.node(node).in_edges() {
                    assert!(net.edge(*e).is_visited());
                }
                order.push(node);
            })
            .unwrap();

        assert_eq!(stats.nodes_visited, 5);
        assert_eq!(stats.edges_visited, 4);
        assert_eq!(order.len(), 5);
        let mouth = net.node_at(crate::types::Coord::new(0.0, 0.0)).unwrap();
        assert_eq!(order.last(), Some(&mouth));
    }

    #[test]
    fn test_upstream_starts_at_mouth() {
        let mut net = confluence();
        let mut order = Vec::new();
        let stats = Propagator::upstream()
            .run(&mut net, |net, node| {
                for e in net.node(node).out_edges() {
                    assert!(net.edge(*e).is_visited());
                }
                order.push(net.node(node).coord());
            })
            .unwrap();

        assert_eq!(stats.direction, Direction::Upstream);
        assert_eq!(stats.edges_visited, 4);
        assert_eq!(order[0], crate::types::Coord::new(0.0, 0.0));
        assert!(net.edges().iter().all(|e| e.is_visited()));
    }

    #[test]
    fn test_visited_flags_reset_between_passes() {
        let mut net = confluence();
        Propagator::downstream().run(&mut net, |_, _| {}).unwrap();
        let stats = Propagator::downstream().run(&mut net, |_, _| {}).unwrap();
        assert_eq!(stats.edges_visited, net.edge_count());
    }

    #[test]
    fn test_cycle_detected() {
        let mut net = Network::build(
            vec![
                seg(1, (0.0, 0.0), (1.0, 0.0)),
                seg(2, (1.0, 0.0), (0.0, 0.0)),
                seg(3, (5.0, 5.0), (6.0, 6.0)),
            ],
            species(),
        )
        .unwrap();

        let err = Propagator::downstream().run(&mut net, |_, _| {}).unwrap_err();
        match err {
            NetworkError::CycleDetected { direction, edges, nodes } => {
                assert_eq!(direction, Direction::Downstream);
                assert_eq!(edges.len(), 2);
                assert_eq!(nodes.len(), 2);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
