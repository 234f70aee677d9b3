//! Undirected skeleton graph keyed by voxel coordinates.
//!
//! Backed by a petgraph [`UnGraphMap`]. Its internal order is insertion
//! order, so every query that returns nodes, edges, components, cliques,
//! or paths sorts its result by coordinate. Results are the same on every
//! run regardless of how the graph was built.
//!
//! The graph is simple: no parallel edges and no self-loops.
//! [`SkeletonGraph::add_edge`] rejects self-loops with
//! [`SkeletonError::SelfLoop`].

use std::collections::{BTreeMap, BTreeSet};
use std::hash::RandomState;

use petgraph::algo;
use petgraph::graphmap::UnGraphMap;
use petgraph::visit::{Dfs, EdgeFiltered};

use crate::neighborhood::foreground_neighbors;
use crate::types::{BinaryVolume, SkeletonError, Voxel};

/// An owned undirected simple graph over voxel coordinates.
#[derive(Debug, Clone, Default)]
pub struct SkeletonGraph {
    graph: UnGraphMap<Voxel, ()>,
}

impl PartialEq for SkeletonGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes().eq(other.nodes()) && self.edges().eq(other.edges())
    }
}

impl Eq for SkeletonGraph {}

impl SkeletonGraph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the adjacency graph of a skeleton volume: one node per
    /// skeletal voxel, one edge per pair of 26-/8-adjacent skeletal voxels.
    #[must_use]
    pub fn from_volume(volume: &BinaryVolume) -> Self {
        let mut graph = Self::new();
        for voxel in volume.voxels() {
            graph.add_node(voxel);
            for n in foreground_neighbors(volume, voxel) {
                graph.graph.add_edge(voxel, n, ());
            }
        }
        graph
    }

    /// Build a graph from an edge list.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::SelfLoop`] if any edge joins a node to
    /// itself.
    pub fn from_edges<I: IntoIterator<Item = (Voxel, Voxel)>>(edges: I) -> Result<Self, SkeletonError> {
        let mut graph = Self::new();
        for (a, b) in edges {
            graph.add_edge(a, b)?;
        }
        Ok(graph)
    }

    /// Insert a node with no edges. Existing nodes are left untouched.
    pub fn add_node(&mut self, node: Voxel) {
        self.graph.add_node(node);
    }

    /// Insert an undirected edge, creating missing endpoints.
    ///
    /// Returns whether the edge was new.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::SelfLoop`] if `a == b`.
    pub fn add_edge(&mut self, a: Voxel, b: Voxel) -> Result<bool, SkeletonError> {
        if a == b {
            return Err(SkeletonError::SelfLoop { node: a });
        }
        Ok(self.graph.add_edge(a, b, ()).is_none())
    }

    /// Remove an undirected edge, keeping both endpoints as nodes.
    ///
    /// Returns whether the edge was present.
    pub fn remove_edge(&mut self, a: Voxel, b: Voxel) -> bool {
        self.graph.remove_edge(a, b).is_some()
    }

    /// Whether `a` and `b` are joined by an edge.
    #[must_use]
    pub fn contains_edge(&self, a: Voxel, b: Voxel) -> bool {
        self.graph.contains_edge(a, b)
    }

    /// Whether `node` is in the graph.
    #[must_use]
    pub fn contains_node(&self, node: Voxel) -> bool {
        self.graph.contains_node(node)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Degree of `node`; zero for nodes not in the graph.
    #[must_use]
    pub fn degree(&self, node: Voxel) -> usize {
        self.graph.neighbors(node).count()
    }

    /// All nodes in ascending order.
    pub fn nodes(&self) -> impl DoubleEndedIterator<Item = Voxel> {
        let mut nodes: Vec<Voxel> = self.graph.nodes().collect();
        nodes.sort_unstable();
        nodes.into_iter()
    }

    /// Neighbors of `node` in ascending order.
    pub fn neighbors(&self, node: Voxel) -> impl DoubleEndedIterator<Item = Voxel> {
        let mut neighbors: Vec<Voxel> = self.graph.neighbors(node).collect();
        neighbors.sort_unstable();
        neighbors.into_iter()
    }

    /// Every edge once, as `(smaller, larger)`, in ascending order.
    pub fn edges(&self) -> impl Iterator<Item = (Voxel, Voxel)> {
        let mut edges: Vec<(Voxel, Voxel)> = self
            .graph
            .all_edges()
            .map(|(a, b, _)| (a.min(b), a.max(b)))
            .collect();
        edges.sort_unstable();
        edges.into_iter()
    }

    /// Connected components, ordered by their smallest node.
    #[must_use]
    pub fn connected_components(&self) -> Vec<Self> {
        // Strongly connected components of an undirected graph are its
        // connected components.
        let mut groups = algo::tarjan_scc(&self.graph);
        for group in &mut groups {
            group.sort_unstable();
        }
        groups.sort_unstable_by_key(|g| g.first().copied());

        groups
            .into_iter()
            .map(|group| {
                let mut component = Self::new();
                for &node in &group {
                    component.add_node(node);
                    for n in self.graph.neighbors(node) {
                        component.graph.add_edge(node, n, ());
                    }
                }
                component
            })
            .collect()
    }

    /// Number of connected components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        algo::connected_components(&self.graph)
    }

    /// A basis of the cycle space.
    ///
    /// Each spanning tree is grown depth-first from the smallest unvisited
    /// node; every non-tree edge closes one fundamental cycle. A cycle is
    /// listed without repeating its first node. The basis has
    /// `edges - nodes + components` cycles.
    #[must_use]
    pub fn cycle_basis(&self) -> Vec<Vec<Voxel>> {
        let mut remaining: BTreeSet<Voxel> = self.nodes().collect();
        let mut cycles = Vec::new();

        while let Some(root) = remaining.pop_first() {
            let mut stack = vec![root];
            let mut pred = BTreeMap::from([(root, root)]);
            let mut used: BTreeMap<Voxel, BTreeSet<Voxel>> = BTreeMap::from([(root, BTreeSet::new())]);

            while let Some(z) = stack.pop() {
                let z_used = used.get(&z).cloned().unwrap_or_default();
                for nbr in self.neighbors(z) {
                    if !used.contains_key(&nbr) {
                        pred.insert(nbr, z);
                        stack.push(nbr);
                        used.insert(nbr, BTreeSet::from([z]));
                    } else if !z_used.contains(&nbr) {
                        let nbr_used = used.get(&nbr).cloned().unwrap_or_default();
                        let mut cycle = vec![nbr, z];
                        let mut p = pred.get(&z).copied().unwrap_or(z);
                        loop {
                            cycle.push(p);
                            if nbr_used.contains(&p) {
                                break;
                            }
                            let next = pred.get(&p).copied().unwrap_or(p);
                            if next == p {
                                break;
                            }
                            p = next;
                        }
                        cycles.push(cycle);
                        used.entry(nbr).or_default().insert(z);
                    }
                }
            }

            for node in pred.keys() {
                remaining.remove(node);
            }
        }
        cycles
    }

    /// Nodes whose removal disconnects their component.
    #[must_use]
    pub fn articulation_points(&self) -> BTreeSet<Voxel> {
        algo::articulation_points::articulation_points(&self.graph).into_iter().collect()
    }

    /// All maximal cliques, each sorted, in ascending order.
    #[must_use]
    pub fn maximal_cliques(&self) -> Vec<Vec<Voxel>> {
        let mut cliques: Vec<Vec<Voxel>> = algo::maximal_cliques(&self.graph)
            .into_iter()
            .map(|clique| {
                let mut clique: Vec<Voxel> = clique.into_iter().collect();
                clique.sort_unstable();
                clique
            })
            .collect();
        cliques.sort_unstable();
        cliques
    }

    /// Every simple path from `from` to `to` that touches `stops` only at
    /// its two ends, in ascending order.
    #[must_use]
    pub fn clean_paths(&self, from: Voxel, to: Voxel, stops: &BTreeSet<Voxel>) -> Vec<Vec<Voxel>> {
        if from == to || !self.contains_node(from) || !self.contains_node(to) {
            return Vec::new();
        }
        let blocked = |n: Voxel| n != from && n != to && stops.contains(&n);
        let view = EdgeFiltered::from_fn(&self.graph, |(a, b, _): (Voxel, Voxel, &())| {
            !blocked(a) && !blocked(b)
        });
        let mut paths: Vec<Vec<Voxel>> =
            algo::all_simple_paths::<Vec<Voxel>, _, RandomState>(&view, from, to, 0, None).collect();
        paths.sort_unstable();
        paths
    }

    /// Every simple path that starts at `from`, ends at another member of
    /// `stops`, and touches no stop in between.
    ///
    /// Paths are ordered by end node, then by the nodes along the way.
    /// Only the stops bordering the stop-free region around `from` are
    /// searched, so in a forest this is linear in the size of that region.
    #[must_use]
    pub fn clean_paths_from(&self, from: Voxel, stops: &BTreeSet<Voxel>) -> Vec<Vec<Voxel>> {
        if !self.contains_node(from) {
            return Vec::new();
        }
        let blocked = |n: Voxel| n != from && stops.contains(&n);
        let view = EdgeFiltered::from_fn(&self.graph, |(a, b, _): (Voxel, Voxel, &())| {
            !blocked(a) && !blocked(b)
        });

        let mut targets = BTreeSet::new();
        let mut dfs = Dfs::new(&view, from);
        while let Some(node) = dfs.next(&view) {
            targets.extend(self.graph.neighbors(node).filter(|&n| blocked(n)));
        }

        targets
            .into_iter()
            .flat_map(|to| self.clean_paths(from, to, stops))
            .collect()
    }
}
