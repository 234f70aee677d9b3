//! Removal of redundant edges inside 3-node cliques.
//!
//! Full lattice adjacency joins voxels that touch diagonally, so a bend in
//! a unit-width skeleton shows up as a triangle: two axis steps and the
//! diagonal shortcut between them. Each maximal 3-clique loses its longest
//! edge(s). When all three edges are equally long, the edge whose
//! coordinate difference is zero along `y` is removed.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::graph::SkeletonGraph;
use crate::types::{SkeletonError, Voxel};

/// Remove the longest edge of every maximal 3-clique.
///
/// Cliques are found on the input graph and all selected edges are removed
/// together. A graph with no 3-cliques is returned unchanged.
///
/// # Errors
///
/// Returns [`SkeletonError::CliquePruneDisconnected`] if removing the
/// selected edges would change the number of connected components.
pub fn prune_clique_edges(graph: &SkeletonGraph) -> Result<SkeletonGraph, SkeletonError> {
    let triangles: Vec<Vec<Voxel>> = graph
        .maximal_cliques()
        .into_iter()
        .filter(|c| c.len() == 3)
        .collect();
    if triangles.is_empty() {
        return Ok(graph.clone());
    }

    let mut doomed = BTreeSet::new();
    for triangle in &triangles {
        doomed.extend(redundant_edges(triangle));
    }

    let mut pruned = graph.clone();
    for &(a, b) in &doomed {
        pruned.remove_edge(a, b);
    }

    let before = graph.component_count();
    let after = pruned.component_count();
    if before != after {
        return Err(SkeletonError::CliquePruneDisconnected { before, after });
    }

    debug!(
        triangles = triangles.len(),
        removed = doomed.len(),
        "pruned clique edges"
    );
    Ok(pruned)
}

/// The edges of a triangle to drop.
fn redundant_edges(triangle: &[Voxel]) -> Vec<(Voxel, Voxel)> {
    let pairs: Vec<(Voxel, Voxel)> = (0..triangle.len())
        .flat_map(|i| ((i + 1)..triangle.len()).map(move |j| (triangle[i], triangle[j])))
        .collect();
    let lengths: Vec<i64> = pairs.iter().map(|&(a, b)| a.distance_squared(b)).collect();

    let Some(&longest) = lengths.iter().max() else {
        return Vec::new();
    };
    if lengths.iter().any(|&l| l != longest) {
        return pairs
            .into_iter()
            .zip(lengths)
            .filter(|&(_, l)| l == longest)
            .map(|(pair, _)| pair)
            .collect();
    }

    // Equilateral: prefer the edge lying in a plane of constant y.
    if let Some(&pair) = pairs.iter().find(|(a, b)| a.y() == b.y()) {
        return vec![pair];
    }
    warn!(?triangle, "equilateral clique has no edge of constant y; keeping it");
    Vec::new()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{BinaryVolume, Shape};

    fn planar_graph(shape: (usize, usize), voxels: &[(i32, i32)]) -> SkeletonGraph {
        let volume = BinaryVolume::from_voxels(
            Shape::planar(shape.0, shape.1),
            voxels.iter().map(|&(y, x)| Voxel::planar(y, x)),
        );
        SkeletonGraph::from_volume(&volume)
    }

    #[test]
    fn corner_loses_its_diagonal() {
        let g = planar_graph((3, 3), &[(0, 0), (1, 0), (1, 1)]);
        assert_eq!(g.edge_count(), 3);
        let pruned = prune_clique_edges(&g).unwrap();
        assert_eq!(pruned.edge_count(), 2);
        assert!(!pruned.contains_edge(Voxel::planar(0, 0), Voxel::planar(1, 1)));
    }

    #[test]
    fn ring_becomes_a_simple_cycle() {
        let ring = [(0, 0), (0, 1), (0, 2), (1, 2), (2, 2), (2, 1), (2, 0), (1, 0)];
        let g = planar_graph((3, 3), &ring);
        let pruned = prune_clique_edges(&g).unwrap();
        assert_eq!(pruned.edge_count(), 8);
        assert!(pruned.nodes().all(|n| pruned.degree(n) == 2));
    }

    #[test]
    fn graph_without_triangles_is_unchanged() {
        let g = planar_graph((1, 5), &[(0, 0), (0, 1), (0, 2), (0, 3)]);
        assert_eq!(prune_clique_edges(&g).unwrap(), g);
    }

    #[test]
    fn larger_cliques_are_left_alone() {
        // A filled 2x2 square is a 4-clique, not a triangle.
        let g = planar_graph((2, 2), &[(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert_eq!(prune_clique_edges(&g).unwrap(), g);
    }

    #[test]
    fn equilateral_triangle_drops_constant_y_edge() {
        let a = Voxel::new(0, 0, 0);
        let b = Voxel::new(1, 1, 0);
        let c = Voxel::new(0, 1, 1);
        let g = SkeletonGraph::from_edges([(a, b), (b, c), (a, c)]).unwrap();
        let pruned = prune_clique_edges(&g).unwrap();
        assert_eq!(pruned.edge_count(), 2);
        assert!(!pruned.contains_edge(b, c));
    }

    #[test]
    fn pruning_keeps_components() {
        let g = planar_graph(
            (7, 7),
            &[(0, 0), (1, 0), (1, 1), (5, 5), (5, 6), (6, 6)],
        );
        let pruned = prune_clique_edges(&g).unwrap();
        assert_eq!(pruned.component_count(), 2);
        assert_eq!(pruned.edge_count(), 4);
    }
}
