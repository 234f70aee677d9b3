//! Minimum-cost routing over a voxel grid.
//!
//! Routes are computed inside a rectangular window of a label grid. Every
//! voxel of the window is a graph node and every pair of 8-/26-adjacent
//! voxels is an edge, so a route may cross background when the cost model
//! allows it. Moving between two voxels costs the mean of their voxel
//! costs times the Euclidean step length.
//!
//! # Strategy pattern
//!
//! The cost landscape is pluggable through the [`CostModel`] trait; the
//! [`CostModelKind`] enum selects a built-in model at runtime and is what
//! [`SkeletonConfig`](crate::SkeletonConfig) stores.

use std::collections::{BTreeMap, HashSet};

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::neighborhood::{BoundingBox, offsets};
use crate::types::{Grid, PointLabel, SkeletonConfig, SkeletonError, Voxel};

/// Per-voxel traversal cost.
pub trait CostModel {
    /// Cost of entering a voxel carrying `label`. Must be positive.
    fn cost(&self, label: PointLabel) -> f64;
}

/// Selects which cost landscape routes are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CostModelKind {
    /// Cost equals the numeric label code (end 1, middle 2, joint 3,
    /// crowded 4), background costs `background`.
    ///
    /// Routes prefer end and middle points over crowded ones, which pulls
    /// them toward the thin structure around a crowded region.
    LabelValue {
        /// Cost of a background voxel.
        background: f64,
    },

    /// Every skeletal voxel costs 1, background costs `background`.
    Uniform {
        /// Cost of a background voxel.
        background: f64,
    },
}

impl CostModelKind {
    /// The background penalty of this model.
    #[must_use]
    pub const fn background(&self) -> f64 {
        match *self {
            Self::LabelValue { background } | Self::Uniform { background } => background,
        }
    }
}

impl Default for CostModelKind {
    fn default() -> Self {
        Self::LabelValue {
            background: SkeletonConfig::DEFAULT_BACKGROUND_COST,
        }
    }
}

impl CostModel for CostModelKind {
    fn cost(&self, label: PointLabel) -> f64 {
        match (*self, label) {
            (
                Self::LabelValue { background } | Self::Uniform { background },
                PointLabel::Background,
            ) => background,
            (Self::LabelValue { .. }, l) => f64::from(l.code()),
            (Self::Uniform { .. }, _) => 1.0,
        }
    }
}

/// Find a minimum-cost route from `from` to `to` through the voxels of
/// `window`.
///
/// Returns the voxel sequence `[from, ..., to]`. Builds a fresh
/// [`RouteWindow`]; callers routing several pairs through the same window
/// should build one and reuse it.
///
/// # Errors
///
/// Returns [`SkeletonError::UnreachableRoute`] if either endpoint lies
/// outside the window or path reconstruction fails.
pub fn route<C: CostModel + ?Sized>(
    labels: &Grid<PointLabel>,
    window: BoundingBox,
    from: Voxel,
    to: Voxel,
    cost: &C,
) -> Result<Vec<Voxel>, SkeletonError> {
    RouteWindow::new(labels, window, cost)
        .routes_from(from, &[to])
        .map(|mut routes| routes.pop().unwrap_or_default())
}

/// The weighted grid graph of one window.
///
/// One node per voxel of the window (clipped to the grid), one edge per
/// adjacent pair, weighted by mean voxel cost times step length.
#[derive(Debug, Clone)]
pub struct RouteWindow {
    graph: UnGraph<Voxel, f64>,
    node_of: BTreeMap<Voxel, NodeIndex>,
}

impl RouteWindow {
    /// Build the grid graph of `window` over `labels`, weighted by `cost`.
    #[must_use]
    pub fn new<C: CostModel + ?Sized>(
        labels: &Grid<PointLabel>,
        window: BoundingBox,
        cost: &C,
    ) -> Self {
        let shape = labels.shape();
        let mut graph = UnGraph::<Voxel, f64>::new_undirected();
        let mut node_of = BTreeMap::new();

        for voxel in window.voxels().filter(|&v| shape.contains(v)) {
            node_of.insert(voxel, graph.add_node(voxel));
        }

        for (&voxel, &node) in &node_of {
            let c = cost.cost(labels.get(voxel).unwrap_or_default());
            for &delta in offsets(shape.dims) {
                let neighbor = voxel.offset(delta);
                // Each undirected pair once.
                if neighbor <= voxel {
                    continue;
                }
                let Some(&other) = node_of.get(&neighbor) else {
                    continue;
                };
                let c_other = cost.cost(labels.get(neighbor).unwrap_or_default());
                #[allow(clippy::cast_precision_loss)]
                let step = (voxel.distance_squared(neighbor) as f64).sqrt();
                graph.add_edge(node, other, 0.5 * (c + c_other) * step);
            }
        }

        Self { graph, node_of }
    }

    /// Minimum-cost routes from `from` to each of `goals`, in `goals` order.
    ///
    /// Runs Dijkstra once from `from` and reconstructs every route from the
    /// same cost map.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::UnreachableRoute`] for the first goal that
    /// lies outside the window or cannot be reconstructed, or if `from`
    /// lies outside the window.
    pub fn routes_from(
        &self,
        from: Voxel,
        goals: &[Voxel],
    ) -> Result<Vec<Vec<Voxel>>, SkeletonError> {
        let Some(&first) = goals.first() else {
            return Ok(Vec::new());
        };
        let Some(&start) = self.node_of.get(&from) else {
            return Err(SkeletonError::UnreachableRoute { from, to: first });
        };

        let costs = dijkstra(&self.graph, start, None, |e| *e.weight());
        let cost_of = |n: NodeIndex| costs.get(&n).copied();
        goals
            .iter()
            .map(|&to| {
                self.node_of
                    .get(&to)
                    .and_then(|&goal| self.walk_back(cost_of, start, goal))
                    .map(|path| path.into_iter().map(|n| self.graph[n]).collect())
                    .ok_or(SkeletonError::UnreachableRoute { from, to })
            })
            .collect()
    }

    /// Reconstruct the shortest path from `start` to `goal`.
    ///
    /// From `goal`, repeatedly step to a neighbor whose cost plus the edge
    /// weight equals the current cost. Edge weights are strictly positive,
    /// so costs decrease along the walk and it terminates at `start`.
    fn walk_back(
        &self,
        cost_of: impl Fn(NodeIndex) -> Option<f64>,
        start: NodeIndex,
        goal: NodeIndex,
    ) -> Option<Vec<NodeIndex>> {
        cost_of(goal)?;

        let mut visited = HashSet::new();
        let mut path = vec![goal];
        visited.insert(goal);
        let mut current = goal;
        while current != start {
            let current_cost = cost_of(current).unwrap_or(f64::INFINITY);
            let next = self.graph.edges(current).find_map(|edge| {
                let neighbor = edge.target();
                if visited.contains(&neighbor) {
                    return None;
                }
                let neighbor_cost = cost_of(neighbor).unwrap_or(f64::INFINITY);
                ((neighbor_cost + edge.weight() - current_cost).abs() < 1e-9).then_some(neighbor)
            })?;
            path.push(next);
            visited.insert(next);
            current = next;
        }
        path.reverse();
        Some(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Shape;

    fn labels_from(shape: Shape, entries: &[(Voxel, PointLabel)]) -> Grid<PointLabel> {
        let mut grid = Grid::new(shape);
        for &(v, l) in entries {
            grid.set(v, l);
        }
        grid
    }

    fn full_window(shape: Shape) -> BoundingBox {
        let mut bounds = BoundingBox::around(Voxel::new(0, 0, 0));
        bounds.include(shape.voxel(shape.len() - 1));
        bounds
    }

    fn is_connected_walk(path: &[Voxel]) -> bool {
        path.windows(2).all(|w| {
            let d = w[0].distance_squared(w[1]);
            (1..=3).contains(&d)
        })
    }

    #[test]
    fn label_value_costs() {
        let model = CostModelKind::default();
        assert!((model.cost(PointLabel::End) - 1.0).abs() < 1e-12);
        assert!((model.cost(PointLabel::Crowded) - 4.0).abs() < 1e-12);
        assert!((model.cost(PointLabel::Background) - 255.0).abs() < 1e-12);
    }

    #[test]
    fn uniform_costs() {
        let model = CostModelKind::Uniform { background: 50.0 };
        assert!((model.cost(PointLabel::Joint) - 1.0).abs() < 1e-12);
        assert!((model.cost(PointLabel::Background) - 50.0).abs() < 1e-12);
    }

    #[test]
    fn route_to_self_is_single_voxel() {
        let shape = Shape::planar(3, 3);
        let labels = Grid::new(shape);
        let v = Voxel::planar(1, 1);
        let path = route(&labels, full_window(shape), v, v, &CostModelKind::default()).unwrap();
        assert_eq!(path, vec![v]);
    }

    #[test]
    fn route_follows_structure_around_background() {
        // A U-shaped corridor: the direct line crosses expensive
        // background, the detour stays on structure.
        let shape = Shape::planar(3, 3);
        let corridor = [
            Voxel::planar(0, 0),
            Voxel::planar(1, 0),
            Voxel::planar(2, 0),
            Voxel::planar(2, 1),
            Voxel::planar(2, 2),
            Voxel::planar(1, 2),
            Voxel::planar(0, 2),
        ];
        let entries: Vec<_> = corridor.iter().map(|&v| (v, PointLabel::Middle)).collect();
        let labels = labels_from(shape, &entries);
        let path = route(
            &labels,
            full_window(shape),
            Voxel::planar(0, 0),
            Voxel::planar(0, 2),
            &CostModelKind::default(),
        )
        .unwrap();
        assert_eq!(path.first(), Some(&Voxel::planar(0, 0)));
        assert_eq!(path.last(), Some(&Voxel::planar(0, 2)));
        assert!(is_connected_walk(&path));
        for v in &path {
            assert_ne!(labels.get(*v), Some(PointLabel::Background));
        }
    }

    #[test]
    fn route_crosses_background_when_it_must() {
        let shape = Shape::planar(1, 3);
        let labels = labels_from(
            shape,
            &[
                (Voxel::planar(0, 0), PointLabel::End),
                (Voxel::planar(0, 2), PointLabel::End),
            ],
        );
        let path = route(
            &labels,
            full_window(shape),
            Voxel::planar(0, 0),
            Voxel::planar(0, 2),
            &CostModelKind::default(),
        )
        .unwrap();
        assert_eq!(
            path,
            vec![Voxel::planar(0, 0), Voxel::planar(0, 1), Voxel::planar(0, 2)]
        );
    }

    #[test]
    fn route_prefers_diagonal_step() {
        let shape = Shape::volumetric(2, 2, 2);
        let labels = Grid::filled(shape, PointLabel::Crowded);
        let path = route(
            &labels,
            full_window(shape),
            Voxel::new(0, 0, 0),
            Voxel::new(1, 1, 1),
            &CostModelKind::default(),
        )
        .unwrap();
        assert_eq!(path, vec![Voxel::new(0, 0, 0), Voxel::new(1, 1, 1)]);
    }

    #[test]
    fn endpoint_outside_window_is_unreachable() {
        let shape = Shape::planar(4, 4);
        let labels = Grid::filled(shape, PointLabel::Middle);
        let window = BoundingBox::around(Voxel::planar(0, 0));
        let result = route(
            &labels,
            window,
            Voxel::planar(0, 0),
            Voxel::planar(3, 3),
            &CostModelKind::default(),
        );
        assert!(matches!(result, Err(SkeletonError::UnreachableRoute { .. })));
    }

    #[test]
    fn one_window_serves_many_goals() {
        let shape = Shape::planar(3, 3);
        let corridor = [
            Voxel::planar(0, 0),
            Voxel::planar(1, 0),
            Voxel::planar(2, 0),
            Voxel::planar(2, 1),
            Voxel::planar(2, 2),
            Voxel::planar(1, 2),
            Voxel::planar(0, 2),
        ];
        let entries: Vec<_> = corridor.iter().map(|&v| (v, PointLabel::Middle)).collect();
        let labels = labels_from(shape, &entries);
        let window = full_window(shape);
        let model = CostModelKind::default();

        let from = Voxel::planar(0, 0);
        let goals = [Voxel::planar(0, 2), Voxel::planar(2, 2), from];
        let routes = RouteWindow::new(&labels, window, &model)
            .routes_from(from, &goals)
            .unwrap();

        assert_eq!(routes.len(), goals.len());
        for (path, &goal) in routes.iter().zip(&goals) {
            assert_eq!(path, &route(&labels, window, from, goal, &model).unwrap());
        }
        assert_eq!(routes[2], vec![from]);
    }

    #[test]
    fn goal_outside_window_fails_the_batch() {
        let shape = Shape::planar(4, 4);
        let labels = Grid::filled(shape, PointLabel::Middle);
        let mut window = BoundingBox::around(Voxel::planar(0, 0));
        window.include(Voxel::planar(1, 1));
        let result = RouteWindow::new(&labels, window, &CostModelKind::default())
            .routes_from(Voxel::planar(0, 0), &[Voxel::planar(1, 1), Voxel::planar(3, 3)]);
        assert!(matches!(
            result,
            Err(SkeletonError::UnreachableRoute { to, .. }) if to == Voxel::planar(3, 3)
        ));
    }

    #[test]
    fn no_goals_means_no_routes() {
        let shape = Shape::planar(2, 2);
        let labels = Grid::filled(shape, PointLabel::End);
        let routes = RouteWindow::new(&labels, full_window(shape), &CostModelKind::default())
            .routes_from(Voxel::planar(0, 0), &[])
            .unwrap();
        assert!(routes.is_empty());
    }

    #[test]
    fn cost_model_json_round_trip() {
        let model = CostModelKind::Uniform { background: 10.0 };
        let json = serde_json::to_string(&model).unwrap();
        let back: CostModelKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, model);
    }
}
