//! tubeskel-core: Unit-width skeleton reduction and segment metrology
//! (sans-IO).
//!
//! Takes the voxel skeleton of a tubular structure (for example
//! vasculature) and measures it through:
//! point labelling -> crowded-region routing -> graph building ->
//! clique pruning -> component classification -> segment tracing.
//!
//! This crate has **no I/O dependencies** -- it operates on in-memory
//! voxel grids and returns structured data. Loading image stacks and
//! writing results lives in `tubeskel-cli`. Thinning a solid volume into
//! a skeleton is not performed here.

pub mod clique;
pub mod diagnostics;
pub mod graph;
pub mod label;
pub mod metrics;
pub mod neighborhood;
pub mod route;
pub mod segments;
pub mod types;
pub mod unit_width;

use tracing::info;

pub use clique::prune_clique_edges;
pub use diagnostics::{Clock, NoClock, RunDiagnostics};
pub use graph::SkeletonGraph;
pub use route::{CostModel, CostModelKind, RouteWindow};
pub use segments::{
    BifurcationReport, ComponentKind, ComponentRecord, NodeSegments, Segment, SegmentKey,
    StatisticsReport, decompose_bifurcations, decompose_statistics,
};
pub use types::{
    BinaryVolume, Dimensionality, Grid, PointLabel, Shape, SkeletonConfig, SkeletonError, Spacing,
    Voxel,
};
pub use unit_width::reduce_to_unit_width;

/// What to decompose.
#[derive(Debug, Clone, PartialEq)]
pub enum SkeletonInput {
    /// A skeleton volume.
    ///
    /// Unless `prethinned` is set, the volume is first reduced to unit
    /// width. The graph built from it is clique-pruned when
    /// [`SkeletonConfig::prune_cliques`] is set.
    Volume {
        /// Skeletal voxels.
        volume: BinaryVolume,
        /// Whether the volume is already unit width.
        prethinned: bool,
    },
    /// A ready-made graph, decomposed as given.
    Graph(SkeletonGraph),
}

/// Everything produced by [`decompose`].
#[derive(Debug, Clone, PartialEq)]
pub struct Decomposition {
    /// The unit-width skeleton, when the input was a volume that needed
    /// reduction.
    pub skeleton: Option<BinaryVolume>,
    /// The graph that was decomposed.
    pub graph: SkeletonGraph,
    /// Branch-point segments and cycles.
    pub bifurcations: BifurcationReport,
    /// All segments with per-node and per-component statistics.
    pub statistics: StatisticsReport,
    /// Counts and timings.
    pub diagnostics: RunDiagnostics,
}

/// Reduce a skeleton volume to unit width and decompose it.
///
/// Equivalent to [`decompose`] with
/// `SkeletonInput::Volume { prethinned: false, .. }`.
///
/// # Errors
///
/// See [`decompose`].
pub fn process(volume: &BinaryVolume, config: &SkeletonConfig) -> Result<Decomposition, SkeletonError> {
    decompose(
        SkeletonInput::Volume {
            volume: volume.clone(),
            prethinned: false,
        },
        config,
    )
}

/// Decompose a skeleton into segments.
///
/// # Steps
///
/// 1. Unit-width reduction (volumes not flagged prethinned)
/// 2. Graph building from full lattice adjacency (volumes)
/// 3. Clique pruning (volumes, when enabled)
/// 4. Bifurcation decomposition
/// 5. Statistics decomposition
///
/// # Errors
///
/// Returns [`SkeletonError::InvalidConfig`] for an unusable config, and
/// any invariant violation raised by reduction
/// ([`SkeletonError::TopologyChanged`]), pruning
/// ([`SkeletonError::CliquePruneDisconnected`]), or decomposition
/// ([`SkeletonError::ResidualEdges`]).
pub fn decompose(input: SkeletonInput, config: &SkeletonConfig) -> Result<Decomposition, SkeletonError> {
    decompose_with_diagnostics(input, config, &NoClock)
}

/// [`decompose`], timing each stage with `clock`.
///
/// # Errors
///
/// See [`decompose`].
pub fn decompose_with_diagnostics<C: Clock>(
    input: SkeletonInput,
    config: &SkeletonConfig,
    clock: &C,
) -> Result<Decomposition, SkeletonError> {
    config.validate()?;
    let total_start = clock.now();
    let mut diagnostics = RunDiagnostics::default();

    let (graph, skeleton) = match input {
        SkeletonInput::Graph(graph) => (graph, None),
        SkeletonInput::Volume { volume, prethinned } => {
            let start = clock.now();
            let skeleton = if prethinned {
                volume
            } else {
                let (reduced, reduction) = unit_width::reduce_with_diagnostics(&volume, config)?;
                diagnostics.reduction = Some(reduction);
                reduced
            };
            diagnostics.reduce_duration = clock.elapsed(&start);

            let start = clock.now();
            let built = SkeletonGraph::from_volume(&skeleton);
            let graph = if config.prune_cliques {
                prune_clique_edges(&built)?
            } else {
                built.clone()
            };
            diagnostics.graph.pruned_edges = built.edge_count() - graph.edge_count();
            diagnostics.graph_duration = clock.elapsed(&start);

            (graph, (!prethinned).then_some(skeleton))
        }
    };

    diagnostics.graph.nodes = graph.node_count();
    diagnostics.graph.edges = graph.edge_count();
    diagnostics.graph.components = graph.component_count();
    diagnostics.graph.cycles = graph.edge_count() + diagnostics.graph.components - graph.node_count();

    let start = clock.now();
    let bifurcations = decompose_bifurcations(&graph, config.spacing);
    let statistics = decompose_statistics(&graph, config.spacing)?;
    diagnostics.decompose_duration = clock.elapsed(&start);
    diagnostics.bifurcation_segments = bifurcations.total_segments;
    diagnostics.statistics_segments = statistics.total_segments();
    diagnostics.total_duration = clock.elapsed(&total_start);

    info!(
        nodes = diagnostics.graph.nodes,
        components = diagnostics.graph.components,
        bifurcation_segments = diagnostics.bifurcation_segments,
        segments = diagnostics.statistics_segments,
        "decomposition complete"
    );

    Ok(Decomposition {
        skeleton,
        graph,
        bifurcations,
        statistics,
        diagnostics,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ring_volume() -> BinaryVolume {
        let mut volume = BinaryVolume::filled(Shape::planar(5, 5), false);
        for y in 1..=3 {
            for x in 1..=3 {
                if (y, x) != (2, 2) {
                    volume.set(Voxel::planar(y, x), true);
                }
            }
        }
        volume
    }

    #[test]
    fn process_ring() {
        // Every voxel of the tight ring is crowded. The four edge centres
        // tie as sources and are joined diagonally, leaving a smaller ring.
        let result = process(&ring_volume(), &SkeletonConfig::default()).unwrap();
        let diamond = BinaryVolume::from_voxels(
            Shape::planar(5, 5),
            [
                Voxel::planar(1, 2),
                Voxel::planar(2, 1),
                Voxel::planar(2, 3),
                Voxel::planar(3, 2),
            ],
        );
        assert_eq!(result.skeleton.as_ref(), Some(&diamond));
        assert_eq!(result.bifurcations.total_segments, 1);
        assert_eq!(result.statistics.total_segments(), 1);
        assert_eq!(result.diagnostics.graph.cycles, 1);
        assert_eq!(result.diagnostics.graph.pruned_edges, 0);
    }

    #[test]
    fn prethinned_volume_skips_reduction() {
        let result = decompose(
            SkeletonInput::Volume {
                volume: ring_volume(),
                prethinned: true,
            },
            &SkeletonConfig::default(),
        )
        .unwrap();
        assert!(result.skeleton.is_none());
        assert!(result.diagnostics.reduction.is_none());
        assert_eq!(result.bifurcations.total_segments, 1);
    }

    #[test]
    fn graph_input_is_not_pruned() {
        let a = Voxel::planar(0, 0);
        let b = Voxel::planar(0, 1);
        let c = Voxel::planar(1, 1);
        let graph = SkeletonGraph::from_edges([(a, b), (b, c), (a, c)]).unwrap();
        let result = decompose(SkeletonInput::Graph(graph.clone()), &SkeletonConfig::default()).unwrap();
        assert_eq!(result.graph, graph);
        assert_eq!(result.bifurcations.total_segments, 1);
    }

    #[test]
    fn disabling_pruning_keeps_diagonals() {
        let config = SkeletonConfig {
            prune_cliques: false,
            ..SkeletonConfig::default()
        };
        let result = decompose(
            SkeletonInput::Volume {
                volume: ring_volume(),
                prethinned: true,
            },
            &config,
        )
        .unwrap();
        assert_eq!(result.graph.edge_count(), 12);
        assert_eq!(result.diagnostics.graph.pruned_edges, 0);
    }

    #[test]
    fn invalid_config_fails_fast() {
        let config = SkeletonConfig {
            spacing: Spacing([0.0, 1.0, 1.0]),
            ..SkeletonConfig::default()
        };
        assert!(matches!(
            process(&ring_volume(), &config),
            Err(SkeletonError::InvalidConfig(_))
        ));
    }
}
