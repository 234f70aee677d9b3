//! Topology classification and segment decomposition of skeleton graphs.
//!
//! Every connected component is classified once ([`ComponentKind`]) and
//! then decomposed into segments on an owned working copy. Each traced
//! segment removes its edges from the working copy immediately, so every
//! edge is attributed to at most one segment.
//!
//! Two decompositions are provided:
//!
//! - [`decompose_bifurcations`] reports only segments that start at a
//!   branch point (degree above two) and cycles. Unbranched lines are
//!   skipped.
//! - [`decompose_statistics`] reports every segment, including arms
//!   ending at end points, lines, and single nodes, and requires that
//!   every edge of every component is consumed.
//!
//! Cycles carry a tortuosity of `0.0`, standing in for "not applicable".

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::graph::SkeletonGraph;
use crate::metrics::{displacement, path_length};
use crate::types::{SkeletonError, Spacing, Voxel};

/// Serde support for ordered maps with non-string keys, as a sequence of
/// `[key, value]` pairs.
mod map_as_pairs {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<K, V, S>(map: &BTreeMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: Serialize,
        V: Serialize,
        S: Serializer,
    {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
    where
        K: Deserialize<'de> + Ord,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Vec::<(K, V)>::deserialize(deserializer).map(|pairs| pairs.into_iter().collect())
    }
}

/// Topological class of a connected component.
///
/// Tested in declaration order; the first matching class wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComponentKind {
    /// One node, no edges.
    SingleNode,
    /// A path: every degree is one or two, and some node has degree one.
    Line,
    /// A single cycle: every node has degree two.
    PureCycle,
    /// At least one cycle, possibly with trees attached.
    CyclicTree,
    /// No cycles and at least one branch point.
    AcyclicTree,
}

/// Classify a connected component.
#[must_use]
pub fn classify(component: &SkeletonGraph) -> ComponentKind {
    if component.node_count() <= 1 {
        return ComponentKind::SingleNode;
    }
    let degrees: BTreeSet<usize> = component.nodes().map(|n| component.degree(n)).collect();
    if degrees.contains(&1) && degrees.iter().all(|&d| d == 1 || d == 2) {
        ComponentKind::Line
    } else if degrees.iter().all(|&d| d == 2) {
        ComponentKind::PureCycle
    } else if component.edge_count() + component.component_count() > component.node_count() {
        ComponentKind::CyclicTree
    } else {
        ComponentKind::AcyclicTree
    }
}

/// One traced segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// First node of the path.
    pub source: Voxel,
    /// Last node of the path; equals `source` for a cycle.
    pub target: Voxel,
    /// Nodes in traversal order. A cycle does not repeat its first node.
    pub path: Vec<Voxel>,
    /// Whether the segment is a cycle.
    pub closed: bool,
    /// Curve length in physical units.
    pub length: f64,
    /// Straight-line distance between the endpoints; zero for a cycle.
    pub displacement: f64,
    /// `length / displacement`, or `0.0` for a cycle.
    pub tortuosity: f64,
}

impl Segment {
    fn open(path: Vec<Voxel>, spacing: Spacing) -> Option<Self> {
        let (&source, &target) = (path.first()?, path.last()?);
        let length = path_length(&path, false, spacing);
        let displacement = displacement(source, target, spacing);
        let tortuosity = if displacement > 0.0 {
            length / displacement
        } else {
            0.0
        };
        Some(Self {
            source,
            target,
            path,
            closed: false,
            length,
            displacement,
            tortuosity,
        })
    }

    fn cycle(path: Vec<Voxel>, spacing: Spacing) -> Option<Self> {
        let source = *path.first()?;
        let length = path_length(&path, true, spacing);
        Some(Self {
            source,
            target: source,
            path,
            closed: true,
            length,
            displacement: 0.0,
            tortuosity: 0.0,
        })
    }
}

/// Destructive tracer over one component's working copy.
struct Tracer {
    working: SkeletonGraph,
    spacing: Spacing,
    segments: Vec<Segment>,
}

impl Tracer {
    fn new(component: &SkeletonGraph, spacing: Spacing) -> Self {
        Self {
            working: component.clone(),
            spacing,
            segments: Vec::new(),
        }
    }

    fn trace_cycle(&mut self, cycle: Vec<Voxel>) {
        let n = cycle.len();
        for i in 0..n {
            self.working.remove_edge(cycle[i], cycle[(i + 1) % n]);
        }
        self.segments.extend(Segment::cycle(cycle, self.spacing));
    }

    fn trace_open(&mut self, path: Vec<Voxel>) {
        for w in path.windows(2) {
            self.working.remove_edge(w[0], w[1]);
        }
        self.segments.extend(Segment::open(path, self.spacing));
    }

    /// Trace every clean path between members of `stops`.
    ///
    /// Sources are visited in ascending order and, for each source, targets
    /// in ascending order. Paths for a source are enumerated on the graph as
    /// it stands when that source's turn begins; a path that lost an edge
    /// to an earlier path of the same turn is skipped.
    fn trace_between(&mut self, stops: &BTreeSet<Voxel>) {
        for &source in stops {
            for path in self.working.clean_paths_from(source, stops) {
                let intact = path.windows(2).all(|w| self.working.contains_edge(w[0], w[1]));
                if intact {
                    self.trace_open(path);
                }
            }
        }
    }

    /// Walk an unbranched line from its smallest end point.
    fn trace_line(&mut self, component: &SkeletonGraph) {
        let Some(start) = component.nodes().find(|&n| component.degree(n) == 1) else {
            return;
        };
        let mut path = vec![start];
        let mut visited = BTreeSet::from([start]);
        let mut current = start;
        while let Some(next) = component.neighbors(current).find(|n| !visited.contains(n)) {
            path.push(next);
            visited.insert(next);
            current = next;
        }
        self.trace_open(path);
    }

    /// Trace each basis cycle in order.
    fn trace_cycles(&mut self, cycles: Vec<Vec<Voxel>>) {
        for cycle in cycles {
            self.trace_cycle(cycle);
        }
    }
}

/// Nodes of `component` whose degree satisfies `keep`.
fn stops_where(component: &SkeletonGraph, keep: impl Fn(usize) -> bool) -> BTreeSet<Voxel> {
    component.nodes().filter(|&n| keep(component.degree(n))).collect()
}

/// Key of one segment in a [`BifurcationReport`].
///
/// `ordinal` numbers the segments leaving the same source, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    /// 1-based index among segments from the same source.
    pub ordinal: usize,
    /// Segment start.
    pub source: Voxel,
    /// Segment end; equals `source` for a cycle.
    pub target: Voxel,
}

/// Result of [`decompose_bifurcations`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BifurcationReport {
    /// Number of segments leaving each source node.
    #[serde(with = "map_as_pairs")]
    pub segment_count_by_source: BTreeMap<Voxel, usize>,
    /// Curve length per segment.
    #[serde(with = "map_as_pairs")]
    pub lengths: BTreeMap<SegmentKey, f64>,
    /// Tortuosity per segment.
    #[serde(with = "map_as_pairs")]
    pub tortuosities: BTreeMap<SegmentKey, f64>,
    /// Total number of segments.
    pub total_segments: usize,
}

impl BifurcationReport {
    fn record(&mut self, segment: &Segment) {
        let ordinal = self.segment_count_by_source.entry(segment.source).or_insert(0);
        *ordinal += 1;
        let key = SegmentKey {
            ordinal: *ordinal,
            source: segment.source,
            target: segment.target,
        };
        self.lengths.insert(key, segment.length);
        self.tortuosities.insert(key, segment.tortuosity);
        self.total_segments = self.lengths.len();
    }
}

/// Decompose a skeleton graph into branch-point segments and cycles.
///
/// Per component:
///
/// - single nodes and unbranched lines contribute nothing
/// - a pure cycle contributes one cycle
/// - a cyclic tree contributes every basis cycle, then the clean paths
///   between branch points (degree above two in the component before any
///   edge was removed)
/// - an acyclic tree contributes the clean paths between branch points
///
/// Arms that end at an end point are not reported.
#[must_use]
pub fn decompose_bifurcations(graph: &SkeletonGraph, spacing: Spacing) -> BifurcationReport {
    let mut report = BifurcationReport::default();

    for (index, component) in graph.connected_components().iter().enumerate() {
        let kind = classify(component);
        let mut tracer = Tracer::new(component, spacing);
        match kind {
            ComponentKind::SingleNode | ComponentKind::Line => {}
            ComponentKind::PureCycle => {
                if let Some(cycle) = component.cycle_basis().into_iter().next() {
                    tracer.trace_cycle(cycle);
                }
            }
            ComponentKind::CyclicTree => {
                tracer.trace_cycles(component.cycle_basis());
                if tracer.working.edge_count() > 0 {
                    tracer.trace_between(&stops_where(component, |d| d > 2));
                }
            }
            ComponentKind::AcyclicTree => {
                tracer.trace_between(&stops_where(component, |d| d > 2));
            }
        }
        debug!(
            component = index,
            ?kind,
            segments = tracer.segments.len(),
            "decomposed component"
        );
        for segment in &tracer.segments {
            report.record(segment);
        }
    }

    info!(total = report.total_segments, "bifurcation decomposition complete");
    report
}

/// Segments attributed to one source node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSegments {
    /// Number of segments starting at the node.
    pub count: usize,
    /// Curve length of each segment, in trace order.
    pub lengths: Vec<f64>,
    /// Tortuosity of each segment, in trace order.
    pub tortuosities: Vec<f64>,
}

/// Aggregate statistics of one connected component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Topological class.
    pub kind: ComponentKind,
    /// Nodes in the component.
    pub node_count: usize,
    /// Edges in the component.
    pub edge_count: usize,
    /// Segments traced.
    pub segment_count: usize,
    /// Longest segment length.
    pub max_length: f64,
    /// Mean segment length.
    pub mean_length: f64,
    /// Largest tortuosity.
    pub max_tortuosity: f64,
    /// Mean tortuosity, counting cycles as zero.
    pub mean_tortuosity: f64,
}

impl ComponentRecord {
    fn from_segments(kind: ComponentKind, component: &SkeletonGraph, segments: &[Segment]) -> Self {
        let lengths: Vec<f64> = segments.iter().map(|s| s.length).collect();
        let tortuosities: Vec<f64> = segments.iter().map(|s| s.tortuosity).collect();
        Self {
            kind,
            node_count: component.node_count(),
            edge_count: component.edge_count(),
            segment_count: segments.len(),
            max_length: max_of(&lengths),
            mean_length: mean_of(&lengths),
            max_tortuosity: max_of(&tortuosities),
            mean_tortuosity: mean_of(&tortuosities),
        }
    }
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

/// Result of [`decompose_statistics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsReport {
    /// Segments per source node. Single-node components appear with an
    /// empty entry.
    #[serde(with = "map_as_pairs")]
    pub by_node: BTreeMap<Voxel, NodeSegments>,
    /// One record per connected component, ordered by smallest node.
    pub components: Vec<ComponentRecord>,
    /// Every traced segment in trace order.
    pub segments: Vec<Segment>,
}

impl StatisticsReport {
    /// Total number of segments.
    #[must_use]
    pub fn total_segments(&self) -> usize {
        self.segments.len()
    }
}

/// Decompose a skeleton graph into segments and per-component statistics.
///
/// Per component:
///
/// - a single node yields an empty entry and an all-zero record
/// - a line yields one end-to-end segment, except a three-node line whose
///   ends are not adjacent, which is split at its middle node into two
///   single-edge segments
/// - a pure cycle yields one cycle
/// - a cyclic tree yields every basis cycle, then the clean paths between
///   nodes whose degree is not two
/// - an acyclic tree yields the clean paths between nodes whose degree is
///   not two, which covers arms ending at end points
///
/// # Errors
///
/// Returns [`SkeletonError::ResidualEdges`] if a component still has edges
/// after decomposition.
pub fn decompose_statistics(
    graph: &SkeletonGraph,
    spacing: Spacing,
) -> Result<StatisticsReport, SkeletonError> {
    let mut report = StatisticsReport::default();

    for (index, component) in graph.connected_components().iter().enumerate() {
        let kind = classify(component);
        let mut tracer = Tracer::new(component, spacing);
        match kind {
            ComponentKind::SingleNode => {
                for node in component.nodes() {
                    report.by_node.entry(node).or_default();
                }
            }
            ComponentKind::Line => {
                let ends: Vec<Voxel> = stops_where(component, |d| d == 1).into_iter().collect();
                let dichotomous = component.articulation_points().len() == 1
                    && matches!(ends.as_slice(), [a, b] if a.distance_squared(*b) != 1);
                if dichotomous {
                    tracer.trace_between(&component.nodes().collect());
                } else {
                    tracer.trace_line(component);
                }
            }
            ComponentKind::PureCycle => {
                if let Some(cycle) = component.cycle_basis().into_iter().next() {
                    tracer.trace_cycle(cycle);
                }
            }
            ComponentKind::CyclicTree => {
                tracer.trace_cycles(component.cycle_basis());
                tracer.trace_between(&stops_where(component, |d| d != 2));
            }
            ComponentKind::AcyclicTree => {
                tracer.trace_between(&stops_where(component, |d| d != 2));
            }
        }

        let remaining = tracer.working.edge_count();
        if remaining != 0 {
            return Err(SkeletonError::ResidualEdges {
                component: index,
                remaining,
            });
        }

        debug!(
            component = index,
            ?kind,
            segments = tracer.segments.len(),
            "decomposed component"
        );
        for segment in &tracer.segments {
            let entry = report.by_node.entry(segment.source).or_default();
            entry.count += 1;
            entry.lengths.push(segment.length);
            entry.tortuosities.push(segment.tortuosity);
        }
        report
            .components
            .push(ComponentRecord::from_segments(kind, component, &tracer.segments));
        report.segments.extend(tracer.segments);
    }

    info!(
        components = report.components.len(),
        total = report.total_segments(),
        "statistics decomposition complete"
    );
    Ok(report)
}
