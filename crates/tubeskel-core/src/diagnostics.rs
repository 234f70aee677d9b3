//! Run diagnostics: counts and timings for reduction and decomposition.
//!
//! Every call to [`decompose`](crate::decompose) collects a
//! [`RunDiagnostics`] alongside its results. The core never reads a
//! clock itself: timestamps come from a caller-supplied [`Clock`], and
//! [`decompose`](crate::decompose) uses [`NoClock`], which reports zero
//! durations.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage durations.
pub trait Clock {
    /// Opaque timestamp.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// A [`Clock`] that measures nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoClock;

impl Clock for NoClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// Which branch unit-width reduction took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReductionPath {
    /// No two skeletal voxels touch; returned unchanged.
    NoAdjacency,
    /// No crowded voxels; returned unchanged.
    AlreadyUnitWidth,
    /// Every skeletal voxel was crowded; each component collapsed to its
    /// source voxel(s).
    Collapsed,
    /// Crowded regions were routed to their exits.
    #[default]
    Routed,
}

/// Counters from one unit-width reduction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionDiagnostics {
    /// Branch taken.
    pub path: ReductionPath,
    /// Skeletal voxels in the input.
    pub input_voxels: usize,
    /// Skeletal voxels in the output.
    pub output_voxels: usize,
    /// Voxels labelled crowded.
    pub crowded_voxels: usize,
    /// Connected crowded regions.
    pub crowded_regions: usize,
    /// Source-to-exit routes computed.
    pub routes: usize,
    /// Connected components, identical before and after.
    pub components: usize,
}

/// Counters for the skeleton graph handed to decomposition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDiagnostics {
    /// Nodes.
    pub nodes: usize,
    /// Edges after clique pruning.
    pub edges: usize,
    /// Edges removed by clique pruning.
    pub pruned_edges: usize,
    /// Connected components.
    pub components: usize,
    /// Size of the cycle basis.
    pub cycles: usize,
}

/// Diagnostics collected from a single [`decompose`](crate::decompose)
/// run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDiagnostics {
    /// Unit-width reduction; `None` when the input was used as given.
    pub reduction: Option<ReductionDiagnostics>,
    /// Graph summary.
    pub graph: GraphDiagnostics,
    /// Segments reported by the bifurcation decomposition.
    pub bifurcation_segments: usize,
    /// Segments reported by the statistics decomposition.
    pub statistics_segments: usize,
    /// Time spent in unit-width reduction (seconds).
    #[serde(with = "duration_serde")]
    pub reduce_duration: Duration,
    /// Time spent building and pruning the graph (seconds).
    #[serde(with = "duration_serde")]
    pub graph_duration: Duration,
    /// Time spent decomposing (seconds).
    #[serde(with = "duration_serde")]
    pub decompose_duration: Duration,
    /// Total wall-clock duration (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

impl RunDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Skeleton Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration)
        ));
        lines.push(String::new());

        lines.push(format!("{:<24} {:>10}  {}", "Stage", "Duration", "Details"));
        lines.push("-".repeat(80));

        let reduction = self.reduction.as_ref().map_or_else(
            || "skipped (input used as given)".to_string(),
            |r| {
                format!(
                    "{:?} {}->{} voxels, {} crowded in {} regions, {} routes",
                    r.path,
                    r.input_voxels,
                    r.output_voxels,
                    r.crowded_voxels,
                    r.crowded_regions,
                    r.routes,
                )
            },
        );
        let graph = format!(
            "{} nodes, {} edges ({} pruned), {} components, {} cycles",
            self.graph.nodes,
            self.graph.edges,
            self.graph.pruned_edges,
            self.graph.components,
            self.graph.cycles,
        );
        let decompose = format!(
            "{} bifurcation segments, {} segments total",
            self.bifurcation_segments, self.statistics_segments,
        );

        for (name, duration, details) in [
            ("Unit-width reduction", self.reduce_duration, reduction),
            ("Graph", self.graph_duration, graph),
            ("Decomposition", self.decompose_duration, decompose),
        ] {
            let ms = duration_ms(duration);
            lines.push(format!("{name:<24} {ms:>8.3}ms  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> RunDiagnostics {
        RunDiagnostics {
            reduction: Some(ReductionDiagnostics {
                path: ReductionPath::Routed,
                input_voxels: 21,
                output_voxels: 17,
                crowded_voxels: 13,
                crowded_regions: 1,
                routes: 4,
                components: 1,
            }),
            graph: GraphDiagnostics {
                nodes: 17,
                edges: 16,
                pruned_edges: 0,
                components: 1,
                cycles: 0,
            },
            bifurcation_segments: 0,
            statistics_segments: 4,
            reduce_duration: Duration::from_millis(3),
            graph_duration: Duration::from_millis(1),
            decompose_duration: Duration::from_millis(2),
            total_duration: Duration::from_millis(6),
        }
    }

    #[test]
    fn no_clock_measures_zero() {
        let clock = NoClock;
        let start = clock.now();
        assert_eq!(clock.elapsed(&start), Duration::ZERO);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        assert!(report.contains("Unit-width reduction"));
        assert!(report.contains("Routed 21->17 voxels"));
        assert!(report.contains("17 nodes, 16 edges"));
        assert!(report.contains("4 segments total"));
        assert!(report.contains("6.000ms"));
    }

    #[test]
    fn skipped_reduction_is_reported() {
        let diagnostics = RunDiagnostics {
            reduction: None,
            ..sample()
        };
        assert!(diagnostics.report().contains("skipped"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.006).abs() < 1e-12);
        let back: RunDiagnostics = serde_json::from_value(json).unwrap();
        assert!((back.total_duration.as_secs_f64() - 0.006).abs() < 1e-9);
        assert_eq!(back.graph, sample().graph);
    }
}
