//! tubeskel: reduce a PNG skeleton to unit width and report its segments.
//!
//! Loads a single PNG (planar) or a directory of PNG slices (volumetric),
//! runs unit-width reduction and both segment decompositions, and prints
//! per-stage diagnostics followed by per-component segment statistics.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin tubeskel -- [OPTIONS] <INPUT>
//! ```
//!
//! Set `RUST_LOG=tubeskel_core=debug` to trace individual crowded regions
//! and components.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod io;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tubeskel_core::diagnostics::{Clock, RunDiagnostics};
use tubeskel_core::{
    BifurcationReport, CostModelKind, SkeletonConfig, SkeletonInput, Spacing, StatisticsReport,
};

/// Unit-width skeleton reduction and segment metrology.
///
/// Reads a skeleton of a tubular structure, removes crowded junction
/// voxels, and measures length and tortuosity of every segment.
#[derive(Parser)]
#[command(name = "tubeskel", version)]
struct Cli {
    /// A PNG file, or a directory of PNG slices ordered by file name.
    input: PathBuf,

    /// Cost landscape for routing through crowded regions.
    #[arg(long, value_enum, default_value_t = CostModel::LabelValue)]
    cost_model: CostModel,

    /// Routing penalty for background voxels.
    #[arg(long, default_value_t = SkeletonConfig::DEFAULT_BACKGROUND_COST)]
    background_cost: f64,

    /// Physical voxel size as `z,y,x`.
    #[arg(long, value_delimiter = ',')]
    spacing: Option<Vec<f64>>,

    /// Keep redundant diagonal edges inside 3-cliques.
    #[arg(long)]
    no_prune_cliques: bool,

    /// Treat the input as already unit width and skip reduction.
    #[arg(long)]
    prethinned: bool,

    /// Write the unit-width skeleton as PNG slices into this directory.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output results as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Full skeleton config as a JSON string.
    ///
    /// When provided, all other config flags are ignored.
    /// The JSON must be a valid `SkeletonConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,
}

/// Cost model selection.
#[derive(Clone, Copy, ValueEnum)]
enum CostModel {
    /// Cost equals the point label code.
    LabelValue,
    /// Unit cost for every skeletal voxel.
    Uniform,
}

/// Build a [`SkeletonConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual config flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<SkeletonConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    let spacing = match cli.spacing.as_deref() {
        None => SkeletonConfig::DEFAULT_SPACING,
        Some(&[z, y, x]) => Spacing([z, y, x]),
        Some(other) => {
            return Err(format!(
                "--spacing takes three values (z,y,x), got {}",
                other.len()
            ));
        }
    };

    Ok(SkeletonConfig {
        cost_model: match cli.cost_model {
            CostModel::LabelValue => CostModelKind::LabelValue {
                background: cli.background_cost,
            },
            CostModel::Uniform => CostModelKind::Uniform {
                background: cli.background_cost,
            },
        },
        spacing,
        prune_cliques: !cli.no_prune_cliques,
    })
}

/// Everything printed by `--json`.
#[derive(Serialize)]
struct JsonOutput<'a> {
    config: &'a SkeletonConfig,
    diagnostics: &'a RunDiagnostics,
    bifurcations: &'a BifurcationReport,
    statistics: &'a StatisticsReport,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let volume = match io::load_volume(&cli.input) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error loading {}: {e}", cli.input.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Input: {} ({:?}, {} skeletal voxels)",
        cli.input.display(),
        volume.shape(),
        volume.count(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!();

    let input = SkeletonInput::Volume {
        volume: volume.clone(),
        prethinned: cli.prethinned,
    };
    let result = match tubeskel_core::decompose_with_diagnostics(input, &config, &StdClock) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Skeleton error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        let output = JsonOutput {
            config: &config,
            diagnostics: &result.diagnostics,
            bifurcations: &result.bifurcations,
            statistics: &result.statistics,
        };
        match serde_json::to_string_pretty(&output) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing results: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        println!("{}", result.diagnostics.report());
        println!();
        println!("{}", component_report(&result.statistics));
    }

    if let Some(ref dir) = cli.output_dir {
        let skeleton = result.skeleton.as_ref().unwrap_or(&volume);
        match io::write_volume(skeleton, dir) {
            Ok(paths) => {
                eprintln!("Wrote {} slice(s) to {}", paths.len(), dir.display());
            }
            Err(e) => {
                eprintln!("Error writing skeleton to {}: {e}", dir.display());
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// One line per connected component of the decomposed graph.
fn component_report(statistics: &StatisticsReport) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "Components ({}, {} segments)\n{}",
        statistics.components.len(),
        statistics.total_segments(),
        "=".repeat(60),
    ));
    lines.push(format!(
        "{:>4} {:<12} {:>6} {:>6} {:>5} {:>10} {:>10} {:>8} {:>8}",
        "#", "Kind", "Nodes", "Edges", "Segs", "Max len", "Mean len", "Max tor", "Mean tor",
    ));
    lines.push("-".repeat(80));

    for (index, c) in statistics.components.iter().enumerate() {
        lines.push(format!(
            "{index:>4} {:<12} {:>6} {:>6} {:>5} {:>10.3} {:>10.3} {:>8.3} {:>8.3}",
            format!("{:?}", c.kind),
            c.node_count,
            c.edge_count,
            c.segment_count,
            c.max_length,
            c.mean_length,
            c.max_tortuosity,
            c.mean_tortuosity,
        ));
    }

    lines.join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tubeskel").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_core_config() {
        let config = config_from_cli(&parse(&["in.png"])).unwrap();
        assert_eq!(config, SkeletonConfig::default());
    }

    #[test]
    fn flags_build_config() {
        let cli = parse(&[
            "in.png",
            "--cost-model",
            "uniform",
            "--background-cost",
            "10",
            "--spacing",
            "2,0.5,0.5",
            "--no-prune-cliques",
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.cost_model, CostModelKind::Uniform { background: 10.0 });
        assert_eq!(config.spacing, Spacing([2.0, 0.5, 0.5]));
        assert!(!config.prune_cliques);
    }

    #[test]
    fn config_json_overrides_flags() {
        let json = serde_json::to_string(&SkeletonConfig {
            prune_cliques: false,
            ..SkeletonConfig::default()
        })
        .unwrap();
        let cli = parse(&["in.png", "--cost-model", "uniform", "--config-json", &json]);
        let config = config_from_cli(&cli).unwrap();
        assert!(!config.prune_cliques);
        assert_eq!(config.cost_model, CostModelKind::default());
    }

    #[test]
    fn bad_config_json_is_reported() {
        let cli = parse(&["in.png", "--config-json", "{not json"]);
        assert!(config_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn component_report_has_a_row_per_component() {
        let graph = tubeskel_core::SkeletonGraph::from_edges([
            (tubeskel_core::Voxel::planar(0, 0), tubeskel_core::Voxel::planar(0, 1)),
            (tubeskel_core::Voxel::planar(5, 5), tubeskel_core::Voxel::planar(5, 6)),
        ])
        .unwrap();
        let statistics = tubeskel_core::decompose_statistics(&graph, Spacing::ISOTROPIC).unwrap();
        let report = component_report(&statistics);
        assert!(report.contains("Components (2, 2 segments)"));
        assert_eq!(report.matches("Line").count(), 2);
    }
}
