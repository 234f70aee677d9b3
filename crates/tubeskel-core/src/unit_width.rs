//! Unit-width skeleton reduction.
//!
//! A thinned skeleton is not necessarily one voxel wide: junctions and
//! tight bends leave clusters of voxels whose local topology is ambiguous.
//! Those voxels are labelled crowded (see [`crate::label`]). Each
//! connected crowded region is replaced by minimum-cost routes from its
//! source voxel(s) to its exits:
//!
//! - **Sources**: the region voxels minimizing the sum of squared
//!   distances to all other region voxels divided by their own valence.
//!   Ties keep every minimizer.
//! - **Exits**: end and middle points adjacent to the region.
//! - **Routes**: computed with [`crate::route`] inside the region's
//!   bounding box padded by one voxel.
//!
//! A region with no exits is a whole isolated component; it collapses to
//! its sources, joined to each other by routes so it stays connected.
//!
//! End, middle, and joint points are kept unchanged. The number of
//! connected components of the result must equal that of the input.
//!
//! Tied sources in a region with exits are all kept and each is routed on
//! its own. Mutually adjacent tied sources can then form a 3-clique with a
//! shared route voxel, which is crowded again: one pass is not always unit
//! width, and a second pass may thin it further.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::diagnostics::{ReductionDiagnostics, ReductionPath};
use crate::label::{classify, valence};
use crate::neighborhood::{Region, count_components, label_components, neighbors};
use crate::route::{CostModel, RouteWindow};
use crate::types::{BinaryVolume, Grid, PointLabel, SkeletonConfig, SkeletonError, Voxel};

/// Reduce a skeleton to unit width.
///
/// Applying this to an already unit-width skeleton returns it unchanged.
/// A single pass can leave a crowded 3-clique where tied sources meet a
/// route (see the module docs), so the output is not guaranteed to be a
/// fixed point.
///
/// # Errors
///
/// Returns [`SkeletonError::InvalidConfig`] for an unusable config,
/// [`SkeletonError::UnreachableRoute`] if a region cannot be routed, and
/// [`SkeletonError::TopologyChanged`] if the result does not have the
/// same number of connected components as the input.
pub fn reduce_to_unit_width(
    volume: &BinaryVolume,
    config: &SkeletonConfig,
) -> Result<BinaryVolume, SkeletonError> {
    reduce_with_diagnostics(volume, config).map(|(skeleton, _)| skeleton)
}

/// [`reduce_to_unit_width`], also returning counters about the run.
///
/// # Errors
///
/// See [`reduce_to_unit_width`].
pub fn reduce_with_diagnostics(
    volume: &BinaryVolume,
    config: &SkeletonConfig,
) -> Result<(BinaryVolume, ReductionDiagnostics), SkeletonError> {
    config.validate()?;

    let mut diagnostics = ReductionDiagnostics {
        input_voxels: volume.count(),
        ..ReductionDiagnostics::default()
    };

    let valence = valence(volume);
    if valence.as_raw().iter().all(|&v| v == 0) {
        diagnostics.path = ReductionPath::NoAdjacency;
        diagnostics.output_voxels = diagnostics.input_voxels;
        return Ok((volume.clone(), diagnostics));
    }

    let labels = classify(volume, &valence)?;
    let crowded = labels.map(|l| l == PointLabel::Crowded);
    diagnostics.crowded_voxels = crowded.count();
    if diagnostics.crowded_voxels == 0 {
        diagnostics.path = ReductionPath::AlreadyUnitWidth;
        diagnostics.output_voxels = diagnostics.input_voxels;
        return Ok((volume.clone(), diagnostics));
    }

    let regions = label_components(&crowded);
    diagnostics.crowded_regions = regions.len();
    diagnostics.path = if diagnostics.crowded_voxels == diagnostics.input_voxels {
        ReductionPath::Collapsed
    } else {
        ReductionPath::Routed
    };

    let mut out = BinaryVolume::new(volume.shape());
    for region in &regions {
        diagnostics.routes += resolve_region(region, &valence, &labels, &config.cost_model, &mut out)?;
    }

    for (voxel, label) in labels.iter() {
        if matches!(label, PointLabel::End | PointLabel::Middle | PointLabel::Joint) {
            out.set(voxel, true);
        }
    }

    let before = count_components(volume);
    let after = count_components(&out);
    diagnostics.components = before;
    diagnostics.output_voxels = out.count();
    if before != after {
        return Err(SkeletonError::TopologyChanged { before, after });
    }

    info!(
        input = diagnostics.input_voxels,
        output = diagnostics.output_voxels,
        regions = diagnostics.crowded_regions,
        "reduced skeleton to unit width"
    );
    Ok((out, diagnostics))
}

/// Route one crowded region into `out`. Returns the number of routes.
fn resolve_region<C: CostModel + ?Sized>(
    region: &Region,
    valence: &Grid<u8>,
    labels: &Grid<PointLabel>,
    cost: &C,
    out: &mut BinaryVolume,
) -> Result<usize, SkeletonError> {
    let window = region.bounds.padded(labels.shape());
    let sources = select_sources(&region.voxels, valence);
    let exits = find_exits(region, labels);

    debug!(
        voxels = region.voxels.len(),
        sources = sources.len(),
        exits = exits.len(),
        "resolving crowded region"
    );

    for &s in &sources {
        out.set(s, true);
    }

    // Each entry is one source with the goals routed from it.
    let batches: Vec<(Voxel, &[Voxel])> = if exits.is_empty() {
        match sources.split_first() {
            Some((&first, rest)) => vec![(first, rest)],
            None => Vec::new(),
        }
    } else {
        sources.iter().map(|&s| (s, exits.as_slice())).collect()
    };

    let router = RouteWindow::new(labels, window, cost);
    let mut routed = 0;
    for (from, goals) in batches {
        for path in router.routes_from(from, goals)? {
            for v in path {
                out.set(v, true);
            }
            routed += 1;
        }
    }
    Ok(routed)
}

/// Region voxels minimizing `sum of squared distances / valence`.
///
/// Ratios are compared by cross-multiplication so ties are detected
/// exactly; every minimizer is kept, in raster order.
#[must_use]
pub fn select_sources(candidates: &[Voxel], valence: &Grid<u8>) -> Vec<Voxel> {
    if candidates.len() <= 1 {
        return candidates.to_vec();
    }

    let scored: Vec<(Voxel, i64, i64)> = candidates
        .iter()
        .map(|&c| {
            let spread: i64 = candidates.iter().map(|&o| c.distance_squared(o)).sum();
            let weight = i64::from(valence.get(c).unwrap_or(0).max(1));
            (c, spread, weight)
        })
        .collect();

    let Some(&(_, mut best_spread, mut best_weight)) = scored.first() else {
        return Vec::new();
    };
    for &(_, spread, weight) in &scored {
        if spread * best_weight < best_spread * weight {
            best_spread = spread;
            best_weight = weight;
        }
    }

    scored
        .into_iter()
        .filter(|&(_, spread, weight)| spread * best_weight == best_spread * weight)
        .map(|(c, _, _)| c)
        .collect()
}

/// End and middle points adjacent to any voxel of the region, in raster
/// order.
fn find_exits(region: &Region, labels: &Grid<PointLabel>) -> Vec<Voxel> {
    let shape = labels.shape();
    let exits: BTreeSet<Voxel> = region
        .voxels
        .iter()
        .flat_map(|&v| neighbors(shape, v))
        .filter(|&n| labels.get(n).is_some_and(PointLabel::is_exit))
        .collect();
    exits.into_iter().collect()
}
