//! Valence and point-type classification of skeletal voxels.
//!
//! Valence is the number of skeletal neighbors in the full 8-/26-
//! neighborhood. Labels are assigned in two passes: first end and middle
//! points (which depend only on a voxel's own neighbors), then joint and
//! crowded points for voxels of valence above two (which depend on the
//! labels assigned in the first pass).

use crate::neighborhood::{ADJACENT_DISTANCE_SQUARED, foreground_neighbors};
use crate::types::{BinaryVolume, Grid, PointLabel, SkeletonError};

/// Count of skeletal neighbors per voxel; zero on background.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // at most 26 neighbors
pub fn valence(volume: &BinaryVolume) -> Grid<u8> {
    let mut out = Grid::<u8>::new(volume.shape());
    for voxel in volume.voxels() {
        let count = foreground_neighbors(volume, voxel).count();
        out.set(voxel, count as u8);
    }
    out
}

/// Label every skeletal voxel as end, middle, joint, or crowded.
///
/// Rules:
///
/// - valence 0 or 1: end (an isolated voxel is its own end point)
/// - valence 2: middle if the two neighbors are not adjacent to each
///   other (squared distance above 3), crowded otherwise
/// - valence above 2: joint if every skeletal neighbor is an end or
///   middle point, crowded otherwise
///
/// # Errors
///
/// Returns [`SkeletonError::ShapeMismatch`] if `valence` does not share
/// the volume's shape, and [`SkeletonError::LabelSupportMismatch`] if the
/// labelled voxels differ from the skeletal ones.
pub fn classify(volume: &BinaryVolume, valence: &Grid<u8>) -> Result<Grid<PointLabel>, SkeletonError> {
    if valence.shape() != volume.shape() {
        return Err(SkeletonError::ShapeMismatch {
            expected: volume.shape().len(),
            actual: valence.shape().len(),
        });
    }

    let mut labels = Grid::<PointLabel>::new(volume.shape());

    for voxel in volume.voxels() {
        let label = match valence.get(voxel).unwrap_or(0) {
            0 | 1 => PointLabel::End,
            2 => {
                let mut pair = foreground_neighbors(volume, voxel);
                match (pair.next(), pair.next()) {
                    (Some(a), Some(b)) if a.distance_squared(b) > ADJACENT_DISTANCE_SQUARED => {
                        PointLabel::Middle
                    }
                    _ => PointLabel::Crowded,
                }
            }
            _ => continue,
        };
        labels.set(voxel, label);
    }

    // Second pass reads only first-pass labels: neighbors of valence above
    // two are still background here and therefore make a voxel crowded.
    let first_pass = labels.clone();
    for voxel in volume.voxels() {
        if valence.get(voxel).unwrap_or(0) <= 2 {
            continue;
        }
        let clean = foreground_neighbors(volume, voxel)
            .all(|n| first_pass.get(n).is_some_and(PointLabel::is_exit));
        let label = if clean {
            PointLabel::Joint
        } else {
            PointLabel::Crowded
        };
        labels.set(voxel, label);
    }

    let labelled = labels.as_raw().iter().filter(|l| l.is_structure()).count();
    let skeletal = volume.count();
    let support_matches = labels
        .as_raw()
        .iter()
        .zip(volume.as_raw())
        .all(|(l, &on)| l.is_structure() == on);
    if !support_matches {
        return Err(SkeletonError::LabelSupportMismatch { labelled, skeletal });
    }

    Ok(labels)
}

/// Compute valence and labels in one call.
///
/// # Errors
///
/// See [`classify`].
pub fn label_points(volume: &BinaryVolume) -> Result<(Grid<u8>, Grid<PointLabel>), SkeletonError> {
    let valence = valence(volume);
    let labels = classify(volume, &valence)?;
    Ok((valence, labels))
}
