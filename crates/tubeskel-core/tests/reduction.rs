//! Integration test: thick skeletons through the full pipeline.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use tubeskel_core::{
    BinaryVolume, CostModelKind, Shape, SkeletonConfig, Voxel, process, reduce_to_unit_width,
};

/// A bar three voxels thick, rows 1..=3 and columns 0..=9.
fn thick_bar() -> BinaryVolume {
    let mut bar = BinaryVolume::new(Shape::planar(5, 10));
    for y in 1..=3 {
        for x in 0..10 {
            bar.set(Voxel::planar(y, x), true);
        }
    }
    bar
}

#[test]
fn thick_bar_collapses_to_its_centre() {
    let result = process(&thick_bar(), &SkeletonConfig::default()).unwrap();
    let expected = BinaryVolume::from_voxels(
        Shape::planar(5, 10),
        [Voxel::planar(2, 4), Voxel::planar(2, 5)],
    );
    assert_eq!(result.skeleton.as_ref(), Some(&expected));
    assert_eq!(result.bifurcations.total_segments, 0);
    assert_eq!(result.statistics.total_segments(), 1);
    assert!((result.statistics.segments[0].length - 1.0).abs() < 1e-10);
}

#[test]
fn thick_tube_collapses_to_its_centre() {
    let shape = Shape::volumetric(5, 5, 8);
    let mut tube = BinaryVolume::new(shape);
    for z in 1..=3 {
        for y in 1..=3 {
            for x in 0..8 {
                tube.set(Voxel::new(z, y, x), true);
            }
        }
    }
    let reduced = reduce_to_unit_width(&tube, &SkeletonConfig::default()).unwrap();
    let expected = BinaryVolume::from_voxels(shape, [Voxel::new(2, 2, 3), Voxel::new(2, 2, 4)]);
    assert_eq!(reduced, expected);
}

#[test]
fn reduction_is_idempotent_under_both_cost_models() {
    for cost_model in [
        CostModelKind::LabelValue {
            background: SkeletonConfig::DEFAULT_BACKGROUND_COST,
        },
        CostModelKind::Uniform {
            background: SkeletonConfig::DEFAULT_BACKGROUND_COST,
        },
    ] {
        let config = SkeletonConfig {
            cost_model,
            ..SkeletonConfig::default()
        };
        let once = reduce_to_unit_width(&thick_bar(), &config).unwrap();
        let twice = reduce_to_unit_width(&once, &config).unwrap();
        assert_eq!(once, twice);
    }
}
