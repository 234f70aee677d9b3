//! Euclidean length helpers shared by routing and segment measurement.

use crate::types::{Spacing, Voxel};

/// Euclidean distance between two voxels in physical units.
#[must_use]
pub fn displacement(a: Voxel, b: Voxel, spacing: Spacing) -> f64 {
    let mut sum = 0.0;
    for axis in 0..3 {
        let d = f64::from(a.0[axis] - b.0[axis]) * spacing.0[axis];
        sum = d.mul_add(d, sum);
    }
    sum.sqrt()
}

/// Curve length of an ordered voxel path.
///
/// When `closed` is set the path is a cycle listed without repeating its
/// first voxel, and the closing step from the last voxel back to the
/// first is included.
#[must_use]
pub fn path_length(path: &[Voxel], closed: bool, spacing: Spacing) -> f64 {
    let open: f64 = path
        .windows(2)
        .map(|w| displacement(w[0], w[1], spacing))
        .sum();
    match (closed, path.first(), path.last()) {
        (true, Some(&first), Some(&last)) if path.len() > 1 => {
            open + displacement(last, first, spacing)
        }
        _ => open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displacement_isotropic() {
        let d = displacement(Voxel::new(0, 0, 0), Voxel::new(0, 3, 4), Spacing::ISOTROPIC);
        assert!((d - 5.0).abs() < 1e-10);
    }

    #[test]
    fn displacement_anisotropic() {
        let spacing = Spacing([10.0, 0.5, 0.5]);
        let d = displacement(Voxel::new(1, 0, 0), Voxel::new(0, 0, 0), spacing);
        assert!((d - 10.0).abs() < 1e-10);
    }

    #[test]
    fn open_path_length() {
        let path = [
            Voxel::planar(0, 0),
            Voxel::planar(0, 1),
            Voxel::planar(1, 2),
        ];
        let len = path_length(&path, false, Spacing::ISOTROPIC);
        assert!((len - (1.0 + 2.0_f64.sqrt())).abs() < 1e-10);
    }

    #[test]
    fn closed_path_includes_closing_step() {
        let square = [
            Voxel::planar(0, 0),
            Voxel::planar(0, 1),
            Voxel::planar(1, 1),
            Voxel::planar(1, 0),
        ];
        assert!((path_length(&square, true, Spacing::ISOTROPIC) - 4.0).abs() < 1e-10);
        assert!((path_length(&square, false, Spacing::ISOTROPIC) - 3.0).abs() < 1e-10);
    }

    #[test]
    fn degenerate_paths_have_zero_length() {
        assert!(path_length(&[], true, Spacing::ISOTROPIC).abs() < 1e-12);
        assert!(path_length(&[Voxel::planar(3, 3)], true, Spacing::ISOTROPIC).abs() < 1e-12);
    }
}
