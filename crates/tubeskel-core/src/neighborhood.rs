//! Lattice neighborhoods and connected-component labeling.
//!
//! Offsets are enumerated in the lexicographic order of the Cartesian
//! product `(-1, 0, 1)^d` with the center removed, so every scan over a
//! neighborhood visits neighbors in the same order on every run.
//! Connectivity is always full: 8 in the plane, 26 in a volume.

use std::collections::BTreeMap;

use petgraph::unionfind::UnionFind;

use crate::types::{BinaryVolume, Dimensionality, Shape, Voxel};

const fn build_offsets<const N: usize>(planar: bool) -> [[i32; 3]; N] {
    let mut out = [[0; 3]; N];
    let mut n = 0;
    let (mut dz, z_end) = if planar { (0, 0) } else { (-1, 1) };
    while dz <= z_end {
        let mut dy = -1;
        while dy <= 1 {
            let mut dx = -1;
            while dx <= 1 {
                if !(dz == 0 && dy == 0 && dx == 0) {
                    out[n] = [dz, dy, dx];
                    n += 1;
                }
                dx += 1;
            }
            dy += 1;
        }
        dz += 1;
    }
    out
}

/// The 8 planar neighbor offsets (`dz` is always 0).
pub const OFFSETS_2D: [[i32; 3]; 8] = build_offsets(true);

/// The 26 volumetric neighbor offsets.
pub const OFFSETS_3D: [[i32; 3]; 26] = build_offsets(false);

/// Squared lattice distance at or below which two distinct voxels are
/// neighbors.
pub const ADJACENT_DISTANCE_SQUARED: i64 = 3;

/// Neighbor offsets for the given dimensionality.
#[must_use]
pub const fn offsets(dims: Dimensionality) -> &'static [[i32; 3]] {
    match dims {
        Dimensionality::Two => &OFFSETS_2D,
        Dimensionality::Three => &OFFSETS_3D,
    }
}

/// In-bounds neighbors of `voxel`.
pub fn neighbors(shape: Shape, voxel: Voxel) -> impl Iterator<Item = Voxel> {
    offsets(shape.dims)
        .iter()
        .map(move |&d| voxel.offset(d))
        .filter(move |&n| shape.contains(n))
}

/// Skeletal neighbors of `voxel` in `volume`.
pub fn foreground_neighbors(volume: &BinaryVolume, voxel: Voxel) -> impl Iterator<Item = Voxel> + '_ {
    neighbors(volume.shape(), voxel).filter(|&n| volume.get(n).unwrap_or(false))
}

/// Inclusive axis-aligned bounds of a set of voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    /// Smallest coordinate along every axis.
    pub min: Voxel,
    /// Largest coordinate along every axis.
    pub max: Voxel,
}

impl BoundingBox {
    /// A box covering a single voxel.
    #[must_use]
    pub const fn around(voxel: Voxel) -> Self {
        Self {
            min: voxel,
            max: voxel,
        }
    }

    /// Grow the box to include `voxel`.
    pub fn include(&mut self, voxel: Voxel) {
        for axis in 0..3 {
            self.min.0[axis] = self.min.0[axis].min(voxel.0[axis]);
            self.max.0[axis] = self.max.0[axis].max(voxel.0[axis]);
        }
    }

    /// The box grown by one voxel on every side, clipped to `shape`.
    ///
    /// Planar shapes are never padded along `z`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn padded(&self, shape: Shape) -> Self {
        let extents = [shape.depth, shape.height, shape.width];
        let mut out = *self;
        for axis in 0..3 {
            let upper = extents[axis] as i32 - 1;
            out.min.0[axis] = (self.min.0[axis] - 1).clamp(0, upper.max(0));
            out.max.0[axis] = (self.max.0[axis] + 1).clamp(0, upper.max(0));
        }
        out
    }

    /// Whether `voxel` lies inside the box.
    #[must_use]
    pub fn contains(&self, voxel: Voxel) -> bool {
        (0..3).all(|axis| self.min.0[axis] <= voxel.0[axis] && voxel.0[axis] <= self.max.0[axis])
    }

    /// Every voxel inside the box, in raster order.
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + '_ {
        let [z0, y0, x0] = self.min.0;
        let [z1, y1, x1] = self.max.0;
        (z0..=z1).flat_map(move |z| {
            (y0..=y1).flat_map(move |y| (x0..=x1).map(move |x| Voxel::new(z, y, x)))
        })
    }
}

/// One connected component of a binary volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    /// Member voxels in raster order.
    pub voxels: Vec<Voxel>,
    /// Tight bounds of the members.
    pub bounds: BoundingBox,
}

/// Label the connected components of `volume`.
///
/// Components are returned in the raster order of their first voxel.
#[must_use]
pub fn label_components(volume: &BinaryVolume) -> Vec<Region> {
    let shape = volume.shape();
    let mut uf = UnionFind::<usize>::new(shape.len());

    for voxel in volume.voxels() {
        let Some(i) = shape.index(voxel) else {
            continue;
        };
        for n in foreground_neighbors(volume, voxel) {
            if let Some(j) = shape.index(n)
                && j < i
            {
                uf.union(i, j);
            }
        }
    }

    // Root -> position in `regions`, assigned in first-seen raster order.
    let mut slot_of_root: BTreeMap<usize, usize> = BTreeMap::new();
    let mut regions: Vec<Region> = Vec::new();
    for voxel in volume.voxels() {
        let Some(i) = shape.index(voxel) else {
            continue;
        };
        let root = uf.find_mut(i);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            regions.push(Region {
                voxels: Vec::new(),
                bounds: BoundingBox::around(voxel),
            });
            regions.len() - 1
        });
        let region = &mut regions[slot];
        region.voxels.push(voxel);
        region.bounds.include(voxel);
    }
    regions
}

/// Number of connected components of `volume`.
#[must_use]
pub fn count_components(volume: &BinaryVolume) -> usize {
    label_components(volume).len()
}
