//! Shared types for the tubeskel skeleton pipeline.

use serde::{Deserialize, Serialize};

use crate::route::CostModelKind;

/// A voxel coordinate, stored as `[z, y, x]`.
///
/// Planar (2D) voxels always carry `z = 0`. The derived ordering is
/// lexicographic over `(z, y, x)`, which makes `Voxel` usable as a key in
/// ordered maps so that every traversal over voxels is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Voxel(pub [i32; 3]);

impl Voxel {
    /// Create a volumetric voxel coordinate.
    #[must_use]
    pub const fn new(z: i32, y: i32, x: i32) -> Self {
        Self([z, y, x])
    }

    /// Create a planar voxel coordinate (`z = 0`).
    #[must_use]
    pub const fn planar(y: i32, x: i32) -> Self {
        Self([0, y, x])
    }

    /// Slice index.
    #[must_use]
    pub const fn z(self) -> i32 {
        self.0[0]
    }

    /// Row index.
    #[must_use]
    pub const fn y(self) -> i32 {
        self.0[1]
    }

    /// Column index.
    #[must_use]
    pub const fn x(self) -> i32 {
        self.0[2]
    }

    /// The voxel displaced by `delta`.
    #[must_use]
    pub const fn offset(self, delta: [i32; 3]) -> Self {
        Self([
            self.0[0] + delta[0],
            self.0[1] + delta[1],
            self.0[2] + delta[2],
        ])
    }

    /// Squared Euclidean distance in lattice units.
    ///
    /// Two distinct voxels are 26-/8-adjacent exactly when this is `<= 3`.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(&a, &b)| {
                let d = i64::from(a) - i64::from(b);
                d * d
            })
            .sum()
    }
}

/// Whether a grid is a planar image or a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimensionality {
    /// 2D image; neighborhoods have 8 offsets.
    Two,
    /// 3D volume; neighborhoods have 26 offsets.
    Three,
}

impl Dimensionality {
    /// Number of spatial axes.
    #[must_use]
    pub const fn ndim(self) -> usize {
        match self {
            Self::Two => 2,
            Self::Three => 3,
        }
    }
}

/// Extent of a rectangular voxel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    /// Planar or volumetric.
    pub dims: Dimensionality,
    /// Number of slices (always 1 for planar grids).
    pub depth: usize,
    /// Number of rows.
    pub height: usize,
    /// Number of columns.
    pub width: usize,
}

impl Shape {
    /// A planar `height x width` grid.
    #[must_use]
    pub const fn planar(height: usize, width: usize) -> Self {
        Self {
            dims: Dimensionality::Two,
            depth: 1,
            height,
            width,
        }
    }

    /// A volumetric `depth x height x width` grid.
    #[must_use]
    pub const fn volumetric(depth: usize, height: usize, width: usize) -> Self {
        Self {
            dims: Dimensionality::Three,
            depth,
            height,
            width,
        }
    }

    /// Total number of cells.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.depth * self.height * self.width
    }

    /// Returns `true` if the grid has no cells.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `voxel` lies inside the grid.
    #[must_use]
    pub fn contains(&self, voxel: Voxel) -> bool {
        let inside = |c: i32, extent: usize| usize::try_from(c).is_ok_and(|c| c < extent);
        inside(voxel.z(), self.depth) && inside(voxel.y(), self.height) && inside(voxel.x(), self.width)
    }

    /// Linear (row-major, `z` slowest) index of `voxel`, or `None` if
    /// it lies outside the grid.
    #[must_use]
    pub fn index(&self, voxel: Voxel) -> Option<usize> {
        if !self.contains(voxel) {
            return None;
        }
        let z = usize::try_from(voxel.z()).ok()?;
        let y = usize::try_from(voxel.y()).ok()?;
        let x = usize::try_from(voxel.x()).ok()?;
        Some((z * self.height + y) * self.width + x)
    }

    /// Voxel coordinate of a linear index.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub const fn voxel(&self, index: usize) -> Voxel {
        let x = index % self.width;
        let y = (index / self.width) % self.height;
        let z = index / (self.width * self.height);
        Voxel::new(z as i32, y as i32, x as i32)
    }
}

/// A dense grid of values over a [`Shape`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid<T> {
    shape: Shape,
    data: Vec<T>,
}

/// A binary skeleton volume: `true` marks skeletal voxels.
pub type BinaryVolume = Grid<bool>;

impl<T: Copy + Default> Grid<T> {
    /// A grid with every cell set to `T::default()`.
    #[must_use]
    pub fn new(shape: Shape) -> Self {
        Self::filled(shape, T::default())
    }

    /// A grid with every cell set to `value`.
    #[must_use]
    pub fn filled(shape: Shape, value: T) -> Self {
        Self {
            shape,
            data: vec![value; shape.len()],
        }
    }

    /// Wrap an existing row-major buffer.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::ShapeMismatch`] if `data.len()` does not
    /// match the number of cells in `shape`.
    pub fn from_raw(shape: Shape, data: Vec<T>) -> Result<Self, SkeletonError> {
        if data.len() != shape.len() {
            return Err(SkeletonError::ShapeMismatch {
                expected: shape.len(),
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// The grid extent.
    #[must_use]
    pub const fn shape(&self) -> Shape {
        self.shape
    }

    /// Value at `voxel`, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, voxel: Voxel) -> Option<T> {
        self.shape.index(voxel).map(|i| self.data[i])
    }

    /// Set the value at `voxel`. Returns `false` if it lies outside the grid.
    pub fn set(&mut self, voxel: Voxel, value: T) -> bool {
        match self.shape.index(voxel) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// The underlying row-major buffer.
    #[must_use]
    pub fn as_raw(&self) -> &[T] {
        &self.data
    }

    /// Iterate over `(voxel, value)` pairs in raster order.
    pub fn iter(&self) -> impl Iterator<Item = (Voxel, T)> + '_ {
        self.data
            .iter()
            .enumerate()
            .map(|(i, &v)| (self.shape.voxel(i), v))
    }

    /// Apply `f` to every cell, producing a grid of the same shape.
    #[must_use]
    pub fn map<U, F: Fn(T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            shape: self.shape,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

impl Grid<bool> {
    /// A binary volume with exactly `voxels` set. Voxels outside the
    /// grid are ignored.
    #[must_use]
    pub fn from_voxels<I: IntoIterator<Item = Voxel>>(shape: Shape, voxels: I) -> Self {
        let mut volume = Self::new(shape);
        for v in voxels {
            volume.set(v, true);
        }
        volume
    }

    /// Skeletal voxels in raster order.
    pub fn voxels(&self) -> impl Iterator<Item = Voxel> + '_ {
        self.iter().filter(|&(_, on)| on).map(|(v, _)| v)
    }

    /// Number of skeletal voxels.
    #[must_use]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&on| on).count()
    }
}

/// Categorical point type of a skeletal voxel.
///
/// The discriminants are the label codes used by the routing cost model
/// ([`CostModelKind::LabelValue`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum PointLabel {
    /// Not part of the skeleton.
    #[default]
    Background = 0,
    /// One skeletal neighbor (or none, for an isolated voxel).
    End = 1,
    /// Two skeletal neighbors on opposite sides.
    Middle = 2,
    /// A clean branch point touching only end and middle points.
    Joint = 3,
    /// Ambiguous local topology; resolved by routing.
    Crowded = 4,
}

impl PointLabel {
    /// Numeric label code.
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Whether the label marks a skeletal voxel.
    #[must_use]
    pub const fn is_structure(self) -> bool {
        !matches!(self, Self::Background)
    }

    /// End and middle points are the candidate exits of a crowded region.
    #[must_use]
    pub const fn is_exit(self) -> bool {
        matches!(self, Self::End | Self::Middle)
    }
}

/// Physical voxel size along `(z, y, x)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spacing(pub [f64; 3]);

impl Spacing {
    /// Unit spacing along every axis.
    pub const ISOTROPIC: Self = Self([1.0, 1.0, 1.0]);
}

impl Default for Spacing {
    fn default() -> Self {
        Self::ISOTROPIC
    }
}

/// Configuration for skeleton reduction and segment decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkeletonConfig {
    /// Cost landscape used when routing through crowded regions.
    pub cost_model: CostModelKind,

    /// Physical voxel size used for segment lengths and displacements.
    pub spacing: Spacing,

    /// Whether [`crate::process`] removes redundant 3-clique edges after
    /// building the skeleton graph.
    pub prune_cliques: bool,
}

impl SkeletonConfig {
    /// Default penalty for routing through background voxels.
    pub const DEFAULT_BACKGROUND_COST: f64 = 255.0;
    /// Default voxel spacing.
    pub const DEFAULT_SPACING: Spacing = Spacing::ISOTROPIC;
    /// Default for [`prune_cliques`](Self::prune_cliques).
    pub const DEFAULT_PRUNE_CLIQUES: bool = true;

    /// Check the configuration for values the algorithms cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::InvalidConfig`] if the background cost is
    /// not strictly positive and finite, or if any spacing component is
    /// not strictly positive and finite.
    pub fn validate(&self) -> Result<(), SkeletonError> {
        let background = self.cost_model.background();
        if !(background.is_finite() && background > 0.0) {
            return Err(SkeletonError::InvalidConfig(format!(
                "background cost must be positive and finite, got {background}"
            )));
        }
        if let Some(s) = self
            .spacing
            .0
            .iter()
            .find(|s| !(s.is_finite() && **s > 0.0))
        {
            return Err(SkeletonError::InvalidConfig(format!(
                "voxel spacing must be positive and finite, got {s}"
            )));
        }
        Ok(())
    }
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            cost_model: CostModelKind::default(),
            spacing: Self::DEFAULT_SPACING,
            prune_cliques: Self::DEFAULT_PRUNE_CLIQUES,
        }
    }
}

/// Errors raised by skeleton reduction and decomposition.
///
/// Most variants are invariant violations: they indicate malformed input
/// or a bug in the algorithm, and the computation for the affected unit
/// is abandoned rather than continued with inconsistent state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkeletonError {
    /// A buffer did not match the number of cells of its shape.
    #[error("buffer has {actual} cells, shape requires {expected}")]
    ShapeMismatch {
        /// Cells required by the shape.
        expected: usize,
        /// Cells supplied.
        actual: usize,
    },

    /// Configuration is invalid.
    #[error("invalid skeleton configuration: {0}")]
    InvalidConfig(String),

    /// A graph edge connected a node to itself.
    #[error("self-loop at node {node:?}")]
    SelfLoop {
        /// The offending node.
        node: Voxel,
    },

    /// Point labelling did not cover exactly the skeletal voxels.
    #[error("label support ({labelled} voxels) differs from skeleton support ({skeletal} voxels)")]
    LabelSupportMismatch {
        /// Voxels carrying a non-background label.
        labelled: usize,
        /// Skeletal voxels in the input.
        skeletal: usize,
    },

    /// No route exists between a crowded-region source and an exit.
    #[error("no route from {from:?} to {to:?} inside the crowded-region window")]
    UnreachableRoute {
        /// Route source.
        from: Voxel,
        /// Route destination.
        to: Voxel,
    },

    /// Unit-width reduction changed the number of connected components.
    #[error("unit-width reduction changed component count from {before} to {after}")]
    TopologyChanged {
        /// Components in the input skeleton.
        before: usize,
        /// Components in the reduced skeleton.
        after: usize,
    },

    /// Clique pruning disconnected the graph.
    #[error("clique pruning changed component count from {before} to {after}")]
    CliquePruneDisconnected {
        /// Components before pruning.
        before: usize,
        /// Components after pruning.
        after: usize,
    },

    /// Segment tracing left edges unattributed in a component.
    #[error("component {component} kept {remaining} untraced edges")]
    ResidualEdges {
        /// Index of the disjoint component.
        component: usize,
        /// Edges left in its working graph.
        remaining: usize,
    },
}
