//! PNG slice loading and saving.
//!
//! A single PNG is read as a planar volume. A directory is read as a
//! volumetric stack: every `*.png` inside it, ordered by file name, is one
//! `z` slice. Nonzero luma marks a skeletal voxel.

use std::path::{Path, PathBuf};

use image::GrayImage;
use tubeskel_core::{BinaryVolume, Grid, Shape, SkeletonError};

/// Errors raised while reading or writing slices.
#[derive(Debug, thiserror::Error)]
pub enum SliceError {
    #[error("reading {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("no PNG slices in {}", path.display())]
    NoSlices { path: PathBuf },

    #[error(
        "slice {} is {}x{}, expected {}x{}",
        path.display(), actual.0, actual.1, expected.0, expected.1
    )]
    SliceSize {
        path: PathBuf,
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("volume of {width}x{height} does not fit a PNG slice")]
    TooLarge { width: usize, height: usize },

    #[error(transparent)]
    Volume(#[from] SkeletonError),
}

/// Load a PNG file or a directory of PNG slices.
///
/// # Errors
///
/// Returns a [`SliceError`] if the path cannot be read, a slice cannot be
/// decoded, the directory holds no PNG files, or slices differ in size.
pub fn load_volume(path: &Path) -> Result<BinaryVolume, SliceError> {
    if path.is_dir() {
        load_stack(path)
    } else {
        let image = image::open(path)?.to_luma8();
        let shape = Shape::planar(image.height() as usize, image.width() as usize);
        Ok(Grid::from_raw(shape, foreground(&image))?)
    }
}

fn load_stack(dir: &Path) -> Result<BinaryVolume, SliceError> {
    let read_err = |source| SliceError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let path = entry.map_err(read_err)?.path();
        if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        {
            paths.push(path);
        }
    }
    paths.sort();

    let Some(first) = paths.first() else {
        return Err(SliceError::NoSlices {
            path: dir.to_path_buf(),
        });
    };
    let first = image::open(first)?.to_luma8();
    let expected = first.dimensions();

    let mut data = foreground(&first);
    for path in &paths[1..] {
        let slice = image::open(path)?.to_luma8();
        if slice.dimensions() != expected {
            return Err(SliceError::SliceSize {
                path: path.clone(),
                expected,
                actual: slice.dimensions(),
            });
        }
        data.extend(foreground(&slice));
    }

    let shape = Shape::volumetric(paths.len(), expected.1 as usize, expected.0 as usize);
    Ok(Grid::from_raw(shape, data)?)
}

fn foreground(image: &GrayImage) -> Vec<bool> {
    image.pixels().map(|p| p.0[0] != 0).collect()
}

/// Write `volume` into `dir` as `slice_0000.png`, `slice_0001.png`, ...
///
/// Skeletal voxels are written as 255, background as 0. The directory is
/// created if missing. Returns the written paths in slice order.
///
/// # Errors
///
/// Returns a [`SliceError`] if the directory cannot be created, the slice
/// extent does not fit `u32`, or a slice cannot be encoded.
pub fn write_volume(volume: &BinaryVolume, dir: &Path) -> Result<Vec<PathBuf>, SliceError> {
    std::fs::create_dir_all(dir).map_err(|source| SliceError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let shape = volume.shape();
    let too_large = || SliceError::TooLarge {
        width: shape.width,
        height: shape.height,
    };
    let width = u32::try_from(shape.width).map_err(|_| too_large())?;
    let height = u32::try_from(shape.height).map_err(|_| too_large())?;
    let plane = shape.width * shape.height;

    let mut written = Vec::with_capacity(shape.depth);
    if plane == 0 {
        return Ok(written);
    }
    for (z, cells) in volume.as_raw().chunks(plane).enumerate() {
        let pixels = cells.iter().map(|&on| if on { 255 } else { 0 }).collect();
        let image = GrayImage::from_raw(width, height, pixels).ok_or_else(too_large)?;
        let path = dir.join(format!("slice_{z:04}.png"));
        image.save(&path)?;
        written.push(path);
    }
    Ok(written)
}
