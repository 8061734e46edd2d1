//! Tile pyramid construction.
//!
//! A pyramid is the complete, immutable tiling plan for one image: a list
//! of levels, coarsest first, where each level partitions the image into a
//! row-major grid of tiles decoded at one power-of-two sample size.
//!
//! # Invariants
//!
//! - Sample sizes strictly decrease from level to level, always halving
//! - The coarsest level holds exactly one tile
//! - Each level's tiles cover the image exactly, without gaps or overlaps
//!
//! Tile rectangles are in full-resolution upright image coordinates; the
//! sample size only describes the decode factor.

use std::fmt;

use crate::geom::{self, IntOffset, IntRect, IntSize};

// =============================================================================
// Tile Identity
// =============================================================================

/// Grid position of a tile within its level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    /// Create a new coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Immutable description of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TileDescriptor {
    /// Position in the level's grid
    pub coord: TileCoord,

    /// Full-resolution rectangle this tile covers
    pub src_rect: IntRect,

    /// Decode factor of the level this tile belongs to
    pub sample_size: u32,
}

// =============================================================================
// Pyramid
// =============================================================================

/// One pyramid level: a full partition of the image at one sample size.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PyramidLevel {
    /// Decode factor for every tile of this level
    pub sample_size: u32,

    /// Grid dimensions (columns, rows)
    pub grid: IntOffset,

    /// Tiles in row-major order
    pub tiles: Vec<TileDescriptor>,
}

impl PyramidLevel {
    /// Number of tiles in this level.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

/// The complete tiling plan for one image, coarsest level first.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TilePyramid {
    image_size: IntSize,
    levels: Vec<PyramidLevel>,
}

impl TilePyramid {
    /// Build the pyramid for an image.
    ///
    /// Starting at sample size 1, the sample size doubles until a level
    /// fits in a single tile; that level is the coarsest. An empty image
    /// (or degenerate options) yields an empty pyramid.
    pub fn build(
        image_size: IntSize,
        preferred_tile_size: IntSize,
        single_direction_max_tiles: u32,
    ) -> Self {
        let max_grid = geom::max_grid_size(image_size, single_direction_max_tiles);
        let mut levels = Vec::new();
        if !image_size.is_empty() && !preferred_tile_size.is_empty() {
            let mut sample_size = 1u32;
            loop {
                let grid =
                    geom::grid_size_for_level(image_size, preferred_tile_size, sample_size, max_grid);
                if grid.x <= 0 || grid.y <= 0 {
                    break;
                }
                let tiles = tiles_for_grid(image_size, grid, sample_size);
                let single_tile = tiles.len() <= 1;
                levels.push(PyramidLevel {
                    sample_size,
                    grid,
                    tiles,
                });
                if single_tile {
                    break;
                }
                match sample_size.checked_mul(2) {
                    Some(next) => sample_size = next,
                    None => break,
                }
            }
            levels.reverse();
        }
        Self { image_size, levels }
    }

    /// The image this pyramid partitions.
    pub fn image_size(&self) -> IntSize {
        self.image_size
    }

    /// Levels in descending sample-size order (coarsest first).
    pub fn levels(&self) -> &[PyramidLevel] {
        &self.levels
    }

    /// Whether the pyramid holds no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// The single-tile level with the largest sample size.
    pub fn coarsest(&self) -> Option<&PyramidLevel> {
        self.levels.first()
    }

    /// The sample-size-1 level.
    pub fn finest(&self) -> Option<&PyramidLevel> {
        self.levels.last()
    }

    /// Look up the level for a sample size.
    ///
    /// Requests coarser than the pyramid clamp to the coarsest level, so
    /// extreme zoom-out still serves the single-tile level.
    pub fn level_for(&self, sample_size: u32) -> Option<&PyramidLevel> {
        let coarsest = self.levels.first()?;
        if sample_size >= coarsest.sample_size {
            return Some(coarsest);
        }
        self.levels
            .iter()
            .find(|level| level.sample_size == sample_size)
    }
}

/// Partition the image into `grid` uniform tiles, clipping the last row
/// and column to the image bounds.
fn tiles_for_grid(image_size: IntSize, grid: IntOffset, sample_size: u32) -> Vec<TileDescriptor> {
    let tile_width = ceil_div(image_size.width, grid.x);
    let tile_height = ceil_div(image_size.height, grid.y);
    let mut tiles = Vec::with_capacity((grid.x as usize) * (grid.y as usize));
    for y in 0..grid.y {
        for x in 0..grid.x {
            let left = x * tile_width;
            let top = y * tile_height;
            let src_rect = IntRect::new(
                left,
                top,
                (left + tile_width).min(image_size.width),
                (top + tile_height).min(image_size.height),
            );
            tiles.push(TileDescriptor {
                coord: TileCoord::new(x, y),
                src_rect,
                sample_size,
            });
        }
    }
    tiles
}

fn ceil_div(a: i32, b: i32) -> i32 {
    (a + b - 1) / b
}

// =============================================================================
// Tests
// =============================================================================
