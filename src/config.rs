//! Configuration for the subsampling engine and the diagnostic CLI.
//!
//! [`EngineOptions`] is the library-level knob set consumed by
//! [`TileManager`](crate::tile::TileManager); hosts construct it directly.
//! [`Cli`] is the clap surface of the `gigatile` binary and maps onto
//! `EngineOptions` via [`Cli::engine_options`].
//!
//! # Example
//!
//! ```
//! use gigatile::config::EngineOptions;
//!
//! let options = EngineOptions::default();
//! assert!(options.validate().is_ok());
//! assert_eq!(options.preferred_tile_size.width, 512);
//! ```
//!
//! # Environment Variables
//!
//! Every CLI option can also be set via environment variables with the
//! `GIGATILE_` prefix:
//!
//! - `GIGATILE_TILE_SIZE` - Preferred tile edge in pixels (default: 512)
//! - `GIGATILE_MAX_TILES` - Tile grid cap on the longer axis (default: 50)
//! - `GIGATILE_PRELOAD_MARGIN` - Preload margin factor (default: 0.5)
//! - `GIGATILE_PARALLEL_DECODES` - Concurrent tile decodes (default: 4)

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::geom::{IntRect, IntSize, DEFAULT_PRELOAD_MARGIN_FACTOR};

// =============================================================================
// Default Values
// =============================================================================

/// Default preferred tile edge in pixels.
pub const DEFAULT_TILE_SIZE: i32 = 512;

/// Smallest accepted tile edge. Below this the grid cap and the tile size
/// can disagree about how many tiles a level needs.
pub const MIN_TILE_SIZE: i32 = 64;

/// Default cap on the tile grid's longer axis.
pub const DEFAULT_MAX_TILES_PER_DIRECTION: u32 = 50;

/// Default number of concurrently running tile decodes.
pub const DEFAULT_MAX_PARALLEL_DECODES: usize = 4;

// =============================================================================
// Engine Options
// =============================================================================

/// Tuning knobs for pyramid layout and decode scheduling.
///
/// The preload margin and the decode bound are both host-visible tunables;
/// the defaults suit interactive panning on commodity hardware.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EngineOptions {
    /// Preferred tile extent; actual tiles shrink when the grid cap wins.
    pub preferred_tile_size: IntSize,

    /// Upper bound on the tile grid's longer axis.
    pub single_direction_max_tiles: u32,

    /// Fraction of the visible rect kept loaded beyond each edge.
    pub preload_margin_factor: f32,

    /// Maximum number of tile decodes running at once.
    pub max_parallel_decodes: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preferred_tile_size: IntSize::new(DEFAULT_TILE_SIZE, DEFAULT_TILE_SIZE),
            single_direction_max_tiles: DEFAULT_MAX_TILES_PER_DIRECTION,
            preload_margin_factor: DEFAULT_PRELOAD_MARGIN_FACTOR,
            max_parallel_decodes: DEFAULT_MAX_PARALLEL_DECODES,
        }
    }
}

impl EngineOptions {
    /// Validate the options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.preferred_tile_size.width < MIN_TILE_SIZE
            || self.preferred_tile_size.height < MIN_TILE_SIZE
        {
            return Err(format!(
                "preferred_tile_size must be at least {MIN_TILE_SIZE}x{MIN_TILE_SIZE}, got {}",
                self.preferred_tile_size
            ));
        }
        if self.single_direction_max_tiles == 0 {
            return Err("single_direction_max_tiles must be greater than 0".to_string());
        }
        if !self.preload_margin_factor.is_finite() || self.preload_margin_factor < 0.0 {
            return Err(format!(
                "preload_margin_factor must be a finite non-negative number, got {}",
                self.preload_margin_factor
            ));
        }
        if self.max_parallel_decodes == 0 {
            return Err("max_parallel_decodes must be greater than 0".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Gigatile - tile planning and region decoding for huge images.
///
/// Probes an image, builds its subsampling pyramid and reports which tiles
/// a hypothetical viewport would keep loaded. Useful for checking how a
/// given image tiles without running a host application.
#[derive(Parser, Debug, Clone)]
#[command(name = "gigatile")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Preferred tile edge in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "GIGATILE_TILE_SIZE")]
    pub tile_size: i32,

    /// Maximum number of tiles along the grid's longer axis.
    #[arg(long, default_value_t = DEFAULT_MAX_TILES_PER_DIRECTION, env = "GIGATILE_MAX_TILES")]
    pub max_tiles: u32,

    /// Fraction of the visible rect kept loaded beyond each edge.
    #[arg(long, default_value_t = DEFAULT_PRELOAD_MARGIN_FACTOR, env = "GIGATILE_PRELOAD_MARGIN")]
    pub preload_margin: f32,

    /// Maximum number of concurrent tile decodes.
    #[arg(long, default_value_t = DEFAULT_MAX_PARALLEL_DECODES, env = "GIGATILE_PARALLEL_DECODES")]
    pub parallel_decodes: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Probe an image and print its info and pyramid plan.
    Inspect {
        /// Path to the image file.
        image: PathBuf,
    },

    /// Compute the active tile set for a hypothetical viewport.
    Plan {
        /// Path to the image file.
        image: PathBuf,

        /// Zoom factor applied to the displayed content.
        #[arg(long)]
        scale: f32,

        /// Content size the host displays, as WxH.
        ///
        /// Defaults to the image fitted into a 1920x1080 box.
        #[arg(long, value_parser = parse_size)]
        content: Option<IntSize>,

        /// Visible content rectangle, as "left,top,right,bottom".
        ///
        /// Defaults to the full content rect.
        #[arg(long, value_parser = parse_rect)]
        viewport: Option<IntRect>,

        /// Decode the planned tiles and report their sizes.
        #[arg(long, default_value_t = false)]
        decode: bool,
    },
}

impl Cli {
    /// Engine options corresponding to the global CLI flags.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            preferred_tile_size: IntSize::new(self.tile_size, self.tile_size),
            single_direction_max_tiles: self.max_tiles,
            preload_margin_factor: self.preload_margin,
            max_parallel_decodes: self.parallel_decodes,
        }
    }

    /// Validate the CLI flags; wraps [`EngineOptions::validate`].
    pub fn validate(&self) -> Result<(), String> {
        self.engine_options().validate()
    }
}

/// Parse a "WxH" size argument.
fn parse_size(value: &str) -> Result<IntSize, String> {
    let (width, height) = value
        .split_once(|c| c == 'x' || c == 'X')
        .ok_or_else(|| format!("expected WxH, got '{value}'"))?;
    let width: i32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{width}'"))?;
    let height: i32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{height}'"))?;
    if width <= 0 || height <= 0 {
        return Err(format!("size must be positive, got {width}x{height}"));
    }
    Ok(IntSize::new(width, height))
}

/// Parse a "left,top,right,bottom" rectangle argument.
fn parse_rect(value: &str) -> Result<IntRect, String> {
    let parts: Vec<&str> = value.split(',').collect();
    if parts.len() != 4 {
        return Err(format!("expected left,top,right,bottom, got '{value}'"));
    }
    let mut edges = [0i32; 4];
    for (edge, part) in edges.iter_mut().zip(&parts) {
        *edge = part
            .trim()
            .parse()
            .map_err(|_| format!("invalid coordinate '{part}'"))?;
    }
    let rect = IntRect::new(edges[0], edges[1], edges[2], edges[3]);
    if rect.is_empty() {
        return Err(format!("rectangle is empty: {rect}"));
    }
    Ok(rect)
}

// =============================================================================
// Tests
// =============================================================================
