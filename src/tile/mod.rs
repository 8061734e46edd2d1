//! Tile pyramid, lifecycle and memory management.
//!
//! This module turns a probed image into a pyramid of decodable tiles and
//! keeps the right subset of them loaded as the viewport moves.
//!
//! # Architecture
//!
//! The manager sits between the host widget and the decode layer:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Host widget (viewport events)     │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              TileManager                │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ TilePyramid  │  │ TileMemoryCache │  │
//! │  │ (levels and  │  │ (decoded tiles, │  │
//! │  │  src rects)  │  │  LRU by bytes)  │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │      RegionDecoder + BitmapPool         │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileManager`]: state machine driving probe, activation, tile decode
//!   and disposal for one bound image source
//! - [`TilePyramid`]: immutable level/grid/rect plan for one image size
//! - [`TileBitmap`]: shared handle to a decoded tile raster
//! - [`BitmapPool`] / [`LruBitmapPool`]: reusable raster buffers
//! - [`TileMemoryCache`] / [`LruTileCache`]: decoded-tile cache keyed by
//!   source, sample size and rect
//! - [`ViewportSnapshot`]: value-type description of what the host shows
//! - [`ChangeDispatcher`]: versioned change notification for renderers
//!
//! # Example
//!
//! ```
//! use gigatile::geom::IntSize;
//! use gigatile::tile::TilePyramid;
//!
//! let pyramid = TilePyramid::build(IntSize::new(4000, 2000), IntSize::new(512, 512), 50);
//!
//! // Coarsest level first; it always holds exactly one tile.
//! let coarsest = pyramid.coarsest().unwrap();
//! assert_eq!(coarsest.tiles.len(), 1);
//!
//! // Zooming in selects finer levels by sample size.
//! let finest = pyramid.level_for(1).unwrap();
//! assert_eq!(finest.sample_size, 1);
//! ```

mod bitmap;
mod cache;
mod events;
mod manager;
mod pool;
mod pyramid;
mod viewport;

pub use bitmap::TileBitmap;
pub use cache::{
    LruTileCache, NoopTileCache, TileCacheKey, TileMemoryCache, DEFAULT_TILE_CACHE_CAPACITY,
};
pub use events::{ChangeDispatcher, ChangeListener, ListenerId};
pub use manager::{
    ManagerDiagnostics, ManagerState, TileManager, TileSnapshot, TileState,
};
pub use pool::{BitmapPool, LruBitmapPool, NoopBitmapPool, DEFAULT_POOL_CAPACITY};
pub use pyramid::{PyramidLevel, TileCoord, TileDescriptor, TilePyramid};
pub use viewport::ViewportSnapshot;
