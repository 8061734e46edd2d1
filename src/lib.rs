//! # Gigatile
//!
//! Viewport-driven subsampling for images far too large to decode whole.
//!
//! This library keeps a zoomable view over a huge image responsive by never
//! decoding more than the viewer can see: it plans a pyramid of power-of-two
//! sample levels, watches the host's viewport, and region-decodes only the
//! tiles the current view needs, recycling their buffers as the view moves.
//!
//! ## Features
//!
//! - **Pyramid planning**: pure integer math from image size to levels,
//!   grids and per-tile source rectangles
//! - **Viewport-driven lifecycle**: a state machine that requests, cancels
//!   and disposes tiles as the host pans, zooms, pauses and rebinds
//! - **EXIF-aware region decode**: tile rectangles live in upright space;
//!   orientation is applied per tile, not per image
//! - **Bounded memory**: a reusable bitmap pool plus an LRU cache of
//!   decoded tiles, both byte-budgeted and shareable across managers
//! - **Host-agnostic seams**: sources, decode backends, pools and caches
//!   are all capability traits
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`geom`] - integer geometry and the stateless planning math
//! - [`source`] - byte sources for images (files, in-memory payloads)
//! - [`decode`] - probing, EXIF orientation and region decoding
//! - [`tile`] - pyramid, tile manager, bitmap pool and tile cache
//! - [`config`] - engine options and CLI types
//! - [`error`] - error taxonomy shared by all layers
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use gigatile::decode::ImageCrateBackend;
//! use gigatile::geom::{IntRect, IntSize};
//! use gigatile::source::FileImageSource;
//! use gigatile::tile::{LruBitmapPool, LruTileCache, TileManager, ViewportSnapshot};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut manager = TileManager::new(
//!         Arc::new(ImageCrateBackend::new()),
//!         Arc::new(LruBitmapPool::new()),
//!         Arc::new(LruTileCache::new()),
//!     );
//!
//!     // Probe runs in the background; pump its completion.
//!     manager.bind(Arc::new(FileImageSource::new("huge.png")));
//!     manager.process_events().await;
//!
//!     // Tell the manager what the host shows; it decodes what is needed.
//!     manager.on_viewport_changed(ViewportSnapshot::new(
//!         IntSize::new(500, 250),
//!         IntRect::new(0, 0, 250, 125),
//!         4.0,
//!         1.0,
//!     ));
//!     while manager.tiles().iter().any(|tile| tile.bitmap.is_none()) {
//!         manager.process_events().await;
//!     }
//!     for tile in manager.tiles() {
//!         println!("{} -> {:?}", tile.coord, tile.state);
//!     }
//! }
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod geom;
pub mod source;
pub mod tile;

// Re-export commonly used types
pub use config::{Cli, Command, EngineOptions};
pub use decode::{
    sampled_dimensions, ExifOrientation, ImageCrateBackend, ImageInfo, RasterBackend,
    RegionDecoder, RegionSession,
};
pub use error::{ProbeError, SourceError, SubsamplingError, TileDecodeError};
pub use geom::{
    grid_size_for_level, load_rectangle, max_grid_size, sample_size_for_scale, IntOffset, IntRect,
    IntSize, DEFAULT_PRELOAD_MARGIN_FACTOR,
};
pub use source::{read_all, BytesImageSource, FileImageSource, ImageSource, SourceRead, SourceStream};
pub use tile::{
    BitmapPool, ChangeDispatcher, ChangeListener, ListenerId, LruBitmapPool, LruTileCache,
    ManagerDiagnostics, ManagerState, NoopBitmapPool, NoopTileCache, PyramidLevel, TileBitmap,
    TileCacheKey, TileCoord, TileDescriptor, TileManager, TileMemoryCache, TilePyramid,
    TileSnapshot, TileState, ViewportSnapshot, DEFAULT_POOL_CAPACITY, DEFAULT_TILE_CACHE_CAPACITY,
};
