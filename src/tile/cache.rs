//! Memory cache for decoded tiles.
//!
//! This module provides an LRU cache for decoded tile rasters, so a region
//! that scrolls back into view (or a source that is rebound) can be served
//! without another decode.
//!
//! # Cache Key
//!
//! Tiles are cached by a composite key including:
//! - Source identity ([`ImageSource::key`](crate::source::ImageSource::key))
//! - Sample size the tile was decoded at
//! - Upright-space rectangle the tile covers
//!
//! # Size-Based Eviction
//!
//! The cache tracks the total size of cached rasters in bytes and evicts
//! least-recently-used entries when the capacity is exceeded. Evicted
//! entries are dropped; a raster stays alive as long as an active tile
//! still holds a [`TileBitmap`] clone of it.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::geom::IntRect;
use crate::tile::TileBitmap;

/// Default cache capacity: 256MB
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
const DEFAULT_MAX_ENTRIES: usize = 4096;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for decoded tiles.
///
/// This key uniquely identifies one tile raster of one source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileCacheKey {
    /// Source identity (typically a `file://` path or caller-chosen id)
    pub source: Arc<str>,

    /// Sample size the tile was decoded at
    pub sample_size: u32,

    /// Upright-space rectangle the tile covers
    pub src_rect: IntRect,
}

impl TileCacheKey {
    /// Create a new cache key.
    pub fn new(source: impl Into<Arc<str>>, sample_size: u32, src_rect: IntRect) -> Self {
        Self {
            source: source.into(),
            sample_size,
            src_rect,
        }
    }
}

// =============================================================================
// Cache Trait
// =============================================================================

/// Capability: share decoded tiles across viewport changes and rebinds.
///
/// Both operations run on the manager's control context for every schedule
/// and completion, so implementations must not block.
pub trait TileMemoryCache: Send + Sync {
    /// Look up a tile, refreshing its recency on a hit.
    fn get(&self, key: &TileCacheKey) -> Option<TileBitmap>;

    /// Store a tile.
    fn put(&self, key: TileCacheKey, bitmap: TileBitmap);
}

/// Cache that stores nothing; every request decodes.
#[derive(Debug, Default)]
pub struct NoopTileCache;

impl TileMemoryCache for NoopTileCache {
    fn get(&self, _key: &TileCacheKey) -> Option<TileBitmap> {
        None
    }

    fn put(&self, _key: TileCacheKey, _bitmap: TileBitmap) {}
}

// =============================================================================
// LRU Cache
// =============================================================================

/// LRU cache for decoded tiles with size-based eviction.
pub struct LruTileCache {
    /// The underlying LRU cache, entry-bounded
    entries: Mutex<CacheInner>,

    /// Maximum total size in bytes
    max_size_bytes: usize,
}

struct CacheInner {
    cache: LruCache<TileCacheKey, TileBitmap>,
    current_size_bytes: usize,
}

impl LruTileCache {
    /// Create a new cache with the default capacity (256MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a new cache with a custom byte capacity.
    pub fn with_capacity(max_size_bytes: usize) -> Self {
        Self::with_capacity_and_entries(max_size_bytes, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new cache with custom byte and entry capacities.
    pub fn with_capacity_and_entries(max_size_bytes: usize, max_entries: usize) -> Self {
        let cache = NonZeroUsize::new(max_entries)
            .map(LruCache::new)
            .unwrap_or_else(LruCache::unbounded);
        Self {
            entries: Mutex::new(CacheInner {
                cache,
                current_size_bytes: 0,
            }),
            max_size_bytes,
        }
    }

    /// Current total size of cached rasters in bytes.
    pub fn size(&self) -> usize {
        self.entries
            .lock()
            .map(|inner| inner.current_size_bytes)
            .unwrap_or(0)
    }

    /// Number of cached tiles.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|inner| inner.cache.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The byte capacity.
    pub fn capacity(&self) -> usize {
        self.max_size_bytes
    }

    /// Remove all cached tiles.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.entries.lock() {
            inner.cache.clear();
            inner.current_size_bytes = 0;
        }
    }
}

impl Default for LruTileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TileMemoryCache for LruTileCache {
    fn get(&self, key: &TileCacheKey) -> Option<TileBitmap> {
        let mut inner = self.entries.lock().ok()?;
        inner.cache.get(key).cloned()
    }

    fn put(&self, key: TileCacheKey, bitmap: TileBitmap) {
        let size = bitmap.byte_len();

        // Refuse entries larger than the whole cache
        if size > self.max_size_bytes {
            return;
        }
        let Ok(mut inner) = self.entries.lock() else {
            return;
        };

        inner.current_size_bytes += size;

        // `push` hands back the replaced entry for an existing key, or the
        // LRU entry displaced by the entry bound; either way its bytes are
        // no longer held
        if let Some((_, displaced)) = inner.cache.push(key, bitmap) {
            inner.current_size_bytes = inner
                .current_size_bytes
                .saturating_sub(displaced.byte_len());
        }

        // Evict least-recently-used entries until within budget
        while inner.current_size_bytes > self.max_size_bytes {
            match inner.cache.pop_lru() {
                Some((_, evicted)) => {
                    inner.current_size_bytes = inner
                        .current_size_bytes
                        .saturating_sub(evicted.byte_len());
                }
                None => break,
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
