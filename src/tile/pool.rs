//! Bitmap pooling.
//!
//! Panning churns through tile rasters quickly. The pool keeps retired
//! RGBA allocations so new decodes can write into recycled memory instead
//! of allocating fresh buffers every time.
//!
//! The contract is permissive on both sides: `acquire` may return `None`
//! (the caller allocates), and `release` may decline a buffer (the caller
//! lets it drop). Both are called from blocking decode tasks as well as
//! the control context, so implementations must stay cheap and lock-light.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use image::RgbaImage;
use lru::LruCache;

/// Default pool budget: 64MB of retired allocations.
pub const DEFAULT_POOL_CAPACITY: usize = 64 * 1024 * 1024;

/// Maximum number of retained allocations regardless of size.
const DEFAULT_MAX_ENTRIES: usize = 256;

// =============================================================================
// Pool Trait
// =============================================================================

/// Capability: recycle raster allocations across decodes and managers.
pub trait BitmapPool: Send + Sync {
    /// Take a buffer sized exactly `width` x `height`, reusing a retained
    /// allocation if one is large enough. `None` means allocate fresh.
    fn acquire(&self, width: u32, height: u32) -> Option<RgbaImage>;

    /// Offer a retired buffer to the pool. Returns `false` if the pool
    /// declined it, in which case the caller just drops the buffer.
    fn release(&self, image: RgbaImage) -> bool;
}

/// Pool that retains nothing.
#[derive(Debug, Default)]
pub struct NoopBitmapPool;

impl BitmapPool for NoopBitmapPool {
    fn acquire(&self, _width: u32, _height: u32) -> Option<RgbaImage> {
        None
    }

    fn release(&self, _image: RgbaImage) -> bool {
        false
    }
}

// =============================================================================
// LRU Pool
// =============================================================================

/// Size-bounded LRU pool of retired allocations.
///
/// `acquire` picks the smallest retained allocation that fits the request
/// and resizes it to the exact pixel length, keeping its capacity.
/// `release` declines buffers larger than the whole budget; otherwise it
/// retains the allocation and evicts least recently used entries until the
/// budget holds again.
pub struct LruBitmapPool {
    max_bytes: usize,
    inner: Mutex<PoolInner>,
}

struct PoolInner {
    next_id: u64,
    entries: LruCache<u64, Vec<u8>>,
    current_bytes: usize,
}

impl LruBitmapPool {
    /// Create a pool with the default byte budget.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_POOL_CAPACITY)
    }

    /// Create a pool with a custom byte budget.
    pub fn with_capacity(max_bytes: usize) -> Self {
        let entries = NonZeroUsize::new(DEFAULT_MAX_ENTRIES)
            .map(LruCache::new)
            .unwrap_or_else(LruCache::unbounded);
        Self {
            max_bytes,
            inner: Mutex::new(PoolInner {
                next_id: 0,
                entries,
                current_bytes: 0,
            }),
        }
    }

    /// Total bytes currently retained.
    pub fn retained_bytes(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.current_bytes)
            .unwrap_or(0)
    }

    /// Number of allocations currently retained.
    pub fn retained_count(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    /// The byte budget.
    pub fn capacity(&self) -> usize {
        self.max_bytes
    }

    /// Drop every retained allocation.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.entries.clear();
            inner.current_bytes = 0;
        }
    }
}

impl Default for LruBitmapPool {
    fn default() -> Self {
        Self::new()
    }
}

impl BitmapPool for LruBitmapPool {
    fn acquire(&self, width: u32, height: u32) -> Option<RgbaImage> {
        let len = (width as usize).checked_mul(height as usize)?.checked_mul(4)?;
        if len == 0 {
            return None;
        }

        let mut raw = {
            let mut inner = self.inner.lock().ok()?;
            let key = inner
                .entries
                .iter()
                .filter(|(_, buf)| buf.capacity() >= len)
                .min_by_key(|(_, buf)| buf.capacity())
                .map(|(id, _)| *id)?;
            let raw = inner.entries.pop(&key)?;
            inner.current_bytes = inner.current_bytes.saturating_sub(raw.capacity());
            raw
        };

        raw.resize(len, 0);
        RgbaImage::from_raw(width, height, raw)
    }

    fn release(&self, image: RgbaImage) -> bool {
        let raw = image.into_raw();
        let size = raw.capacity();
        if size == 0 || size > self.max_bytes {
            return false;
        }
        let Ok(mut inner) = self.inner.lock() else {
            return false;
        };

        let id = inner.next_id;
        inner.next_id = inner.next_id.wrapping_add(1);
        inner.current_bytes += size;
        if let Some((_, displaced)) = inner.entries.push(id, raw) {
            inner.current_bytes = inner.current_bytes.saturating_sub(displaced.capacity());
        }

        // Evict oldest entries until the budget holds. The entry just
        // pushed is most recent, so it survives.
        while inner.current_bytes > self.max_bytes {
            match inner.entries.pop_lru() {
                Some((_, evicted)) => {
                    inner.current_bytes = inner.current_bytes.saturating_sub(evicted.capacity());
                }
                None => break,
            }
        }
        true
    }
}

// =============================================================================
// Tests
// =============================================================================
