//! Shared tile rasters.

use std::sync::Arc;

use image::RgbaImage;

use crate::geom::IntSize;
use crate::tile::BitmapPool;

/// A decoded tile raster shared between the active set and the memory
/// cache.
///
/// Clones share the same pixels. Disposal is cooperative: the buffer only
/// goes back to the pool when the last handle is disposed, so a cache that
/// still holds a clone keeps the pixels alive.
#[derive(Debug, Clone)]
pub struct TileBitmap {
    image: Arc<RgbaImage>,
}

impl TileBitmap {
    /// Wrap a decoded raster.
    pub fn new(image: RgbaImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// The pixels.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Raster dimensions.
    pub fn size(&self) -> IntSize {
        IntSize::new(self.image.width() as i32, self.image.height() as i32)
    }

    /// Bytes held by the raster.
    pub fn byte_len(&self) -> usize {
        self.image.as_raw().len()
    }

    /// Drop this handle, recycling the buffer if it was the last one.
    pub fn dispose(self, pool: &dyn BitmapPool) {
        if let Ok(image) = Arc::try_unwrap(self.image) {
            let _ = pool.release(image);
        }
    }
}
