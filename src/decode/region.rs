//! Region decoding with orientation mapping and buffer pooling.

use std::sync::Arc;

use image::{imageops, RgbaImage};

use crate::decode::backend::{sampled_dimensions, ImageInfo, RegionSession};
use crate::decode::ExifOrientation;
use crate::error::TileDecodeError;
use crate::geom::IntRect;
use crate::tile::BitmapPool;

/// Decodes upright-space rectangles through an open [`RegionSession`].
///
/// Tile rectangles are planned in upright image space while the session
/// works in raw storage space. The decoder owns that bookkeeping: it maps
/// the rectangle back through the EXIF orientation, feeds the session a
/// pooled reuse buffer, and transforms the decoded pixels forward before
/// returning them.
pub struct RegionDecoder {
    session: Arc<dyn RegionSession>,
    info: ImageInfo,
    pool: Arc<dyn BitmapPool>,
}

impl RegionDecoder {
    /// Wrap an open session.
    pub fn new(
        session: Arc<dyn RegionSession>,
        info: ImageInfo,
        pool: Arc<dyn BitmapPool>,
    ) -> Self {
        Self {
            session,
            info,
            pool,
        }
    }

    /// The probed description of the image this decoder serves.
    pub fn info(&self) -> &ImageInfo {
        &self.info
    }

    /// Decode one upright-space rectangle at the given sample size.
    ///
    /// Safe to call concurrently; each call is one tile decode.
    pub async fn decode_region(
        &self,
        rect: IntRect,
        sample_size: u32,
    ) -> Result<RgbaImage, TileDecodeError> {
        let raw_rect = self
            .info
            .orientation
            .reverse_apply_to_rect(rect, self.info.size)
            .clamp_to(self.info.raw_size());
        let (width, height) = sampled_dimensions(raw_rect, sample_size);
        let reuse = self.pool.acquire(width, height);
        let decoded = self.session.decode(raw_rect, sample_size, reuse).await?;
        Ok(self.orient(decoded))
    }

    /// Hand a no-longer-needed raster back to the pool.
    pub fn recycle(&self, image: RgbaImage) {
        let _ = self.pool.release(image);
    }

    fn orient(&self, mut image: RgbaImage) -> RgbaImage {
        match self.info.orientation {
            ExifOrientation::Normal => image,
            ExifOrientation::FlipHorizontal => {
                imageops::flip_horizontal_in_place(&mut image);
                image
            }
            ExifOrientation::FlipVertical => {
                imageops::flip_vertical_in_place(&mut image);
                image
            }
            ExifOrientation::Rotate180 => {
                imageops::rotate180_in_place(&mut image);
                image
            }
            // The axis-swapping cases need a second buffer; the decode
            // buffer goes back to the pool.
            orientation => {
                let rotated = orientation.apply_to_image(&image);
                let _ = self.pool.release(image);
                rotated
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
