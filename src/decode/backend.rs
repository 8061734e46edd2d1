//! Raster backend capability.
//!
//! A backend knows how to read a particular family of image formats: it
//! probes a source for bounds, type and orientation, says whether it can
//! decode sub-rectangles of that image, and opens decode sessions. The
//! engine is generic over this trait so hosts can plug format-native
//! region decoders; [`ImageCrateBackend`] is the bundled implementation.
//!
//! [`ImageCrateBackend`]: crate::decode::ImageCrateBackend

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbaImage;

use crate::decode::ExifOrientation;
use crate::error::{ProbeError, TileDecodeError};
use crate::geom::{IntRect, IntSize};
use crate::source::ImageSource;

// =============================================================================
// ImageInfo
// =============================================================================

/// Bounds, type and orientation of a probed image.
///
/// `size` is the upright (display-facing) size; the dimensions as stored in
/// the file are available through [`Self::raw_size`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImageInfo {
    /// Upright image dimensions
    pub size: IntSize,

    /// MIME type, e.g. `image/png`
    pub mime_type: String,

    /// How stored pixels map to the upright image
    pub orientation: ExifOrientation,
}

impl ImageInfo {
    /// Create a new image description.
    pub fn new(size: IntSize, mime_type: impl Into<String>, orientation: ExifOrientation) -> Self {
        Self {
            size,
            mime_type: mime_type.into(),
            orientation,
        }
    }

    /// Upright width in pixels.
    pub fn width(&self) -> i32 {
        self.size.width
    }

    /// Upright height in pixels.
    pub fn height(&self) -> i32 {
        self.size.height
    }

    /// Dimensions as stored in the file, before orientation.
    pub fn raw_size(&self) -> IntSize {
        self.orientation.reverse_apply_to_size(self.size)
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Capability: probe images and open region-decode sessions.
#[async_trait]
pub trait RasterBackend: Send + Sync {
    /// Read enough of the source to learn its bounds, type and orientation,
    /// without handing a full decode to the caller.
    async fn probe(&self, source: &dyn ImageSource) -> Result<ImageInfo, ProbeError>;

    /// Whether this backend can decode sub-rectangles of the given image.
    fn supports_region_decode(&self, info: &ImageInfo) -> bool;

    /// Open a decode session for the image.
    ///
    /// One session serves all tiles of one bound image; its `decode` calls
    /// may run concurrently.
    async fn open_region(
        &self,
        source: Arc<dyn ImageSource>,
        info: &ImageInfo,
    ) -> Result<Box<dyn RegionSession>, TileDecodeError>;
}

/// One open image, ready to decode regions.
#[async_trait]
pub trait RegionSession: Send + Sync {
    /// Decode `rect`, keeping one pixel per `sample_size` step on each axis.
    ///
    /// `rect` is in raw storage coordinates and already lies inside the raw
    /// bounds. `reuse` is a buffer to decode into when its allocation fits;
    /// the output dimensions are [`sampled_dimensions`]`(rect, sample_size)`
    /// either way.
    async fn decode(
        &self,
        rect: IntRect,
        sample_size: u32,
        reuse: Option<RgbaImage>,
    ) -> Result<RgbaImage, TileDecodeError>;
}

/// Output dimensions of a sampled region decode: `ceil(extent / sample)`.
pub fn sampled_dimensions(rect: IntRect, sample_size: u32) -> (u32, u32) {
    let sample = sample_size.max(1) as i64;
    let width = (rect.width().max(0) as i64 + sample - 1) / sample;
    let height = (rect.height().max(0) as i64 + sample - 1) / sample;
    (width as u32, height as u32)
}
