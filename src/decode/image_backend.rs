//! Reference backend built on the `image` and `png` crates.
//!
//! Probing parses only the header of the byte payload. Region decodes take
//! one of two paths:
//!
//! - **Streaming PNG**: for non-interlaced PNGs, rows are pulled straight
//!   out of the decoder and sampled on the fly, so a tile decode never
//!   materializes the full-resolution raster.
//! - **Full-decode fallback**: for everything else (JPEG in particular),
//!   the first decode inflates the whole image once per session and later
//!   decodes crop from that shared raster.
//!
//! Both paths read the source's complete byte payload into memory, so this
//! backend suits sources that fit in RAM. Hosts with format-native region
//! decoders (TIFF pyramids, JPEG2000, ...) plug them in behind
//! [`RasterBackend`].

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegDecoder;
use image::codecs::png::PngDecoder;
use image::metadata::Orientation;
use image::{ImageDecoder, ImageFormat, ImageReader, Rgba, RgbaImage};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::decode::backend::{sampled_dimensions, ImageInfo, RasterBackend, RegionSession};
use crate::decode::ExifOrientation;
use crate::error::{ProbeError, TileDecodeError};
use crate::geom::{IntRect, IntSize};
use crate::source::{self, ImageSource};

/// Backend over the `image` crate's decoders.
#[derive(Debug, Default)]
pub struct ImageCrateBackend;

impl ImageCrateBackend {
    /// Create the backend. It is stateless; one instance can serve any
    /// number of managers.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RasterBackend for ImageCrateBackend {
    async fn probe(&self, source: &dyn ImageSource) -> Result<ImageInfo, ProbeError> {
        let bytes = source::read_all(source).await?;
        tokio::task::spawn_blocking(move || probe_bytes(&bytes))
            .await
            .map_err(|e| ProbeError::Decode(format!("probe task failed: {e}")))?
    }

    fn supports_region_decode(&self, info: &ImageInfo) -> bool {
        matches!(info.mime_type.as_str(), "image/png" | "image/jpeg")
    }

    async fn open_region(
        &self,
        source: Arc<dyn ImageSource>,
        _info: &ImageInfo,
    ) -> Result<Box<dyn RegionSession>, TileDecodeError> {
        let bytes = source::read_all(source.as_ref()).await?;
        if streamable_png(&bytes) {
            debug!(key = source.key(), "opened streaming PNG region session");
            Ok(Box::new(PngRegionSession { bytes }))
        } else {
            debug!(key = source.key(), "opened full-decode region session");
            Ok(Box::new(FullDecodeSession {
                bytes,
                full: OnceCell::new(),
            }))
        }
    }
}

// =============================================================================
// Probing
// =============================================================================

fn probe_bytes(bytes: &[u8]) -> Result<ImageInfo, ProbeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ProbeError::Decode(e.to_string()))?;
    let format = reader.format().ok_or(ProbeError::UnrecognizedFormat)?;
    let mime_type = format.to_mime_type();

    let (width, height, orientation) = match format {
        ImageFormat::Png => {
            let decoder = PngDecoder::new(Cursor::new(bytes)).map_err(probe_err)?;
            let (w, h) = decoder.dimensions();
            (w, h, Orientation::NoTransforms)
        }
        ImageFormat::Jpeg => {
            let mut decoder = JpegDecoder::new(Cursor::new(bytes)).map_err(probe_err)?;
            let (w, h) = decoder.dimensions();
            let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
            (w, h, orientation)
        }
        _ => {
            let (w, h) = reader.into_dimensions().map_err(probe_err)?;
            (w, h, Orientation::NoTransforms)
        }
    };

    let orientation = ExifOrientation::from_image_orientation(orientation);
    let raw_size = IntSize::new(width as i32, height as i32);
    Ok(ImageInfo::new(
        orientation.apply_to_size(raw_size),
        mime_type,
        orientation,
    ))
}

fn probe_err(err: image::ImageError) -> ProbeError {
    ProbeError::Decode(err.to_string())
}

// =============================================================================
// Streaming PNG path
// =============================================================================

/// Whether the payload is a PNG the row-streaming path can handle.
fn streamable_png(bytes: &Bytes) -> bool {
    let decoder = png::Decoder::new(Cursor::new(bytes.as_ref()));
    match decoder.read_info() {
        Ok(reader) => !reader.info().interlaced,
        Err(_) => false,
    }
}

struct PngRegionSession {
    bytes: Bytes,
}

#[async_trait]
impl RegionSession for PngRegionSession {
    async fn decode(
        &self,
        rect: IntRect,
        sample_size: u32,
        reuse: Option<RgbaImage>,
    ) -> Result<RgbaImage, TileDecodeError> {
        let bytes = self.bytes.clone();
        tokio::task::spawn_blocking(move || decode_png_region(&bytes, rect, sample_size, reuse))
            .await
            .map_err(|e| TileDecodeError::Decode(format!("decode task failed: {e}")))?
    }
}

fn decode_png_region(
    bytes: &Bytes,
    rect: IntRect,
    sample_size: u32,
    reuse: Option<RgbaImage>,
) -> Result<RgbaImage, TileDecodeError> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes.as_ref()));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder
        .read_info()
        .map_err(|e| TileDecodeError::Decode(e.to_string()))?;

    let (color, depth) = reader.output_color_type();
    if depth != png::BitDepth::Eight {
        return Err(TileDecodeError::Decode(format!(
            "unsupported PNG bit depth {depth:?}"
        )));
    }
    let channels = match color {
        png::ColorType::Grayscale => 1usize,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        other => {
            return Err(TileDecodeError::Decode(format!(
                "unsupported PNG color type {other:?}"
            )))
        }
    };

    let (out_w, out_h) = sampled_dimensions(rect, sample_size);
    let mut out = prepare_buffer(out_w, out_h, reuse);
    if out_w == 0 || out_h == 0 {
        return Ok(out);
    }

    let step = sample_size.max(1) as usize;
    let left = rect.left.max(0) as usize;
    let top = rect.top.max(0) as usize;
    let last_row = top + (out_h as usize - 1) * step;

    let mut y = 0usize;
    let mut out_y = 0u32;
    let mut next_needed = top;
    while let Some(row) = reader
        .next_row()
        .map_err(|e| TileDecodeError::Decode(e.to_string()))?
    {
        if y == next_needed {
            let data = row.data();
            for out_x in 0..out_w {
                let sx = (left + out_x as usize * step) * channels;
                let p = &data[sx..sx + channels];
                let rgba = match channels {
                    1 => [p[0], p[0], p[0], 255],
                    2 => [p[0], p[0], p[0], p[1]],
                    3 => [p[0], p[1], p[2], 255],
                    _ => [p[0], p[1], p[2], p[3]],
                };
                out.put_pixel(out_x, out_y, Rgba(rgba));
            }
            out_y += 1;
            if y >= last_row {
                break;
            }
            next_needed = top + out_y as usize * step;
        }
        y += 1;
    }

    if out_y != out_h {
        return Err(TileDecodeError::Decode(format!(
            "PNG stream ended at row {y}, needed {last_row}"
        )));
    }
    Ok(out)
}

// =============================================================================
// Full-decode fallback
// =============================================================================

struct FullDecodeSession {
    bytes: Bytes,
    full: OnceCell<Arc<RgbaImage>>,
}

impl FullDecodeSession {
    /// Decode the whole image once; concurrent callers share the result.
    async fn full_image(&self) -> Result<Arc<RgbaImage>, TileDecodeError> {
        self.full
            .get_or_try_init(|| async {
                let bytes = self.bytes.clone();
                let image = tokio::task::spawn_blocking(move || {
                    image::load_from_memory(&bytes).map(|decoded| decoded.into_rgba8())
                })
                .await
                .map_err(|e| TileDecodeError::Decode(format!("decode task failed: {e}")))?
                .map_err(decode_err)?;
                debug!(
                    width = image.width(),
                    height = image.height(),
                    "inflated full raster for region decodes"
                );
                Ok(Arc::new(image))
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl RegionSession for FullDecodeSession {
    async fn decode(
        &self,
        rect: IntRect,
        sample_size: u32,
        reuse: Option<RgbaImage>,
    ) -> Result<RgbaImage, TileDecodeError> {
        let full = self.full_image().await?;
        Ok(copy_region(full.as_ref(), rect, sample_size, reuse))
    }
}

fn decode_err(err: image::ImageError) -> TileDecodeError {
    match &err {
        image::ImageError::Limits(_) => TileDecodeError::OutOfMemory(err.to_string()),
        _ => TileDecodeError::Decode(err.to_string()),
    }
}

// =============================================================================
// Shared raster helpers
// =============================================================================

/// Copy a sampled region out of a decoded raster.
fn copy_region(
    src: &RgbaImage,
    rect: IntRect,
    sample_size: u32,
    reuse: Option<RgbaImage>,
) -> RgbaImage {
    let (out_w, out_h) = sampled_dimensions(rect, sample_size);
    let mut out = prepare_buffer(out_w, out_h, reuse);
    let step = sample_size.max(1);
    let left = rect.left.max(0) as u32;
    let top = rect.top.max(0) as u32;
    for out_y in 0..out_h {
        let sy = top + out_y * step;
        for out_x in 0..out_w {
            let sx = left + out_x * step;
            out.put_pixel(out_x, out_y, *src.get_pixel(sx, sy));
        }
    }
    out
}

/// Turn an optional reused allocation into a buffer of exactly the
/// requested dimensions.
fn prepare_buffer(width: u32, height: u32, reuse: Option<RgbaImage>) -> RgbaImage {
    let len = width as usize * height as usize * 4;
    match reuse {
        Some(image) => {
            let mut raw = image.into_raw();
            raw.resize(len, 0);
            RgbaImage::from_raw(width, height, raw)
                .unwrap_or_else(|| RgbaImage::new(width, height))
        }
        None => RgbaImage::new(width, height),
    }
}

// =============================================================================
// Tests
// =============================================================================
