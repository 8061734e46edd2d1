//! Region decode tests over the real backend, below the manager.
//!
//! Tests verify:
//! - Probed sessions cut exact rectangles at every sample size
//! - Every tile of a real pyramid decodes to its sampled dimensions
//! - Edge rectangles smaller than a full tile come back exact
//! - The bitmap pool recycles rasters and feeds them to later decodes
//! - Grayscale sources expand to RGBA
//! - EXIF-oriented sources decode into upright space

use std::sync::Arc;

use image::Rgba;

use gigatile::{
    sampled_dimensions, BytesImageSource, ExifOrientation, ImageCrateBackend, ImageInfo,
    ImageSource, IntRect, IntSize, LruBitmapPool, RasterBackend, RegionDecoder, RegionSession,
    TilePyramid,
};

use super::test_utils::{fixture_image, fixture_pixel, png_fixture};

// =============================================================================
// Session Rectangles
// =============================================================================

#[tokio::test]
async fn test_session_cuts_exact_rectangles() {
    let backend = ImageCrateBackend::new();
    let source = png_fixture("mem:a", 1024, 512);
    let info = backend.probe(source.as_ref()).await.unwrap();
    let session = backend.open_region(source, &info).await.unwrap();

    let rect = IntRect::new(300, 100, 556, 356);
    let out = session.decode(rect, 1, None).await.unwrap();
    assert_eq!((out.width(), out.height()), (256, 256));
    assert_eq!(*out.get_pixel(0, 0), fixture_pixel(300, 100));
    assert_eq!(*out.get_pixel(255, 255), fixture_pixel(555, 355));

    // The same rectangle at sample 4 keeps every fourth pixel.
    let out = session.decode(rect, 4, None).await.unwrap();
    assert_eq!((out.width(), out.height()), (64, 64));
    assert_eq!(*out.get_pixel(5, 9), fixture_pixel(300 + 5 * 4, 100 + 9 * 4));
}

#[tokio::test]
async fn test_edge_rectangles_decode_to_partial_size() {
    let backend = ImageCrateBackend::new();
    let source = png_fixture("mem:edge", 1000, 500);
    let info = backend.probe(source.as_ref()).await.unwrap();
    let session = backend.open_region(source, &info).await.unwrap();

    // Rightmost column and bottom row stop at the image edge.
    let out = session.decode(IntRect::new(768, 0, 1000, 256), 1, None).await.unwrap();
    assert_eq!((out.width(), out.height()), (232, 256));
    assert_eq!(*out.get_pixel(231, 0), fixture_pixel(999, 0));

    let out = session.decode(IntRect::new(0, 256, 256, 500), 1, None).await.unwrap();
    assert_eq!((out.width(), out.height()), (256, 244));
    assert_eq!(*out.get_pixel(0, 243), fixture_pixel(0, 499));
}

// =============================================================================
// Pyramid Walk
// =============================================================================

#[tokio::test]
async fn test_every_pyramid_tile_decodes() {
    let backend = ImageCrateBackend::new();
    let source = png_fixture("mem:a", 1024, 512);
    let info = backend.probe(source.as_ref()).await.unwrap();
    let session = backend.open_region(source, &info).await.unwrap();
    let decoder = RegionDecoder::new(
        Arc::from(session),
        info.clone(),
        Arc::new(LruBitmapPool::new()),
    );

    let pyramid = TilePyramid::build(info.size, IntSize::new(256, 256), 50);
    for level in pyramid.levels() {
        for tile in &level.tiles {
            let out = decoder
                .decode_region(tile.src_rect, tile.sample_size)
                .await
                .unwrap();
            let (width, height) = sampled_dimensions(tile.src_rect, tile.sample_size);
            assert_eq!(
                (out.width(), out.height()),
                (width, height),
                "tile {} at sample {}",
                tile.coord,
                tile.sample_size
            );
            assert_eq!(
                *out.get_pixel(0, 0),
                fixture_pixel(tile.src_rect.left as u32, tile.src_rect.top as u32)
            );
            decoder.recycle(out);
        }
    }
}

// =============================================================================
// Buffer Pooling
// =============================================================================

#[tokio::test]
async fn test_pool_receives_recycled_rasters() {
    let backend = ImageCrateBackend::new();
    let source = png_fixture("mem:a", 1024, 512);
    let info = backend.probe(source.as_ref()).await.unwrap();
    let session = backend.open_region(source, &info).await.unwrap();
    let pool = Arc::new(LruBitmapPool::new());
    let decoder = RegionDecoder::new(Arc::from(session), info, pool.clone());

    let out = decoder
        .decode_region(IntRect::new(0, 0, 256, 256), 1)
        .await
        .unwrap();
    assert_eq!(pool.retained_count(), 0);
    decoder.recycle(out);
    assert_eq!(pool.retained_count(), 1);

    // The next decode of the same shape reuses the pooled allocation.
    let out = decoder
        .decode_region(IntRect::new(256, 0, 512, 256), 1)
        .await
        .unwrap();
    assert_eq!(pool.retained_count(), 0);
    assert_eq!(*out.get_pixel(0, 0), fixture_pixel(256, 0));
}

// =============================================================================
// Color and Orientation
// =============================================================================

#[tokio::test]
async fn test_grayscale_png_expands_to_rgba() {
    let gray = image::GrayImage::from_fn(300, 150, |x, y| image::Luma([(x + y) as u8]));
    let mut buf = std::io::Cursor::new(Vec::new());
    gray.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    let source: Arc<dyn ImageSource> =
        Arc::new(BytesImageSource::new("mem:gray", buf.into_inner()));

    let backend = ImageCrateBackend::new();
    let info = backend.probe(source.as_ref()).await.unwrap();
    assert_eq!(info.size, IntSize::new(300, 150));
    let session = backend.open_region(source, &info).await.unwrap();

    let out = session.decode(IntRect::new(10, 20, 42, 52), 1, None).await.unwrap();
    assert_eq!(*out.get_pixel(0, 0), Rgba([30, 30, 30, 255]));
}

#[tokio::test]
async fn test_decoder_maps_oriented_sources_upright() {
    // The raw raster is 1024x512; displayed rotated, upright space is
    // 512x1024. PNG carries no orientation of its own, so the probed info
    // is overridden the way an EXIF-bearing probe would report it.
    let backend = ImageCrateBackend::new();
    let source = png_fixture("mem:a", 1024, 512);
    let probed = backend.probe(source.as_ref()).await.unwrap();
    let session = backend.open_region(source, &probed).await.unwrap();
    let info = ImageInfo::new(IntSize::new(512, 1024), "image/png", ExifOrientation::Rotate90);
    let decoder = RegionDecoder::new(Arc::from(session), info, Arc::new(LruBitmapPool::new()));

    let out = decoder
        .decode_region(IntRect::new(0, 0, 512, 1024), 1)
        .await
        .unwrap();
    assert_eq!((out.width(), out.height()), (512, 1024));
    let expected = ExifOrientation::Rotate90.apply_to_image(&fixture_image(1024, 512));
    assert_eq!(out, expected);
}
