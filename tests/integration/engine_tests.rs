//! End-to-end engine tests over the real PNG/JPEG backend.
//!
//! Tests verify:
//! - Binding probes the source and builds the pyramid
//! - A viewport drives tiles through pending/loading/loaded
//! - Decoded tile pixels match the source raster at every sample size
//! - Zooming switches pyramid levels, panning swaps the active set
//! - Previously decoded tiles come back from the shared memory cache
//! - File-backed and JPEG sources work end to end

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use gigatile::{
    BytesImageSource, FileImageSource, ImageCrateBackend, ImageSource, IntRect, IntSize,
    LruBitmapPool, LruTileCache, ManagerState, TileManager, TileState, ViewportSnapshot,
};

use super::test_utils::{
    bind_and_probe, fixture_manager, fixture_options, fixture_pixel, jpeg_bytes, png_fixture,
    png_fixture_file, settle, snapshot_coords, viewport, FULL_CONTENT,
};

// =============================================================================
// Bind and Probe
// =============================================================================

#[tokio::test]
async fn test_bind_probes_and_builds_pyramid() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;

    assert_eq!(manager.state(), ManagerState::DecoderReady);
    let info = manager.image_info().unwrap();
    assert_eq!(info.size, IntSize::new(1024, 512));
    assert_eq!(info.mime_type, "image/png");
    assert!(manager.tiles().is_empty());
}

#[tokio::test]
async fn test_viewport_loads_full_level() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;

    // Scale 4 displays the content at full image resolution: sample 1.
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    assert_eq!(manager.state(), ManagerState::Active);
    assert_eq!(manager.current_sample_size(), 1);
    assert_eq!(manager.tiles().len(), 8);
    assert_eq!(manager.load_rect(), IntRect::new(0, 0, 1024, 512));

    settle(&mut manager).await;
    let tiles = manager.tiles();
    assert_eq!(tiles.len(), 8);
    for tile in &tiles {
        assert_eq!(tile.state, TileState::Loaded, "tile {}", tile.coord);
        let bitmap = tile.bitmap.as_ref().unwrap();
        assert_eq!(bitmap.size(), IntSize::new(256, 256));
    }
}

// =============================================================================
// Pixel Fidelity
// =============================================================================

#[tokio::test]
async fn test_decoded_pixels_match_source() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;

    // At sample 1 each tile is a straight crop of the source raster.
    for tile in manager.tiles() {
        let bitmap = tile.bitmap.unwrap();
        let image = bitmap.image();
        let left = tile.src_rect.left as u32;
        let top = tile.src_rect.top as u32;
        for (dx, dy) in [(0u32, 0u32), (17, 3), (255, 255)] {
            assert_eq!(
                *image.get_pixel(dx, dy),
                fixture_pixel(left + dx, top + dy),
                "pixel ({dx},{dy}) of tile {}",
                tile.coord
            );
        }
    }
}

#[tokio::test]
async fn test_edge_tiles_have_partial_size() {
    // 1000x500 does not divide evenly into 256 pixel tiles.
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:edge", 1000, 500)).await;
    manager.on_viewport_changed(ViewportSnapshot::new(
        IntSize::new(250, 125),
        IntRect::new(0, 0, 250, 125),
        4.0,
        1.0,
    ));
    settle(&mut manager).await;

    let tiles = manager.tiles();
    assert_eq!(tiles.len(), 8);
    let corner = tiles
        .iter()
        .find(|tile| tile.coord.x == 3 && tile.coord.y == 1)
        .unwrap();
    assert_eq!(corner.src_rect, IntRect::new(768, 256, 1000, 500));
    let bitmap = corner.bitmap.as_ref().unwrap();
    assert_eq!(bitmap.size(), IntSize::new(232, 244));
    assert_eq!(*bitmap.image().get_pixel(231, 243), fixture_pixel(999, 499));
}

// =============================================================================
// Level Switching
// =============================================================================

#[tokio::test]
async fn test_zoom_out_switches_to_coarser_level() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;

    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;
    assert_eq!(manager.current_sample_size(), 1);

    // Scale 1.5 wants one pixel per 2x2 source block.
    manager.on_viewport_changed(viewport(FULL_CONTENT, 1.5));
    assert_eq!(manager.current_sample_size(), 2);
    settle(&mut manager).await;

    let tiles = manager.tiles();
    assert_eq!(tiles.len(), 2);
    for tile in &tiles {
        assert_eq!(tile.state, TileState::Loaded);
        // 512x512 source pixels decoded at sample 2
        assert_eq!(tile.bitmap.as_ref().unwrap().size(), IntSize::new(256, 256));
    }

    // Sampled pixels come from every second source row and column.
    let right = tiles.iter().find(|tile| tile.coord.x == 1).unwrap();
    let image = right.bitmap.as_ref().unwrap().image();
    assert_eq!(*image.get_pixel(10, 20), fixture_pixel(512 + 10 * 2, 20 * 2));
}

#[tokio::test]
async fn test_slight_zoom_uses_coarsest_level() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;

    manager.on_viewport_changed(viewport(FULL_CONTENT, 1.1));
    assert_eq!(manager.current_sample_size(), 4);
    settle(&mut manager).await;

    let tiles = manager.tiles();
    assert_eq!(tiles.len(), 1);
    let bitmap = tiles[0].bitmap.as_ref().unwrap();
    assert_eq!(bitmap.size(), IntSize::new(256, 128));
}

#[tokio::test]
async fn test_fit_scale_clears_tiles() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;
    assert!(!manager.tiles().is_empty());

    // At the fit scale the base content is already sharp enough.
    manager.on_viewport_changed(viewport(FULL_CONTENT, 1.0));
    assert!(manager.tiles().is_empty());
    assert_eq!(manager.state(), ManagerState::Active);
}

// =============================================================================
// Panning
// =============================================================================

#[tokio::test]
async fn test_pan_swaps_active_tiles() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;

    // Top-left quarter of the content needs columns 0-1 of row 0 once the
    // preload margin is applied.
    manager.on_viewport_changed(viewport(IntRect::new(0, 0, 64, 32), 4.0));
    settle(&mut manager).await;
    assert_eq!(snapshot_coords(&manager), vec![(0, 0), (1, 0)]);

    // The opposite corner: the old tiles leave the active set entirely.
    manager.on_viewport_changed(viewport(IntRect::new(192, 96, 256, 128), 4.0));
    settle(&mut manager).await;
    assert_eq!(snapshot_coords(&manager), vec![(2, 1), (3, 1)]);
}

#[tokio::test]
async fn test_cache_serves_previously_loaded_tiles() {
    let cache = Arc::new(LruTileCache::new());
    let mut manager = TileManager::with_options(
        fixture_options(),
        Arc::new(ImageCrateBackend::new()),
        Arc::new(LruBitmapPool::new()),
        cache.clone(),
    );
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;

    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;
    assert_eq!(cache.len(), 8);

    // Pan away, then back. The revisited tiles come straight out of the
    // cache, before any event pumping.
    manager.on_viewport_changed(viewport(IntRect::new(192, 96, 256, 128), 4.0));
    settle(&mut manager).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));

    let tiles = manager.tiles();
    assert_eq!(tiles.len(), 8);
    for tile in &tiles {
        assert_eq!(tile.state, TileState::Loaded, "tile {}", tile.coord);
    }
}

// =============================================================================
// Sources and Formats
// =============================================================================

#[tokio::test]
async fn test_file_source_loads() {
    let file = png_fixture_file(1024, 512);
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, Arc::new(FileImageSource::new(file.path()))).await;
    assert_eq!(manager.state(), ManagerState::DecoderReady);

    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;
    assert_eq!(manager.diagnostics().loaded, 8);
}

#[tokio::test]
async fn test_jpeg_source_loads_through_fallback_path() {
    // JPEG has no streaming path; the session inflates the raster once and
    // crops from it. A flat fill keeps the lossy comparison honest.
    let mut flat = RgbaImage::new(1024, 512);
    for pixel in flat.pixels_mut() {
        *pixel = Rgba([90, 140, 190, 255]);
    }
    let source: Arc<dyn ImageSource> = Arc::new(BytesImageSource::new("mem:j", jpeg_bytes(&flat)));

    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, source).await;
    assert_eq!(manager.image_info().unwrap().mime_type, "image/jpeg");

    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;

    let tiles = manager.tiles();
    assert_eq!(tiles.len(), 8);
    for tile in &tiles {
        let pixel = tile.bitmap.as_ref().unwrap().image().get_pixel(128, 128);
        assert!((pixel[0] as i32 - 90).abs() <= 10);
        assert!((pixel[1] as i32 - 140).abs() <= 10);
        assert!((pixel[2] as i32 - 190).abs() <= 10);
    }
}

// =============================================================================
// Versioning
// =============================================================================

#[tokio::test]
async fn test_version_advances_with_tile_changes() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    let before = manager.version();

    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    let after_request = manager.version();
    assert!(after_request > before, "pending transitions bump the version");

    settle(&mut manager).await;
    assert!(manager.version() > after_request, "loads bump the version");
}
