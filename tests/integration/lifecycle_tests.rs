//! Manager lifecycle and fault handling tests.
//!
//! Tests verify:
//! - Pause disposes tiles and resume restores them from the cache
//! - Rebinding supersedes the previous source
//! - Destroy is terminal and later calls are ignored
//! - Availability faults: content at full resolution, aspect mismatch
//! - Probe failures surface as a fault, and a rebind recovers
//! - Change listeners fire as tiles move and stop after unsubscribe

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use gigatile::{
    BytesImageSource, FileImageSource, ImageSource, IntRect, IntSize, ManagerState,
    SubsamplingError, TileState, ViewportSnapshot,
};

use super::test_utils::{bind_and_probe, fixture_manager, png_fixture, settle, viewport, FULL_CONTENT};

// =============================================================================
// Pause and Resume
// =============================================================================

#[tokio::test]
async fn test_pause_disposes_resume_restores() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;
    assert_eq!(manager.diagnostics().loaded, 8);

    manager.pause();
    assert_eq!(manager.state(), ManagerState::Paused);
    assert!(manager.tiles().is_empty());

    // Every tile went into the cache on first load, so resume restores the
    // level synchronously.
    manager.resume();
    assert_eq!(manager.state(), ManagerState::Active);
    let tiles = manager.tiles();
    assert_eq!(tiles.len(), 8);
    assert!(tiles.iter().all(|tile| tile.state == TileState::Loaded));
}

#[tokio::test]
async fn test_pause_outside_active_is_ignored() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;

    manager.pause();
    assert_eq!(manager.state(), ManagerState::DecoderReady);
    manager.resume();
    assert_eq!(manager.state(), ManagerState::DecoderReady);
}

// =============================================================================
// Rebinding
// =============================================================================

#[tokio::test]
async fn test_rebind_replaces_source() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;

    // The retained viewport re-activates against the new image.
    bind_and_probe(&mut manager, png_fixture("mem:b", 512, 256)).await;
    assert_eq!(manager.image_info().unwrap().size, IntSize::new(512, 256));
    assert_eq!(manager.state(), ManagerState::Active);

    settle(&mut manager).await;
    let tiles = manager.tiles();
    assert_eq!(tiles.len(), 2);
    assert!(tiles.iter().all(|tile| tile.state == TileState::Loaded));
}

// =============================================================================
// Destroy
// =============================================================================

#[tokio::test]
async fn test_destroy_is_terminal() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;

    manager.destroy();
    assert_eq!(manager.state(), ManagerState::Destroyed);
    assert!(manager.tiles().is_empty());
    assert!(manager.image_info().is_none());

    // Destroyed managers ignore everything, including new bindings.
    manager.bind(png_fixture("mem:b", 512, 256));
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    manager.process_events().await;
    assert_eq!(manager.state(), ManagerState::Destroyed);
    assert!(manager.image_info().is_none());

    manager.destroy();
    assert_eq!(manager.state(), ManagerState::Destroyed);
}

#[tokio::test]
async fn test_destroy_mid_decode_is_clean() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));

    // No settling: decodes are still in flight when the manager goes away.
    manager.destroy();
    assert_eq!(manager.state(), ManagerState::Destroyed);
    assert!(manager.tiles().is_empty());
}

// =============================================================================
// Availability Faults
// =============================================================================

#[tokio::test]
async fn test_content_at_full_resolution_faults() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:small", 64, 64)).await;

    // Content as large as the image: there is nothing to sharpen.
    manager.on_viewport_changed(ViewportSnapshot::new(
        IntSize::new(256, 256),
        IntRect::new(0, 0, 256, 256),
        2.0,
        1.0,
    ));
    assert_eq!(manager.state(), ManagerState::DecoderReady);
    assert!(manager.tiles().is_empty());
    assert!(matches!(
        manager.fault(),
        Some(SubsamplingError::AlreadyFullResolution { .. })
    ));
}

#[tokio::test]
async fn test_aspect_mismatch_faults_until_rebind() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;

    // Content with a very different aspect cannot map tile rectangles.
    manager.on_viewport_changed(ViewportSnapshot::new(
        IntSize::new(128, 256),
        IntRect::new(0, 0, 128, 256),
        4.0,
        1.0,
    ));
    assert_eq!(manager.state(), ManagerState::DecoderReady);
    assert!(matches!(
        manager.fault(),
        Some(SubsamplingError::UnsupportedForSubsampling { .. })
    ));

    // The verdict is latched for this binding; a correct viewport does not
    // lift it.
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    assert_eq!(manager.state(), ManagerState::DecoderReady);
    assert!(manager.fault().is_some());

    // A rebind re-runs the check.
    bind_and_probe(&mut manager, png_fixture("mem:a2", 1024, 512)).await;
    assert!(manager.fault().is_none());
    assert_eq!(manager.state(), ManagerState::Active);
}

// =============================================================================
// Probe Failures
// =============================================================================

#[tokio::test]
async fn test_probe_failure_faults() {
    let mut manager = fixture_manager();
    let garbage: Arc<dyn ImageSource> = Arc::new(BytesImageSource::new("mem:bad", vec![0u8; 128]));
    bind_and_probe(&mut manager, garbage).await;

    assert_eq!(manager.state(), ManagerState::Uninitialized);
    assert!(matches!(
        manager.fault(),
        Some(SubsamplingError::SourceUnreadable(_))
    ));
    assert!(manager.image_info().is_none());

    // A later viewport is retained but cannot activate anything.
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    assert!(manager.tiles().is_empty());

    // A good rebind recovers and activates with the retained viewport.
    bind_and_probe(&mut manager, png_fixture("mem:good", 1024, 512)).await;
    assert!(manager.fault().is_none());
    assert_eq!(manager.state(), ManagerState::Active);
}

#[tokio::test]
async fn test_missing_file_faults() {
    let mut manager = fixture_manager();
    let source = Arc::new(FileImageSource::new("/no/such/image.png"));
    bind_and_probe(&mut manager, source).await;

    assert_eq!(manager.state(), ManagerState::Uninitialized);
    assert!(matches!(
        manager.fault(),
        Some(SubsamplingError::SourceUnreadable(_))
    ));
}

// =============================================================================
// Rotation
// =============================================================================

#[tokio::test]
async fn test_non_right_angle_rotation_clears_tiles() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;
    assert_eq!(manager.diagnostics().loaded, 8);

    // Tiles are only served at right angles.
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0).with_rotation(45));
    assert!(manager.tiles().is_empty());

    // Back at a right angle the cache refills the level instantly.
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0).with_rotation(90));
    assert_eq!(manager.diagnostics().loaded, 8);
}

// =============================================================================
// Diagnostics
// =============================================================================

#[tokio::test]
async fn test_diagnostics_serialize_for_overlays() {
    let mut manager = fixture_manager();
    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;

    let json = serde_json::to_value(manager.diagnostics()).unwrap();
    assert_eq!(json["state"], "Active");
    assert_eq!(json["sample_size"], 1);
    assert_eq!(json["loaded"], 8);
    assert_eq!(json["pending"], 0);
    assert!(json["fault"].is_null());
}

// =============================================================================
// Listeners
// =============================================================================

#[tokio::test]
async fn test_listener_sees_versions() {
    let mut manager = fixture_manager();
    let calls = Arc::new(AtomicUsize::new(0));
    let last_version = Arc::new(AtomicU64::new(0));
    let listener_calls = calls.clone();
    let listener_version = last_version.clone();
    let id = manager.subscribe(Box::new(move |version| {
        listener_calls.fetch_add(1, Ordering::SeqCst);
        listener_version.store(version, Ordering::SeqCst);
    }));

    bind_and_probe(&mut manager, png_fixture("mem:a", 1024, 512)).await;
    manager.on_viewport_changed(viewport(FULL_CONTENT, 4.0));
    settle(&mut manager).await;

    assert!(calls.load(Ordering::SeqCst) > 0);
    assert_eq!(last_version.load(Ordering::SeqCst), manager.version());

    // After unsubscribing the listener stays quiet.
    assert!(manager.unsubscribe(id));
    let before = calls.load(Ordering::SeqCst);
    manager.pause();
    assert_eq!(calls.load(Ordering::SeqCst), before);
    assert!(!manager.unsubscribe(id));
}
