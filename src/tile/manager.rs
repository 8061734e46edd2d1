//! Tile manager: the subsampling state machine.
//!
//! The manager owns the pyramid and every tile of the currently bound
//! image source. It turns viewport changes into a set-difference over the
//! current level's tiles, schedules bounded decode work, and folds decode
//! completions back into tile state on a single control context.
//!
//! # Lifecycle
//!
//! ```text
//!                 bind()            first viewport
//! Uninitialized ──(probe)──▶ DecoderReady ────────▶ Active ⇄ Paused
//!       ▲            │fail                            │
//!       └────────────┘                    destroy() ──▶ Destroyed
//! ```
//!
//! # Concurrency
//!
//! Public operations take `&mut self` and must run on one designated
//! control context. Decode tasks run on the runtime's blocking-capable
//! workers, bounded by a semaphore, and report back over an unbounded
//! channel; nothing mutates manager state except [`TileManager::pump`] /
//! [`TileManager::process_events`] and the public operations themselves.
//! Superseded work is discarded by generation and epoch tags, and its
//! rasters go back to the pool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineOptions;
use crate::decode::{ImageInfo, RasterBackend, RegionDecoder, RegionSession};
use crate::error::{ProbeError, SubsamplingError, TileDecodeError};
use crate::geom::{self, IntRect};
use crate::source::ImageSource;

use super::cache::{TileCacheKey, TileMemoryCache};
use super::events::{ChangeDispatcher, ChangeListener, ListenerId};
use super::pool::BitmapPool;
use super::pyramid::{TileCoord, TileDescriptor, TilePyramid};
use super::viewport::ViewportSnapshot;
use super::TileBitmap;

// =============================================================================
// States
// =============================================================================

/// Manager-level state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ManagerState {
    /// No usable image source bound (includes "probe still in flight"
    /// and "probe failed")
    Uninitialized,

    /// Source probed and pyramid built, waiting for a viewport
    DecoderReady,

    /// Serving tile requests
    Active,

    /// Suspended; tiles disposed, pyramid retained
    Paused,

    /// Terminal
    Destroyed,
}

/// Per-tile lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum TileState {
    /// In the active set, decode requested but not yet running
    Pending,

    /// Decode task running
    Loading,

    /// Raster available
    Loaded,

    /// Decode failed; not retried while it stays in the active set
    Failed,

    /// Out of the active set; raster released
    Disposed,
}

/// Read-only view of one tile for the renderer and overlay tooling.
#[derive(Debug, Clone)]
pub struct TileSnapshot {
    pub coord: TileCoord,
    pub src_rect: IntRect,
    pub sample_size: u32,
    pub state: TileState,
    /// Shared raster, present iff `state` is `Loaded`
    pub bitmap: Option<TileBitmap>,
}

/// Summary counters for diagnostics overlays.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ManagerDiagnostics {
    pub state: ManagerState,
    pub version: u64,
    pub sample_size: u32,
    pub pending: usize,
    pub loading: usize,
    pub loaded: usize,
    pub failed: usize,
    /// Manager-level availability fault, if any
    pub fault: Option<String>,
}

// =============================================================================
// Internal records
// =============================================================================

/// Owned record for one tile of the current level.
struct TileSlot {
    descriptor: TileDescriptor,
    state: TileState,
    bitmap: Option<TileBitmap>,
    error: Option<TileDecodeError>,
    /// Generation of the in-flight request, if any
    generation: Option<u64>,
    /// Cooperative cancellation flag shared with the decode task
    cancel: Option<Arc<AtomicBool>>,
    task: Option<JoinHandle<()>>,
}

impl TileSlot {
    fn new(descriptor: TileDescriptor) -> Self {
        Self {
            descriptor,
            state: TileState::Disposed,
            bitmap: None,
            error: None,
            generation: None,
            cancel: None,
            task: None,
        }
    }

    /// Cancel or release whatever the slot holds. Returns `true` if the
    /// externally visible state changed.
    fn dispose(&mut self, pool: &dyn BitmapPool) -> bool {
        match self.state {
            TileState::Disposed => false,
            TileState::Pending | TileState::Loading => {
                if let Some(cancel) = self.cancel.take() {
                    cancel.store(true, Ordering::SeqCst);
                }
                self.task = None;
                self.generation = None;
                self.error = None;
                self.state = TileState::Disposed;
                true
            }
            TileState::Loaded => {
                if let Some(bitmap) = self.bitmap.take() {
                    bitmap.dispose(pool);
                }
                self.generation = None;
                self.state = TileState::Disposed;
                true
            }
            TileState::Failed => {
                self.error = None;
                self.state = TileState::Disposed;
                true
            }
        }
    }
}

/// Completion messages from spawned work back to the control context.
enum EngineEvent {
    ProbeFinished {
        epoch: u64,
        result: Result<(ImageInfo, Option<Arc<dyn RegionSession>>), ProbeError>,
    },
    TileStarted {
        generation: u64,
        coord: TileCoord,
        sample_size: u32,
    },
    TileDecoded {
        generation: u64,
        coord: TileCoord,
        sample_size: u32,
        result: Result<RgbaImage, TileDecodeError>,
    },
}

// =============================================================================
// Tile Manager
// =============================================================================

/// Orchestrates subsampled tile decode for one bound image source.
///
/// One manager serves one host widget. The pool and memory cache are
/// injected capabilities and may be shared across managers.
pub struct TileManager {
    options: EngineOptions,
    backend: Arc<dyn RasterBackend>,
    pool: Arc<dyn BitmapPool>,
    cache: Arc<dyn TileMemoryCache>,

    state: ManagerState,
    /// Bumped on every bind and on destroy; stale probe results are
    /// discarded by comparing against it
    epoch: u64,
    source_key: Option<Arc<str>>,
    info: Option<ImageInfo>,
    decoder: Option<Arc<RegionDecoder>>,
    pyramid: Option<TilePyramid>,
    fault: Option<SubsamplingError>,
    availability_checked: bool,

    viewport: Option<ViewportSnapshot>,
    sample_size: u32,
    load_rect: IntRect,
    tiles: Vec<TileSlot>,

    version: u64,
    dirty: bool,
    dispatcher: ChangeDispatcher,

    next_generation: u64,
    probe_task: Option<JoinHandle<()>>,
    semaphore: Arc<Semaphore>,
    events_tx: UnboundedSender<EngineEvent>,
    events_rx: UnboundedReceiver<EngineEvent>,
}

impl TileManager {
    /// Create a manager with default options.
    pub fn new(
        backend: Arc<dyn RasterBackend>,
        pool: Arc<dyn BitmapPool>,
        cache: Arc<dyn TileMemoryCache>,
    ) -> Self {
        Self::with_options(EngineOptions::default(), backend, pool, cache)
    }

    /// Create a manager with custom options.
    pub fn with_options(
        options: EngineOptions,
        backend: Arc<dyn RasterBackend>,
        pool: Arc<dyn BitmapPool>,
        cache: Arc<dyn TileMemoryCache>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(options.max_parallel_decodes.max(1)));
        Self {
            options,
            backend,
            pool,
            cache,
            state: ManagerState::Uninitialized,
            epoch: 0,
            source_key: None,
            info: None,
            decoder: None,
            pyramid: None,
            fault: None,
            availability_checked: false,
            viewport: None,
            sample_size: 0,
            load_rect: IntRect::ZERO,
            tiles: Vec::new(),
            version: 0,
            dirty: false,
            dispatcher: ChangeDispatcher::new(),
            next_generation: 0,
            probe_task: None,
            semaphore,
            events_tx,
            events_rx,
        }
    }

    // =========================================================================
    // Public operations (control context only)
    // =========================================================================

    /// Bind an image source, replacing any previous binding.
    ///
    /// Cancels an in-flight probe and disposes every tile of the old
    /// source, then probes the new source asynchronously. The result
    /// arrives through [`Self::pump`] / [`Self::process_events`].
    pub fn bind(&mut self, source: Arc<dyn ImageSource>) {
        if self.state == ManagerState::Destroyed {
            debug!("bind ignored on destroyed manager");
            return;
        }
        self.teardown_binding();
        info!(source = source.key(), "binding image source");
        self.source_key = Some(Arc::from(source.key()));
        self.state = ManagerState::Uninitialized;

        let epoch = self.epoch;
        let backend = self.backend.clone();
        let tx = self.events_tx.clone();
        self.probe_task = Some(tokio::spawn(async move {
            let result = probe_source(backend, source).await;
            let _ = tx.send(EngineEvent::ProbeFinished { epoch, result });
        }));
        self.notify_if_dirty();
    }

    /// Feed the latest viewport snapshot.
    ///
    /// In `Active` this recomputes the active tile set. In earlier states
    /// the snapshot is retained so activation (or `resume`) can use it.
    pub fn on_viewport_changed(&mut self, snapshot: ViewportSnapshot) {
        if self.state == ManagerState::Destroyed {
            return;
        }
        self.viewport = Some(snapshot);
        match self.state {
            ManagerState::Active => self.refresh_tiles(),
            ManagerState::DecoderReady => self.try_activate(),
            _ => {}
        }
        self.notify_if_dirty();
    }

    /// Dispose every tile but keep the pyramid. No-op outside `Active`.
    pub fn pause(&mut self) {
        if self.state != ManagerState::Active {
            return;
        }
        info!("pausing; disposing all tiles");
        self.clear_active_level();
        self.state = ManagerState::Paused;
        self.notify_if_dirty();
    }

    /// Re-evaluate the last viewport snapshot as if it just arrived.
    /// No-op unless `Paused`.
    pub fn resume(&mut self) {
        if self.state != ManagerState::Paused {
            return;
        }
        debug!("resuming");
        self.state = ManagerState::Active;
        self.refresh_tiles();
        self.notify_if_dirty();
    }

    /// Cancel everything and release the binding. Idempotent; terminal.
    pub fn destroy(&mut self) {
        if self.state == ManagerState::Destroyed {
            return;
        }
        info!("destroying tile manager");
        if let Some(task) = self.probe_task.take() {
            task.abort();
        }
        self.epoch = self.epoch.wrapping_add(1);

        let mut changed = 0u32;
        for slot in &mut self.tiles {
            if let Some(task) = slot.task.take() {
                task.abort();
            }
            if slot.dispose(self.pool.as_ref()) {
                changed += 1;
            }
        }
        self.bump(changed);
        self.tiles.clear();
        self.pyramid = None;
        self.decoder = None;
        self.info = None;
        self.source_key = None;
        self.viewport = None;
        self.fault = None;
        self.sample_size = 0;
        self.load_rect = IntRect::ZERO;
        self.semaphore.close();

        // Anything that finished before the abort still owns a raster;
        // give those back to the pool.
        while let Ok(event) = self.events_rx.try_recv() {
            if let EngineEvent::TileDecoded {
                result: Ok(raster), ..
            } = event
            {
                let _ = self.pool.release(raster);
            }
        }

        self.state = ManagerState::Destroyed;
        self.notify_if_dirty();
        self.dispatcher.clear();
    }

    // =========================================================================
    // Event pump
    // =========================================================================

    /// Drain queued completion events without blocking.
    pub fn pump(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.apply_event(event);
        }
        self.notify_if_dirty();
    }

    /// Wait for at least one completion event, then drain the queue.
    ///
    /// Returns immediately once the manager is destroyed.
    pub async fn process_events(&mut self) {
        if self.state == ManagerState::Destroyed {
            return;
        }
        if let Some(event) = self.events_rx.recv().await {
            self.apply_event(event);
            while let Ok(event) = self.events_rx.try_recv() {
                self.apply_event(event);
            }
        }
        self.notify_if_dirty();
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Register a change listener; it is invoked synchronously with the new
    /// version, at most once per operation or event batch that changed it.
    pub fn subscribe(&mut self, listener: ChangeListener) -> ListenerId {
        self.dispatcher.subscribe(listener)
    }

    /// Remove a change listener.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.dispatcher.unsubscribe(id)
    }

    // =========================================================================
    // Read surface
    // =========================================================================

    /// Current manager state.
    pub fn state(&self) -> ManagerState {
        self.state
    }

    /// Wrapping version counter; bumped on every visible tile transition.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The source rectangle currently being kept loaded.
    pub fn load_rect(&self) -> IntRect {
        self.load_rect
    }

    /// Probed description of the bound image, if the probe succeeded.
    pub fn image_info(&self) -> Option<&ImageInfo> {
        self.info.as_ref()
    }

    /// Sample size of the current level, or 0 when no level is active.
    pub fn current_sample_size(&self) -> u32 {
        self.sample_size
    }

    /// Manager-level availability fault, if subsampling was refused.
    pub fn fault(&self) -> Option<&SubsamplingError> {
        self.fault.as_ref()
    }

    /// Snapshot of every non-disposed tile of the current level.
    pub fn tiles(&self) -> Vec<TileSnapshot> {
        self.tiles
            .iter()
            .filter(|slot| slot.state != TileState::Disposed)
            .map(|slot| TileSnapshot {
                coord: slot.descriptor.coord,
                src_rect: slot.descriptor.src_rect,
                sample_size: slot.descriptor.sample_size,
                state: slot.state,
                bitmap: slot.bitmap.clone(),
            })
            .collect()
    }

    /// Summary counters for overlay tooling.
    pub fn diagnostics(&self) -> ManagerDiagnostics {
        let mut diagnostics = ManagerDiagnostics {
            state: self.state,
            version: self.version,
            sample_size: self.sample_size,
            pending: 0,
            loading: 0,
            loaded: 0,
            failed: 0,
            fault: self.fault.as_ref().map(|fault| fault.to_string()),
        };
        for slot in &self.tiles {
            match slot.state {
                TileState::Pending => diagnostics.pending += 1,
                TileState::Loading => diagnostics.loading += 1,
                TileState::Loaded => diagnostics.loaded += 1,
                TileState::Failed => diagnostics.failed += 1,
                TileState::Disposed => {}
            }
        }
        diagnostics
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Release everything tied to the current binding and invalidate
    /// outstanding async work.
    fn teardown_binding(&mut self) {
        if let Some(task) = self.probe_task.take() {
            task.abort();
        }
        self.epoch = self.epoch.wrapping_add(1);
        let mut changed = 0u32;
        for slot in &mut self.tiles {
            if slot.dispose(self.pool.as_ref()) {
                changed += 1;
            }
        }
        self.bump(changed);
        self.tiles.clear();
        self.pyramid = None;
        self.decoder = None;
        self.info = None;
        self.source_key = None;
        self.fault = None;
        self.availability_checked = false;
        self.sample_size = 0;
        self.load_rect = IntRect::ZERO;
    }

    fn apply_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::ProbeFinished { epoch, result } => {
                self.on_probe_finished(epoch, result);
            }
            EngineEvent::TileStarted {
                generation,
                coord,
                sample_size,
            } => {
                if let Some(index) = self.live_slot(generation, coord, sample_size) {
                    let slot = &mut self.tiles[index];
                    if slot.state == TileState::Pending {
                        slot.state = TileState::Loading;
                        self.bump(1);
                    }
                }
            }
            EngineEvent::TileDecoded {
                generation,
                coord,
                sample_size,
                result,
            } => {
                let Some(index) = self.live_slot(generation, coord, sample_size) else {
                    // Superseded completion: the raster still goes back to
                    // the pool, nothing else happens.
                    if let Ok(raster) = result {
                        let _ = self.pool.release(raster);
                    }
                    return;
                };
                let descriptor = self.tiles[index].descriptor;
                match result {
                    Ok(raster) => {
                        let bitmap = TileBitmap::new(raster);
                        if let Some(key) = self.cache_key(&descriptor) {
                            self.cache.put(key, bitmap.clone());
                        }
                        let slot = &mut self.tiles[index];
                        slot.state = TileState::Loaded;
                        slot.bitmap = Some(bitmap);
                        slot.error = None;
                        slot.generation = None;
                        slot.cancel = None;
                        slot.task = None;
                        self.bump(1);
                        debug!(coord = %descriptor.coord, sample_size, "tile decoded");
                    }
                    Err(error) => {
                        warn!(coord = %descriptor.coord, %error, "tile decode failed");
                        let slot = &mut self.tiles[index];
                        slot.state = TileState::Failed;
                        slot.error = Some(error);
                        slot.generation = None;
                        slot.cancel = None;
                        slot.task = None;
                        self.bump(1);
                    }
                }
            }
        }
    }

    fn on_probe_finished(
        &mut self,
        epoch: u64,
        result: Result<(ImageInfo, Option<Arc<dyn RegionSession>>), ProbeError>,
    ) {
        if epoch != self.epoch || self.state == ManagerState::Destroyed {
            debug!("discarding superseded probe result");
            return;
        }
        self.probe_task = None;
        match result {
            Ok((info, session)) => {
                info!(size = %info.size, mime = %info.mime_type, "image source probed");
                let pyramid = TilePyramid::build(
                    info.size,
                    self.options.preferred_tile_size,
                    self.options.single_direction_max_tiles,
                );
                self.decoder = session.map(|session| {
                    Arc::new(RegionDecoder::new(session, info.clone(), self.pool.clone()))
                });
                self.info = Some(info);
                self.pyramid = Some(pyramid);
                self.state = ManagerState::DecoderReady;
                self.try_activate();
            }
            Err(error) => {
                warn!(%error, "image probe failed; subsampling unavailable");
                self.fault = Some(SubsamplingError::SourceUnreadable(error.to_string()));
                self.state = ManagerState::Uninitialized;
            }
        }
    }

    /// Enter `Active` once a viewport is known and the availability checks
    /// pass. The checks run once per binding.
    fn try_activate(&mut self) {
        if self.state != ManagerState::DecoderReady {
            return;
        }
        let Some(viewport) = self.viewport else {
            return;
        };
        let Some(info) = self.info.clone() else {
            return;
        };
        if !self.availability_checked {
            if viewport.content_size.is_empty() {
                return;
            }
            self.availability_checked = true;
            if let Err(fault) = self.check_availability(&info, viewport) {
                warn!(%fault, "subsampling unavailable");
                self.fault = Some(fault);
                return;
            }
        }
        if self.fault.is_some() {
            return;
        }
        debug!("manager active");
        self.state = ManagerState::Active;
        self.refresh_tiles();
    }

    fn check_availability(
        &self,
        info: &ImageInfo,
        viewport: ViewportSnapshot,
    ) -> Result<(), SubsamplingError> {
        let image = info.size;
        let content = viewport.content_size;
        if content.width >= image.width && content.height >= image.height {
            return Err(SubsamplingError::AlreadyFullResolution { content, image });
        }
        let width_ratio = geom::round_decimals(image.width as f32 / content.width as f32, 2);
        let height_ratio = geom::round_decimals(image.height as f32 / content.height as f32, 2);
        if (width_ratio - height_ratio).abs() > 0.5 {
            return Err(SubsamplingError::UnsupportedForSubsampling {
                reason: format!(
                    "content aspect diverges from image: {width_ratio} vs {height_ratio}"
                ),
            });
        }
        if self.decoder.is_none() {
            return Err(SubsamplingError::UnsupportedForSubsampling {
                reason: format!("'{}' cannot be region-decoded", info.mime_type),
            });
        }
        Ok(())
    }

    /// Recompute the active set from the stored viewport. Runs only in
    /// `Active`.
    fn refresh_tiles(&mut self) {
        let Some(viewport) = self.viewport else {
            return;
        };
        let Some(info) = self.info.clone() else {
            return;
        };

        if viewport.rotation_degrees % 90 != 0 {
            debug!(
                rotation = viewport.rotation_degrees,
                "rotation not a right angle; clearing tiles"
            );
            self.clear_active_level();
            return;
        }
        if viewport.content_size.is_empty() || viewport.content_visible_rect.is_empty() {
            self.clear_active_level();
            return;
        }
        if geom::round_decimals(viewport.scale, 2) <= geom::round_decimals(viewport.min_scale, 2) {
            debug!(
                scale = viewport.scale,
                min_scale = viewport.min_scale,
                "scale at or below minimum; clearing tiles"
            );
            self.clear_active_level();
            return;
        }

        let sample_size =
            geom::sample_size_for_scale(info.size, viewport.content_size, viewport.scale);
        if sample_size == 0 {
            self.clear_active_level();
            return;
        }
        let (level_sample, descriptors) = {
            let Some(pyramid) = self.pyramid.as_ref() else {
                self.clear_active_level();
                return;
            };
            let Some(level) = pyramid.level_for(sample_size) else {
                self.clear_active_level();
                return;
            };
            let descriptors = if level.sample_size != self.sample_size {
                Some(level.tiles.clone())
            } else {
                None
            };
            (level.sample_size, descriptors)
        };

        let load_rect = geom::load_rectangle(
            info.size,
            viewport.content_size,
            self.options.preferred_tile_size,
            viewport.content_visible_rect,
            self.options.preload_margin_factor,
        );
        if load_rect.is_empty() {
            self.clear_active_level();
            return;
        }

        if let Some(descriptors) = descriptors {
            self.clear_active_level();
            self.sample_size = level_sample;
            self.tiles = descriptors.into_iter().map(TileSlot::new).collect();
            debug!(
                sample_size = level_sample,
                tiles = self.tiles.len(),
                "switched pyramid level"
            );
        }
        self.load_rect = load_rect;

        // Set difference: cancellations and disposals first, then new
        // requests, so a re-entered coordinate never races its old task.
        let mut changed = 0u32;
        let mut to_schedule = Vec::new();
        for index in 0..self.tiles.len() {
            let overlaps = self.tiles[index].descriptor.src_rect.overlaps(&load_rect);
            if overlaps {
                match self.tiles[index].state {
                    TileState::Disposed => {
                        let slot = &mut self.tiles[index];
                        slot.state = TileState::Pending;
                        slot.error = None;
                        changed += 1;
                        to_schedule.push(index);
                    }
                    TileState::Pending => {
                        if self.tiles[index].generation.is_none() {
                            to_schedule.push(index);
                        }
                    }
                    // Loading, Loaded and Failed stay as they are while in
                    // the active set
                    _ => {}
                }
            } else if self.tiles[index].dispose(self.pool.as_ref()) {
                changed += 1;
            }
        }
        for index in to_schedule {
            changed += self.schedule_tile(index);
        }
        self.bump(changed);
    }

    /// Dispose every tile of the current level, keeping the slots.
    fn clear_active_level(&mut self) {
        self.load_rect = IntRect::ZERO;
        let mut changed = 0u32;
        for slot in &mut self.tiles {
            if slot.dispose(self.pool.as_ref()) {
                changed += 1;
            }
        }
        self.bump(changed);
    }

    /// Start (or cache-serve) the decode for a `Pending` slot. Returns the
    /// number of extra visible transitions this caused.
    fn schedule_tile(&mut self, index: usize) -> u32 {
        let descriptor = self.tiles[index].descriptor;

        if let Some(key) = self.cache_key(&descriptor) {
            if let Some(bitmap) = self.cache.get(&key) {
                let slot = &mut self.tiles[index];
                slot.state = TileState::Loaded;
                slot.bitmap = Some(bitmap);
                debug!(coord = %descriptor.coord, "tile served from memory cache");
                return 1;
            }
        }
        let Some(decoder) = self.decoder.clone() else {
            return 0;
        };

        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        let cancel = Arc::new(AtomicBool::new(false));
        let semaphore = self.semaphore.clone();
        let tx = self.events_tx.clone();
        let coord = descriptor.coord;
        let rect = descriptor.src_rect;
        let sample_size = descriptor.sample_size;

        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            if task_cancel.load(Ordering::SeqCst) {
                return;
            }
            let _ = tx.send(EngineEvent::TileStarted {
                generation,
                coord,
                sample_size,
            });
            let result = decoder.decode_region(rect, sample_size).await;
            if task_cancel.load(Ordering::SeqCst) {
                // Cancelled mid-flight: recycle quietly, report nothing
                if let Ok(raster) = result {
                    decoder.recycle(raster);
                }
                return;
            }
            let _ = tx.send(EngineEvent::TileDecoded {
                generation,
                coord,
                sample_size,
                result,
            });
        });

        let slot = &mut self.tiles[index];
        slot.generation = Some(generation);
        slot.cancel = Some(cancel);
        slot.task = Some(task);
        0
    }

    /// Find the slot a completion event belongs to, unless the event is
    /// stale (level changed, slot recycled, or request superseded).
    fn live_slot(&self, generation: u64, coord: TileCoord, sample_size: u32) -> Option<usize> {
        if self.state != ManagerState::Active || sample_size != self.sample_size {
            return None;
        }
        let index = self
            .tiles
            .iter()
            .position(|slot| slot.descriptor.coord == coord)?;
        let slot = &self.tiles[index];
        if slot.generation != Some(generation) {
            return None;
        }
        match slot.state {
            TileState::Pending | TileState::Loading => Some(index),
            _ => None,
        }
    }

    fn cache_key(&self, descriptor: &TileDescriptor) -> Option<TileCacheKey> {
        self.source_key.as_ref().map(|key| {
            TileCacheKey::new(key.clone(), descriptor.sample_size, descriptor.src_rect)
        })
    }

    fn bump(&mut self, transitions: u32) {
        if transitions > 0 {
            self.version = self.version.wrapping_add(u64::from(transitions));
            self.dirty = true;
        }
    }

    fn notify_if_dirty(&mut self) {
        if self.dirty {
            self.dirty = false;
            let version = self.version;
            self.dispatcher.emit(version);
        }
    }
}

/// Probe the source and, if the image supports region decode, open the
/// session all tiles will share.
async fn probe_source(
    backend: Arc<dyn RasterBackend>,
    source: Arc<dyn ImageSource>,
) -> Result<(ImageInfo, Option<Arc<dyn RegionSession>>), ProbeError> {
    let info = backend.probe(source.as_ref()).await?;
    if !backend.supports_region_decode(&info) {
        return Ok((info, None));
    }
    match backend.open_region(source, &info).await {
        Ok(session) => Ok((info, Some(Arc::from(session)))),
        Err(error) => Err(ProbeError::Decode(error.to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================
