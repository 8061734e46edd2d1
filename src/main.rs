//! Gigatile - tile planning and region decoding for huge images.
//!
//! This binary probes images and reports their subsampling plans.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gigatile::{
    config::{Cli, Command, EngineOptions},
    decode::{ImageCrateBackend, RasterBackend, RegionDecoder},
    geom::{self, IntRect, IntSize},
    source::FileImageSource,
    tile::{LruBitmapPool, TileDescriptor, TilePyramid},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    let options = cli.engine_options();

    match cli.command {
        Command::Inspect { image } => run_inspect(image, options).await,
        Command::Plan {
            image,
            scale,
            content,
            viewport,
            decode,
        } => run_plan(image, options, scale, content, viewport, decode).await,
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "gigatile=debug"
    } else {
        "gigatile=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Inspect Command
// =============================================================================

async fn run_inspect(image: PathBuf, options: EngineOptions) -> ExitCode {
    let backend = ImageCrateBackend::new();
    let source = FileImageSource::new(&image);

    let info = match backend.probe(&source).await {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Error: failed to probe '{}': {}", image.display(), e);
            return ExitCode::FAILURE;
        }
    };

    println!("Image: {}", image.display());
    println!("═════════════════════════════════");
    println!("  Size:          {}", info.size);
    println!(
        "  Orientation:   {:?} (EXIF {})",
        info.orientation,
        info.orientation.exif_value()
    );
    if info.raw_size() != info.size {
        println!("  Raw size:      {}", info.raw_size());
    }
    println!("  MIME type:     {}", info.mime_type);
    println!(
        "  Region decode: {}",
        if backend.supports_region_decode(&info) {
            "supported"
        } else {
            "unsupported (full decode only)"
        }
    );
    println!();

    let pyramid = TilePyramid::build(
        info.size,
        options.preferred_tile_size,
        options.single_direction_max_tiles,
    );
    print_pyramid(&pyramid);

    ExitCode::SUCCESS
}

fn print_pyramid(pyramid: &TilePyramid) {
    println!("Pyramid: {} level(s)", pyramid.levels().len());
    println!("  {:>11}  {:>9}  {:>6}  {}", "sample size", "grid", "tiles", "tile extent");
    println!("  ───────────  ─────────  ──────  ───────────");
    for level in pyramid.levels() {
        let extent = level
            .tiles
            .first()
            .map(|tile| format!("{}x{}", tile.src_rect.width(), tile.src_rect.height()))
            .unwrap_or_default();
        println!(
            "  {:>11}  {:>9}  {:>6}  {}",
            level.sample_size,
            level.grid.to_string(),
            level.tile_count(),
            extent
        );
    }
}

// =============================================================================
// Plan Command
// =============================================================================

async fn run_plan(
    image: PathBuf,
    options: EngineOptions,
    scale: f32,
    content: Option<IntSize>,
    viewport: Option<IntRect>,
    decode: bool,
) -> ExitCode {
    let backend = ImageCrateBackend::new();
    let source = Arc::new(FileImageSource::new(&image));

    let info = match backend.probe(source.as_ref()).await {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Error: failed to probe '{}': {}", image.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let content = content.unwrap_or_else(|| fit_content(info.size));
    let visible = viewport.unwrap_or_else(|| IntRect::new(0, 0, content.width, content.height));

    println!("Plan for {} at scale {}", image.display(), scale);
    println!("═════════════════════════════════");
    println!("  Image size:   {}", info.size);
    println!("  Content size: {}", content);
    println!("  Visible rect: {}", visible);

    let sample_size = geom::sample_size_for_scale(info.size, content, scale);
    if sample_size == 0 {
        println!();
        println!("Nothing to load: image or content size is degenerate.");
        return ExitCode::SUCCESS;
    }

    let pyramid = TilePyramid::build(
        info.size,
        options.preferred_tile_size,
        options.single_direction_max_tiles,
    );
    let Some(level) = pyramid.level_for(sample_size) else {
        println!();
        println!("Nothing to load: the pyramid is empty.");
        return ExitCode::SUCCESS;
    };

    let load_rect = geom::load_rectangle(
        info.size,
        content,
        options.preferred_tile_size,
        visible,
        options.preload_margin_factor,
    );

    println!("  Sample size:  {} (grid {})", level.sample_size, level.grid);
    println!("  Load rect:    {}", load_rect);
    println!();

    let active: Vec<&TileDescriptor> = level
        .tiles
        .iter()
        .filter(|tile| tile.src_rect.overlaps(&load_rect))
        .collect();

    println!("Active tiles: {} of {}", active.len(), level.tiles.len());
    println!("─────────────────────────────────");
    for tile in &active {
        println!("  {}  {}", tile.coord, tile.src_rect);
    }

    if decode {
        return run_plan_decode(&backend, source, &info, &active).await;
    }

    ExitCode::SUCCESS
}

/// Decode every active tile once and report the resulting raster sizes.
async fn run_plan_decode(
    backend: &ImageCrateBackend,
    source: Arc<FileImageSource>,
    info: &gigatile::ImageInfo,
    active: &[&TileDescriptor],
) -> ExitCode {
    if !backend.supports_region_decode(info) {
        eprintln!(
            "Error: '{}' does not support region decode",
            info.mime_type
        );
        return ExitCode::FAILURE;
    }

    let session = match backend.open_region(source, info).await {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error: failed to open region session: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let decoder = RegionDecoder::new(
        Arc::from(session),
        info.clone(),
        Arc::new(LruBitmapPool::new()),
    );

    println!();
    println!("Decoding {} tile(s)...", active.len());
    let start = Instant::now();
    let mut failures = 0usize;
    for tile in active {
        match decoder.decode_region(tile.src_rect, tile.sample_size).await {
            Ok(raster) => {
                println!(
                    "  ✓ {}  {}x{} px",
                    tile.coord,
                    raster.width(),
                    raster.height()
                );
                decoder.recycle(raster);
            }
            Err(e) => {
                println!("  ✗ {}  {}", tile.coord, e);
                failures += 1;
            }
        }
    }
    println!(
        "Decoded {} tile(s) in {:.1?}",
        active.len() - failures,
        start.elapsed()
    );

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Default content size: the image fitted into a 1920x1080 box.
fn fit_content(image: IntSize) -> IntSize {
    const FIT: IntSize = IntSize::new(1920, 1080);
    if image.width <= FIT.width && image.height <= FIT.height {
        return image;
    }
    let scale = (FIT.width as f32 / image.width as f32)
        .min(FIT.height as f32 / image.height as f32);
    IntSize::new(
        ((image.width as f32 * scale).round() as i32).max(1),
        ((image.height as f32 * scale).round() as i32).max(1),
    )
}
