//! Pure planning math for the tile engine.
//!
//! Every function in this module is stateless and deterministic: the same
//! inputs always produce the same plan. The manager calls these on each
//! viewport change; the `plan` CLI subcommand exposes them directly.
//!
//! # Sample Size
//!
//! A sample size of `n` means one decoded pixel per `n x n` block of source
//! pixels. Sample sizes are always powers of two, chosen so the decoded
//! detail roughly matches what the current display scale can show.

use crate::geom::{IntOffset, IntRect, IntSize};

/// Default preload margin: expand the visible rect by half a tile per edge.
pub const DEFAULT_PRELOAD_MARGIN_FACTOR: f32 = 0.5;

/// Round a value to `decimals` decimal places.
pub(crate) fn round_decimals(value: f32, decimals: i32) -> f32 {
    let factor = 10f32.powi(decimals);
    (value * factor).round() / factor
}

fn ceil_div(a: i64, b: i64) -> i64 {
    (a + b - 1) / b
}

// =============================================================================
// Sample Size Selection
// =============================================================================

/// Choose the power-of-two sample size for a display scale.
///
/// The ratio between full-resolution width and displayed width
/// (`image.width / (content.width * scale)`) is rounded to one decimal
/// place, then snapped to the nearest power of two on the log2 scale.
/// Higher scales (zooming in) produce smaller sample sizes.
///
/// Returns `0` for degenerate input (empty sizes or a non-positive scale).
pub fn sample_size_for_scale(image_size: IntSize, content_size: IntSize, scale: f32) -> u32 {
    if image_size.is_empty() || content_size.is_empty() || scale <= 0.0 || !scale.is_finite() {
        return 0;
    }
    let ratio = image_size.width as f32 / (content_size.width as f32 * scale);
    closest_power_of_two(round_decimals(ratio, 1))
}

/// Snap a ratio to the nearest power of two, never below 1.
fn closest_power_of_two(ratio: f32) -> u32 {
    let exponent = ratio.log2().round();
    if !exponent.is_finite() || exponent <= 0.0 {
        return 1;
    }
    1u32 << (exponent as u32).min(31)
}

// =============================================================================
// Grid Sizing
// =============================================================================

/// Cap the tile grid so no direction exceeds `single_direction_max_tiles`.
///
/// The longer image dimension receives the cap exactly; the shorter one is
/// scaled by the aspect ratio and rounded, but never below one row/column.
///
/// Returns [`IntOffset::ZERO`] for degenerate input.
pub fn max_grid_size(image_size: IntSize, single_direction_max_tiles: u32) -> IntOffset {
    if image_size.is_empty() || single_direction_max_tiles == 0 {
        return IntOffset::ZERO;
    }
    let cap = single_direction_max_tiles.min(i32::MAX as u32) as i32;
    let width = image_size.width as f32;
    let height = image_size.height as f32;
    if image_size.width > image_size.height {
        let y = (cap as f32 * (height / width)).round() as i32;
        IntOffset::new(cap, y.max(1))
    } else {
        let x = (cap as f32 * (width / height)).round() as i32;
        IntOffset::new(x.max(1), cap)
    }
}

/// Compute the tile grid for one pyramid level.
///
/// Each axis gets `ceil(dimension / sample_size / preferred_tile)` tiles,
/// clamped to `max_grid`. With the clamp active, actual tiles grow larger
/// than the preferred tile size.
pub fn grid_size_for_level(
    image_size: IntSize,
    preferred_tile_size: IntSize,
    sample_size: u32,
    max_grid: IntOffset,
) -> IntOffset {
    if image_size.is_empty()
        || preferred_tile_size.is_empty()
        || sample_size == 0
        || max_grid.x <= 0
        || max_grid.y <= 0
    {
        return IntOffset::ZERO;
    }
    let sample = sample_size as i64;
    let x = ceil_div(
        image_size.width as i64,
        sample * preferred_tile_size.width as i64,
    ) as i32;
    let y = ceil_div(
        image_size.height as i64,
        sample * preferred_tile_size.height as i64,
    ) as i32;
    IntOffset::new(x.min(max_grid.x), y.min(max_grid.y))
}

// =============================================================================
// Load Rectangle
// =============================================================================

/// Map the visible content rect into image space and expand it for preload.
///
/// The content-space rect is scaled up by the content-to-image ratio
/// (floor on the near edges, ceil on the far edges), then every edge moves
/// outward by `preferred_tile * margin_factor` pixels so tiles just outside
/// the viewport start decoding before they scroll in. The result is clamped
/// to the image bounds.
///
/// Returns [`IntRect::ZERO`] when any input is empty.
pub fn load_rectangle(
    image_size: IntSize,
    content_size: IntSize,
    preferred_tile_size: IntSize,
    content_visible_rect: IntRect,
    margin_factor: f32,
) -> IntRect {
    if image_size.is_empty() || content_size.is_empty() || content_visible_rect.is_empty() {
        return IntRect::ZERO;
    }
    let width_scale = image_size.width as f32 / content_size.width as f32;
    let height_scale = image_size.height as f32 / content_size.height as f32;
    let visible = IntRect::new(
        (content_visible_rect.left as f32 * width_scale).floor() as i32,
        (content_visible_rect.top as f32 * height_scale).floor() as i32,
        (content_visible_rect.right as f32 * width_scale).ceil() as i32,
        (content_visible_rect.bottom as f32 * height_scale).ceil() as i32,
    );
    let margin = margin_factor.max(0.0);
    let h_extend = preferred_tile_size.width as f32 * margin;
    let v_extend = preferred_tile_size.height as f32 * margin;
    let expanded = IntRect::new(
        (visible.left as f32 - h_extend).floor() as i32,
        (visible.top as f32 - v_extend).floor() as i32,
        (visible.right as f32 + h_extend).ceil() as i32,
        (visible.bottom as f32 + v_extend).ceil() as i32,
    );
    expanded.clamp_to(image_size)
}

// =============================================================================
// Tests
// =============================================================================
