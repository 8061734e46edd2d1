//! Viewport snapshots.

use crate::geom::{IntRect, IntSize};

/// Immutable description of what the host is currently displaying.
///
/// `content_size` is the size of the scaled-down base image the host
/// renders (the picture the tiles sharpen) and `content_visible_rect` is
/// the portion of it inside the window, both in content pixels. `scale`
/// is the host's current display scale for that content; `min_scale` is
/// the scale at which the content exactly fits the window. Subsampling
/// shuts off at or below `min_scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ViewportSnapshot {
    /// Size of the content the host renders
    pub content_size: IntSize,

    /// Visible portion of the content, in content pixels
    pub content_visible_rect: IntRect,

    /// Current display scale
    pub scale: f32,

    /// Scale at which the content exactly fits the window
    pub min_scale: f32,

    /// Host rotation in degrees; tiles are only served at multiples of 90
    pub rotation_degrees: i32,
}

impl ViewportSnapshot {
    /// Create an unrotated snapshot.
    pub fn new(
        content_size: IntSize,
        content_visible_rect: IntRect,
        scale: f32,
        min_scale: f32,
    ) -> Self {
        Self {
            content_size,
            content_visible_rect,
            scale,
            min_scale,
            rotation_degrees: 0,
        }
    }

    /// Set the rotation in degrees.
    pub fn with_rotation(mut self, degrees: i32) -> Self {
        self.rotation_degrees = degrees;
        self
    }
}
