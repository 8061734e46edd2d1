//! Integer geometry primitives.
//!
//! All tile planning happens on integer pixel grids, so the engine uses its
//! own small set of integer types rather than floating-point geometry:
//!
//! - [`IntSize`] - width/height pair
//! - [`IntOffset`] - x/y pair, also used for grid dimensions
//! - [`IntRect`] - axis-aligned rectangle with **exclusive** right/bottom edges
//!
//! # Coordinate Spaces
//!
//! Three spaces appear throughout the crate:
//!
//! - **Image space**: full-resolution pixels of the oriented (upright) image
//! - **Content space**: pixels of the scaled-down base image the host displays
//! - **Raw space**: pixels as stored in the file, before EXIF orientation
//!
//! Rectangles carry no space tag; the function signatures say which space
//! they expect.

mod planner;

pub use planner::{
    grid_size_for_level, load_rectangle, max_grid_size, sample_size_for_scale,
    DEFAULT_PRELOAD_MARGIN_FACTOR,
};
pub(crate) use planner::round_decimals;

use std::fmt;

// =============================================================================
// IntSize
// =============================================================================

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IntSize {
    pub width: i32,
    pub height: i32,
}

impl IntSize {
    /// The zero size.
    pub const ZERO: IntSize = IntSize {
        width: 0,
        height: 0,
    };

    /// Create a new size.
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Whether either dimension is zero or negative.
    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Total pixel count. Zero for empty sizes.
    pub fn area(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    /// The size with width and height exchanged.
    pub const fn transposed(&self) -> IntSize {
        IntSize {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for IntSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// =============================================================================
// IntOffset
// =============================================================================

/// An x/y pair. Also used for grid dimensions (columns, rows).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IntOffset {
    pub x: i32,
    pub y: i32,
}

impl IntOffset {
    /// The zero offset.
    pub const ZERO: IntOffset = IntOffset { x: 0, y: 0 };

    /// Create a new offset.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for IntOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.x, self.y)
    }
}

// =============================================================================
// IntRect
// =============================================================================

/// An axis-aligned rectangle with exclusive right/bottom edges.
///
/// A rect covers the pixels `x` in `left..right` and `y` in `top..bottom`.
/// Rects with `right <= left` or `bottom <= top` are empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct IntRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IntRect {
    /// The empty rect at the origin.
    pub const ZERO: IntRect = IntRect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    /// Create a new rect from its edges.
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Create a rect from an origin and a size.
    pub const fn from_origin_size(origin: IntOffset, size: IntSize) -> Self {
        Self {
            left: origin.x,
            top: origin.y,
            right: origin.x + size.width,
            bottom: origin.y + size.height,
        }
    }

    /// Width of the rect. Negative for inverted rects.
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    /// Height of the rect. Negative for inverted rects.
    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Size of the rect.
    pub fn size(&self) -> IntSize {
        IntSize::new(self.width(), self.height())
    }

    /// Whether the rect covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.right <= self.left || self.bottom <= self.top
    }

    /// Whether two rects share at least one pixel.
    pub fn overlaps(&self, other: &IntRect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left < other.right
            && other.left < self.right
            && self.top < other.bottom
            && other.top < self.bottom
    }

    /// The intersection of two rects. Empty if they do not overlap.
    pub fn intersect(&self, other: &IntRect) -> IntRect {
        IntRect {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.min(other.right),
            bottom: self.bottom.min(other.bottom),
        }
    }

    /// Clamp all edges into the bounds of `size`.
    pub fn clamp_to(&self, size: IntSize) -> IntRect {
        IntRect {
            left: self.left.clamp(0, size.width),
            top: self.top.clamp(0, size.height),
            right: self.right.clamp(0, size.width),
            bottom: self.bottom.clamp(0, size.height),
        }
    }
}

impl fmt::Display for IntRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{},{},{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
