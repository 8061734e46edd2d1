//! EXIF orientation handling.
//!
//! Cameras store pixels in sensor order and record how to turn them upright
//! in the EXIF orientation tag. The engine plans tiles in the upright
//! (display-facing) space, so every region decode maps its rectangle back
//! into raw storage space first and transforms the decoded pixels forward
//! afterwards.
//!
//! All eight cases decompose into an optional horizontal mirror followed by
//! a clockwise rotation. The rectangle maps below are the coordinate-space
//! versions of that same decomposition; [`apply_to_rect`] and
//! [`reverse_apply_to_rect`] are exact inverses of each other.
//!
//! [`apply_to_rect`]: ExifOrientation::apply_to_rect
//! [`reverse_apply_to_rect`]: ExifOrientation::reverse_apply_to_rect

use image::imageops;
use image::RgbaImage;

use crate::geom::{IntRect, IntSize};

/// The eight EXIF orientation cases.
///
/// The numbering follows the EXIF specification; [`Self::from_exif`] and
/// [`Self::exif_value`] convert to and from the tag value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ExifOrientation {
    /// 1: stored upright
    Normal,
    /// 2: mirrored left to right
    FlipHorizontal,
    /// 3: rotated 180 degrees
    Rotate180,
    /// 4: mirrored top to bottom
    FlipVertical,
    /// 5: mirrored, then rotated 270 degrees clockwise
    Transpose,
    /// 6: rotated 90 degrees clockwise
    Rotate90,
    /// 7: mirrored, then rotated 90 degrees clockwise
    Transverse,
    /// 8: rotated 270 degrees clockwise
    Rotate270,
}

impl ExifOrientation {
    /// Parse an EXIF orientation tag value (1 through 8).
    pub fn from_exif(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Normal),
            2 => Some(Self::FlipHorizontal),
            3 => Some(Self::Rotate180),
            4 => Some(Self::FlipVertical),
            5 => Some(Self::Transpose),
            6 => Some(Self::Rotate90),
            7 => Some(Self::Transverse),
            8 => Some(Self::Rotate270),
            _ => None,
        }
    }

    /// The EXIF tag value of this case.
    pub fn exif_value(&self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::FlipHorizontal => 2,
            Self::Rotate180 => 3,
            Self::FlipVertical => 4,
            Self::Transpose => 5,
            Self::Rotate90 => 6,
            Self::Transverse => 7,
            Self::Rotate270 => 8,
        }
    }

    /// Convert from the `image` crate's orientation type.
    pub fn from_image_orientation(orientation: image::metadata::Orientation) -> Self {
        use image::metadata::Orientation as O;
        match orientation {
            O::NoTransforms => Self::Normal,
            O::FlipHorizontal => Self::FlipHorizontal,
            O::Rotate180 => Self::Rotate180,
            O::FlipVertical => Self::FlipVertical,
            O::Rotate90FlipH => Self::Transpose,
            O::Rotate90 => Self::Rotate90,
            O::Rotate270FlipH => Self::Transverse,
            O::Rotate270 => Self::Rotate270,
        }
    }

    /// Whether the case starts with a horizontal mirror.
    pub fn is_flipped(&self) -> bool {
        matches!(
            self,
            Self::FlipHorizontal | Self::FlipVertical | Self::Transpose | Self::Transverse
        )
    }

    /// Clockwise rotation applied after the mirror, in degrees.
    pub fn rotation_degrees(&self) -> u32 {
        match self {
            Self::Normal | Self::FlipHorizontal => 0,
            Self::Rotate90 | Self::Transverse => 90,
            Self::Rotate180 | Self::FlipVertical => 180,
            Self::Rotate270 | Self::Transpose => 270,
        }
    }

    /// Whether width and height trade places.
    pub fn swaps_axes(&self) -> bool {
        matches!(self.rotation_degrees(), 90 | 270)
    }

    /// Map stored dimensions to upright dimensions.
    pub fn apply_to_size(&self, size: IntSize) -> IntSize {
        if self.swaps_axes() {
            size.transposed()
        } else {
            size
        }
    }

    /// Map upright dimensions back to stored dimensions.
    pub fn reverse_apply_to_size(&self, size: IntSize) -> IntSize {
        self.apply_to_size(size)
    }

    /// Map a rectangle from raw storage space into upright space.
    ///
    /// `raw_size` is the stored (pre-orientation) image size.
    pub fn apply_to_rect(&self, rect: IntRect, raw_size: IntSize) -> IntRect {
        let (w, h) = (raw_size.width, raw_size.height);
        let IntRect {
            left: l,
            top: t,
            right: r,
            bottom: b,
        } = rect;
        match self {
            Self::Normal => rect,
            Self::FlipHorizontal => IntRect::new(w - r, t, w - l, b),
            Self::Rotate180 => IntRect::new(w - r, h - b, w - l, h - t),
            Self::FlipVertical => IntRect::new(l, h - b, r, h - t),
            Self::Transpose => IntRect::new(t, l, b, r),
            Self::Rotate90 => IntRect::new(h - b, l, h - t, r),
            Self::Transverse => IntRect::new(h - b, w - r, h - t, w - l),
            Self::Rotate270 => IntRect::new(t, w - r, b, w - l),
        }
    }

    /// Map a rectangle from upright space back into raw storage space.
    ///
    /// `oriented_size` is the upright image size.
    pub fn reverse_apply_to_rect(&self, rect: IntRect, oriented_size: IntSize) -> IntRect {
        let (w, h) = (oriented_size.width, oriented_size.height);
        let IntRect {
            left: l,
            top: t,
            right: r,
            bottom: b,
        } = rect;
        match self {
            Self::Normal => rect,
            Self::FlipHorizontal => IntRect::new(w - r, t, w - l, b),
            Self::Rotate180 => IntRect::new(w - r, h - b, w - l, h - t),
            Self::FlipVertical => IntRect::new(l, h - b, r, h - t),
            Self::Transpose => IntRect::new(t, l, b, r),
            Self::Rotate90 => IntRect::new(t, w - r, b, w - l),
            Self::Transverse => IntRect::new(h - b, w - r, h - t, w - l),
            Self::Rotate270 => IntRect::new(h - b, l, h - t, r),
        }
    }

    /// Transform raw pixels into upright pixels. Always allocates; callers
    /// that can work in place handle the non-rotating cases themselves.
    pub fn apply_to_image(&self, image: &RgbaImage) -> RgbaImage {
        let flipped;
        let source = if self.is_flipped() {
            flipped = imageops::flip_horizontal(image);
            &flipped
        } else {
            image
        };
        match self.rotation_degrees() {
            90 => imageops::rotate90(source),
            180 => imageops::rotate180(source),
            270 => imageops::rotate270(source),
            _ => source.clone(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
