//! Probing and region decoding.
//!
//! This module owns everything between "a source of bytes" and "a decoded
//! tile raster":
//!
//! - [`backend`] - the [`RasterBackend`]/[`RegionSession`] capability seam
//! - [`image_backend`] - the bundled backend over the `image`/`png` crates
//! - [`orientation`] - EXIF orientation math for sizes, rects and pixels
//! - [`region`] - [`RegionDecoder`], which ties session, orientation and
//!   bitmap pool together for one bound image

pub mod backend;
pub mod image_backend;
pub mod orientation;
pub mod region;

pub use backend::{sampled_dimensions, ImageInfo, RasterBackend, RegionSession};
pub use image_backend::ImageCrateBackend;
pub use orientation::ExifOrientation;
pub use region::RegionDecoder;
