use thiserror::Error;

use crate::geom::IntSize;

/// Errors opening or reading the bytes of an image source
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Underlying I/O failure while opening or reading
    #[error("I/O error: {0}")]
    Io(String),

    /// The source does not exist
    #[error("Source not found: {0}")]
    NotFound(String),
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(err.to_string()),
            _ => SourceError::Io(err.to_string()),
        }
    }
}

/// Errors probing an image for its bounds, type and orientation
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The source bytes could not be read
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The bytes do not match any known image format
    #[error("Unrecognized image format")]
    UnrecognizedFormat,

    /// The header could not be parsed
    #[error("Probe failed: {0}")]
    Decode(String),
}

/// Errors decoding a single tile region
#[derive(Debug, Clone, Error)]
pub enum TileDecodeError {
    /// The source bytes could not be read
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The decoder rejected the region or the compressed data
    #[error("Decode failed: {0}")]
    Decode(String),

    /// The decode exceeded its memory budget
    #[error("Out of memory: {0}")]
    OutOfMemory(String),
}

/// Faults that stop the whole engine from serving tiles for an image.
///
/// These are recorded once per bound image and leave the host rendering its
/// base content; they never affect other images bound later.
#[derive(Debug, Clone, Error)]
pub enum SubsamplingError {
    /// The image could not be probed
    #[error("Source unreadable: {0}")]
    SourceUnreadable(String),

    /// The image or viewport shape rules out tiled decoding
    #[error("Unsupported for subsampling: {reason}")]
    UnsupportedForSubsampling { reason: String },

    /// The displayed content already carries full image resolution
    #[error("Content {content} is already at full resolution for image {image}")]
    AlreadyFullResolution { content: IntSize, image: IntSize },
}
