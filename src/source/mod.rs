//! Image source abstraction.
//!
//! A source is anything that can hand out a fresh readable stream over the
//! raw bytes of one image. The engine never holds a stream open across
//! operations: each probe and each decode opens its own, so implementations
//! must tolerate any number of concurrently open streams.
//!
//! Two implementations ship with the crate:
//!
//! - [`FileImageSource`] - opens the file again for every stream
//! - [`BytesImageSource`] - serves an in-memory payload

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek};

use crate::error::SourceError;

/// Combined bound for the streams a source hands out.
pub trait SourceRead: AsyncRead + AsyncSeek + Send + Unpin {}

impl<T: AsyncRead + AsyncSeek + Send + Unpin> SourceRead for T {}

/// A fresh stream positioned at the start of the source's bytes.
pub type SourceStream = Box<dyn SourceRead>;

// =============================================================================
// ImageSource
// =============================================================================

/// Capability: re-openable byte access to one image.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Stable identity used in cache keys.
    ///
    /// Two sources with the same key must serve identical bytes.
    fn key(&self) -> &str;

    /// Open a new independent stream over the bytes.
    async fn open_stream(&self) -> Result<SourceStream, SourceError>;
}

/// Read a source's entire byte payload into memory.
pub async fn read_all(source: &dyn ImageSource) -> Result<Bytes, SourceError> {
    let mut stream = source.open_stream().await?;
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

// =============================================================================
// FileImageSource
// =============================================================================

/// An image stored on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileImageSource {
    path: PathBuf,
    key: String,
}

impl FileImageSource {
    /// Create a source for the given path. The path is not checked until
    /// the first stream is opened.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let key = format!("file://{}", path.display());
        Self { path, key }
    }

    /// The path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ImageSource for FileImageSource {
    fn key(&self) -> &str {
        &self.key
    }

    async fn open_stream(&self) -> Result<SourceStream, SourceError> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

// =============================================================================
// BytesImageSource
// =============================================================================

/// An image held entirely in memory.
///
/// Streams are cursors over a shared [`Bytes`] payload, so opening one is
/// allocation-free.
#[derive(Debug, Clone)]
pub struct BytesImageSource {
    key: String,
    bytes: Bytes,
}

impl BytesImageSource {
    /// Create a source from an explicit key and payload.
    pub fn new(key: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            bytes: bytes.into(),
        }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[async_trait]
impl ImageSource for BytesImageSource {
    fn key(&self) -> &str {
        &self.key
    }

    async fn open_stream(&self) -> Result<SourceStream, SourceError> {
        Ok(Box::new(Cursor::new(self.bytes.clone())))
    }
}

// =============================================================================
// Tests
// =============================================================================
