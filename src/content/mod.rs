//! Content abstraction layer.
//!
//! The gateway never fetches bytes itself. A [`ContentResolver`] turns an
//! item identifier into a [`ResolvedItem`], whose files expose their
//! metadata and can be opened as async byte streams.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Gateway Router             │
//! └────────────────────┬────────────────────┘
//!                      │ resolve(identifier)
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │         ContentResolver Trait           │
//! │  (DirectorySource, test mocks, ...)     │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   ResolvedItem { name, files }          │
//! │   ContentFile: open(range) / release()  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Every file the gateway intends to serve is wrapped in a [`FileLease`],
//! which calls [`ContentFile::release`] exactly once when dropped.

mod directory;
mod lease;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::error::ResolveError;

pub use directory::DirectorySource;
pub use lease::FileLease;

/// Boxed async reader returned by [`ContentFile::open`].
pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

/// Inclusive, 0-indexed byte range within a file.
///
/// Invariant: `start <= end < length` of the file it was planned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Always false; an inclusive range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// One file within a resolved item.
#[async_trait]
pub trait ContentFile: Send + Sync {
    /// Path relative to the item root, `/`-separated. Used as the ZIP entry name.
    fn path(&self) -> &str;

    /// Display name of the file (usually the last path component).
    fn name(&self) -> &str;

    /// Total length in bytes.
    fn length(&self) -> u64;

    /// MIME type, e.g. `video/mp4`.
    fn mime_type(&self) -> &str;

    /// Open a byte stream over the whole file or the given range.
    async fn open(&self, range: Option<ByteRange>) -> std::io::Result<ContentReader>;

    /// Signal that the gateway is done with this file.
    ///
    /// Called exactly once per lease; see [`FileLease`].
    fn release(&self);
}

/// Trait for resolving item identifiers into file lists.
///
/// Implementations must be safe to call concurrently. Any de-duplication of
/// underlying fetches is the implementation's responsibility.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Resolve an identifier into an item.
    async fn resolve(&self, identifier: &str) -> Result<ResolvedItem, ResolveError>;
}

/// An item returned by a [`ContentResolver`].
#[derive(Clone)]
pub struct ResolvedItem {
    /// Item name, used for archive and playlist file names
    pub name: String,

    /// Files in the item's canonical order
    pub files: Vec<Arc<dyn ContentFile>>,
}

impl ResolvedItem {
    pub fn new(name: impl Into<String>, files: Vec<Arc<dyn ContentFile>>) -> Self {
        Self {
            name: name.into(),
            files,
        }
    }
}

impl fmt::Debug for ResolvedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedItem")
            .field("name", &self.name)
            .field(
                "files",
                &self.files.iter().map(|file| file.path()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
