//! Local-directory content source.
//!
//! Resolves identifiers to files and directories under a root directory.
//! A directory becomes an item containing every regular file beneath it;
//! a single file becomes a one-file item.

use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

use crate::error::ResolveError;

use super::{ByteRange, ContentFile, ContentReader, ContentResolver, ResolvedItem};

/// Fallback MIME type for unknown extensions.
const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Filesystem-backed implementation of `ContentResolver`.
///
/// # Example
///
/// ```ignore
/// use stream_gateway::content::{ContentResolver, DirectorySource};
///
/// let source = DirectorySource::new("/srv/media");
///
/// // "shows/pilot" resolves to every file under /srv/media/shows/pilot
/// let item = source.resolve("shows/pilot").await?;
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Create a source rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ContentResolver for DirectorySource {
    async fn resolve(&self, identifier: &str) -> Result<ResolvedItem, ResolveError> {
        let relative = sanitize_identifier(identifier)
            .ok_or_else(|| ResolveError::NotFound(identifier.to_string()))?;
        let root = fs::canonicalize(&self.root)
            .await
            .map_err(|e| map_io_error(identifier, e))?;
        let full_path = fs::canonicalize(root.join(&relative))
            .await
            .map_err(|e| map_io_error(identifier, e))?;

        // Symlinks may point anywhere; the resolved target must stay under the root
        if !full_path.starts_with(&root) {
            debug!(
                identifier = identifier,
                target = %full_path.display(),
                "Identifier resolves outside the content root"
            );
            return Err(ResolveError::NotFound(identifier.to_string()));
        }

        let metadata = fs::metadata(&full_path)
            .await
            .map_err(|e| map_io_error(identifier, e))?;

        let item_name = relative
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ResolveError::NotFound(identifier.to_string()))?;

        let files: Vec<Arc<dyn ContentFile>> = if metadata.is_file() {
            vec![Arc::new(DirectoryFile::new(
                full_path,
                item_name.clone(),
                metadata.len(),
            ))]
        } else {
            collect_files(&full_path, &item_name)
                .await
                .map_err(|e| map_io_error(identifier, e))?
        };

        debug!(
            identifier = identifier,
            files = files.len(),
            "Resolved directory item"
        );

        Ok(ResolvedItem::new(item_name, files))
    }
}

/// Turn an identifier into a relative path, rejecting anything that could
/// escape the root.
fn sanitize_identifier(identifier: &str) -> Option<PathBuf> {
    let trimmed = identifier.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    let path = Path::new(trimmed);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

fn map_io_error(identifier: &str, err: std::io::Error) -> ResolveError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ResolveError::NotFound(identifier.to_string())
    } else {
        ResolveError::Unavailable(format!("{}: {}", identifier, err))
    }
}

/// Walk a directory tree and collect regular files sorted by path.
///
/// Symlinks are skipped, so the walk never leaves the tree and never loops.
async fn collect_files(
    dir: &Path,
    item_name: &str,
) -> std::io::Result<Vec<Arc<dyn ContentFile>>> {
    let mut found: Vec<DirectoryFile> = Vec::new();
    let mut pending = vec![(dir.to_path_buf(), item_name.to_string())];

    while let Some((current, prefix)) = pending.pop() {
        let mut entries = fs::read_dir(&current).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = format!("{}/{}", prefix, name);

            if file_type.is_symlink() {
                trace!(path = %path, "Skipping symlink");
            } else if file_type.is_dir() {
                pending.push((entry.path(), path));
            } else if file_type.is_file() {
                let metadata = entry.metadata().await?;
                found.push(DirectoryFile::new(entry.path(), path, metadata.len()));
            }
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found
        .into_iter()
        .map(|file| Arc::new(file) as Arc<dyn ContentFile>)
        .collect())
}

/// A regular file under the source root.
#[derive(Debug)]
struct DirectoryFile {
    full_path: PathBuf,
    path: String,
    name: String,
    length: u64,
    mime_type: String,
}

impl DirectoryFile {
    fn new(full_path: PathBuf, path: String, length: u64) -> Self {
        let name = path.rsplit('/').next().unwrap_or(&path).to_string();
        let mime_type = mime_guess::from_path(&name)
            .first_raw()
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        Self {
            full_path,
            path,
            name,
            length,
            mime_type,
        }
    }
}

#[async_trait]
impl ContentFile for DirectoryFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn length(&self) -> u64 {
        self.length
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn open(&self, range: Option<ByteRange>) -> std::io::Result<ContentReader> {
        let mut file = fs::File::open(&self.full_path).await?;
        match range {
            Some(range) => {
                file.seek(SeekFrom::Start(range.start)).await?;
                Ok(Box::new(file.take(range.len())))
            }
            None => Ok(Box::new(file)),
        }
    }

    fn release(&self) {
        trace!(path = %self.full_path.display(), "Directory file released");
    }
}
