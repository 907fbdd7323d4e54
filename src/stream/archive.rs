//! Live ZIP streaming over several files.
//!
//! Every selected file is leased before the first byte goes out. Files are
//! opened one at a time as the encoder reaches them, and each lease is
//! dropped as soon as its entry is complete. If the client disconnects, the
//! body stream is dropped together with every outstanding lease; files that
//! were never reached are released without being opened.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures::stream::{self, Stream};
use http::{header, Method, StatusCode};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::content::{ContentFile, ContentReader, FileLease};
use crate::error::{ArchiveError, GatewayError};

use super::content_disposition;
use super::zip::{CompressionMethod, ZipEncoder};

/// Read buffer size per archive step.
pub const ARCHIVE_READ_CHUNK: usize = 64 * 1024;

struct ActiveEntry {
    lease: FileLease,
    reader: ContentReader,
}

struct ArchiveState {
    encoder: ZipEncoder,
    pending: VecDeque<FileLease>,
    current: Option<ActiveEntry>,
    buffer: Vec<u8>,
    finished: bool,
}

impl ArchiveState {
    /// Produce the next non-empty chunk of the archive, or `None` when done.
    async fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        loop {
            if let Some(active) = self.current.as_mut() {
                let n = active.reader.read(&mut self.buffer).await?;
                if n > 0 {
                    let out = self.encoder.write(&self.buffer[..n]).map_err(io_error)?;
                    if out.is_empty() {
                        continue;
                    }
                    return Ok(Some(out));
                }

                let out = self.encoder.finish_entry().map_err(io_error)?;
                if let Some(done) = self.current.take() {
                    debug!(path = done.lease.file().path(), "Archive entry complete");
                }
                return Ok(Some(out));
            }

            if let Some(lease) = self.pending.pop_front() {
                let file = Arc::clone(lease.file());
                let reader = file.open(None).await?;
                let header = self
                    .encoder
                    .start_entry(file.path(), file.length())
                    .map_err(io_error)?;
                self.current = Some(ActiveEntry { lease, reader });
                return Ok(Some(header));
            }

            if !self.finished {
                self.finished = true;
                debug!(
                    entries = self.encoder.entry_count(),
                    bytes = self.encoder.bytes_written(),
                    "Archive finalized"
                );
                return self.encoder.finish().map(Some).map_err(io_error);
            }

            return Ok(None);
        }
    }
}

fn io_error(err: ArchiveError) -> io::Error {
    io::Error::other(err)
}

/// Build the byte stream of a ZIP archive over `files`.
///
/// Leases are taken immediately; dropping the stream releases them all.
pub fn archive_stream(
    files: Vec<Arc<dyn ContentFile>>,
    method: CompressionMethod,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let state = ArchiveState {
        encoder: ZipEncoder::new(method),
        pending: files.into_iter().map(FileLease::acquire).collect(),
        current: None,
        buffer: vec![0; ARCHIVE_READ_CHUNK],
        finished: false,
    };

    stream::try_unfold(state, |mut state| async move {
        match state.next_chunk().await {
            Ok(chunk) => Ok(chunk.map(|chunk| (chunk, state))),
            Err(e) => {
                warn!(error = %e, "Archive stream aborted");
                Err(e)
            }
        }
    })
}

/// Respond with a ZIP archive of `files` named `archive_name`.
///
/// `HEAD` requests get the headers only and lease nothing.
pub fn archive_response(
    files: Vec<Arc<dyn ContentFile>>,
    archive_name: &str,
    method: &Method,
    compression: CompressionMethod,
) -> Result<Response, GatewayError> {
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_DISPOSITION, content_disposition(archive_name));

    if method == Method::HEAD {
        return Ok(builder.body(Body::empty())?);
    }

    debug!(
        archive = archive_name,
        files = files.len(),
        "Streaming archive"
    );

    Ok(builder.body(Body::from_stream(archive_stream(files, compression)))?)
}
