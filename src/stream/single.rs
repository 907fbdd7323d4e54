use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures::Stream;
use http::{header, Method, StatusCode};
use tokio::io::AsyncReadExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::content::{ContentFile, ContentReader, FileLease};
use crate::error::GatewayError;

use super::content_disposition;
use super::range::RangePlan;

/// Read buffer size for single-file transfers.
pub const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// A body stream that owns the lease of the file it reads.
///
/// The lease is released as soon as the stream ends or fails, and otherwise
/// when the stream is dropped (client disconnect).
pub struct LeasedStream {
    inner: ReaderStream<ContentReader>,
    lease: Option<FileLease>,
    sent: u64,
}

impl LeasedStream {
    pub fn new(reader: ContentReader, lease: FileLease) -> Self {
        Self {
            inner: ReaderStream::with_capacity(reader, STREAM_CHUNK_SIZE),
            lease: Some(lease),
            sent: 0,
        }
    }
}

impl Stream for LeasedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        match &polled {
            Poll::Ready(Some(Ok(chunk))) => {
                self.sent += chunk.len() as u64;
            }
            Poll::Ready(Some(Err(e))) => {
                if let Some(lease) = self.lease.take() {
                    warn!(
                        path = lease.file().path(),
                        sent = self.sent,
                        error = %e,
                        "Stream error after headers were sent"
                    );
                }
            }
            Poll::Ready(None) => {
                if let Some(lease) = self.lease.take() {
                    debug!(path = lease.file().path(), sent = self.sent, "Stream complete");
                }
            }
            Poll::Pending => {}
        }
        polled
    }
}

/// Respond with one file, honoring the range plan.
///
/// `HEAD` requests receive the same headers as `GET` and never open the file.
pub async fn single_file_response(
    file: Arc<dyn ContentFile>,
    download_name: &str,
    plan: RangePlan,
    method: &Method,
) -> Result<Response, GatewayError> {
    let length = file.length();
    let range = plan.served_range();

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, file.mime_type())
        .header(header::CONTENT_DISPOSITION, content_disposition(download_name))
        .header(header::ACCEPT_RANGES, "bytes");

    let body_length = match range {
        Some(range) => {
            builder = builder.status(StatusCode::PARTIAL_CONTENT).header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", range.start, range.end, length),
            );
            range.len()
        }
        None => {
            if plan == RangePlan::Unsatisfiable {
                debug!(path = file.path(), "Unsatisfiable range, serving full body");
            }
            builder = builder.status(StatusCode::OK);
            length
        }
    };
    builder = builder.header(header::CONTENT_LENGTH, body_length);

    if method == Method::HEAD {
        return Ok(builder.body(Body::empty())?);
    }

    let lease = FileLease::acquire(Arc::clone(&file));
    let reader = file.open(range).await.map_err(|e| {
        GatewayError::Unavailable(format!("Failed to open {}: {}", file.path(), e))
    })?;
    let reader: ContentReader = Box::new(reader.take(body_length));

    debug!(
        path = file.path(),
        bytes = body_length,
        partial = range.is_some(),
        "Streaming file"
    );

    Ok(builder.body(Body::from_stream(LeasedStream::new(reader, lease)))?)
}
