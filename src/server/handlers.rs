//! HTTP request handlers for the stream gateway.
//!
//! # Endpoints
//!
//! - `GET|HEAD /stream/{torrent}` - Single file (range-seekable) or live ZIP
//! - `GET /stream?torrent=…` - 301 to `/stream/{torrent}`
//! - `GET /playlist/{torrent}` - M3U playlist of the selected media files
//! - `GET /playlist?torrent=…` - 301 to `/playlist/{torrent}`
//! - `GET /status` - Liveness check
//!
//! # Request Lifecycle
//!
//! ```text
//! ResolveParams ──► ResolveItem ──► SelectFiles ──┬──► Single   ──┐
//!  (token or         (resolver)      (filters)    ├──► Archive  ──┼──► Closed
//!   plain query)                                  └──► Playlist ──┘
//! ```

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Path, Query, RawQuery, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};
use url::form_urlencoded;

use crate::content::{ContentFile, ContentResolver};
use crate::error::GatewayError;
use crate::stream::{
    archive_response, content_disposition, select_files, single_file_response, CompressionMethod,
    Playlist, RangePlan,
};

use super::params::{GatewayQuery, StreamIntent, StreamParams};
use super::token::StreamTokenCodec;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<R: ContentResolver> {
    /// Content-resolution backend
    pub resolver: Arc<R>,

    /// Token codec; `None` leaves the endpoints open with plain parameters
    pub codec: Option<StreamTokenCodec>,

    /// Base URL used in playlist entries instead of the request's Host
    pub public_url: Option<String>,

    /// Compression applied to archive entries
    pub compression: CompressionMethod,
}

impl<R: ContentResolver> AppState<R> {
    /// Create open (unsigned) state over a resolver.
    pub fn new(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
            codec: None,
            public_url: None,
            compression: CompressionMethod::default(),
        }
    }

    /// Require signed tokens on the stream and playlist endpoints.
    pub fn with_codec(mut self, codec: StreamTokenCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn with_public_url(mut self, public_url: impl Into<String>) -> Self {
        self.public_url = Some(public_url.into());
        self
    }

    pub fn with_compression(mut self, compression: CompressionMethod) -> Self {
        self.compression = compression;
        self
    }
}

impl<R: ContentResolver> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            codec: self.codec.clone(),
            public_url: self.public_url.clone(),
            compression: self.compression,
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_token")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Status check response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert GatewayError to HTTP response.
///
/// - 5xx errors are logged at ERROR level
/// - 404s are logged at DEBUG level
/// - other 4xx errors are logged at WARN level
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            GatewayError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            GatewayError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            GatewayError::Forbidden(_) => (StatusCode::FORBIDDEN, "invalid_token"),
            GatewayError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            GatewayError::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            GatewayError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let message = self.to_string();

        // Log errors based on severity
        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);

        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Parameter Resolution
// =============================================================================

/// Turn the path segment and query string into a parameter bundle.
///
/// With a codec configured the path segment is a signed token and no other
/// parameter may appear next to it.
pub fn resolve_params(
    codec: Option<&StreamTokenCodec>,
    torrent: String,
    query: Result<Query<GatewayQuery>, QueryRejection>,
) -> Result<StreamParams, GatewayError> {
    let Query(query) = query.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    let query = query.normalized();

    match codec {
        Some(codec) => {
            if query.has_any() {
                return Err(GatewayError::BadRequest(
                    "All parameters must be encoded in the stream token".to_string(),
                ));
            }
            Ok(codec.decode::<StreamParams>(&torrent)?)
        }
        None => query.into_params(torrent),
    }
}

/// Origin prefixed to playlist entries.
///
/// Uses the configured public URL, else `<X-Forwarded-Proto or http>://<Host>`.
pub fn request_origin(public_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = public_url {
        return url.trim_end_matches('/').to_string();
    }

    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("localhost");

    format!("{}://{}", proto, host)
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle stream requests.
///
/// # Endpoint
///
/// `GET|HEAD /stream/{torrent}`
///
/// # Query Parameters (plain mode only)
///
/// - `file`: Substring of the file name or path
/// - `fileType`: Substring of the MIME type
/// - `fileIndex`: Position in the item's file list
/// - `output`: `zip` for an archive of every selected file
///
/// # Response
///
/// - `200 OK` / `206 Partial Content`: the selected file
/// - `200 OK`: `application/zip` archive when `output=zip`
/// - `400 Bad Request`: Malformed parameters, or parameters next to a token
/// - `403 Forbidden`: Token failed verification
/// - `404 Not Found`: Unknown item or no matching file
/// - `503 Service Unavailable`: Resolution backend failure
pub async fn stream_handler<R: ContentResolver>(
    State(state): State<AppState<R>>,
    method: Method,
    headers: HeaderMap,
    Path(torrent): Path<String>,
    query: Result<Query<GatewayQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let params = resolve_params(state.codec.as_ref(), torrent, query)?;
    let intent = params.intent();
    serve(&state, params, intent, &method, &headers).await
}

/// Handle playlist requests.
///
/// # Endpoint
///
/// `GET /playlist/{torrent}`
///
/// # Response
///
/// `200 OK` with an M3U body listing one stream URL per audio or video file.
pub async fn playlist_handler<R: ContentResolver>(
    State(state): State<AppState<R>>,
    method: Method,
    headers: HeaderMap,
    Path(torrent): Path<String>,
    query: Result<Query<GatewayQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let params = resolve_params(state.codec.as_ref(), torrent, query)?;
    serve(&state, params, StreamIntent::Playlist, &method, &headers).await
}

/// Resolve the item, select its files, and dispatch on the intent.
async fn serve<R: ContentResolver>(
    state: &AppState<R>,
    params: StreamParams,
    intent: StreamIntent,
    method: &Method,
    headers: &HeaderMap,
) -> Result<Response, GatewayError> {
    let item = state.resolver.resolve(&params.torrent).await?;
    let files = select_files(&item.files, &params.selection())?;

    debug!(
        item = %item.name,
        selected = files.len(),
        total = item.files.len(),
        intent = ?intent,
        "Resolved request"
    );

    let download_name = match files.as_slice() {
        [only] => only.name().to_string(),
        _ => item.name.clone(),
    };

    match intent {
        StreamIntent::Single => {
            let file = files.into_iter().next().ok_or_else(|| {
                GatewayError::NotFound(format!("No matching file in {}", item.name))
            })?;
            let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
            let plan = RangePlan::plan(file.length(), range_header);
            single_file_response(file, &download_name, plan, method).await
        }
        StreamIntent::Archive => archive_response(
            files,
            &format!("{}.zip", download_name),
            method,
            state.compression,
        ),
        StreamIntent::Playlist => {
            let domain = request_origin(state.public_url.as_deref(), headers);
            let codec = state.codec.as_ref();
            let playlist = Playlist::generate(&domain, &item.name, &files, |file: &dyn ContentFile| {
                StreamParams::new(params.torrent.as_str())
                    .with_file(file.path())
                    .stream_path(codec)
            })
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

            debug!(item = %item.name, entries = playlist.entry_count(), "Generated playlist");

            Ok(Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .header(
                    header::CONTENT_DISPOSITION,
                    content_disposition(&playlist.file_name()),
                )
                .body(Body::from(playlist.into_body()))?)
        }
    }
}

/// Handle `GET /stream?torrent=…` by redirecting to `/stream/{torrent}`.
pub async fn stream_redirect_handler(
    RawQuery(query): RawQuery,
) -> Result<Response, GatewayError> {
    canonical_redirect("/stream", query.as_deref())
}

/// Handle `GET /playlist?torrent=…` by redirecting to `/playlist/{torrent}`.
pub async fn playlist_redirect_handler(
    RawQuery(query): RawQuery,
) -> Result<Response, GatewayError> {
    canonical_redirect("/playlist", query.as_deref())
}

/// 301 to `<endpoint>/<torrent>`, keeping the rest of the query string.
fn canonical_redirect(endpoint: &str, query: Option<&str>) -> Result<Response, GatewayError> {
    let mut torrent = None;
    let mut rest = form_urlencoded::Serializer::new(String::new());

    for (key, value) in form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        if key == "torrent" && torrent.is_none() {
            torrent = Some(value.into_owned());
        } else {
            rest.append_pair(&key, &value);
        }
    }

    let torrent = torrent
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::BadRequest("Missing torrent parameter".to_string()))?;

    let mut location = format!("{}/{}", endpoint, urlencoding::encode(&torrent));
    let rest = rest.finish();
    if !rest.is_empty() {
        location.push('?');
        location.push_str(&rest);
    }

    Ok(Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, location)
        .body(Body::empty())?)
}

/// Handle status check requests.
///
/// # Endpoint
///
/// `GET /status`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "ok",
///   "version": "0.1.0"
/// }
/// ```
pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// JSON 404 for unmapped routes.
pub async fn fallback_handler(uri: Uri) -> GatewayError {
    GatewayError::NotFound(format!("No route for {}", uri.path()))
}

// =============================================================================
// Tests
// =============================================================================
