use thiserror::Error;

/// Errors returned by a content-resolution backend.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No item exists for the identifier
    #[error("Item not found: {0}")]
    NotFound(String),

    /// The backend failed or could not be reached
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Errors produced while decoding a signed stream token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Token structure could not be parsed
    #[error("Malformed token: {0}")]
    Malformed(&'static str),

    /// Signature does not match the payload
    #[error("Invalid token signature")]
    InvalidSignature,

    /// Token is older than the configured max age
    #[error("Token issued at {issued_at} has expired (current time: {current_time})")]
    Expired { issued_at: u64, current_time: u64 },

    /// Bundle could not be serialized
    #[error("Failed to encode token: {0}")]
    Encoding(String),
}

/// Errors produced by the file selector.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Requested file index is past the end of the item's file list
    #[error("File index {index} out of bounds (item has {count} files)")]
    IndexOutOfBounds { index: usize, count: usize },
}

/// Errors produced by the ZIP encoder.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// `start_entry` called while another entry is still open
    #[error("An archive entry is already in progress")]
    EntryInProgress,

    /// Data written without an open entry
    #[error("No archive entry is in progress")]
    NoEntry,

    /// Entry outgrew the 32-bit size fields it was started with
    #[error("Entry {name} grew to {size} bytes without ZIP64 extensions")]
    EntryTooLarge { name: String, size: u64 },

    /// Entry name does not fit in the header
    #[error("Entry name too long: {0} bytes")]
    NameTooLong(usize),

    /// Deflate stream failure
    #[error("Compression error: {0}")]
    Compression(String),

    /// Failure writing into the output buffer
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by the gateway before any response bytes are written.
///
/// Every variant maps to a distinct HTTP status; see the `IntoResponse`
/// implementation in the server handlers.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Malformed or contradictory request parameters (400)
    #[error("{0}")]
    BadRequest(String),

    /// Missing or wrong bearer credential (401)
    #[error("{0}")]
    Unauthorized(String),

    /// Stream token failed verification (403)
    #[error("Invalid stream token: {0}")]
    Forbidden(#[from] TokenError),

    /// No matching item, file, or route (404)
    #[error("{0}")]
    NotFound(String),

    /// Resolution backend or file source failure (503)
    #[error("{0}")]
    Unavailable(String),

    /// Response could not be assembled (500)
    #[error("{0}")]
    Internal(String),
}

impl From<ResolveError> for GatewayError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NotFound(_) => GatewayError::NotFound(err.to_string()),
            ResolveError::Unavailable(_) => GatewayError::Unavailable(err.to_string()),
        }
    }
}

impl From<SelectionError> for GatewayError {
    fn from(err: SelectionError) -> Self {
        GatewayError::NotFound(err.to_string())
    }
}

impl From<http::Error> for GatewayError {
    fn from(err: http::Error) -> Self {
        GatewayError::Internal(format!("Failed to build response: {}", err))
    }
}
