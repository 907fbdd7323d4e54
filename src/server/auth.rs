//! Bearer API-key authorization for the gateway routes.
//!
//! When an API key is configured, protected routes require:
//!
//! ```text
//! Authorization: Bearer <api-key>
//! ```
//!
//! The scheme is matched case-insensitively and the key is compared in
//! constant time.
//!
//! # Example
//!
//! ```rust
//! use stream_gateway::server::auth::ApiKeyAuth;
//!
//! let auth = ApiKeyAuth::new("my-api-key");
//! assert!(auth.verify_header(Some("Bearer my-api-key")).is_ok());
//! assert!(auth.verify_header(Some("bearer my-api-key")).is_ok());
//! assert!(auth.verify_header(Some("Bearer wrong")).is_err());
//! ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use super::handlers::ErrorResponse;

// =============================================================================
// Types
// =============================================================================

/// Authorization error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable `Authorization: Bearer` header
    MissingCredentials,

    /// Bearer key does not match
    InvalidCredentials,
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingCredentials => write!(f, "Missing bearer credentials"),
            AuthError::InvalidCredentials => write!(f, "Invalid API key"),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = StatusCode::UNAUTHORIZED;
        let error_type = match &self {
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidCredentials => "invalid_credentials",
        };
        let message = self.to_string();

        // A wrong key could indicate probing, so log at warn level
        match &self {
            AuthError::InvalidCredentials => {
                warn!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authorization failed: {}",
                    message
                );
            }
            AuthError::MissingCredentials => {
                debug!(
                    error_type = error_type,
                    status = status.as_u16(),
                    "Authorization failed: {}",
                    message
                );
            }
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        let mut response = (status, Json(error_response)).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        response
    }
}

// =============================================================================
// API Key Authorization
// =============================================================================

/// Static API key checked against the request's bearer token.
#[derive(Clone)]
pub struct ApiKeyAuth {
    api_key: Vec<u8>,
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth").finish_non_exhaustive()
    }
}

impl ApiKeyAuth {
    pub fn new(api_key: impl AsRef<[u8]>) -> Self {
        Self {
            api_key: api_key.as_ref().to_vec(),
        }
    }

    /// Check a raw `Authorization` header value.
    pub fn verify_header(&self, value: Option<&str>) -> Result<(), AuthError> {
        let value = value.ok_or(AuthError::MissingCredentials)?;
        let (scheme, token) = value
            .trim()
            .split_once(' ')
            .ok_or(AuthError::MissingCredentials)?;

        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(AuthError::MissingCredentials);
        }

        // Constant-time comparison
        if bool::from(token.trim().as_bytes().ct_eq(&self.api_key)) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

// =============================================================================
// Axum Middleware
// =============================================================================

/// Axum middleware rejecting requests without the configured bearer key.
///
/// # Example
///
/// ```ignore
/// use axum::{Router, middleware};
/// use stream_gateway::server::auth::{ApiKeyAuth, api_key_middleware};
///
/// let auth = ApiKeyAuth::new("api-key");
/// let app = Router::new()
///     .route("/playlist/{torrent}", get(playlist_handler))
///     .route_layer(middleware::from_fn_with_state(auth, api_key_middleware));
/// ```
pub async fn api_key_middleware(
    State(auth): State<ApiKeyAuth>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    auth.verify_header(value)?;

    Ok(next.run(request).await)
}

// =============================================================================
// Tests
// =============================================================================
