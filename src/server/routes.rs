//! Router configuration for the stream gateway.
//!
//! This module defines the HTTP routes and applies middleware for
//! authorization, CORS, and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /status                 - Liveness check (public)
//! /stream/{torrent}       - File or ZIP stream (token-gated when signing is on)
//! /stream?torrent=…       - Redirect (bearer-gated when an API key is set)
//! /playlist/{torrent}     - M3U playlist (bearer-gated when an API key is set)
//! /playlist?torrent=…     - Redirect (bearer-gated when an API key is set)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stream_gateway::content::DirectorySource;
//! use stream_gateway::server::routes::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new()
//!     .with_stream_secret("my-secret-key")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//!
//! let router = create_router(DirectorySource::new("/srv/media"), config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{middleware, routing::get, Router};
use http::header::{AUTHORIZATION, CONTENT_TYPE, RANGE};
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{api_key_middleware, ApiKeyAuth};
use super::handlers::{
    fallback_handler, playlist_handler, playlist_redirect_handler, status_handler,
    stream_handler, stream_redirect_handler, AppState,
};
use super::token::StreamTokenCodec;
use crate::content::ContentResolver;
use crate::stream::CompressionMethod;

/// Default maximum token age: 6 hours.
pub const DEFAULT_TOKEN_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    /// Secret for signing stream tokens (falls back to `api_key`)
    pub stream_secret: Option<String>,

    /// Maximum accepted token age
    pub token_max_age: Duration,

    /// Bearer key required on playlist and redirect routes
    pub api_key: Option<String>,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Base URL used in playlist entries
    pub public_url: Option<String>,

    /// Compression applied to archive entries
    pub compression: CompressionMethod,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RouterConfig {
    /// Create an open configuration.
    ///
    /// By default:
    /// - No token signing and no API key
    /// - Tokens expire after 6 hours once signing is enabled
    /// - CORS allows any origin
    /// - Archive entries are stored uncompressed
    /// - Tracing is enabled
    pub fn new() -> Self {
        Self {
            stream_secret: None,
            token_max_age: DEFAULT_TOKEN_MAX_AGE,
            api_key: None,
            cors_origins: None,
            public_url: None,
            compression: CompressionMethod::Stored,
            enable_tracing: true,
        }
    }

    /// Require signed stream tokens.
    pub fn with_stream_secret(mut self, secret: impl Into<String>) -> Self {
        self.stream_secret = Some(secret.into());
        self
    }

    pub fn with_token_max_age(mut self, max_age: Duration) -> Self {
        self.token_max_age = max_age;
        self
    }

    /// Require `Authorization: Bearer <key>` on playlist and redirect routes.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    /// Pass None (or don't call this method) to allow any origin.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Allow any CORS origin.
    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
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

    /// Enable or disable request tracing.
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    /// Secret used for stream tokens, if signing is active.
    pub fn signing_secret(&self) -> Option<&str> {
        self.stream_secret
            .as_deref()
            .or(self.api_key.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Token codec for this configuration, if signing is active.
    pub fn codec(&self) -> Option<StreamTokenCodec> {
        self.signing_secret()
            .map(|secret| StreamTokenCodec::new(secret, self.token_max_age))
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// This function builds the complete Axum router with:
/// - Public routes (status, and the token-gated stream route)
/// - Playlist and redirect routes (bearer-gated when an API key is set)
/// - A JSON 404 fallback
/// - CORS configuration
/// - Request tracing (optional)
pub fn create_router<R>(resolver: R, config: RouterConfig) -> Router
where
    R: ContentResolver + 'static,
{
    let mut app_state = AppState::new(resolver).with_compression(config.compression);
    if let Some(codec) = config.codec() {
        app_state = app_state.with_codec(codec);
    }
    if let Some(url) = &config.public_url {
        app_state = app_state.with_public_url(url.clone());
    }

    let cors = build_cors_layer(&config);

    // GET routes also answer HEAD
    let stream_routes = Router::new()
        .route("/stream/{torrent}", get(stream_handler::<R>))
        .with_state(app_state.clone());

    let gated_routes = Router::new()
        .route("/stream", get(stream_redirect_handler))
        .route("/playlist", get(playlist_redirect_handler))
        .route("/playlist/{torrent}", get(playlist_handler::<R>))
        .with_state(app_state);

    let gated_routes = match config.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => gated_routes.route_layer(middleware::from_fn_with_state(
            ApiKeyAuth::new(key),
            api_key_middleware,
        )),
        None => gated_routes,
    };

    let router = Router::new()
        .route("/status", get(status_handler))
        .merge(stream_routes)
        .merge(gated_routes)
        .fallback(fallback_handler)
        .layer(cors);

    // Add tracing if enabled
    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, RANGE])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
