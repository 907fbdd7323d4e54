//! HTTP server layer for the stream gateway.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     /stream/{torrent}   /playlist/{torrent}   /status           │
//! │                                                                 │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌─────────────────┐  │
//! │  │ handlers │  │  params  │  │  token   │  │  routes + auth  │  │
//! │  │(dispatch)│  │ (bundle) │  │  (HMAC)  │  │ (router config) │  │
//! │  └──────────┘  └──────────┘  └──────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod handlers;
pub mod params;
pub mod routes;
pub mod token;

pub use auth::{api_key_middleware, ApiKeyAuth, AuthError};
pub use handlers::{
    fallback_handler, playlist_handler, playlist_redirect_handler, status_handler,
    stream_handler, stream_redirect_handler, AppState, ErrorResponse, StatusResponse,
};
pub use params::{GatewayQuery, StreamIntent, StreamParams};
pub use routes::{create_router, RouterConfig, DEFAULT_TOKEN_MAX_AGE};
pub use token::{Clock, FixedClock, StreamTokenCodec, SystemClock};
