//! # Stream Gateway
//!
//! An HTTP gateway that serves the files of resolved content items as
//! range-seekable downloads, live ZIP archives, and M3U playlists.
//!
//! ## Features
//!
//! - **Range requests**: Single-range `206 Partial Content` responses for seeking
//! - **Live archives**: ZIP streamed entry by entry, never buffered whole
//! - **Playlists**: M3U over the audio and video files of an item
//! - **Signed tokens**: Optional stateless HMAC-SHA256 tokens carrying every parameter
//! - **Guaranteed cleanup**: Every file handed out is released exactly once
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`content`] - Resolver and file contracts, leases, and the directory source
//! - [`stream`] - File selection, range planning, ZIP encoding, and response bodies
//! - [`server`] - Axum handlers, token codec, and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use stream_gateway::{create_router, DirectorySource, RouterConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = RouterConfig::new().with_stream_secret("my-secret-key");
//!     let router = create_router(DirectorySource::new("/srv/media"), config);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod config;
pub mod content;
pub mod error;
pub mod server;
pub mod stream;

// Re-export commonly used types
pub use config::{Cli, Command, ServeConfig, SignConfig, SignEndpoint, SignOutputFormat};
pub use content::{
    ByteRange, ContentFile, ContentReader, ContentResolver, DirectorySource, FileLease,
    ResolvedItem,
};
pub use error::{ArchiveError, GatewayError, ResolveError, SelectionError, TokenError};
pub use server::{
    create_router, AppState, ErrorResponse, RouterConfig, StreamIntent, StreamParams,
    StreamTokenCodec,
};
pub use stream::{
    select_files, CompressionMethod, Playlist, RangePlan, SelectionParams, ZipEncoder,
};
