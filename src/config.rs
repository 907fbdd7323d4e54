//! Configuration management for the stream gateway.
//!
//! This module provides the command-line interface:
//! - `serve` runs the HTTP gateway
//! - `sign` mints a signed stream or playlist URL offline
//!
//! Every `serve` option can also be set through an environment variable
//! with the `GATEWAY_` prefix.
//!
//! # Environment Variables
//!
//! - `GATEWAY_HOST` - Server bind address (default: 0.0.0.0)
//! - `GATEWAY_PORT` - Server port (default: 3000)
//! - `GATEWAY_CONTENT_ROOT` - Directory served as content items (required)
//! - `GATEWAY_STREAM_SECRET` - HMAC secret for stream tokens
//! - `GATEWAY_API_KEY` - Bearer key for playlist and redirect routes
//! - `GATEWAY_TOKEN_MAX_AGE` - Token lifetime in seconds (default: 21600)
//! - `GATEWAY_PUBLIC_URL` - Base URL written into playlists
//! - `GATEWAY_ZIP_COMPRESSION` - `stored` or `deflate` (default: stored)
//! - `GATEWAY_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::server::RouterConfig;
use crate::stream::CompressionMethod;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default token max age in seconds (6 hours).
pub const DEFAULT_TOKEN_MAX_AGE_SECS: u64 = 21600;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Stream gateway - range-seekable downloads, live ZIP archives, and
/// playlists over resolved content items.
#[derive(Parser, Debug, Clone)]
#[command(name = "stream-gateway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP gateway.
    Serve(ServeConfig),

    /// Print a signed stream or playlist URL.
    Sign(SignConfig),
}

// =============================================================================
// Serve
// =============================================================================

/// Options for `serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "GATEWAY_PORT")]
    pub port: u16,

    /// Directory whose entries are served as content items.
    #[arg(long, env = "GATEWAY_CONTENT_ROOT")]
    pub content_root: PathBuf,

    // =========================================================================
    // Security Configuration
    // =========================================================================
    /// Secret for HMAC-SHA256 stream tokens.
    ///
    /// Falls back to the API key. When neither is set, stream parameters
    /// are accepted in the clear.
    #[arg(long, env = "GATEWAY_STREAM_SECRET")]
    pub stream_secret: Option<String>,

    /// Bearer key required on playlist and redirect routes.
    #[arg(long, env = "GATEWAY_API_KEY")]
    pub api_key: Option<String>,

    /// Stream token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_TOKEN_MAX_AGE_SECS, env = "GATEWAY_TOKEN_MAX_AGE")]
    pub token_max_age: u64,

    // =========================================================================
    // Output Configuration
    // =========================================================================
    /// Base URL written into playlist entries (default: from request Host).
    #[arg(long, env = "GATEWAY_PUBLIC_URL")]
    pub public_url: Option<String>,

    /// Compression applied to ZIP archive entries.
    #[arg(long, value_enum, default_value_t = CompressionMethod::Stored, env = "GATEWAY_ZIP_COMPRESSION")]
    pub zip_compression: CompressionMethod,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "GATEWAY_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.content_root.as_os_str().is_empty() {
            return Err(
                "Content root is required. Set --content-root or GATEWAY_CONTENT_ROOT".to_string(),
            );
        }

        if self.token_max_age == 0 {
            return Err("token_max_age must be greater than 0".to_string());
        }

        if matches!(self.stream_secret.as_deref(), Some("")) {
            return Err("stream_secret must not be empty when set".to_string());
        }

        if matches!(self.api_key.as_deref(), Some("")) {
            return Err("api_key must not be empty when set".to_string());
        }

        if let Some(url) = &self.public_url {
            let parsed = url::Url::parse(url)
                .map_err(|e| format!("Invalid public_url '{}': {}", url, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!("public_url must be http or https, got '{}'", url));
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Secret used for stream tokens: the stream secret, else the API key.
    pub fn signing_secret(&self) -> Option<&str> {
        self.stream_secret.as_deref().or(self.api_key.as_deref())
    }

    /// Build the router configuration.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new()
            .with_token_max_age(Duration::from_secs(self.token_max_age))
            .with_compression(self.zip_compression)
            .with_tracing(!self.no_tracing);

        if let Some(secret) = &self.stream_secret {
            router_config = router_config.with_stream_secret(secret.clone());
        }
        if let Some(key) = &self.api_key {
            router_config = router_config.with_api_key(key.clone());
        }
        if let Some(url) = &self.public_url {
            router_config = router_config.with_public_url(url.clone());
        }
        if let Some(origins) = &self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config
    }
}

// =============================================================================
// Sign
// =============================================================================

/// Endpoint a signed URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SignEndpoint {
    #[default]
    Stream,
    Playlist,
}

/// Output format of `sign`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SignOutputFormat {
    /// Full URL (or path without --base-url)
    #[default]
    Url,

    /// Token only
    Token,

    /// JSON object with token, path, and URL
    Json,
}

/// Options for `sign`.
#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Signing secret (the server's stream secret or API key).
    #[arg(long, env = "GATEWAY_STREAM_SECRET")]
    pub secret: String,

    /// Content item identifier.
    #[arg(long)]
    pub torrent: String,

    /// Substring of the file name or path.
    #[arg(long)]
    pub file: Option<String>,

    /// Substring of the MIME type.
    #[arg(long)]
    pub file_type: Option<String>,

    /// Position in the item's file list.
    #[arg(long)]
    pub file_index: Option<usize>,

    /// Output mode (`zip` for an archive).
    #[arg(long)]
    pub output: Option<String>,

    /// Endpoint to sign for.
    #[arg(long, value_enum, default_value_t = SignEndpoint::Stream)]
    pub endpoint: SignEndpoint,

    /// Base URL prefixed to the signed path.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = SignOutputFormat::Url)]
    pub format: SignOutputFormat,
}

impl SignConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.is_empty() {
            return Err("Secret is required. Set --secret or GATEWAY_STREAM_SECRET".to_string());
        }
        if self.torrent.is_empty() {
            return Err("Item identifier is required. Set --torrent".to_string());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
