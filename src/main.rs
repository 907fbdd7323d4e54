//! Stream gateway binary.
//!
//! This binary starts the HTTP server or signs URLs offline.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stream_gateway::{
    config::{Cli, Command, ServeConfig, SignConfig, SignEndpoint, SignOutputFormat},
    content::DirectorySource,
    server::{create_router, StreamParams, StreamTokenCodec, DEFAULT_TOKEN_MAX_AGE},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Sign(config) => run_sign(config),
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    // Initialize logging
    init_logging(config.verbose);

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match tokio::fs::metadata(&config.content_root).await {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            error!(
                "Content root {} is not a directory",
                config.content_root.display()
            );
            return ExitCode::FAILURE;
        }
        Err(e) => {
            error!(
                "Cannot read content root {}: {}",
                config.content_root.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    info!("Stream gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Content root: {}", config.content_root.display());
    info!("  ZIP compression: {:?}", config.zip_compression);

    if config.signing_secret().is_some() {
        info!(
            "  Stream tokens: required (max age {}s)",
            config.token_max_age
        );
    } else {
        warn!("  Stream tokens: DISABLED - stream parameters are accepted in the clear");
        warn!("        Enable for production: --stream-secret=<secret>");
    }
    if config.api_key.is_some() {
        info!("  API key: required on playlist and redirect routes");
    }
    if let Some(url) = &config.public_url {
        info!("  Public URL: {}", url);
    }

    let source = DirectorySource::new(config.content_root.clone());
    let router = create_router(source, config.router_config());

    // Bind and serve
    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/status", addr);
    if config.signing_secret().is_none() {
        info!("    curl -O http://{}/stream/<item>?fileIndex=0", addr);
        info!("    curl http://{}/playlist/<item>", addr);
    } else {
        info!("");
        info!("  Mint a stream URL:");
        info!(
            "    stream-gateway sign --secret <secret> --torrent <item> --base-url http://{}",
            addr
        );
    }
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "stream_gateway=debug,tower_http=debug"
    } else {
        "stream_gateway=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Sign Command
// =============================================================================

fn run_sign(config: SignConfig) -> ExitCode {
    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let mut params = StreamParams::new(config.torrent.as_str());
    params.file = config.file.clone();
    params.file_type = config.file_type.clone();
    params.file_index = config.file_index;
    params.output = config.output.clone();

    let codec = StreamTokenCodec::new(&config.secret, DEFAULT_TOKEN_MAX_AGE);
    let token = match codec.encode(&params) {
        Ok(token) => token,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let path = match config.endpoint {
        SignEndpoint::Stream => format!("/stream/{}", token),
        SignEndpoint::Playlist => format!("/playlist/{}", token),
    };
    let url = config
        .base_url
        .as_deref()
        .map(|base| format!("{}{}", base.trim_end_matches('/'), path));

    // Output based on format
    match config.format {
        SignOutputFormat::Token => {
            println!("{}", token);
        }
        SignOutputFormat::Json => {
            let json = serde_json::json!({
                "token": token,
                "path": path,
                "url": url,
                "params": params,
            });
            match serde_json::to_string_pretty(&json) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        SignOutputFormat::Url => match url {
            Some(url) => println!("{}", url),
            None => {
                println!("{}", path);
                eprintln!();
                eprintln!("Tip: Use --base-url to generate a complete URL");
            }
        },
    }

    ExitCode::SUCCESS
}
