//! Signed-token and API-key integration tests.
//!
//! Tests verify:
//! - Token-gated streams accept valid tokens and nothing else
//! - Expired and tampered tokens are rejected with 403
//! - Raw parameters next to a token are rejected with 400
//! - Bearer authorization on playlist and redirect routes

use axum::http::StatusCode;
use std::time::Duration;

use stream_gateway::{create_router, RouterConfig, StreamParams, StreamTokenCodec};

use super::test_utils::{
    body_bytes, body_json, get, header, movie_files, send, MockResolver,
};

const SECRET: &str = "integration-secret";

fn codec() -> StreamTokenCodec {
    StreamTokenCodec::new(SECRET, Duration::from_secs(3600))
}

fn signed_router() -> axum::Router {
    let resolver = MockResolver::new().with_item("movie", "Movie", &movie_files());
    create_router(
        resolver,
        RouterConfig::new()
            .with_stream_secret(SECRET)
            .with_token_max_age(Duration::from_secs(3600))
            .with_tracing(false),
    )
}

#[tokio::test]
async fn test_valid_token_streams() {
    let router = signed_router();
    let token = codec()
        .encode(&StreamParams::new("movie").with_file_index(1))
        .unwrap();

    let response = send(&router, get(&format!("/stream/{}", token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "application/x-subrip");
    assert_eq!(body_bytes(response).await.len(), 50);
}

#[tokio::test]
async fn test_token_can_request_archive() {
    let router = signed_router();
    let token = codec()
        .encode(&StreamParams::new("movie").with_output("zip"))
        .unwrap();

    let response = send(&router, get(&format!("/stream/{}", token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "application/zip");
}

#[tokio::test]
async fn test_plain_identifier_is_forbidden() {
    let router = signed_router();

    let response = send(&router, get("/stream/movie")).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"], "invalid_token");
}

#[tokio::test]
async fn test_raw_params_next_to_token_are_rejected() {
    let router = signed_router();
    let token = codec().encode(&StreamParams::new("movie")).unwrap();

    for query in ["file=movie.mp4", "fileType=video", "fileIndex=0", "output=zip"] {
        let response = send(&router, get(&format!("/stream/{}?{}", token, query))).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "query {}", query);
    }

    // Empty values count as absent
    let response = send(&router, get(&format!("/stream/{}?file=", token))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_expired_token_is_forbidden() {
    let router = signed_router();
    let token = codec().encode_at(&StreamParams::new("movie"), 0).unwrap();

    let response = send(&router, get(&format!("/stream/{}", token))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert!(json["message"].as_str().unwrap().contains("expired"));
}

#[tokio::test]
async fn test_token_from_other_secret_is_forbidden() {
    let router = signed_router();
    let token = StreamTokenCodec::new("other-secret", Duration::from_secs(3600))
        .encode(&StreamParams::new("movie"))
        .unwrap();

    let response = send(&router, get(&format!("/stream/{}", token))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_tampered_token_is_forbidden() {
    let router = signed_router();
    let token = codec().encode(&StreamParams::new("movie")).unwrap();

    let mut tampered = token.into_bytes();
    let last = tampered.len() - 1;
    tampered[last] = if tampered[last] == b'0' { b'1' } else { b'0' };
    let tampered = String::from_utf8(tampered).unwrap();

    let response = send(&router, get(&format!("/stream/{}", tampered))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// API Key
// =============================================================================

fn api_key_router() -> axum::Router {
    let resolver = MockResolver::new().with_item("movie", "Movie", &movie_files());
    create_router(
        resolver,
        RouterConfig::new().with_api_key("api-key").with_tracing(false),
    )
}

#[tokio::test]
async fn test_playlist_requires_bearer() {
    let router = api_key_router();
    // Signing falls back to the API key
    let token = StreamTokenCodec::new("api-key", Duration::from_secs(60))
        .encode(&StreamParams::new("movie"))
        .unwrap();
    let uri = format!("/playlist/{}", token);

    let response = send(&router, get(&uri)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(header(&response, "www-authenticate"), "Bearer");
    assert_eq!(body_json(response).await["error"], "missing_credentials");

    let mut request = get(&uri);
    request
        .headers_mut()
        .insert("authorization", "Bearer wrong".parse().unwrap());
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "invalid_credentials");

    let mut request = get(&uri);
    request
        .headers_mut()
        .insert("authorization", "bearer api-key".parse().unwrap());
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signed_stream_needs_no_bearer() {
    let router = api_key_router();
    let token = StreamTokenCodec::new("api-key", Duration::from_secs(60))
        .encode(&StreamParams::new("movie").with_file("movie.mp4"))
        .unwrap();

    let response = send(&router, get(&format!("/stream/{}", token))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_redirect_requires_bearer() {
    let router = api_key_router();

    let response = send(&router, get("/stream?torrent=movie")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let mut request = get("/stream?torrent=movie");
    request
        .headers_mut()
        .insert("authorization", "Bearer api-key".parse().unwrap());
    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
}

#[tokio::test]
async fn test_status_is_public() {
    let router = api_key_router();
    let response = send(&router, get("/status")).await;
    assert_eq!(response.status(), StatusCode::OK);
}
