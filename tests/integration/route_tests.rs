//! Routing integration tests: redirects, status, and unmapped routes.

use axum::http::StatusCode;

use stream_gateway::{create_router, RouterConfig};

use super::test_utils::{body_bytes, body_json, get, header, movie_files, send, MockResolver};

fn router() -> axum::Router {
    let resolver = MockResolver::new()
        .with_item("movie", "Movie", &movie_files())
        .with_item("magnet:?xt=urn:btih:abc", "Movie", &movie_files());
    create_router(resolver, RouterConfig::new().with_tracing(false))
}

#[tokio::test]
async fn test_stream_redirect() {
    let response = send(&router(), get("/stream?torrent=X&file=Y")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(header(&response, "location"), "/stream/X?file=Y");
}

#[tokio::test]
async fn test_playlist_redirect_keeps_query() {
    let response = send(&router(), get("/playlist?fileType=video&torrent=movie")).await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(header(&response, "location"), "/playlist/movie?fileType=video");
}

#[tokio::test]
async fn test_redirect_encodes_identifier_and_resolves() {
    let router = router();
    let response = send(
        &router,
        get("/stream?torrent=magnet%3A%3Fxt%3Durn%3Abtih%3Aabc&fileIndex=2"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    let location = header(&response, "location").to_string();
    assert_eq!(
        location,
        "/stream/magnet%3A%3Fxt%3Durn%3Abtih%3Aabc?fileIndex=2"
    );

    // Following the redirect reaches the item
    let response = send(&router, get(&location)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "audio/mpeg");
    assert_eq!(body_bytes(response).await.len(), 300);
}

#[tokio::test]
async fn test_redirect_without_torrent() {
    let response = send(&router(), get("/stream?file=Y")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&router(), get("/playlist")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_status() {
    let response = send(&router(), get("/status")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_unmapped_route_is_json_404() {
    let response = send(&router(), get("/api/torrents")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_cors_headers() {
    let mut request = get("/status");
    request
        .headers_mut()
        .insert("origin", "https://player.example.com".parse().unwrap());

    let response = send(&router(), request).await;
    assert_eq!(header(&response, "access-control-allow-origin"), "*");
}
