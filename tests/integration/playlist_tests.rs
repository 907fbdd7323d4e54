//! Playlist integration tests.

use axum::http::StatusCode;
use std::sync::Arc;
use std::time::Duration;

use stream_gateway::{create_router, RouterConfig, StreamParams, StreamTokenCodec};

use super::test_utils::{
    body_bytes, get, header, movie_files, payload, send, MockFile, MockResolver,
};

async fn playlist_text(router: &axum::Router, request: axum::http::Request<axum::body::Body>) -> String {
    let response = send(router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    String::from_utf8(body_bytes(response).await.to_vec()).unwrap()
}

#[tokio::test]
async fn test_playlist_lists_only_media() {
    let files = vec![
        Arc::new(MockFile::new("Clip/a.mp4", "video/mp4", payload(10))),
        Arc::new(MockFile::new("Clip/b.txt", "text/plain", payload(10))),
    ];
    let resolver = MockResolver::new().with_item("clip", "Clip", &files);
    let router = create_router(resolver, RouterConfig::new().with_tracing(false));

    let mut request = get("/playlist/clip");
    request
        .headers_mut()
        .insert("host", "media.local:3000".parse().unwrap());

    let response = send(&router, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "text/plain; charset=utf-8");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"Clip.m3u\""
    );

    let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert_eq!(
        text,
        "#EXTM3U\n#EXTINF:-1,a.mp4\nhttp://media.local:3000/stream/clip?file=Clip%2Fa.mp4"
    );

    // Generating a playlist never touches the files
    for file in &files {
        assert_eq!(file.open_count(), 0);
        assert_eq!(file.release_count(), 0);
    }
}

#[tokio::test]
async fn test_playlist_respects_filters() {
    let files = movie_files();
    let resolver = MockResolver::new().with_item("movie", "Movie", &files);
    let router = create_router(resolver, RouterConfig::new().with_tracing(false));

    let text = playlist_text(&router, get("/playlist/movie?fileType=audio")).await;
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "#EXTINF:-1,commentary.mp3");
}

#[tokio::test]
async fn test_playlist_uses_forwarded_proto_and_public_url() {
    let files = movie_files();
    let resolver = MockResolver::new().with_item("movie", "Movie", &files);
    let router = create_router(resolver, RouterConfig::new().with_tracing(false));

    let mut request = get("/playlist/movie?file=movie.mp4");
    request.headers_mut().insert("host", "gw.example.com".parse().unwrap());
    request
        .headers_mut()
        .insert("x-forwarded-proto", "https".parse().unwrap());
    let text = playlist_text(&router, request).await;
    assert!(text.contains("\nhttps://gw.example.com/stream/movie?file=Movie%2Fmovie.mp4"));

    let resolver = MockResolver::new().with_item("movie", "Movie", &files);
    let router = create_router(
        resolver,
        RouterConfig::new()
            .with_public_url("https://cdn.example.com/")
            .with_tracing(false),
    );
    let text = playlist_text(&router, get("/playlist/movie?file=movie.mp4")).await;
    assert!(text.contains("\nhttps://cdn.example.com/stream/movie?file=Movie%2Fmovie.mp4"));
}

#[tokio::test]
async fn test_signed_playlist_entries_are_playable() {
    let files = movie_files();
    let resolver = MockResolver::new().with_item("movie", "Movie", &files);
    let router = create_router(
        resolver,
        RouterConfig::new()
            .with_stream_secret("playlist-secret")
            .with_public_url("http://gw")
            .with_tracing(false),
    );

    let codec = StreamTokenCodec::new("playlist-secret", Duration::from_secs(3600));
    let token = codec.encode(&StreamParams::new("movie")).unwrap();

    let text = playlist_text(&router, get(&format!("/playlist/{}", token))).await;
    let urls: Vec<_> = text.lines().filter(|l| l.starts_with("http://gw/")).collect();
    assert_eq!(urls.len(), 2);

    // Each entry carries its own token for exactly one file
    let sub_token = urls[0].strip_prefix("http://gw/stream/").unwrap();
    let params: StreamParams = codec.decode(sub_token).unwrap();
    assert_eq!(params, StreamParams::new("movie").with_file("Movie/movie.mp4"));

    let response = send(&router, get(&format!("/stream/{}", sub_token))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "video/mp4");
    assert_eq!(body_bytes(response).await.len(), 1000);
}

#[tokio::test]
async fn test_playlist_unknown_item() {
    let router = create_router(MockResolver::new(), RouterConfig::new().with_tracing(false));
    let response = send(&router, get("/playlist/nothing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
