//! Directory source integration tests.
//!
//! A temporary directory is served through the full router.

use axum::http::StatusCode;
use std::io::{Cursor, Read};
use std::path::Path;

use stream_gateway::{create_router, DirectorySource, RouterConfig};

use super::test_utils::{body_bytes, get, header, payload, send};

fn write(root: &Path, relative: &str, data: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, data).unwrap();
}

fn library() -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Show/episode1.mkv", &payload(2048));
    write(dir.path(), "Show/episode1.srt", b"1\n00:00:01,000 --> 00:00:02,000\nHi\n");
    write(dir.path(), "Show/Bonus/trailer.mp4", &payload(512));
    write(dir.path(), "song.mp3", &payload(64));
    write(dir.path(), "secret.txt", b"top secret");

    let router = create_router(
        DirectorySource::new(dir.path()),
        RouterConfig::new().with_tracing(false),
    );
    (dir, router)
}

#[tokio::test]
async fn test_range_from_disk() {
    let (_dir, router) = library();

    let mut request = get("/stream/Show?file=episode1.mkv");
    request
        .headers_mut()
        .insert("range", "bytes=1000-1099".parse().unwrap());
    let response = send(&router, request).await;

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(header(&response, "content-type"), "video/x-matroska");
    assert_eq!(header(&response, "content-range"), "bytes 1000-1099/2048");
    assert_eq!(body_bytes(response).await.as_ref(), &payload(2048)[1000..1100]);
}

#[tokio::test]
async fn test_single_file_item() {
    let (_dir, router) = library();

    let response = send(&router, get("/stream/song.mp3")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "audio/mpeg");
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"song.mp3\""
    );
    assert_eq!(body_bytes(response).await.as_ref(), payload(64).as_slice());
}

#[tokio::test]
async fn test_nested_identifier() {
    let (_dir, router) = library();

    let response = send(&router, get("/stream/Show%2FBonus")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "video/mp4");
    assert_eq!(body_bytes(response).await.len(), 512);
}

#[tokio::test]
async fn test_directory_archive() {
    let (_dir, router) = library();

    let response = send(&router, get("/stream/Show?output=zip")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "content-disposition"),
        "attachment; filename=\"Show.zip\""
    );

    let bytes = body_bytes(response).await;
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_ref())).unwrap();
    let names: Vec<_> = archive.file_names().map(str::to_string).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
    assert_eq!(
        sorted,
        vec!["Show/Bonus/trailer.mp4", "Show/episode1.mkv", "Show/episode1.srt"]
    );

    let mut data = Vec::new();
    archive
        .by_name("Show/episode1.mkv")
        .unwrap()
        .read_to_end(&mut data)
        .unwrap();
    assert_eq!(data, payload(2048));
}

#[tokio::test]
async fn test_directory_playlist() {
    let (_dir, router) = library();

    let response = send(&router, get("/playlist/Show")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(text.starts_with("#EXTM3U\n"));
    assert!(text.contains("#EXTINF:-1,trailer.mp4"));
    assert!(text.contains("#EXTINF:-1,episode1.mkv"));
    assert!(!text.contains("episode1.srt"));
}

#[tokio::test]
async fn test_escape_attempts_are_not_found() {
    let (dir, router) = library();
    let inner = dir.path().join("Show");
    let router_in_show = create_router(
        DirectorySource::new(inner),
        RouterConfig::new().with_tracing(false),
    );

    let response = send(&router_in_show, get("/stream/..%2Fsecret.txt")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&router, get("/stream/missing")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlinks_stay_inside_root() {
    use std::os::unix::fs::symlink;

    let outside = tempfile::tempdir().unwrap();
    write(outside.path(), "private/secret.txt", b"top secret");

    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "Show/episode1.mkv", &payload(128));
    write(dir.path(), "Show/Bonus/trailer.mp4", &payload(32));
    symlink(outside.path().join("private"), dir.path().join("Show/leak")).unwrap();
    symlink(dir.path().join("Show"), dir.path().join("Show/Bonus/loop")).unwrap();
    symlink(outside.path().join("private"), dir.path().join("escape")).unwrap();
    symlink(dir.path().join("Show/Bonus"), dir.path().join("extras")).unwrap();

    let router = create_router(
        DirectorySource::new(dir.path()),
        RouterConfig::new().with_tracing(false),
    );

    // Links inside the walk are skipped; the cycle does not fail the item
    let response = send(&router, get("/stream/Show?output=zip")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = body_bytes(response).await;
    let archive = zip::ZipArchive::new(Cursor::new(bytes.as_ref())).unwrap();
    let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
    names.sort();
    assert_eq!(names, vec!["Show/Bonus/trailer.mp4", "Show/episode1.mkv"]);

    let response = send(&router, get("/playlist/Show")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(body_bytes(response).await.to_vec()).unwrap();
    assert!(!text.contains("secret"));

    // Identifiers whose target leaves the root are unknown
    let response = send(&router, get("/stream/escape")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&router, get("/stream/Show%2Fleak%2Fsecret.txt")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // A link that stays inside the root still resolves
    let response = send(&router, get("/stream/extras")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.len(), 32);
}
