//! Streaming layer: file selection, range planning, and response bodies.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       select_files()                         │
//! └───────┬──────────────────────┬───────────────────────┬───────┘
//!         ▼                      ▼                       ▼
//! ┌───────────────┐   ┌─────────────────────┐   ┌─────────────────┐
//! │  RangePlan    │   │  archive_response   │   │    Playlist     │
//! │  + single     │   │  (ZipEncoder,       │   │  (#EXTM3U with  │
//! │  file stream  │   │   lazy file opens)  │   │  stream URLs)   │
//! └───────────────┘   └─────────────────────┘   └─────────────────┘
//! ```

mod archive;
mod playlist;
mod range;
mod selector;
mod single;
pub mod zip;

pub use archive::{archive_response, archive_stream, ARCHIVE_READ_CHUNK};
pub use playlist::{is_media, Playlist, PLAYLIST_HEADER};
pub use range::RangePlan;
pub use selector::{select_files, SelectionParams};
pub use single::{single_file_response, LeasedStream, STREAM_CHUNK_SIZE};
pub use zip::{CompressionMethod, ZipEncoder};

/// Build an `attachment` Content-Disposition value.
///
/// Names that are not plain printable ASCII get an ASCII fallback plus an
/// RFC 5987 `filename*` parameter carrying the UTF-8 name.
pub fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect();

    if fallback == file_name {
        format!("attachment; filename=\"{}\"", fallback)
    } else {
        format!(
            "attachment; filename=\"{}\"; filename*=UTF-8''{}",
            fallback,
            urlencoding::encode(file_name)
        )
    }
}
