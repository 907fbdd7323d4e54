//! Request parameters for the stream and playlist endpoints.
//!
//! The same bundle travels either in the clear (path + query string) or
//! inside a signed token. Wire names are shared by both forms:
//! `torrent`, `file`, `fileType`, `fileIndex`, `output`.

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, TokenError};
use crate::stream::SelectionParams;

use super::token::StreamTokenCodec;

/// `output` value selecting a ZIP archive.
pub const OUTPUT_ZIP: &str = "zip";

// =============================================================================
// Stream Parameters
// =============================================================================

/// Everything needed to serve a stream request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamParams {
    /// Content item identifier handed to the resolver
    pub torrent: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_index: Option<usize>,

    /// `zip` requests an archive of every selected file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl StreamParams {
    pub fn new(torrent: impl Into<String>) -> Self {
        Self {
            torrent: torrent.into(),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_file_type(mut self, file_type: impl Into<String>) -> Self {
        self.file_type = Some(file_type.into());
        self
    }

    pub fn with_file_index(mut self, index: usize) -> Self {
        self.file_index = Some(index);
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// File filters carried by these parameters.
    pub fn selection(&self) -> SelectionParams {
        SelectionParams {
            file_index: self.file_index,
            file_name: self.file.clone(),
            file_type: self.file_type.clone(),
        }
    }

    /// Response shape requested on the stream endpoint.
    pub fn intent(&self) -> StreamIntent {
        match self.output.as_deref() {
            Some(OUTPUT_ZIP) => StreamIntent::Archive,
            _ => StreamIntent::Single,
        }
    }

    /// Path (and query) of the stream endpoint serving these parameters.
    ///
    /// With a codec the whole bundle is sealed into `/stream/<token>`;
    /// otherwise it is spelled out in the clear.
    pub fn stream_path(&self, codec: Option<&StreamTokenCodec>) -> Result<String, TokenError> {
        match codec {
            Some(codec) => Ok(format!("/stream/{}", codec.encode(self)?)),
            None => Ok(self.plain_path("/stream")),
        }
    }

    fn plain_path(&self, endpoint: &str) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(file) = &self.file {
            query.append_pair("file", file);
        }
        if let Some(file_type) = &self.file_type {
            query.append_pair("fileType", file_type);
        }
        if let Some(index) = self.file_index {
            query.append_pair("fileIndex", &index.to_string());
        }
        if let Some(output) = &self.output {
            query.append_pair("output", output);
        }
        let query = query.finish();

        let path = format!("{}/{}", endpoint, urlencoding::encode(&self.torrent));
        if query.is_empty() {
            path
        } else {
            format!("{}?{}", path, query)
        }
    }
}

/// Response shape chosen once per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamIntent {
    /// One file, range-seekable
    Single,

    /// Live ZIP of every selected file
    Archive,

    /// M3U playlist of the selected media files
    Playlist,
}

// =============================================================================
// Query String
// =============================================================================

/// Raw query string of the stream and playlist endpoints.
///
/// `fileIndex` stays textual so a non-numeric value is reported as a bad
/// request rather than a generic extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayQuery {
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub file_type: Option<String>,

    #[serde(default)]
    pub file_index: Option<String>,

    #[serde(default)]
    pub output: Option<String>,
}

impl GatewayQuery {
    /// Treat empty values (`?file=`) as absent.
    pub fn normalized(self) -> Self {
        fn non_empty(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        Self {
            file: non_empty(self.file),
            file_type: non_empty(self.file_type),
            file_index: non_empty(self.file_index),
            output: non_empty(self.output),
        }
    }

    /// True if any parameter besides the identifier is present.
    pub fn has_any(&self) -> bool {
        self.file.is_some()
            || self.file_type.is_some()
            || self.file_index.is_some()
            || self.output.is_some()
    }

    /// Combine with the path identifier into a parameter bundle.
    pub fn into_params(self, torrent: String) -> Result<StreamParams, GatewayError> {
        let file_index = self
            .file_index
            .map(|raw| {
                raw.parse::<usize>().map_err(|_| {
                    GatewayError::BadRequest(format!("Invalid fileIndex: {}", raw))
                })
            })
            .transpose()?;

        Ok(StreamParams {
            torrent,
            file: self.file,
            file_type: self.file_type,
            file_index,
            output: self.output,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
