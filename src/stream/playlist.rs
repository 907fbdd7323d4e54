use std::sync::Arc;

use crate::content::ContentFile;

/// Header line of every playlist.
pub const PLAYLIST_HEADER: &str = "#EXTM3U";

/// True for MIME types a media player can stream.
pub fn is_media(mime_type: &str) -> bool {
    mime_type.contains("video") || mime_type.contains("audio")
}

/// A generated M3U playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    name: String,
    body: String,
}

impl Playlist {
    /// Build a playlist over the media files in `files`.
    ///
    /// Each entry's URL is `domain` followed by whatever `stream_url` returns
    /// for that file (a signed `/stream/<token>` path or a plain one).
    pub fn generate<F, E>(
        domain: &str,
        item_name: &str,
        files: &[Arc<dyn ContentFile>],
        mut stream_url: F,
    ) -> Result<Self, E>
    where
        F: FnMut(&dyn ContentFile) -> Result<String, E>,
    {
        let mut lines = vec![PLAYLIST_HEADER.to_string()];
        for file in files.iter().filter(|f| is_media(f.mime_type())) {
            lines.push(format!("#EXTINF:-1,{}", file.name()));
            lines.push(format!("{}{}", domain, stream_url(file.as_ref())?));
        }

        Ok(Self {
            name: item_name.to_string(),
            body: lines.join("\n"),
        })
    }

    /// Download file name, `<item name>.m3u`.
    pub fn file_name(&self) -> String {
        format!("{}.m3u", self.name)
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_body(self) -> String {
        self.body
    }

    /// Number of entries in the playlist.
    pub fn entry_count(&self) -> usize {
        self.body
            .lines()
            .filter(|line| line.starts_with("#EXTINF"))
            .count()
    }
}
