use std::sync::Arc;

use tracing::trace;

use super::ContentFile;

/// Ownership of the obligation to release a file.
///
/// Acquiring a lease does not open the file. Dropping the lease calls
/// [`ContentFile::release`], so the release happens exactly once whether the
/// transfer finished, failed, or was abandoned by the client.
pub struct FileLease {
    file: Arc<dyn ContentFile>,
}

impl FileLease {
    pub fn acquire(file: Arc<dyn ContentFile>) -> Self {
        trace!(path = file.path(), "Leased file");
        Self { file }
    }

    pub fn file(&self) -> &Arc<dyn ContentFile> {
        &self.file
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        trace!(path = self.file.path(), "Releasing file");
        self.file.release();
    }
}
