use std::sync::Arc;

use crate::content::ContentFile;
use crate::error::SelectionError;

/// Filter criteria over an item's files. All supplied filters apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionParams {
    /// Exact position in the item's file list
    pub file_index: Option<usize>,

    /// Substring of the file name or path (case-sensitive)
    pub file_name: Option<String>,

    /// Substring of the MIME type (case-sensitive)
    pub file_type: Option<String>,
}

impl SelectionParams {
    /// True when no filter is set, i.e. every file is selected.
    pub fn is_empty(&self) -> bool {
        self.file_index.is_none() && self.file_name.is_none() && self.file_type.is_none()
    }

    fn matches(&self, file: &dyn ContentFile) -> bool {
        let name_ok = self
            .file_name
            .as_deref()
            .map_or(true, |q| file.name().contains(q) || file.path().contains(q));
        let type_ok = self
            .file_type
            .as_deref()
            .map_or(true, |q| file.mime_type().contains(q));
        name_ok && type_ok
    }
}

/// Select the files to serve, preserving the item's order.
///
/// An index picks exactly that entry (out of bounds is an error); name and
/// type filters then narrow the result. An empty result is returned as-is.
pub fn select_files(
    files: &[Arc<dyn ContentFile>],
    params: &SelectionParams,
) -> Result<Vec<Arc<dyn ContentFile>>, SelectionError> {
    let candidates: &[Arc<dyn ContentFile>] = match params.file_index {
        Some(index) => {
            let file = files.get(index).ok_or(SelectionError::IndexOutOfBounds {
                index,
                count: files.len(),
            })?;
            std::slice::from_ref(file)
        }
        None => files,
    };

    Ok(candidates
        .iter()
        .filter(|file| params.matches(file.as_ref()))
        .cloned()
        .collect())
}
