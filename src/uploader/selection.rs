use std::path::Path;

use crate::errors::AppResult;
use crate::render::format_file_size;
use crate::security::InputValidator;

/// One file chosen for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub content: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Reads a file from disk, keeping only its final path component as the name.
    pub async fn from_path(file_path: &str) -> AppResult<Self> {
        InputValidator::validate_file_path(file_path)?;

        let content = tokio::fs::read(file_path).await?;
        let name = Path::new(file_path)
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        Ok(Self { name, content })
    }

    pub fn size(&self) -> u64 {
        self.content.len() as u64
    }
}

/// Ordered files for the next run. Replaced wholesale on every selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSelection {
    files: Vec<SelectedFile>,
}

impl FileSelection {
    pub fn new(files: Vec<SelectedFile>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(SelectedFile::size).sum()
    }

    /// What the selected-file panel shows, `None` when nothing is selected.
    pub fn summary(&self) -> Option<SelectionSummary> {
        match self.files.as_slice() {
            [] => None,
            [file] => Some(SelectionSummary {
                title: file.name.clone(),
                size: format_file_size(file.size()),
            }),
            files => Some(SelectionSummary {
                title: format!("{} files selected", files.len()),
                size: format!("Total size: {}", format_file_size(self.total_size())),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    pub title: String,
    pub size: String,
}

/// Enabled state and label of the upload trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerState {
    pub enabled: bool,
    pub label: String,
}

impl TriggerState {
    /// Missing configuration is reported through the label only, never as an error.
    pub fn evaluate(file_count: usize, endpoint: &str, busy: bool) -> Self {
        let has_files = file_count > 0;
        let has_endpoint = !endpoint.is_empty();

        let label = if !has_endpoint {
            "Enter API URL first".to_string()
        } else if !has_files {
            "Select a file to upload".to_string()
        } else if file_count == 1 {
            "Upload File".to_string()
        } else {
            format!("Upload {} Files", file_count)
        };

        Self {
            enabled: has_files && has_endpoint && !busy,
            label,
        }
    }
}
