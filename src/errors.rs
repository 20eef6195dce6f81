use std::error::Error as _;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Non-2xx answer from the upload endpoint. The raw body is kept verbatim.
    #[error("Upload failed for {file_name}: {status} {status_text}\n{body}")]
    HttpStatus {
        file_name: String,
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Custom result type
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::FileNotFound {
            path: path.to_string(),
        }
    }

    pub fn http_status(file_name: &str, status: u16, status_text: &str, body: String) -> Self {
        Self::HttpStatus {
            file_name: file_name.to_string(),
            status,
            status_text: status_text.to_string(),
            body,
        }
    }

    /// Network-level failures and malformed response bodies.
    pub fn is_transport(&self) -> bool {
        matches!(self, AppError::Network(_) | AppError::Json(_))
    }

    /// The message followed by every deeper cause, one per line.
    ///
    /// Wrapped errors already appear in the message itself, so the chain
    /// starts below them. Returns `None` when there is nothing to add.
    pub fn details(&self) -> Option<String> {
        let mut source = self.source()?.source();
        source?;

        let mut lines = vec![self.to_string()];
        while let Some(cause) = source {
            lines.push(format!("caused by: {}", cause));
            source = cause.source();
        }
        Some(lines.join("\n"))
    }
}
