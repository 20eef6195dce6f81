use serde::Serialize;
use serde_json::Value;

use crate::errors::AppError;

/// Parsed JSON body of a successful upload.
///
/// The endpoint may answer with any JSON; the accessors pick out the fields
/// the result panel knows about and ignore everything else.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UploadReceipt(pub Value);

impl UploadReceipt {
    pub fn new(body: Value) -> Self {
        Self(body)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    pub fn message(&self) -> Option<&str> {
        self.str_field("message")
    }

    /// Name the endpoint stored the file under.
    pub fn file_name(&self) -> Option<&str> {
        self.str_field("fileName")
    }

    pub fn original_file_name(&self) -> Option<&str> {
        self.str_field("originalFileName")
    }

    /// Size in bytes. Zero is treated as absent.
    pub fn file_size(&self) -> Option<u64> {
        let value = self.0.get("fileSize")?;
        let size = value
            .as_u64()
            .or_else(|| value.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))?;
        (size > 0).then_some(size)
    }

    pub fn upload_time(&self) -> Option<&Value> {
        self.0.get("uploadTime").filter(|v| match v {
            Value::String(s) => !s.is_empty(),
            Value::Number(_) => true,
            _ => false,
        })
    }

    pub fn file_url(&self) -> Option<&str> {
        self.str_field("fileUrl")
    }
}

#[derive(Debug)]
pub enum UploadOutcome {
    Uploaded(UploadReceipt),
    Failed(AppError),
}

/// Outcome for one file of a run, in selection order.
#[derive(Debug)]
pub struct FileUploadResult {
    pub file: String,
    pub outcome: UploadOutcome,
}

impl FileUploadResult {
    pub fn uploaded(file: &str, receipt: UploadReceipt) -> Self {
        Self {
            file: file.to_string(),
            outcome: UploadOutcome::Uploaded(receipt),
        }
    }

    pub fn failed(file: &str, error: AppError) -> Self {
        Self {
            file: file.to_string(),
            outcome: UploadOutcome::Failed(error),
        }
    }

    pub fn receipt(&self) -> Option<&UploadReceipt> {
        match &self.outcome {
            UploadOutcome::Uploaded(receipt) => Some(receipt),
            UploadOutcome::Failed(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, UploadOutcome::Uploaded(_))
    }
}

/// Everything one call to `run` produced.
#[derive(Debug)]
pub enum RunReport {
    Succeeded {
        endpoint: String,
        results: Vec<FileUploadResult>,
    },
    /// The run stopped at the first failing file. `completed` holds the
    /// files uploaded before it; later files were never sent.
    Failed {
        endpoint: String,
        completed: Vec<FileUploadResult>,
        error: AppError,
    },
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        matches!(self, RunReport::Succeeded { .. })
    }

    pub fn endpoint(&self) -> &str {
        match self {
            RunReport::Succeeded { endpoint, .. } | RunReport::Failed { endpoint, .. } => endpoint,
        }
    }

    /// Results recorded before the run ended.
    pub fn results(&self) -> &[FileUploadResult] {
        match self {
            RunReport::Succeeded { results, .. } => results,
            RunReport::Failed { completed, .. } => completed,
        }
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            RunReport::Succeeded { .. } => None,
            RunReport::Failed { error, .. } => Some(error),
        }
    }
}
