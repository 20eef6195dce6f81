use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{multipart, Client};
use std::path::Path;
use std::time::Duration;

use crate::errors::{AppError, AppResult};

use super::results::UploadReceipt;
use super::selection::SelectedFile;

/// Multipart field the endpoint reads the file from.
pub const FILE_FIELD: &str = "file";

/// Header the API gateway expects a subscription key in.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Sends one file to an endpoint and returns the parsed JSON answer.
///
/// Non-2xx answers must come back as [`AppError::HttpStatus`] carrying the
/// raw body text; network failures and unparseable bodies as whatever error
/// the client raised.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn upload(&self, endpoint: &str, file: &SelectedFile) -> AppResult<UploadReceipt>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// No timeout unless set; the client default applies.
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
}

impl HttpOptions {
    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.headers
            .push((SUBSCRIPTION_KEY_HEADER.to_string(), api_key.to_string()));
        self
    }
}

/// reqwest-backed transport posting `multipart/form-data`.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> AppResult<Self> {
        Self::with_options(HttpOptions::default())
    }

    pub fn with_options(options: HttpOptions) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AppError::validation("header", &e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AppError::validation("header", &e.to_string()))?;
            headers.insert(name, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn upload(&self, endpoint: &str, file: &SelectedFile) -> AppResult<UploadReceipt> {
        let form = UploadPayload::from_file(file).build_form()?;

        log::debug!("POST {} ({}, {} bytes)", endpoint, file.name, file.size());

        let response = self.client.post(endpoint).multipart(form).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(AppError::http_status(
                &file.name,
                status.as_u16(),
                status.canonical_reason().unwrap_or(""),
                error_text,
            ));
        }

        let response_text = response.text().await?;
        log::debug!(
            "Upload response for {} (first 300 chars): {}",
            file.name,
            response_text.chars().take(300).collect::<String>()
        );

        let body = serde_json::from_str(&response_text)?;
        Ok(UploadReceipt::new(body))
    }
}

/// Multipart body for a single file.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    file_name: String,
    data: Vec<u8>,
    mime_type: &'static str,
}

impl UploadPayload {
    pub fn from_file(file: &SelectedFile) -> Self {
        Self {
            file_name: file.name.clone(),
            data: file.content.clone(),
            mime_type: guess_mime_type(&file.name),
        }
    }

    pub fn mime_type(&self) -> &str {
        self.mime_type
    }

    pub fn build_form(self) -> AppResult<multipart::Form> {
        let part = multipart::Part::bytes(self.data)
            .file_name(self.file_name)
            .mime_str(self.mime_type)?;

        Ok(multipart::Form::new().part(FILE_FIELD, part))
    }
}

fn guess_mime_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("txt") | Some("log") => "text/plain",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("dcm") => "application/dicom",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("notes.TXT"), "text/plain");
        assert_eq!(guess_mime_type("labs.csv"), "text/csv");
        assert_eq!(guess_mime_type("scan.dcm"), "application/dicom");
        assert_eq!(guess_mime_type("README"), "application/octet-stream");
        assert_eq!(guess_mime_type("archive.tar.xz"), "application/octet-stream");
    }

    #[test]
    fn test_payload_builds_form() {
        let file = SelectedFile::new("report.pdf", b"%PDF-1.7".to_vec());
        let payload = UploadPayload::from_file(&file);
        assert_eq!(payload.mime_type(), "application/pdf");
        assert!(payload.build_form().is_ok());
    }

    #[test]
    fn test_api_key_header() {
        let options = HttpOptions::default().with_api_key("secret");
        assert_eq!(
            options.headers,
            vec![(SUBSCRIPTION_KEY_HEADER.to_string(), "secret".to_string())]
        );
        assert!(HttpTransport::with_options(options).is_ok());
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let options = HttpOptions {
            timeout: None,
            headers: vec![("bad header".to_string(), "x".to_string())],
        };
        assert!(matches!(
            HttpTransport::with_options(options),
            Err(AppError::Validation { .. })
        ));
    }
}
