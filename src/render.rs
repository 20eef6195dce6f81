//! Result panel contents, independent of where they end up being shown.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use serde_json::Value;
use std::fmt;

use crate::errors::AppError;
use crate::security::escape_html;
use crate::uploader::results::{FileUploadResult, RunReport, UploadReceipt};

const SIZE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
const NOT_AVAILABLE: &str = "N/A";

pub const TROUBLESHOOTING_HINTS: [&str; 4] = [
    "Check if the API URL is correct",
    "Verify the API is running and accessible",
    "Check browser console for detailed errors",
    "Ensure file size is within limits",
];

/// Human-readable size using base-1024 units, rounded to two decimals.
///
/// Trailing zeros are dropped, so 1024 bytes is `"1 KB"` and 1536 is `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && unit < SIZE_UNITS.len() - 1 {
        scaled /= 1024;
        unit += 1;
    }

    let value = bytes as f64 / 1024f64.powi(unit as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, SIZE_UNITS[unit])
}

/// Local wall-clock rendering of an `uploadTime` value.
///
/// Accepts RFC 3339 strings, ISO datetimes without an offset (read as local
/// time), plain dates, and epoch milliseconds. Anything else renders as
/// `"Invalid Date"`.
pub fn format_upload_time(value: &Value) -> String {
    parse_upload_time(value)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Invalid Date".to_string())
}

fn parse_upload_time(value: &Value) -> Option<DateTime<Local>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            Local.timestamp_millis_opt(millis).single()
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(t) = DateTime::parse_from_rfc3339(s) {
                return Some(t.with_timezone(&Local));
            }
            let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
                .ok()
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })?;
            Local.from_local_datetime(&naive).earliest()
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailValue {
    Text(String),
    Link { href: String, text: String },
    Bullets(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultRow {
    Item { label: String, value: DetailValue },
    Heading(String),
    /// One line per file in a multi-file report.
    FileStatus {
        success: bool,
        name: String,
        link: Option<String>,
    },
}

impl ResultRow {
    fn item(label: &str, value: DetailValue) -> Self {
        Self::Item {
            label: label.to_string(),
            value,
        }
    }

    fn text(label: &str, value: impl Into<String>) -> Self {
        Self::item(label, DetailValue::Text(value.into()))
    }
}

/// Title, message and detail rows of the result panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub kind: ResultKind,
    pub title: String,
    pub message: String,
    pub rows: Vec<ResultRow>,
}

impl ResultView {
    pub fn from_report(report: &RunReport) -> Self {
        match report {
            RunReport::Succeeded { results, .. } => Self::success(results),
            RunReport::Failed {
                endpoint, error, ..
            } => Self::failure(error, endpoint),
        }
    }

    /// Success panel. One result gets the detail table, several get the tally.
    pub fn success(results: &[FileUploadResult]) -> Self {
        let (message, rows) = match results {
            [single] if single.is_success() => {
                let receipt = single.receipt();
                let message = receipt
                    .and_then(UploadReceipt::message)
                    .unwrap_or("File uploaded successfully!")
                    .to_string();
                (message, single_file_rows(receipt))
            }
            _ => {
                let successful = results.iter().filter(|r| r.is_success()).count();
                let message = if successful == results.len() {
                    format!("Successfully uploaded {} files!", results.len())
                } else {
                    format!("Uploaded {} of {} files.", successful, results.len())
                };
                (message, multiple_file_rows(results))
            }
        };

        Self {
            kind: ResultKind::Success,
            title: "Upload Successful!".to_string(),
            message,
            rows,
        }
    }

    pub fn failure(error: &AppError, endpoint: &str) -> Self {
        let message = error.to_string();
        let message = if message.is_empty() {
            "An error occurred during upload.".to_string()
        } else {
            message
        };

        let rows = vec![
            ResultRow::text(
                "Error Details:",
                error.details().unwrap_or_else(|| message.clone()),
            ),
            ResultRow::text("API URL:", endpoint),
            ResultRow::item(
                "Troubleshooting:",
                DetailValue::Bullets(
                    TROUBLESHOOTING_HINTS.iter().map(|h| h.to_string()).collect(),
                ),
            ),
        ];

        Self {
            kind: ResultKind::Error,
            title: "Upload Failed".to_string(),
            message,
            rows,
        }
    }

    /// Markup for the result section, in the layout the web client uses.
    pub fn to_html(&self) -> String {
        let (class, icon) = match self.kind {
            ResultKind::Success => ("success", "fa-check-circle"),
            ResultKind::Error => ("error", "fa-exclamation-circle"),
        };

        let mut html = format!(
            "<div class=\"result-section {}\">\n<h3 class=\"result-title\"><i class=\"fas {}\"></i> {}</h3>\n<p class=\"result-message\">{}</p>\n<div class=\"result-details\">\n",
            class,
            icon,
            escape_html(&self.title),
            escape_html(&self.message)
        );

        for row in &self.rows {
            html.push_str(&row_html(row));
            html.push('\n');
        }

        html.push_str("</div>\n</div>\n");
        html
    }
}

fn single_file_rows(receipt: Option<&UploadReceipt>) -> Vec<ResultRow> {
    let text_or_na = |value: Option<String>| {
        DetailValue::Text(value.unwrap_or_else(|| NOT_AVAILABLE.to_string()))
    };

    let file_url = match receipt.and_then(UploadReceipt::file_url) {
        Some(url) => DetailValue::Link {
            href: url.to_string(),
            text: url.to_string(),
        },
        None => DetailValue::Text(NOT_AVAILABLE.to_string()),
    };

    vec![
        ResultRow::item(
            "File Name:",
            text_or_na(receipt.and_then(UploadReceipt::file_name).map(str::to_string)),
        ),
        ResultRow::item(
            "Original Name:",
            text_or_na(receipt.and_then(UploadReceipt::original_file_name).map(str::to_string)),
        ),
        ResultRow::item(
            "File Size:",
            text_or_na(receipt.and_then(UploadReceipt::file_size).map(format_file_size)),
        ),
        ResultRow::item(
            "Upload Time:",
            text_or_na(receipt.and_then(UploadReceipt::upload_time).map(format_upload_time)),
        ),
        ResultRow::item("File URL:", file_url),
    ]
}

fn multiple_file_rows(results: &[FileUploadResult]) -> Vec<ResultRow> {
    let successful = results.iter().filter(|r| r.is_success()).count();
    let failed = results.len() - successful;

    let mut rows = vec![
        ResultRow::text("Total Files:", results.len().to_string()),
        ResultRow::text("Successful:", successful.to_string()),
    ];
    if failed > 0 {
        rows.push(ResultRow::text("Failed:", failed.to_string()));
    }

    rows.push(ResultRow::Heading("File Details:".to_string()));

    for result in results {
        let receipt = result.receipt();
        rows.push(ResultRow::FileStatus {
            success: result.is_success(),
            name: receipt
                .and_then(UploadReceipt::file_name)
                .unwrap_or(result.file.as_str())
                .to_string(),
            link: receipt.and_then(UploadReceipt::file_url).map(str::to_string),
        });
    }

    rows
}

fn value_html(value: &DetailValue) -> String {
    match value {
        DetailValue::Text(text) => escape_html(text).replace('\n', "<br>"),
        DetailValue::Link { href, text } => format!(
            "<a href=\"{}\" target=\"_blank\" class=\"file-url\">{}</a>",
            escape_html(href),
            escape_html(text)
        ),
        DetailValue::Bullets(items) => items
            .iter()
            .map(|item| format!("• {}", escape_html(item)))
            .collect::<Vec<_>>()
            .join("<br>"),
    }
}

fn row_html(row: &ResultRow) -> String {
    match row {
        ResultRow::Item { label, value } => format!(
            "<div class=\"result-item\"><span class=\"result-label\">{}</span><span class=\"result-value\">{}</span></div>",
            escape_html(label),
            value_html(value)
        ),
        ResultRow::Heading(text) => format!(
            "<div class=\"result-heading\">{}</div>",
            escape_html(text)
        ),
        ResultRow::FileStatus {
            success,
            name,
            link,
        } => {
            let link_html = match link {
                Some(href) => value_html(&DetailValue::Link {
                    href: href.clone(),
                    text: "View".to_string(),
                }),
                None => String::new(),
            };
            format!(
                "<div class=\"result-item nested\"><span class=\"result-label\">{} {}</span><span class=\"result-value\">{}</span></div>",
                status_mark(*success),
                escape_html(name),
                link_html
            )
        }
    }
}

fn status_mark(success: bool) -> &'static str {
    if success {
        "✅"
    } else {
        "❌"
    }
}

/// Plain-text rendering for terminals.
impl fmt::Display for ResultView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}", status_mark(self.kind == ResultKind::Success), self.title)?;
        writeln!(f, "{}", self.message)?;

        for row in &self.rows {
            match row {
                ResultRow::Item { label, value } => match value {
                    DetailValue::Text(text) => {
                        let mut lines = text.lines();
                        writeln!(f, "   {:<16}{}", label, lines.next().unwrap_or(""))?;
                        for line in lines {
                            writeln!(f, "   {:<16}{}", "", line)?;
                        }
                    }
                    DetailValue::Link { href, .. } => writeln!(f, "   {:<16}{}", label, href)?,
                    DetailValue::Bullets(items) => {
                        writeln!(f, "   {}", label)?;
                        for item in items {
                            writeln!(f, "     • {}", item)?;
                        }
                    }
                },
                ResultRow::Heading(text) => writeln!(f, "   {}", text)?,
                ResultRow::FileStatus {
                    success,
                    name,
                    link,
                } => match link {
                    Some(href) => writeln!(f, "     {} {} ({})", status_mark(*success), name, href)?,
                    None => writeln!(f, "     {} {}", status_mark(*success), name)?,
                },
            }
        }
        Ok(())
    }
}
