//! Report and guideline upload

use std::path::Path;

use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::PerryClient;
use crate::error::{ApiError, detail_or_body};
use crate::workflow::SessionId;

const PDF_MIME: &str = "application/pdf";

/// A document to upload: original filename plus contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPart {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl DocumentPart {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Read a document from disk; a missing or empty file is a [`ApiError::MissingFile`]
    pub fn from_path(path: &Path) -> Result<Self, ApiError> {
        debug!(path = %path.display(), "DocumentPart::from_path: called");
        if !path.is_file() {
            return Err(ApiError::MissingFile(path.to_path_buf()));
        }

        let bytes = std::fs::read(path)?;
        if bytes.is_empty() {
            return Err(ApiError::MissingFile(path.to_path_buf()));
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { filename, bytes })
    }

    /// Filename sent in the multipart part, falling back to `default` when blank
    pub fn part_filename<'a>(&'a self, default: &'a str) -> &'a str {
        if self.filename.trim().is_empty() {
            default
        } else {
            &self.filename
        }
    }

    fn to_part(&self, default_name: &str) -> Result<Part, ApiError> {
        Ok(Part::bytes(self.bytes.clone())
            .file_name(self.part_filename(default_name).to_string())
            .mime_str(PDF_MIME)?)
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub session_id: SessionId,
    pub message: String,
    pub files_uploaded: Vec<String>,
}

impl UploadResult {
    /// Best-effort decode: absent or oddly typed fields fall back to empty values
    ///
    /// A body that is not JSON gives an empty session id and the trimmed body as the message.
    pub fn from_body(body: &str) -> Self {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "UploadResult::from_body: body is not JSON, keeping it as text");
                return Self {
                    session_id: SessionId::new(""),
                    message: body.trim().to_string(),
                    files_uploaded: Vec::new(),
                };
            }
        };
        let text = |key: &str| match value.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };

        let files_uploaded = value
            .get("files_uploaded")
            .and_then(Value::as_array)
            .map(|files| {
                files
                    .iter()
                    .map(|f| f.as_str().map(str::to_string).unwrap_or_else(|| f.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            session_id: SessionId::new(text("session_id")),
            message: text("message"),
            files_uploaded,
        }
    }
}

impl PerryClient {
    /// Upload the report and optional guidelines, opening a new backend session
    pub async fn upload(&self, report: &DocumentPart, guidelines: Option<&DocumentPart>) -> Result<UploadResult, ApiError> {
        debug!(
            report = %report.filename,
            guidelines = ?guidelines.map(|g| g.filename.as_str()),
            "upload: called"
        );
        if report.bytes.is_empty() {
            return Err(ApiError::MissingFile(report.filename.clone().into()));
        }

        let url = self.url("/api/upload");
        let build = || {
            let mut form = Form::new().part("report", report.to_part("report.pdf")?);
            if let Some(guidelines) = guidelines {
                form = form.part("guidelines", guidelines.to_part("guidelines.pdf")?);
            }
            Ok(self.http().post(&url).multipart(form))
        };

        let result = self
            .execute("upload", self.config().upload_timeout(), build, |status, body| {
                if status == 200 || status == 201 {
                    Ok(UploadResult::from_body(&body))
                } else {
                    Err(ApiError::UploadFailed {
                        status,
                        detail: detail_or_body(&body),
                    })
                }
            })
            .await?;

        info!(session_id = %result.session_id, files = ?result.files_uploaded, "upload: session created");
        Ok(result)
    }
}
