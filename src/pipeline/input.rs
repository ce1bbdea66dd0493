//! Document acquisition: download a paper by identifier or wrap an upload.
//!
//! Both entry points produce a [`RawDocument`]: an immutable byte buffer plus
//! a tag saying where it came from. Validation of the bytes is deferred to
//! the extractor; this stage only moves bytes.
//!
//! Downloads go through the [`DocumentFetcher`] trait so the pipeline can be
//! driven without network access. [`ArxivFetcher`] is the real
//! implementation: one GET, a bounded timeout, no retry and no caching.

use crate::error::AnalyzerError;
use crate::pipeline::identifier::ArxivId;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where a [`RawDocument`]'s bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Downloaded from the paper repository.
    Fetched,
    /// Supplied directly by the user.
    Uploaded,
}

/// PDF bytes awaiting extraction.
///
/// Created once by the fetch stage, consumed once by the extractor.
#[derive(Debug, Clone)]
pub struct RawDocument {
    bytes: Vec<u8>,
    source: SourceKind,
    label: String,
}

impl RawDocument {
    /// Wrap bytes that were downloaded for `id`.
    pub fn fetched(id: &ArxivId, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            source: SourceKind::Fetched,
            label: id.as_str().to_string(),
        }
    }

    /// Wrap already-resident upload bytes. Always succeeds.
    pub fn uploaded(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            source: SourceKind::Uploaded,
            label: filename.into(),
        }
    }

    /// Read an upload from disk.
    ///
    /// The label is the file name (without directories), which is what the
    /// exported record reports as its source.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => AnalyzerError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => AnalyzerError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        debug!("Read upload {} ({} bytes)", path.display(), bytes.len());
        Ok(Self::uploaded(filename, bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Canonical identifier for fetched documents, file name for uploads.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Retrieves the PDF for an identifier.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Fetch the document, failing with [`AnalyzerError::DownloadFailed`].
    async fn fetch(&self, id: &ArxivId) -> Result<RawDocument, AnalyzerError>;
}

/// Downloads `{base_url}/{id}.pdf` over HTTPS.
pub struct ArxivFetcher {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl ArxivFetcher {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self, AnalyzerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(concat!("arxiv-insights/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AnalyzerError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            timeout_secs,
        })
    }
}

#[async_trait]
impl DocumentFetcher for ArxivFetcher {
    async fn fetch(&self, id: &ArxivId) -> Result<RawDocument, AnalyzerError> {
        let url = id.pdf_url(&self.base_url);
        info!("Downloading PDF from: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            download_failed(
                &url,
                if e.is_timeout() {
                    format!("timed out after {}s", self.timeout_secs)
                } else {
                    e.to_string()
                },
            )
        })?;

        check_download_status(&url, response.status())?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_pdf_content_type(&content_type) {
            warn!(
                "Unexpected content-type '{}' for {}; extraction will validate the bytes",
                content_type, url
            );
        }

        let bytes = response.bytes().await.map_err(|e| {
            download_failed(
                &url,
                if e.is_timeout() {
                    format!("timed out after {}s", self.timeout_secs)
                } else {
                    e.to_string()
                },
            )
        })?;

        info!("Downloaded {} bytes", bytes.len());
        Ok(RawDocument::fetched(id, bytes.to_vec()))
    }
}

fn download_failed(url: &str, reason: impl Into<String>) -> AnalyzerError {
    AnalyzerError::DownloadFailed {
        url: url.to_string(),
        reason: reason.into(),
    }
}

/// Any non-2xx status is a download failure.
pub fn check_download_status(url: &str, status: StatusCode) -> Result<(), AnalyzerError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(download_failed(url, format!("HTTP {status}")))
    }
}

fn is_pdf_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/pdf" || mime == "application/x-pdf"
}
