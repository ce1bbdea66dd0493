//! Error types for the arxiv-insights library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`AnalyzerError`]: **Fatal**: the run halts at the stage that failed
//!   (bad identifier, download refused, unparseable PDF, model call failed).
//!   Returned as `Err(AnalyzerError)` from the top-level `analyze*` functions.
//!   No partial [`crate::output::AnalysisRecord`] is ever produced.
//!
//! * [`PageError`]: **Non-fatal**: a single page's text could not be
//!   extracted but the document itself parsed. Stored inside
//!   [`crate::pipeline::extract::ExtractedText`] so callers can see how
//!   complete the extraction was.

use crate::progress::Stage;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the arxiv-insights library.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    // ── Normalizer ────────────────────────────────────────────────────────
    /// The input is neither a bare arXiv identifier nor an arXiv abs/pdf URL.
    #[error(
        "Invalid arXiv identifier '{input}'\n\
Expected e.g. 2301.00001, 2301.00001v2 or https://arxiv.org/abs/2301.00001"
    )]
    InvalidIdentifier { input: String },

    // ── Fetcher ───────────────────────────────────────────────────────────
    /// Download returned a non-success status, timed out, or the transport failed.
    #[error("Failed to download '{url}': {reason}\nCheck the identifier and your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// A local upload path does not exist.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the upload.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    // ── Extractor ─────────────────────────────────────────────────────────
    /// The bytes are not a parseable PDF (corrupt, encrypted, or not a PDF at all).
    #[error("Could not extract text from '{source_label}': {reason}")]
    ExtractionFailed {
        source_label: String,
        reason: String,
    },

    // ── Requester ─────────────────────────────────────────────────────────
    /// No credential was configured; checked before any network call.
    #[error("No Anthropic API key configured.\nSet ANTHROPIC_API_KEY or pass --api-key.")]
    MissingApiKey,

    /// The inference service returned an error, an empty response, or the call failed.
    #[error("Analysis request failed: {reason}")]
    AnalysisFailed { reason: String },

    // ── Presenter ─────────────────────────────────────────────────────────
    /// Serialising or writing the exported record failed.
    #[error("Failed to export analysis to '{path}': {reason}")]
    ExportFailed { path: PathBuf, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalyzerError {
    /// The pipeline stage this error halted, if it belongs to one.
    ///
    /// Credential, configuration and internal errors are not tied to a stage.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            AnalyzerError::InvalidIdentifier { .. } => Some(Stage::Normalize),
            AnalyzerError::DownloadFailed { .. }
            | AnalyzerError::FileNotFound { .. }
            | AnalyzerError::PermissionDenied { .. } => Some(Stage::Fetch),
            AnalyzerError::ExtractionFailed { .. } => Some(Stage::Extract),
            AnalyzerError::AnalysisFailed { .. } => Some(Stage::Analyze),
            AnalyzerError::ExportFailed { .. } => Some(Stage::Export),
            AnalyzerError::MissingApiKey
            | AnalyzerError::InvalidConfig(_)
            | AnalyzerError::Internal(_) => None,
        }
    }
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page's content stream could not be decoded into text.
    #[error("Page {page}: text extraction failed: {detail}")]
    ExtractFailed { page: u32, detail: String },
}
