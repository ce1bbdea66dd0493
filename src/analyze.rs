//! Top-level entry points: run one paper through the whole pipeline.
//!
//! ```text
//! normalize ─▶ (credential check) ─▶ fetch ─▶ extract ─▶ analyze ─▶ parse
//! ```
//!
//! The run is a single linear pass. The first failing stage halts it and
//! its error is returned; no partial [`AnalysisRecord`] is ever built. The
//! credential check runs before any network call so a missing key costs
//! nothing.

use crate::config::AnalysisConfig;
use crate::error::AnalyzerError;
use crate::output::{AnalysisOutput, AnalysisRecord, AnalysisStats};
use crate::pipeline::extract::{self, ExtractedText};
use crate::pipeline::identifier;
use crate::pipeline::input::{ArxivFetcher, DocumentFetcher, RawDocument};
use crate::pipeline::llm::{self, AnthropicProvider, LlmProvider};
use crate::pipeline::sections::parse_sections;
use crate::present;
use crate::progress::{ProgressCallback, Stage};
use chrono::{SubsecRound, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// How the document reaches the pipeline.
enum Source<'a> {
    Identifier(&'a str),
    Path(&'a Path),
    Bytes { filename: String, bytes: Vec<u8> },
}

/// Analyze a paper given an arXiv identifier or abs/pdf URL.
///
/// # Errors
/// The first failing stage's [`AnalyzerError`]; see [`AnalyzerError::stage`].
pub async fn analyze(
    input: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzerError> {
    run(Source::Identifier(input.as_ref()), config).await
}

/// Analyze a PDF read from disk. The record is labelled with its file name.
pub async fn analyze_file(
    path: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzerError> {
    run(Source::Path(path.as_ref()), config).await
}

/// Analyze an uploaded PDF already in memory.
pub async fn analyze_bytes(
    filename: impl Into<String>,
    bytes: Vec<u8>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzerError> {
    run(
        Source::Bytes {
            filename: filename.into(),
            bytes,
        },
        config,
    )
    .await
}

/// Synchronous wrapper around [`analyze`].
///
/// Creates a temporary tokio runtime internally.
pub fn analyze_sync(
    input: impl AsRef<str>,
    config: &AnalysisConfig,
) -> Result<AnalysisOutput, AnalyzerError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| AnalyzerError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(analyze(input, config))
}

/// Analyze a paper and write the JSON export into `export_dir`.
///
/// Returns the output together with the path of the written file.
pub async fn analyze_to_file(
    input: impl AsRef<str>,
    export_dir: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<(AnalysisOutput, PathBuf), AnalyzerError> {
    let output = analyze(input, config).await?;
    let path = export_record(&output.record, export_dir, config)?;
    Ok((output, path))
}

/// The export stage on its own, reported through the progress callback.
pub fn export_record(
    record: &AnalysisRecord,
    export_dir: impl AsRef<Path>,
    config: &AnalysisConfig,
) -> Result<PathBuf, AnalyzerError> {
    let progress = Progress(config.progress_callback.as_ref());
    progress.start(Stage::Export);
    let path = progress.check(Stage::Export, present::write_export(record, export_dir))?;
    progress.complete(Stage::Export, &path.display().to_string());
    Ok(path)
}

async fn run(source: Source<'_>, config: &AnalysisConfig) -> Result<AnalysisOutput, AnalyzerError> {
    let total_start = Instant::now();
    let progress = Progress(config.progress_callback.as_ref());

    // ── Normalize ────────────────────────────────────────────────────────
    let id = match &source {
        Source::Identifier(input) => {
            info!("Starting analysis: {}", input);
            progress.start(Stage::Normalize);
            let id = progress.check(Stage::Normalize, identifier::normalize(input))?;
            progress.complete(Stage::Normalize, &id.display_id());
            Some(id)
        }
        Source::Path(path) => {
            info!("Starting analysis of upload: {}", path.display());
            None
        }
        Source::Bytes { filename, .. } => {
            info!("Starting analysis of upload: {}", filename);
            None
        }
    };

    // ── Credential pre-flight ────────────────────────────────────────────
    let provider = resolve_provider(config)?;

    // ── Fetch ────────────────────────────────────────────────────────────
    progress.start(Stage::Fetch);
    let fetch_start = Instant::now();
    let fetched = match (source, &id) {
        (Source::Identifier(_), Some(id)) => match resolve_fetcher(config) {
            Ok(fetcher) => fetcher.fetch(id).await,
            Err(e) => Err(e),
        },
        (Source::Path(path), _) => RawDocument::from_path(path).await,
        (Source::Bytes { filename, bytes }, _) => Ok(RawDocument::uploaded(filename, bytes)),
        (Source::Identifier(input), None) => Err(AnalyzerError::Internal(format!(
            "identifier '{input}' was not normalized"
        ))),
    };
    let document = progress.check(Stage::Fetch, fetched)?;
    let fetch_duration_ms = fetch_start.elapsed().as_millis() as u64;
    progress.complete(Stage::Fetch, &format!("{} bytes", document.len()));

    let label = document.label().to_string();
    let source_kind = document.source();

    // ── Extract ──────────────────────────────────────────────────────────
    progress.start(Stage::Extract);
    let extract_start = Instant::now();
    let extracted = progress.check(
        Stage::Extract,
        extract::extract(document).await.and_then(|text| reject_blank(&label, text)),
    )?;
    let extract_duration_ms = extract_start.elapsed().as_millis() as u64;
    info!(
        "Extracted {} characters from {}/{} pages",
        extracted.char_count(),
        extracted.pages_extracted,
        extracted.pages_total
    );
    progress.complete(
        Stage::Extract,
        &format!(
            "{} characters from {}/{} pages",
            extracted.char_count(),
            extracted.pages_extracted,
            extracted.pages_total
        ),
    );

    // ── Analyze ──────────────────────────────────────────────────────────
    progress.start(Stage::Analyze);
    let analysis = progress.check(
        Stage::Analyze,
        llm::request_analysis(provider.as_ref(), &extracted.text, config).await,
    )?;
    let sections = parse_sections(&analysis.response.content);
    let sections_found = sections.found_count();
    progress.complete(
        Stage::Analyze,
        &format!("{}/7 sections", sections_found),
    );

    let record = AnalysisRecord {
        identifier_or_filename: label,
        timestamp: Utc::now().trunc_subsecs(0),
        sections,
        raw_response: analysis.response.content.clone(),
    };

    let stats = AnalysisStats {
        pages_total: extracted.pages_total,
        pages_extracted: extracted.pages_extracted,
        extracted_chars: extracted.char_count(),
        submitted_chars: analysis.submitted_chars,
        truncated: analysis.truncated,
        input_tokens: analysis.response.input_tokens,
        output_tokens: analysis.response.output_tokens,
        sections_found,
        fetch_duration_ms,
        extract_duration_ms,
        llm_duration_ms: analysis.duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Analysis complete: {} ({}/7 sections, {}ms total)",
        record.identifier_or_filename, sections_found, stats.total_duration_ms
    );

    Ok(AnalysisOutput {
        record,
        source: source_kind,
        stats,
    })
}

/// Use the injected provider, or build the Anthropic one from the config.
///
/// Fails with [`AnalyzerError::MissingApiKey`] before any network call.
fn resolve_provider(config: &AnalysisConfig) -> Result<Arc<dyn LlmProvider>, AnalyzerError> {
    if !config.has_credentials() {
        return Err(AnalyzerError::MissingApiKey);
    }
    if let Some(ref provider) = config.provider {
        debug!("Using injected provider: {}", provider.name());
        return Ok(Arc::clone(provider));
    }
    Ok(Arc::new(AnthropicProvider::from_config(config)?))
}

fn resolve_fetcher(config: &AnalysisConfig) -> Result<Arc<dyn DocumentFetcher>, AnalyzerError> {
    if let Some(ref fetcher) = config.fetcher {
        return Ok(Arc::clone(fetcher));
    }
    Ok(Arc::new(ArxivFetcher::new(
        config.pdf_base_url.as_str(),
        config.download_timeout_secs,
    )?))
}

/// A document that parsed but holds no text cannot be analyzed.
///
/// Whitespace-only text counts as no text, so this is stricter than an
/// empty-string check: PDFs whose pages extract only as line breaks are
/// rejected here instead of reaching the model.
fn reject_blank(label: &str, text: ExtractedText) -> Result<ExtractedText, AnalyzerError> {
    if text.is_blank() {
        return Err(AnalyzerError::ExtractionFailed {
            source_label: label.to_string(),
            reason: format!(
                "no text found in {} page(s); the PDF may be scanned images only",
                text.pages_total
            ),
        });
    }
    Ok(text)
}

/// Thin wrapper that forwards stage events to the optional callback.
struct Progress<'a>(Option<&'a ProgressCallback>);

impl Progress<'_> {
    fn start(&self, stage: Stage) {
        if let Some(cb) = self.0 {
            cb.on_stage_start(stage);
        }
    }

    fn complete(&self, stage: Stage, detail: &str) {
        if let Some(cb) = self.0 {
            cb.on_stage_complete(stage, detail);
        }
    }

    fn check<T>(&self, stage: Stage, result: Result<T, AnalyzerError>) -> Result<T, AnalyzerError> {
        if let (Some(cb), Err(e)) = (self.0, &result) {
            cb.on_stage_error(stage, &e.to_string());
        }
        result
    }
}
