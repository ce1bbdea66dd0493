//! # arxiv-insights
//!
//! Fetch an arXiv paper (or take a local PDF), extract its text, and ask
//! Claude for a structured seven-part analysis: background, objectives,
//! methodology, results, discussion, contributions and achievements.
//!
//! ## Pipeline Overview
//!
//! ```text
//! "https://arxiv.org/abs/2301.00001v2"
//!  │
//!  ├─ 1. Normalize  URL / bare ID → canonical 2301.00001
//!  ├─ 2. Fetch      GET https://arxiv.org/pdf/2301.00001.pdf (or read upload)
//!  ├─ 3. Extract    lopdf text extraction (CPU-bound, spawn_blocking)
//!  ├─ 4. Analyze    one Anthropic Messages API call, text capped at 50k chars
//!  └─ 5. Present    seven sections → Markdown view / JSON export
//! ```
//!
//! Every run is a single linear pass; the first failing stage returns its
//! [`AnalyzerError`] and nothing partial is produced.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arxiv_insights::{analyze, present, AnalysisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalysisConfig::builder()
//!         .api_key(std::env::var("ANTHROPIC_API_KEY")?)
//!         .build()?;
//!     let output = analyze("2301.00001", &config).await?;
//!     println!("{}", present::render_record(&output.record));
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.input_tokens,
//!         output.stats.output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `arxiv-insights` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! arxiv-insights = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod present;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{analyze, analyze_bytes, analyze_file, analyze_sync, analyze_to_file, export_record};
pub use config::{AnalysisConfig, AnalysisConfigBuilder};
pub use error::{AnalyzerError, PageError};
pub use output::{AnalysisOutput, AnalysisRecord, AnalysisSections, AnalysisStats, Section};
pub use pipeline::identifier::{normalize, ArxivId};
pub use pipeline::input::{DocumentFetcher, RawDocument, SourceKind};
pub use pipeline::llm::{CompletionRequest, LlmProvider, LlmResponse};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
