//! Configuration types for a paper analysis run.
//!
//! All run behaviour is controlled through [`AnalysisConfig`], built via its
//! [`AnalysisConfigBuilder`]. The library never reads the process
//! environment: the credential is an explicit field, and the binary is the
//! one place that maps `ANTHROPIC_API_KEY` onto it.

use crate::error::AnalyzerError;
use crate::pipeline::input::DocumentFetcher;
use crate::pipeline::llm::LlmProvider;
use crate::progress::{AnalysisProgressCallback, ProgressCallback};
use std::fmt;
use std::sync::Arc;

/// Default model identifier for the analysis request.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default output-token budget for the analysis response.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Characters of extracted text embedded in the prompt; the rest is dropped.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 50_000;

/// Base URL of the Anthropic API (the Messages endpoint is appended).
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// Value sent in the `anthropic-version` header.
pub const DEFAULT_ANTHROPIC_VERSION: &str = "2023-06-01";

/// Base URL PDF downloads are resolved against (`{base}/{id}.pdf`).
pub const DEFAULT_PDF_BASE_URL: &str = "https://arxiv.org/pdf";

/// Name of the environment variable the binary reads the credential from.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Configuration for one analysis run.
///
/// Built via [`AnalysisConfig::builder()`] or using
/// [`AnalysisConfig::default()`].
///
/// # Example
/// ```rust
/// use arxiv_insights::AnalysisConfig;
///
/// let config = AnalysisConfig::builder()
///     .api_key("sk-ant-...")
///     .download_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnalysisConfig {
    /// Model identifier sent with the request. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// Seven sections of a few paragraphs each fit comfortably; a lower
    /// budget cuts the last sections off and they parse as empty.
    pub max_tokens: u32,

    /// Character ceiling for the extracted text embedded in the prompt.
    /// Default: 50 000. Truncation is silent.
    pub max_input_chars: usize,

    /// Anthropic API key. Required unless `provider` is set.
    pub api_key: Option<String>,

    /// Anthropic API base URL. Default: [`DEFAULT_API_BASE_URL`].
    pub api_base_url: String,

    /// `anthropic-version` header value. Default: [`DEFAULT_ANTHROPIC_VERSION`].
    pub anthropic_version: String,

    /// Base URL for PDF downloads. Default: [`DEFAULT_PDF_BASE_URL`].
    pub pdf_base_url: String,

    /// Pre-constructed inference provider. Takes precedence over `api_key`.
    pub provider: Option<Arc<dyn LlmProvider>>,

    /// Pre-constructed document fetcher. Default: an arXiv HTTP fetcher.
    pub fetcher: Option<Arc<dyn DocumentFetcher>>,

    /// Download timeout in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Inference call timeout in seconds. Default: 120.
    ///
    /// A full-paper analysis with a 4096-token answer routinely takes
    /// 30–60 s; the timeout only guards against a hung connection.
    pub api_timeout_secs: u64,

    /// Optional stage-event receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            api_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            anthropic_version: DEFAULT_ANTHROPIC_VERSION.to_string(),
            pdf_base_url: DEFAULT_PDF_BASE_URL.to_string(),
            provider: None,
            fetcher: None,
            download_timeout_secs: 30,
            api_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for AnalysisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisConfig")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("max_input_chars", &self.max_input_chars)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("anthropic_version", &self.anthropic_version)
            .field("pdf_base_url", &self.pdf_base_url)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LlmProvider>"))
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn DocumentFetcher>"))
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl AnalysisConfig {
    /// Create a new builder for `AnalysisConfig`.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether a credential or a pre-built provider is available.
    pub fn has_credentials(&self) -> bool {
        self.provider.is_some()
            || self
                .api_key
                .as_deref()
                .is_some_and(|k| !k.trim().is_empty())
    }
}

/// Builder for [`AnalysisConfig`].
#[derive(Debug)]
pub struct AnalysisConfigBuilder {
    config: AnalysisConfig,
}

impl AnalysisConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_input_chars(mut self, n: usize) -> Self {
        self.config.max_input_chars = n;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn anthropic_version(mut self, version: impl Into<String>) -> Self {
        self.config.anthropic_version = version.into();
        self
    }

    pub fn pdf_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.pdf_base_url = url.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn AnalysisProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing credential is not a build error: it is reported by the
    /// pre-flight check at the start of a run as [`AnalyzerError::MissingApiKey`].
    pub fn build(self) -> Result<AnalysisConfig, AnalyzerError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(AnalyzerError::InvalidConfig(
                "Model identifier must not be empty".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.max_input_chars == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "max_input_chars must be ≥ 1".into(),
            ));
        }
        if c.download_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        for (name, url) in [("api_base_url", &c.api_base_url), ("pdf_base_url", &c.pdf_base_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(AnalyzerError::InvalidConfig(format!(
                    "{name} must be an http(s) URL, got '{url}'"
                )));
            }
        }
        Ok(self.config)
    }
}
