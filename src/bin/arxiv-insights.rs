//! CLI binary for arxiv-insights.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints results.

use anyhow::{Context, Result};
use arxiv_insights::{
    analyze, analyze_file, export_record, present, AnalysisConfig, AnalysisOutput,
    AnalysisProgressCallback, AnalysisStats, AnalyzerError, ProgressCallback, Stage,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner for the current stage, plus a
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    stage_started: Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            stage_started: Mutex::new(None),
        })
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .stage_started
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        format!("{secs:.1}s")
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage) {
        if let Ok(mut t) = self.stage_started.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_prefix(stage_title(stage));
        self.bar.set_message("…");
    }

    fn on_stage_complete(&self, stage: Stage, detail: &str) {
        self.bar.println(format!(
            "  {} {:<12} {}  {}",
            green("✓"),
            stage_title(stage),
            detail,
            dim(&self.stage_elapsed()),
        ));
    }

    fn on_stage_error(&self, stage: Stage, error: &str) {
        // First line only; the full message is printed on exit.
        let first = error.lines().next().unwrap_or_default();
        self.bar.println(format!(
            "  {} {:<12} {}  {}",
            red("✗"),
            stage_title(stage),
            red(first),
            dim(&self.stage_elapsed()),
        ));
        self.bar.finish_and_clear();
    }
}

fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::Normalize => "Normalize",
        Stage::Fetch => "Fetch",
        Stage::Extract => "Extract",
        Stage::Analyze => "Analyze",
        Stage::Export => "Export",
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyze by identifier (Markdown on stdout)
  arxiv-insights 2301.00001

  # Any abs/pdf URL works
  arxiv-insights https://arxiv.org/abs/2212.08073v2

  # Analyze a local PDF
  arxiv-insights --file paper.pdf

  # Save the JSON export into a directory
  arxiv-insights 2301.00001 -o exports/

  # Print the exported record as JSON instead of Markdown
  arxiv-insights --json 2301.00001 > analysis.json

ENVIRONMENT VARIABLES:
  ANTHROPIC_API_KEY       Anthropic API key (also read from a .env file)
  ARXIV_INSIGHTS_MODEL    Override model ID
  RUST_LOG                Override log filter (e.g. arxiv_insights=debug)

OUTPUT:
  The export file is named analysis_{id}_{YYYYMMDDHHMM}.json (UTC) and holds
  identifier_or_filename, timestamp, the seven sections and the raw response.
"#;

/// Analyze arXiv papers with Claude.
#[derive(Parser, Debug)]
#[command(
    name = "arxiv-insights",
    version,
    about = "Analyze arXiv papers with Claude",
    long_about = "Fetch an arXiv paper (or read a local PDF), extract its text, and ask Claude \
for a structured analysis: background, objectives, methodology, results, discussion, \
contributions and achievements.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// arXiv identifier or URL (2301.00001, arXiv:2301.00001v2, https://arxiv.org/abs/…).
    #[arg(required_unless_present = "file", conflicts_with = "file")]
    input: Option<String>,

    /// Analyze a local PDF instead of downloading one.
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Claude model ID.
    #[arg(long, env = "ARXIV_INSIGHTS_MODEL", default_value = arxiv_insights::config::DEFAULT_MODEL)]
    model: String,

    /// Write the JSON export into this directory.
    #[arg(short = 'o', long, value_name = "DIR")]
    export_dir: Option<PathBuf>,

    /// Print the exported record as JSON instead of Markdown.
    #[arg(long)]
    json: bool,

    /// PDF download timeout in seconds.
    #[arg(long, default_value_t = 30)]
    download_timeout: u64,

    /// Analysis request timeout in seconds.
    #[arg(long, default_value_t = 120)]
    api_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long)]
    no_progress: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A .env file only fills variables that are not already set.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports each stage, so library INFO logs are
    // suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|cb| cb as Arc<dyn AnalysisProgressCallback>);

    let config = build_config(&cli, progress_cb)?;

    // ── Run analysis ─────────────────────────────────────────────────────
    let result = match (&cli.file, &cli.input) {
        (Some(path), _) => analyze_file(path, &config).await,
        (None, Some(input)) => analyze(input, &config).await,
        (None, None) => anyhow::bail!("Provide an arXiv identifier or --file PATH"),
    };
    let output = result.map_err(|e| {
        if let Some(ref s) = spinner {
            s.finish();
        }
        stage_failure(e)
    })?;

    // ── Export ───────────────────────────────────────────────────────────
    let exported = match cli.export_dir {
        Some(ref dir) => Some(export_record(&output.record, dir, &config).map_err(|e| {
            if let Some(ref s) = spinner {
                s.finish();
            }
            stage_failure(e)
        })?),
        None => None,
    };

    if let Some(ref s) = spinner {
        s.finish();
    }

    // ── Print ────────────────────────────────────────────────────────────
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        let bytes = present::export(&output.record).context("Failed to serialise analysis")?;
        handle.write_all(&bytes).context("Failed to write to stdout")?;
        handle.write_all(b"\n").context("Failed to write to stdout")?;
    } else {
        handle
            .write_all(present::render_record(&output.record).as_bytes())
            .context("Failed to write to stdout")?;
    }
    drop(handle);

    if !cli.quiet {
        print_summary(&output, show_progress);
        if let Some(path) = exported {
            eprintln!("{}  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .model(cli.model.clone())
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Wrap a library error with the stage it halted.
fn stage_failure(err: AnalyzerError) -> anyhow::Error {
    let context = match err.stage() {
        Some(stage) => format!("Failed to {stage}"),
        None => "Analysis could not start".to_string(),
    };
    anyhow::Error::new(err).context(context)
}

fn print_summary(output: &AnalysisOutput, show_progress: bool) {
    for line in summary_lines(&output.stats, show_progress) {
        eprintln!("{line}");
    }
}

/// Closing lines for stderr. Truncation stays silent here.
fn summary_lines(stats: &AnalysisStats, show_progress: bool) -> Vec<String> {
    let mut lines = Vec::new();
    if !show_progress {
        lines.push(format!(
            "Extracted {} characters from {}/{} pages",
            stats.extracted_chars, stats.pages_extracted, stats.pages_total
        ));
    }
    lines.push(format!(
        "{}  {}/7 sections  {}ms  {} tokens in / {} tokens out",
        if stats.sections_found == 7 {
            green("✔")
        } else {
            red("⚠")
        },
        stats.sections_found,
        stats.total_duration_ms,
        dim(&stats.input_tokens.to_string()),
        dim(&stats.output_tokens.to_string()),
    ));
    lines
}
