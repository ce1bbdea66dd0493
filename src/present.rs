//! Result presentation: the rendered Markdown view and the JSON export.
//!
//! Rendering always emits all seven sections under their fixed
//! human-readable titles, in [`Section::ALL`] order. A section with no
//! content gets an explicit notice so an empty section is never mistaken for
//! a rendering bug.
//!
//! The export is the [`AnalysisRecord`] serialised by `serde_json`; key order
//! is the struct declaration order and therefore stable across runs.

use crate::error::AnalyzerError;
use crate::output::{AnalysisRecord, AnalysisSections, Section};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Shown in place of a section the model did not produce.
pub const EMPTY_SECTION_NOTICE: &str = "_No content extracted for this section._";

/// Render the seven sections as Markdown.
pub fn render_sections(sections: &AnalysisSections) -> String {
    let mut out = String::new();
    for (i, (section, content)) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("## {}\n\n", section.title()));
        let content = content.trim();
        if content.is_empty() {
            out.push_str(EMPTY_SECTION_NOTICE);
        } else {
            out.push_str(content);
        }
        out.push('\n');
    }
    out
}

/// Render a full record: title, generation caption and all sections.
pub fn render_record(record: &AnalysisRecord) -> String {
    format!(
        "# Paper Analysis: {}\n\n_Generated on: {}_\n\n{}",
        record.identifier_or_filename,
        record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        render_sections(&record.sections)
    )
}

/// Serialise a record to pretty-printed UTF-8 JSON.
pub fn export(record: &AnalysisRecord) -> Result<Vec<u8>, AnalyzerError> {
    serde_json::to_vec_pretty(record).map_err(|e| AnalyzerError::ExportFailed {
        path: PathBuf::from(export_filename(record)),
        reason: e.to_string(),
    })
}

/// `analysis_{id}_{YYYYMMDDHHMM}.json`, minute precision, UTC.
///
/// Uploaded file names lose a trailing `.pdf` and any character outside
/// `[A-Za-z0-9._-]` becomes `_`, so the name is always a single path
/// component.
pub fn export_filename(record: &AnalysisRecord) -> String {
    format!(
        "analysis_{}_{}.json",
        sanitize_stem(&record.identifier_or_filename),
        record.timestamp.format("%Y%m%d%H%M")
    )
}

fn sanitize_stem(name: &str) -> String {
    let stem = match name.len().checked_sub(4) {
        Some(cut) if name.is_char_boundary(cut) && name[cut..].eq_ignore_ascii_case(".pdf") => {
            &name[..cut]
        }
        _ => name,
    };
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.trim_matches('.') {
        "" => "paper".to_string(),
        s => s.to_string(),
    }
}

/// Write the export into `dir` and return the file's path.
///
/// The JSON goes to a temporary file in the same directory which is then
/// renamed into place, so a failed write never leaves a partial export.
pub fn write_export(record: &AnalysisRecord, dir: impl AsRef<Path>) -> Result<PathBuf, AnalyzerError> {
    let dir = dir.as_ref();
    let dest = dir.join(export_filename(record));
    let failed = |reason: String| AnalyzerError::ExportFailed {
        path: dest.clone(),
        reason,
    };

    let bytes = export(record)?;
    std::fs::create_dir_all(dir).map_err(|e| failed(e.to_string()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| failed(e.to_string()))?;
    tmp.write_all(&bytes).map_err(|e| failed(e.to_string()))?;
    tmp.flush().map_err(|e| failed(e.to_string()))?;
    debug!("Wrote {} bytes to {}", bytes.len(), tmp.path().display());

    tmp.persist(&dest).map_err(|e| failed(e.error.to_string()))?;
    info!("Exported analysis to {}", dest.display());
    Ok(dest)
}
