//! Output types: the seven analysis sections, the exportable record, and
//! per-run statistics.

use crate::pipeline::input::SourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One of the seven fixed analysis categories, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Background,
    Objectives,
    Methodology,
    Results,
    Discussion,
    Contributions,
    Achievements,
}

impl Section {
    /// Every section, in the fixed order used by the prompt, the parser,
    /// the rendered view and the exported JSON.
    pub const ALL: [Section; 7] = [
        Section::Background,
        Section::Objectives,
        Section::Methodology,
        Section::Results,
        Section::Discussion,
        Section::Contributions,
        Section::Achievements,
    ];

    /// 1-based position, used as the heading number in the prompt.
    pub fn number(self) -> usize {
        match self {
            Section::Background => 1,
            Section::Objectives => 2,
            Section::Methodology => 3,
            Section::Results => 4,
            Section::Discussion => 5,
            Section::Contributions => 6,
            Section::Achievements => 7,
        }
    }

    /// JSON key in [`AnalysisSections`].
    pub fn key(self) -> &'static str {
        match self {
            Section::Background => "background",
            Section::Objectives => "objectives",
            Section::Methodology => "methodology",
            Section::Results => "results",
            Section::Discussion => "discussion",
            Section::Contributions => "contributions",
            Section::Achievements => "achievements",
        }
    }

    /// The upper-case token the model is asked to emit after the number,
    /// e.g. `"1. BACKGROUND"`. The section parser matches on this token, so
    /// it is the single source of truth for both sides.
    pub fn heading_token(self) -> &'static str {
        match self {
            Section::Background => "BACKGROUND",
            Section::Objectives => "OBJECTIVES",
            Section::Methodology => "METHODOLOGY",
            Section::Results => "RESULTS",
            Section::Discussion => "DISCUSSION",
            Section::Contributions => "CONTRIBUTIONS",
            Section::Achievements => "ACHIEVEMENTS",
        }
    }

    /// Human-readable heading for the rendered view.
    pub fn title(self) -> &'static str {
        match self {
            Section::Background => "Background of the Study",
            Section::Objectives => "Research Objectives and Hypothesis",
            Section::Methodology => "Methodology",
            Section::Results => "Results and Findings",
            Section::Discussion => "Discussion and Interpretation",
            Section::Contributions => "Contributions to the Field",
            Section::Achievements => "Achievements and Significance",
        }
    }

    /// Look up a section by its heading token (case-insensitive).
    pub fn from_heading_token(token: &str) -> Option<Section> {
        Section::ALL
            .into_iter()
            .find(|s| s.heading_token().eq_ignore_ascii_case(token.trim()))
    }
}

/// The seven analysis sections.
///
/// A struct rather than a map: every key is always present, and serde emits
/// them in declaration order, which is the fixed section order. A section
/// the model did not produce holds an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSections {
    pub background: String,
    pub objectives: String,
    pub methodology: String,
    pub results: String,
    pub discussion: String,
    pub contributions: String,
    pub achievements: String,
}

impl AnalysisSections {
    pub fn get(&self, section: Section) -> &str {
        match section {
            Section::Background => &self.background,
            Section::Objectives => &self.objectives,
            Section::Methodology => &self.methodology,
            Section::Results => &self.results,
            Section::Discussion => &self.discussion,
            Section::Contributions => &self.contributions,
            Section::Achievements => &self.achievements,
        }
    }

    pub fn set(&mut self, section: Section, content: impl Into<String>) {
        let slot = match section {
            Section::Background => &mut self.background,
            Section::Objectives => &mut self.objectives,
            Section::Methodology => &mut self.methodology,
            Section::Results => &mut self.results,
            Section::Discussion => &mut self.discussion,
            Section::Contributions => &mut self.contributions,
            Section::Achievements => &mut self.achievements,
        };
        *slot = content.into();
    }

    /// Iterate `(section, content)` pairs in the fixed order.
    pub fn iter(&self) -> impl Iterator<Item = (Section, &str)> + '_ {
        Section::ALL.into_iter().map(move |s| (s, self.get(s)))
    }

    /// Sections whose content is empty or whitespace.
    pub fn missing(&self) -> Vec<Section> {
        self.iter()
            .filter(|(_, content)| content.trim().is_empty())
            .map(|(s, _)| s)
            .collect()
    }

    /// Number of sections with content.
    pub fn found_count(&self) -> usize {
        Section::ALL.len() - self.missing().len()
    }
}

/// The final, exportable result of one successful run.
///
/// Field order is the JSON key order of the export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Canonical arXiv identifier, or the uploaded file's name.
    pub identifier_or_filename: String,
    /// When the analysis completed (UTC, whole seconds, RFC 3339).
    pub timestamp: DateTime<Utc>,
    pub sections: AnalysisSections,
    /// The unparsed model response, kept for auditing the section split.
    pub raw_response: String,
}

/// Run statistics, reported to the user but not exported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisStats {
    /// Pages in the document.
    pub pages_total: usize,
    /// Pages whose text was extracted.
    pub pages_extracted: usize,
    /// Characters produced by the extractor.
    pub extracted_chars: usize,
    /// Characters actually embedded in the prompt.
    pub submitted_chars: usize,
    /// Whether the text was cut at the character ceiling.
    pub truncated: bool,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Sections the parser located in the response.
    pub sections_found: usize,
    pub fetch_duration_ms: u64,
    pub extract_duration_ms: u64,
    pub llm_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a successful run returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub record: AnalysisRecord,
    /// Whether the document was downloaded or uploaded.
    pub source: SourceKind,
    pub stats: AnalysisStats,
}
