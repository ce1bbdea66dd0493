//! Section parsing: split the raw model response into the seven
//! [`AnalysisSections`].
//!
//! The prompt asks for `## N. TOKEN` headings (see [`crate::prompts`]).
//! Models drift from that format in small ways, so a line counts as a
//! section heading when, after stripping `#` markers, bold markers and a
//! trailing colon, its first word is a known [`Section::heading_token`] and
//! the line is visibly a heading: it has a `#`/bold marker, is upper case,
//! or carries the section's own number (`4. Results`). Numbered list items
//! inside a section (`1. Results improved by 3%.`) are therefore left alone.
//!
//! A bold span only makes a heading when it covers the whole title, so
//! `1. **Results generalize** to parsing.` stays a list item.
//!
//! Any other numbered heading (`## 8. FUTURE WORK`) ends the current section
//! without starting a new one, as does an unnumbered `#` heading at the same
//! level as the section heading or above it. Deeper sub-headings
//! (`### Machine translation` under `## 4. RESULTS`) are section content.
//! A section heading seen twice appends to the first occurrence.
//!
//! When the response has no recognisable headings at all, a JSON object with
//! section keys is accepted instead (the format older prompts asked for).
//! Whatever is not found stays an empty string: the result always has all
//! seven keys.

use crate::output::{AnalysisSections, Section};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md|json)?\n(.*)\n```\s*$").unwrap());

static RE_HEADING_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2})[.)]\s*").unwrap());

static RE_JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").unwrap());

/// Longest heading title, in words, before a line is treated as prose.
const MAX_HEADING_WORDS: usize = 8;

/// Level given to headings written without `#` (`**1. BACKGROUND**`).
const UNHASHED_LEVEL: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Heading {
    level: usize,
    numbered: bool,
}

impl Heading {
    /// Whether this heading closes a section opened at `open_level`.
    fn closes(self, open_level: usize) -> bool {
        self.numbered || self.level <= open_level
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Line<'a> {
    /// Start of a known section, with any content after a `TOKEN:` colon.
    Section(Section, Heading, &'a str),
    /// A heading that belongs to no known section.
    OtherHeading(Heading),
    Text,
}

/// Parse a raw model response into sections.
pub fn parse_sections(raw: &str) -> AnalysisSections {
    let cleaned = clean_response(raw);

    let mut buffers: Vec<Vec<&str>> = vec![Vec::new(); Section::ALL.len()];
    let mut seen = [false; 7];
    let mut current: Option<(Section, usize)> = None;

    for line in cleaned.lines() {
        match classify_line(line) {
            Line::Section(section, heading, inline) => {
                if let Some((open, level)) = current {
                    if !heading.closes(level) {
                        buffers[open.number() - 1].push(line);
                        continue;
                    }
                }
                let idx = section.number() - 1;
                if seen[idx] {
                    debug!("Section {:?} repeated; appending", section);
                    buffers[idx].push("");
                }
                seen[idx] = true;
                if !inline.is_empty() {
                    buffers[idx].push(inline);
                }
                current = Some((section, heading.level));
            }
            Line::OtherHeading(heading) => {
                if let Some((open, level)) = current {
                    if heading.closes(level) {
                        current = None;
                    } else {
                        buffers[open.number() - 1].push(line);
                    }
                }
            }
            Line::Text => {
                if let Some((open, _)) = current {
                    buffers[open.number() - 1].push(line);
                }
            }
        }
    }

    let mut sections = AnalysisSections::default();
    if seen.iter().any(|&s| s) {
        for section in Section::ALL {
            sections.set(section, join_block(&buffers[section.number() - 1]));
        }
    } else if let Some(from_json) = parse_json_sections(&cleaned) {
        debug!("No section headings found; using JSON object");
        sections = from_json;
    } else {
        warn!("Response contains no recognisable section headings");
    }

    let missing = sections.missing();
    if !missing.is_empty() {
        warn!("Sections not found in response: {:?}", missing);
    }
    sections
}

/// Normalise line endings, drop invisible characters and an outer code fence.
fn clean_response(raw: &str) -> String {
    let s = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace(['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'], "");
    match RE_OUTER_FENCES.captures(s.trim()) {
        Some(caps) => caps[1].to_string(),
        None => s,
    }
}

fn classify_line(line: &str) -> Line<'_> {
    let mut rest = line.trim();
    if rest.is_empty() {
        return Line::Text;
    }

    let hashes = rest.len() - rest.trim_start_matches('#').len();
    rest = rest.trim_start_matches('#').trim_start();

    let mut bold: Option<&str> = None;
    for marker in ["**", "__"] {
        if let Some(r) = rest.strip_prefix(marker) {
            rest = r.trim_start();
            bold = Some(marker);
        }
    }

    let mut number = None;
    if let Some(caps) = RE_HEADING_NUMBER.captures(rest) {
        number = caps[1].parse::<usize>().ok();
        rest = &rest[caps[0].len()..];
    }

    // Bold may also open after the number: "1. **BACKGROUND**".
    for marker in ["**", "__"] {
        if let Some(r) = rest.strip_prefix(marker) {
            rest = r.trim_start();
            bold = Some(marker);
        }
    }

    // Without `#`, the bold span must hold the whole title.
    if let (0, Some(marker)) = (hashes, bold) {
        if let Some((inside, after)) = rest.split_once(marker) {
            let after = after.trim_start();
            if !after.is_empty() && !after.starts_with(':') && !inside.trim_end().ends_with(':') {
                return Line::Text;
            }
        }
    }
    let bold = bold.is_some();

    let (head, inline) = match rest.split_once(':') {
        Some((h, i)) => (h, i),
        None => (rest, ""),
    };
    let head = head.trim().trim_matches(|c: char| c == '*' || c == '_').trim();
    let inline = inline.trim().trim_start_matches(|c: char| c == '*' || c == '_').trim();

    if head.is_empty() || head.split_whitespace().count() > MAX_HEADING_WORDS {
        return Line::Text;
    }

    let has_letters = head.chars().any(|c| c.is_alphabetic());
    let upper = has_letters && !head.chars().any(|c| c.is_lowercase());
    let marked = hashes > 0 || bold || upper;

    if !marked && number.is_none() {
        return Line::Text;
    }

    let first_word = head
        .split(|c: char| !c.is_ascii_alphabetic())
        .find(|w| !w.is_empty())
        .unwrap_or_default();

    let heading = Heading {
        level: if hashes > 0 { hashes } else { UNHASHED_LEVEL },
        numbered: number.is_some(),
    };

    if let Some(section) = Section::from_heading_token(first_word) {
        let numbered_as_itself = number == Some(section.number()) && !head.ends_with('.');
        if marked || numbered_as_itself {
            return Line::Section(section, heading, inline);
        }
    }

    if hashes > 0 || (number.is_some() && (bold || upper)) {
        return Line::OtherHeading(heading);
    }
    Line::Text
}

/// Join a section's lines, trimming trailing whitespace and blank edges.
fn join_block(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|l| l.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .trim()
        .to_string()
}

/// Keys a JSON-formatted answer may use for a section.
fn json_keys(section: Section) -> &'static [&'static str] {
    match section {
        Section::Background => &["background"],
        Section::Objectives => &["objectives", "objectives_and_hypothesis"],
        Section::Methodology => &["methodology"],
        Section::Results => &["results", "results_and_findings"],
        Section::Discussion => &["discussion", "discussion_and_interpretation"],
        Section::Contributions => &["contributions"],
        Section::Achievements => &["achievements", "achievements_and_significance"],
    }
}

fn parse_json_sections(text: &str) -> Option<AnalysisSections> {
    let candidate = RE_JSON_OBJECT.find(text)?;
    let value: serde_json::Value = serde_json::from_str(candidate.as_str()).ok()?;
    let object = value.as_object()?;

    let mut sections = AnalysisSections::default();
    let mut found = false;
    for section in Section::ALL {
        let entry = json_keys(section).iter().find_map(|k| object.get(*k));
        if let Some(v) = entry {
            let content = match v {
                serde_json::Value::String(s) => s.trim().to_string(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            sections.set(section, content);
            found = true;
        }
    }
    found.then_some(sections)
}
