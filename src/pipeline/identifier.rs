//! Identifier normalisation: turn free-form user input into a canonical
//! arXiv identifier.
//!
//! Accepted shapes (all with an optional `vN` version and `.pdf` suffix):
//!
//! ```text
//! 2301.00001
//! arXiv:2301.00001
//! https://arxiv.org/abs/2301.00001
//! https://arxiv.org/pdf/2301.00001v2.pdf
//! ```
//!
//! The canonical form drops the version so every spelling of the same paper
//! resolves to the same download URL; the version is kept separately for
//! display.

use crate::error::AnalyzerError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static RE_URL_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:https?://)?(?:www\.|export\.)?arxiv\.org/(?:abs|pdf)/").unwrap()
});

static RE_SCHEME_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^arxiv:").unwrap());

static RE_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}\.\d{4,5})(?:v(\d+))?$").unwrap());

/// A validated arXiv identifier (`YYMM.NNNNN`), with the optional version
/// the user supplied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArxivId {
    id: String,
    version: Option<u32>,
}

impl ArxivId {
    /// Canonical, version-less identifier, e.g. `2301.00001`.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Version the user asked for, if any.
    pub fn version(&self) -> Option<u32> {
        self.version
    }

    /// Identifier as the user wrote it, including the version (`2301.00001v2`).
    pub fn display_id(&self) -> String {
        match self.version {
            Some(v) => format!("{}v{}", self.id, v),
            None => self.id.clone(),
        }
    }

    /// The single download URL for this paper under `base_url`.
    pub fn pdf_url(&self, base_url: &str) -> String {
        format!("{}/{}.pdf", base_url.trim_end_matches('/'), self.id)
    }
}

impl fmt::Display for ArxivId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl std::str::FromStr for ArxivId {
    type Err = AnalyzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Parse a user-supplied string into an [`ArxivId`].
///
/// Strips a recognised URL or `arXiv:` prefix, query string, trailing slash
/// and `.pdf` suffix, then validates the remainder against the identifier
/// grammar. Pure: never touches the network.
pub fn normalize(input: &str) -> Result<ArxivId, AnalyzerError> {
    let invalid = || AnalyzerError::InvalidIdentifier {
        input: input.to_string(),
    };

    let trimmed = input.trim();
    let rest = RE_URL_PREFIX.replace(trimmed, "");
    let rest = RE_SCHEME_PREFIX.replace(&rest, "");
    let rest = rest
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let rest = rest
        .strip_suffix(".pdf")
        .or_else(|| rest.strip_suffix(".PDF"))
        .unwrap_or(rest);

    let caps = RE_IDENTIFIER.captures(rest).ok_or_else(invalid)?;
    let version = match caps.get(2) {
        Some(v) => Some(v.as_str().parse::<u32>().map_err(|_| invalid())?),
        None => None,
    };

    Ok(ArxivId {
        id: caps[1].to_string(),
        version,
    })
}
