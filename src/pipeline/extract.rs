//! Text extraction: PDF bytes → plain text, page by page.
//!
//! ## Failure policy
//!
//! Extraction is best-effort per page and all-or-nothing per document:
//!
//! - bytes that are not a PDF, that `lopdf` cannot parse, or that are
//!   encrypted fail the whole call with [`AnalyzerError::ExtractionFailed`];
//! - once the document parses, a page whose content stream cannot be decoded
//!   is skipped and recorded as a [`PageError`], and the remaining pages are
//!   still returned.
//!
//! [`ExtractedText::pages_total`] / [`ExtractedText::pages_extracted`] make
//! the partial case visible instead of silently losing content.
//!
//! The output is the raw concatenation of page texts, each followed by a
//! newline; no whitespace or ligature cleanup happens here.

use crate::error::{AnalyzerError, PageError};
use crate::pipeline::input::RawDocument;
use lopdf::Document;
use tracing::{debug, info, warn};

/// How far into the buffer the `%PDF` header may appear.
/// Some generators prepend junk bytes; readers tolerate up to 1 KiB.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Plain text extracted from a document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedText {
    /// Concatenated page texts, one newline after each page.
    pub text: String,
    /// Pages in the document.
    pub pages_total: usize,
    /// Pages whose text was extracted.
    pub pages_extracted: usize,
    /// Pages that were skipped.
    pub page_errors: Vec<PageError>,
}

impl ExtractedText {
    /// Number of characters (not bytes) in the text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Whether every page contributed text.
    pub fn is_complete(&self) -> bool {
        self.pages_extracted == self.pages_total
    }

    /// Whether the extraction produced anything besides whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Extract text from a document.
///
/// Parsing is CPU-bound, so it runs on the blocking thread pool.
pub async fn extract(doc: RawDocument) -> Result<ExtractedText, AnalyzerError> {
    let label = doc.label().to_string();
    tokio::task::spawn_blocking(move || extract_blocking(doc.bytes(), doc.label()))
        .await
        .map_err(|e| AnalyzerError::Internal(format!("Extraction task for '{label}' panicked: {e}")))?
}

/// Blocking implementation of [`extract`].
pub fn extract_blocking(bytes: &[u8], label: &str) -> Result<ExtractedText, AnalyzerError> {
    let failed = |reason: String| AnalyzerError::ExtractionFailed {
        source_label: label.to_string(),
        reason,
    };

    if !has_pdf_header(bytes) {
        let magic = &bytes[..bytes.len().min(4)];
        return Err(failed(format!(
            "not a PDF document (first bytes: {magic:?})"
        )));
    }

    let document = Document::load_mem(bytes).map_err(|e| failed(format!("corrupt PDF: {e}")))?;

    if document.is_encrypted() {
        return Err(failed("PDF is encrypted".to_string()));
    }

    let pages = document.get_pages();
    info!("PDF loaded: {} pages", pages.len());

    let per_page = pages.keys().map(|&page_num| {
        let result = document
            .extract_text(&[page_num])
            .map_err(|e| e.to_string());
        (page_num, result)
    });

    let extracted = assemble_pages(per_page);
    debug!(
        "Extracted {} chars from {}/{} pages",
        extracted.char_count(),
        extracted.pages_extracted,
        extracted.pages_total
    );
    Ok(extracted)
}

/// Concatenate per-page results in page order, skipping failed pages.
fn assemble_pages<I>(pages: I) -> ExtractedText
where
    I: IntoIterator<Item = (u32, Result<String, String>)>,
{
    let mut out = ExtractedText::default();

    for (page, result) in pages {
        out.pages_total += 1;
        match result {
            Ok(text) => {
                out.text.push_str(&text);
                out.text.push('\n');
                out.pages_extracted += 1;
            }
            Err(detail) => {
                warn!("Skipping page {}: {}", page, detail);
                out.page_errors
                    .push(PageError::ExtractFailed { page, detail });
            }
        }
    }

    out
}

fn has_pdf_header(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    window.windows(4).any(|w| w == b"%PDF")
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// Operations drawing one Courier text line.
    fn text_page(text: &str) -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ]
    }

    /// A page whose `Tf` operator names no font, so its text cannot be decoded.
    fn undecodable_page() -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![12.into(), 12.into()]),
            Operation::new("Tj", vec![Object::string_literal("lost")]),
            Operation::new("ET", vec![]),
        ]
    }

    /// Build a document with one content stream per page.
    fn build_document(pages: Vec<Vec<Operation>>) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for operations in pages {
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    fn save(mut doc: Document) -> Vec<u8> {
        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    /// Build a minimal PDF with one Courier text line per page.
    fn sample_pdf(pages: &[&str]) -> Vec<u8> {
        save(build_document(pages.iter().map(|t| text_page(t)).collect()))
    }

    #[test]
    fn extracts_pages_in_order() {
        let pdf = sample_pdf(&["Attention Is All You Need", "Scaled dot product"]);
        let out = extract_blocking(&pdf, "sample.pdf").unwrap();

        assert_eq!(out.pages_total, 2);
        assert_eq!(out.pages_extracted, 2);
        assert!(out.is_complete());
        let first = out.text.find("Attention").expect("page 1 text");
        let second = out.text.find("Scaled").expect("page 2 text");
        assert!(first < second);
    }

    #[test]
    fn non_pdf_bytes_fail() {
        let err = extract_blocking(b"<html>404</html>", "2301.00001").unwrap_err();
        match err {
            AnalyzerError::ExtractionFailed {
                source_label,
                reason,
            } => {
                assert_eq!(source_label, "2301.00001");
                assert!(reason.contains("not a PDF"), "got: {reason}");
            }
            other => panic!("expected ExtractionFailed, got {other:?}"),
        }
    }

    #[test]
    fn empty_bytes_fail() {
        assert!(matches!(
            extract_blocking(b"", "empty.pdf"),
            Err(AnalyzerError::ExtractionFailed { .. })
        ));
    }

    #[test]
    fn truncated_pdf_fails() {
        let err = extract_blocking(b"%PDF-1.7\n1 0 obj\n<<", "broken.pdf").unwrap_err();
        assert!(matches!(err, AnalyzerError::ExtractionFailed { .. }));
    }

    #[test]
    fn encrypted_pdf_fails() {
        let mut doc = build_document(vec![text_page("Confidential")]);
        let encrypt_id = doc.add_object(dictionary! {
            "Filter" => "Standard",
            "V" => 99,
            "R" => 99,
            "Length" => 40,
            "O" => Object::string_literal(vec![0u8; 32]),
            "U" => Object::string_literal(vec![0u8; 32]),
            "P" => -1,
        });
        doc.trailer.set("Encrypt", encrypt_id);

        match extract_blocking(&save(doc), "locked.pdf") {
            Err(AnalyzerError::ExtractionFailed { source_label, .. }) => {
                assert_eq!(source_label, "locked.pdf");
            }
            other => panic!("expected ExtractionFailed, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_page_is_skipped() {
        let doc = build_document(vec![
            text_page("Introduction"),
            undecodable_page(),
            text_page("Conclusion"),
        ]);
        let out = extract_blocking(&save(doc), "partial.pdf").unwrap();

        assert_eq!(out.pages_total, 3);
        assert_eq!(out.pages_extracted, 2);
        assert!(out.pages_extracted < out.pages_total);
        assert!(out.text.contains("Introduction"), "got: {:?}", out.text);
        assert!(out.text.contains("Conclusion"), "got: {:?}", out.text);
        assert!(!out.text.contains("lost"));
        assert!(matches!(
            out.page_errors.as_slice(),
            [PageError::ExtractFailed { page: 2, .. }]
        ));
    }

    #[test]
    fn assemble_pages_skips_failures() {
        let out = assemble_pages(vec![
            (1, Ok("one".to_string())),
            (2, Err("bad stream".to_string())),
            (3, Ok("three".to_string())),
        ]);
        assert_eq!(out.text, "one\nthree\n");
        assert_eq!(out.pages_total, 3);
        assert_eq!(out.pages_extracted, 2);
        assert!(!out.is_complete());
        assert!(matches!(
            out.page_errors.as_slice(),
            [PageError::ExtractFailed { page: 2, .. }]
        ));
    }

    #[test]
    fn assemble_pages_blank_document() {
        let out = assemble_pages(vec![(1, Ok("  ".to_string()))]);
        assert!(out.is_blank());
        assert_eq!(out.char_count(), 3);
    }

    #[test]
    fn header_may_follow_leading_junk() {
        let mut bytes = vec![b' '; 10];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(has_pdf_header(&bytes));
        assert!(!has_pdf_header(b"PK\x03\x04"));
    }

    #[tokio::test]
    async fn async_extract_consumes_raw_document() {
        let pdf = sample_pdf(&["Hello arXiv"]);
        let doc = RawDocument::uploaded("hello.pdf", pdf);
        let out = extract(doc).await.unwrap();
        assert!(out.text.contains("Hello"), "got: {:?}", out.text);
    }
}
