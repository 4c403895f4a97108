//! Document-to-text adapter for postings distributed as PDF.
//!
//! Produces page-segmented plain text plus the hyperlinks found in it.
//! The joined text (pages separated by form feeds) is handed to the
//! registry as markup; the text-pattern strategy reads plain-text lines.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

/// Page separator in the joined text.
pub const PAGE_BREAK: char = '\u{000C}';

static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhttps?://[^\s<>"')\]]+"#).unwrap());

/// Plain text of a document, one entry per page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextDocument {
    pub pages: Vec<String>,
    pub links: Vec<String>,
}

impl TextDocument {
    /// Split extracted text into pages and collect its links.
    pub fn from_text(text: &str) -> Self {
        let pages: Vec<String> = text
            .split(PAGE_BREAK)
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        let mut links: Vec<String> = Vec::new();
        for m in LINK.find_iter(text) {
            let link = m.as_str().trim_end_matches(['.', ',', ';', ':']).to_string();
            if !links.contains(&link) {
                links.push(link);
            }
        }
        Self { pages, links }
    }

    /// Text handed to the extractor: pages joined by form feeds.
    pub fn to_markup(&self) -> String {
        self.pages.join(&PAGE_BREAK.to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// Extract text from PDF bytes.
pub fn extract_pdf(bytes: &[u8]) -> Result<TextDocument> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| anyhow::anyhow!("PDF extraction failed: {}", e))?;
    let doc = TextDocument::from_text(&text);
    tracing::debug!(pages = doc.pages.len(), links = doc.links.len(), "extracted PDF text");
    Ok(doc)
}

/// Read and extract a PDF file.
pub fn read_pdf(path: &Path) -> Result<TextDocument> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    extract_pdf(&bytes).with_context(|| format!("Failed to extract text from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_pdf(b"not a pdf").unwrap_err();
        assert!(err.to_string().contains("PDF extraction failed"));
    }

    #[test]
    fn splits_pages_on_form_feed() {
        let doc = TextDocument::from_text("Job Title: Welder\n\u{000C}\n  \u{000C}Company: Initech\n");
        assert_eq!(doc.pages, vec!["Job Title: Welder", "Company: Initech"]);
        assert_eq!(doc.to_markup(), "Job Title: Welder\u{000C}Company: Initech");
    }

    #[test]
    fn collects_unique_links() {
        let doc = TextDocument::from_text(
            "Apply at https://jobs.lever.co/initech/42. Or see https://jobs.lever.co/initech/42 (mirror).",
        );
        assert_eq!(doc.links, vec!["https://jobs.lever.co/initech/42"]);
    }
}
