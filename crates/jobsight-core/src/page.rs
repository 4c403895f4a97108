//! Parsed job-posting markup.
//!
//! A [`Page`] is built once per extraction and shared by every strategy and
//! by pattern discovery. It accepts both HTML and plain text (the output of
//! the document-to-text collaborator); plain text simply has no elements,
//! so selector lookups find nothing and [`Page::text_lines`] falls back to
//! the raw lines.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::StrategyError;
use crate::models::{collapse_whitespace, PageMetadata};
use crate::source::{PlatformFamily, SourceKind};

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z!/][^>]*>").unwrap());

static LD_JSON: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").unwrap());
static HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").unwrap());

/// Elements whose text never belongs to the visible posting.
const HIDDEN: &[&str] = &["script", "style", "noscript", "template", "head", "svg"];

/// Elements that start a new text line.
const BLOCKS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "h1", "h2", "h3", "h4", "h5", "h6", "section", "article",
    "header", "footer", "main", "aside", "nav", "tr", "td", "th", "dt", "dd", "dl", "table",
    "br", "hr", "form", "label", "blockquote", "pre", "address",
];

/// A markup location descriptor: a CSS selector, optionally followed by
/// `@attribute` to read an attribute instead of the element text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor<'a> {
    pub selector: &'a str,
    pub attribute: Option<&'a str>,
}

impl<'a> Descriptor<'a> {
    pub fn parse(descriptor: &'a str) -> Self {
        match descriptor.rsplit_once('@') {
            Some((sel, attr))
                if !attr.is_empty()
                    && attr
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
            {
                Descriptor {
                    selector: sel.trim(),
                    attribute: Some(attr),
                }
            }
            _ => Descriptor {
                selector: descriptor.trim(),
                attribute: None,
            },
        }
    }
}

pub struct Page {
    raw: String,
    html: Html,
    is_markup: bool,
    structured: Vec<Value>,
    malformed_blocks: usize,
}

impl Page {
    pub fn parse(markup: &str) -> Self {
        let is_markup = TAG.is_match(markup);
        let html = Html::parse_document(if is_markup { markup } else { "" });

        let mut structured = Vec::new();
        let mut malformed_blocks = 0;
        for script in html.select(&LD_JSON) {
            let body: String = script.text().collect();
            if body.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(body.trim()) {
                Ok(value) => structured.push(value),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping malformed structured-data block");
                    malformed_blocks += 1;
                }
            }
        }

        Self {
            raw: markup.to_string(),
            html,
            is_markup,
            structured,
            malformed_blocks,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Whether the input was HTML rather than plain text.
    pub fn is_markup(&self) -> bool {
        self.is_markup
    }

    pub fn title(&self) -> Option<String> {
        self.html
            .select(&TITLE)
            .next()
            .map(|t| collapse_whitespace(&t.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }

    /// `<meta>` pairs keyed by lowercase `name`, `property` or `itemprop`.
    pub fn meta_tags(&self) -> BTreeMap<String, String> {
        let mut tags = BTreeMap::new();
        for meta in self.html.select(&META) {
            let el = meta.value();
            let key = el
                .attr("property")
                .or_else(|| el.attr("name"))
                .or_else(|| el.attr("itemprop"));
            if let (Some(key), Some(content)) = (key, el.attr("content")) {
                let content = collapse_whitespace(content);
                if !content.is_empty() {
                    tags.entry(key.to_ascii_lowercase()).or_insert(content);
                }
            }
        }
        tags
    }

    pub fn meta(&self, key: &str) -> Option<String> {
        self.meta_tags().remove(&key.to_ascii_lowercase())
    }

    /// Every well-formed structured-data block, in document order.
    pub fn structured_blocks(&self) -> &[Value] {
        &self.structured
    }

    pub fn malformed_blocks(&self) -> usize {
        self.malformed_blocks
    }

    /// The first schema.org `JobPosting` object in any block.
    pub fn job_posting(&self) -> Option<&Value> {
        self.structured.iter().find_map(find_job_posting)
    }

    /// Heading texts with their level, in document order.
    pub fn headings(&self) -> Vec<(u8, String)> {
        self.html
            .select(&HEADINGS)
            .filter_map(|h| {
                let level = h.value().name()[1..].parse::<u8>().ok()?;
                let text = collapse_whitespace(&h.text().collect::<String>());
                (!text.is_empty()).then_some((level, text))
            })
            .collect()
    }

    /// Resolve a descriptor to the non-empty values it points at.
    pub fn select_values(&self, descriptor: &str) -> Result<Vec<String>, StrategyError> {
        let desc = Descriptor::parse(descriptor);
        let selector = Selector::parse(desc.selector)
            .map_err(|_| StrategyError::InvalidSelector(desc.selector.to_string()))?;
        Ok(self
            .html
            .select(&selector)
            .filter_map(|el| {
                let value = match desc.attribute {
                    Some(attr) => el.value().attr(attr).map(collapse_whitespace),
                    None => Some(element_text(el)),
                };
                value.filter(|v| !v.is_empty())
            })
            .collect())
    }

    /// Visible text split into lines at block boundaries.
    ///
    /// For plain-text input these are the raw lines, with form feeds
    /// treated as line breaks.
    pub fn text_lines(&self) -> Vec<String> {
        if !self.is_markup {
            return self
                .raw
                .split(['\n', '\u{c}'])
                .map(collapse_whitespace)
                .filter(|l| !l.is_empty())
                .collect();
        }
        let mut lines = Vec::new();
        let mut current = String::new();
        collect_lines(self.html.root_element(), &mut current, &mut lines);
        flush(&mut current, &mut lines);
        lines
    }

    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.raw.as_bytes()))
    }

    pub fn metadata(&self, address: &str) -> PageMetadata {
        PageMetadata {
            page_title: self.title(),
            meta_tags: self.meta_tags(),
            structured_data: self.job_posting().cloned(),
            structured_blocks: self.structured.len(),
            malformed_blocks: self.malformed_blocks,
            family: PlatformFamily::of_address(address),
            source_kind: SourceKind::classify(address),
            fingerprint: self.fingerprint(),
        }
    }
}

/// Visible text of an element with hidden descendants skipped.
pub fn element_text(el: ElementRef<'_>) -> String {
    let mut current = String::new();
    let mut lines = Vec::new();
    collect_lines(el, &mut current, &mut lines);
    flush(&mut current, &mut lines);
    lines.join(" ")
}

fn collect_lines(el: ElementRef<'_>, current: &mut String, lines: &mut Vec<String>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            current.push_str(text);
            continue;
        }
        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        let name = child_el.value().name();
        if HIDDEN.contains(&name) {
            continue;
        }
        let block = BLOCKS.contains(&name);
        if block {
            flush(current, lines);
        } else {
            current.push(' ');
        }
        collect_lines(child_el, current, lines);
        if block {
            flush(current, lines);
        }
    }
}

fn flush(current: &mut String, lines: &mut Vec<String>) {
    let line = collapse_whitespace(current);
    if !line.is_empty() {
        lines.push(line);
    }
    current.clear();
}

fn is_job_posting(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t.eq_ignore_ascii_case("JobPosting"),
        Some(Value::Array(types)) => types
            .iter()
            .any(|t| t.as_str().is_some_and(|t| t.eq_ignore_ascii_case("JobPosting"))),
        _ => false,
    }
}

fn find_job_posting(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(find_job_posting),
        Value::Object(map) => {
            if is_job_posting(value) {
                return Some(value);
            }
            map.get("@graph").and_then(find_job_posting)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<html><head>
        <title>Platform Engineer | Acme Careers</title>
        <meta property="og:site_name" content="Acme">
        <script type="application/ld+json">{ not json</script>
        <script type="application/ld+json">
          {"@context": "https://schema.org", "@graph": [
            {"@type": "Organization", "name": "Acme"},
            {"@type": "JobPosting", "title": "Platform Engineer"}
          ]}
        </script>
        <style>.x { color: red }</style>
      </head><body>
        <h1>Platform Engineer</h1>
        <p><strong>Location:</strong> Denver, CO</p>
        <div class="company" data-org="acme">Acme <span>Inc</span></div>
      </body></html>"#;

    #[test]
    fn skips_malformed_blocks_and_finds_graph_posting() {
        let page = Page::parse(SAMPLE);
        assert_eq!(page.malformed_blocks(), 1);
        assert_eq!(page.structured_blocks().len(), 1);
        let posting = page.job_posting().unwrap();
        assert_eq!(posting["title"], "Platform Engineer");
    }

    #[test]
    fn reads_title_and_meta() {
        let page = Page::parse(SAMPLE);
        assert_eq!(page.title().as_deref(), Some("Platform Engineer | Acme Careers"));
        assert_eq!(page.meta("og:site_name").as_deref(), Some("Acme"));
    }

    #[test]
    fn text_lines_follow_blocks_and_skip_hidden() {
        let page = Page::parse(SAMPLE);
        let lines = page.text_lines();
        assert!(lines.contains(&"Location: Denver, CO".to_string()));
        assert!(lines.contains(&"Acme Inc".to_string()));
        assert!(!lines.iter().any(|l| l.contains("color: red")));
    }

    #[test]
    fn plain_text_has_no_elements() {
        let page = Page::parse("Job Title: Nurse\u{c}Company: General Hospital\n\n");
        assert!(!page.is_markup());
        assert_eq!(
            page.text_lines(),
            vec!["Job Title: Nurse".to_string(), "Company: General Hospital".to_string()]
        );
        assert!(page.headings().is_empty());
    }

    #[test]
    fn descriptor_reads_attributes() {
        let page = Page::parse(SAMPLE);
        assert_eq!(
            page.select_values(r#"meta[property="og:site_name"]@content"#)
                .unwrap(),
            vec!["Acme".to_string()]
        );
        assert_eq!(page.select_values("div.company").unwrap(), vec!["Acme Inc"]);
        assert!(matches!(
            page.select_values("div[[["),
            Err(StrategyError::InvalidSelector(_))
        ));
    }
}
