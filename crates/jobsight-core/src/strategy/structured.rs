//! Schema.org `JobPosting` blocks embedded as JSON-LD.

use scraper::Html;
use serde_json::Value;

use crate::error::StrategyError;
use crate::models::{collapse_whitespace, ExtractedField, ExtractionMethod, FieldSet, PartialResult};

use super::{Strategy, StrategyContext};

/// Purpose-built metadata is the most trusted source.
pub const STRUCTURED_SEED: f64 = 0.95;

pub struct StructuredDataStrategy;

impl StructuredDataStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StructuredDataStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl Strategy for StructuredDataStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::StructuredData
    }

    fn priority(&self) -> u8 {
        0
    }

    fn extract(&self, ctx: &StrategyContext<'_>) -> Result<PartialResult, StrategyError> {
        let posting = ctx.page.job_posting().ok_or(StrategyError::NoCandidates)?;
        Ok(PartialResult {
            fields: read_job_posting(posting, STRUCTURED_SEED),
            method: ExtractionMethod::StructuredData,
        })
    }
}

/// Read every field a `JobPosting` object carries.
pub fn read_job_posting(posting: &Value, seed: f64) -> FieldSet {
    let field = |v: Option<String>| match v {
        Some(v) => ExtractedField::new(v, seed),
        None => ExtractedField::missing(),
    };
    FieldSet {
        title: field(text(posting.get("title")).or_else(|| text(posting.get("name")))),
        company: field(organization_name(posting.get("hiringOrganization"))),
        location: field(location(posting)),
        description: field(text(posting.get("description")).map(|d| strip_markup(&d))),
        salary: field(salary(posting.get("baseSalary"))),
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let s = collapse_whitespace(s);
            (!s.is_empty()).then_some(s)
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn organization_name(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(_) => text(value),
        Value::Array(items) => items.iter().find_map(|i| organization_name(Some(i))),
        obj @ Value::Object(_) => text(obj.get("name")).or_else(|| text(obj.get("legalName"))),
        _ => None,
    }
}

fn location(posting: &Value) -> Option<String> {
    let from_places = match posting.get("jobLocation") {
        Some(Value::Array(places)) => {
            let names: Vec<String> = places.iter().filter_map(place).collect();
            (!names.is_empty()).then(|| names.join("; "))
        }
        Some(p) => place(p),
        None => None,
    };
    from_places.or_else(|| {
        let remote = posting
            .get("jobLocationType")
            .and_then(Value::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case("TELECOMMUTE"));
        remote.then(|| "Remote".to_string())
    })
}

fn place(value: &Value) -> Option<String> {
    match value {
        Value::String(_) => text(Some(value)),
        Value::Object(_) => {
            let address = value.get("address")?;
            if address.is_string() {
                return text(Some(address));
            }
            let parts: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
                .iter()
                .filter_map(|k| match address.get(*k) {
                    Some(country @ Value::Object(_)) => text(country.get("name")),
                    other => text(other),
                })
                .collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}

fn salary(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if value.is_string() || value.is_number() {
        return text(Some(value));
    }
    let currency = text(value.get("currency"));
    let amount = value.get("value")?;
    let (range, unit) = match amount {
        Value::Object(_) => {
            let min = text(amount.get("minValue"));
            let max = text(amount.get("maxValue"));
            let single = text(amount.get("value"));
            let range = match (min, max) {
                (Some(min), Some(max)) => Some(format!("{}-{}", min, max)),
                (Some(v), None) | (None, Some(v)) => Some(v),
                (None, None) => single,
            };
            (range, text(amount.get("unitText")))
        }
        other => (text(Some(other)), None),
    };
    let mut out = String::new();
    if let Some(c) = currency {
        out.push_str(&c);
        out.push(' ');
    }
    out.push_str(&range?);
    if let Some(unit) = unit {
        out.push_str(" per ");
        out.push_str(&unit.to_lowercase());
    }
    Some(out)
}

/// Descriptions are frequently HTML-encoded inside the JSON.
fn strip_markup(text: &str) -> String {
    if !text.contains('<') {
        return text.to_string();
    }
    let fragment = Html::parse_fragment(text);
    collapse_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use crate::source::PlatformFamily;

    fn run(markup: &str) -> Result<PartialResult, StrategyError> {
        let page = Page::parse(markup);
        let ctx = StrategyContext {
            address: "https://example.com/job/1",
            page: &page,
            family: PlatformFamily::Generic,
            seeds: &[],
        };
        StructuredDataStrategy::new().extract(&ctx)
    }

    #[test]
    fn reads_full_posting() {
        let markup = r#"<script type="application/ld+json">{
            "@type": "JobPosting",
            "title": "Senior Backend Engineer",
            "hiringOrganization": {"@type": "Organization", "name": "Acme Corp"},
            "jobLocation": {"@type": "Place", "address": {
                "addressLocality": "Austin", "addressRegion": "TX"}},
            "description": "<p>Build <b>APIs</b>.</p>",
            "baseSalary": {"currency": "USD", "value": {
                "minValue": 150000, "maxValue": 180000, "unitText": "YEAR"}}
        }</script>"#;
        let partial = run(markup).unwrap();
        let f = &partial.fields;
        assert_eq!(f.title.value(), Some("Senior Backend Engineer"));
        assert_eq!(f.company.value(), Some("Acme Corp"));
        assert_eq!(f.location.value(), Some("Austin, TX"));
        assert_eq!(f.description.value(), Some("Build APIs ."));
        assert_eq!(f.salary.value(), Some("USD 150000-180000 per year"));
        assert_eq!(f.title.confidence, STRUCTURED_SEED);
    }

    #[test]
    fn telecommute_becomes_remote() {
        let markup = r#"<script type="application/ld+json">
            {"@type": "JobPosting", "title": "Writer", "jobLocationType": "TELECOMMUTE",
             "hiringOrganization": "Initech"}</script>"#;
        let partial = run(markup).unwrap();
        assert_eq!(partial.fields.location.value(), Some("Remote"));
        assert_eq!(partial.fields.company.value(), Some("Initech"));
    }

    #[test]
    fn no_posting_is_no_candidates() {
        assert!(matches!(
            run("<p>hello</p>"),
            Err(StrategyError::NoCandidates)
        ));
    }
}
