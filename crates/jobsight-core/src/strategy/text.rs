//! Free-text heuristics: headings, labelled lines, page and social titles.
//!
//! This is the last resort and the least trusted strategy. It is also the
//! only one that works on plain text produced from documents.

use std::sync::LazyLock;

use regex::Regex;

use crate::confidence::compose;
use crate::error::StrategyError;
use crate::models::{ExtractedField, ExtractionMethod, Field, FieldSet, PartialResult};
use crate::source::strip_title_branding;
use crate::validate::{has_role_noun, is_placeholder, FieldValidator};

use super::{Strategy, StrategyContext};

const HEADING_SEED: f64 = 0.7;
const LABEL_SEED: f64 = 0.7;
const OTHER_HEADING_SEED: f64 = 0.6;
const SOCIAL_TITLE_SEED: f64 = 0.65;
const PAGE_TITLE_SEED: f64 = 0.6;
const COMPANY_SEED: f64 = 0.6;
const TITLE_SUFFIX_COMPANY_SEED: f64 = 0.55;
const LOCATION_LABEL_SEED: f64 = 0.55;
const LOCATION_SHAPE_SEED: f64 = 0.5;
const DESCRIPTION_SEED: f64 = 0.5;
const SALARY_SEED: f64 = 0.5;

/// Longest heading or label value still plausible as a title.
const MAX_TITLE_CHARS: usize = 120;

static HIRING_LEAD_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:we(?:'|’)re|we are|now|currently)\s+hiring|join (?:us|our team) as|apply now)\s*(?:an?\s+)?[:\-–—!]?\s*",
    )
    .unwrap()
});

static TITLE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:job title|position title|job|position|role|title)\s*[:\-–—]\s*(.{2,})$")
        .unwrap()
});

static COMPANY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:company name|hiring company|company|employer|organi[sz]ation)\s*[:\-–—]\s*(.{2,})$")
        .unwrap()
});

static LOCATION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:job location|work location|location|based in|office)\s*[:\-–—]\s*(.{2,})$")
        .unwrap()
});

static SALARY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:salary range|salary|compensation|pay range|pay)\s*[:\-–—]\s*(.{2,})$")
        .unwrap()
});

static CITY_REGION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][\p{L}.'\-]+(?: [A-Z][\p{L}.'\-]+)*,\s*(?:[A-Z]{2}|[A-Z][\p{L}]+)(?:,\s*[A-Z][\p{L} ]+)?$")
        .unwrap()
});

static TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(?:[|\-–—·]|at)\s+").unwrap());

static CAREERS_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s+(?:careers?|jobs?|hiring)$").unwrap());

static SALARY_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[$€£]\s?\d[\d,.]*\s*[kK]?(?:\s*[-–]\s*[$€£]?\s?\d[\d,.]*\s*[kK]?)?").unwrap());

/// Remove "We're hiring:" style lead-ins from a heading.
pub fn strip_hiring_lead_in(text: &str) -> String {
    HIRING_LEAD_IN.replace(text, "").trim().to_string()
}

pub struct TextPatternStrategy {
    validator: FieldValidator,
}

impl TextPatternStrategy {
    pub fn new() -> Self {
        Self {
            validator: FieldValidator::default(),
        }
    }

    /// Pick the candidate whose seed and validation combine best.
    fn best(&self, field: Field, candidates: Vec<(String, f64)>) -> ExtractedField {
        candidates
            .into_iter()
            .filter(|(v, _)| !v.is_empty() && !is_placeholder(v))
            .map(|(v, seed)| {
                let rank = compose(seed, &self.validator.validate(field, &v));
                (v, seed, rank)
            })
            .max_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(v, seed, _)| ExtractedField::new(v, seed))
            .unwrap_or_else(ExtractedField::missing)
    }
}

impl Default for TextPatternStrategy {
    fn default() -> Self {
        Self::new()
    }
}

fn capture(re: &Regex, line: &str) -> Option<String> {
    re.captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Split a page title like "Data Engineer | Acme Careers" into a title
/// part and a company part.
fn split_page_title(raw: &str) -> (Option<String>, Option<String>) {
    let cleaned = strip_title_branding(raw);
    let parts: Vec<&str> = TITLE_SEPARATOR
        .split(&cleaned)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        [] => (None, None),
        [only] => (Some(only.to_string()), None),
        [first, .., last] => {
            let title = parts
                .iter()
                .find(|p| has_role_noun(p))
                .unwrap_or(first)
                .to_string();
            let company = CAREERS_SUFFIX.replace(last, "").trim().to_string();
            let company = (company != title && !has_role_noun(&company)).then_some(company);
            (Some(title), company)
        }
    }
}

impl Strategy for TextPatternStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::TextPattern
    }

    fn priority(&self) -> u8 {
        20
    }

    fn extract(&self, ctx: &StrategyContext<'_>) -> Result<PartialResult, StrategyError> {
        let page = ctx.page;
        let lines = page.text_lines();

        let mut titles = Vec::new();
        let mut companies = Vec::new();
        let mut locations = Vec::new();
        let mut descriptions = Vec::new();
        let mut salaries = Vec::new();

        for (level, heading) in page.headings() {
            if level > 3 {
                continue;
            }
            let text = strip_hiring_lead_in(&heading);
            if text.chars().count() > MAX_TITLE_CHARS {
                continue;
            }
            if has_role_noun(&text) {
                titles.push((text, HEADING_SEED));
            } else if level == 1 {
                titles.push((text, OTHER_HEADING_SEED));
            }
        }

        for line in &lines {
            if let Some(v) = capture(&TITLE_LABEL, line) {
                if v.chars().count() <= MAX_TITLE_CHARS {
                    titles.push((v, LABEL_SEED));
                }
            } else if let Some(v) = capture(&COMPANY_LABEL, line) {
                companies.push((v, COMPANY_SEED));
            } else if let Some(v) = capture(&LOCATION_LABEL, line) {
                locations.push((v, LOCATION_LABEL_SEED));
            } else if let Some(v) = capture(&SALARY_LABEL, line) {
                salaries.push((v, SALARY_SEED));
            } else if HIRING_LEAD_IN.is_match(line) && !page.is_markup() {
                let v = strip_hiring_lead_in(line);
                if has_role_noun(&v) && v.chars().count() <= MAX_TITLE_CHARS {
                    titles.push((v, HEADING_SEED));
                }
            } else if line.chars().count() <= 60 && CITY_REGION_LINE.is_match(line) {
                locations.push((line.clone(), LOCATION_SHAPE_SEED));
            } else if line.chars().count() <= 80 && SALARY_SHAPE.is_match(line) {
                if let Some(m) = SALARY_SHAPE.find(line) {
                    salaries.push((m.as_str().to_string(), SALARY_SEED));
                }
            }
        }

        if !page.is_markup() {
            if let Some(first) = lines.first() {
                if has_role_noun(first) && first.chars().count() <= MAX_TITLE_CHARS {
                    titles.push((strip_hiring_lead_in(first), OTHER_HEADING_SEED));
                }
            }
        }

        if let Some(og) = page.meta("og:title") {
            let (title, company) = split_page_title(&og);
            if let Some(t) = title {
                titles.push((t, SOCIAL_TITLE_SEED));
            }
            if let Some(c) = company {
                companies.push((c, TITLE_SUFFIX_COMPANY_SEED));
            }
        }
        if let Some(raw) = page.title() {
            let (title, company) = split_page_title(&raw);
            if let Some(t) = title {
                titles.push((t, PAGE_TITLE_SEED));
            }
            if let Some(c) = company {
                companies.push((c, TITLE_SUFFIX_COMPANY_SEED));
            }
        }
        if let Some(site) = page.meta("og:site_name") {
            companies.push((site, COMPANY_SEED));
        }

        if let Some(longest) = lines
            .iter()
            .filter(|l| l.chars().count() >= 50)
            .max_by_key(|l| l.chars().count())
        {
            descriptions.push((longest.clone(), DESCRIPTION_SEED));
        }

        let fields = FieldSet {
            title: self.best(Field::Title, titles),
            company: self.best(Field::Company, companies),
            location: self.best(Field::Location, locations),
            description: self.best(Field::Description, descriptions),
            salary: self.best(Field::Salary, salaries),
        };
        let partial = PartialResult {
            fields,
            method: ExtractionMethod::TextPattern,
        };
        if partial.is_empty() {
            return Err(StrategyError::NoCandidates);
        }
        Ok(partial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;
    use crate::source::PlatformFamily;

    fn run(markup: &str) -> Result<PartialResult, StrategyError> {
        let page = Page::parse(markup);
        let ctx = StrategyContext {
            address: "https://careers.example.com/1",
            page: &page,
            family: PlatformFamily::Generic,
            seeds: &[],
        };
        TextPatternStrategy::new().extract(&ctx)
    }

    #[test]
    fn strips_hiring_lead_in() {
        assert_eq!(
            strip_hiring_lead_in("We're hiring: Site Reliability Engineer"),
            "Site Reliability Engineer"
        );
        assert_eq!(strip_hiring_lead_in("Now hiring a Barista"), "Barista");
        assert_eq!(strip_hiring_lead_in("Data Engineer"), "Data Engineer");
    }

    #[test]
    fn heading_with_role_noun_wins() {
        let partial = run(
            "<title>Careers</title><h1>We're hiring: Site Reliability Engineer</h1>",
        )
        .unwrap();
        assert_eq!(
            partial.fields.title.value(),
            Some("Site Reliability Engineer")
        );
        assert_eq!(partial.fields.title.confidence, HEADING_SEED);
    }

    #[test]
    fn labelled_lines_in_plain_text() {
        let text = "Job Title: Registered Nurse\nCompany: Mercy General Hospital\nLocation: Sacramento, CA\nSalary: $40 - $55 per hour";
        let partial = run(text).unwrap();
        let f = &partial.fields;
        assert_eq!(f.title.value(), Some("Registered Nurse"));
        assert_eq!(f.company.value(), Some("Mercy General Hospital"));
        assert_eq!(f.location.value(), Some("Sacramento, CA"));
        assert_eq!(f.salary.value(), Some("$40 - $55 per hour"));
    }

    #[test]
    fn page_title_splits_into_title_and_company() {
        assert_eq!(
            split_page_title("Data Engineer | Acme Careers"),
            (Some("Data Engineer".to_string()), Some("Acme".to_string()))
        );
        assert_eq!(
            split_page_title("Software Engineer at Stripe — LinkedIn"),
            (Some("Software Engineer".to_string()), Some("Stripe".to_string()))
        );
    }

    #[test]
    fn seeds_stay_in_text_band() {
        let partial = run(
            r#"<head><title>Backend Developer - Initech</title>
               <meta property="og:site_name" content="Initech"></head>
               <body><h2>Backend Developer</h2><p>Denver, CO</p></body>"#,
        )
        .unwrap();
        for (_, f) in partial.fields.iter() {
            if f.is_present() {
                assert!(f.confidence >= 0.5 && f.confidence <= 0.7);
            }
        }
        assert_eq!(partial.fields.company.value(), Some("Initech"));
        assert_eq!(partial.fields.location.value(), Some("Denver, CO"));
    }

    #[test]
    fn nothing_usable_is_no_candidates() {
        assert!(matches!(run("<div></div>"), Err(StrategyError::NoCandidates)));
    }
}
