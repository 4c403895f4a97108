//! Heuristic per-field validation.
//!
//! Two rules run for every `(field, value)` pair:
//!
//! | Rule | Score |
//! |------|-------|
//! | `length` | `1.0` inside the field's ideal band, falling off linearly outside it; `0` for empty |
//! | `content_quality` | starts at `0.5`, boosted by field-appropriate vocabulary, penalized by placeholder words and markup residue |
//!
//! A rule passes when its score is strictly above the pass mark (`0.5` by
//! default). Validation is pure and deterministic.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{clamp_unit, Field, ValidationResult, ValidationRule};

static ROLE_NOUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(engineer|developer|manager|analyst|designer|scientist|architect|consultant|specialist|coordinator|director|administrator|assistant|associate|technician|officer|representative|intern|nurse|accountant|writer|editor|recruiter|programmer|sre|devops|teacher|operator|supervisor|executive|advisor|strategist|researcher|lead|head|marketer|agent|clerk|driver|therapist|pharmacist|physician|counsel|attorney|planner|tester)s?\b",
    )
    .unwrap()
});

static SENIORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(senior|sr|junior|jr|staff|principal|lead|chief|vp|vice president|entry[- ]level|mid[- ]level|i{1,3}|iv)\b\.?").unwrap()
});

static LEGAL_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(inc|llc|ltd|corp|corporation|co|gmbh|plc|llp|limited|group|holdings|technologies|labs|sa|ag|bv|pty|company|partners|systems|solutions)\b\.?$",
    )
    .unwrap()
});

static CITY_REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][\p{L} .'\-]+,\s*(?:[A-Z]{2}\b|[A-Z][\p{L} ]+)").unwrap()
});

static WORK_MODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(remote|hybrid|on-?site|anywhere)\b").unwrap());

static DESCRIPTION_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(responsibilit(y|ies)|requirements?|experience|qualifications?|benefits|skills|team|you will|role)\b").unwrap()
});

static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?](\s|$)").unwrap());

static CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[$€£¥]|\b(usd|eur|gbp|cad|aud)\b").unwrap());

static PAY_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d\s*k\b|per (year|hour|annum|month)|/\s*(yr|year|hr|hour)|annually|hourly)").unwrap()
});

static PLACEHOLDER_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(unknown|n/a|lorem ipsum|tbd|untitled|placeholder|not specified|undefined|null)\b").unwrap()
});

static POSITION_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bposition\b").unwrap());

static MARKUP_RESIDUE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[<>{}]").unwrap());

static EMBEDDED_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)([\w.+-]+@[\w-]+\.\w+|https?://|www\.)").unwrap());

/// Literal values that indicate extraction found no real content.
const PLACEHOLDER_LITERALS: &[&str] = &[
    "unknown",
    "unknown position",
    "unknown title",
    "unknown company",
    "unknown employer",
    "unknown location",
    "n/a",
    "na",
    "none",
    "null",
    "undefined",
    "tbd",
    "untitled",
    "position",
    "job",
    "job title",
    "title",
    "company",
    "company name",
    "employer",
    "location",
    "careers",
    "jobs",
    "home",
    "job details",
    "job description",
    "apply now",
    "not specified",
    "lorem ipsum",
];

/// Ideal length band `(min, max)` in characters.
fn ideal_band(field: Field) -> (usize, usize) {
    match field {
        Field::Title => (10, 100),
        Field::Company => (2, 80),
        Field::Location => (2, 100),
        Field::Description => (50, 20_000),
        Field::Salary => (3, 60),
    }
}

/// Scores candidate field values.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    pass_mark: f64,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl FieldValidator {
    pub fn new(pass_mark: f64) -> Self {
        Self {
            pass_mark: clamp_unit(pass_mark),
        }
    }

    /// Apply every rule to one value.
    pub fn validate(&self, field: Field, value: &str) -> Vec<ValidationResult> {
        let value = value.trim();
        let length = length_score(field, value);
        let content = if value.is_empty() {
            0.0
        } else {
            content_score(field, value)
        };
        let (min, max) = ideal_band(field);
        vec![
            ValidationResult {
                field,
                rule: ValidationRule::Length,
                passed: length > self.pass_mark,
                score: length,
                message: format!(
                    "{} chars, ideal {}-{}",
                    value.chars().count(),
                    min,
                    max
                ),
            },
            ValidationResult {
                field,
                rule: ValidationRule::ContentQuality,
                passed: content > self.pass_mark,
                score: content,
                message: content_message(field, value, content),
            },
        ]
    }

    /// Mean rule score for one value.
    pub fn score(&self, field: Field, value: &str) -> f64 {
        mean_score(&self.validate(field, value))
    }

    pub fn passes(&self, field: Field, value: &str) -> bool {
        self.validate(field, value).iter().all(|r| r.passed)
    }

    /// Whether a value is generic boilerplate rather than real content.
    pub fn is_placeholder(&self, value: &str) -> bool {
        is_placeholder(value)
    }
}

pub fn mean_score(results: &[ValidationResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    clamp_unit(results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64)
}

pub fn is_placeholder(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    if normalized.is_empty() {
        return true;
    }
    if !normalized.chars().any(char::is_alphabetic) {
        return true;
    }
    PLACEHOLDER_LITERALS.contains(&normalized.as_str())
        || normalized.starts_with("unknown ")
        || normalized.contains("lorem ipsum")
}

/// Whether the value matches role vocabulary used for job titles.
pub fn has_role_noun(value: &str) -> bool {
    ROLE_NOUNS.is_match(value)
}

fn length_score(field: Field, value: &str) -> f64 {
    let len = value.chars().count();
    if len == 0 {
        return 0.0;
    }
    let (min, max) = ideal_band(field);
    if len < min {
        len as f64 / min as f64
    } else if len > max {
        clamp_unit(1.0 - (len - max) as f64 / max as f64)
    } else {
        1.0
    }
}

fn content_score(field: Field, value: &str) -> f64 {
    let mut score = 0.5;
    match field {
        Field::Title => {
            if ROLE_NOUNS.is_match(value) {
                score += 0.3;
            }
            if SENIORITY.is_match(value) {
                score += 0.1;
            }
        }
        Field::Company => {
            if LEGAL_SUFFIX.is_match(value) {
                score += 0.3;
            }
            if value.chars().next().is_some_and(char::is_uppercase) {
                score += 0.1;
            }
        }
        Field::Location => {
            if CITY_REGION.is_match(value) || WORK_MODE.is_match(value) {
                score += 0.3;
            }
        }
        Field::Description => {
            if SENTENCE_BREAK.find_iter(value).count() >= 2 {
                score += 0.2;
            }
            if DESCRIPTION_KEYWORDS.is_match(value) {
                score += 0.2;
            }
        }
        Field::Salary => {
            if CURRENCY.is_match(value) {
                score += 0.3;
            }
            if PAY_PERIOD.is_match(value) {
                score += 0.1;
            }
        }
    }

    if PLACEHOLDER_WORDS.is_match(value) {
        score -= 0.4;
    }
    if POSITION_WORD.is_match(value) {
        score -= 0.2;
    }
    if MARKUP_RESIDUE.is_match(value) {
        score -= 0.3;
    }
    if EMBEDDED_ADDRESS.is_match(value) {
        score -= 0.2;
    }
    if field != Field::Salary && mostly_digits(value) {
        score -= 0.3;
    }
    clamp_unit(score)
}

fn mostly_digits(value: &str) -> bool {
    let alnum = value.chars().filter(|c| c.is_alphanumeric()).count();
    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    alnum > 0 && digits * 2 > alnum
}

fn content_message(field: Field, value: &str, score: f64) -> String {
    if value.is_empty() {
        return "empty value".to_string();
    }
    if is_placeholder(value) {
        return format!("{} looks like a placeholder", field);
    }
    if MARKUP_RESIDUE.is_match(value) {
        return "contains markup residue".to_string();
    }
    format!("content score {:.2}", score)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(results: &[ValidationResult], rule: ValidationRule) -> &ValidationResult {
        results.iter().find(|r| r.rule == rule).unwrap()
    }

    #[test]
    fn empty_value_scores_zero() {
        let v = FieldValidator::default();
        let results = v.validate(Field::Title, "   ");
        assert_eq!(rule(&results, ValidationRule::Length).score, 0.0);
        assert!(results.iter().all(|r| !r.passed));
    }

    #[test]
    fn role_nouns_and_seniority_boost_titles() {
        let v = FieldValidator::default();
        let strong = v.score(Field::Title, "Senior Backend Engineer");
        let weak = v.score(Field::Title, "Opportunity at our office");
        assert!(strong > weak);
        assert!(v.passes(Field::Title, "Senior Backend Engineer"));
    }

    #[test]
    fn legal_suffix_boosts_company() {
        let v = FieldValidator::default();
        let results = v.validate(Field::Company, "Acme Corp");
        assert!((rule(&results, ValidationRule::ContentQuality).score - 0.9).abs() < 1e-9);
    }

    #[test]
    fn placeholder_vocabulary_is_penalized() {
        let v = FieldValidator::default();
        let results = v.validate(Field::Title, "Unknown Position");
        let content = rule(&results, ValidationRule::ContentQuality);
        assert!(!content.passed);
        assert!(content.message.contains("placeholder"));
    }

    #[test]
    fn markup_residue_is_penalized() {
        let v = FieldValidator::default();
        let clean = v.score(Field::Company, "Globex");
        let dirty = v.score(Field::Company, "<span>Globex");
        assert!(dirty < clean);
    }

    #[test]
    fn length_band_falls_off_outside() {
        assert_eq!(length_score(Field::Title, "Engineer"), 0.8);
        assert_eq!(length_score(Field::Title, "Platform Engineer"), 1.0);
        assert_eq!(length_score(Field::Salary, &"9".repeat(200)), 0.0);
    }

    #[test]
    fn detects_placeholders() {
        assert!(is_placeholder("Unknown Position"));
        assert!(is_placeholder("unknown company"));
        assert!(is_placeholder("- 309308"));
        assert!(is_placeholder("N/A"));
        assert!(!is_placeholder("Deloitte"));
        assert!(!is_placeholder("Positional Audio Engineer"));
    }

    #[test]
    fn validation_is_deterministic() {
        let v = FieldValidator::default();
        assert_eq!(
            v.validate(Field::Location, "Austin, TX"),
            v.validate(Field::Location, "Austin, TX")
        );
    }
}
