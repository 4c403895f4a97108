//! Core data models used throughout the extraction pipeline.
//!
//! Results are values: every pipeline stage that changes a result returns
//! a new [`ExtractionResult`] instead of editing the one it was given.
//! Corrections are append-only; learned and discovered patterns only ever
//! gain usage and confidence.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::source::{PlatformFamily, SourceKind};

/// Clamp a confidence into `[0, 1]`, mapping NaN to `0`.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Fields
// ═══════════════════════════════════════════════════════════════════════

/// A semantic field of a job posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Title,
    Company,
    Location,
    Description,
    Salary,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Title,
        Field::Company,
        Field::Location,
        Field::Description,
        Field::Salary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Company => "company",
            Field::Location => "location",
            Field::Description => "description",
            Field::Salary => "salary",
        }
    }

    /// Title and company always count toward overall confidence, even
    /// when missing.
    pub fn is_core(&self) -> bool {
        matches!(self, Field::Title | Field::Company)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" | "job_title" => Ok(Field::Title),
            "company" => Ok(Field::Company),
            "location" => Ok(Field::Location),
            "description" => Ok(Field::Description),
            "salary" => Ok(Field::Salary),
            other => Err(format!("unknown field: '{}'", other)),
        }
    }
}

/// One extracted value with its confidence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: Option<String>,
    pub confidence: f64,
}

impl ExtractedField {
    /// Build a field from a raw value. Whitespace is collapsed; an empty
    /// value becomes a missing field with zero confidence.
    pub fn new(value: impl AsRef<str>, confidence: f64) -> Self {
        let cleaned = collapse_whitespace(value.as_ref());
        if cleaned.is_empty() {
            return Self::missing();
        }
        Self {
            value: Some(cleaned),
            confidence: clamp_unit(confidence),
        }
    }

    pub fn missing() -> Self {
        Self {
            value: None,
            confidence: 0.0,
        }
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn with_confidence(&self, confidence: f64) -> Self {
        Self {
            value: self.value.clone(),
            confidence: if self.value.is_some() {
                clamp_unit(confidence)
            } else {
                0.0
            },
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The full set of semantic fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldSet {
    pub title: ExtractedField,
    pub company: ExtractedField,
    pub location: ExtractedField,
    pub description: ExtractedField,
    pub salary: ExtractedField,
}

impl FieldSet {
    pub fn get(&self, field: Field) -> &ExtractedField {
        match field {
            Field::Title => &self.title,
            Field::Company => &self.company,
            Field::Location => &self.location,
            Field::Description => &self.description,
            Field::Salary => &self.salary,
        }
    }

    pub fn set(&mut self, field: Field, value: ExtractedField) {
        match field {
            Field::Title => self.title = value,
            Field::Company => self.company = value,
            Field::Location => self.location = value,
            Field::Description => self.description = value,
            Field::Salary => self.salary = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &ExtractedField)> {
        Field::ALL.into_iter().map(move |f| (f, self.get(f)))
    }

    pub fn present_count(&self) -> usize {
        self.iter().filter(|(_, v)| v.is_present()).count()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Methods, verdicts, validation
// ═══════════════════════════════════════════════════════════════════════

/// How a value (or a whole result) was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    StructuredData,
    Selector,
    TextPattern,
    DomainFallback,
    LearnedPattern,
    Discovery,
    SimilarPosting,
    None,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::StructuredData => "structured_data",
            ExtractionMethod::Selector => "selector",
            ExtractionMethod::TextPattern => "text_pattern",
            ExtractionMethod::DomainFallback => "domain_fallback",
            ExtractionMethod::LearnedPattern => "learned_pattern",
            ExtractionMethod::Discovery => "discovery",
            ExtractionMethod::SimilarPosting => "similar_posting",
            ExtractionMethod::None => "none",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete classification of a result's quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityVerdict {
    Valid,
    Placeholder,
    FailedExtraction,
    LowQuality,
}

impl fmt::Display for QualityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QualityVerdict::Valid => "VALID",
            QualityVerdict::Placeholder => "PLACEHOLDER",
            QualityVerdict::FailedExtraction => "FAILED_EXTRACTION",
            QualityVerdict::LowQuality => "LOW_QUALITY",
        };
        f.write_str(s)
    }
}

/// Validation rule identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    Length,
    ContentQuality,
}

/// Outcome of one rule applied to one field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub field: Field,
    pub rule: ValidationRule,
    pub passed: bool,
    pub score: f64,
    pub message: String,
}

// ═══════════════════════════════════════════════════════════════════════
// Extraction results
// ═══════════════════════════════════════════════════════════════════════

/// Output of a single strategy: seed confidences, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialResult {
    pub fields: FieldSet,
    pub method: ExtractionMethod,
}

impl PartialResult {
    pub fn empty(method: ExtractionMethod) -> Self {
        Self {
            fields: FieldSet::default(),
            method,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.present_count() == 0
    }
}

/// Metadata derived from the raw markup.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageMetadata {
    pub page_title: Option<String>,
    pub meta_tags: BTreeMap<String, String>,
    /// First JobPosting structured-data block found, if any.
    pub structured_data: Option<serde_json::Value>,
    pub structured_blocks: usize,
    pub malformed_blocks: usize,
    pub family: PlatformFamily,
    pub source_kind: SourceKind,
    /// SHA-256 of the raw markup.
    pub fingerprint: String,
}

/// A human-readable record of one learned-pattern substitution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub field: Field,
    pub pattern_id: String,
    pub before: String,
    pub after: String,
    /// Confidence of the pattern that made the change.
    pub confidence: f64,
    pub description: String,
}

/// Qualitative assessment attached by an external cross-validator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Narrative {
    pub summary: Option<String>,
    pub risk_factors: Vec<String>,
    pub legitimacy_indicators: Vec<String>,
}

/// Pipeline diagnostics carried by every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub verdict: QualityVerdict,
    pub fallback_used: bool,
    pub applied_patterns: Vec<AppliedChange>,
    pub discovered_fields: Vec<Field>,
    pub validations: Vec<ValidationResult>,
    pub warnings: Vec<String>,
    pub narrative: Option<Narrative>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            verdict: QualityVerdict::FailedExtraction,
            fallback_used: false,
            applied_patterns: Vec::new(),
            discovered_fields: Vec::new(),
            validations: Vec::new(),
            warnings: Vec::new(),
            narrative: None,
        }
    }
}

/// The structured, confidence-scored outcome of one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub address: String,
    pub fields: FieldSet,
    pub overall_confidence: f64,
    /// Name of the extractor that produced the fields.
    pub extractor: String,
    /// Strategy that produced the winning partial result.
    pub method: ExtractionMethod,
    pub extracted_at: DateTime<Utc>,
    pub metadata: PageMetadata,
    pub diagnostics: Diagnostics,
}

impl ExtractionResult {
    pub fn field(&self, field: Field) -> &ExtractedField {
        self.fields.get(field)
    }

    pub fn value(&self, field: Field) -> Option<&str> {
        self.fields.get(field).value()
    }

    pub fn confidence(&self, field: Field) -> f64 {
        self.fields.get(field).confidence
    }

    pub fn verdict(&self) -> QualityVerdict {
        self.diagnostics.verdict
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Learning records
// ═══════════════════════════════════════════════════════════════════════

/// Where a correction came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionOrigin {
    HumanFeedback,
    AutomaticDiscovery,
    CrossFamilyPropagation,
    /// Learned from a similar posting.
    SimilarPosting,
}

impl CorrectionOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionOrigin::HumanFeedback => "human_feedback",
            CorrectionOrigin::AutomaticDiscovery => "automatic_discovery",
            CorrectionOrigin::CrossFamilyPropagation => "cross_family_propagation",
            CorrectionOrigin::SimilarPosting => "similar_posting",
        }
    }

    pub fn is_automatic(&self) -> bool {
        !matches!(self, CorrectionOrigin::HumanFeedback)
    }
}

impl fmt::Display for CorrectionOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A judgement that an extracted value was wrong, and what it should be.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub id: Uuid,
    pub source_address: String,
    pub field: Field,
    pub original_value: Option<String>,
    pub corrected_value: String,
    pub extractor_used: String,
    pub confidence: f64,
    pub origin: CorrectionOrigin,
    pub recorded_at: DateTime<Utc>,
}

impl Correction {
    /// Default confidence for human feedback.
    pub const HUMAN_CONFIDENCE: f64 = 0.8;

    pub fn new(
        source_address: impl Into<String>,
        field: Field,
        original_value: Option<String>,
        corrected_value: impl Into<String>,
        extractor_used: impl Into<String>,
        confidence: f64,
        origin: CorrectionOrigin,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_address: source_address.into(),
            field,
            original_value,
            corrected_value: corrected_value.into(),
            extractor_used: extractor_used.into(),
            confidence: clamp_unit(confidence),
            origin,
            recorded_at: Utc::now(),
        }
    }

    /// A correction submitted by a person.
    pub fn human(
        source_address: impl Into<String>,
        field: Field,
        original_value: Option<&str>,
        corrected_value: impl Into<String>,
    ) -> Self {
        Self::new(
            source_address,
            field,
            original_value.map(str::to_string),
            corrected_value,
            "",
            Self::HUMAN_CONFIDENCE,
            CorrectionOrigin::HumanFeedback,
        )
    }
}

/// Sources a learned pattern applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum PatternScope {
    /// Applies everywhere. Used when the source address had no domain.
    Global,
    Domain(String),
    Family(PlatformFamily),
}

impl fmt::Display for PatternScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternScope::Global => f.write_str("global"),
            PatternScope::Domain(d) => write!(f, "domain:{}", d),
            PatternScope::Family(fam) => write!(f, "family:{}", fam),
        }
    }
}

/// A symbolic substitution rule derived from one or more corrections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub id: String,
    pub field: Field,
    /// Regex-escaped literal of the original value.
    pub match_pattern: String,
    pub replacement: String,
    pub confidence: f64,
    pub usage_count: u32,
    pub scope: PatternScope,
    /// When set, the pattern only applies to results from this extractor.
    pub scope_extractor: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What kind of markup location a discovered pattern points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryKind {
    StructuredData,
    Selector,
    TextPattern,
    Attribute,
}

impl DiscoveryKind {
    /// Trust multiplier for candidates found this way.
    pub fn weight(&self) -> f64 {
        match self {
            DiscoveryKind::StructuredData => 1.0,
            DiscoveryKind::Attribute => 0.9,
            DiscoveryKind::Selector => 0.85,
            DiscoveryKind::TextPattern => 0.8,
        }
    }

    /// Kinds whose descriptor is a CSS selector usable to seed strategies.
    pub fn is_selectable(&self) -> bool {
        matches!(self, DiscoveryKind::Selector | DiscoveryKind::Attribute)
    }
}

/// Where to look for a field on a given domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredPattern {
    pub id: String,
    pub kind: DiscoveryKind,
    pub domain: Option<String>,
    pub family: PlatformFamily,
    pub field: Field,
    /// CSS selector (optionally `selector@attribute`), JSON path, or
    /// heading level, depending on `kind`.
    pub descriptor: String,
    pub confidence: f64,
    pub hits: u32,
    pub examples: Vec<String>,
    pub discovered_at: DateTime<Utc>,
}

/// A discovered pattern offered to strategies as a starting point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedHint {
    pub field: Field,
    pub kind: DiscoveryKind,
    pub descriptor: String,
    pub confidence: f64,
    /// True when inherited from a sibling domain of the same family.
    pub inherited: bool,
}
