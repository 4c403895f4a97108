//! Advisory blending of an external cross-validator's assessment.
//!
//! The core never hands its confidence over to an outside opinion. An
//! external confidence is folded in as a weighted average
//! (`core × core_weight + external × external_weight`), and a differing
//! external value is adopted only where the core result is weak.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::confidence::Scorer;
use crate::config::{BlendWeights, Tuning};
use crate::models::{clamp_unit, ExtractedField, ExtractionResult, Field, Narrative, QualityVerdict};
use crate::validate::is_placeholder;

/// Compact view of a result sent to the cross-validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSnippet {
    pub address: String,
    pub fields: BTreeMap<Field, SnippetField>,
    pub overall_confidence: f64,
    pub verdict: QualityVerdict,
    /// Leading part of the description, enough for a qualitative read.
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnippetField {
    pub value: Option<String>,
    pub confidence: f64,
}

const EXCERPT_CHARS: usize = 1500;

impl ValidationSnippet {
    pub fn from_result(result: &ExtractionResult) -> Self {
        let fields = result
            .fields
            .iter()
            .filter(|(field, _)| *field != Field::Description)
            .map(|(field, f)| {
                (
                    field,
                    SnippetField {
                        value: f.value().map(str::to_string),
                        confidence: f.confidence,
                    },
                )
            })
            .collect();
        let excerpt = result
            .value(Field::Description)
            .map(|d| d.chars().take(EXCERPT_CHARS).collect());
        Self {
            address: result.address.clone(),
            fields,
            overall_confidence: result.overall_confidence,
            verdict: result.verdict(),
            excerpt,
        }
    }
}

/// One field as judged by the cross-validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalField {
    #[serde(default)]
    pub value: Option<String>,
    pub confidence: f64,
}

/// What the cross-validator returned.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExternalAssessment {
    #[serde(default)]
    pub fields: BTreeMap<Field, ExternalField>,
    #[serde(default)]
    pub narrative: Option<Narrative>,
}

/// Weighted average of a core and an external confidence.
///
/// Weights are renormalized; if both are zero the core confidence stands.
pub fn blend_confidence(core: f64, external: f64, weights: &BlendWeights) -> f64 {
    let total = weights.core + weights.external;
    if total <= 0.0 {
        return clamp_unit(core);
    }
    clamp_unit((clamp_unit(core) * weights.core + clamp_unit(external) * weights.external) / total)
}

fn same_value(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Fold an external assessment into a result.
///
/// For each assessed field:
///
/// | Core value | External value | Outcome |
/// |------------|----------------|---------|
/// | any | absent | confidence blended, value kept |
/// | equal | equal | confidence blended |
/// | missing, placeholder, or result not VALID | different | external value adopted at the blended confidence |
/// | good, result VALID | different | core kept, disagreement recorded as a warning |
///
/// Overall confidence, the verdict and validations are recomputed.
pub fn apply_assessment(
    result: &ExtractionResult,
    assessment: &ExternalAssessment,
    tuning: &Tuning,
) -> ExtractionResult {
    let scorer = Scorer::new(tuning);
    let weights = &tuning.blend;
    let valid = result.verdict() == QualityVerdict::Valid;
    let mut out = result.clone();

    for (&field, external) in &assessment.fields {
        let core = result.field(field);
        let blended = blend_confidence(core.confidence, external.confidence, weights);
        let proposed = external
            .value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty());

        match (core.value(), proposed) {
            (Some(_), None) => {
                out.fields.set(field, core.with_confidence(blended));
            }
            (None, None) => {}
            (Some(mine), Some(theirs)) if same_value(mine, theirs) => {
                out.fields.set(field, core.with_confidence(blended));
            }
            (mine, Some(theirs)) => {
                let weak = mine.map_or(true, is_placeholder) || !valid;
                if weak && !is_placeholder(theirs) {
                    tracing::info!(field = %field, value = %theirs, "adopted cross-validated value");
                    out.fields.set(field, ExtractedField::new(theirs, blended));
                } else {
                    out.diagnostics.warnings.push(format!(
                        "cross-validation disagrees on {field}: '{}' vs '{theirs}'",
                        mine.unwrap_or("")
                    ));
                }
            }
        }
    }

    out.overall_confidence = scorer.overall(&out.fields);
    out.diagnostics.verdict = scorer.judge(&out.fields, out.overall_confidence);
    out.diagnostics.validations = scorer.validations_for(&out.fields);
    if let Some(narrative) = &assessment.narrative {
        out.diagnostics.narrative = Some(narrative.clone());
    }
    out
}
