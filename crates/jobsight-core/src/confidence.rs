//! Confidence composition and quality verdicts.
//!
//! Strategies emit *seed* confidences that encode how much the method
//! itself is trusted. The [`Scorer`] folds the validator's opinion of each
//! value into its seed:
//!
//! ```text
//! field = seed × (0.8 + 0.2 × mean(validation scores))
//! ```
//!
//! so a value can lose up to a fifth of its seed for looking wrong but can
//! never climb above the trust band of the strategy that found it.
//!
//! `overall_confidence` is a weighted average. Title and company always
//! take part (a missing one counts as `0`); the remaining fields take part
//! only when present, and the weights in use are renormalized. The result
//! is a convex combination of field confidences and stays in `[0, 1]`.

use crate::config::{FieldWeights, Tuning};
use crate::models::{clamp_unit, ExtractedField, Field, FieldSet, QualityVerdict, ValidationResult};
use crate::validate::{is_placeholder, mean_score, FieldValidator};

/// Share of the seed that is always kept regardless of validation.
const SEED_FLOOR: f64 = 0.8;

pub fn compose(seed: f64, validation: &[ValidationResult]) -> f64 {
    let seed = clamp_unit(seed);
    clamp_unit(seed * (SEED_FLOOR + (1.0 - SEED_FLOOR) * mean_score(validation)))
}

pub fn overall_confidence(fields: &FieldSet, weights: &FieldWeights) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for (field, value) in fields.iter() {
        if !field.is_core() && !value.is_present() {
            continue;
        }
        let w = weights.weight(field).max(0.0);
        weighted += w * clamp_unit(value.confidence);
        total += w;
    }
    if total <= f64::EPSILON {
        0.0
    } else {
        clamp_unit(weighted / total)
    }
}

/// Classify a set of scored fields.
pub fn judge(fields: &FieldSet, overall: f64, tuning: &Tuning) -> QualityVerdict {
    let title = fields.title.value();
    let company = fields.company.value();
    match (title, company) {
        (None, None) => return QualityVerdict::FailedExtraction,
        (Some(t), _) if is_placeholder(t) => return QualityVerdict::Placeholder,
        (_, Some(c)) if is_placeholder(c) => return QualityVerdict::Placeholder,
        (None, _) | (_, None) => return QualityVerdict::LowQuality,
        _ => {}
    }

    let q = &tuning.quality;
    let long_enough = |v: Option<&str>| v.is_some_and(|v| v.chars().count() >= q.min_length);
    let high_quality = overall >= q.min_overall
        && fields.title.confidence >= q.min_title
        && fields.company.confidence >= q.min_company
        && long_enough(title)
        && long_enough(company);

    if high_quality {
        QualityVerdict::Valid
    } else {
        QualityVerdict::LowQuality
    }
}

/// Output of scoring a seed field set.
#[derive(Debug, Clone)]
pub struct Scored {
    pub fields: FieldSet,
    pub validations: Vec<ValidationResult>,
    pub overall: f64,
}

/// Applies the validator to seed confidences.
#[derive(Debug, Clone)]
pub struct Scorer {
    validator: FieldValidator,
    tuning: Tuning,
}

impl Scorer {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            validator: FieldValidator::new(tuning.pass_mark),
            tuning: tuning.clone(),
        }
    }

    pub fn validator(&self) -> &FieldValidator {
        &self.validator
    }

    pub fn tuning(&self) -> &Tuning {
        &self.tuning
    }

    /// Compose one field's seed with its validation.
    pub fn score_field(&self, field: Field, seed: &ExtractedField) -> (ExtractedField, Vec<ValidationResult>) {
        match seed.value() {
            Some(value) => {
                let validation = self.validator.validate(field, value);
                let confidence = compose(seed.confidence, &validation);
                (seed.with_confidence(confidence), validation)
            }
            None => (ExtractedField::missing(), Vec::new()),
        }
    }

    /// Compose every field of a seed set.
    pub fn score(&self, seeds: &FieldSet) -> Scored {
        let mut fields = FieldSet::default();
        let mut validations = Vec::new();
        for (field, seed) in seeds.iter() {
            let (scored, mut results) = self.score_field(field, seed);
            fields.set(field, scored);
            validations.append(&mut results);
        }
        let overall = overall_confidence(&fields, &self.tuning.weights);
        Scored {
            fields,
            validations,
            overall,
        }
    }

    /// Validation results for already-scored fields, without changing
    /// their confidences.
    pub fn validations_for(&self, fields: &FieldSet) -> Vec<ValidationResult> {
        fields
            .iter()
            .filter_map(|(field, v)| v.value().map(|value| self.validator.validate(field, value)))
            .flatten()
            .collect()
    }

    pub fn overall(&self, fields: &FieldSet) -> f64 {
        overall_confidence(fields, &self.tuning.weights)
    }

    pub fn judge(&self, fields: &FieldSet, overall: f64) -> QualityVerdict {
        judge(fields, overall, &self.tuning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(title: Option<(&str, f64)>, company: Option<(&str, f64)>) -> FieldSet {
        let mut set = FieldSet::default();
        if let Some((v, c)) = title {
            set.title = ExtractedField::new(v, c);
        }
        if let Some((v, c)) = company {
            set.company = ExtractedField::new(v, c);
        }
        set
    }

    #[test]
    fn compose_stays_within_seed_band() {
        let v = FieldValidator::default();
        let good = v.validate(Field::Title, "Senior Backend Engineer");
        let bad = v.validate(Field::Title, "x");
        let seed = 0.7;
        assert!(compose(seed, &good) <= seed);
        assert!(compose(seed, &bad) >= seed * SEED_FLOOR);
        assert!(compose(seed, &good) > compose(seed, &bad));
    }

    #[test]
    fn overall_counts_missing_core_fields_as_zero() {
        let w = FieldWeights::default();
        let only_title = fields(Some(("Engineer", 1.0)), None);
        assert!((overall_confidence(&only_title, &w) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn overall_skips_missing_optional_fields() {
        let w = FieldWeights::default();
        let mut set = fields(Some(("Engineer", 0.9)), Some(("Acme", 0.9)));
        assert!((overall_confidence(&set, &w) - 0.9).abs() < 1e-9);
        set.location = ExtractedField::new("Remote", 0.5);
        let with_location = overall_confidence(&set, &w);
        assert!(with_location < 0.9 && with_location > 0.5);
    }

    #[test]
    fn overall_is_zero_when_every_weight_is_zero() {
        let w = FieldWeights {
            title: 0.0,
            company: 0.0,
            description: 0.0,
            location: 0.0,
            salary: 0.0,
        };
        let set = fields(Some(("Engineer", 0.9)), Some(("Acme", 0.9)));
        assert_eq!(overall_confidence(&set, &w), 0.0);
    }

    #[test]
    fn judge_classifies_failure_modes() {
        let t = Tuning::default();
        assert_eq!(
            judge(&FieldSet::default(), 0.0, &t),
            QualityVerdict::FailedExtraction
        );
        let placeholder = fields(Some(("Unknown Position", 0.9)), Some(("Unknown Company", 0.9)));
        assert_eq!(judge(&placeholder, 0.9, &t), QualityVerdict::Placeholder);
        let weak = fields(Some(("Data Engineer", 0.6)), Some(("Acme", 0.9)));
        assert_eq!(judge(&weak, 0.75, &t), QualityVerdict::LowQuality);
        let short = fields(Some(("QA", 0.9)), Some(("Acme", 0.9)));
        assert_eq!(judge(&short, 0.9, &t), QualityVerdict::LowQuality);
        let good = fields(Some(("Data Engineer", 0.9)), Some(("Acme", 0.9)));
        assert_eq!(judge(&good, 0.9, &t), QualityVerdict::Valid);
    }

    #[test]
    fn stricter_gate_never_accepts_more() {
        let lenient = Tuning::default();
        let mut strict = Tuning::default();
        strict.quality.min_title = 0.95;
        let set = fields(Some(("Data Engineer", 0.9)), Some(("Acme", 0.9)));
        assert_eq!(judge(&set, 0.9, &lenient), QualityVerdict::Valid);
        assert_eq!(judge(&set, 0.9, &strict), QualityVerdict::LowQuality);
    }
}
