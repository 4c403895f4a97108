//! Learning from similar postings.
//!
//! When the same posting has been extracted well elsewhere (another board,
//! an earlier crawl), its good fields can stand in for the current result's
//! poor ones. Postings match by token overlap of the company name or the
//! title.

use std::collections::BTreeSet;

use crate::models::{
    Correction, CorrectionOrigin, ExtractionMethod, ExtractionResult, Field,
};
use crate::validate::is_placeholder;

use super::PatternStore;

fn tokens(value: &str) -> BTreeSet<String> {
    value
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard overlap of the word sets of two values.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let (a, b) = (tokens(a), tokens(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count() as f64;
    let union = a.union(&b).count() as f64;
    shared / union
}

impl PatternStore {
    fn plausibly_same(&self, current: &ExtractionResult, reference: &ExtractionResult) -> bool {
        let similarity = &self.tuning().similarity;
        let overlap = |field: Field| match (current.value(field), reference.value(field)) {
            (Some(a), Some(b)) if !is_placeholder(a) && !is_placeholder(b) => token_overlap(a, b),
            _ => 0.0,
        };
        overlap(Field::Company) >= similarity.company_overlap
            || overlap(Field::Title) >= similarity.title_overlap
    }

    /// Copy good fields from matching reference results into the poor
    /// fields of `current`.
    ///
    /// Every copied value is recorded as a correction with the
    /// similar-posting origin, so its provenance stays auditable.
    pub fn learn_from_similar_postings(
        &self,
        current: &ExtractionResult,
        references: &[ExtractionResult],
    ) -> ExtractionResult {
        let similarity = self.tuning().similarity.clone();
        let mut out = current.clone();
        let mut corrections = Vec::new();

        for reference in references.iter().filter(|r| self.plausibly_same(current, r)) {
            for field in Field::ALL {
                let mine = out.field(field);
                let poor = mine.confidence < similarity.poor_field_confidence
                    || mine.value().map_or(true, is_placeholder);
                if !poor {
                    continue;
                }
                let theirs = reference.field(field);
                let Some(value) = theirs.value() else {
                    continue;
                };
                if theirs.confidence < similarity.min_reference_confidence
                    || is_placeholder(value)
                    || mine.value() == Some(value)
                {
                    continue;
                }
                let copied = theirs.with_confidence(theirs.confidence * similarity.transfer_discount);
                tracing::info!(
                    field = %field,
                    from = %reference.address,
                    "copied field from a similar posting"
                );
                corrections.push(Correction::new(
                    current.address.clone(),
                    field,
                    mine.value().map(str::to_string),
                    value,
                    reference.extractor.clone(),
                    copied.confidence,
                    CorrectionOrigin::SimilarPosting,
                ));
                out.fields.set(field, copied);
            }
        }

        if corrections.is_empty() {
            return out;
        }
        for correction in corrections {
            if let Err(e) = self.record_correction(correction) {
                tracing::debug!(error = %e, "similar-posting correction not recorded");
            }
        }
        out.overall_confidence = self.scorer.overall(&out.fields);
        out.diagnostics.verdict = self.scorer.judge(&out.fields, out.overall_confidence);
        out.diagnostics.validations = self.scorer.validations_for(&out.fields);
        if out.method == ExtractionMethod::None {
            out.method = ExtractionMethod::SimilarPosting;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::models::{Diagnostics, ExtractedField, FieldSet, PageMetadata, QualityVerdict};
    use chrono::Utc;

    fn result(address: &str, fields: &[(Field, &str, f64)]) -> ExtractionResult {
        let mut set = FieldSet::default();
        for (f, v, c) in fields {
            set.set(*f, ExtractedField::new(*v, *c));
        }
        ExtractionResult {
            address: address.to_string(),
            fields: set,
            overall_confidence: 0.5,
            extractor: "generic".to_string(),
            method: ExtractionMethod::TextPattern,
            extracted_at: Utc::now(),
            metadata: PageMetadata::default(),
            diagnostics: Diagnostics {
                verdict: QualityVerdict::LowQuality,
                ..Diagnostics::default()
            },
        }
    }

    #[test]
    fn overlap_is_jaccard() {
        assert_eq!(token_overlap("Acme Corp", "acme corp"), 1.0);
        assert!((token_overlap("Acme Robotics Inc", "Acme Robotics") - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(token_overlap("", "Acme"), 0.0);
    }

    #[test]
    fn copies_good_fields_into_poor_ones() {
        let store = PatternStore::new(&Tuning::default());
        let current = result(
            "https://www.indeed.com/viewjob?jk=1",
            &[(Field::Title, "Staff Platform Engineer", 0.6), (Field::Company, "Unknown Company", 0.4)],
        );
        let reference = result(
            "https://jobs.lever.co/initech/1",
            &[
                (Field::Title, "Staff Platform Engineer", 0.9),
                (Field::Company, "Initech", 0.9),
                (Field::Location, "Austin, TX", 0.85),
            ],
        );
        let out = store.learn_from_similar_postings(&current, &[reference]);
        assert_eq!(out.value(Field::Company), Some("Initech"));
        assert!((out.confidence(Field::Company) - 0.81).abs() < 1e-9);
        assert_eq!(out.value(Field::Location), Some("Austin, TX"));

        let corrections = store.corrections();
        assert!(!corrections.is_empty());
        assert!(corrections
            .iter()
            .all(|c| c.origin == CorrectionOrigin::SimilarPosting));
    }

    #[test]
    fn unrelated_postings_are_ignored() {
        let store = PatternStore::new(&Tuning::default());
        let current = result("https://a.com/1", &[(Field::Title, "Barista", 0.5)]);
        let reference = result(
            "https://b.com/1",
            &[(Field::Title, "Tax Attorney", 0.9), (Field::Company, "Dewey LLP", 0.9)],
        );
        let out = store.learn_from_similar_postings(&current, &[reference]);
        assert_eq!(out, current);
        assert!(store.corrections().is_empty());
    }
}
