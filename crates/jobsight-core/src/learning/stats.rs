//! Read-only aggregates over the store, for observability only.

use std::collections::BTreeMap;
use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::PatternScope;
use crate::source::domain_of;

use super::PatternStore;

/// Upper bounds (exclusive, except the last) of the confidence buckets.
pub const CONFIDENCE_BUCKETS: [(&str, f64); 4] = [
    ("<0.5", 0.5),
    ("0.5-0.7", 0.7),
    ("0.7-0.9", 0.9),
    (">=0.9", f64::INFINITY),
];

fn bucket(confidence: f64) -> &'static str {
    CONFIDENCE_BUCKETS
        .iter()
        .find(|(_, upper)| confidence < *upper)
        .map(|(name, _)| *name)
        .unwrap_or(">=0.9")
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct LearningStats {
    pub total_corrections: usize,
    pub corrections_by_origin: BTreeMap<String, usize>,
    pub corrections_by_field: BTreeMap<String, usize>,
    pub corrections_by_domain: BTreeMap<String, usize>,
    pub learned_patterns: usize,
    pub domain_patterns: usize,
    pub family_patterns: usize,
    pub global_patterns: usize,
    pub patterns_by_confidence: BTreeMap<String, usize>,
    pub discovered_patterns: usize,
    pub discovered_by_kind: BTreeMap<String, usize>,
    pub pattern_applications: u64,
    pub last_correction_at: Option<DateTime<Utc>>,
}

impl PatternStore {
    pub fn learning_stats(&self) -> LearningStats {
        let state = self.read();
        let mut stats = LearningStats {
            total_corrections: state.corrections.len(),
            learned_patterns: state.patterns.len(),
            discovered_patterns: state.discovered.len(),
            pattern_applications: self.applications.load(Ordering::Relaxed),
            ..LearningStats::default()
        };

        for c in &state.corrections {
            *stats
                .corrections_by_origin
                .entry(c.origin.as_str().to_string())
                .or_default() += 1;
            *stats
                .corrections_by_field
                .entry(c.field.as_str().to_string())
                .or_default() += 1;
            let domain = domain_of(&c.source_address)
                .unwrap_or_else(|| "(none)".to_string());
            *stats.corrections_by_domain.entry(domain).or_default() += 1;
            if stats.last_correction_at.map_or(true, |t| c.recorded_at > t) {
                stats.last_correction_at = Some(c.recorded_at);
            }
        }

        for p in &state.patterns {
            match p.scope {
                PatternScope::Domain(_) => stats.domain_patterns += 1,
                PatternScope::Family(_) => stats.family_patterns += 1,
                PatternScope::Global => stats.global_patterns += 1,
            }
            *stats
                .patterns_by_confidence
                .entry(bucket(p.confidence).to_string())
                .or_default() += 1;
        }

        for d in &state.discovered {
            let kind = serde_json::to_value(d.kind)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("{:?}", d.kind));
            *stats.discovered_by_kind.entry(kind).or_default() += 1;
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::models::{Correction, Field};

    #[test]
    fn buckets_cover_the_unit_interval() {
        assert_eq!(bucket(0.0), "<0.5");
        assert_eq!(bucket(0.5), "0.5-0.7");
        assert_eq!(bucket(0.85), "0.7-0.9");
        assert_eq!(bucket(1.0), ">=0.9");
    }

    #[test]
    fn counts_by_origin_field_and_domain() {
        let store = PatternStore::new(&Tuning::default());
        store
            .record_correction(Correction::human("https://a.com/1", Field::Company, Some("A Inc"), "A"))
            .unwrap();
        store
            .record_correction(Correction::human("https://a.com/2", Field::Title, Some("Eng"), "Engineer"))
            .unwrap();
        store
            .record_correction(Correction::human("::", Field::Title, None, "Engineer"))
            .unwrap();

        let stats = store.learning_stats();
        assert_eq!(stats.total_corrections, 3);
        assert_eq!(stats.corrections_by_origin["human_feedback"], 3);
        assert_eq!(stats.corrections_by_field["title"], 2);
        assert_eq!(stats.corrections_by_domain["a.com"], 2);
        assert_eq!(stats.corrections_by_domain["(none)"], 1);
        assert_eq!(stats.learned_patterns, 2);
        assert_eq!(stats.domain_patterns, 2);
        assert_eq!(stats.patterns_by_confidence["0.7-0.9"], 2);
        assert!(stats.last_correction_at.is_some());
    }

    #[test]
    fn stats_are_read_only() {
        let store = PatternStore::new(&Tuning::default());
        store
            .record_correction(Correction::human("https://a.com/1", Field::Company, Some("A Inc"), "A"))
            .unwrap();
        let before = store.learned_patterns();
        let _ = store.learning_stats();
        let _ = store.learning_stats();
        assert_eq!(store.learned_patterns(), before);
    }
}
