//! Extractor selection, quality gating and the single generic fallback.
//!
//! The [`ExtractorRegistry`] is the pipeline's only entry point. It holds
//! an ordered list of extractors plus the generic one, an optional
//! [`PatternStore`], and an optional [`MarkupSource`] used when the caller
//! does not supply markup.
//!
//! # Parse flow
//!
//! ```text
//! resolve(address) ──▶ extract ──▶ refine ──▶ VALID? ──yes──▶ result
//!                        │ err                 │ no
//!                        ▼                     ▼
//!                   generic.extract (exactly once, fallback_used = true)
//!                        │ err ──▶ ExtractionError::Fatal { partial }
//!                        ▼
//!                      refine ──▶ discovery (missing/placeholder fields)
//! ```
//!
//! "Refine" applies learned patterns from the store and rescores the
//! fields they changed.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use crate::confidence::Scorer;
use crate::config::Tuning;
use crate::error::{ExtractionError, RetrievalError};
use crate::extractor::{Extractor, FamilyExtractor};
use crate::learning::PatternStore;
use crate::models::{
    Diagnostics, ExtractionMethod, ExtractionResult, Field, FieldSet, QualityVerdict, SeedHint,
};
use crate::page::Page;
use crate::source::PlatformFamily;
use crate::validate::is_placeholder;

/// Retrieves the markup of a remote page.
///
/// Implemented outside the core (HTTP, fixtures in tests). Failures are
/// reported as warnings on the result, never as errors.
pub trait MarkupSource: Send + Sync {
    fn fetch(&self, address: &str) -> Result<String, RetrievalError>;
}

/// Ordered set of extractors with a generic fallback.
///
/// # Example
///
/// ```rust
/// use jobsight_core::{ExtractorRegistry, Field, Tuning};
///
/// let registry = ExtractorRegistry::with_defaults(&Tuning::default());
/// let markup = r#"<script type="application/ld+json">
///   {"@type": "JobPosting", "title": "Senior Backend Engineer",
///    "hiringOrganization": {"name": "Acme Corp"}}
/// </script>"#;
/// let result = registry.parse("https://acme.example/jobs/1", Some(markup)).unwrap();
/// assert_eq!(result.value(Field::Title), Some("Senior Backend Engineer"));
/// ```
pub struct ExtractorRegistry {
    extractors: Vec<Arc<dyn Extractor>>,
    generic: Arc<dyn Extractor>,
    store: Option<Arc<PatternStore>>,
    source: Option<Box<dyn MarkupSource>>,
    scorer: Scorer,
}

impl ExtractorRegistry {
    /// Create a registry with only the given generic extractor.
    pub fn new(generic: Arc<dyn Extractor>, tuning: &Tuning) -> Self {
        Self {
            extractors: Vec::new(),
            generic,
            store: None,
            source: None,
            scorer: Scorer::new(tuning),
        }
    }

    /// Create a registry pre-loaded with one extractor per known platform
    /// family and the generic extractor as fallback.
    pub fn with_defaults(tuning: &Tuning) -> Self {
        let mut registry = Self::new(Arc::new(FamilyExtractor::generic(tuning)), tuning);
        for family in PlatformFamily::KNOWN {
            registry.register(Arc::new(FamilyExtractor::new(family, tuning)));
        }
        registry
    }

    /// Register an extractor.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    /// Attach the pattern-learning store used for seeding, pattern
    /// application and discovery.
    pub fn with_store(mut self, store: Arc<PatternStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attach the collaborator used when `parse` receives no markup.
    pub fn with_markup_source(mut self, source: Box<dyn MarkupSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn store(&self) -> Option<&Arc<PatternStore>> {
        self.store.as_ref()
    }

    /// Get all registered extractors, excluding the generic fallback.
    pub fn extractors(&self) -> &[Arc<dyn Extractor>] {
        &self.extractors
    }

    /// Find a registered extractor by name.
    pub fn find(&self, name: &str) -> Option<&dyn Extractor> {
        if self.generic.name() == name {
            return Some(self.generic.as_ref());
        }
        self.extractors
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
    }

    /// Check if the registry has no extractors besides the generic one.
    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Return the count of registered extractors, excluding the generic one.
    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    /// Select the most specific extractor for an address.
    ///
    /// Non-generic extractors win over generic ones; ties go to the
    /// higher static confidence, then to registration order.
    pub fn resolve(&self, address: &str) -> Arc<dyn Extractor> {
        let mut best: Option<&Arc<dyn Extractor>> = None;
        for candidate in self.extractors.iter().filter(|e| e.can_handle(address)) {
            let better = match best {
                None => true,
                Some(current) => {
                    (current.is_generic() && !candidate.is_generic())
                        || (current.is_generic() == candidate.is_generic()
                            && candidate.static_confidence() > current.static_confidence())
                }
            };
            if better {
                best = Some(candidate);
            }
        }
        best.cloned().unwrap_or_else(|| self.generic.clone())
    }

    /// Extract a scored result for `address`.
    ///
    /// When `markup` is `None` it is retrieved through the markup source;
    /// a retrieval failure is a warning and extraction proceeds on empty
    /// markup. Only a failure of the generic extractor is returned as an
    /// error, and it carries the best partial result available.
    pub fn parse(
        &self,
        address: &str,
        markup: Option<&str>,
    ) -> Result<ExtractionResult, ExtractionError> {
        let mut warnings = Vec::new();
        let fetched;
        let markup = match markup {
            Some(m) => m,
            None => {
                fetched = self.retrieve(address, &mut warnings);
                fetched.as_str()
            }
        };

        let seeds: Vec<SeedHint> = self
            .store
            .as_ref()
            .map(|s| s.seeds_for(address))
            .unwrap_or_default();

        let primary = self.resolve(address);
        tracing::debug!(address, extractor = primary.name(), seeds = seeds.len(), "extractor resolved");

        let first = match primary.extract(address, markup, &seeds) {
            Ok(result) => Some(self.refine(result, address)),
            Err(e) if primary.is_generic() => {
                return Err(self.fatal(address, markup, e, None, warnings));
            }
            Err(e) => {
                tracing::warn!(address, error = %e, "extractor failed, falling back");
                warnings.push(e.to_string());
                None
            }
        };

        let mut result = match first {
            Some(result) if result.verdict() == QualityVerdict::Valid || primary.is_generic() => {
                result
            }
            first => {
                if let Some(r) = &first {
                    tracing::info!(
                        address,
                        extractor = %r.extractor,
                        verdict = %r.verdict(),
                        "low-quality result, retrying with the generic extractor"
                    );
                }
                match self.generic.extract(address, markup, &seeds) {
                    Ok(fallback) => {
                        let mut fallback = self.refine(fallback, address);
                        fallback.diagnostics.fallback_used = true;
                        fallback
                    }
                    Err(e) => return Err(self.fatal(address, markup, e, first, warnings)),
                }
            }
        };

        self.discover(&mut result, address, markup);
        result.diagnostics.warnings.extend(warnings);
        tracing::info!(
            address,
            extractor = %result.extractor,
            method = %result.method,
            overall = result.overall_confidence,
            verdict = %result.verdict(),
            fallback = result.diagnostics.fallback_used,
            "parse complete"
        );
        Ok(result)
    }

    fn retrieve(&self, address: &str, warnings: &mut Vec<String>) -> String {
        let Some(source) = &self.source else {
            warnings.push("no markup supplied and no markup source configured".to_string());
            return String::new();
        };
        match source.fetch(address) {
            Ok(markup) => markup,
            Err(e) => {
                tracing::warn!(address, error = %e, "markup retrieval failed, continuing without markup");
                warnings.push(e.to_string());
                String::new()
            }
        }
    }

    /// Apply learned patterns and rescore whatever they changed.
    fn refine(&self, result: ExtractionResult, address: &str) -> ExtractionResult {
        let Some(store) = &self.store else {
            return result;
        };
        let already = result.diagnostics.applied_patterns.len();
        let mut out = store.apply_learned_patterns(&result, address);
        let changed: BTreeSet<Field> = out.diagnostics.applied_patterns[already..]
            .iter()
            .map(|c| c.field)
            .collect();
        if changed.is_empty() {
            return out;
        }
        for field in changed {
            let (scored, _) = self.scorer.score_field(field, out.fields.get(field));
            out.fields.set(field, scored);
        }
        self.rescore(&mut out);
        out
    }

    /// Fill missing or placeholder fields from markup discovery.
    fn discover(&self, result: &mut ExtractionResult, address: &str, markup: &str) {
        let Some(store) = &self.store else {
            return;
        };
        let lacking = [Field::Title, Field::Company, Field::Location]
            .into_iter()
            .any(|f| result.value(f).map_or(true, is_placeholder));
        if !lacking || markup.trim().is_empty() {
            return;
        }

        let found = store.discover_patterns_from_markup(address, markup, result);
        if found.is_empty() {
            return;
        }
        for (field, seed) in found.fields.iter() {
            if !seed.is_present() {
                continue;
            }
            let (scored, _) = self.scorer.score_field(field, seed);
            result.fields.set(field, scored);
            result.diagnostics.discovered_fields.push(field);
        }
        if result.method == ExtractionMethod::None {
            result.method = ExtractionMethod::Discovery;
        }
        self.rescore(result);
    }

    fn rescore(&self, result: &mut ExtractionResult) {
        result.overall_confidence = self.scorer.overall(&result.fields);
        result.diagnostics.verdict = self.scorer.judge(&result.fields, result.overall_confidence);
        result.diagnostics.validations = self.scorer.validations_for(&result.fields);
    }

    fn fatal(
        &self,
        address: &str,
        markup: &str,
        error: ExtractionError,
        first: Option<ExtractionResult>,
        warnings: Vec<String>,
    ) -> ExtractionError {
        tracing::warn!(address, error = %error, "generic extractor failed, no fallback left");
        let mut partial = first.unwrap_or_else(|| ExtractionResult {
            address: address.to_string(),
            fields: FieldSet::default(),
            overall_confidence: 0.0,
            extractor: self.generic.name().to_string(),
            method: ExtractionMethod::None,
            extracted_at: Utc::now(),
            metadata: Page::parse(markup).metadata(address),
            diagnostics: Diagnostics::default(),
        });
        partial.diagnostics.warnings.extend(warnings);
        ExtractionError::Fatal {
            address: address.to_string(),
            reason: error.to_string(),
            partial: Some(Box::new(partial)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Correction, ExtractedField};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Extractor that returns fixed fields and counts its calls.
    struct Stub {
        name: &'static str,
        generic: bool,
        handles: bool,
        static_confidence: f64,
        fields: Option<FieldSet>,
        calls: Arc<AtomicUsize>,
    }

    impl Stub {
        fn specific(fields: Option<FieldSet>) -> Self {
            Self {
                name: "stub",
                generic: false,
                handles: true,
                static_confidence: 0.9,
                fields,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn generic(fields: Option<FieldSet>) -> Self {
            Self {
                name: "generic-stub",
                generic: true,
                ..Self::specific(fields)
            }
        }
    }

    impl Extractor for Stub {
        fn name(&self) -> &str {
            self.name
        }
        fn family(&self) -> PlatformFamily {
            PlatformFamily::Generic
        }
        fn can_handle(&self, _: &str) -> bool {
            self.handles
        }
        fn static_confidence(&self) -> f64 {
            self.static_confidence
        }
        fn is_generic(&self) -> bool {
            self.generic
        }
        fn extract(
            &self,
            address: &str,
            _: &str,
            _: &[SeedHint],
        ) -> Result<ExtractionResult, ExtractionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let Some(fields) = self.fields.clone() else {
                return Err(ExtractionError::Extractor {
                    extractor: self.name.to_string(),
                    reason: "boom".to_string(),
                });
            };
            let scorer = Scorer::new(&Tuning::default());
            let overall = scorer.overall(&fields);
            Ok(ExtractionResult {
                address: address.to_string(),
                diagnostics: Diagnostics {
                    verdict: scorer.judge(&fields, overall),
                    ..Diagnostics::default()
                },
                fields,
                overall_confidence: overall,
                extractor: self.name.to_string(),
                method: ExtractionMethod::Selector,
                extracted_at: Utc::now(),
                metadata: Default::default(),
            })
        }
    }

    fn fields(title: &str, company: &str, conf: f64) -> FieldSet {
        FieldSet {
            title: ExtractedField::new(title, conf),
            company: ExtractedField::new(company, conf),
            ..FieldSet::default()
        }
    }

    fn registry(specific: Stub, generic: Stub) -> ExtractorRegistry {
        let tuning = Tuning::default();
        let mut registry = ExtractorRegistry::new(Arc::new(generic), &tuning);
        registry.register(Arc::new(specific));
        registry
    }

    #[test]
    fn default_registry_resolves_families() {
        let registry = ExtractorRegistry::with_defaults(&Tuning::default());
        assert_eq!(registry.len(), PlatformFamily::KNOWN.len());
        assert_eq!(
            registry.resolve("https://boards.greenhouse.io/acme/jobs/1").name(),
            "greenhouse"
        );
        assert!(registry.resolve("https://example.com/jobs/1").is_generic());
        assert!(registry.find("workday").is_some());
        assert!(registry.find("nope").is_none());
    }

    #[test]
    fn specific_extractor_beats_generic_and_ties_use_static_confidence() {
        let tuning = Tuning::default();
        let mut registry =
            ExtractorRegistry::new(Arc::new(Stub::generic(None)), &tuning);
        registry.register(Arc::new(Stub {
            name: "catch-all",
            generic: true,
            static_confidence: 0.99,
            ..Stub::specific(None)
        }));
        registry.register(Arc::new(Stub {
            name: "low",
            static_confidence: 0.6,
            ..Stub::specific(None)
        }));
        registry.register(Arc::new(Stub {
            name: "high",
            static_confidence: 0.8,
            ..Stub::specific(None)
        }));
        assert_eq!(registry.resolve("https://x.com").name(), "high");
    }

    #[test]
    fn valid_result_skips_fallback() {
        let generic = Stub::generic(Some(fields("Other Role Engineer", "Other Co", 0.5)));
        let generic_calls = generic.calls.clone();
        let specific = Stub::specific(Some(fields("Senior Backend Engineer", "Acme Corp", 0.95)));
        let registry = registry(specific, generic);

        let result = registry.parse("https://x.com/1", Some("")).unwrap();
        assert_eq!(result.verdict(), QualityVerdict::Valid);
        assert!(!result.diagnostics.fallback_used);
        assert_eq!(generic_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn placeholder_result_falls_back_exactly_once() {
        let generic = Stub::generic(Some(fields("Unknown Position", "Unknown Company", 0.5)));
        let generic_calls = generic.calls.clone();
        let specific = Stub::specific(Some(fields("Unknown Position", "Unknown Company", 0.9)));
        let specific_calls = specific.calls.clone();
        let registry = registry(specific, generic);

        let result = registry.parse("https://x.com/1", Some("")).unwrap();
        assert_eq!(specific_calls.load(Ordering::SeqCst), 1);
        assert_eq!(generic_calls.load(Ordering::SeqCst), 1);
        assert!(result.diagnostics.fallback_used);
        assert_eq!(result.verdict(), QualityVerdict::Placeholder);
    }

    #[test]
    fn extractor_error_falls_back() {
        let generic = Stub::generic(Some(fields("Data Engineer", "Globex", 0.9)));
        let registry = registry(Stub::specific(None), generic);
        let result = registry.parse("https://x.com/1", Some("")).unwrap();
        assert_eq!(result.extractor, "generic-stub");
        assert!(result.diagnostics.fallback_used);
        assert!(result.diagnostics.warnings.iter().any(|w| w.contains("boom")));
    }

    #[test]
    fn generic_failure_is_fatal_with_partial() {
        let specific = Stub::specific(Some(fields("Unknown Position", "Initech", 0.6)));
        let registry = registry(specific, Stub::generic(None));
        let err = registry.parse("https://x.com/1", Some("")).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("provide the fields manually"));
        let partial = err.partial().unwrap();
        assert_eq!(partial.value(Field::Company), Some("Initech"));
    }

    #[test]
    fn missing_markup_source_is_a_warning() {
        let generic = Stub::generic(Some(fields("Data Engineer", "Globex", 0.9)));
        let registry = ExtractorRegistry::new(Arc::new(generic), &Tuning::default());
        let result = registry.parse("https://x.com/1", None).unwrap();
        assert!(!result.diagnostics.warnings.is_empty());
    }

    #[test]
    fn failing_markup_source_is_a_warning() {
        struct Down;
        impl MarkupSource for Down {
            fn fetch(&self, address: &str) -> Result<String, RetrievalError> {
                Err(RetrievalError {
                    address: address.to_string(),
                    reason: "timed out".to_string(),
                })
            }
        }
        let generic = Stub::generic(Some(fields("Data Engineer", "Globex", 0.9)));
        let registry = ExtractorRegistry::new(Arc::new(generic), &Tuning::default())
            .with_markup_source(Box::new(Down));
        let result = registry.parse("https://x.com/1", None).unwrap();
        assert!(result.diagnostics.warnings.iter().any(|w| w.contains("timed out")));
    }

    #[test]
    fn learned_patterns_are_applied_and_rescored() {
        let tuning = Tuning::default();
        let store = Arc::new(PatternStore::new(&tuning));
        store
            .record_correction(Correction::human(
                "https://x.com/a",
                Field::Company,
                Some("Acme"),
                "Acme Corporation",
            ))
            .unwrap();
        let specific = Stub::specific(Some(fields("Senior Backend Engineer", "Acme", 0.95)));
        let registry = registry(specific, Stub::generic(None)).with_store(store);

        let result = registry.parse("https://x.com/b", Some("")).unwrap();
        assert_eq!(result.value(Field::Company), Some("Acme Corporation"));
        assert_eq!(result.diagnostics.applied_patterns.len(), 1);
        assert!(result.confidence(Field::Company) <= 0.8);
        assert!((0.0..=1.0).contains(&result.overall_confidence));
    }
}
