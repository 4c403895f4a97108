//! The dependency-injected context that wires the core to its
//! collaborators.
//!
//! A [`Harness`] owns one [`PatternStore`], the [`ExtractorRegistry`] that
//! uses it, the markup-retrieval collaborator and the cross-validator.
//! There is no global state: construct one per process (or per test) and
//! pass it to whatever needs it.
//!
//! ```text
//! Config ──▶ Harness::from_config
//!              ├─ PatternStore   (restored from [state].path)
//!              ├─ ExtractorRegistry ── HttpMarkupSource
//!              └─ CrossValidator (disabled | http)
//! ```

use std::sync::Arc;

use anyhow::Result;
use jobsight_core::learning::{LearningStats, PatternStore};
use jobsight_core::{
    Correction, ExtractionError, ExtractionResult, ExtractorRegistry, LearnedPattern,
    MarkupSource, QualityVerdict,
};

use crate::config::Config;
use crate::crossval::{create_validator, cross_validate, CrossValidator};
use crate::fetch::HttpMarkupSource;
use crate::state;

/// Per-call options for [`Harness::analyze`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    /// Blend in the cross-validator's assessment when one is configured.
    pub cross_validate: bool,
    /// Earlier results that may describe the same posting.
    pub references: Vec<ExtractionResult>,
}

pub struct Harness {
    config: Config,
    store: Arc<PatternStore>,
    registry: ExtractorRegistry,
    validator: Box<dyn CrossValidator>,
}

impl Harness {
    /// Build the production harness: HTTP retrieval and the configured
    /// cross-validator.
    pub fn from_config(config: Config) -> Result<Self> {
        let source = HttpMarkupSource::new(&config.fetch)?;
        let validator = create_validator(&config.cross_validation)?;
        Self::with_collaborators(config, Some(Box::new(source)), validator)
    }

    /// Build a harness around caller-supplied collaborators.
    ///
    /// The store is restored from `[state].path` when that file exists.
    pub fn with_collaborators(
        config: Config,
        source: Option<Box<dyn MarkupSource>>,
        validator: Box<dyn CrossValidator>,
    ) -> Result<Self> {
        let store = match &config.state.path {
            Some(path) => match state::load_snapshot(path)? {
                Some(snapshot) => PatternStore::restore(snapshot, &config.tuning),
                None => PatternStore::new(&config.tuning),
            },
            None => PatternStore::new(&config.tuning),
        };
        let store = Arc::new(store);

        let mut registry =
            ExtractorRegistry::with_defaults(&config.tuning).with_store(store.clone());
        if let Some(source) = source {
            registry = registry.with_markup_source(source);
        }

        Ok(Self {
            config,
            store,
            registry,
            validator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &PatternStore {
        &self.store
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    /// Parse one posting and run the optional enrichment steps.
    ///
    /// Similar-posting learning runs only for results that are not VALID.
    /// Cross-validation never fails the call.
    pub fn analyze(
        &self,
        address: &str,
        markup: Option<&str>,
        options: &AnalyzeOptions,
    ) -> Result<ExtractionResult, ExtractionError> {
        let mut result = self.registry.parse(address, markup)?;

        if !options.references.is_empty() && result.verdict() != QualityVerdict::Valid {
            result = self
                .store
                .learn_from_similar_postings(&result, &options.references);
        }

        if options.cross_validate && self.validator.is_enabled() {
            result = cross_validate(self.validator.as_ref(), &result, &self.config.tuning);
        }

        Ok(result)
    }

    /// Record a correction submitted from outside the pipeline.
    pub fn record_correction(&self, correction: Correction) -> Result<Option<LearnedPattern>> {
        Ok(self.store.record_correction(correction)?)
    }

    pub fn learning_stats(&self) -> LearningStats {
        self.store.learning_stats()
    }

    /// Persist the store to `[state].path`. Returns `false` when no path
    /// is configured.
    pub fn save_state(&self) -> Result<bool> {
        let Some(path) = &self.config.state.path else {
            return Ok(false);
        };
        state::save_snapshot(path, &self.store.snapshot())?;
        Ok(true)
    }
}
