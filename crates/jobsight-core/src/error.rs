//! Error taxonomy for the extraction pipeline and the learning store.
//!
//! Only [`ExtractionError::Fatal`] is meant to reach callers of
//! [`ExtractorRegistry::parse`](crate::registry::ExtractorRegistry::parse).
//! Strategy and extractor failures are recovered inside the pipeline;
//! low-quality results are not errors at all but a
//! [`QualityVerdict`](crate::models::QualityVerdict).

use thiserror::Error;

use crate::models::{ExtractionResult, Field};

/// A single strategy could not produce anything usable.
///
/// Recovered locally by moving to the next strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no candidates found")]
    NoCandidates,
    #[error("invalid selector '{0}'")]
    InvalidSelector(String),
    #[error("{0}")]
    Other(String),
}

/// Failures raised by an extractor or by the registry around it.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A family-specific extractor failed; the registry falls back to the
    /// generic extractor.
    #[error("extractor '{extractor}' failed: {reason}")]
    Extractor { extractor: String, reason: String },

    /// The generic extractor failed and no further fallback exists.
    ///
    /// Carries whatever partial result was recoverable so the caller can
    /// pre-fill a manual-entry form.
    #[error("extraction failed, please provide the fields manually: {reason}")]
    Fatal {
        address: String,
        reason: String,
        partial: Option<Box<ExtractionResult>>,
    },
}

impl ExtractionError {
    /// The recoverable partial result, if any.
    pub fn partial(&self) -> Option<&ExtractionResult> {
        match self {
            ExtractionError::Fatal { partial, .. } => partial.as_deref(),
            ExtractionError::Extractor { .. } => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ExtractionError::Fatal { .. })
    }
}

/// The markup-retrieval collaborator could not return a page.
#[derive(Debug, Error)]
#[error("markup retrieval failed for {address}: {reason}")]
pub struct RetrievalError {
    pub address: String,
    pub reason: String,
}

/// Rejections raised by the pattern-learning store.
#[derive(Debug, Error)]
pub enum LearningError {
    /// Structurally invalid correction or discovery input. Never stored.
    #[error("malformed pattern input for {field}: {reason}")]
    MalformedPattern { field: Field, reason: String },
}
