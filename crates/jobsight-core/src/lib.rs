//! # jobsight core
//!
//! Synchronous, I/O-free logic for extracting structured fields (title,
//! company, location, description, salary) from job-posting markup, with a
//! calibrated confidence per field and a symbolic rule store that learns
//! from corrections.
//!
//! This crate performs no network or filesystem access. Markup retrieval,
//! AI cross-validation and persistence are collaborators supplied by the
//! caller through the traits in [`registry`] and the snapshot types in
//! [`learning`].
//!
//! ## Data Flow
//!
//! ```text
//! address + markup
//!       │
//!       ▼
//! ┌──────────────────┐  resolve   ┌───────────────────────────────┐
//! │ ExtractorRegistry │──────────▶│ Extractor (family or generic) │
//! └────────┬─────────┘            │  structured → selector → text │
//!          │                      └───────────────┬───────────────┘
//!          │◀─────────────── ExtractionResult ────┘
//!          ▼
//! ┌──────────────────┐  apply / discover  ┌────────────────┐
//! │  PatternStore    │◀──────────────────▶│ FieldValidator │
//! └──────────────────┘                    └────────────────┘
//!          │
//!          ▼
//!   verdict VALID? ── no ──▶ one retry with the generic extractor
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Fields, results, corrections, patterns |
//! | [`config`] | Tunable weights and thresholds |
//! | [`validate`] | Per-field heuristic validation |
//! | [`confidence`] | Confidence composition and quality verdicts |
//! | [`page`] | Parsed markup: metadata, structured data, text lines |
//! | [`source`] | Domains and platform families |
//! | [`strategy`] | Structured-data, selector and text-pattern strategies |
//! | [`extractor`] | Per-family extractors with deterministic fallbacks |
//! | [`registry`] | Extractor selection, quality gating, fallback |
//! | [`learning`] | Corrections, learned and discovered patterns |
//! | [`blend`] | Advisory blending of external assessments |
//! | [`error`] | Error taxonomy |

pub mod blend;
pub mod confidence;
pub mod config;
pub mod error;
pub mod extractor;
pub mod learning;
pub mod models;
pub mod page;
pub mod registry;
pub mod source;
pub mod strategy;
pub mod validate;

pub use config::Tuning;
pub use error::{ExtractionError, LearningError, RetrievalError, StrategyError};
pub use extractor::{Extractor, FamilyExtractor};
pub use learning::PatternStore;
pub use models::{
    Correction, CorrectionOrigin, DiscoveredPattern, ExtractedField, ExtractionMethod,
    ExtractionResult, Field, LearnedPattern, QualityVerdict, ValidationResult,
};
pub use registry::{ExtractorRegistry, MarkupSource};
pub use validate::FieldValidator;
