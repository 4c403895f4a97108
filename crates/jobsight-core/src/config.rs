//! Tunable weights and thresholds.
//!
//! Every constant that was chosen empirically lives here so callers can
//! adjust it from configuration. All sections deserialize with defaults,
//! so an empty `[tuning]` table yields [`Tuning::default`].

use serde::{Deserialize, Serialize};

use crate::models::Field;

/// Top-level tuning for the whole pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    pub weights: FieldWeights,
    pub quality: QualityThresholds,
    /// Strategy orchestration stops once a result's overall confidence
    /// exceeds this value.
    pub early_exit_confidence: f64,
    /// A validation rule passes when its score is strictly above this mark.
    pub pass_mark: f64,
    pub learning: LearningTuning,
    pub similarity: SimilarityTuning,
    pub blend: BlendWeights,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            weights: FieldWeights::default(),
            quality: QualityThresholds::default(),
            early_exit_confidence: 0.9,
            pass_mark: 0.5,
            learning: LearningTuning::default(),
            similarity: SimilarityTuning::default(),
            blend: BlendWeights::default(),
        }
    }
}

/// Weights used to combine field confidences into `overall_confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub title: f64,
    pub company: f64,
    pub description: f64,
    pub location: f64,
    pub salary: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            title: 0.4,
            company: 0.4,
            description: 0.1,
            location: 0.05,
            salary: 0.05,
        }
    }
}

impl FieldWeights {
    pub fn weight(&self, field: Field) -> f64 {
        match field {
            Field::Title => self.title,
            Field::Company => self.company,
            Field::Description => self.description,
            Field::Location => self.location,
            Field::Salary => self.salary,
        }
    }

    pub fn total(&self) -> f64 {
        Field::ALL.iter().map(|f| self.weight(*f)).sum()
    }
}

/// Thresholds for the registry's high-quality gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub min_overall: f64,
    pub min_title: f64,
    pub min_company: f64,
    /// Title and company must be at least this many characters long.
    pub min_length: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_overall: 0.6,
            min_title: 0.7,
            min_company: 0.7,
            min_length: 3,
        }
    }
}

/// Parameters of the pattern-learning store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningTuning {
    /// Confidence added each time the same correction recurs.
    pub reinforcement_step: f64,
    /// Upper bound for any learned or discovered pattern confidence.
    pub confidence_cap: f64,
    /// Learned patterns apply only when their confidence exceeds this.
    pub application_threshold: f64,
    /// Minimum candidate score for a discovered value to be used.
    pub discovery_threshold: f64,
    /// Threshold reduction when a family sibling already discovered the
    /// same descriptor.
    pub sibling_discovery_bonus: f64,
    /// Multiplier applied to patterns inherited from a family sibling.
    pub propagation_discount: f64,
    /// Distinct domains of one family that must share a correction before
    /// it is promoted to a family-scoped pattern.
    pub family_promotion_min_domains: usize,
    /// Examples kept per discovered pattern.
    pub max_examples: usize,
}

impl Default for LearningTuning {
    fn default() -> Self {
        Self {
            reinforcement_step: 0.05,
            confidence_cap: 0.95,
            application_threshold: 0.7,
            discovery_threshold: 0.6,
            sibling_discovery_bonus: 0.1,
            propagation_discount: 0.8,
            family_promotion_min_domains: 2,
            max_examples: 5,
        }
    }
}

/// Parameters for learning from similar postings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityTuning {
    /// Token overlap needed for two company names to match.
    pub company_overlap: f64,
    /// Token overlap needed for two titles to match.
    pub title_overlap: f64,
    /// A reference field must be at least this confident to be copied.
    pub min_reference_confidence: f64,
    /// A current field below this confidence counts as poor.
    pub poor_field_confidence: f64,
    /// Multiplier applied to a copied field's confidence.
    pub transfer_discount: f64,
}

impl Default for SimilarityTuning {
    fn default() -> Self {
        Self {
            company_overlap: 0.5,
            title_overlap: 0.5,
            min_reference_confidence: 0.8,
            poor_field_confidence: 0.7,
            transfer_discount: 0.9,
        }
    }
}

/// Weights for blending core confidence with an external assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendWeights {
    pub core: f64,
    pub external: f64,
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            core: 0.4,
            external: 0.6,
        }
    }
}
