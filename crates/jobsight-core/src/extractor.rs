//! Per-family extractors.
//!
//! An [`Extractor`] turns an address and its markup into a scored
//! [`ExtractionResult`]. [`FamilyExtractor`] is the standard
//! implementation: it runs the strategy chain for one platform family,
//! applies deterministic fallbacks, and scores every field through the
//! validator.
//!
//! # Orchestration
//!
//! 1. Run strategies in ascending priority.
//! 2. Score each partial result and keep the one with the best overall
//!    confidence; stop as soon as one exceeds `early_exit_confidence`.
//! 3. Fill fields the winner lacks from the other partial results already
//!    produced, in priority order.
//! 4. Strip site branding from the title; derive the company from the
//!    network domain when it is missing or a placeholder.
//! 5. Score the final seeds and compute `overall_confidence`.

use chrono::Utc;

use crate::confidence::Scorer;
use crate::config::Tuning;
use crate::error::ExtractionError;
use crate::models::{
    Diagnostics, ExtractedField, ExtractionMethod, ExtractionResult, Field, FieldSet,
    PartialResult, SeedHint,
};
use crate::page::Page;
use crate::source::{derive_company, strip_title_branding, PlatformFamily};
use crate::strategy::{default_chain, Strategy, StrategyContext};
use crate::validate::is_placeholder;

/// Seed for a company name derived from the network domain.
pub const DOMAIN_FALLBACK_SEED: f64 = 0.6;

/// Produces a scored result for one address.
pub trait Extractor: Send + Sync {
    /// Stable identifier reported in results and used to scope patterns.
    fn name(&self) -> &str;

    fn family(&self) -> PlatformFamily;

    fn can_handle(&self, address: &str) -> bool;

    /// Tie-breaker when several extractors can handle an address.
    fn static_confidence(&self) -> f64;

    /// The source-agnostic extractor used as the single fallback.
    fn is_generic(&self) -> bool {
        false
    }

    fn extract(
        &self,
        address: &str,
        markup: &str,
        seeds: &[SeedHint],
    ) -> Result<ExtractionResult, ExtractionError>;
}

pub struct FamilyExtractor {
    family: PlatformFamily,
    strategies: Vec<Box<dyn Strategy>>,
    scorer: Scorer,
}

impl FamilyExtractor {
    pub fn new(family: PlatformFamily, tuning: &Tuning) -> Self {
        Self::with_strategies(family, tuning, default_chain(family))
    }

    pub fn generic(tuning: &Tuning) -> Self {
        Self::new(PlatformFamily::Generic, tuning)
    }

    pub fn with_strategies(
        family: PlatformFamily,
        tuning: &Tuning,
        mut strategies: Vec<Box<dyn Strategy>>,
    ) -> Self {
        strategies.sort_by_key(|s| s.priority());
        Self {
            family,
            strategies,
            scorer: Scorer::new(tuning),
        }
    }

    /// Run the strategy chain and merge partial results.
    fn orchestrate(&self, ctx: &StrategyContext<'_>) -> PartialResult {
        let early_exit = self.scorer.tuning().early_exit_confidence;
        let mut produced: Vec<PartialResult> = Vec::new();
        let mut best: Option<(usize, f64)> = None;

        for strategy in &self.strategies {
            let partial = match strategy.extract(ctx) {
                Ok(p) if !p.is_empty() => p,
                Ok(_) => {
                    tracing::debug!(method = %strategy.method(), "strategy found nothing");
                    continue;
                }
                Err(e) => {
                    tracing::debug!(method = %strategy.method(), error = %e, "strategy failed");
                    continue;
                }
            };
            let overall = self.scorer.score(&partial.fields).overall;
            tracing::debug!(method = %partial.method, overall, "strategy produced a result");
            produced.push(partial);
            if best.map_or(true, |(_, b)| overall > b) {
                best = Some((produced.len() - 1, overall));
            }
            if overall > early_exit {
                break;
            }
        }

        let Some((index, _)) = best else {
            return PartialResult::empty(ExtractionMethod::None);
        };
        let mut merged = produced[index].clone();
        for (i, other) in produced.iter().enumerate() {
            if i == index {
                continue;
            }
            for field in Field::ALL {
                let current = merged.fields.get(field);
                let candidate = other.fields.get(field);
                let current_usable = current.value().is_some_and(|v| !is_placeholder(v));
                if !current_usable && candidate.value().is_some_and(|v| !is_placeholder(v)) {
                    merged.fields.set(field, candidate.clone());
                }
            }
        }
        merged
    }

    fn apply_fallbacks(&self, address: &str, seeds: &mut FieldSet) {
        if let Some(title) = seeds.title.value() {
            let stripped = strip_title_branding(title);
            if stripped != title {
                tracing::debug!(from = %title, to = %stripped, "stripped title branding");
                seeds.title = ExtractedField::new(stripped, seeds.title.confidence);
            }
        }

        let company_usable = seeds.company.value().is_some_and(|c| !is_placeholder(c));
        if !company_usable {
            if let Some(company) = derive_company(address, PlatformFamily::of_address(address)) {
                tracing::debug!(company = %company, "company derived from domain");
                seeds.company = ExtractedField::new(company, DOMAIN_FALLBACK_SEED);
            }
        }
    }
}

impl Extractor for FamilyExtractor {
    fn name(&self) -> &str {
        self.family.as_str()
    }

    fn family(&self) -> PlatformFamily {
        self.family
    }

    fn can_handle(&self, address: &str) -> bool {
        match self.family {
            PlatformFamily::Generic => true,
            family => PlatformFamily::of_address(address) == family,
        }
    }

    fn static_confidence(&self) -> f64 {
        match self.family {
            PlatformFamily::Generic => 0.5,
            f if f.is_board() => 0.8,
            _ => 0.85,
        }
    }

    fn is_generic(&self) -> bool {
        self.family == PlatformFamily::Generic
    }

    fn extract(
        &self,
        address: &str,
        markup: &str,
        seeds: &[SeedHint],
    ) -> Result<ExtractionResult, ExtractionError> {
        let page = Page::parse(markup);
        let ctx = StrategyContext {
            address,
            page: &page,
            family: self.family,
            seeds,
        };

        let partial = self.orchestrate(&ctx);
        let method = partial.method;
        let mut fields = partial.fields;
        self.apply_fallbacks(address, &mut fields);

        if fields.present_count() == 0 {
            return Err(ExtractionError::Extractor {
                extractor: self.name().to_string(),
                reason: "no field could be extracted from the markup or the address".to_string(),
            });
        }

        let scored = self.scorer.score(&fields);
        let verdict = self.scorer.judge(&scored.fields, scored.overall);
        tracing::debug!(
            extractor = self.name(),
            method = %method,
            overall = scored.overall,
            verdict = %verdict,
            "extraction complete"
        );

        Ok(ExtractionResult {
            address: address.to_string(),
            fields: scored.fields,
            overall_confidence: scored.overall,
            extractor: self.name().to_string(),
            method,
            extracted_at: Utc::now(),
            metadata: page.metadata(address),
            diagnostics: Diagnostics {
                verdict,
                validations: scored.validations,
                ..Diagnostics::default()
            },
        })
    }
}
