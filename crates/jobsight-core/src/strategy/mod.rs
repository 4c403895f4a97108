//! Extraction strategies.
//!
//! Each strategy is one tactic for pulling field values out of a [`Page`].
//! Strategies return *seed* confidences that reflect how much the tactic
//! is trusted; validation is folded in later by the extractor.
//!
//! | Strategy | Priority | Seed band |
//! |----------|----------|-----------|
//! | [`StructuredDataStrategy`] | 0 | 0.95 |
//! | [`SelectorStrategy`] | 10 | 0.75 – 0.85 |
//! | [`TextPatternStrategy`] | 20 | 0.5 – 0.7 |
//!
//! Lower priorities run first. A strategy that finds nothing returns an
//! empty [`PartialResult`] or a [`StrategyError`]; both are recovered by
//! moving on to the next strategy.

mod selector;
mod structured;
mod text;

pub use selector::{SelectorSet, SelectorStrategy};
pub use structured::{read_job_posting, StructuredDataStrategy};
pub use text::{strip_hiring_lead_in, TextPatternStrategy};

use crate::error::StrategyError;
use crate::models::{ExtractionMethod, PartialResult, SeedHint};
use crate::page::Page;
use crate::source::PlatformFamily;

/// Everything a strategy may look at.
pub struct StrategyContext<'a> {
    pub address: &'a str,
    pub page: &'a Page,
    pub family: PlatformFamily,
    /// Hints from the learning store, best first.
    pub seeds: &'a [SeedHint],
}

/// One interchangeable extraction tactic.
pub trait Strategy: Send + Sync {
    fn method(&self) -> ExtractionMethod;

    /// Lower runs first.
    fn priority(&self) -> u8;

    fn extract(&self, ctx: &StrategyContext<'_>) -> Result<PartialResult, StrategyError>;
}

/// The standard strategy chain for a family, in priority order.
pub fn default_chain(family: PlatformFamily) -> Vec<Box<dyn Strategy>> {
    vec![
        Box::new(StructuredDataStrategy::new()),
        Box::new(SelectorStrategy::for_family(family)),
        Box::new(TextPatternStrategy::new()),
    ]
}
