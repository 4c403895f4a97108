//! Pattern-learning store.
//!
//! The store is an append-only log of [`Correction`]s and
//! [`DiscoveredPattern`]s plus indexes derived from them. Nothing is ever
//! deleted; learned patterns only gain usage and confidence.
//!
//! # Learning cycle
//!
//! ```text
//! record_correction ──▶ LearnedPattern (escaped original → corrected)
//!        │                  scope: domain, or global without a domain
//!        │
//!        └─ same correction on ≥ N domains of one family
//!                 ──▶ propagation correction ──▶ family-scoped pattern
//!
//! apply_learned_patterns ──▶ substitutions above the application
//!                            threshold, idempotent
//!
//! discover_patterns_from_markup ──▶ DiscoveredPattern (where to look)
//!        └─ seeds_for ──▶ selector hints for the domain and its siblings
//! ```
//!
//! # Concurrency
//!
//! All state sits behind one [`RwLock`]. Every mutation of a pattern key
//! `(field, match, scope)` happens under the write lock, so concurrent
//! recordings never lose an increment.

mod discovery;
mod similar;
mod stats;

pub use stats::{LearningStats, CONFIDENCE_BUCKETS};

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use regex::{NoExpand, Regex};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::confidence::Scorer;
use crate::config::Tuning;
use crate::error::LearningError;
use crate::models::{
    clamp_unit, AppliedChange, Correction, CorrectionOrigin, DiscoveredPattern, ExtractedField,
    ExtractionResult, Field, LearnedPattern, PatternScope, SeedHint,
};
use crate::source::{domain_of, PlatformFamily};

/// Snapshot format version written by [`PatternStore::snapshot`].
pub const SNAPSHOT_VERSION: u32 = 1;

/// The replayable logs of a store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    pub corrections: Vec<Correction>,
    pub discovered: Vec<DiscoveredPattern>,
}

type PatternKey = (Field, String, PatternScope);
type DiscoveryKey = (Option<String>, Field, String);
type PromotionKey = (PlatformFamily, Field, String, String);

#[derive(Default)]
struct StoreState {
    corrections: Vec<Correction>,
    patterns: Vec<LearnedPattern>,
    pattern_index: HashMap<PatternKey, usize>,
    by_domain: HashMap<String, Vec<usize>>,
    /// Global and family-scoped patterns.
    wide: Vec<usize>,
    discovered: Vec<DiscoveredPattern>,
    discovered_index: HashMap<DiscoveryKey, usize>,
    /// Domains on which each family-shareable correction was seen.
    promotions: HashMap<PromotionKey, BTreeSet<String>>,
}

pub struct PatternStore {
    state: RwLock<StoreState>,
    applications: AtomicU64,
    scorer: Scorer,
}

impl PatternStore {
    pub fn new(tuning: &Tuning) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            applications: AtomicU64::new(0),
            scorer: Scorer::new(tuning),
        }
    }

    fn tuning(&self) -> &Tuning {
        self.scorer.tuning()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Corrections
    // ═══════════════════════════════════════════════════════════════════

    /// Append a correction and derive (or reinforce) its learned pattern.
    ///
    /// Returns the pattern the correction produced, if any. Corrections
    /// with a null original are logged without deriving a pattern.
    pub fn record_correction(
        &self,
        correction: Correction,
    ) -> Result<Option<LearnedPattern>, LearningError> {
        if let Err(e) = validate_correction(&correction) {
            tracing::warn!(address = %correction.source_address, error = %e, "rejected correction");
            return Err(e);
        }
        let mut state = self.write();
        Ok(self.ingest(&mut state, correction, true))
    }

    fn ingest(
        &self,
        state: &mut StoreState,
        correction: Correction,
        promote: bool,
    ) -> Option<LearnedPattern> {
        state.corrections.push(correction.clone());

        let Some(original) = correction.original_value.as_deref() else {
            tracing::info!(
                field = %correction.field,
                origin = %correction.origin,
                "correction without original value logged, no pattern derived"
            );
            return None;
        };

        let family = PlatformFamily::of_address(&correction.source_address);
        let (scope, scope_extractor) = match correction.origin {
            CorrectionOrigin::CrossFamilyPropagation => {
                if !family.shares_markup() {
                    return None;
                }
                let extractor = (!correction.extractor_used.is_empty())
                    .then(|| correction.extractor_used.clone());
                (PatternScope::Family(family), extractor)
            }
            origin
                if origin.is_automatic()
                    && (family.is_board()
                        || !matches!(correction.field, Field::Company | Field::Location)) =>
            {
                // Automatic origins only generalize fields that are stable
                // across one employer's domain.
                return None;
            }
            _ => (
                domain_of(&correction.source_address)
                    .map(PatternScope::Domain)
                    .unwrap_or(PatternScope::Global),
                None,
            ),
        };

        let pattern = self.upsert_pattern(
            state,
            correction.field,
            original,
            &correction.corrected_value,
            scope.clone(),
            scope_extractor,
            correction.confidence,
            correction.recorded_at,
        );
        tracing::debug!(
            pattern = %pattern.id,
            scope = %pattern.scope,
            confidence = pattern.confidence,
            usage = pattern.usage_count,
            "learned pattern updated"
        );

        if let PatternScope::Domain(domain) = &scope {
            if correction.origin != CorrectionOrigin::CrossFamilyPropagation && family.shares_markup() {
                self.track_promotion(state, family, domain, &correction, &pattern, promote);
            }
        }
        Some(pattern)
    }

    #[allow(clippy::too_many_arguments)]
    fn upsert_pattern(
        &self,
        state: &mut StoreState,
        field: Field,
        original: &str,
        corrected: &str,
        scope: PatternScope,
        scope_extractor: Option<String>,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> LearnedPattern {
        let learning = &self.tuning().learning;
        let match_pattern = regex::escape(original);
        let key = (field, match_pattern.clone(), scope.clone());

        if let Some(&i) = state.pattern_index.get(&key) {
            let p = &mut state.patterns[i];
            p.usage_count = p.usage_count.saturating_add(1);
            p.confidence = clamp_unit((p.confidence + learning.reinforcement_step).min(learning.confidence_cap));
            p.updated_at = at;
            return p.clone();
        }

        let pattern = LearnedPattern {
            id: pattern_id(field, &match_pattern, &scope),
            field,
            match_pattern,
            replacement: corrected.to_string(),
            confidence: clamp_unit(confidence.min(learning.confidence_cap)),
            usage_count: 1,
            scope: scope.clone(),
            scope_extractor,
            created_at: at,
            updated_at: at,
        };
        let index = state.patterns.len();
        state.patterns.push(pattern.clone());
        state.pattern_index.insert(key, index);
        match scope {
            PatternScope::Domain(domain) => state.by_domain.entry(domain).or_default().push(index),
            PatternScope::Global | PatternScope::Family(_) => state.wide.push(index),
        }
        pattern
    }

    /// Promote a correction to its family once enough sibling domains
    /// have seen it.
    fn track_promotion(
        &self,
        state: &mut StoreState,
        family: PlatformFamily,
        domain: &str,
        correction: &Correction,
        pattern: &LearnedPattern,
        promote: bool,
    ) {
        let Some(original) = correction.original_value.clone() else {
            return;
        };
        let key = (
            family,
            correction.field,
            original.clone(),
            correction.corrected_value.clone(),
        );
        let domains = state.promotions.entry(key).or_default();
        let newly_seen = domains.insert(domain.to_string());
        let supporting: Vec<String> = domains.iter().cloned().collect();

        // Each additional sibling domain reinforces the family pattern once.
        let learning = &self.tuning().learning;
        if !promote || !newly_seen || supporting.len() < learning.family_promotion_min_domains {
            return;
        }
        let seen = supporting.len();

        // Independent domains combine as 1 - Π(1 - c) before the discount.
        let match_pattern = regex::escape(&original);
        let doubt: f64 = supporting
            .into_iter()
            .map(|d| {
                let key = (correction.field, match_pattern.clone(), PatternScope::Domain(d));
                state
                    .pattern_index
                    .get(&key)
                    .and_then(|&i| state.patterns.get(i))
                    .map_or(pattern.confidence, |p| p.confidence)
            })
            .map(|c| 1.0 - clamp_unit(c))
            .product();
        let combined = 1.0 - doubt;

        tracing::info!(
            family = %family,
            field = %correction.field,
            domains = seen,
            "promoting correction to platform family"
        );
        let propagated = Correction::new(
            correction.source_address.clone(),
            correction.field,
            Some(original),
            correction.corrected_value.clone(),
            family.as_str(),
            combined * learning.propagation_discount,
            CorrectionOrigin::CrossFamilyPropagation,
        );
        self.ingest(state, propagated, false);
    }

    // ═══════════════════════════════════════════════════════════════════
    // Application
    // ═══════════════════════════════════════════════════════════════════

    /// Apply every applicable learned pattern to a result.
    ///
    /// Returns a new result; the changes made are appended to
    /// `diagnostics.applied_patterns`. Applying twice changes nothing: a
    /// rewritten value no longer contains the match, and an expanding rule
    /// skips values that already contain its replacement.
    pub fn apply_learned_patterns(&self, result: &ExtractionResult, address: &str) -> ExtractionResult {
        let candidates = self.applicable_patterns(address, &result.extractor);
        let mut out = result.clone();
        let mut changes = Vec::new();

        for pattern in candidates {
            let Some(before) = out.fields.get(pattern.field).value().map(str::to_string) else {
                continue;
            };
            let re = match Regex::new(&pattern.match_pattern) {
                Ok(re) => re,
                Err(e) => {
                    tracing::warn!(pattern = %pattern.id, error = %e, "unusable learned pattern");
                    continue;
                }
            };
            if !re.is_match(&before) {
                continue;
            }
            // An expanding rule ("Acme" → "Acme Corp") still matches its own
            // output, so an already-expanded value is left alone.
            if re.is_match(&pattern.replacement) && before.contains(&pattern.replacement) {
                continue;
            }
            let after = re.replace_all(&before, NoExpand(&pattern.replacement)).into_owned();
            let updated = ExtractedField::new(&after, pattern.confidence);
            let Some(after) = updated.value().map(str::to_string) else {
                continue;
            };
            if after == before {
                continue;
            }
            changes.push(AppliedChange {
                field: pattern.field,
                pattern_id: pattern.id.clone(),
                description: format!(
                    "{}: '{}' → '{}' ({}, confidence {:.2})",
                    pattern.field, before, after, pattern.scope, pattern.confidence
                ),
                before,
                after,
                confidence: pattern.confidence,
            });
            out.fields.set(pattern.field, updated);
        }

        if !changes.is_empty() {
            tracing::info!(address, changes = changes.len(), "applied learned patterns");
            self.applications
                .fetch_add(changes.len() as u64, Ordering::Relaxed);
            out.overall_confidence = self.scorer.overall(&out.fields);
            out.diagnostics.applied_patterns.extend(changes);
        }
        out
    }

    /// Patterns that may touch a result for `address`, most specific and
    /// most confident first.
    fn applicable_patterns(&self, address: &str, extractor: &str) -> Vec<LearnedPattern> {
        let threshold = self.tuning().learning.application_threshold;
        let domain = domain_of(address);
        let family = PlatformFamily::of_address(address);
        let state = self.read();

        let own = domain
            .as_ref()
            .and_then(|d| state.by_domain.get(d))
            .into_iter()
            .flatten();
        let mut found: Vec<(u8, LearnedPattern)> = own
            .chain(state.wide.iter())
            .filter_map(|&i| state.patterns.get(i))
            .filter(|p| p.confidence > threshold)
            .filter(|p| {
                p.scope_extractor
                    .as_deref()
                    .map_or(true, |name| name == extractor)
            })
            .filter_map(|p| {
                let rank = match &p.scope {
                    PatternScope::Domain(d) if Some(d) == domain.as_ref() => 0,
                    PatternScope::Family(f) if *f == family && f.shares_markup() => 1,
                    PatternScope::Global => 2,
                    _ => return None,
                };
                Some((rank, p.clone()))
            })
            .collect();
        found.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then_with(|| b.1.confidence.total_cmp(&a.1.confidence))
        });
        found.into_iter().map(|(_, p)| p).collect()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Seeding
    // ═══════════════════════════════════════════════════════════════════

    /// Selector hints for an address: its own discovered patterns, then
    /// those of family siblings at a discount.
    pub fn seeds_for(&self, address: &str) -> Vec<SeedHint> {
        let domain = domain_of(address);
        let family = PlatformFamily::of_address(address);
        let discount = self.tuning().learning.propagation_discount;
        let state = self.read();

        let mut best: HashMap<(Field, String), SeedHint> = HashMap::new();
        for d in state.discovered.iter().filter(|d| d.kind.is_selectable()) {
            let own = d.domain.is_some() && d.domain == domain;
            let sibling = !own && family.shares_markup() && d.family == family;
            if !own && !sibling {
                continue;
            }
            let hint = SeedHint {
                field: d.field,
                kind: d.kind,
                descriptor: d.descriptor.clone(),
                confidence: clamp_unit(if own { d.confidence } else { d.confidence * discount }),
                inherited: !own,
            };
            let key = (d.field, d.descriptor.clone());
            let better = best
                .get(&key)
                .map_or(true, |existing| hint.confidence > existing.confidence);
            if better {
                best.insert(key, hint);
            }
        }
        let mut hints: Vec<SeedHint> = best.into_values().collect();
        hints.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.descriptor.cmp(&b.descriptor))
        });
        hints
    }

    // ═══════════════════════════════════════════════════════════════════
    // Read access and snapshots
    // ═══════════════════════════════════════════════════════════════════

    pub fn corrections(&self) -> Vec<Correction> {
        self.read().corrections.clone()
    }

    pub fn learned_patterns(&self) -> Vec<LearnedPattern> {
        self.read().patterns.clone()
    }

    pub fn discovered_patterns(&self) -> Vec<DiscoveredPattern> {
        self.read().discovered.clone()
    }

    /// Patterns scoped to one domain.
    pub fn patterns_for_domain(&self, domain: &str) -> Vec<LearnedPattern> {
        let state = self.read();
        state
            .by_domain
            .get(domain)
            .map(|idx| idx.iter().filter_map(|&i| state.patterns.get(i).cloned()).collect())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.read();
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            corrections: state.corrections.clone(),
            discovered: state.discovered.clone(),
        }
    }

    /// Rebuild a store by replaying a snapshot's logs.
    ///
    /// Propagation corrections are replayed from the log rather than
    /// re-emitted, so a restore reproduces the original store exactly.
    pub fn restore(snapshot: StoreSnapshot, tuning: &Tuning) -> Self {
        let store = Self::new(tuning);
        {
            let mut state = store.write();
            for correction in snapshot.corrections {
                if let Err(e) = validate_correction(&correction) {
                    tracing::warn!(id = %correction.id, error = %e, "skipping invalid correction in snapshot");
                    continue;
                }
                store.ingest(&mut state, correction, false);
            }
            for pattern in snapshot.discovered {
                let key = (pattern.domain.clone(), pattern.field, pattern.descriptor.clone());
                if state.discovered_index.contains_key(&key) {
                    continue;
                }
                let index = state.discovered.len();
                state.discovered_index.insert(key, index);
                state.discovered.push(pattern);
            }
        }
        {
            let state = store.read();
            tracing::info!(
                corrections = state.corrections.len(),
                patterns = state.patterns.len(),
                discovered = state.discovered.len(),
                "pattern store restored"
            );
        }
        store
    }
}

fn validate_correction(correction: &Correction) -> Result<(), LearningError> {
    let malformed = |reason: &str| LearningError::MalformedPattern {
        field: correction.field,
        reason: reason.to_string(),
    };
    if correction.corrected_value.trim().is_empty() {
        return Err(malformed("corrected value is empty"));
    }
    if let Some(original) = &correction.original_value {
        if original.trim().is_empty() {
            return Err(malformed("original value is empty, nothing to match"));
        }
        if original == &correction.corrected_value {
            return Err(malformed("original and corrected values are identical"));
        }
    }
    Ok(())
}

/// Deterministic pattern id: the same rule always hashes to the same id.
pub fn pattern_id(field: Field, match_pattern: &str, scope: &PatternScope) -> String {
    let mut hasher = Sha256::new();
    hasher.update(field.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(match_pattern.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(scope.to_string().as_bytes());
    hex::encode(hasher.finalize())
}
