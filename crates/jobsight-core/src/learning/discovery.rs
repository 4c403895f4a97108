//! Pattern discovery from markup that produced a poor result.
//!
//! Candidates come from four places: structured-data blocks, elements
//! whose class/id/itemprop/data attributes carry field keywords, headings
//! with role vocabulary, and site-name/logo text for the company. Each
//! candidate scores `validator score × kind weight`; the best per field
//! above the threshold is used and remembered as a [`DiscoveredPattern`].

use std::collections::BTreeMap;

use chrono::Utc;
use scraper::ElementRef;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::LearningTuning;
use crate::models::{
    clamp_unit, Correction, CorrectionOrigin, DiscoveredPattern, DiscoveryKind, ExtractedField,
    ExtractionMethod, ExtractionResult, Field, FieldSet, PartialResult,
};
use crate::page::{element_text, Page};
use crate::source::{domain_of, PlatformFamily};
use crate::strategy::{read_job_posting, strip_hiring_lead_in};
use crate::validate::{has_role_noun, is_placeholder};

use super::{PatternStore, StoreState};

/// Fields discovery tries to recover.
const DISCOVERABLE: [Field; 3] = [Field::Title, Field::Company, Field::Location];

/// Longest element text considered for a short field.
const MAX_CANDIDATE_CHARS: usize = 200;

const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg", "html", "body"];

fn keywords(field: Field) -> &'static [&'static str] {
    match field {
        Field::Title => &["job-title", "jobtitle", "job_title", "posting-title", "position", "title", "role-name", "headline"],
        Field::Company => &["company", "employer", "organization", "organisation", "hiring-org", "brand", "org-name"],
        Field::Location => &["location", "locality", "city", "address", "region", "workplace"],
        Field::Description | Field::Salary => &[],
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    field: Field,
    kind: DiscoveryKind,
    descriptor: String,
    value: String,
}

fn is_css_ident(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn attr_value_ok(s: &str) -> bool {
    !s.is_empty() && s.len() <= 64 && !s.contains(['"', '\\', '\n'])
}

fn discovered_id(domain: Option<&str>, field: Field, descriptor: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain.unwrap_or("*").as_bytes());
    hasher.update(b"\x1f");
    hasher.update(field.as_str().as_bytes());
    hasher.update(b"\x1f");
    hasher.update(descriptor.as_bytes());
    hex::encode(hasher.finalize())
}

fn structured_candidates(page: &Page, needed: &[Field], out: &mut Vec<Candidate>) {
    if let Some(posting) = page.job_posting() {
        let fields = read_job_posting(posting, 1.0);
        for &field in needed {
            if let Some(v) = fields.get(field).value() {
                out.push(Candidate {
                    field,
                    kind: DiscoveryKind::StructuredData,
                    descriptor: format!("ld+json:JobPosting.{}", field),
                    value: v.to_string(),
                });
            }
        }
    }
    if needed.contains(&Field::Company) {
        for block in page.structured_blocks() {
            if let Some(name) = organization(block) {
                out.push(Candidate {
                    field: Field::Company,
                    kind: DiscoveryKind::StructuredData,
                    descriptor: "ld+json:Organization.name".to_string(),
                    value: name,
                });
            }
        }
    }
}

fn organization(value: &Value) -> Option<String> {
    match value {
        Value::Array(items) => items.iter().find_map(organization),
        Value::Object(map) => {
            let is_org = map
                .get("@type")
                .and_then(Value::as_str)
                .is_some_and(|t| t == "Organization" || t == "Corporation");
            if is_org {
                map.get("name")
                    .and_then(Value::as_str)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            } else {
                map.get("@graph").and_then(organization)
            }
        }
        _ => None,
    }
}

fn attribute_candidates(page: &Page, needed: &[Field], out: &mut Vec<Candidate>) {
    for node in page.html().root_element().descendants() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        let tag = el.value().name();
        if SKIPPED_TAGS.contains(&tag) {
            continue;
        }
        let is_meta = tag == "meta";
        let text = if is_meta {
            el.value().attr("content").map(str::to_string).unwrap_or_default()
        } else {
            element_text(el)
        };
        let text = text.trim();
        if text.is_empty() || text.chars().count() > MAX_CANDIDATE_CHARS {
            continue;
        }
        let suffix = if is_meta { "@content" } else { "" };

        for (name, value) in el.value().attrs() {
            let lowered = value.to_ascii_lowercase();
            let mut hooks: Vec<(String, DiscoveryKind, String)> = Vec::new();
            match name {
                "class" => {
                    for token in value.split_whitespace().filter(|t| is_css_ident(t)) {
                        hooks.push((
                            token.to_ascii_lowercase(),
                            DiscoveryKind::Selector,
                            format!("{}.{}", tag, token),
                        ));
                    }
                }
                "id" if is_css_ident(value) => {
                    hooks.push((lowered, DiscoveryKind::Selector, format!("#{}", value)));
                }
                "itemprop" if attr_value_ok(value) => {
                    hooks.push((
                        lowered,
                        DiscoveryKind::Attribute,
                        format!(r#"{}[itemprop="{}"]{}"#, tag, value, suffix),
                    ));
                }
                n if n.starts_with("data-") && attr_value_ok(value) && is_css_ident(n) => {
                    hooks.push((
                        format!("{} {}", n, lowered),
                        DiscoveryKind::Attribute,
                        format!(r#"[{}="{}"]{}"#, n, value, suffix),
                    ));
                }
                _ => {}
            }
            for (haystack, kind, descriptor) in hooks {
                for &field in needed {
                    if keywords(field).iter().any(|k| haystack.contains(k)) {
                        out.push(Candidate {
                            field,
                            kind,
                            descriptor: descriptor.clone(),
                            value: text.to_string(),
                        });
                    }
                }
            }
        }
    }
}

fn heading_candidates(page: &Page, out: &mut Vec<Candidate>) {
    for (level, heading) in page.headings() {
        if level > 3 {
            continue;
        }
        let text = strip_hiring_lead_in(&heading);
        if has_role_noun(&text) && text.chars().count() <= MAX_CANDIDATE_CHARS {
            out.push(Candidate {
                field: Field::Title,
                kind: DiscoveryKind::TextPattern,
                descriptor: format!("h{}", level),
                value: text,
            });
        }
    }
}

fn company_name_candidates(page: &Page, out: &mut Vec<Candidate>) {
    let tags = page.meta_tags();
    for (key, descriptor) in [
        ("og:site_name", r#"meta[property="og:site_name"]@content"#),
        ("application-name", r#"meta[name="application-name"]@content"#),
    ] {
        if let Some(v) = tags.get(key) {
            out.push(Candidate {
                field: Field::Company,
                kind: DiscoveryKind::Attribute,
                descriptor: descriptor.to_string(),
                value: v.clone(),
            });
        }
    }

    for node in page.html().root_element().descendants() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        if el.value().name() != "img" {
            continue;
        }
        let Some(alt) = el.value().attr("alt") else {
            continue;
        };
        let logo_class = el
            .value()
            .classes()
            .find(|c| c.to_ascii_lowercase().contains("logo") && is_css_ident(c));
        let descriptor = match logo_class {
            Some(class) => format!("img.{}@alt", class),
            None if el.value().attr("src").is_some_and(|s| s.to_ascii_lowercase().contains("logo")) => {
                r#"img[src*="logo"]@alt"#.to_string()
            }
            None => continue,
        };
        let name = alt
            .trim()
            .trim_end_matches(|c: char| c.is_whitespace() || c == '-')
            .to_string();
        let name = strip_logo_suffix(&name);
        if !name.is_empty() {
            out.push(Candidate {
                field: Field::Company,
                kind: DiscoveryKind::Attribute,
                descriptor,
                value: name,
            });
        }
    }
}

fn strip_logo_suffix(alt: &str) -> String {
    let lower = alt.to_ascii_lowercase();
    for suffix in [" company logo", " logo"] {
        if lower.ends_with(suffix) {
            return alt[..alt.len() - suffix.len()].trim().to_string();
        }
    }
    alt.trim().to_string()
}

impl PatternStore {
    /// Look for field values the failed result lacks.
    ///
    /// Only title, company and location are searched, and only when the
    /// failed result has them missing or as placeholders. Winning
    /// candidates are recorded as discovered patterns and as
    /// automatic-discovery corrections.
    pub fn discover_patterns_from_markup(
        &self,
        address: &str,
        markup: &str,
        failed: &ExtractionResult,
    ) -> PartialResult {
        let needed: Vec<Field> = DISCOVERABLE
            .into_iter()
            .filter(|f| failed.value(*f).map_or(true, is_placeholder))
            .collect();
        if needed.is_empty() {
            return PartialResult::empty(ExtractionMethod::Discovery);
        }

        let page = Page::parse(markup);
        let mut candidates = Vec::new();
        structured_candidates(&page, &needed, &mut candidates);
        attribute_candidates(&page, &needed, &mut candidates);
        if needed.contains(&Field::Title) {
            heading_candidates(&page, &mut candidates);
        }
        if needed.contains(&Field::Company) {
            company_name_candidates(&page, &mut candidates);
        }

        let domain = domain_of(address);
        let family = PlatformFamily::of_address(address);
        let learning = self.tuning().learning.clone();
        let validator = self.scorer.validator();

        let mut winners: BTreeMap<Field, (Candidate, f64)> = BTreeMap::new();
        {
            let state = self.read();
            for candidate in candidates {
                if !needed.contains(&candidate.field) || is_placeholder(&candidate.value) {
                    continue;
                }
                let score = clamp_unit(
                    validator.score(candidate.field, &candidate.value) * candidate.kind.weight(),
                );
                let mut threshold = learning.discovery_threshold;
                if sibling_knows(&state, family, domain.as_deref(), &candidate) {
                    threshold -= learning.sibling_discovery_bonus;
                }
                if score < threshold {
                    continue;
                }
                let better = winners
                    .get(&candidate.field)
                    .map_or(true, |(_, best)| score > *best);
                if better {
                    winners.insert(candidate.field, (candidate, score));
                }
            }
        }

        let mut fields = FieldSet::default();
        let mut corrections = Vec::new();
        {
            let mut state = self.write();
            for (field, (candidate, score)) in &winners {
                let pattern = upsert_discovered(
                    &mut state,
                    &learning,
                    domain.clone(),
                    family,
                    candidate,
                    *score,
                );
                tracing::info!(
                    field = %field,
                    kind = ?pattern.kind,
                    descriptor = %pattern.descriptor,
                    score,
                    "discovered field location"
                );
                fields.set(*field, ExtractedField::new(&candidate.value, *score));
                corrections.push(Correction::new(
                    address,
                    *field,
                    failed.value(*field).map(str::to_string),
                    candidate.value.clone(),
                    failed.extractor.clone(),
                    *score,
                    CorrectionOrigin::AutomaticDiscovery,
                ));
            }
        }

        for correction in corrections {
            if let Err(e) = self.record_correction(correction) {
                tracing::debug!(error = %e, "discovery correction not recorded");
            }
        }

        PartialResult {
            fields,
            method: ExtractionMethod::Discovery,
        }
    }
}

/// Whether a sibling domain of the same family already found this
/// descriptor for this field.
fn sibling_knows(
    state: &StoreState,
    family: PlatformFamily,
    domain: Option<&str>,
    candidate: &Candidate,
) -> bool {
    family.shares_markup()
        && state.discovered.iter().any(|d| {
            d.family == family
                && d.domain.as_deref() != domain
                && d.field == candidate.field
                && d.descriptor == candidate.descriptor
        })
}

fn upsert_discovered(
    state: &mut StoreState,
    learning: &LearningTuning,
    domain: Option<String>,
    family: PlatformFamily,
    candidate: &Candidate,
    score: f64,
) -> DiscoveredPattern {
    let key = (domain.clone(), candidate.field, candidate.descriptor.clone());
    if let Some(&i) = state.discovered_index.get(&key) {
        let d = &mut state.discovered[i];
        d.hits = d.hits.saturating_add(1);
        d.confidence =
            clamp_unit((d.confidence.max(score) + learning.reinforcement_step).min(learning.confidence_cap));
        if !d.examples.contains(&candidate.value) {
            d.examples.push(candidate.value.clone());
            if d.examples.len() > learning.max_examples {
                d.examples.remove(0);
            }
        }
        return d.clone();
    }

    let pattern = DiscoveredPattern {
        id: discovered_id(domain.as_deref(), candidate.field, &candidate.descriptor),
        kind: candidate.kind,
        domain,
        family,
        field: candidate.field,
        descriptor: candidate.descriptor.clone(),
        confidence: clamp_unit(score.min(learning.confidence_cap)),
        hits: 1,
        examples: vec![candidate.value.clone()],
        discovered_at: Utc::now(),
    };
    state.discovered_index.insert(key, state.discovered.len());
    state.discovered.push(pattern.clone());
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tuning;
    use crate::learning::{StoreSnapshot, SNAPSHOT_VERSION};
    use crate::models::{Diagnostics, PageMetadata, QualityVerdict};

    fn failed(address: &str, title: Option<&str>, company: Option<&str>) -> ExtractionResult {
        let mut fields = FieldSet::default();
        if let Some(t) = title {
            fields.title = ExtractedField::new(t, 0.5);
        }
        if let Some(c) = company {
            fields.company = ExtractedField::new(c, 0.5);
        }
        ExtractionResult {
            address: address.to_string(),
            fields,
            overall_confidence: 0.2,
            extractor: "generic".to_string(),
            method: ExtractionMethod::TextPattern,
            extracted_at: Utc::now(),
            metadata: PageMetadata::default(),
            diagnostics: Diagnostics {
                verdict: QualityVerdict::Placeholder,
                ..Diagnostics::default()
            },
        }
    }

    const MARKUP: &str = r#"<html><head>
        <meta property="og:site_name" content="Hooli">
      </head><body>
        <div class="posting-hdr"><span class="req-title">Senior Data Engineer</span></div>
        <div data-field="employer">Hooli Inc</div>
        <p class="job-location">Palo Alto, CA</p>
      </body></html>"#;

    #[test]
    fn finds_fields_behind_keyword_attributes() {
        let store = PatternStore::new(&Tuning::default());
        let address = "https://careers.hooli.example/job/1";
        let partial = store.discover_patterns_from_markup(
            address,
            MARKUP,
            &failed(address, Some("Unknown Position"), Some("Unknown Company")),
        );
        assert_eq!(partial.method, ExtractionMethod::Discovery);
        assert_eq!(partial.fields.title.value(), Some("Senior Data Engineer"));
        assert_eq!(partial.fields.company.value(), Some("Hooli Inc"));
        assert_eq!(partial.fields.location.value(), Some("Palo Alto, CA"));

        let discovered = store.discovered_patterns();
        assert!(discovered
            .iter()
            .any(|d| d.field == Field::Title && d.descriptor == "span.req-title"));
        assert!(store
            .corrections()
            .iter()
            .all(|c| c.origin == CorrectionOrigin::AutomaticDiscovery));
        // The placeholder company was replaced, which yields a pattern;
        // the title correction is only logged.
        let patterns = store.learned_patterns();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].field, Field::Company);
    }

    #[test]
    fn skips_fields_that_are_already_good() {
        let store = PatternStore::new(&Tuning::default());
        let address = "https://careers.hooli.example/job/1";
        let partial = store.discover_patterns_from_markup(
            address,
            MARKUP,
            &failed(address, Some("Data Engineer"), Some("Hooli")),
        );
        assert!(partial.fields.title.value().is_none());
        assert!(partial.fields.company.value().is_none());
        assert_eq!(partial.fields.location.value(), Some("Palo Alto, CA"));
    }

    #[test]
    fn repeated_discovery_reinforces() {
        let store = PatternStore::new(&Tuning::default());
        let address = "https://careers.hooli.example/job/1";
        let f = failed(address, None, None);
        store.discover_patterns_from_markup(address, MARKUP, &f);
        let first = store.discovered_patterns();
        store.discover_patterns_from_markup(address, MARKUP, &f);
        let second = store.discovered_patterns();
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(second.iter()) {
            assert!(b.confidence >= a.confidence);
            assert_eq!(b.hits, a.hits + 1);
        }
    }

    const WORKDAY_MARKUP: &str =
        r#"<html><body><h2 class="wd-title">Senior Data Engineer</h2></body></html>"#;

    fn known_to(domain: &str, family: PlatformFamily) -> DiscoveredPattern {
        DiscoveredPattern {
            id: discovered_id(Some(domain), Field::Title, "h2.wd-title"),
            kind: DiscoveryKind::Selector,
            domain: Some(domain.to_string()),
            family,
            field: Field::Title,
            descriptor: "h2.wd-title".to_string(),
            confidence: 0.8,
            hits: 1,
            examples: vec!["Staff Accountant".to_string()],
            discovered_at: Utc::now(),
        }
    }

    /// A threshold just above what the `h2.wd-title` candidate scores, so
    /// only the sibling bonus lets it through.
    fn tight_tuning() -> Tuning {
        let mut tuning = Tuning::default();
        let score = PatternStore::new(&tuning)
            .scorer
            .validator()
            .score(Field::Title, "Senior Data Engineer")
            * DiscoveryKind::Selector.weight();
        tuning.learning.discovery_threshold = score + tuning.learning.sibling_discovery_bonus / 2.0;
        tuning
    }

    #[test]
    fn sibling_knowledge_lowers_the_bar() {
        let tuning = tight_tuning();
        let address = "https://globex.wd5.myworkdayjobs.com/job/1";
        let f = failed(address, None, None);

        let alone = PatternStore::new(&tuning);
        let partial = alone.discover_patterns_from_markup(address, WORKDAY_MARKUP, &f);
        assert!(partial.fields.title.value().is_none());

        let snapshot = StoreSnapshot {
            version: SNAPSHOT_VERSION,
            corrections: Vec::new(),
            discovered: vec![known_to("acme.wd1.myworkdayjobs.com", PlatformFamily::Workday)],
        };
        let informed = PatternStore::restore(snapshot, &tuning);
        let partial = informed.discover_patterns_from_markup(address, WORKDAY_MARKUP, &f);
        assert_eq!(partial.fields.title.value(), Some("Senior Data Engineer"));
        assert!(informed
            .discovered_patterns()
            .iter()
            .any(|d| d.domain.as_deref() == Some("globex.wd5.myworkdayjobs.com")
                && d.descriptor == "h2.wd-title"));
    }

    #[test]
    fn generic_domains_get_no_sibling_bonus() {
        let tuning = tight_tuning();
        let address = "https://initech.example/job/1";
        let snapshot = StoreSnapshot {
            version: SNAPSHOT_VERSION,
            corrections: Vec::new(),
            discovered: vec![known_to("globex.example", PlatformFamily::Generic)],
        };
        let store = PatternStore::restore(snapshot, &tuning);
        let partial =
            store.discover_patterns_from_markup(address, WORKDAY_MARKUP, &failed(address, None, None));
        assert!(partial.fields.title.value().is_none());
    }

    #[test]
    fn logo_alt_text_names_the_company() {
        let mut out = Vec::new();
        let page = Page::parse(r#"<img class="site-logo" src="/a.png" alt="Initech logo">"#);
        company_name_candidates(&page, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, "Initech");
        assert_eq!(out[0].descriptor, "img.site-logo@alt");
    }
}
