//! Site-convention selectors.
//!
//! Each platform family has markup conventions (data attributes, class
//! names) that reliably wrap the title, company and location. Seeded
//! selectors learned by pattern discovery are tried before the built-in
//! ones.

use crate::error::StrategyError;
use crate::models::{ExtractedField, ExtractionMethod, Field, FieldSet, PartialResult};
use crate::source::PlatformFamily;
use crate::validate::is_placeholder;

use super::{Strategy, StrategyContext};

/// Seed for selectors specific to the page's platform family.
pub const FAMILY_SELECTOR_SEED: f64 = 0.85;
/// Seed for conventions shared across many sites.
pub const UNIVERSAL_SELECTOR_SEED: f64 = 0.75;

/// Built-in selectors per field.
#[derive(Debug, Clone, Copy)]
pub struct SelectorSet {
    pub title: &'static [&'static str],
    pub company: &'static [&'static str],
    pub location: &'static [&'static str],
    pub description: &'static [&'static str],
    pub salary: &'static [&'static str],
}

impl SelectorSet {
    pub fn get(&self, field: Field) -> &'static [&'static str] {
        match field {
            Field::Title => self.title,
            Field::Company => self.company,
            Field::Location => self.location,
            Field::Description => self.description,
            Field::Salary => self.salary,
        }
    }

    pub fn for_family(family: PlatformFamily) -> Option<SelectorSet> {
        let set = match family {
            PlatformFamily::Workday => SelectorSet {
                title: &[r#"[data-automation-id="jobPostingHeader"]"#],
                company: &[r#"[data-automation-id="company"]"#],
                location: &[r#"[data-automation-id="locations"] dd"#, r#"[data-automation-id="locations"]"#],
                description: &[r#"[data-automation-id="jobPostingDescription"]"#],
                salary: &[],
            },
            PlatformFamily::Greenhouse => SelectorSet {
                title: &[".app-title", "h1.section-header", ".job__title h1"],
                company: &[".company-name"],
                location: &[".location", ".job__location"],
                description: &["#content", ".job__description"],
                salary: &[".pay-range"],
            },
            PlatformFamily::Lever => SelectorSet {
                title: &[".posting-headline h2"],
                company: &[r#"meta[property="og:site_name"]@content"#],
                location: &[".posting-categories .location", ".sort-by-location"],
                description: &[r#"[data-qa="job-description"]"#, ".posting-page .section-wrapper"],
                salary: &[".posting-categories .compensation"],
            },
            PlatformFamily::Ashby => SelectorSet {
                title: &[".ashby-job-posting-heading", r#"h1[class*="title"]"#],
                company: &[r#"meta[property="og:site_name"]@content"#],
                location: &[".ashby-job-posting-location"],
                description: &[".ashby-job-posting-description"],
                salary: &[".ashby-job-posting-compensation"],
            },
            PlatformFamily::SmartRecruiters => SelectorSet {
                title: &["h1.job-title", r#"[itemprop="title"]"#],
                company: &[r#"[itemprop="hiringOrganization"] [itemprop="name"]"#, ".company-name"],
                location: &[r#"[itemprop="jobLocation"]"#, "spl-job-location"],
                description: &[r#"[itemprop="description"]"#],
                salary: &[],
            },
            PlatformFamily::Icims => SelectorSet {
                title: &[".iCIMS_Header", "h1.iCIMS_JobTitle"],
                company: &[".iCIMS_Company"],
                location: &[".iCIMS_JobHeaderData .iCIMS_JobHeaderLocation", ".header.left span"],
                description: &[".iCIMS_JobContent", ".iCIMS_InfoMsg_Job"],
                salary: &[],
            },
            PlatformFamily::LinkedIn => SelectorSet {
                title: &[".top-card-layout__title", ".job-details-jobs-unified-top-card__job-title"],
                company: &[".topcard__org-name-link", ".job-details-jobs-unified-top-card__company-name"],
                location: &[".topcard__flavor--bullet", ".job-details-jobs-unified-top-card__bullet"],
                description: &[".show-more-less-html__markup", ".jobs-description__content"],
                salary: &[".compensation__salary"],
            },
            PlatformFamily::Indeed => SelectorSet {
                title: &[r#"[data-testid="jobsearch-JobInfoHeader-title"]"#, ".jobsearch-JobInfoHeader-title"],
                company: &[r#"[data-testid="inlineHeader-companyName"]"#, r#"[data-company-name="true"]"#],
                location: &[r#"[data-testid="inlineHeader-companyLocation"]"#, r#"[data-testid="job-location"]"#],
                description: &["#jobDescriptionText"],
                salary: &["#salaryInfoAndJobType"],
            },
            PlatformFamily::Glassdoor => SelectorSet {
                title: &[r#"[data-test="job-title"]"#],
                company: &[r#"[data-test="employer-name"]"#],
                location: &[r#"[data-test="location"]"#],
                description: &[".jobDescriptionContent", r#"[data-test="jobDescription"]"#],
                salary: &[r#"[data-test="detailSalary"]"#],
            },
            PlatformFamily::Generic => return None,
        };
        Some(set)
    }

    /// Conventions common enough to try on any site.
    pub fn universal() -> SelectorSet {
        SelectorSet {
            title: &[r#"[itemprop="title"]"#, ".job-title", ".posting-title", "#job-title"],
            company: &[
                r#"[itemprop="hiringOrganization"] [itemprop="name"]"#,
                r#"[itemprop="hiringOrganization"]"#,
                ".company-name",
                ".employer-name",
            ],
            location: &[r#"[itemprop="jobLocation"]"#, ".job-location", ".location-name"],
            description: &[r#"[itemprop="description"]"#, ".job-description", "#job-description"],
            salary: &[r#"[itemprop="baseSalary"]"#, ".salary", ".job-salary"],
        }
    }
}

pub struct SelectorStrategy {
    family: Option<SelectorSet>,
    universal: SelectorSet,
}

impl SelectorStrategy {
    pub fn for_family(family: PlatformFamily) -> Self {
        Self {
            family: SelectorSet::for_family(family),
            universal: SelectorSet::universal(),
        }
    }

    /// First usable value a list of selectors yields.
    fn first_match(
        ctx: &StrategyContext<'_>,
        selectors: &[&str],
    ) -> Result<Option<String>, StrategyError> {
        for selector in selectors {
            let values = ctx.page.select_values(selector)?;
            if let Some(v) = values.into_iter().find(|v| !is_placeholder(v)) {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    fn seeded(ctx: &StrategyContext<'_>, field: Field) -> Option<ExtractedField> {
        ctx.seeds
            .iter()
            .filter(|s| s.field == field && s.kind.is_selectable())
            .find_map(|hint| match ctx.page.select_values(&hint.descriptor) {
                Ok(values) => values
                    .into_iter()
                    .find(|v| !is_placeholder(v))
                    .map(|v| ExtractedField::new(v, seeded_confidence(hint.confidence))),
                Err(e) => {
                    tracing::debug!(descriptor = %hint.descriptor, error = %e, "unusable seed");
                    None
                }
            })
    }
}

/// Seeded selectors sit between the universal and family bands, rising
/// with the confidence of the discovered pattern.
fn seeded_confidence(hint_confidence: f64) -> f64 {
    (UNIVERSAL_SELECTOR_SEED + 0.1 * hint_confidence).min(FAMILY_SELECTOR_SEED)
}

impl Strategy for SelectorStrategy {
    fn method(&self) -> ExtractionMethod {
        ExtractionMethod::Selector
    }

    fn priority(&self) -> u8 {
        10
    }

    fn extract(&self, ctx: &StrategyContext<'_>) -> Result<PartialResult, StrategyError> {
        if !ctx.page.is_markup() {
            return Err(StrategyError::NoCandidates);
        }
        let mut fields = FieldSet::default();
        for field in Field::ALL {
            if let Some(found) = Self::seeded(ctx, field) {
                fields.set(field, found);
                continue;
            }
            if let Some(set) = &self.family {
                if let Some(v) = Self::first_match(ctx, set.get(field))? {
                    fields.set(field, ExtractedField::new(v, FAMILY_SELECTOR_SEED));
                    continue;
                }
            }
            if let Some(v) = Self::first_match(ctx, self.universal.get(field))? {
                fields.set(field, ExtractedField::new(v, UNIVERSAL_SELECTOR_SEED));
            }
        }
        Ok(PartialResult {
            fields,
            method: ExtractionMethod::Selector,
        })
    }
}
