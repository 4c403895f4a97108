//! Source addresses, network domains and platform families.
//!
//! A platform family is a class of sites that share the same ATS or board
//! software and therefore share markup conventions. Families drive two
//! things: which [`Extractor`](crate::extractor::Extractor) handles an
//! address, and which domains may inherit each other's discovered patterns.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Known ATS and job-board families.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    Workday,
    Greenhouse,
    Lever,
    Ashby,
    SmartRecruiters,
    Icims,
    LinkedIn,
    Indeed,
    Glassdoor,
    #[default]
    Generic,
}

impl PlatformFamily {
    /// Every family with a dedicated extractor.
    pub const KNOWN: [PlatformFamily; 9] = [
        PlatformFamily::Workday,
        PlatformFamily::Greenhouse,
        PlatformFamily::Lever,
        PlatformFamily::Ashby,
        PlatformFamily::SmartRecruiters,
        PlatformFamily::Icims,
        PlatformFamily::LinkedIn,
        PlatformFamily::Indeed,
        PlatformFamily::Glassdoor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformFamily::Workday => "workday",
            PlatformFamily::Greenhouse => "greenhouse",
            PlatformFamily::Lever => "lever",
            PlatformFamily::Ashby => "ashby",
            PlatformFamily::SmartRecruiters => "smartrecruiters",
            PlatformFamily::Icims => "icims",
            PlatformFamily::LinkedIn => "linkedin",
            PlatformFamily::Indeed => "indeed",
            PlatformFamily::Glassdoor => "glassdoor",
            PlatformFamily::Generic => "generic",
        }
    }

    /// Host suffixes that identify the family.
    fn host_suffixes(&self) -> &'static [&'static str] {
        match self {
            PlatformFamily::Workday => &["myworkdayjobs.com", "myworkdaysite.com", "workday.com"],
            PlatformFamily::Greenhouse => &["greenhouse.io"],
            PlatformFamily::Lever => &["lever.co"],
            PlatformFamily::Ashby => &["ashbyhq.com"],
            PlatformFamily::SmartRecruiters => &["smartrecruiters.com"],
            PlatformFamily::Icims => &["icims.com"],
            PlatformFamily::LinkedIn => &["linkedin.com"],
            PlatformFamily::Indeed => &["indeed.com"],
            PlatformFamily::Glassdoor => &["glassdoor.com"],
            PlatformFamily::Generic => &[],
        }
    }

    /// Detect the family of a domain by suffix.
    pub fn of_domain(domain: &str) -> PlatformFamily {
        let domain = domain.to_ascii_lowercase();
        Self::KNOWN
            .into_iter()
            .find(|family| {
                family
                    .host_suffixes()
                    .iter()
                    .any(|suffix| domain == *suffix || domain.ends_with(&format!(".{}", suffix)))
            })
            .unwrap_or(PlatformFamily::Generic)
    }

    /// Detect the family of a full address.
    pub fn of_address(address: &str) -> PlatformFamily {
        domain_of(address)
            .map(|d| Self::of_domain(&d))
            .unwrap_or(PlatformFamily::Generic)
    }

    /// Whether members of this family may share discovered patterns.
    pub fn shares_markup(&self) -> bool {
        !matches!(self, PlatformFamily::Generic)
    }

    /// Job boards aggregate many employers, so the host never names the
    /// company.
    pub fn is_board(&self) -> bool {
        matches!(
            self,
            PlatformFamily::LinkedIn | PlatformFamily::Indeed | PlatformFamily::Glassdoor
        )
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of where a posting is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    JobBoard,
    Ats,
    CompanySite,
    #[default]
    Other,
}

impl SourceKind {
    pub fn classify(address: &str) -> SourceKind {
        let family = PlatformFamily::of_address(address);
        if family.is_board() {
            return SourceKind::JobBoard;
        }
        if family.shares_markup() {
            return SourceKind::Ats;
        }
        let host = domain_of(address).unwrap_or_default();
        let path = Url::parse(address)
            .map(|u| u.path().to_ascii_lowercase())
            .unwrap_or_default();
        if host.starts_with("careers.")
            || host.starts_with("jobs.")
            || path.contains("/careers")
            || path.contains("/jobs")
        {
            SourceKind::CompanySite
        } else {
            SourceKind::Other
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Domains
// ═══════════════════════════════════════════════════════════════════════

fn parse_address(address: &str) -> Option<Url> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return None;
    }
    Url::parse(trimmed)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{}", trimmed)).ok())
        .filter(|u| u.host_str().map(|h| h.contains('.')).unwrap_or(false))
}

/// The lowercase network domain of an address, without a leading `www.`.
///
/// Returns `None` for malformed addresses; callers treat that as
/// "unscoped" rather than as an error.
pub fn domain_of(address: &str) -> Option<String> {
    let url = parse_address(address)?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

fn path_segments(address: &str) -> Vec<String> {
    parse_address(address)
        .and_then(|u| {
            u.path_segments()
                .map(|segs| segs.filter(|s| !s.is_empty()).map(str::to_string).collect())
        })
        .unwrap_or_default()
}

/// Subdomain labels that never name the employer.
const GENERIC_LABELS: &[&str] = &[
    "www", "careers", "career", "jobs", "job", "apply", "work", "hire", "talent", "recruiting",
    "boards", "join", "en", "us", "app",
];

/// Second-level labels that form part of a country suffix (`co.uk`).
const SECOND_LEVEL_SUFFIXES: &[&str] = &["co", "com", "org", "net", "ac", "gov", "edu"];

/// Derive a company name candidate from the address.
///
/// ATS families with tenant-bearing URLs use the tenant; job boards yield
/// nothing; everything else uses the registrable part of the host.
pub fn derive_company(address: &str, family: PlatformFamily) -> Option<String> {
    let domain = domain_of(address)?;
    let raw = match family {
        PlatformFamily::Workday => {
            if domain.ends_with("myworkdaysite.com") {
                path_segments(address).get(1).cloned()
            } else {
                domain.split('.').next().map(str::to_string)
            }
        }
        PlatformFamily::Greenhouse
        | PlatformFamily::Lever
        | PlatformFamily::Ashby
        | PlatformFamily::SmartRecruiters => path_segments(address)
            .into_iter()
            .find(|s| !matches!(s.as_str(), "embed" | "job_app" | "jobs")),
        PlatformFamily::Icims => domain.split('.').next().map(|label| {
            label
                .trim_start_matches("careers-")
                .trim_start_matches("jobs-")
                .to_string()
        }),
        PlatformFamily::LinkedIn | PlatformFamily::Indeed | PlatformFamily::Glassdoor => None,
        PlatformFamily::Generic => registrable_label(&domain),
    }?;
    let name = humanize(&raw);
    if name.chars().any(char::is_alphabetic) {
        Some(name)
    } else {
        None
    }
}

fn registrable_label(domain: &str) -> Option<String> {
    let mut labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return None;
    }
    labels.pop();
    if labels.len() >= 2 {
        if let Some(last) = labels.last() {
            if SECOND_LEVEL_SUFFIXES.contains(last) {
                labels.pop();
            }
        }
    }
    labels
        .into_iter()
        .rev()
        .find(|l| !GENERIC_LABELS.contains(l))
        .map(str::to_string)
}

/// Turn a slug like `acme-robotics` into `Acme Robotics`.
pub fn humanize(slug: &str) -> String {
    slug.split(|c: char| c == '-' || c == '_' || c == '+' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

static BRANDING_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*[|\-–—·:]\s*(?:linkedin|indeed(?:\.com)?|glassdoor|workday|greenhouse|lever|smartrecruiters|icims|ashby|careers?(?: site| page)?|jobs?(?: board)?|job search)\s*$",
    )
    .unwrap()
});

/// Strip trailing site-branding fragments such as `| Indeed` or `— LinkedIn`.
pub fn strip_title_branding(title: &str) -> String {
    let mut current = title.trim().to_string();
    loop {
        let stripped = BRANDING_SUFFIX.replace(&current, "").trim().to_string();
        if stripped == current || stripped.is_empty() {
            return current;
        }
        current = stripped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_strips_www_and_lowercases() {
        assert_eq!(
            domain_of("https://WWW.Example.com/jobs/1").as_deref(),
            Some("example.com")
        );
        assert_eq!(
            domain_of("apply.deloitte.com/job/42").as_deref(),
            Some("apply.deloitte.com")
        );
    }

    #[test]
    fn malformed_address_has_no_domain() {
        assert_eq!(domain_of(""), None);
        assert_eq!(domain_of("not a url"), None);
    }

    #[test]
    fn detects_families_by_suffix() {
        assert_eq!(
            PlatformFamily::of_address("https://acme.wd5.myworkdayjobs.com/en-US/External/job/1"),
            PlatformFamily::Workday
        );
        assert_eq!(
            PlatformFamily::of_address("https://boards.greenhouse.io/acme/jobs/123"),
            PlatformFamily::Greenhouse
        );
        assert_eq!(
            PlatformFamily::of_address("https://uk.indeed.com/viewjob?jk=1"),
            PlatformFamily::Indeed
        );
        assert_eq!(
            PlatformFamily::of_address("https://notlever.com/jobs"),
            PlatformFamily::Generic
        );
    }

    #[test]
    fn derives_company_from_generic_domain() {
        assert_eq!(
            derive_company("https://careers.acme-robotics.com/job/1", PlatformFamily::Generic)
                .as_deref(),
            Some("Acme Robotics")
        );
        assert_eq!(
            derive_company("https://jobs.example.co.uk/x", PlatformFamily::Generic).as_deref(),
            Some("Example")
        );
    }

    #[test]
    fn derives_company_from_tenant() {
        assert_eq!(
            derive_company(
                "https://acme.wd5.myworkdayjobs.com/External/job/1",
                PlatformFamily::Workday
            )
            .as_deref(),
            Some("Acme")
        );
        assert_eq!(
            derive_company("https://jobs.lever.co/globex/abc", PlatformFamily::Lever).as_deref(),
            Some("Globex")
        );
        assert_eq!(
            derive_company("https://www.linkedin.com/jobs/view/1", PlatformFamily::LinkedIn),
            None
        );
    }

    #[test]
    fn strips_repeated_branding() {
        assert_eq!(
            strip_title_branding("Data Engineer | Indeed.com"),
            "Data Engineer"
        );
        assert_eq!(
            strip_title_branding("Product Designer — LinkedIn"),
            "Product Designer"
        );
        assert_eq!(strip_title_branding("Careers"), "Careers");
    }

    #[test]
    fn classifies_source_kind() {
        assert_eq!(
            SourceKind::classify("https://www.glassdoor.com/job-listing/x"),
            SourceKind::JobBoard
        );
        assert_eq!(
            SourceKind::classify("https://careers.example.com/42"),
            SourceKind::CompanySite
        );
        assert_eq!(SourceKind::classify("https://example.com/about"), SourceKind::Other);
    }
}
