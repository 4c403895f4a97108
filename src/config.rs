//! TOML configuration for the `jobsight` binary and library.
//!
//! ```toml
//! [tuning.learning]
//! application_threshold = 0.7
//!
//! [fetch]
//! timeout_secs = 15
//!
//! [cross_validation]
//! provider = "http"
//! endpoint = "https://assess.example.com/v1/jobs"
//! api_key_env = "JOBSIGHT_ASSESS_KEY"
//!
//! [state]
//! path = "./data/jobsight-state.json"
//! ```
//!
//! Every section is optional. A missing config file yields
//! [`Config::default`]; a present but invalid one is an error.

use anyhow::{bail, Context, Result};
use jobsight_core::Tuning;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub tuning: Tuning,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub cross_validation: CrossValidationConfig,
    #[serde(default)]
    pub state: StateConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    format!("jobsight/{}", env!("CARGO_PKG_VERSION"))
}
fn default_max_redirects() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrossValidationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the bearer token.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CrossValidationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            api_key_env: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}

impl CrossValidationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StateConfig {
    /// JSON snapshot of the pattern store. Learning is not persisted
    /// when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        bail!("{} must be in [0.0, 1.0], got {}", name, value);
    }
    Ok(())
}

/// Validate a parsed configuration.
pub fn validate(config: &Config) -> Result<()> {
    let t = &config.tuning;

    // Validate tuning
    let w = &t.weights;
    for (name, value) in [
        ("tuning.weights.title", w.title),
        ("tuning.weights.company", w.company),
        ("tuning.weights.description", w.description),
        ("tuning.weights.location", w.location),
        ("tuning.weights.salary", w.salary),
    ] {
        check_unit(name, value)?;
    }
    if w.total() <= 0.0 {
        bail!("tuning.weights must not all be zero");
    }

    let l = &t.learning;
    for (name, value) in [
        ("tuning.quality.min_overall", t.quality.min_overall),
        ("tuning.quality.min_title", t.quality.min_title),
        ("tuning.quality.min_company", t.quality.min_company),
        ("tuning.early_exit_confidence", t.early_exit_confidence),
        ("tuning.pass_mark", t.pass_mark),
        ("tuning.learning.reinforcement_step", l.reinforcement_step),
        ("tuning.learning.confidence_cap", l.confidence_cap),
        ("tuning.learning.application_threshold", l.application_threshold),
        ("tuning.learning.discovery_threshold", l.discovery_threshold),
        ("tuning.learning.sibling_discovery_bonus", l.sibling_discovery_bonus),
        ("tuning.learning.propagation_discount", l.propagation_discount),
        ("tuning.similarity.company_overlap", t.similarity.company_overlap),
        ("tuning.similarity.title_overlap", t.similarity.title_overlap),
        ("tuning.similarity.min_reference_confidence", t.similarity.min_reference_confidence),
        ("tuning.similarity.poor_field_confidence", t.similarity.poor_field_confidence),
        ("tuning.similarity.transfer_discount", t.similarity.transfer_discount),
        ("tuning.blend.core", t.blend.core),
        ("tuning.blend.external", t.blend.external),
    ] {
        check_unit(name, value)?;
    }
    if l.confidence_cap < l.application_threshold {
        bail!(
            "tuning.learning.confidence_cap ({}) must be >= application_threshold ({})",
            l.confidence_cap,
            l.application_threshold
        );
    }
    if l.family_promotion_min_domains < 2 {
        bail!("tuning.learning.family_promotion_min_domains must be >= 2");
    }
    if t.blend.core + t.blend.external <= 0.0 {
        bail!("tuning.blend weights must not both be zero");
    }

    // Validate fetch
    if config.fetch.timeout_secs == 0 {
        bail!("fetch.timeout_secs must be > 0");
    }

    // Validate cross-validation
    match config.cross_validation.provider.as_str() {
        "disabled" => {}
        "http" => {
            if config.cross_validation.endpoint.is_none() {
                bail!("cross_validation.endpoint must be specified when provider is 'http'");
            }
            if config.cross_validation.timeout_secs == 0 {
                bail!("cross_validation.timeout_secs must be > 0");
            }
        }
        other => bail!(
            "Unknown cross-validation provider: '{}'. Must be disabled or http.",
            other
        ),
    }

    Ok(())
}

/// Load and validate a configuration file.
///
/// A file that does not exist yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.tuning, Tuning::default());
        assert_eq!(config.fetch.timeout_secs, 15);
        assert!(!config.cross_validation.is_enabled());
        assert!(config.state.path.is_none());
        validate(&config).unwrap();
    }

    #[test]
    fn http_provider_requires_endpoint() {
        let config: Config = toml::from_str("[cross_validation]\nprovider = \"http\"\n").unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config: Config = toml::from_str("[cross_validation]\nprovider = \"oracle\"\n").unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn cap_below_application_threshold_is_rejected() {
        let config: Config = toml::from_str(
            "[tuning.learning]\nconfidence_cap = 0.6\napplication_threshold = 0.7\n",
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_weights_are_rejected() {
        let config: Config = toml::from_str(
            "[tuning.weights]\ntitle = 0.0\ncompany = 0.0\ndescription = 0.0\nlocation = 0.0\nsalary = 0.0\n",
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }
}
