//! AI cross-validation collaborator.
//!
//! A [`CrossValidator`] receives a [`ValidationSnippet`] built from a core
//! result and may return an [`ExternalAssessment`]: per-field values with
//! confidences plus a qualitative narrative. The assessment is advisory
//! and is folded in by [`jobsight_core::blend::apply_assessment`].
//!
//! - **[`DisabledCrossValidator`]**: never called for an assessment; used when
//!   `cross_validation.provider = "disabled"`.
//! - **[`HttpCrossValidator`]**: POSTs the snippet as JSON to the configured
//!   endpoint and expects an assessment back.
//!
//! Any error or timeout leaves the core result untouched apart from a
//! warning; see [`cross_validate`].

use std::time::Duration;

use anyhow::{bail, Result};
use jobsight_core::blend::{apply_assessment, ExternalAssessment, ValidationSnippet};
use jobsight_core::{ExtractionResult, Tuning};

use crate::config::CrossValidationConfig;

pub trait CrossValidator: Send + Sync {
    /// Provider identifier (e.g. `"http"`).
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    fn assess(&self, snippet: &ValidationSnippet) -> Result<ExternalAssessment>;
}

// ============ Disabled ============

pub struct DisabledCrossValidator;

impl CrossValidator for DisabledCrossValidator {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn assess(&self, _snippet: &ValidationSnippet) -> Result<ExternalAssessment> {
        bail!("Cross-validation is disabled")
    }
}

// ============ HTTP ============

/// Cross-validator backed by a JSON HTTP endpoint.
///
/// The request body is the serialized [`ValidationSnippet`]; the response
/// must deserialize as an [`ExternalAssessment`]. When `api_key_env` is
/// set, the variable it names is read per request and sent as a bearer
/// token.
pub struct HttpCrossValidator {
    endpoint: String,
    api_key_env: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpCrossValidator {
    pub fn new(config: &CrossValidationConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| anyhow::anyhow!("cross_validation.endpoint required"))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            endpoint,
            api_key_env: config.api_key_env.clone(),
            client,
        })
    }
}

impl CrossValidator for HttpCrossValidator {
    fn name(&self) -> &str {
        "http"
    }

    fn assess(&self, snippet: &ValidationSnippet) -> Result<ExternalAssessment> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(snippet);
        if let Some(var) = &self.api_key_env {
            let key = std::env::var(var).map_err(|_| anyhow::anyhow!("{} not set", var))?;
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().unwrap_or_default();
            bail!("Cross-validation API error {}: {}", status, body_text);
        }
        let assessment: ExternalAssessment = response.json()?;
        Ok(assessment)
    }
}

/// Create the cross-validator selected by the configuration.
pub fn create_validator(config: &CrossValidationConfig) -> Result<Box<dyn CrossValidator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledCrossValidator)),
        "http" => Ok(Box::new(HttpCrossValidator::new(config)?)),
        other => bail!("Unknown cross-validation provider: {}", other),
    }
}

/// Ask the validator about a result and blend its answer in.
///
/// Never fails: a disabled validator returns the result unchanged, and an
/// error adds a warning instead.
pub fn cross_validate(
    validator: &dyn CrossValidator,
    result: &ExtractionResult,
    tuning: &Tuning,
) -> ExtractionResult {
    if !validator.is_enabled() {
        return result.clone();
    }
    let snippet = ValidationSnippet::from_result(result);
    match validator.assess(&snippet) {
        Ok(assessment) => {
            tracing::debug!(
                provider = validator.name(),
                fields = assessment.fields.len(),
                "cross-validation assessment received"
            );
            apply_assessment(result, &assessment, tuning)
        }
        Err(e) => {
            tracing::warn!(provider = validator.name(), error = %e, "cross-validation unavailable, keeping core result");
            let mut out = result.clone();
            out.diagnostics
                .warnings
                .push(format!("cross-validation unavailable: {}", e));
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobsight_core::blend::ExternalField;
    use jobsight_core::{ExtractorRegistry, Field};
    use std::collections::BTreeMap;

    struct Failing;

    impl CrossValidator for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn assess(&self, _: &ValidationSnippet) -> Result<ExternalAssessment> {
            bail!("request timed out")
        }
    }

    struct Agreeing;

    impl CrossValidator for Agreeing {
        fn name(&self) -> &str {
            "agreeing"
        }
        fn assess(&self, snippet: &ValidationSnippet) -> Result<ExternalAssessment> {
            let mut fields = BTreeMap::new();
            for (field, f) in &snippet.fields {
                fields.insert(
                    *field,
                    ExternalField {
                        value: f.value.clone(),
                        confidence: 1.0,
                    },
                );
            }
            Ok(ExternalAssessment {
                fields,
                narrative: None,
            })
        }
    }

    fn sample() -> ExtractionResult {
        let tuning = Tuning::default();
        ExtractorRegistry::with_defaults(&tuning)
            .parse(
                "https://careers.acme-robotics.com/jobs/7",
                Some("<h1>Robotics Software Engineer</h1>"),
            )
            .unwrap()
    }

    #[test]
    fn disabled_validator_is_a_no_op() {
        let result = sample();
        let out = cross_validate(&DisabledCrossValidator, &result, &Tuning::default());
        assert_eq!(out, result);
    }

    #[test]
    fn failure_keeps_core_result_and_warns() {
        let result = sample();
        let out = cross_validate(&Failing, &result, &Tuning::default());
        assert_eq!(out.fields, result.fields);
        assert!(out
            .diagnostics
            .warnings
            .iter()
            .any(|w| w.contains("timed out")));
    }

    #[test]
    fn agreement_raises_confidence_without_changing_values() {
        let result = sample();
        let out = cross_validate(&Agreeing, &result, &Tuning::default());
        assert_eq!(out.value(Field::Title), result.value(Field::Title));
        assert!(out.confidence(Field::Title) > result.confidence(Field::Title));
    }

    #[test]
    fn http_provider_requires_endpoint() {
        let config = CrossValidationConfig {
            provider: "http".to_string(),
            ..CrossValidationConfig::default()
        };
        assert!(create_validator(&config).is_err());
    }
}
