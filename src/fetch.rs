//! HTTP markup retrieval.
//!
//! [`HttpMarkupSource`] is the network collaborator behind
//! [`ExtractorRegistry::parse`](jobsight_core::ExtractorRegistry::parse)
//! when no markup is supplied. It uses a blocking `reqwest` client with a
//! bounded timeout and redirect limit; any failure is returned as a
//! [`RetrievalError`] and becomes a warning on the result.

use std::time::Duration;

use anyhow::Result;
use jobsight_core::{MarkupSource, RetrievalError};

use crate::config::FetchConfig;

pub struct HttpMarkupSource {
    client: reqwest::blocking::Client,
}

impl HttpMarkupSource {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

impl MarkupSource for HttpMarkupSource {
    fn fetch(&self, address: &str) -> Result<String, RetrievalError> {
        let fail = |reason: String| RetrievalError {
            address: address.to_string(),
            reason,
        };

        tracing::debug!(address, "fetching markup");
        let response = self
            .client
            .get(address)
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    fail("request timed out".to_string())
                } else {
                    fail(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {}", status)));
        }

        response
            .text()
            .map_err(|e| fail(format!("Failed to read response body: {}", e)))
    }
}
