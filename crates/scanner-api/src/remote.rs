//! Client for a running scanner API, with local execution as the fallback.

use std::time::Duration;

use scanner_core::AnalysisReport;
use scanner_engine::{Analyzer, EngineError, ModelClient};

use crate::routes::AnalyzeRequest;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend answered {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Clone)]
pub struct RemoteBackend {
    base_url: String,
    http: reqwest::Client,
}

impl RemoteBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn is_healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::debug!(error = %e, %url, "backend health check failed");
                false
            }
        }
    }

    pub async fn analyze(&self, scenario: &str) -> Result<AnalysisReport, RemoteError> {
        let resp = self
            .http
            .post(format!("{}/analyze", self.base_url))
            .timeout(ANALYZE_TIMEOUT)
            .json(&AnalyzeRequest {
                scenario: scenario.to_string(),
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(RemoteError::Status(resp.status()));
        }
        Ok(resp.json().await?)
    }
}

/// Where a report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Remote,
    Local,
}

/// Ask the backend when it is reachable; on any backend failure run the
/// pipeline in-process instead. Local failures are returned as-is.
pub async fn analyze_with_fallback<C: ModelClient>(
    backend: Option<&RemoteBackend>,
    local: &Analyzer<C>,
    scenario: &str,
) -> Result<(AnalysisReport, Source), EngineError> {
    if let Some(backend) = backend {
        if backend.is_healthy().await {
            match backend.analyze(scenario).await {
                Ok(report) => return Ok((report, Source::Remote)),
                Err(e) => {
                    tracing::warn!(error = %e, backend = backend.base_url(), "backend analysis failed, running locally");
                }
            }
        } else {
            tracing::info!(backend = backend.base_url(), "backend unavailable, running locally");
        }
    }

    let report = local.analyze(scenario).await?;
    Ok((report, Source::Local))
}
