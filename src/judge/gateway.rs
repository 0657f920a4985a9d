use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::config::JudgeConfig;
use crate::error::{DuelError, Result};

/// One execution job: wrapped source plus the test case it must satisfy
#[derive(Debug, Clone, Serialize)]
pub struct BatchSubmission {
    pub language_id: u32,
    pub source_code: String,
    pub stdin: String,
    pub expected_output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeStatus {
    pub id: i32,
    pub description: String,
}

/// Per-job result as reported by the judge service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub token: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub status: JudgeStatus,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct BatchPollResponse {
    submissions: Vec<SubmissionResult>,
}

/// Client interface to the sandboxed execution service. The service runs
/// untrusted code; this side only dispatches batches and reads verdicts.
pub trait JudgeGateway: Send + Sync {
    /// Dispatch a batch of jobs, returning one correlation token per job
    fn submit_batch(
        &self,
        jobs: &[BatchSubmission],
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// Fetch the current status of every token in one call
    fn poll_batch(
        &self,
        tokens: &[String],
    ) -> impl Future<Output = Result<Vec<SubmissionResult>>> + Send;

    /// Best-effort deletion of a dispatched job. Errors are logged and
    /// swallowed; callers must never block on this.
    fn cancel(&self, token: &str) -> impl Future<Output = ()> + Send;
}

/// HTTP client for a Judge0-compatible execution service
pub struct HttpJudgeGateway {
    config: JudgeConfig,
    client: reqwest::Client,
}

impl HttpJudgeGateway {
    pub fn new(config: JudgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DuelError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.header("X-Auth-Token", key),
            None => req,
        }
    }
}

impl JudgeGateway for HttpJudgeGateway {
    async fn submit_batch(&self, jobs: &[BatchSubmission]) -> Result<Vec<String>> {
        let url = format!(
            "{}/submissions/batch/?base64_encoded=false&wait=false",
            self.config.api_url
        );

        tracing::debug!(jobs = jobs.len(), "Dispatching submission batch");

        let response = self
            .with_auth(self.client.post(&url))
            .json(&serde_json::json!({ "submissions": jobs }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DuelError::gateway(format!(
                "batch dispatch returned HTTP {}",
                response.status()
            )));
        }

        let tokens: Vec<TokenResponse> = response
            .json()
            .await
            .map_err(|e| DuelError::MalformedGatewayResponse(e.to_string()))?;

        extract_tokens(tokens, jobs.len())
    }

    async fn poll_batch(&self, tokens: &[String]) -> Result<Vec<SubmissionResult>> {
        let url = format!(
            "{}/submissions/batch?tokens={}&base64_encoded=false&fields=token,stdout,stderr,status,compile_output",
            self.config.api_url,
            tokens.join(",")
        );

        let response = self.with_auth(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            return Err(DuelError::gateway(format!(
                "batch poll returned HTTP {}",
                response.status()
            )));
        }

        let body: BatchPollResponse = response
            .json()
            .await
            .map_err(|e| DuelError::MalformedGatewayResponse(e.to_string()))?;

        Ok(body.submissions)
    }

    async fn cancel(&self, token: &str) {
        let url = format!("{}/submissions/{}", self.config.api_url, token);
        match self.with_auth(self.client.delete(&url)).send().await {
            Ok(response) if !response.status().is_success() => {
                tracing::debug!(token = %token, status = %response.status(), "Cancel rejected");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(token = %token, error = %e, "Cancel request failed");
            }
        }
    }
}

/// Every dispatched job must come back with exactly one correlation token;
/// anything else means the batch cannot be polled reliably.
fn extract_tokens(tokens: Vec<TokenResponse>, dispatched: usize) -> Result<Vec<String>> {
    if tokens.len() != dispatched {
        return Err(DuelError::MalformedGatewayResponse(format!(
            "dispatched {} jobs but received {} tokens",
            dispatched,
            tokens.len()
        )));
    }

    Ok(tokens.into_iter().map(|t| t.token).collect())
}
