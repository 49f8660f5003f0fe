use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use qaflow_types::{FileRef, QaflowError, Result};

use crate::{CodeReviewResponse, ProcessResponse, ProcessService, ServiceConfig};

const CODE_REVIEW_PATH: &str = "processes/code_review/run";
const TEST_PLANNING_PATH: &str = "processes/test-planning/run";
const REQUIREMENT_ANALYSIS_PATH: &str = "processes/requirement_analysis/run";

// ---------------------------------------------------------------------------
// HttpProcessService
// ---------------------------------------------------------------------------

/// [`ProcessService`] over HTTP: each call uploads the step's files as a
/// multipart form (`files` parts) and decodes the JSON reply.
#[derive(Debug)]
pub struct HttpProcessService {
    client: reqwest::Client,
    config: ServiceConfig,
}

impl HttpProcessService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QaflowError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ServiceConfig::from_env())
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: Form) -> Result<T> {
        let url = self.config.endpoint(path);
        tracing::info!(endpoint = %path, "Sending process request");

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.map_transport(path, e))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.map_transport(path, e))?;

        if !status.is_success() {
            tracing::warn!(endpoint = %path, status = status.as_u16(), "Process request failed");
            return Err(map_error(path, status, &body));
        }

        tracing::debug!(endpoint = %path, bytes = body.len(), "Process request succeeded");
        serde_json::from_str(&body).map_err(|e| QaflowError::ServiceError {
            endpoint: path.to_string(),
            status: status.as_u16(),
            message: format!("Failed to parse response JSON: {e}"),
        })
    }

    fn map_transport(&self, path: &str, err: reqwest::Error) -> QaflowError {
        if err.is_timeout() {
            QaflowError::RequestTimeout {
                endpoint: path.to_string(),
                timeout_ms: self.config.timeout.as_millis() as u64,
            }
        } else {
            QaflowError::Transport(err.to_string())
        }
    }
}

/// Multipart form with one `files` part per input file.
fn files_form(files: &[FileRef]) -> Form {
    files.iter().fold(Form::new(), |form, file| {
        tracing::debug!(file = %file.name, kind = %file.kind, "Attaching file");
        form.part("files", Part::text(file.content.clone()).file_name(file.name.clone()))
    })
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn map_error(path: &str, status: reqwest::StatusCode, body: &str) -> QaflowError {
    QaflowError::ServiceError {
        endpoint: path.to_string(),
        status: status.as_u16(),
        message: extract_error_message(body),
    }
}

/// The service reports failures as `{"detail": "..."}`; fall back to the raw body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["detail"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// ProcessService implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ProcessService for HttpProcessService {
    fn name(&self) -> &str {
        "http"
    }

    async fn run_code_review(&self, files: &[FileRef]) -> Result<CodeReviewResponse> {
        self.post_form(CODE_REVIEW_PATH, files_form(files)).await
    }

    async fn run_test_planning(&self, files: &[FileRef]) -> Result<ProcessResponse> {
        self.post_form(TEST_PLANNING_PATH, files_form(files)).await
    }

    async fn run_requirement_analysis(
        &self,
        files: &[FileRef],
        custom_prompt: Option<&str>,
    ) -> Result<ProcessResponse> {
        let mut form = files_form(files);
        if let Some(prompt) = custom_prompt {
            form = form.text("customPrompt", prompt.to_string());
        }
        self.post_form(REQUIREMENT_ANALYSIS_PATH, form).await
    }
}
