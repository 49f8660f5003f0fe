//! Runners backed by the remote process service.

use std::sync::Arc;

use async_trait::async_trait;

use qaflow_client::{ProcessResponse, ProcessService};
use qaflow_types::{Result, StepOutput};

use crate::catalog::{CODE_REVIEW, REQUIREMENT_ANALYSIS, TEST_PLANNING};
use crate::runner::{StepRequest, StepRunner};

use super::REQUIREMENT_ANALYSIS_REPORT;

/// A `{result} | {error}` payload as a step output.
fn process_output(response: ProcessResponse) -> StepOutput {
    match response.into_result() {
        Ok(result) => StepOutput::completed(result),
        Err(message) => StepOutput::error(format!("Error: {message}")),
    }
}

// ---------------------------------------------------------------------------
// CodeReviewRunner
// ---------------------------------------------------------------------------

pub struct CodeReviewRunner {
    service: Arc<dyn ProcessService>,
}

impl CodeReviewRunner {
    pub fn new(service: Arc<dyn ProcessService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StepRunner for CodeReviewRunner {
    fn step_id(&self) -> &str {
        CODE_REVIEW
    }

    async fn run(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        tracing::info!(
            step = %request.step.id,
            service = self.service.name(),
            files = request.files.len(),
            "Requesting code review"
        );
        let response = self.service.run_code_review(request.files).await?;
        Ok(StepOutput::completed(response.to_markdown()))
    }
}

// ---------------------------------------------------------------------------
// TestPlanningRunner
// ---------------------------------------------------------------------------

pub struct TestPlanningRunner {
    service: Arc<dyn ProcessService>,
}

impl TestPlanningRunner {
    pub fn new(service: Arc<dyn ProcessService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl StepRunner for TestPlanningRunner {
    fn step_id(&self) -> &str {
        TEST_PLANNING
    }

    async fn run(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        tracing::info!(
            step = %request.step.id,
            service = self.service.name(),
            files = request.files.len(),
            "Requesting test plan"
        );
        let response = self.service.run_test_planning(request.files).await?;
        Ok(process_output(response))
    }
}

// ---------------------------------------------------------------------------
// RequirementAnalysisRunner
// ---------------------------------------------------------------------------

/// Requirement analysis, either through the service or from a canned report.
pub struct RequirementAnalysisRunner {
    service: Option<Arc<dyn ProcessService>>,
}

impl RequirementAnalysisRunner {
    pub fn offline() -> Self {
        Self { service: None }
    }

    /// Send files and the step's custom prompt to the service.
    pub fn remote(service: Arc<dyn ProcessService>) -> Self {
        Self {
            service: Some(service),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.service.is_some()
    }
}

#[async_trait]
impl StepRunner for RequirementAnalysisRunner {
    fn step_id(&self) -> &str {
        REQUIREMENT_ANALYSIS
    }

    async fn run(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        let Some(service) = &self.service else {
            return Ok(StepOutput::completed(REQUIREMENT_ANALYSIS_REPORT));
        };
        tracing::info!(
            step = %request.step.id,
            service = service.name(),
            files = request.files.len(),
            custom_prompt = request.prompt.is_some(),
            "Requesting requirement analysis"
        );
        let response = service
            .run_requirement_analysis(request.files, request.prompt)
            .await?;
        Ok(process_output(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qaflow_client::{CodeReviewResponse, FileReview};
    use qaflow_types::{FileRef, OutputStatus, QaflowError, Step};
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedService {
        planning: Option<ProcessResponse>,
        prompts: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl ProcessService for ScriptedService {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn run_code_review(&self, files: &[FileRef]) -> Result<CodeReviewResponse> {
            Ok(CodeReviewResponse {
                reviews: files
                    .iter()
                    .map(|f| FileReview {
                        file_name: f.name.clone(),
                        review: format!("{} looks fine", f.name),
                    })
                    .collect(),
            })
        }

        async fn run_test_planning(&self, _files: &[FileRef]) -> Result<ProcessResponse> {
            self.planning.clone().ok_or_else(|| QaflowError::RequestTimeout {
                endpoint: "processes/test-planning/run".into(),
                timeout_ms: 10,
            })
        }

        async fn run_requirement_analysis(
            &self,
            _files: &[FileRef],
            custom_prompt: Option<&str>,
        ) -> Result<ProcessResponse> {
            self.prompts
                .lock()
                .unwrap()
                .push(custom_prompt.map(str::to_string));
            Ok(ProcessResponse {
                result: Some("analysed".into()),
                error: None,
            })
        }
    }

    fn step(id: &str) -> Step {
        Step {
            id: id.into(),
            name: id.into(),
            ordinal: 0,
            required_inputs: vec![],
        }
    }

    #[tokio::test]
    async fn code_review_renders_markdown() {
        let runner = CodeReviewRunner::new(Arc::new(ScriptedService::default()));
        let step = step(CODE_REVIEW);
        let files = vec![FileRef::new("main.rs", "code", "fn main() {}")];
        let request = StepRequest {
            step: &step,
            files: &files,
            prompt: None,
        };
        let output = runner.run(&request).await.unwrap();
        assert_eq!(output.status, OutputStatus::Completed);
        assert_eq!(output.content, "## main.rs\n\nmain.rs looks fine\n\n---\n");
    }

    #[tokio::test]
    async fn test_planning_error_payload_is_error_output() {
        let service = ScriptedService {
            planning: Some(ProcessResponse {
                result: None,
                error: Some("no requirements found".into()),
            }),
            ..Default::default()
        };
        let runner = TestPlanningRunner::new(Arc::new(service));
        let step = step(TEST_PLANNING);
        let request = StepRequest {
            step: &step,
            files: &[],
            prompt: None,
        };
        let output = runner.run(&request).await.unwrap();
        assert!(output.is_error());
        assert_eq!(output.content, "Error: no requirements found");
    }

    #[tokio::test]
    async fn service_failure_propagates() {
        let runner = TestPlanningRunner::new(Arc::new(ScriptedService::default()));
        let step = step(TEST_PLANNING);
        let request = StepRequest {
            step: &step,
            files: &[],
            prompt: None,
        };
        let err = runner.run(&request).await.unwrap_err();
        assert!(err.is_service_failure());
    }

    #[tokio::test]
    async fn remote_analysis_forwards_prompt() {
        let service = Arc::new(ScriptedService::default());
        let runner = RequirementAnalysisRunner::remote(service.clone());
        assert!(runner.is_remote());

        let step = step(REQUIREMENT_ANALYSIS);
        let request = StepRequest {
            step: &step,
            files: &[],
            prompt: Some("focus on security"),
        };
        let output = runner.run(&request).await.unwrap();
        assert_eq!(output.content, "analysed");
        assert_eq!(
            *service.prompts.lock().unwrap(),
            vec![Some("focus on security".to_string())]
        );
    }

    #[tokio::test]
    async fn offline_analysis_is_canned() {
        let runner = RequirementAnalysisRunner::offline();
        let step = step(REQUIREMENT_ANALYSIS);
        let request = StepRequest {
            step: &step,
            files: &[],
            prompt: Some("ignored"),
        };
        let output = runner.run(&request).await.unwrap();
        assert_eq!(output.content, REQUIREMENT_ANALYSIS_REPORT);
    }
}
