use async_trait::async_trait;

use qaflow_types::{FileRef, Result};

use crate::{CodeReviewResponse, ProcessResponse};

// ---------------------------------------------------------------------------
// ProcessService
// ---------------------------------------------------------------------------

/// The remote process endpoints the pipeline's network-backed steps call.
///
/// Implementations must return or fail within finite time; the HTTP
/// implementation enforces [`ServiceConfig::timeout`](crate::ServiceConfig).
#[async_trait]
pub trait ProcessService: Send + Sync {
    /// Short name used in logs (e.g. `"http"`).
    fn name(&self) -> &str;

    async fn run_code_review(&self, files: &[FileRef]) -> Result<CodeReviewResponse>;

    async fn run_test_planning(&self, files: &[FileRef]) -> Result<ProcessResponse>;

    async fn run_requirement_analysis(
        &self,
        files: &[FileRef],
        custom_prompt: Option<&str>,
    ) -> Result<ProcessResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use qaflow_types::QaflowError;
    use std::sync::Arc;

    struct OfflineService;

    #[async_trait]
    impl ProcessService for OfflineService {
        fn name(&self) -> &str {
            "offline"
        }

        async fn run_code_review(&self, _files: &[FileRef]) -> Result<CodeReviewResponse> {
            Ok(CodeReviewResponse::default())
        }

        async fn run_test_planning(&self, files: &[FileRef]) -> Result<ProcessResponse> {
            Ok(ProcessResponse {
                result: Some(format!("{} files", files.len())),
                error: None,
            })
        }

        async fn run_requirement_analysis(
            &self,
            _files: &[FileRef],
            _custom_prompt: Option<&str>,
        ) -> Result<ProcessResponse> {
            Err(QaflowError::Transport("offline".into()))
        }
    }

    #[tokio::test]
    async fn trait_object_dispatch() {
        let service: Arc<dyn ProcessService> = Arc::new(OfflineService);
        assert_eq!(service.name(), "offline");

        let files = vec![FileRef::new("plan.md", "requirements", "x")];
        let plan = service.run_test_planning(&files).await.unwrap();
        assert_eq!(plan.result.as_deref(), Some("1 files"));

        let err = service.run_requirement_analysis(&files, None).await.unwrap_err();
        assert!(err.is_service_failure());
    }
}
