//! Pipeline executor: runs selected steps one at a time, stopping at the first failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use qaflow_client::ProcessService;
use qaflow_types::{OutputRecord, QaflowError, Result, Step, StepId};

use crate::catalog::Catalog;
use crate::events::{EventEmitter, PipelineEvent};
use crate::files::FileResolver;
use crate::run::{PipelineRun, RunReport};
use crate::runner::{default_dispatcher, Dispatcher, StepRequest};

/// Pause between two successful steps.
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Sleep after each successful step that is not the last one.
    pub pacing: Duration,
    /// Send requirement analysis to the process service instead of using the canned report.
    pub remote_requirement_analysis: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            remote_requirement_analysis: false,
        }
    }
}

/// Sequential, fail-fast executor over a step catalog.
pub struct PipelineExecutor {
    catalog: Arc<Catalog>,
    dispatcher: Dispatcher,
    config: ExecutorConfig,
    events: EventEmitter,
}

// ---------------------------------------------------------------------------
// PipelineExecutor
// ---------------------------------------------------------------------------

impl PipelineExecutor {
    pub fn new(catalog: Arc<Catalog>, dispatcher: Dispatcher, config: ExecutorConfig) -> Self {
        Self {
            catalog,
            dispatcher,
            config,
            events: EventEmitter::default(),
        }
    }

    /// Executor with the built-in runners talking to `service`.
    pub fn with_service(
        catalog: Arc<Catalog>,
        service: Arc<dyn ProcessService>,
        config: ExecutorConfig,
    ) -> Self {
        let dispatcher = default_dispatcher(service, config.remote_requirement_analysis);
        Self::new(catalog, dispatcher, config)
    }

    pub fn events(&self) -> &EventEmitter {
        &self.events
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `order` in the given order.
    ///
    /// Only unknown step ids produce an `Err`, and they do so before any step
    /// starts. Step failures end up in the report.
    pub async fn run(&self, order: &[StepId], resolver: &dyn FileResolver) -> Result<RunReport> {
        self.run_with_prompts(order, resolver, &HashMap::new()).await
    }

    /// Like [`run`](Self::run), handing each step its prompt from `prompts`.
    pub async fn run_with_prompts(
        &self,
        order: &[StepId],
        resolver: &dyn FileResolver,
        prompts: &HashMap<StepId, String>,
    ) -> Result<RunReport> {
        for step_id in order {
            self.catalog.require(step_id)?;
        }
        self.drive(PipelineRun::new(order), resolver, prompts).await
    }

    /// Run one step on its own: a single-entry status map and no pacing.
    pub async fn run_step(
        &self,
        step_id: &str,
        resolver: &dyn FileResolver,
        prompt: Option<&str>,
    ) -> Result<RunReport> {
        self.catalog.require(step_id)?;
        let mut prompts = HashMap::new();
        if let Some(prompt) = prompt {
            prompts.insert(step_id.to_string(), prompt.to_string());
        }
        self.drive(PipelineRun::new(&[step_id.to_string()]), resolver, &prompts)
            .await
    }

    async fn drive(
        &self,
        mut run: PipelineRun,
        resolver: &dyn FileResolver,
        prompts: &HashMap<StepId, String>,
    ) -> Result<RunReport> {
        let started = Instant::now();
        tracing::info!(steps = run.order().len(), "Starting pipeline run");
        self.events.emit(PipelineEvent::RunStarted {
            steps: run.order().to_vec(),
        });

        while let Some(step_id) = run.next_step() {
            let step = self.catalog.require(&step_id)?;
            self.events.emit(PipelineEvent::StepStarted {
                step_id: step_id.clone(),
            });

            let files = resolver.files_for(&step_id);
            tracing::info!(step = %step_id, files = files.len(), "Running step");
            let request = StepRequest {
                step,
                files: &files,
                prompt: prompts.get(&step_id).map(String::as_str),
            };

            let step_started = Instant::now();
            match self.dispatcher.dispatch(&request).await {
                Ok(output) if !output.is_error() => {
                    let duration_ms = step_started.elapsed().as_millis() as u64;
                    let record = OutputRecord::from_output(&step.id, &step.name, output);
                    run.complete(record.clone())?;
                    tracing::info!(step = %step_id, duration_ms, "Step completed");
                    self.events.emit(PipelineEvent::StepCompleted {
                        step_id,
                        duration_ms,
                        output: record,
                    });

                    if run.has_more() && !self.config.pacing.is_zero() {
                        tokio::time::sleep(self.config.pacing).await;
                    }
                }
                Ok(output) => {
                    let error = step_error(step, &output.content);
                    let record = OutputRecord::from_output(&step.id, &step.name, output);
                    self.fail_step(&mut run, error, record)?;
                }
                Err(err) => {
                    let message = err.to_string();
                    let record = OutputRecord::failure(&step.id, &step.name, &message);
                    self.fail_step(&mut run, step_error(step, &message), record)?;
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        match run.failed_step() {
            Some(failed) => {
                let not_attempted = run.statuses().not_attempted();
                tracing::warn!(
                    failed_step = %failed,
                    not_attempted = not_attempted.len(),
                    "Pipeline run aborted"
                );
                self.events.emit(PipelineEvent::RunAborted {
                    failed_step: failed.to_string(),
                    not_attempted,
                });
            }
            None => {
                tracing::info!(duration_ms, "Pipeline run completed");
                self.events.emit(PipelineEvent::RunCompleted {
                    completed: run.order().to_vec(),
                    duration_ms,
                });
            }
        }

        Ok(run.into_report(duration_ms))
    }

    fn fail_step(
        &self,
        run: &mut PipelineRun,
        error: QaflowError,
        record: OutputRecord,
    ) -> Result<()> {
        let step_id = record.process_id.clone();
        tracing::warn!(step = %step_id, error = %error, "Step failed");
        run.fail(record.clone())?;
        self.events.emit(PipelineEvent::StepFailed {
            step_id,
            error: error.to_string(),
            output: record,
        });
        Ok(())
    }
}

fn step_error(step: &Step, message: &str) -> QaflowError {
    QaflowError::StepExecutionError {
        step: step.id.clone(),
        message: message.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
