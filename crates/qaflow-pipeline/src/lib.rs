//! Step catalog, selection inference, validation, dispatch and sequential execution.
//!
//! This crate implements the qaflow workflow core: the ordered step catalog,
//! the pivot-step inference engine, missing-input validation, runner dispatch
//! and the fail-fast pipeline executor with its event stream and session reducer.

pub mod catalog;
pub mod engine;
pub mod events;
pub mod files;
pub mod run;
pub mod runner;
pub mod runners;
pub mod selection;
pub mod session;
pub mod validation;

pub use catalog::{
    is_pivot, Catalog, CatalogEntry, CODE_REVIEW, ENVIRONMENT_SETUP, PIVOTS, REQUIREMENT_ANALYSIS,
    TEST_PLANNING, TEST_SCENARIO_GENERATION,
};
pub use engine::{ExecutorConfig, PipelineExecutor, DEFAULT_PACING};
pub use events::{EventEmitter, PipelineEvent};
pub use files::{FileResolver, FileStore, FileUpload};
pub use run::{PipelineRun, RunReport, RunStatusMap};
pub use runner::{
    default_dispatcher, offline_dispatcher, Dispatcher, DynRunner, StepRequest, StepRunner,
    SynthesizedRunner,
};
pub use runners::{
    CannedReportRunner, CodeReviewRunner, RequirementAnalysisRunner, TestPlanningRunner,
};
pub use selection::{infer, signals, InferenceSignals, SelectionState};
pub use session::{reduce, Action, SessionState};
pub use validation::{validate, validate_or_raise, MissingInputs};
