//! Session state and its reducer.
//!
//! Everything a front end shows about one workflow session lives in
//! [`SessionState`]. It only changes through [`reduce`], driven either by user
//! actions or by run events converted with [`Action::from_event`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use qaflow_types::{OutputRecord, QaflowError, Result, RunStatus, StepId};

use crate::catalog::Catalog;
use crate::events::PipelineEvent;
use crate::run::RunStatusMap;
use crate::selection::SelectionState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub selection: SelectionState,
    pub automation_enabled: bool,
    /// Custom instructions per step. Empty prompts are not stored.
    pub prompts: BTreeMap<StepId, String>,
    pub run_status: RunStatusMap,
    pub output: Option<OutputRecord>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            selection: SelectionState::new(),
            automation_enabled: true,
            prompts: BTreeMap::new(),
            run_status: RunStatusMap::default(),
            output: None,
        }
    }
}

impl SessionState {
    /// Prompts in the shape the executor takes.
    pub fn prompt_map(&self) -> HashMap<StepId, String> {
        self.prompts
            .iter()
            .map(|(id, prompt)| (id.clone(), prompt.clone()))
            .collect()
    }

    pub fn is_running(&self) -> bool {
        self.run_status.count(RunStatus::Running) > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Toggle(StepId),
    SetAutomation(bool),
    SetPrompt { step_id: StepId, prompt: String },
    StartRun { steps: Vec<StepId> },
    StepStarted(StepId),
    StepCompleted(OutputRecord),
    StepFailed(OutputRecord),
}

impl Action {
    /// The state change a run event implies, if any.
    pub fn from_event(event: &PipelineEvent) -> Option<Self> {
        match event {
            PipelineEvent::RunStarted { steps } => Some(Action::StartRun {
                steps: steps.clone(),
            }),
            PipelineEvent::StepStarted { step_id } => Some(Action::StepStarted(step_id.clone())),
            PipelineEvent::StepCompleted { output, .. } => {
                Some(Action::StepCompleted(output.clone()))
            }
            PipelineEvent::StepFailed { output, .. } => Some(Action::StepFailed(output.clone())),
            PipelineEvent::RunCompleted { .. } | PipelineEvent::RunAborted { .. } => None,
        }
    }
}

/// Apply one action, returning the next state.
pub fn reduce(state: &SessionState, action: Action, catalog: &Catalog) -> Result<SessionState> {
    let mut next = state.clone();
    match action {
        Action::Toggle(step_id) => {
            next.selection = state
                .selection
                .toggle(&step_id, state.automation_enabled, catalog)?;
        }
        Action::SetAutomation(enabled) => {
            tracing::debug!(enabled, "Automation toggled");
            next.automation_enabled = enabled;
        }
        Action::SetPrompt { step_id, prompt } => {
            catalog.require(&step_id)?;
            if prompt.trim().is_empty() {
                next.prompts.remove(&step_id);
            } else {
                next.prompts.insert(step_id, prompt);
            }
        }
        Action::StartRun { steps } => {
            next.run_status = RunStatusMap::pending_for(&steps);
            next.output = None;
        }
        Action::StepStarted(step_id) => {
            set_status(&mut next, &step_id, RunStatus::Running)?;
        }
        Action::StepCompleted(record) => {
            set_status(&mut next, &record.process_id, RunStatus::Completed)?;
            next.output = Some(record);
        }
        Action::StepFailed(record) => {
            set_status(&mut next, &record.process_id, RunStatus::Error)?;
            next.output = Some(record);
        }
    }
    Ok(next)
}

fn set_status(state: &mut SessionState, step_id: &str, status: RunStatus) -> Result<()> {
    if state.run_status.set(step_id, status) {
        Ok(())
    } else {
        Err(QaflowError::Other(format!(
            "step '{step_id}' is not part of the current run"
        )))
    }
}
