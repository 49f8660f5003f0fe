//! Run bookkeeping: per-step statuses and the step-by-step run state machine.
//!
//! [`PipelineRun`] owns the ordering and abort rules of a run and performs no
//! I/O. The executor drives it: ask for the next step, dispatch, then report
//! completion or failure back.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use qaflow_types::{OutputRecord, QaflowError, Result, RunStatus, StepId};

// ---------------------------------------------------------------------------
// RunStatusMap
// ---------------------------------------------------------------------------

/// Status of every step in a run, in run order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunStatusMap(IndexMap<StepId, RunStatus>);

impl RunStatusMap {
    /// A fresh map with every step of `order` pending. Repeated ids keep
    /// their first position.
    pub fn pending_for(order: &[StepId]) -> Self {
        let mut map = IndexMap::with_capacity(order.len());
        for id in order {
            map.entry(id.clone()).or_insert(RunStatus::Pending);
        }
        Self(map)
    }

    pub fn get(&self, step_id: &str) -> Option<RunStatus> {
        self.0.get(step_id).copied()
    }

    /// Update a step already in the map. Returns `false` for unknown ids.
    pub fn set(&mut self, step_id: &str, status: RunStatus) -> bool {
        match self.0.get_mut(step_id) {
            Some(slot) => {
                *slot = status;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StepId, RunStatus)> {
        self.0.iter().map(|(id, status)| (id, *status))
    }

    pub fn count(&self, status: RunStatus) -> usize {
        self.0.values().filter(|s| **s == status).count()
    }

    /// Steps that are still pending, in run order.
    pub fn not_attempted(&self) -> Vec<StepId> {
        self.0
            .iter()
            .filter(|(_, status)| **status == RunStatus::Pending)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PipelineRun {
    order: Vec<StepId>,
    cursor: usize,
    current: Option<StepId>,
    statuses: RunStatusMap,
    output: Option<OutputRecord>,
    completed: Vec<StepId>,
    failed_step: Option<StepId>,
}

impl PipelineRun {
    pub fn new(order: &[StepId]) -> Self {
        let statuses = RunStatusMap::pending_for(order);
        let order = statuses.iter().map(|(id, _)| id.clone()).collect();
        Self {
            order,
            cursor: 0,
            current: None,
            statuses,
            output: None,
            completed: Vec::new(),
            failed_step: None,
        }
    }

    /// Mark the next queued step running and return its id.
    ///
    /// Returns `None` once the queue is exhausted, after a failure, or while
    /// the previous step has not been reported yet.
    pub fn next_step(&mut self) -> Option<StepId> {
        if self.current.is_some() || !self.has_more() {
            return None;
        }
        let id = self.order[self.cursor].clone();
        self.cursor += 1;
        self.statuses.set(&id, RunStatus::Running);
        self.current = Some(id.clone());
        Some(id)
    }

    /// Record success of the running step.
    pub fn complete(&mut self, record: OutputRecord) -> Result<()> {
        let id = self.take_current()?;
        self.statuses.set(&id, RunStatus::Completed);
        self.completed.push(id);
        self.output = Some(record);
        Ok(())
    }

    /// Record failure of the running step. Remaining steps stay pending.
    pub fn fail(&mut self, record: OutputRecord) -> Result<()> {
        let id = self.take_current()?;
        self.statuses.set(&id, RunStatus::Error);
        self.failed_step = Some(id);
        self.output = Some(record);
        self.cursor = self.order.len();
        Ok(())
    }

    fn take_current(&mut self) -> Result<StepId> {
        self.current
            .take()
            .ok_or_else(|| QaflowError::Other("no step is running".into()))
    }

    pub fn has_more(&self) -> bool {
        self.failed_step.is_none() && self.cursor < self.order.len()
    }

    pub fn is_finished(&self) -> bool {
        self.current.is_none() && !self.has_more()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn order(&self) -> &[StepId] {
        &self.order
    }

    pub fn statuses(&self) -> &RunStatusMap {
        &self.statuses
    }

    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    pub fn into_report(self, duration_ms: u64) -> RunReport {
        RunReport {
            statuses: self.statuses,
            output: self.output,
            completed: self.completed,
            failed_step: self.failed_step,
            duration_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// RunReport
// ---------------------------------------------------------------------------

/// The outcome of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub statuses: RunStatusMap,
    /// Output of the last step that finished, successful or not.
    pub output: Option<OutputRecord>,
    pub completed: Vec<StepId>,
    pub failed_step: Option<StepId>,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.failed_step.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qaflow_types::{OutputStatus, StepOutput};

    fn ids(list: &[&str]) -> Vec<StepId> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn ok(id: &str) -> OutputRecord {
        OutputRecord::from_output(id, id, StepOutput::completed(format!("{id} done")))
    }

    #[test]
    fn fresh_run_is_all_pending() {
        let run = PipelineRun::new(&ids(&["a", "b", "c"]));
        assert_eq!(run.statuses().count(RunStatus::Pending), 3);
        assert!(run.has_more());
        assert!(!run.is_finished());
    }

    #[test]
    fn steps_run_in_given_order() {
        let mut run = PipelineRun::new(&ids(&["c", "a", "b"]));
        let mut seen = Vec::new();
        while let Some(id) = run.next_step() {
            assert_eq!(run.statuses().get(&id), Some(RunStatus::Running));
            run.complete(ok(&id)).unwrap();
            seen.push(id);
        }
        assert_eq!(seen, ids(&["c", "a", "b"]));
        assert!(run.is_finished());
        let report = run.into_report(5);
        assert!(report.succeeded());
        assert_eq!(report.completed, ids(&["c", "a", "b"]));
        assert_eq!(report.output.unwrap().process_id, "b");
    }

    #[test]
    fn failure_aborts_remaining_steps() {
        let mut run = PipelineRun::new(&ids(&["a", "b", "c"]));
        let a = run.next_step().unwrap();
        run.complete(ok(&a)).unwrap();
        let b = run.next_step().unwrap();
        run.fail(OutputRecord::failure(&b, "B", "boom")).unwrap();

        assert!(run.next_step().is_none());
        assert!(run.is_finished());
        assert_eq!(run.statuses().get("a"), Some(RunStatus::Completed));
        assert_eq!(run.statuses().get("b"), Some(RunStatus::Error));
        assert_eq!(run.statuses().get("c"), Some(RunStatus::Pending));
        assert_eq!(run.statuses().not_attempted(), ids(&["c"]));

        let report = run.into_report(0);
        assert!(!report.succeeded());
        assert_eq!(report.failed_step.as_deref(), Some("b"));
        let output = report.output.unwrap();
        assert_eq!(output.status, OutputStatus::Error);
        assert_eq!(output.content, "Error: boom");
    }

    #[test]
    fn next_step_waits_for_report() {
        let mut run = PipelineRun::new(&ids(&["a", "b"]));
        assert_eq!(run.next_step().as_deref(), Some("a"));
        assert!(run.next_step().is_none());
        assert_eq!(run.current(), Some("a"));
    }

    #[test]
    fn reporting_without_running_step_is_error() {
        let mut run = PipelineRun::new(&ids(&["a"]));
        assert!(run.complete(ok("a")).is_err());
        assert!(run.fail(ok("a")).is_err());
    }

    #[test]
    fn repeated_ids_run_once() {
        let mut run = PipelineRun::new(&ids(&["a", "b", "a"]));
        assert_eq!(run.order(), ids(&["a", "b"]).as_slice());
        assert_eq!(run.statuses().len(), 2);
    }

    #[test]
    fn empty_run_is_finished() {
        let mut run = PipelineRun::new(&[]);
        assert!(run.is_finished());
        assert!(run.next_step().is_none());
        assert!(run.into_report(0).succeeded());
    }

    #[test]
    fn status_map_serializes_in_order() {
        let mut map = RunStatusMap::pending_for(&ids(&["b", "a"]));
        map.set("a", RunStatus::Completed);
        assert!(!map.set("zzz", RunStatus::Error));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"b":"pending","a":"completed"}"#);
    }
}
