//! Run progress events.
//!
//! Emits [`PipelineEvent`]s via a [`tokio::sync::broadcast`] channel so that
//! observers (the CLI session, loggers) can follow a run without coupling to
//! the executor.

use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use qaflow_types::{OutputRecord, StepId};

/// Events emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    RunStarted {
        steps: Vec<StepId>,
    },
    StepStarted {
        step_id: StepId,
    },
    StepCompleted {
        step_id: StepId,
        duration_ms: u64,
        output: OutputRecord,
    },
    StepFailed {
        step_id: StepId,
        error: String,
        output: OutputRecord,
    },
    RunCompleted {
        completed: Vec<StepId>,
        duration_ms: u64,
    },
    RunAborted {
        failed_step: StepId,
        not_attempted: Vec<StepId>,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct EventEmitter {
    sender: tokio::sync::broadcast::Sender<PipelineEvent>,
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: PipelineEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream. Events missed by a lagging subscriber are skipped.
    pub fn stream(&self) -> impl Stream<Item = PipelineEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(err) => {
                tracing::warn!(error = %err, "Event subscriber lagged");
                None
            }
        })
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
