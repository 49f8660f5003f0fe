//! Shared types and errors for the qaflow pipeline.
//!
//! This crate provides the foundational types used across all other qaflow crates:
//! - `QaflowError`: unified error taxonomy
//! - `Step`, `InputKind`: catalog step descriptors
//! - `Origin`, `RunStatus`: selection and run bookkeeping tags
//! - `FileRef`: an uploaded input file
//! - `StepOutput`, `OutputRecord`: step results

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unified error type for all qaflow subsystems.
#[derive(Debug, thiserror::Error)]
pub enum QaflowError {
    // === Catalog / Selection Errors ===
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Pipeline validation failed: {0}")]
    ValidationError(String),

    // === Execution Errors ===
    #[error("Step '{step}' failed: {message}")]
    StepExecutionError { step: String, message: String },

    // === Process Service Errors ===
    #[error("Process service {endpoint} returned HTTP {status}: {message}")]
    ServiceError {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Request to {endpoint} timed out after {timeout_ms}ms")]
    RequestTimeout { endpoint: String, timeout_ms: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl QaflowError {
    /// Shorthand for the error raised when a step id is not in the catalog.
    pub fn unknown_step(id: &str) -> Self {
        QaflowError::ConfigurationError(format!("unknown step id '{id}'"))
    }

    /// Returns `true` for errors caused by a misconfigured catalog or selection.
    ///
    /// These are precondition violations: they are raised before a run starts
    /// rather than being recorded as a step failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self, QaflowError::ConfigurationError(_))
    }

    /// Returns `true` if the error came from talking to the process service.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            QaflowError::ServiceError { .. }
                | QaflowError::RequestTimeout { .. }
                | QaflowError::Transport(_)
        )
    }
}

/// A convenience alias for `Result<T, QaflowError>`.
pub type Result<T> = std::result::Result<T, QaflowError>;

/// Catalog step identifier, e.g. `"code-review"`.
pub type StepId = String;

/// Identifier of an uploaded file.
pub type FileId = String;

// ---------------------------------------------------------------------------
// InputKind
// ---------------------------------------------------------------------------

/// Kind of input a step requires and a file declares (e.g. `"requirements"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputKind(String);

impl InputKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InputKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for InputKind {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A catalog step. `ordinal` is its position in the catalog and is only
/// compared for adjacency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub name: String,
    pub ordinal: usize,
    pub required_inputs: Vec<InputKind>,
}

/// Human-readable fallback name for a step id: `"code-review"` → `"Code Review"`.
pub fn display_name(step_id: &str) -> String {
    step_id
        .split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Origin / RunStatus
// ---------------------------------------------------------------------------

/// Why a step is in the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Manual,
    Auto,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Manual => f.write_str("manual"),
            Origin::Auto => f.write_str("auto"),
        }
    }
}

/// Per-step status inside a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// FileRef
// ---------------------------------------------------------------------------

/// An uploaded input file. Content is held in memory as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub id: FileId,
    pub name: String,
    pub kind: InputKind,
    pub content: String,
    pub size: usize,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

impl FileRef {
    /// Create a file with a fresh random id and the current upload time.
    pub fn new(name: impl Into<String>, kind: impl Into<InputKind>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind: kind.into(),
            size: content.len(),
            content,
            uploaded_at: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// StepOutput / OutputRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    Completed,
    Error,
}

impl fmt::Display for OutputStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStatus::Completed => f.write_str("completed"),
            OutputStatus::Error => f.write_str("error"),
        }
    }
}

/// What a step runner hands back to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutput {
    pub content: String,
    pub status: OutputStatus,
}

impl StepOutput {
    pub fn completed(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: OutputStatus::Completed,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            status: OutputStatus::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == OutputStatus::Error
    }
}

/// The latest step result surfaced to the caller. Overwritten, never accumulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub content: String,
    pub status: OutputStatus,
    pub process_id: StepId,
    pub process_type: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl OutputRecord {
    /// Stamp a runner output with the step it came from.
    pub fn from_output(step_id: &str, process_type: impl Into<String>, output: StepOutput) -> Self {
        Self {
            content: output.content,
            status: output.status,
            process_id: step_id.to_string(),
            process_type: process_type.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Record describing a failed step.
    pub fn failure(step_id: &str, process_type: impl Into<String>, message: &str) -> Self {
        Self {
            content: format!("Error: {message}"),
            status: OutputStatus::Error,
            process_id: step_id.to_string(),
            process_type: process_type.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_configuration() {
        let err = QaflowError::unknown_step("nope");
        assert_eq!(err.to_string(), "Configuration error: unknown step id 'nope'");
        assert!(err.is_configuration());
    }

    #[test]
    fn error_display_step_execution() {
        let err = QaflowError::StepExecutionError {
            step: "code-review".into(),
            message: "boom".into(),
        };
        assert_eq!(err.to_string(), "Step 'code-review' failed: boom");
        assert!(!err.is_configuration());
    }

    #[test]
    fn error_display_service_error() {
        let err = QaflowError::ServiceError {
            endpoint: "processes/code_review/run".into(),
            status: 500,
            message: "internal".into(),
        };
        assert_eq!(
            err.to_string(),
            "Process service processes/code_review/run returned HTTP 500: internal"
        );
        assert!(err.is_service_failure());
    }

    #[test]
    fn timeout_is_service_failure() {
        let err = QaflowError::RequestTimeout {
            endpoint: "x".into(),
            timeout_ms: 10,
        };
        assert!(err.is_service_failure());
        assert!(!QaflowError::Other("x".into()).is_service_failure());
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QaflowError = io_err.into();
        assert!(matches!(err, QaflowError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn display_name_title_cases_ids() {
        assert_eq!(display_name("code-review"), "Code Review");
        assert_eq!(display_name("lint"), "Lint");
        assert_eq!(display_name("a--b"), "A B");
    }

    #[test]
    fn origin_and_status_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Origin::Auto).unwrap(), "\"auto\"");
        assert_eq!(serde_json::to_string(&RunStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(
            serde_json::to_string(&OutputStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(RunStatus::Error.to_string(), "error");
    }

    #[test]
    fn input_kind_is_transparent_in_json() {
        let kind: InputKind = serde_json::from_str("\"spec\"").unwrap();
        assert_eq!(kind, InputKind::from("spec"));
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"spec\"");
    }

    #[test]
    fn file_ref_new_assigns_id_and_size() {
        let a = FileRef::new("req.md", "requirements", "hello");
        let b = FileRef::new("req.md", "requirements", "hello");
        assert_ne!(a.id, b.id);
        assert_eq!(a.size, 5);
        assert_eq!(a.kind.as_str(), "requirements");
    }

    #[test]
    fn output_record_failure_prefixes_error() {
        let rec = OutputRecord::failure("code-review", "Code Review", "timeout");
        assert_eq!(rec.content, "Error: timeout");
        assert_eq!(rec.status, OutputStatus::Error);
        assert_eq!(rec.process_id, "code-review");
    }

    #[test]
    fn output_record_from_output_keeps_status() {
        let rec = OutputRecord::from_output("x", "X", StepOutput::completed("done"));
        assert_eq!(rec.status, OutputStatus::Completed);
        assert_eq!(rec.content, "done");
        assert!(StepOutput::error("bad").is_error());
    }
}
