//! Missing-input validation for a step selection.
//!
//! Call [`validate`] for the advisory list shown before a run, or
//! [`validate_or_raise`] to turn any missing input into an error.

use std::collections::HashSet;

use serde::Serialize;

use qaflow_types::{InputKind, QaflowError, Result, StepId};

use crate::catalog::Catalog;
use crate::files::FileResolver;

/// A selected step whose required inputs are not all covered by its files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingInputs {
    pub step_id: StepId,
    pub step_name: String,
    pub missing_inputs: Vec<InputKind>,
}

/// List the selected steps that lack a file of some required kind.
///
/// A kind is satisfied when at least one file attached to the step, directly
/// or through a binding, declares exactly that kind. Results follow
/// `selected`; each step appears at most once.
pub fn validate(
    selected: &[StepId],
    catalog: &Catalog,
    files: &dyn FileResolver,
) -> Result<Vec<MissingInputs>> {
    let mut seen = HashSet::new();
    let mut missing = Vec::new();

    for step_id in selected {
        let step = catalog.require(step_id)?;
        if !seen.insert(step_id.as_str()) {
            continue;
        }

        let provided: HashSet<InputKind> = files
            .available_for(step_id)
            .into_iter()
            .map(|f| f.kind)
            .collect();
        let missing_inputs: Vec<InputKind> = step
            .required_inputs
            .iter()
            .filter(|kind| !provided.contains(*kind))
            .cloned()
            .collect();

        if !missing_inputs.is_empty() {
            missing.push(MissingInputs {
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                missing_inputs,
            });
        }
    }

    tracing::debug!(steps = selected.len(), incomplete = missing.len(), "Validated selection");
    Ok(missing)
}

/// Like [`validate`] but any missing input becomes a `ValidationError`.
pub fn validate_or_raise(
    selected: &[StepId],
    catalog: &Catalog,
    files: &dyn FileResolver,
) -> Result<()> {
    let missing = validate(selected, catalog, files)?;
    if missing.is_empty() {
        return Ok(());
    }
    let summary = missing
        .iter()
        .map(|m| {
            let kinds: Vec<&str> = m.missing_inputs.iter().map(InputKind::as_str).collect();
            format!("{} needs {}", m.step_name, kinds.join(", "))
        })
        .collect::<Vec<_>>()
        .join("; ");
    Err(QaflowError::ValidationError(summary))
}
