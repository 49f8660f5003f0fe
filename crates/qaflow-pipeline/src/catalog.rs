//! The step catalog: an ordered, immutable list of step descriptors.
//!
//! A step's ordinal is its position in the catalog. Ordinals are assigned here
//! and never read from input, so the adjacency rules of the inference engine
//! always see a dense, stable order.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use qaflow_types::{display_name, InputKind, QaflowError, Result, Step};

/// Step inserted/removed automatically by the inference engine.
pub const TEST_PLANNING: &str = "test-planning";
/// Step inserted/removed automatically by the inference engine.
pub const ENVIRONMENT_SETUP: &str = "environment-setup";
pub const REQUIREMENT_ANALYSIS: &str = "requirement-analysis";
pub const TEST_SCENARIO_GENERATION: &str = "test-scenario-generation";
pub const CODE_REVIEW: &str = "code-review";

/// The two pivot steps, in the order the engine considers them.
pub const PIVOTS: [&str; 2] = [TEST_PLANNING, ENVIRONMENT_SETUP];

pub fn is_pivot(step_id: &str) -> bool {
    PIVOTS.contains(&step_id)
}

/// One entry of a catalog file.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    /// Display name; blank falls back to the title-cased id.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub inputs: Vec<InputKind>,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    steps: Vec<Step>,
}

impl Catalog {
    /// Build a catalog from entries in order.
    ///
    /// Fails when an id is empty or repeated, or when a pivot step is missing.
    /// Repeated input kinds within one entry are collapsed.
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut steps = Vec::with_capacity(entries.len());

        for (ordinal, entry) in entries.into_iter().enumerate() {
            if entry.id.trim().is_empty() {
                return Err(QaflowError::ConfigurationError(format!(
                    "catalog entry {ordinal} has an empty id"
                )));
            }
            if !seen.insert(entry.id.clone()) {
                return Err(QaflowError::ConfigurationError(format!(
                    "duplicate step id '{}' in catalog",
                    entry.id
                )));
            }
            let mut required_inputs: Vec<InputKind> = Vec::new();
            for kind in entry.inputs {
                if !required_inputs.contains(&kind) {
                    required_inputs.push(kind);
                }
            }
            let name = if entry.name.trim().is_empty() {
                display_name(&entry.id)
            } else {
                entry.name
            };
            steps.push(Step {
                id: entry.id,
                name,
                ordinal,
                required_inputs,
            });
        }

        for pivot in PIVOTS {
            if !seen.contains(pivot) {
                return Err(QaflowError::ConfigurationError(format!(
                    "catalog is missing required step '{pivot}'"
                )));
            }
        }

        Ok(Self { steps })
    }

    /// Parse a JSON array of `{id, name, inputs}` entries.
    pub fn from_json(source: &str) -> Result<Self> {
        let entries: Vec<CatalogEntry> = serde_json::from_str(source)?;
        Self::new(entries)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&source)?;
        tracing::debug!(path = %path.display(), steps = catalog.len(), "Loaded step catalog");
        Ok(catalog)
    }

    /// The default QA workflow catalog.
    pub fn builtin() -> Self {
        const STEPS: &[(&str, &str, &[&str])] = &[
            (REQUIREMENT_ANALYSIS, "Requirement Analysis", &["requirements"]),
            (TEST_PLANNING, "Test Planning", &["requirements"]),
            (ENVIRONMENT_SETUP, "Environment Setup", &["configuration"]),
            (TEST_SCENARIO_GENERATION, "Test Scenario Generation", &["requirements", "spec"]),
            ("test-automation", "Test Automation", &["spec", "code"]),
            (CODE_REVIEW, "Code Review", &["code"]),
            ("test-execution", "Test Execution", &["code"]),
            ("defect-reporting", "Defect Reporting", &["test-results"]),
        ];
        let steps = STEPS
            .iter()
            .enumerate()
            .map(|(ordinal, (id, name, inputs))| Step {
                id: id.to_string(),
                name: name.to_string(),
                ordinal,
                required_inputs: inputs.iter().map(|k| InputKind::from(*k)).collect(),
            })
            .collect();
        Self { steps }
    }

    pub fn get(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Like [`get`](Self::get) but unknown ids are a configuration error.
    pub fn require(&self, id: &str) -> Result<&Step> {
        self.get(id).ok_or_else(|| QaflowError::unknown_step(id))
    }

    pub fn ordinal(&self, id: &str) -> Result<usize> {
        self.require(id).map(|s| s.ordinal)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, inputs: &[&str]) -> CatalogEntry {
        CatalogEntry {
            id: id.into(),
            name: id.into(),
            inputs: inputs.iter().map(|k| InputKind::from(*k)).collect(),
        }
    }

    #[test]
    fn builtin_ordinals_follow_position() {
        let catalog = Catalog::builtin();
        for (i, step) in catalog.steps().iter().enumerate() {
            assert_eq!(step.ordinal, i);
        }
        assert_eq!(catalog.ordinal(REQUIREMENT_ANALYSIS).unwrap(), 0);
        assert_eq!(catalog.ordinal(TEST_PLANNING).unwrap(), 1);
        assert!(catalog.contains(CODE_REVIEW));
    }

    #[test]
    fn unknown_id_is_configuration_error() {
        let catalog = Catalog::builtin();
        let err = catalog.require("does-not-exist").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = Catalog::new(vec![
            entry(TEST_PLANNING, &[]),
            entry(ENVIRONMENT_SETUP, &[]),
            entry(TEST_PLANNING, &[]),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("duplicate step id 'test-planning'"));
    }

    #[test]
    fn missing_pivot_rejected() {
        let err = Catalog::new(vec![entry(TEST_PLANNING, &[]), entry("lint", &[])]).unwrap_err();
        assert!(err.to_string().contains("environment-setup"));
    }

    #[test]
    fn repeated_input_kinds_collapse() {
        let catalog = Catalog::new(vec![
            entry(TEST_PLANNING, &["spec", "spec", "code"]),
            entry(ENVIRONMENT_SETUP, &[]),
        ])
        .unwrap();
        let step = catalog.require(TEST_PLANNING).unwrap();
        assert_eq!(step.required_inputs, vec![InputKind::from("spec"), InputKind::from("code")]);
    }

    #[test]
    fn load_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "lint", "name": "Lint", "inputs": ["code"]},
                {"id": "test-planning", "name": "Plan"},
                {"id": "environment-setup", "name": "Env", "inputs": ["configuration"]}
            ]"#,
        )
        .unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.ordinal("environment-setup").unwrap(), 2);
        assert!(catalog.require(TEST_PLANNING).unwrap().required_inputs.is_empty());
    }

    #[test]
    fn missing_name_falls_back_to_title_cased_id() {
        let catalog = Catalog::from_json(
            r#"[
                {"id": "security-scan", "inputs": ["code"]},
                {"id": "test-planning", "name": "  "},
                {"id": "environment-setup", "name": "Env"}
            ]"#,
        )
        .unwrap();
        assert_eq!(catalog.require("security-scan").unwrap().name, "Security Scan");
        assert_eq!(catalog.require(TEST_PLANNING).unwrap().name, "Test Planning");
        assert_eq!(catalog.require(ENVIRONMENT_SETUP).unwrap().name, "Env");
    }

    #[test]
    fn malformed_json_is_json_error() {
        let err = Catalog::from_json("{not json").unwrap_err();
        assert!(matches!(err, QaflowError::Json(_)));
    }
}
