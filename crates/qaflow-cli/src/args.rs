//! Parsers for the repeatable `--file` and `--prompt` flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use qaflow_pipeline::Catalog;
use qaflow_types::{FileRef, InputKind, StepId};

/// `--file <kind>=<path>[@step,step]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    pub kind: InputKind,
    pub path: PathBuf,
    /// Steps to bind the file to. Empty means every selected step.
    pub steps: Vec<StepId>,
}

impl FromStr for FileSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <kind>=<path>[@steps], got '{s}'"))?;
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(format!("missing input kind in '{s}'"));
        }

        let (path, steps) = match rest.rsplit_once('@') {
            Some((path, steps)) => (path, split_list(steps)),
            None => (rest, Vec::new()),
        };
        if path.is_empty() {
            return Err(format!("missing path in '{s}'"));
        }

        Ok(Self {
            kind: InputKind::from(kind),
            path: PathBuf::from(path),
            steps,
        })
    }
}

impl FileSpec {
    /// Read the file from disk.
    pub fn load(&self) -> std::io::Result<FileRef> {
        let content = std::fs::read_to_string(&self.path)?;
        Ok(FileRef::new(file_name(&self.path), self.kind.clone(), content))
    }

    /// Steps this file binds to, given the steps of the current command.
    /// Explicit targets must name catalog steps.
    pub fn targets(
        &self,
        selected: &[StepId],
        catalog: &Catalog,
    ) -> qaflow_types::Result<Vec<StepId>> {
        if self.steps.is_empty() {
            return Ok(selected.to_vec());
        }
        for step_id in &self.steps {
            catalog.require(step_id)?;
        }
        Ok(self.steps.clone())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn split_list(s: &str) -> Vec<StepId> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// `--prompt <step>=<text>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSpec {
    pub step_id: StepId,
    pub text: String,
}

impl FromStr for PromptSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (step, text) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <step>=<text>, got '{s}'"))?;
        let step = step.trim();
        if step.is_empty() {
            return Err(format!("missing step id in '{s}'"));
        }
        Ok(Self {
            step_id: step.to_string(),
            text: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_spec_without_steps() {
        let spec: FileSpec = "code=src/main.rs".parse().unwrap();
        assert_eq!(spec.kind, InputKind::from("code"));
        assert_eq!(spec.path, PathBuf::from("src/main.rs"));
        assert!(spec.steps.is_empty());

        let selected = vec!["a".to_string(), "b".to_string()];
        assert_eq!(spec.targets(&selected, &Catalog::builtin()).unwrap(), selected);
    }

    #[test]
    fn file_spec_with_steps() {
        let spec: FileSpec = "requirements=docs/reqs.md@requirement-analysis, test-planning"
            .parse()
            .unwrap();
        assert_eq!(spec.path, PathBuf::from("docs/reqs.md"));
        assert_eq!(spec.steps, vec!["requirement-analysis", "test-planning"]);
        let targets = spec
            .targets(&["other".to_string()], &Catalog::builtin())
            .unwrap();
        assert_eq!(targets, spec.steps);
    }

    #[test]
    fn misspelled_target_step_is_rejected() {
        let spec: FileSpec = "code=src/main.rs@code-reviw".parse().unwrap();
        let err = spec
            .targets(&["code-review".to_string()], &Catalog::builtin())
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("code-reviw"));
    }

    #[test]
    fn file_spec_rejects_malformed_input() {
        assert!("src/main.rs".parse::<FileSpec>().is_err());
        assert!("=src/main.rs".parse::<FileSpec>().is_err());
        assert!("code=@code-review".parse::<FileSpec>().is_err());
    }

    #[test]
    fn file_spec_loads_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reqs.md");
        std::fs::write(&path, "# Login").unwrap();

        let spec: FileSpec = format!("requirements={}", path.display()).parse().unwrap();
        let file = spec.load().unwrap();
        assert_eq!(file.name, "reqs.md");
        assert_eq!(file.content, "# Login");
        assert_eq!(file.kind, InputKind::from("requirements"));
    }

    #[test]
    fn prompt_spec_keeps_text_verbatim() {
        let spec: PromptSpec = "code-review=check error paths = carefully".parse().unwrap();
        assert_eq!(spec.step_id, "code-review");
        assert_eq!(spec.text, "check error paths = carefully");
        assert!("no-separator".parse::<PromptSpec>().is_err());
    }
}
