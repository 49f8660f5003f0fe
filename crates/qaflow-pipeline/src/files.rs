//! Uploaded files and their association with steps.
//!
//! Files reach a step in one of two ways: attached directly to that step, or
//! uploaded to the shared store and bound to any number of steps. The
//! [`FileUpload`] variant records which path a caller took, so nothing
//! downstream has to guess from the shape of its arguments.

use std::collections::HashMap;

use qaflow_types::{FileId, FileRef, QaflowError, Result, StepId};

/// Supplies the input files of a step.
pub trait FileResolver: Send + Sync {
    /// Files a run hands to `step_id`; empty when nothing is attached.
    fn files_for(&self, step_id: &str) -> Vec<FileRef>;

    /// Every file attached to `step_id` in any way. Validation checks input
    /// kinds against this set.
    fn available_for(&self, step_id: &str) -> Vec<FileRef> {
        self.files_for(step_id)
    }
}

impl FileResolver for HashMap<StepId, Vec<FileRef>> {
    fn files_for(&self, step_id: &str) -> Vec<FileRef> {
        self.get(step_id).cloned().unwrap_or_default()
    }
}

/// How files enter the [`FileStore`].
#[derive(Debug, Clone)]
pub enum FileUpload {
    /// Attach a file to one step only.
    Direct { step_id: StepId, file: FileRef },
    /// Add files to the shared store; bind them with [`FileStore::bind`].
    Centralized { files: Vec<FileRef> },
}

#[derive(Debug, Clone, Default)]
pub struct FileStore {
    managed: Vec<FileRef>,
    bindings: HashMap<FileId, Vec<StepId>>,
    direct: HashMap<StepId, Vec<FileRef>>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store uploaded files and return their ids.
    pub fn upload(&mut self, upload: FileUpload) -> Vec<FileId> {
        match upload {
            FileUpload::Direct { step_id, file } => {
                tracing::debug!(step = %step_id, file = %file.name, kind = %file.kind, "Attached file to step");
                let id = file.id.clone();
                self.direct.entry(step_id).or_default().push(file);
                vec![id]
            }
            FileUpload::Centralized { files } => {
                let ids: Vec<FileId> = files.iter().map(|f| f.id.clone()).collect();
                tracing::debug!(count = files.len(), "Uploaded files to store");
                self.managed.extend(files);
                ids
            }
        }
    }

    /// Replace the set of steps a stored file is bound to.
    pub fn bind(&mut self, file_id: &str, steps: Vec<StepId>) -> Result<()> {
        if self.managed_file(file_id).is_none() {
            return Err(QaflowError::ConfigurationError(format!(
                "unknown file id '{file_id}'"
            )));
        }
        tracing::debug!(file = %file_id, steps = ?steps, "Bound file to steps");
        self.bindings.insert(file_id.to_string(), steps);
        Ok(())
    }

    /// Remove a stored file together with its binding.
    pub fn delete(&mut self, file_id: &str) -> Option<FileRef> {
        let pos = self.managed.iter().position(|f| f.id == file_id)?;
        self.bindings.remove(file_id);
        Some(self.managed.remove(pos))
    }

    pub fn managed_file(&self, file_id: &str) -> Option<&FileRef> {
        self.managed.iter().find(|f| f.id == file_id)
    }

    pub fn managed_files(&self) -> &[FileRef] {
        &self.managed
    }

    pub fn binding(&self, file_id: &str) -> Option<&[StepId]> {
        self.bindings.get(file_id).map(Vec::as_slice)
    }

    /// Stored files bound to `step_id`, in upload order.
    pub fn bound_files(&self, step_id: &str) -> Vec<FileRef> {
        self.managed
            .iter()
            .filter(|f| {
                self.bindings
                    .get(&f.id)
                    .is_some_and(|steps| steps.iter().any(|s| s == step_id))
            })
            .cloned()
            .collect()
    }

    pub fn direct_files(&self, step_id: &str) -> &[FileRef] {
        self.direct.get(step_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct attachments followed by bound store files.
    pub fn all_files(&self, step_id: &str) -> Vec<FileRef> {
        let mut files = self.direct_files(step_id).to_vec();
        for file in self.bound_files(step_id) {
            if !files.iter().any(|f| f.id == file.id) {
                files.push(file);
            }
        }
        files
    }
}

impl FileResolver for FileStore {
    /// Bound store files win; a step with none falls back to its direct attachments.
    fn files_for(&self, step_id: &str) -> Vec<FileRef> {
        let bound = self.bound_files(step_id);
        if !bound.is_empty() {
            return bound;
        }
        self.direct_files(step_id).to_vec()
    }

    fn available_for(&self, step_id: &str) -> Vec<FileRef> {
        self.all_files(step_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, kind: &str) -> FileRef {
        FileRef::new(name, kind, format!("contents of {name}"))
    }

    #[test]
    fn direct_upload_attaches_to_one_step() {
        let mut store = FileStore::new();
        store.upload(FileUpload::Direct {
            step_id: "code-review".into(),
            file: file("main.rs", "code"),
        });
        assert_eq!(store.files_for("code-review").len(), 1);
        assert!(store.files_for("test-planning").is_empty());
        assert!(store.managed_files().is_empty());
    }

    #[test]
    fn centralized_files_need_binding() {
        let mut store = FileStore::new();
        let ids = store.upload(FileUpload::Centralized {
            files: vec![file("req.md", "requirements"), file("env.toml", "configuration")],
        });
        assert_eq!(ids.len(), 2);
        assert!(store.files_for("test-planning").is_empty());

        store
            .bind(&ids[0], vec!["test-planning".into(), "requirement-analysis".into()])
            .unwrap();
        let files = store.files_for("test-planning");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "req.md");
        assert_eq!(store.binding(&ids[0]).unwrap().len(), 2);
    }

    #[test]
    fn bound_files_take_precedence_over_direct() {
        let mut store = FileStore::new();
        store.upload(FileUpload::Direct {
            step_id: "code-review".into(),
            file: file("old.rs", "code"),
        });
        let ids = store.upload(FileUpload::Centralized {
            files: vec![file("new.rs", "code")],
        });
        store.bind(&ids[0], vec!["code-review".into()]).unwrap();

        let files = store.files_for("code-review");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "new.rs");
    }

    #[test]
    fn all_files_merges_direct_and_bound() {
        let mut store = FileStore::new();
        store.upload(FileUpload::Direct {
            step_id: "test-automation".into(),
            file: file("a.rs", "code"),
        });
        let ids = store.upload(FileUpload::Centralized {
            files: vec![file("s.md", "spec")],
        });
        store.bind(&ids[0], vec!["test-automation".into()]).unwrap();

        let names: Vec<String> = store
            .available_for("test-automation")
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["a.rs", "s.md"]);
        assert_eq!(store.files_for("test-automation").len(), 1);
    }

    #[test]
    fn bind_unknown_file_fails() {
        let mut store = FileStore::new();
        let err = store.bind("nope", vec!["code-review".into()]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn delete_drops_binding() {
        let mut store = FileStore::new();
        let ids = store.upload(FileUpload::Centralized {
            files: vec![file("req.md", "requirements")],
        });
        store.bind(&ids[0], vec!["test-planning".into()]).unwrap();

        let removed = store.delete(&ids[0]).unwrap();
        assert_eq!(removed.name, "req.md");
        assert!(store.binding(&ids[0]).is_none());
        assert!(store.files_for("test-planning").is_empty());
        assert!(store.delete(&ids[0]).is_none());
    }

    #[test]
    fn hashmap_resolver_defaults_to_empty() {
        let mut map: HashMap<StepId, Vec<FileRef>> = HashMap::new();
        map.insert("a".into(), vec![file("x", "spec")]);
        assert_eq!(map.files_for("a").len(), 1);
        assert!(map.files_for("b").is_empty());
    }
}
