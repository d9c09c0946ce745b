//! Durable project document store.
//!
//! Projects are persisted as YAML documents, one file per project id,
//! under `{data_dir}/projects/`. Writes are atomic (write to a `.tmp`
//! sibling, then rename), so a crash mid-save never leaves a truncated
//! document behind. There is no cross-request locking: concurrent
//! pipelines operate on disjoint project ids, and within one request
//! the coordinator is the only writer.

use std::path::{Path, PathBuf};

use kapow_core::project::Project;
use kapow_core::types::ProjectId;

/// Errors from the project store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No document exists for the requested project id.
    #[error("Project {0} not found")]
    NotFound(ProjectId),

    /// Filesystem failure (permissions, disk, rename).
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document exists but is not valid YAML for a project.
    #[error("Malformed project document: {0}")]
    Serde(#[from] serde_yaml::Error),
}

/// File-backed store of project documents.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    projects_dir: PathBuf,
}

impl ProjectStore {
    /// Open (and create, if necessary) a store rooted at `data_dir`.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let projects_dir = data_dir.as_ref().join("projects");
        tokio::fs::create_dir_all(&projects_dir).await?;
        Ok(Self { projects_dir })
    }

    fn document_path(&self, id: &str) -> PathBuf {
        self.projects_dir.join(format!("{id}.yaml"))
    }

    /// Load a project document by id.
    pub async fn load(&self, id: &str) -> Result<Project, StoreError> {
        let path = self.document_path(id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_yaml::from_str(&raw)?)
    }

    /// Atomically write a whole project document. Last writer wins.
    pub async fn save(&self, project: &Project) -> Result<(), StoreError> {
        let path = self.document_path(&project.id);
        let tmp = path.with_extension("yaml.tmp");

        let raw = serde_yaml::to_string(project)?;
        tokio::fs::write(&tmp, raw.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(project_id = %project.id, path = %path.display(), "Project saved");
        Ok(())
    }

    /// Load, apply a pure mutation, and save. Returns the mutated project.
    pub async fn patch<F>(&self, id: &str, mutator: F) -> Result<Project, StoreError>
    where
        F: FnOnce(&mut Project),
    {
        let mut project = self.load(id).await?;
        mutator(&mut project);
        self.save(&project).await?;
        Ok(project)
    }

    /// Id of the most recently saved project, if any.
    ///
    /// Used by panel regeneration when the request does not name a
    /// project explicitly.
    pub async fn latest(&self) -> Result<Option<ProjectId>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.projects_dir).await?;
        let mut newest: Option<(std::time::SystemTime, ProjectId)> = None;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let modified = entry.metadata().await?.modified()?;
            let is_newer = newest.as_ref().is_none_or(|(t, _)| modified > *t);
            if is_newer {
                newest = Some((modified, stem.to_string()));
            }
        }

        Ok(newest.map(|(_, id)| id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use kapow_core::project::STATUS_CREATED;

    fn project(id: &str) -> Project {
        let mut p = Project::new(id.to_string(), "a mars astronaut meets a hologram");
        p.title = "Red Dust".to_string();
        p.genre = "sci-fi".to_string();
        assert_eq!(p.status, STATUS_CREATED);
        p
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(dir.path()).await.unwrap();

        let p = project("p-1");
        store.save(&p).await.unwrap();
        let loaded = store.load("p-1").await.unwrap();
        assert_eq!(loaded, p);
    }

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(dir.path()).await.unwrap();
        assert_matches!(store.load("nope").await, Err(StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn patch_applies_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(dir.path()).await.unwrap();
        store.save(&project("p-1")).await.unwrap();

        let patched = store
            .patch("p-1", |p| p.status = "generating".to_string())
            .await
            .unwrap();
        assert_eq!(patched.status, "generating");

        let reloaded = store.load("p-1").await.unwrap();
        assert_eq!(reloaded.status, "generating");
    }

    #[tokio::test]
    async fn unknown_document_keys_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(dir.path()).await.unwrap();

        let mut p = project("p-1");
        p.extra.insert(
            "legacyExportId".to_string(),
            serde_yaml::Value::String("abc-123".to_string()),
        );
        store.save(&p).await.unwrap();

        let loaded = store.load("p-1").await.unwrap();
        assert_eq!(
            loaded.extra.get("legacyExportId").unwrap().as_str(),
            Some("abc-123")
        );
    }

    #[tokio::test]
    async fn latest_returns_the_most_recent_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = ProjectStore::open(dir.path()).await.unwrap();
        assert_eq!(store.latest().await.unwrap(), None);

        store.save(&project("older")).await.unwrap();
        // Filesystem mtimes are coarse; force an observable gap.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        store.save(&project("newer")).await.unwrap();

        assert_eq!(store.latest().await.unwrap(), Some("newer".to_string()));
    }
}
