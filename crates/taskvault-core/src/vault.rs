//! Direct file-tree task storage.
//!
//! One markdown file per task at `<root>/<StatusFolder>/<id>.md`. A status
//! change relocates the file: the new copy is written before the old one is
//! removed, so a failure mid-move can leave a short-lived duplicate but
//! never a lost task.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreError;
use crate::frontmatter;
use crate::ident;
use crate::store::TaskBackend;
use crate::task::{now_timestamp, NewTask, Status, Task, TaskPatch};

const MAX_ID_ATTEMPTS: usize = 16;

pub struct Vault {
    root: PathBuf,
    default_status: Status,
    skip_corrupt: bool,
}

impl Vault {
    pub fn new(root: impl Into<PathBuf>, default_status: Status, skip_corrupt: bool) -> Self {
        Self {
            root: root.into(),
            default_status,
            skip_corrupt,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the six status folders so a fresh vault is usable.
    pub fn ensure_layout(&self) -> Result<(), StoreError> {
        for status in Status::ALL {
            fs::create_dir_all(self.root.join(status.folder()))?;
        }
        Ok(())
    }

    pub fn task_path(&self, status: Status, id: &str) -> PathBuf {
        self.root.join(status.folder()).join(format!("{id}.md"))
    }

    fn find_task_file(&self, id: &str) -> Option<(Status, PathBuf)> {
        for status in Status::ALL {
            let path = self.task_path(status, id);
            if path.is_file() {
                return Some((status, path));
            }
        }
        None
    }

    fn read_task(&self, path: &Path) -> Result<Task, StoreError> {
        let text = fs::read_to_string(path)?;
        frontmatter::decode(&text, path).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write_task(&self, task: &Task, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, frontmatter::encode(task))?;
        Ok(())
    }

    fn list_folder(&self, status: Status) -> Result<Vec<Task>, StoreError> {
        let dir = self.root.join(status.folder());
        let mut paths: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(read_dir) => read_dir
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().map(|ext| ext == "md").unwrap_or(false))
                .collect(),
            Err(_) => Vec::new(),
        };
        paths.sort();

        let mut tasks = Vec::new();
        for path in paths {
            match self.read_task(&path) {
                Ok(task) => tasks.push(task),
                Err(err @ StoreError::Parse { .. }) if self.skip_corrupt => {
                    warn!(error = %err, "skipping corrupt task file");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(tasks)
    }

    fn load(&self, id: &str) -> Result<(Status, PathBuf, Task), StoreError> {
        let (status, path) = self
            .find_task_file(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let task = self.read_task(&path)?;
        Ok((status, path, task))
    }
}

#[async_trait]
impl TaskBackend for Vault {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Task>, StoreError> {
        match status {
            Some(status) => self.list_folder(status),
            None => {
                let mut tasks = Vec::new();
                for status in Status::ALL {
                    tasks.extend(self.list_folder(status)?);
                }
                Ok(tasks)
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        match self.find_task_file(id) {
            Some((_, path)) => Ok(Some(self.read_task(&path)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, new: &NewTask) -> Result<Task, StoreError> {
        let status = new.status.unwrap_or(self.default_status);
        self.ensure_layout()?;
        let now = now_timestamp();

        for _ in 0..MAX_ID_ATTEMPTS {
            let id = ident::generate();
            // A colliding id may live in any status folder, not just the
            // destination.
            if self.find_task_file(&id).is_some() {
                continue;
            }
            let path = self.task_path(status, &id);
            if path.exists() {
                continue;
            }
            let task = Task {
                id,
                title: new.title.clone(),
                status,
                due: new.due,
                project: new.project.clone(),
                assigned_to: new.assigned_to.clone(),
                waiting_on: new.waiting_on.clone(),
                blocked_by: Vec::new(),
                blocks: Vec::new(),
                tags: new.tags.clone(),
                time_estimate: new.time_estimate.clone(),
                created: now.clone(),
                updated: now,
                completed: None,
                extra: BTreeMap::new(),
                file_path: Some(path.clone()),
                body: new.body.clone(),
            };
            self.write_task(&task, &path)?;
            return Ok(task);
        }
        Err(StoreError::IdExhausted)
    }

    async fn update_status(&self, id: &str, status: Status) -> Result<Task, StoreError> {
        let (current, old_path, mut task) = self.load(id)?;
        task.status = status;
        task.updated = now_timestamp();
        if status == Status::Completed {
            task.completed = Some(task.updated.clone());
        }

        if current == status {
            self.write_task(&task, &old_path)?;
            return Ok(task);
        }

        let new_path = self.task_path(status, id);
        task.file_path = Some(new_path.clone());
        // Write-then-delete: never leave the task absent from both folders.
        self.write_task(&task, &new_path)?;
        fs::remove_file(&old_path)?;
        Ok(task)
    }

    async fn update_fields(&self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError> {
        let (_, path, mut task) = self.load(id)?;
        patch.apply(&mut task);
        task.updated = now_timestamp();
        self.write_task(&task, &path)?;
        Ok(task)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let (_, path) = self
            .find_task_file(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        fs::remove_file(&path)?;
        Ok(())
    }
}
