//! The task access layer: one stable CRUD/lifecycle API over two divergent
//! backends.
//!
//! In daemon-preferred mode every call first tries the daemon; a transport
//! or protocol failure falls back to the vault for that single call and
//! raises a warning so front ends can tell the user the write happened
//! locally. Application-level daemon errors (not-found, validation) are
//! authoritative and never fall back. In file-only mode the daemon is never
//! invoked.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::StoreOptions;
use crate::daemon::{DaemonClient, DaemonHealth};
use crate::dates;
use crate::error::StoreError;
use crate::task::{NewTask, Status, Task, TaskDraft, TaskPatch};
use crate::vault::Vault;

/// The contract both backends implement. Object-safe so the store can pick
/// a backend per call.
#[async_trait]
pub trait TaskBackend: Send + Sync {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Task>, StoreError>;
    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError>;
    async fn create(&self, new: &NewTask) -> Result<Task, StoreError>;
    async fn update_status(&self, id: &str, status: Status) -> Result<Task, StoreError>;
    async fn update_fields(&self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError>;
    async fn delete(&self, id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    All,
    Status(Status),
    Today,
    Overdue,
}

impl TaskFilter {
    pub fn parse(value: &str) -> Option<TaskFilter> {
        match value.trim().to_lowercase().as_str() {
            "all" => Some(TaskFilter::All),
            "today" => Some(TaskFilter::Today),
            "overdue" => Some(TaskFilter::Overdue),
            other => Status::parse(other).map(TaskFilter::Status),
        }
    }
}

pub struct TaskStore {
    vault: Vault,
    daemon: Option<DaemonClient>,
    default_status: Status,
    fell_back: AtomicBool,
}

impl TaskStore {
    pub fn new(options: StoreOptions) -> Result<Self, StoreError> {
        let vault = Vault::new(
            &options.vault_root,
            options.default_status,
            options.skip_corrupt,
        );
        vault.ensure_layout()?;
        let daemon = if options.daemon_enabled {
            Some(DaemonClient::new(
                options.daemon_url,
                Duration::from_millis(options.request_timeout_ms),
            )?)
        } else {
            None
        };
        Ok(Self {
            vault,
            daemon,
            default_status: options.default_status,
            fell_back: AtomicBool::new(false),
        })
    }

    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    pub fn daemon_enabled(&self) -> bool {
        self.daemon.is_some()
    }

    /// True when the most recent call was served by the vault because the
    /// daemon was unreachable. Front ends surface this as a warning.
    pub fn fell_back(&self) -> bool {
        self.fell_back.load(Ordering::Relaxed)
    }

    /// Probe the daemon. Always `false` in file-only mode.
    pub async fn test_connection(&self) -> bool {
        match &self.daemon {
            Some(daemon) => daemon.test_connection().await,
            None => false,
        }
    }

    /// Last known daemon health, retained across failed probes.
    pub fn last_health(&self) -> Option<DaemonHealth> {
        self.daemon.as_ref().and_then(|daemon| daemon.last_health())
    }

    fn note_fallback(&self, operation: &str, reason: &str) {
        warn!(operation, reason, "daemon unreachable; serving from vault");
        self.fell_back.store(true, Ordering::Relaxed);
    }

    fn note_daemon_served(&self) {
        self.fell_back.store(false, Ordering::Relaxed);
    }

    /// Create a task. The draft's due text is resolved through the date
    /// engine before any backend is touched; an unparseable date fails the
    /// whole creation.
    pub async fn create(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        if draft.title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        let due = match draft.due.as_deref() {
            Some(text) => Some(dates::parse(text)?),
            None => None,
        };
        let new = NewTask {
            title: draft.title,
            status: Some(draft.status.unwrap_or(self.default_status)),
            due,
            project: draft.project,
            assigned_to: draft.assigned_to,
            waiting_on: draft.waiting_on,
            tags: draft.tags,
            time_estimate: draft.time_estimate,
            body: draft.body,
        };

        if let Some(daemon) = &self.daemon {
            match daemon.create(&new).await {
                Err(StoreError::Transport(reason)) => self.note_fallback("create", &reason),
                other => {
                    self.note_daemon_served();
                    return other;
                }
            }
        }
        TaskBackend::create(&self.vault, &new).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        if let Some(daemon) = &self.daemon {
            match daemon.get(id).await {
                Err(StoreError::Transport(reason)) => self.note_fallback("get", &reason),
                other => {
                    self.note_daemon_served();
                    return other;
                }
            }
        }
        TaskBackend::get(&self.vault, id).await
    }

    pub async fn list(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
        let tasks = match filter {
            TaskFilter::All | TaskFilter::Today | TaskFilter::Overdue => {
                self.list_backend(None).await?
            }
            TaskFilter::Status(status) => self.list_backend(Some(status)).await?,
        };
        Ok(match filter {
            TaskFilter::Today => tasks
                .into_iter()
                .filter(|task| !task.is_completed() && task.is_due_today())
                .collect(),
            TaskFilter::Overdue => tasks
                .into_iter()
                .filter(|task| !task.is_completed() && task.is_overdue())
                .collect(),
            _ => tasks,
        })
    }

    async fn list_backend(&self, status: Option<Status>) -> Result<Vec<Task>, StoreError> {
        if let Some(daemon) = &self.daemon {
            match daemon.list(status).await {
                Err(StoreError::Transport(reason)) => self.note_fallback("list", &reason),
                other => {
                    self.note_daemon_served();
                    return other;
                }
            }
        }
        TaskBackend::list(&self.vault, status).await
    }

    pub async fn update(&self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        if let Some(daemon) = &self.daemon {
            match daemon.update_fields(id, &patch).await {
                Err(StoreError::Transport(reason)) => self.note_fallback("update", &reason),
                other => {
                    self.note_daemon_served();
                    return other;
                }
            }
        }
        TaskBackend::update_fields(&self.vault, id, &patch).await
    }

    /// Parse free-text due input and patch the task with the result.
    pub async fn set_due(&self, id: &str, text: &str) -> Result<Task, StoreError> {
        let due = dates::parse(text)?;
        self.update(
            id,
            TaskPatch {
                due: Some(Some(due)),
                ..TaskPatch::default()
            },
        )
        .await
    }

    /// Generic status transition. Any status may move to any other status;
    /// entering `completed` stamps the completion timestamp.
    pub async fn update_status(&self, id: &str, status: Status) -> Result<Task, StoreError> {
        if let Some(daemon) = &self.daemon {
            match daemon.update_status(id, status).await {
                Err(StoreError::Transport(reason)) => self.note_fallback("update_status", &reason),
                other => {
                    self.note_daemon_served();
                    return other;
                }
            }
        }
        TaskBackend::update_status(&self.vault, id, status).await
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        if let Some(daemon) = &self.daemon {
            match daemon.delete(id).await {
                Err(StoreError::Transport(reason)) => self.note_fallback("delete", &reason),
                other => {
                    self.note_daemon_served();
                    return other;
                }
            }
        }
        TaskBackend::delete(&self.vault, id).await
    }

    // Named conveniences over update_status for the common paths.

    pub async fn start(&self, id: &str) -> Result<Task, StoreError> {
        self.update_status(id, Status::Next).await
    }

    pub async fn activate(&self, id: &str) -> Result<Task, StoreError> {
        self.update_status(id, Status::Next).await
    }

    pub async fn move_to_waiting(&self, id: &str) -> Result<Task, StoreError> {
        self.update_status(id, Status::Waiting).await
    }

    pub async fn defer(&self, id: &str) -> Result<Task, StoreError> {
        self.update_status(id, Status::Someday).await
    }

    pub async fn schedule(&self, id: &str) -> Result<Task, StoreError> {
        self.update_status(id, Status::Scheduled).await
    }

    /// Idempotent: completing an already-completed task re-stamps the
    /// timestamps and is not an error.
    pub async fn complete(&self, id: &str) -> Result<Task, StoreError> {
        self.update_status(id, Status::Completed).await
    }

    /// Fuzzy lookup for CLI-style references: exact id, then id suffix,
    /// then case-insensitive title substring. First match wins, in source
    /// order.
    pub async fn resolve(&self, query: &str) -> Result<Option<Task>, StoreError> {
        if let Some(task) = self.get(query).await? {
            return Ok(Some(task));
        }
        let tasks = self.list(TaskFilter::All).await?;
        let suffix = query.to_uppercase();
        if let Some(task) = tasks.iter().find(|task| task.id.ends_with(&suffix)) {
            return Ok(Some(task.clone()));
        }
        let needle = query.to_lowercase();
        Ok(tasks
            .into_iter()
            .find(|task| task.title.to_lowercase().contains(&needle)))
    }
}
