use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::dates;

/// Task lifecycle status. Each status maps 1:1 onto a capitalized vault
/// folder; a status change is a file move between those folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Inbox,
    Next,
    Waiting,
    Scheduled,
    Someday,
    Completed,
}

impl Status {
    pub const ALL: [Status; 6] = [
        Status::Inbox,
        Status::Next,
        Status::Waiting,
        Status::Scheduled,
        Status::Someday,
        Status::Completed,
    ];

    pub fn folder(self) -> &'static str {
        match self {
            Status::Inbox => "Inbox",
            Status::Next => "Next",
            Status::Waiting => "Waiting",
            Status::Scheduled => "Scheduled",
            Status::Someday => "Someday",
            Status::Completed => "Completed",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Inbox => "inbox",
            Status::Next => "next",
            Status::Waiting => "waiting",
            Status::Scheduled => "scheduled",
            Status::Someday => "someday",
            Status::Completed => "completed",
        }
    }

    /// Case-insensitive; accepts both the lowercase wire form and the
    /// capitalized folder name.
    pub fn parse(value: &str) -> Option<Status> {
        let lower = value.trim().to_lowercase();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub due: Option<NaiveDate>,
    pub project: Option<String>,
    pub assigned_to: Option<String>,
    pub waiting_on: Option<String>,
    /// Ids of tasks blocking this one. The reverse edge in `blocks` is
    /// caller-managed; neither side is auto-maintained.
    pub blocked_by: Vec<String>,
    pub blocks: Vec<String>,
    pub tags: Vec<String>,
    pub time_estimate: Option<String>,
    pub created: String,
    pub updated: String,
    /// Stamped on the transition into `completed`, retained afterwards.
    pub completed: Option<String>,
    /// Frontmatter keys this layer does not model, preserved verbatim.
    pub extra: BTreeMap<String, Value>,
    pub file_path: Option<PathBuf>,
    pub body: String,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == Status::Completed
    }

    pub fn is_overdue(&self) -> bool {
        self.due.map(dates::is_overdue).unwrap_or(false)
    }

    pub fn is_due_today(&self) -> bool {
        self.due.map(dates::is_due_today).unwrap_or(false)
    }
}

/// Caller-facing creation input; `due` is free text resolved through the
/// date engine before any backend is invoked.
#[derive(Debug, Clone, Default)]
pub struct TaskDraft {
    pub title: String,
    pub status: Option<Status>,
    pub due: Option<String>,
    pub project: Option<String>,
    pub assigned_to: Option<String>,
    pub waiting_on: Option<String>,
    pub tags: Vec<String>,
    pub time_estimate: Option<String>,
    pub body: String,
}

/// Creation fields after date resolution, as handed to a backend.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub status: Option<Status>,
    pub due: Option<NaiveDate>,
    pub project: Option<String>,
    pub assigned_to: Option<String>,
    pub waiting_on: Option<String>,
    pub tags: Vec<String>,
    pub time_estimate: Option<String>,
    pub body: String,
}

/// Partial update. `None` leaves a field untouched; for optional fields,
/// `Some(None)` clears the stored value.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub due: Option<Option<NaiveDate>>,
    pub project: Option<Option<String>>,
    pub assigned_to: Option<Option<String>>,
    pub waiting_on: Option<Option<String>>,
    pub blocked_by: Option<Vec<String>>,
    pub blocks: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub time_estimate: Option<Option<String>>,
    pub body: Option<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.due.is_none()
            && self.project.is_none()
            && self.assigned_to.is_none()
            && self.waiting_on.is_none()
            && self.blocked_by.is_none()
            && self.blocks.is_none()
            && self.tags.is_none()
            && self.time_estimate.is_none()
            && self.body.is_none()
    }

    pub fn apply(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(due) = &self.due {
            task.due = *due;
        }
        if let Some(project) = &self.project {
            task.project = project.clone();
        }
        if let Some(assigned_to) = &self.assigned_to {
            task.assigned_to = assigned_to.clone();
        }
        if let Some(waiting_on) = &self.waiting_on {
            task.waiting_on = waiting_on.clone();
        }
        if let Some(blocked_by) = &self.blocked_by {
            task.blocked_by = blocked_by.clone();
        }
        if let Some(blocks) = &self.blocks {
            task.blocks = blocks.clone();
        }
        if let Some(tags) = &self.tags {
            task.tags = tags.clone();
        }
        if let Some(time_estimate) = &self.time_estimate {
            task.time_estimate = time_estimate.clone();
        }
        if let Some(body) = &self.body {
            task.body = body.clone();
        }
    }
}

pub fn now_timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub fn render_task_line(task: &Task) -> String {
    let title = if task.title.trim().is_empty() {
        "(no title)"
    } else {
        task.title.trim()
    };
    let due = task
        .due
        .map(dates::format_relative)
        .unwrap_or_else(|| "-".to_string());
    format!("{} | {} | {} | {}", task.id, task.status, due, title)
}

pub fn tasks_to_json(tasks: &[Task], include_body: bool) -> String {
    let payload: Vec<serde_json::Value> = tasks
        .iter()
        .map(|task| task_to_json_value(task, include_body))
        .collect();
    serde_json::to_string_pretty(&payload).unwrap_or_else(|_| "[]".to_string())
}

pub fn task_to_json_value(task: &Task, include_body: bool) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert("id".to_string(), serde_json::Value::String(task.id.clone()));
    map.insert(
        "title".to_string(),
        serde_json::Value::String(task.title.clone()),
    );
    map.insert(
        "status".to_string(),
        serde_json::Value::String(task.status.to_string()),
    );
    map.insert(
        "due".to_string(),
        task.due
            .map(dates::format_iso)
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    );
    for (key, value) in [
        ("project", &task.project),
        ("assigned_to", &task.assigned_to),
        ("waiting_on", &task.waiting_on),
        ("time_estimate", &task.time_estimate),
        ("completed", &task.completed),
    ] {
        map.insert(
            key.to_string(),
            value
                .clone()
                .map(serde_json::Value::String)
                .unwrap_or(serde_json::Value::Null),
        );
    }
    for (key, values) in [
        ("blocked_by", &task.blocked_by),
        ("blocks", &task.blocks),
        ("tags", &task.tags),
    ] {
        map.insert(
            key.to_string(),
            serde_json::Value::Array(
                values
                    .iter()
                    .map(|item| serde_json::Value::String(item.clone()))
                    .collect(),
            ),
        );
    }
    map.insert(
        "created".to_string(),
        serde_json::Value::String(task.created.clone()),
    );
    map.insert(
        "updated".to_string(),
        serde_json::Value::String(task.updated.clone()),
    );
    map.insert(
        "path".to_string(),
        task.file_path
            .as_ref()
            .and_then(|path| path.to_str())
            .map(|path| serde_json::Value::String(path.to_string()))
            .unwrap_or(serde_json::Value::Null),
    );
    if include_body {
        map.insert(
            "body".to_string(),
            serde_json::Value::String(task.body.clone()),
        );
    }
    serde_json::Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_accepts_folder_names() {
        assert_eq!(Status::parse("Inbox"), Some(Status::Inbox));
        assert_eq!(Status::parse("WAITING"), Some(Status::Waiting));
        assert_eq!(Status::parse(" someday "), Some(Status::Someday));
        assert_eq!(Status::parse("archived"), None);
    }

    #[test]
    fn render_task_line_uses_placeholder_title() {
        let task = Task {
            id: "A2B3".to_string(),
            title: "  ".to_string(),
            status: Status::Inbox,
            due: None,
            project: None,
            assigned_to: None,
            waiting_on: None,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            tags: Vec::new(),
            time_estimate: None,
            created: String::new(),
            updated: String::new(),
            completed: None,
            extra: BTreeMap::new(),
            file_path: None,
            body: String::new(),
        };
        assert!(render_task_line(&task).contains("(no title)"));
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut task = Task {
            id: "A2B3".to_string(),
            title: "Old".to_string(),
            status: Status::Next,
            due: None,
            project: Some("home".to_string()),
            assigned_to: None,
            waiting_on: None,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            tags: Vec::new(),
            time_estimate: None,
            created: String::new(),
            updated: String::new(),
            completed: None,
            extra: BTreeMap::new(),
            file_path: None,
            body: String::new(),
        };
        let patch = TaskPatch {
            title: Some("New".to_string()),
            project: Some(None),
            ..TaskPatch::default()
        };
        patch.apply(&mut task);
        assert_eq!(task.title, "New");
        assert_eq!(task.project, None);
        assert_eq!(task.status, Status::Next);
    }
}
