//! HTTP client for the taskvault daemon.
//!
//! Every daemon response is an envelope: `{ok: true, data: ...}` on success
//! or `{ok: false, error: {code, message}}` on failure. The wire task
//! payload uses snake_case keys that differ from the in-process record;
//! the mapping lives here and nowhere else.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::dates::{self, DateError};
use crate::error::StoreError;
use crate::store::TaskBackend;
use crate::task::{NewTask, Status, Task, TaskPatch};

pub const DEFAULT_DAEMON_URL: &str = "http://127.0.0.1:7437";

/// Last known daemon state, refreshed by successful health probes only.
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonHealth {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub uptime: f64,
    #[serde(default)]
    pub cache: HealthCache,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthCache {
    #[serde(default)]
    pub task_count: u64,
    #[serde(default)]
    pub last_refresh: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Envelope<T> {
    ok: bool,
    #[serde(default)]
    data: Option<T>,
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    code: String,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireTask {
    id: String,
    title: String,
    status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    due: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    waiting_on: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocked_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    blocks: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_estimate: Option<String>,
    #[serde(default)]
    created: String,
    #[serde(default)]
    updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    completed: Option<String>,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    // Derived display flags the daemon computes; recomputed locally on read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_overdue: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    is_due_today: Option<bool>,
}

impl WireTask {
    fn into_task(self) -> Result<Task, StoreError> {
        let due = match self.due {
            Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                StoreError::Transport(format!("malformed due date in daemon payload: {raw:?}"))
            })?),
            None => None,
        };
        Ok(Task {
            id: self.id,
            title: self.title,
            status: self.status,
            due,
            project: self.project,
            assigned_to: self.assigned_to,
            waiting_on: self.waiting_on,
            blocked_by: self.blocked_by,
            blocks: self.blocks,
            tags: self.tags,
            time_estimate: self.time_estimate,
            created: self.created,
            updated: self.updated,
            completed: self.completed,
            extra: Default::default(),
            file_path: self.path.map(PathBuf::from),
            body: self.content,
        })
    }
}

#[derive(Debug, Serialize)]
struct WireNewTask {
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    waiting_on: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_estimate: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    content: String,
}

impl From<&NewTask> for WireNewTask {
    fn from(new: &NewTask) -> Self {
        Self {
            title: new.title.clone(),
            status: new.status,
            due: new.due.map(dates::format_iso),
            project: new.project.clone(),
            assigned_to: new.assigned_to.clone(),
            waiting_on: new.waiting_on.clone(),
            tags: new.tags.clone(),
            time_estimate: new.time_estimate.clone(),
            content: new.body.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WirePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    /// `Some(None)` serializes as an explicit null, which clears the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    due: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    project: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assigned_to: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    waiting_on: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocked_by: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    blocks: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_estimate: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl From<&TaskPatch> for WirePatch {
    fn from(patch: &TaskPatch) -> Self {
        Self {
            title: patch.title.clone(),
            due: patch
                .due
                .map(|due| due.map(dates::format_iso)),
            project: patch.project.clone(),
            assigned_to: patch.assigned_to.clone(),
            waiting_on: patch.waiting_on.clone(),
            blocked_by: patch.blocked_by.clone(),
            blocks: patch.blocks.clone(),
            tags: patch.tags.clone(),
            time_estimate: patch.time_estimate.clone(),
            content: patch.body.clone(),
        }
    }
}

pub struct DaemonClient {
    http: reqwest::Client,
    base_url: String,
    last_health: Mutex<Option<DaemonHealth>>,
}

impl DaemonClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            last_health: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Liveness probe. On success the parsed health payload is cached; on
    /// any failure the previous cached value is left untouched and `false`
    /// is returned. This never surfaces an error.
    pub async fn test_connection(&self) -> bool {
        match self.fetch_health().await {
            Ok(health) => {
                *self.last_health.lock().expect("health cache lock") = Some(health);
                true
            }
            Err(_) => false,
        }
    }

    pub fn last_health(&self) -> Option<DaemonHealth> {
        self.last_health.lock().expect("health cache lock").clone()
    }

    async fn fetch_health(&self) -> Result<DaemonHealth, StoreError> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(transport)?;
        unwrap_envelope(response).await
    }

    pub async fn list(&self, status: Option<Status>) -> Result<Vec<Task>, StoreError> {
        let mut request = self.http.get(self.url("/tasks"));
        if let Some(status) = status {
            request = request.query(&[("status", status.as_str())]);
        }
        let response = request.send().await.map_err(transport)?;
        let wires: Vec<WireTask> = unwrap_envelope(response).await?;
        wires.into_iter().map(WireTask::into_task).collect()
    }

    pub async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        let response = self
            .http
            .get(self.url(&format!("/tasks/{id}")))
            .send()
            .await
            .map_err(transport)?;
        match unwrap_envelope::<WireTask>(response).await {
            Ok(wire) => Ok(Some(wire.into_task()?)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    pub async fn create(&self, new: &NewTask) -> Result<Task, StoreError> {
        let response = self
            .http
            .post(self.url("/tasks"))
            .json(&WireNewTask::from(new))
            .send()
            .await
            .map_err(transport)?;
        let wire: WireTask = unwrap_envelope(response).await?;
        wire.into_task()
    }

    pub async fn update_status(&self, id: &str, status: Status) -> Result<Task, StoreError> {
        let response = self
            .http
            .post(self.url(&format!("/tasks/{id}/status")))
            .json(&serde_json::json!({ "status": status }))
            .send()
            .await
            .map_err(transport)?;
        let wire: WireTask = unwrap_envelope(response).await?;
        wire.into_task()
    }

    pub async fn update_fields(&self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError> {
        let response = self
            .http
            .patch(self.url(&format!("/tasks/{id}")))
            .json(&WirePatch::from(patch))
            .send()
            .await
            .map_err(transport)?;
        let wire: WireTask = unwrap_envelope(response).await?;
        wire.into_task()
    }

    pub async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .http
            .delete(self.url(&format!("/tasks/{id}")))
            .send()
            .await
            .map_err(transport)?;
        expect_ok(response).await
    }
}

#[async_trait]
impl TaskBackend for DaemonClient {
    async fn list(&self, status: Option<Status>) -> Result<Vec<Task>, StoreError> {
        DaemonClient::list(self, status).await
    }

    async fn get(&self, id: &str) -> Result<Option<Task>, StoreError> {
        DaemonClient::get(self, id).await
    }

    async fn create(&self, new: &NewTask) -> Result<Task, StoreError> {
        DaemonClient::create(self, new).await
    }

    async fn update_status(&self, id: &str, status: Status) -> Result<Task, StoreError> {
        DaemonClient::update_status(self, id, status).await
    }

    async fn update_fields(&self, id: &str, patch: &TaskPatch) -> Result<Task, StoreError> {
        DaemonClient::update_fields(self, id, patch).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        DaemonClient::delete(self, id).await
    }
}

fn transport(err: reqwest::Error) -> StoreError {
    StoreError::Transport(err.to_string())
}

fn envelope_error(err: WireError) -> StoreError {
    match err.code.as_str() {
        "not_found" => StoreError::NotFound(err.message),
        "invalid_date" => StoreError::InvalidDate(DateError::Invalid(err.message)),
        _ => StoreError::Daemon {
            code: err.code,
            message: err.message,
        },
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
    let envelope: Envelope<T> = response.json().await.map_err(transport)?;
    if envelope.ok {
        envelope
            .data
            .ok_or_else(|| StoreError::Transport("success envelope without data".to_string()))
    } else {
        Err(envelope_error(envelope.error.unwrap_or(WireError {
            code: "unknown".to_string(),
            message: "daemon returned ok=false without an error".to_string(),
        })))
    }
}

async fn expect_ok(response: reqwest::Response) -> Result<(), StoreError> {
    let envelope: Envelope<serde_json::Value> = response.json().await.map_err(transport)?;
    if envelope.ok {
        Ok(())
    } else {
        Err(envelope_error(envelope.error.unwrap_or(WireError {
            code: "unknown".to_string(),
            message: "daemon returned ok=false without an error".to_string(),
        })))
    }
}
