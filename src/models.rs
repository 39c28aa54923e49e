//! Core job and task types shared across the scheduler, store, and API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status sentinel for a task that has not reported back yet.
pub const PENDING_STATUS: i64 = 500;

/// Captured output of a finished task container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

/// Durable record of a single task within a job.
///
/// The `service_id` field is persisted under the legacy `__task_id` wire
/// name and only appears once the task has been dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub name: String,
    pub args: Vec<String>,
    pub status: i64,
    pub result: TaskResult,
    #[serde(
        rename = "__task_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub service_id: Option<String>,
}

impl TaskRecord {
    /// A fresh record in its initial state: sentinel status, empty result.
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
            status: PENDING_STATUS,
            result: TaskResult::default(),
            service_id: None,
        }
    }
}

/// One task as submitted through the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub task_name: String,
    pub task_args: Vec<String>,
}

/// Store-level view of a job hash. `tasks` stays in its serialized form;
/// callers that need the task list parse it via [`JobRecord::into_details`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub image: String,
    pub callback: String,
    pub task_count_total: i64,
    pub task_count_started: i64,
    pub task_count_complete: i64,
    pub tasks: String,
}

impl JobRecord {
    /// Deserialize the task list and produce the API/callback view.
    pub fn into_details(self) -> Result<JobDetails, serde_json::Error> {
        let tasks = serde_json::from_str(&self.tasks)?;
        Ok(JobDetails {
            image: self.image,
            callback: self.callback,
            task_count_total: self.task_count_total,
            task_count_started: self.task_count_started,
            task_count_complete: self.task_count_complete,
            tasks,
        })
    }
}

/// Fully decoded job view, serialized with the wire names the original
/// deployment exposed. This is the `/status` body and the callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDetails {
    #[serde(rename = "__image")]
    pub image: String,
    #[serde(rename = "__callback")]
    pub callback: String,
    #[serde(rename = "__task_count_total")]
    pub task_count_total: i64,
    #[serde(rename = "__task_count_started")]
    pub task_count_started: i64,
    #[serde(rename = "__task_count_complete")]
    pub task_count_complete: i64,
    pub tasks: Vec<TaskRecord>,
}

/// In-memory queue entry tracked by the scheduler. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub job_id: String,
    pub task_name: String,
    pub args: Vec<String>,
    pub image: String,
    pub service_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    /// An entry with cleared dispatch fields, as pushed on submit or requeue.
    pub fn new(job_id: &str, task_name: &str, args: Vec<String>, image: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            task_name: task_name.to_string(),
            args,
            image: image.to_string(),
            service_id: None,
            started_at: None,
        }
    }
}

/// What the dispatcher needs to start one task container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnableTask {
    pub job_id: String,
    pub task_name: String,
    pub args: Vec<String>,
    pub image: String,
}

/// Snapshot of a dispatched task, for operational inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedTask {
    pub service_id: String,
    pub started_at: DateTime<Utc>,
}
