//! Durable job tracking.
//!
//! Each job is one hash keyed by its identifier. The hash carries the image
//! and callback under `__image`/`__callback`, three integer counters, and
//! the whole task list as a single JSON string under `tasks`. Keeping the
//! list serialized keeps the outer hash shape stable while individual task
//! records mutate; updates are read–modify–write and serialized per store.

mod memory;
mod redis;

use async_trait::async_trait;

pub use memory::MemoryJobStore;
pub use redis::RedisJobStore;

use crate::error::StoreError;
use crate::models::{JobRecord, TaskRecord, TaskResult, TaskSubmission};

/// The integer counters maintained on every job hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCounter {
    Total,
    Started,
    Complete,
}

impl TaskCounter {
    /// Hash field name for this counter.
    pub fn field(self) -> &'static str {
        match self {
            TaskCounter::Total => "__task_count_total",
            TaskCounter::Started => "__task_count_started",
            TaskCounter::Complete => "__task_count_complete",
        }
    }
}

/// Durable store for jobs and their task lists.
///
/// Any operation referencing a missing job or task fails with the matching
/// not-found error. Implementations must be safe for concurrent use; task
/// list updates must be serialized per job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create the job hash with its image, callback, and an empty task list.
    async fn add_job(&self, id: &str, image: &str, callback: &str) -> Result<(), StoreError>;

    /// Replace the task list with the submitted tasks in their initial
    /// state and reset the counters (`total = len`, `started = complete = 0`).
    async fn add_tasks(&self, id: &str, tasks: &[TaskSubmission]) -> Result<(), StoreError>;

    /// Record the exit status reported for a task.
    async fn update_status(&self, id: &str, task_name: &str, status: i64)
        -> Result<(), StoreError>;

    /// Record the captured output reported for a task.
    async fn update_result(
        &self,
        id: &str,
        task_name: &str,
        result: &TaskResult,
    ) -> Result<(), StoreError>;

    /// Record the backend service id assigned to a task.
    async fn set_task_id(
        &self,
        id: &str,
        task_name: &str,
        service_id: &str,
    ) -> Result<(), StoreError>;

    /// Fetch the whole job hash. The task list stays serialized; callers
    /// deserialize via [`JobRecord::into_details`].
    async fn get_job(&self, id: &str) -> Result<JobRecord, StoreError>;

    /// Fetch the deserialized task list.
    async fn get_tasks(&self, id: &str) -> Result<Vec<TaskRecord>, StoreError>;

    /// Fetch one task by name.
    async fn get_task(&self, id: &str, task_name: &str) -> Result<TaskRecord, StoreError>;

    /// Atomically add `delta` to a counter, returning the new value.
    async fn modify_task_count(
        &self,
        id: &str,
        counter: TaskCounter,
        delta: i64,
    ) -> Result<i64, StoreError>;

    /// Read a single counter.
    async fn get_task_count(&self, id: &str, counter: TaskCounter) -> Result<i64, StoreError>;

    /// Delete the whole job hash.
    async fn clear_job(&self, id: &str) -> Result<(), StoreError>;
}

/// The serialized initial task list for a submission.
pub(crate) fn initial_task_list(tasks: &[TaskSubmission]) -> Result<String, serde_json::Error> {
    let records: Vec<TaskRecord> = tasks
        .iter()
        .map(|t| TaskRecord::new(&t.task_name, t.task_args.clone()))
        .collect();
    serde_json::to_string(&records)
}

/// Apply `apply` to the named task in `tasks`, or fail with `TaskNotFound`.
pub(crate) fn modify_task(
    id: &str,
    tasks: &mut [TaskRecord],
    task_name: &str,
    apply: impl FnOnce(&mut TaskRecord),
) -> Result<(), StoreError> {
    match tasks.iter_mut().find(|t| t.name == task_name) {
        Some(task) => {
            apply(task);
            Ok(())
        }
        None => Err(StoreError::TaskNotFound {
            id: id.to_string(),
            name: task_name.to_string(),
        }),
    }
}
