//! In-memory job store.
//!
//! Mirrors the Redis hash layout (the task list is held serialized) so the
//! scheduler sees identical semantics. Used by the test suites and for
//! local smoke runs without a Redis instance.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{JobRecord, TaskRecord, TaskResult, TaskSubmission};
use crate::store::{initial_task_list, modify_task, JobStore, TaskCounter};

#[derive(Debug, Clone)]
struct StoredJob {
    image: String,
    callback: String,
    tasks: String,
    total: i64,
    started: i64,
    complete: i64,
}

impl StoredJob {
    fn counter_mut(&mut self, counter: TaskCounter) -> &mut i64 {
        match counter {
            TaskCounter::Total => &mut self.total,
            TaskCounter::Started => &mut self.started,
            TaskCounter::Complete => &mut self.complete,
        }
    }

    fn counter(&self, counter: TaskCounter) -> i64 {
        match counter {
            TaskCounter::Total => self.total,
            TaskCounter::Started => self.started,
            TaskCounter::Complete => self.complete,
        }
    }
}

/// Process-local [`JobStore`] implementation.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, StoredJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_job<T>(
        &self,
        id: &str,
        apply: impl FnOnce(&mut StoredJob) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut jobs = self.jobs.lock().expect("job map poisoned");
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::JobNotFound { id: id.to_string() })?;
        apply(job)
    }

    fn update_task(
        &self,
        id: &str,
        task_name: &str,
        apply: impl FnOnce(&mut TaskRecord),
    ) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            let mut tasks: Vec<TaskRecord> = serde_json::from_str(&job.tasks)?;
            modify_task(id, &mut tasks, task_name, apply)?;
            job.tasks = serde_json::to_string(&tasks)?;
            Ok(())
        })
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn add_job(&self, id: &str, image: &str, callback: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().expect("job map poisoned");
        jobs.insert(
            id.to_string(),
            StoredJob {
                image: image.to_string(),
                callback: callback.to_string(),
                tasks: "[]".to_string(),
                total: 0,
                started: 0,
                complete: 0,
            },
        );
        Ok(())
    }

    async fn add_tasks(&self, id: &str, tasks: &[TaskSubmission]) -> Result<(), StoreError> {
        let raw = initial_task_list(tasks)?;
        self.with_job(id, |job| {
            job.tasks = raw;
            job.total = tasks.len() as i64;
            job.started = 0;
            job.complete = 0;
            Ok(())
        })
    }

    async fn update_status(
        &self,
        id: &str,
        task_name: &str,
        status: i64,
    ) -> Result<(), StoreError> {
        self.update_task(id, task_name, |task| task.status = status)
    }

    async fn update_result(
        &self,
        id: &str,
        task_name: &str,
        result: &TaskResult,
    ) -> Result<(), StoreError> {
        let result = result.clone();
        self.update_task(id, task_name, move |task| task.result = result)
    }

    async fn set_task_id(
        &self,
        id: &str,
        task_name: &str,
        service_id: &str,
    ) -> Result<(), StoreError> {
        let service_id = service_id.to_string();
        self.update_task(id, task_name, move |task| task.service_id = Some(service_id))
    }

    async fn get_job(&self, id: &str) -> Result<JobRecord, StoreError> {
        self.with_job(id, |job| {
            Ok(JobRecord {
                image: job.image.clone(),
                callback: job.callback.clone(),
                task_count_total: job.total,
                task_count_started: job.started,
                task_count_complete: job.complete,
                tasks: job.tasks.clone(),
            })
        })
    }

    async fn get_tasks(&self, id: &str) -> Result<Vec<TaskRecord>, StoreError> {
        self.with_job(id, |job| Ok(serde_json::from_str(&job.tasks)?))
    }

    async fn get_task(&self, id: &str, task_name: &str) -> Result<TaskRecord, StoreError> {
        let tasks = self.get_tasks(id).await?;
        tasks
            .into_iter()
            .find(|t| t.name == task_name)
            .ok_or_else(|| StoreError::TaskNotFound {
                id: id.to_string(),
                name: task_name.to_string(),
            })
    }

    async fn modify_task_count(
        &self,
        id: &str,
        counter: TaskCounter,
        delta: i64,
    ) -> Result<i64, StoreError> {
        self.with_job(id, |job| {
            let value = job.counter_mut(counter);
            *value += delta;
            Ok(*value)
        })
    }

    async fn get_task_count(&self, id: &str, counter: TaskCounter) -> Result<i64, StoreError> {
        self.with_job(id, |job| Ok(job.counter(counter)))
    }

    async fn clear_job(&self, id: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.lock().expect("job map poisoned");
        jobs.remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::JobNotFound { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::PENDING_STATUS;

    fn submission(name: &str, args: &[&str]) -> TaskSubmission {
        TaskSubmission {
            task_name: name.to_string(),
            task_args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    async fn seeded_store() -> MemoryJobStore {
        let store = MemoryJobStore::new();
        store
            .add_job("abc123", "some-image", "http://callback.org")
            .await
            .unwrap();
        store
            .add_tasks("abc123", &[submission("a", &["1", "2"])])
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_add_tasks_initial_state() {
        let store = seeded_store().await;
        let tasks = store.get_tasks("abc123").await.unwrap();
        assert_eq!(
            tasks,
            vec![TaskRecord::new("a", vec!["1".into(), "2".into()])]
        );
        assert_eq!(tasks[0].status, PENDING_STATUS);
        assert_eq!(
            store.get_task_count("abc123", TaskCounter::Total).await.unwrap(),
            1
        );
        assert_eq!(
            store.get_task_count("abc123", TaskCounter::Started).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_add_tasks_unknown_job() {
        let store = MemoryJobStore::new();
        let err = store
            .add_tasks("nope", &[submission("a", &[])])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_job_keeps_tasks_serialized() {
        let store = seeded_store().await;
        let record = store.get_job("abc123").await.unwrap();
        assert_eq!(record.image, "some-image");
        assert_eq!(record.callback, "http://callback.org");
        assert_eq!(record.task_count_total, 1);
        let parsed: Vec<TaskRecord> = serde_json::from_str(&record.tasks).unwrap();
        assert_eq!(parsed[0].name, "a");
    }

    #[tokio::test]
    async fn test_status_and_result_round_trip() {
        let store = seeded_store().await;
        let result = TaskResult {
            stdout: Some("ok".into()),
            stderr: Some("".into()),
        };
        store.update_result("abc123", "a", &result).await.unwrap();
        store.update_status("abc123", "a", 0).await.unwrap();

        let task = store.get_task("abc123", "a").await.unwrap();
        assert_eq!(task.status, 0);
        assert_eq!(task.result, result);
    }

    #[tokio::test]
    async fn test_update_status_unknown_task() {
        let store = seeded_store().await;
        let err = store.update_status("abc123", "ghost", 0).await.unwrap_err();
        assert!(matches!(err, StoreError::TaskNotFound { .. }));
    }

    #[tokio::test]
    async fn test_set_task_id() {
        let store = seeded_store().await;
        store.set_task_id("abc123", "a", "svc-9").await.unwrap();
        let task = store.get_task("abc123", "a").await.unwrap();
        assert_eq!(task.service_id.as_deref(), Some("svc-9"));
    }

    #[tokio::test]
    async fn test_modify_task_count_returns_new_value() {
        let store = seeded_store().await;
        let started = store
            .modify_task_count("abc123", TaskCounter::Started, 1)
            .await
            .unwrap();
        assert_eq!(started, 1);
        let started = store
            .modify_task_count("abc123", TaskCounter::Started, -1)
            .await
            .unwrap();
        assert_eq!(started, 0);
    }

    #[tokio::test]
    async fn test_clear_job_missing() {
        let store = seeded_store().await;
        store.clear_job("abc123").await.unwrap();
        let err = store.clear_job("abc123").await.unwrap_err();
        assert!(matches!(err, StoreError::JobNotFound { .. }));
        let err = store.get_job("abc123").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
