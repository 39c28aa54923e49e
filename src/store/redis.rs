//! Redis-backed job store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::config::RedisConfig;
use crate::error::StoreError;
use crate::models::{JobRecord, TaskRecord, TaskResult, TaskSubmission};
use crate::store::{initial_task_list, modify_task, JobStore, TaskCounter};

const IMAGE_FIELD: &str = "__image";
const CALLBACK_FIELD: &str = "__callback";
const TASKS_FIELD: &str = "tasks";

/// Job store over a single Redis connection manager.
pub struct RedisJobStore {
    conn: ConnectionManager,
    /// Serializes read–modify–write updates of the task list so that
    /// concurrent writers sharing this store cannot interleave.
    rmw_lock: Mutex<()>,
}

impl RedisJobStore {
    /// Connect to Redis and verify the connection.
    pub async fn connect(config: &RedisConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url())?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("connected to redis at {}", config.url());
        Ok(Self {
            conn,
            rmw_lock: Mutex::new(()),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }

    async fn ensure_exists(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let exists: bool = conn.exists(id).await?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::JobNotFound { id: id.to_string() })
        }
    }

    async fn load_tasks(&self, id: &str) -> Result<Vec<TaskRecord>, StoreError> {
        let mut conn = self.conn();
        let raw: Option<String> = conn.hget(id, TASKS_FIELD).await?;
        let raw = raw.ok_or_else(|| StoreError::JobNotFound { id: id.to_string() })?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn store_tasks(&self, id: &str, tasks: &[TaskRecord]) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let raw = serde_json::to_string(tasks)?;
        let _: () = conn.hset(id, TASKS_FIELD, raw).await?;
        Ok(())
    }

    /// Load, apply, and write back the task list under the update lock.
    async fn update_task(
        &self,
        id: &str,
        task_name: &str,
        apply: impl FnOnce(&mut TaskRecord) + Send,
    ) -> Result<(), StoreError> {
        let _guard = self.rmw_lock.lock().await;
        let mut tasks = self.load_tasks(id).await?;
        modify_task(id, &mut tasks, task_name, apply)?;
        self.store_tasks(id, &tasks).await
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn add_job(&self, id: &str, image: &str, callback: &str) -> Result<(), StoreError> {
        tracing::debug!("adding new job {}", id);
        let mut conn = self.conn();
        let fields = [
            (IMAGE_FIELD, image.to_string()),
            (CALLBACK_FIELD, callback.to_string()),
            (TASKS_FIELD, "[]".to_string()),
        ];
        let _: () = conn.hset_multiple(id, &fields).await?;
        Ok(())
    }

    async fn add_tasks(&self, id: &str, tasks: &[TaskSubmission]) -> Result<(), StoreError> {
        tracing::debug!("adding {} tasks to job {}", tasks.len(), id);
        self.ensure_exists(id).await?;
        let mut conn = self.conn();
        let fields = [
            (TASKS_FIELD, initial_task_list(tasks)?),
            (TaskCounter::Total.field(), tasks.len().to_string()),
            (TaskCounter::Started.field(), "0".to_string()),
            (TaskCounter::Complete.field(), "0".to_string()),
        ];
        let _: () = conn.hset_multiple(id, &fields).await?;
        Ok(())
    }

    async fn update_status(
        &self,
        id: &str,
        task_name: &str,
        status: i64,
    ) -> Result<(), StoreError> {
        tracing::debug!("updating status of task {} in job {} to {}", task_name, id, status);
        self.update_task(id, task_name, |task| task.status = status)
            .await
    }

    async fn update_result(
        &self,
        id: &str,
        task_name: &str,
        result: &TaskResult,
    ) -> Result<(), StoreError> {
        tracing::debug!("updating result of task {} in job {}", task_name, id);
        let result = result.clone();
        self.update_task(id, task_name, move |task| task.result = result)
            .await
    }

    async fn set_task_id(
        &self,
        id: &str,
        task_name: &str,
        service_id: &str,
    ) -> Result<(), StoreError> {
        tracing::debug!("setting service id {} on task {} in job {}", service_id, task_name, id);
        let service_id = service_id.to_string();
        self.update_task(id, task_name, move |task| task.service_id = Some(service_id))
            .await
    }

    async fn get_job(&self, id: &str) -> Result<JobRecord, StoreError> {
        let mut conn = self.conn();
        let mut hash: std::collections::HashMap<String, String> = conn.hgetall(id).await?;
        if hash.is_empty() {
            return Err(StoreError::JobNotFound { id: id.to_string() });
        }
        let field = |hash: &mut std::collections::HashMap<String, String>,
                     name: &'static str|
         -> Result<String, StoreError> {
            hash.remove(name).ok_or(StoreError::Corrupt {
                id: id.to_string(),
                field: name,
            })
        };
        let counter = |hash: &std::collections::HashMap<String, String>, c: TaskCounter| {
            hash.get(c.field())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        };
        Ok(JobRecord {
            task_count_total: counter(&hash, TaskCounter::Total),
            task_count_started: counter(&hash, TaskCounter::Started),
            task_count_complete: counter(&hash, TaskCounter::Complete),
            image: field(&mut hash, IMAGE_FIELD)?,
            callback: field(&mut hash, CALLBACK_FIELD)?,
            tasks: field(&mut hash, TASKS_FIELD)?,
        })
    }

    async fn get_tasks(&self, id: &str) -> Result<Vec<TaskRecord>, StoreError> {
        self.load_tasks(id).await
    }

    async fn get_task(&self, id: &str, task_name: &str) -> Result<TaskRecord, StoreError> {
        let tasks = self.load_tasks(id).await?;
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
        self.ensure_exists(id).await?;
        let mut conn = self.conn();
        Ok(conn.hincr(id, counter.field(), delta).await?)
    }

    async fn get_task_count(&self, id: &str, counter: TaskCounter) -> Result<i64, StoreError> {
        self.ensure_exists(id).await?;
        let mut conn = self.conn();
        let value: Option<i64> = conn.hget(id, counter.field()).await?;
        Ok(value.unwrap_or(0))
    }

    async fn clear_job(&self, id: &str) -> Result<(), StoreError> {
        tracing::debug!("clearing job {}", id);
        let mut conn = self.conn();
        let removed: i64 = conn.del(id).await?;
        if removed == 0 {
            return Err(StoreError::JobNotFound { id: id.to_string() });
        }
        Ok(())
    }
}
