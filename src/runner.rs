//! Thin orchestrator wiring the API surface to the scheduler and the
//! container backend.
//!
//! The runner is the only component that talks to the backend, and it always
//! does so outside the scheduler lock: it extracts decisions (claimed tasks,
//! services to remove) from the scheduler and performs the side effects
//! afterwards. It also drains the scheduler's wake channel so background
//! sweeps can trigger dispatch without an API request.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{SchedulerError, StoreError};
use crate::models::{JobDetails, TaskRecord, TaskResult, TaskSubmission};
use crate::scheduler::Scheduler;
use crate::swarm::ContainerBackend;

pub struct JobRunner {
    scheduler: Arc<Scheduler>,
    backend: Arc<dyn ContainerBackend>,
}

impl JobRunner {
    pub fn new(scheduler: Arc<Scheduler>, backend: Arc<dyn ContainerBackend>) -> Self {
        Self { scheduler, backend }
    }

    /// Register a job under a fresh sortable identifier and start as many of
    /// its tasks as capacity allows.
    pub async fn create_new_job(
        &self,
        image: &str,
        callback: &str,
        tasks: &[TaskSubmission],
    ) -> Result<String, SchedulerError> {
        let id = Uuid::now_v7().to_string();
        tracing::info!(
            "creating job {} with image {} and callback {}",
            id,
            image,
            callback
        );
        self.scheduler.add_new_job(&id, image, callback, tasks).await?;
        self.run_tasks().await;
        Ok(id)
    }

    /// One dispatch pass: claim whatever fits and start it on the backend,
    /// threading each assigned service id back into the scheduler.
    pub async fn run_tasks(&self) {
        let batch = self.scheduler.get_next_tasks().await;
        for task in batch {
            match self
                .backend
                .start_task(&task.job_id, &task.image, &task.task_name, &task.args)
                .await
            {
                Ok(service_id) => {
                    if let Err(e) = self
                        .scheduler
                        .mark_task_started(&task.job_id, &task.task_name, &service_id)
                        .await
                    {
                        tracing::warn!(
                            "failed to record start of task {} in job {}: {}",
                            task.task_name,
                            task.job_id,
                            e
                        );
                    }
                }
                Err(e) => {
                    // The claimed entry stays in the running set without a
                    // service id; the dead-task sweep requeues it.
                    tracing::error!(
                        "failed to start task {} in job {}: {}",
                        task.task_name,
                        task.job_id,
                        e
                    );
                }
            }
        }
    }

    /// Record a task outcome reported through the result callback, tear down
    /// whatever services the scheduler handed back, and dispatch more work
    /// if a slot opened up.
    pub async fn complete_task(
        &self,
        job_id: &str,
        task_name: &str,
        status: i64,
        result: &TaskResult,
    ) -> Result<(), SchedulerError> {
        tracing::info!(
            "completing task {} in job {} with status {}",
            task_name,
            job_id,
            status
        );
        let outcome = self
            .scheduler
            .complete_task(job_id, task_name, status, result)
            .await?;

        if !outcome.services_to_remove.is_empty() {
            if let Err(e) = self.backend.remove_services(&outcome.services_to_remove).await {
                tracing::warn!("service cleanup failed: {}", e);
            }
        }
        if outcome.may_run_more {
            self.run_tasks().await;
        }
        Ok(())
    }

    pub async fn get_job(&self, id: &str) -> Result<JobDetails, StoreError> {
        self.scheduler.get_job_details(id).await
    }

    pub async fn get_job_tasks(&self, id: &str) -> Result<Vec<TaskRecord>, StoreError> {
        self.scheduler.get_job_tasks(id).await
    }

    /// Drain the scheduler's wake channel, dispatching on every signal.
    pub fn spawn_dispatch_loop(self: Arc<Self>, mut wake_rx: mpsc::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while wake_rx.recv().await.is_some() {
                self.run_tasks().await;
            }
        })
    }
}
