//! Job scheduling and lifecycle engine.
//!
//! The scheduler owns the bounded task queue and the in-flight running set,
//! and is the only component that writes job state to the store. Two
//! background sweeps reconcile what the backend cannot be trusted to report:
//! the dead-task sweep requeues tasks whose containers stalled or never
//! came up, and the completed-job sweep detects jobs with no remaining work
//! and hands their aggregated records to the callback poster.
//!
//! One mutex guards all scheduler state. Store calls made while holding it
//! are the commit point for a transition; backend calls never happen under
//! the lock — the runner performs them with values extracted here.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::callback::CallbackPoster;
use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, StoreError};
use crate::models::{
    JobDetails, QueueEntry, RunnableTask, StartedTask, TaskRecord, TaskResult, TaskSubmission,
};
use crate::store::{JobStore, TaskCounter};

/// What a successful [`Scheduler::complete_task`] hands back to the runner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Services the backend should tear down: the completed task's own
    /// service plus everything drained from the overdue set.
    pub services_to_remove: Vec<String>,
    /// Whether another dispatch pass could start more tasks right now.
    pub may_run_more: bool,
}

#[derive(Default)]
struct SchedulerState {
    /// FIFO queue: producers push at the front, the dispatcher pops from
    /// the back.
    pending: VecDeque<QueueEntry>,
    running: Vec<QueueEntry>,
    /// Jobs the scheduler still tracks; emptied by the completed-job sweep.
    jobs: HashSet<String>,
    /// Service ids of tasks declared dead. Logically abandoned, but the
    /// physical services may linger until a completion drains them.
    overdue: HashSet<String>,
}

pub struct Scheduler {
    store: Arc<dyn JobStore>,
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    wake_tx: mpsc::Sender<()>,
}

impl Scheduler {
    /// Build a scheduler. The returned receiver is the wake channel the
    /// dispatcher drains: whenever the scheduler believes more tasks could
    /// start, it sends a (coalesced) unit on it.
    pub fn new(
        store: Arc<dyn JobStore>,
        config: SchedulerConfig,
    ) -> (Arc<Self>, mpsc::Receiver<()>) {
        let (wake_tx, wake_rx) = mpsc::channel(1);
        let scheduler = Arc::new(Self {
            store,
            config,
            state: Mutex::new(SchedulerState::default()),
            wake_tx,
        });
        (scheduler, wake_rx)
    }

    /// Register a job and queue all of its tasks.
    pub async fn add_new_job(
        &self,
        id: &str,
        image: &str,
        callback: &str,
        tasks: &[TaskSubmission],
    ) -> Result<(), SchedulerError> {
        if tasks.is_empty() {
            tracing::error!("no tasks provided when submitting job {}", id);
            return Err(SchedulerError::NoTasks);
        }
        let mut seen = HashSet::new();
        for task in tasks {
            if !seen.insert(task.task_name.as_str()) {
                return Err(SchedulerError::DuplicateTask {
                    id: id.to_string(),
                    name: task.task_name.clone(),
                });
            }
        }

        tracing::info!("adding job {} to the queue", id);
        self.store.add_job(id, image, callback).await?;
        self.store.add_tasks(id, tasks).await?;

        let mut state = self.state.lock().await;
        state.jobs.insert(id.to_string());
        for task in tasks {
            state
                .pending
                .push_front(QueueEntry::new(id, &task.task_name, task.task_args.clone(), image));
        }
        Ok(())
    }

    /// Claim up to `capacity - |running|` pending tasks for dispatch. The
    /// claimed entries move into the running set immediately; the claim time
    /// stands in for the dispatch time until [`Self::mark_task_started`]
    /// lands, so a start that never reports back is still reclaimed by the
    /// dead-task sweep.
    pub async fn get_next_tasks(&self) -> Vec<RunnableTask> {
        let mut state = self.state.lock().await;
        if state.running.len() >= self.config.capacity || state.pending.is_empty() {
            return Vec::new();
        }

        let open_slots = self.config.capacity - state.running.len();
        let mut batch = Vec::with_capacity(open_slots);
        for _ in 0..open_slots {
            let Some(mut entry) = state.pending.pop_back() else {
                break;
            };
            batch.push(RunnableTask {
                job_id: entry.job_id.clone(),
                task_name: entry.task_name.clone(),
                args: entry.args.clone(),
                image: entry.image.clone(),
            });
            entry.started_at = Some(Utc::now());
            state.running.push(entry);
        }
        batch
    }

    /// Record the service id the backend assigned to a claimed task. Unknown
    /// entries are ignored: the task may already have been swept to overdue.
    pub async fn mark_task_started(
        &self,
        job_id: &str,
        task_name: &str,
        service_id: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let Some(index) = state
            .running
            .iter()
            .position(|e| e.job_id == job_id && e.task_name == task_name)
        else {
            tracing::debug!(
                "task {} of job {} is no longer running, ignoring start",
                task_name,
                job_id
            );
            return Ok(());
        };

        self.store.set_task_id(job_id, task_name, service_id).await?;
        self.store
            .modify_task_count(job_id, TaskCounter::Started, 1)
            .await?;

        let entry = &mut state.running[index];
        entry.service_id = Some(service_id.to_string());
        entry.started_at = Some(Utc::now());
        Ok(())
    }

    /// Commit a task's reported outcome.
    ///
    /// On a match the result and status are written to the store, the entry
    /// leaves the running set, and every service id accumulated in the
    /// overdue set is drained into the returned batch so the backend gets a
    /// single cleanup call. A callback for a task that is not running (a
    /// late duplicate, or one already swept) is logged and dropped without
    /// touching the store.
    pub async fn complete_task(
        &self,
        job_id: &str,
        task_name: &str,
        status: i64,
        result: &TaskResult,
    ) -> Result<CompletionOutcome, SchedulerError> {
        let mut state = self.state.lock().await;
        if !state.jobs.contains(job_id) {
            return Err(SchedulerError::UnknownJob {
                id: job_id.to_string(),
            });
        }
        let Some(index) = state
            .running
            .iter()
            .position(|e| e.job_id == job_id && e.task_name == task_name)
        else {
            tracing::warn!(
                "was expected to find task {} for job {} but it was not present",
                task_name,
                job_id
            );
            return Ok(CompletionOutcome::default());
        };

        self.store.update_result(job_id, task_name, result).await?;
        self.store.update_status(job_id, task_name, status).await?;
        self.store
            .modify_task_count(job_id, TaskCounter::Started, -1)
            .await?;
        self.store
            .modify_task_count(job_id, TaskCounter::Complete, 1)
            .await?;

        let entry = state.running.swap_remove(index);
        let mut services_to_remove = Vec::new();
        if let Some(service_id) = entry.service_id {
            services_to_remove.push(service_id);
        }
        services_to_remove.extend(state.overdue.drain());

        let may_run_more =
            state.running.len() < self.config.capacity && !state.pending.is_empty();
        Ok(CompletionOutcome {
            services_to_remove,
            may_run_more,
        })
    }

    /// The job hash with its task list deserialized.
    pub async fn get_job_details(&self, id: &str) -> Result<JobDetails, StoreError> {
        let record = self.store.get_job(id).await?;
        Ok(record.into_details()?)
    }

    /// Just the deserialized task list.
    pub async fn get_job_tasks(&self, id: &str) -> Result<Vec<TaskRecord>, StoreError> {
        self.store.get_tasks(id).await
    }

    /// Snapshot of dispatched tasks (those with a service id).
    pub async fn get_started_tasks(&self) -> Vec<StartedTask> {
        let state = self.state.lock().await;
        state
            .running
            .iter()
            .filter_map(|e| match (&e.service_id, e.started_at) {
                (Some(service_id), Some(started_at)) => Some(StartedTask {
                    service_id: service_id.clone(),
                    started_at,
                }),
                _ => None,
            })
            .collect()
    }

    /// One pass of the dead-task sweep: every running entry older than the
    /// liveness timeout is requeued with cleared dispatch fields, and its
    /// stale service id (if any) parks in the overdue set for deferred
    /// cleanup. Wakes the dispatcher when the requeue opened up work.
    pub async fn sweep_dead_tasks(&self) {
        self.sweep_dead_tasks_at(Utc::now()).await;
        self.signal_should_run().await;
    }

    async fn sweep_dead_tasks_at(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().await;
        let mut stale = Vec::new();
        let mut index = 0;
        while index < state.running.len() {
            let expired = state.running[index].started_at.is_some_and(|started| {
                now.signed_duration_since(started)
                    .to_std()
                    .unwrap_or_default()
                    > self.config.dead_after
            });
            if expired {
                stale.push(state.running.swap_remove(index));
            } else {
                index += 1;
            }
        }
        for entry in stale {
            tracing::warn!(
                "task {} of job {} exceeded the liveness timeout, requeueing",
                entry.task_name,
                entry.job_id
            );
            if let Some(service_id) = entry.service_id {
                state.overdue.insert(service_id);
            }
            state
                .pending
                .push_front(QueueEntry::new(&entry.job_id, &entry.task_name, entry.args, &entry.image));
        }
    }

    /// One pass of the completed-job sweep: any tracked job with no pending
    /// or running tasks left is fetched, cleared from the store, and
    /// returned for callback delivery. Delivery is the caller's job and must
    /// happen outside the scheduler lock.
    pub async fn sweep_completed_jobs(&self) -> Vec<JobDetails> {
        let mut finished = Vec::new();
        let mut state = self.state.lock().await;
        let completed: Vec<String> = state
            .jobs
            .iter()
            .filter(|id| {
                !state.running.iter().any(|e| &e.job_id == *id)
                    && !state.pending.iter().any(|e| &e.job_id == *id)
            })
            .cloned()
            .collect();

        for id in completed {
            state.jobs.remove(&id);
            let record = match self.store.get_job(&id).await {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!("failed to fetch completed job {}: {}", id, e);
                    // Keep tracking it so the next pass retries.
                    state.jobs.insert(id);
                    continue;
                }
            };
            if let Err(e) = self.store.clear_job(&id).await {
                tracing::error!("failed to clear completed job {}: {}", id, e);
            }
            match record.into_details() {
                Ok(details) => {
                    tracing::info!("job {} completed", id);
                    finished.push(details);
                }
                Err(e) => tracing::error!("job {} has a corrupt task list: {}", id, e),
            }
        }
        finished
    }

    /// Wake the dispatcher when there is both headroom and queued work. The
    /// wake channel has capacity one, so repeated signals coalesce.
    pub(crate) async fn signal_should_run(&self) {
        let state = self.state.lock().await;
        if state.running.len() < self.config.capacity && !state.pending.is_empty() {
            let _ = self.wake_tx.try_send(());
        }
    }
}

/// Spawn the two background sweepers. Both run until the process exits.
pub fn spawn_sweepers(
    scheduler: Arc<Scheduler>,
    poster: Arc<CallbackPoster>,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let dead = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.config.dead_scan_interval);
            // The immediate first tick would sweep an empty state.
            interval.tick().await;
            loop {
                interval.tick().await;
                scheduler.sweep_dead_tasks().await;
            }
        })
    };

    let completed = tokio::spawn(async move {
        let mut interval = tokio::time::interval(scheduler.config.completed_scan_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            let finished = scheduler.sweep_completed_jobs().await;
            if !finished.is_empty() {
                poster.post_results(finished).await;
            }
            scheduler.signal_should_run().await;
        }
    });

    (dead, completed)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::PENDING_STATUS;
    use crate::store::MemoryJobStore;

    fn submission(name: &str, args: &[&str]) -> TaskSubmission {
        TaskSubmission {
            task_name: name.to_string(),
            task_args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn ok_result() -> TaskResult {
        TaskResult {
            stdout: Some("ok".into()),
            stderr: Some("".into()),
        }
    }

    fn scheduler_with_capacity(
        capacity: usize,
    ) -> (Arc<Scheduler>, mpsc::Receiver<()>, Arc<MemoryJobStore>) {
        let store = Arc::new(MemoryJobStore::new());
        let config = SchedulerConfig::default().with_capacity(capacity);
        let (scheduler, wake_rx) = Scheduler::new(store.clone() as Arc<dyn JobStore>, config);
        (scheduler, wake_rx, store)
    }

    async fn add_job(scheduler: &Scheduler, id: &str, tasks: &[TaskSubmission]) {
        scheduler
            .add_new_job(id, "some-image", "http://callback.org", tasks)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_new_job_rejects_empty_tasks() {
        let (scheduler, _rx, store) = scheduler_with_capacity(2);
        let err = scheduler
            .add_new_job("abc123", "img", "http://cb", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::NoTasks));
        // Nothing was written.
        assert!(store.get_job("abc123").await.is_err());
        assert!(scheduler.get_next_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_add_new_job_rejects_duplicate_names() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(2);
        let err = scheduler
            .add_new_job(
                "abc123",
                "img",
                "http://cb",
                &[submission("a", &[]), submission("a", &[])],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::DuplicateTask { .. }));
    }

    #[tokio::test]
    async fn test_get_next_tasks_fifo_and_capacity() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(2);
        add_job(
            &scheduler,
            "abc123",
            &[
                submission("first", &["a"]),
                submission("second", &[]),
                submission("third", &[]),
            ],
        )
        .await;

        let batch = scheduler.get_next_tasks().await;
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].task_name, "first");
        assert_eq!(batch[0].args, vec!["a".to_string()]);
        assert_eq!(batch[0].image, "some-image");
        assert_eq!(batch[1].task_name, "second");

        // At capacity nothing more comes out.
        assert!(scheduler.get_next_tasks().await.is_empty());

        scheduler
            .complete_task("abc123", "first", 0, &ok_result())
            .await
            .unwrap();
        let batch = scheduler.get_next_tasks().await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].task_name, "third");
    }

    #[tokio::test]
    async fn test_mark_task_started_commits_to_store() {
        let (scheduler, _rx, store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &[])]).await;
        scheduler.get_next_tasks().await;

        scheduler
            .mark_task_started("abc123", "first", "svc-1")
            .await
            .unwrap();

        let task = store.get_task("abc123", "first").await.unwrap();
        assert_eq!(task.service_id.as_deref(), Some("svc-1"));
        assert_eq!(
            store
                .get_task_count("abc123", TaskCounter::Started)
                .await
                .unwrap(),
            1
        );

        let started = scheduler.get_started_tasks().await;
        assert_eq!(started.len(), 1);
        assert_eq!(started[0].service_id, "svc-1");
    }

    #[tokio::test]
    async fn test_mark_task_started_ignores_unknown_entries() {
        let (scheduler, _rx, store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &[])]).await;

        // Never claimed, so not in the running set.
        scheduler
            .mark_task_started("abc123", "ghost", "svc-1")
            .await
            .unwrap();
        assert_eq!(
            store
                .get_task_count("abc123", TaskCounter::Started)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_complete_task_commits_and_returns_service() {
        let (scheduler, _rx, store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &["a"])]).await;
        scheduler.get_next_tasks().await;
        scheduler
            .mark_task_started("abc123", "first", "svc-1")
            .await
            .unwrap();

        let outcome = scheduler
            .complete_task("abc123", "first", 0, &ok_result())
            .await
            .unwrap();
        assert_eq!(outcome.services_to_remove, vec!["svc-1".to_string()]);
        assert!(!outcome.may_run_more);

        let task = store.get_task("abc123", "first").await.unwrap();
        assert_eq!(task.status, 0);
        assert_eq!(task.result, ok_result());
        assert_eq!(
            store
                .get_task_count("abc123", TaskCounter::Started)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .get_task_count("abc123", TaskCounter::Complete)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_complete_task_unknown_job() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(2);
        let err = scheduler
            .complete_task("ghost", "first", 0, &ok_result())
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnknownJob { .. }));
    }

    #[tokio::test]
    async fn test_complete_task_unknown_task_is_dropped() {
        let (scheduler, _rx, store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &[])]).await;
        scheduler.get_next_tasks().await;

        let outcome = scheduler
            .complete_task("abc123", "ghost", 0, &ok_result())
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::default());

        // The real task's record was not touched.
        let task = store.get_task("abc123", "first").await.unwrap();
        assert_eq!(task.status, PENDING_STATUS);
    }

    #[tokio::test]
    async fn test_dead_sweep_requeues_identical_task() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &["a", "b"])]).await;
        scheduler.get_next_tasks().await;
        scheduler
            .mark_task_started("abc123", "first", "svc-1")
            .await
            .unwrap();

        scheduler
            .sweep_dead_tasks_at(Utc::now() + chrono::Duration::hours(1))
            .await;

        // Re-emitted with the same name, args, and image, dispatch fields
        // cleared.
        let batch = scheduler.get_next_tasks().await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].task_name, "first");
        assert_eq!(batch[0].args, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(batch[0].image, "some-image");
        assert!(scheduler.get_started_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_overdue_service_drains_on_next_completion() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &[])]).await;
        scheduler.get_next_tasks().await;
        scheduler
            .mark_task_started("abc123", "first", "svc-1")
            .await
            .unwrap();

        scheduler
            .sweep_dead_tasks_at(Utc::now() + chrono::Duration::hours(1))
            .await;

        // Second attempt gets a fresh service.
        scheduler.get_next_tasks().await;
        scheduler
            .mark_task_started("abc123", "first", "svc-2")
            .await
            .unwrap();

        let outcome = scheduler
            .complete_task("abc123", "first", 0, &ok_result())
            .await
            .unwrap();
        let mut services = outcome.services_to_remove;
        services.sort();
        assert_eq!(services, vec!["svc-1".to_string(), "svc-2".to_string()]);
    }

    #[tokio::test]
    async fn test_dead_sweep_reclaims_failed_dispatch() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &[])]).await;
        // Claimed but the backend never confirmed a start.
        scheduler.get_next_tasks().await;

        scheduler
            .sweep_dead_tasks_at(Utc::now() + chrono::Duration::hours(1))
            .await;

        let batch = scheduler.get_next_tasks().await;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].task_name, "first");

        // No service id existed, so nothing was parked for cleanup.
        let outcome = scheduler
            .complete_task("abc123", "first", 0, &ok_result())
            .await
            .unwrap();
        assert!(outcome.services_to_remove.is_empty());
    }

    #[tokio::test]
    async fn test_dead_sweep_leaves_live_tasks_alone() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &[])]).await;
        scheduler.get_next_tasks().await;
        scheduler
            .mark_task_started("abc123", "first", "svc-1")
            .await
            .unwrap();

        scheduler.sweep_dead_tasks_at(Utc::now()).await;
        assert_eq!(scheduler.get_started_tasks().await.len(), 1);
        assert!(scheduler.get_next_tasks().await.is_empty());
    }

    #[tokio::test]
    async fn test_completion_sweep_clears_finished_job() {
        let (scheduler, _rx, store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("first", &[])]).await;
        scheduler.get_next_tasks().await;
        scheduler
            .mark_task_started("abc123", "first", "svc-1")
            .await
            .unwrap();
        scheduler
            .complete_task("abc123", "first", 0, &ok_result())
            .await
            .unwrap();

        let finished = scheduler.sweep_completed_jobs().await;
        assert_eq!(finished.len(), 1);
        let details = &finished[0];
        assert_eq!(details.callback, "http://callback.org");
        assert_eq!(details.tasks[0].status, 0);
        assert_eq!(details.tasks[0].result, ok_result());

        // Cleared from the store and no longer tracked.
        assert!(store.get_job("abc123").await.is_err());
        assert!(scheduler.sweep_completed_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_completion_sweep_skips_jobs_with_work_left() {
        let (scheduler, _rx, store) = scheduler_with_capacity(1);
        add_job(
            &scheduler,
            "abc123",
            &[submission("first", &[]), submission("second", &[])],
        )
        .await;
        scheduler.get_next_tasks().await;
        scheduler
            .complete_task("abc123", "first", 0, &ok_result())
            .await
            .unwrap();

        // "second" is still pending.
        assert!(scheduler.sweep_completed_jobs().await.is_empty());
        assert!(store.get_job("abc123").await.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_wakes_dispatcher_when_work_opens_up() {
        let (scheduler, mut wake_rx, _store) = scheduler_with_capacity(1);
        add_job(
            &scheduler,
            "abc123",
            &[submission("first", &[]), submission("second", &[])],
        )
        .await;
        scheduler.get_next_tasks().await;
        scheduler
            .mark_task_started("abc123", "first", "svc-1")
            .await
            .unwrap();

        // Running is at capacity: no wake even though work is pending.
        scheduler.signal_should_run().await;
        assert!(wake_rx.try_recv().is_err());

        // The sweep requeues "first", freeing a slot with work queued.
        scheduler
            .sweep_dead_tasks_at(Utc::now() + chrono::Duration::hours(1))
            .await;
        scheduler.signal_should_run().await;
        assert!(wake_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_running_never_exceeds_capacity() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(3);
        for job in ["j1", "j2"] {
            add_job(
                &scheduler,
                job,
                &[
                    submission("a", &[]),
                    submission("b", &[]),
                    submission("c", &[]),
                ],
            )
            .await;
        }

        let first = scheduler.get_next_tasks().await;
        assert_eq!(first.len(), 3);
        assert!(scheduler.get_next_tasks().await.is_empty());

        scheduler
            .complete_task(&first[0].job_id, &first[0].task_name, 0, &ok_result())
            .await
            .unwrap();
        assert_eq!(scheduler.get_next_tasks().await.len(), 1);
    }

    #[tokio::test]
    async fn test_get_job_details_parses_tasks() {
        let (scheduler, _rx, _store) = scheduler_with_capacity(2);
        add_job(&scheduler, "abc123", &[submission("a", &["1", "2"])]).await;

        let details = scheduler.get_job_details("abc123").await.unwrap();
        assert_eq!(details.image, "some-image");
        assert_eq!(details.task_count_total, 1);
        assert_eq!(details.tasks.len(), 1);
        assert_eq!(details.tasks[0].name, "a");
        assert_eq!(details.tasks[0].args, vec!["1".to_string(), "2".to_string()]);
        assert_eq!(details.tasks[0].status, PENDING_STATUS);
        assert_eq!(details.tasks[0].result, TaskResult::default());
    }
}
