//! # Job Dispatcher
//!
//! Runs long-latency work (ledger anchoring) off the caller's path.
//!
//! ## Flow
//!
//! 1. [`JobDispatcher::dispatch`] records the owning account, pushes the job
//!    onto a bounded queue and returns a [`JobResult`] immediately.
//! 2. The worker task spawns every queued job; each job publishes its
//!    status through its own `watch` channel.
//! 3. On completion a [`NotificationMessage`] goes onto a second bounded
//!    queue, drained by the notifier task into the [`WebhookSender`].
//!
//! Finished jobs stay queryable until more than
//! [`JobsConfig::finished_retention`] of them exist; the oldest are evicted
//! on the next dispatch.
//!
//! Cancelling the dispatcher's [`CancellationToken`] stops both tasks and
//! marks running jobs `Cancelled`.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cdoc_core::{AccountId, JobId, Timestamp};
use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};

use crate::cancel::CancellationToken;
use crate::config::JobsConfig;
use crate::error::JobError;
use crate::webhook::{EventType, NotificationMessage, WebhookSender};

/// Work executed by a job. The `Ok` value is reported as the job's result.
pub type JobTask = Pin<Box<dyn Future<Output = Result<String, JobError>> + Send + 'static>>;

/// Lifecycle of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded(String),
    Failed(String),
    Cancelled,
}

impl JobStatus {
    /// True for the three terminal states.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded(_) | Self::Failed(_) | Self::Cancelled)
    }

    /// Short name, used as metric label and webhook status.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded(_) => "succeeded",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Handle on a dispatched job.
#[derive(Debug, Clone)]
pub struct JobResult {
    id: JobId,
    rx: watch::Receiver<JobStatus>,
}

impl JobResult {
    /// The job's id.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.rx.borrow().clone()
    }

    /// Wait until the job finishes or `cancel` fires.
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `cancel` fired first or the job was cancelled.
    /// - `Failed` if the job failed.
    /// - `Shutdown` if the dispatcher went away before the job finished.
    pub async fn await_completion(&self, cancel: &CancellationToken) -> Result<String, JobError> {
        let mut rx = self.rx.clone();
        loop {
            let status = rx.borrow_and_update().clone();
            match status {
                JobStatus::Succeeded(out) => return Ok(out),
                JobStatus::Failed(reason) => return Err(JobError::Failed(reason)),
                JobStatus::Cancelled => return Err(JobError::Cancelled(self.id)),
                JobStatus::Queued | JobStatus::Running => {}
            }
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(JobError::Shutdown);
                    }
                }
                _ = cancel.cancelled() => return Err(JobError::Cancelled(self.id)),
            }
        }
    }
}

struct QueuedJob {
    id: JobId,
    account: AccountId,
    description: String,
    task: JobTask,
    state: watch::Sender<JobStatus>,
}

struct JobEntry {
    owner: AccountId,
    rx: watch::Receiver<JobStatus>,
}

/// Jobs by id, plus dispatch order for eviction.
#[derive(Default)]
struct JobTable {
    entries: HashMap<JobId, JobEntry>,
    order: VecDeque<JobId>,
}

impl JobTable {
    fn insert(&mut self, id: JobId, entry: JobEntry) {
        self.entries.insert(id, entry);
        self.order.push_back(id);
    }

    fn remove(&mut self, id: &JobId) {
        self.entries.remove(id);
        self.order.retain(|queued| queued != id);
    }

    /// Drop the oldest finished jobs until at most `keep` remain.
    fn evict_finished(&mut self, keep: usize) -> usize {
        let mut finished = self
            .entries
            .values()
            .filter(|e| e.rx.borrow().is_finished())
            .count();
        if finished <= keep {
            return 0;
        }
        let excess = finished - keep;
        let entries = &mut self.entries;
        self.order.retain(|id| {
            if finished <= keep {
                return true;
            }
            match entries.get(id).map(|e| e.rx.borrow().is_finished()) {
                Some(true) => {
                    entries.remove(id);
                    finished -= 1;
                    false
                }
                Some(false) => true,
                None => false,
            }
        });
        excess
    }
}

/// Bounded asynchronous job runner with owner-scoped status queries.
pub struct JobDispatcher {
    queue: mpsc::Sender<QueuedJob>,
    jobs: RwLock<JobTable>,
    finished_retention: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobDispatcher")
            .field("jobs", &self.jobs.read().entries.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl JobDispatcher {
    /// Spawn the worker and notifier tasks. Must be called inside a Tokio
    /// runtime.
    pub fn start(
        config: &JobsConfig,
        webhooks: Arc<dyn WebhookSender>,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (notify_tx, notify_rx) = mpsc::channel(config.notification_capacity.max(1));
        tokio::spawn(run_worker(queue_rx, notify_tx, cancel.clone()));
        tokio::spawn(run_notifier(notify_rx, webhooks, cancel.clone()));
        Arc::new(Self {
            queue: queue_tx,
            jobs: RwLock::new(JobTable::default()),
            finished_retention: config.finished_retention,
            cancel,
        })
    }

    /// Queue `task` on behalf of `account`.
    ///
    /// # Errors
    ///
    /// `QueueFull` when the queue is at capacity, `Shutdown` after
    /// cancellation.
    pub fn dispatch<F>(
        &self,
        account: AccountId,
        description: impl Into<String>,
        task: F,
    ) -> Result<JobResult, JobError>
    where
        F: Future<Output = Result<String, JobError>> + Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(JobError::Shutdown);
        }
        let id = JobId::new();
        let description = description.into();
        let (state, rx) = watch::channel(JobStatus::Queued);
        {
            let mut jobs = self.jobs.write();
            let evicted = jobs.evict_finished(self.finished_retention);
            if evicted > 0 {
                tracing::debug!(evicted, "evicted finished jobs");
            }
            jobs.insert(
                id,
                JobEntry {
                    owner: account,
                    rx: rx.clone(),
                },
            );
        }
        let queued = QueuedJob {
            id,
            account,
            description: description.clone(),
            task: Box::pin(task),
            state,
        };
        if let Err(e) = self.queue.try_send(queued) {
            self.jobs.write().remove(&id);
            return Err(match e {
                mpsc::error::TrySendError::Full(_) => JobError::QueueFull,
                mpsc::error::TrySendError::Closed(_) => JobError::Shutdown,
            });
        }
        metrics::counter!("cdoc_jobs_dispatched_total").increment(1);
        tracing::info!(job_id = %id, account = %account, %description, "job dispatched");
        Ok(JobResult { id, rx })
    }

    /// Status of a job owned by `account`.
    pub fn status(&self, account: &AccountId, id: &JobId) -> Result<JobStatus, JobError> {
        Ok(self.result(account, id)?.status())
    }

    /// Handle on a job owned by `account`.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown ids, `NotOwner` if another account owns it.
    pub fn result(&self, account: &AccountId, id: &JobId) -> Result<JobResult, JobError> {
        let jobs = self.jobs.read();
        let entry = jobs.entries.get(id).ok_or(JobError::NotFound(*id))?;
        if entry.owner != *account {
            return Err(JobError::NotOwner {
                job: *id,
                account: *account,
            });
        }
        Ok(JobResult {
            id: *id,
            rx: entry.rx.clone(),
        })
    }

    /// Stop the worker and notifier.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn run_worker(
    mut queue: mpsc::Receiver<QueuedJob>,
    notify: mpsc::Sender<NotificationMessage>,
    cancel: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = cancel.cancelled() => break,
            job = queue.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };
        let notify = notify.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            job.state.send_replace(JobStatus::Running);
            let status = tokio::select! {
                _ = cancel.cancelled() => JobStatus::Cancelled,
                out = job.task => match out {
                    Ok(result) => JobStatus::Succeeded(result),
                    Err(JobError::Failed(reason)) => JobStatus::Failed(reason),
                    Err(e) => JobStatus::Failed(e.to_string()),
                },
            };
            metrics::counter!("cdoc_jobs_completed_total", "status" => status.label()).increment(1);
            match &status {
                JobStatus::Failed(reason) => {
                    tracing::warn!(job_id = %job.id, %reason, "job failed")
                }
                other => tracing::info!(job_id = %job.id, status = other.label(), "job finished"),
            }
            let message = NotificationMessage {
                event_type: EventType::Job,
                job_id: job.id,
                account_id: job.account,
                description: job.description,
                status: status.label().to_string(),
                finished_at: Timestamp::now(),
            };
            job.state.send_replace(status);
            if notify.send(message).await.is_err() {
                tracing::debug!(job_id = %job.id, "notifier stopped; completion not delivered");
            }
        });
    }
    tracing::debug!("job worker stopped");
}

async fn run_notifier(
    mut notifications: mpsc::Receiver<NotificationMessage>,
    webhooks: Arc<dyn WebhookSender>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = notifications.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };
        if let Err(e) = webhooks.send(&message).await {
            tracing::warn!(job_id = %message.job_id, error = %e, "completion webhook failed");
        }
    }
    tracing::debug!("job notifier stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::MemoryWebhookSender;
    use std::time::Duration;

    fn dispatcher() -> (Arc<JobDispatcher>, Arc<MemoryWebhookSender>, CancellationToken) {
        let hooks = Arc::new(MemoryWebhookSender::new());
        let cancel = CancellationToken::new();
        let jobs = JobDispatcher::start(&JobsConfig::default(), hooks.clone(), cancel.clone());
        (jobs, hooks, cancel)
    }

    async fn wait_for_messages(hooks: &MemoryWebhookSender, n: usize) -> Vec<NotificationMessage> {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let messages = hooks.messages();
                if messages.len() >= n {
                    return messages;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_job_completes_and_notifies_owner() {
        let (jobs, hooks, _cancel) = dispatcher();
        let owner = AccountId::random();
        let result = jobs
            .dispatch(owner, "anchor document", async { Ok("0xroot".to_string()) })
            .unwrap();
        let out = result.await_completion(&CancellationToken::new()).await.unwrap();
        assert_eq!(out, "0xroot");
        assert_eq!(
            jobs.status(&owner, &result.id()).unwrap(),
            JobStatus::Succeeded("0xroot".into())
        );

        let messages = wait_for_messages(&hooks, 1).await;
        assert_eq!(messages[0].job_id, result.id());
        assert_eq!(messages[0].account_id, owner);
        assert_eq!(messages[0].status, "succeeded");
        assert_eq!(messages[0].description, "anchor document");
    }

    #[tokio::test]
    async fn test_failed_job_reports_reason() {
        let (jobs, hooks, _cancel) = dispatcher();
        let result = jobs
            .dispatch(AccountId::random(), "anchor", async {
                Err(JobError::Failed("ledger said no".into()))
            })
            .unwrap();
        match result.await_completion(&CancellationToken::new()).await {
            Err(JobError::Failed(reason)) => assert!(reason.contains("ledger said no")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(wait_for_messages(&hooks, 1).await[0].status, "failed");
    }

    #[tokio::test]
    async fn test_status_is_owner_scoped() {
        let (jobs, _hooks, _cancel) = dispatcher();
        let owner = AccountId::random();
        let result = jobs.dispatch(owner, "x", async { Ok(String::new()) }).unwrap();
        let stranger = AccountId::random();
        assert!(matches!(
            jobs.status(&stranger, &result.id()),
            Err(JobError::NotOwner { .. })
        ));
        assert!(matches!(
            jobs.status(&owner, &JobId::new()),
            Err(JobError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_oldest_finished_jobs_are_evicted() {
        let config = JobsConfig {
            finished_retention: 1,
            ..JobsConfig::default()
        };
        let jobs = JobDispatcher::start(
            &config,
            Arc::new(MemoryWebhookSender::new()),
            CancellationToken::new(),
        );
        let owner = AccountId::random();
        let first = jobs.dispatch(owner, "first", async { Ok("1".to_string()) }).unwrap();
        first.await_completion(&CancellationToken::new()).await.unwrap();
        let second = jobs.dispatch(owner, "second", async { Ok("2".to_string()) }).unwrap();
        second.await_completion(&CancellationToken::new()).await.unwrap();
        // Still running: never evicted.
        let running = jobs
            .dispatch(owner, "forever", std::future::pending::<Result<String, JobError>>())
            .unwrap();

        assert!(matches!(
            jobs.status(&owner, &first.id()),
            Err(JobError::NotFound(_))
        ));
        assert_eq!(
            jobs.status(&owner, &second.id()).unwrap(),
            JobStatus::Succeeded("2".into())
        );
        // Handles already given out keep working.
        assert_eq!(first.status(), JobStatus::Succeeded("1".into()));

        jobs.dispatch(owner, "third", async { Ok("3".to_string()) }).unwrap();
        assert!(!jobs.status(&owner, &running.id()).unwrap().is_finished());
    }

    #[tokio::test]
    async fn test_wait_can_be_cancelled() {
        let (jobs, _hooks, _cancel) = dispatcher();
        let result = jobs
            .dispatch(AccountId::random(), "forever", std::future::pending::<Result<String, JobError>>())
            .unwrap();
        let wait = CancellationToken::new();
        wait.cancel();
        assert!(matches!(
            result.await_completion(&wait).await,
            Err(JobError::Cancelled(_))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_jobs() {
        let (jobs, _hooks, cancel) = dispatcher();
        let owner = AccountId::random();
        let result = jobs.dispatch(owner, "forever", std::future::pending::<Result<String, JobError>>()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while result.status() == JobStatus::Queued {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        cancel.cancel();
        let status = result.await_completion(&CancellationToken::new()).await;
        assert!(matches!(status, Err(JobError::Cancelled(_))));
        assert!(matches!(
            jobs.dispatch(owner, "late", async { Ok(String::new()) }),
            Err(JobError::Shutdown)
        ));
    }
}
