//! Job tracker: per-item timers feeding one shared job record.
//!
//! Items finish in whatever order their timers fire. Aggregate completion is
//! derived from the post-transition state of the whole item list, and since
//! an item can only leave `Pending` once, it is observed exactly once.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::timer::{self, TimerHandle};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Error recorded on items still pending when their job is cancelled.
pub const CANCELLED: &str = "cancelled";

/// Status of a single job item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Completed,
    Failed,
}

impl ItemStatus {
    pub fn can_transition_to(&self, target: ItemStatus) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// What to run for one item, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub id: String,
    pub delay: Duration,
}

impl ItemSpec {
    pub fn new(id: impl Into<String>, delay: Duration) -> Self {
        Self {
            id: id.into(),
            delay,
        }
    }
}

/// One item of a background job.
#[derive(Debug, Clone, Serialize)]
pub struct JobItem<T> {
    pub id: String,
    pub position: usize,
    pub status: ItemStatus,
    /// Populated only once the item has completed.
    pub result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// An ordered collection of items that finish independently.
#[derive(Debug, Clone, Serialize)]
pub struct BackgroundJob<T> {
    pub id: Uuid,
    pub items: Vec<JobItem<T>>,
    pub started_at: DateTime<Utc>,
    /// Set at the moment the last pending item reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
}

impl<T> BackgroundJob<T> {
    pub fn new(specs: &[ItemSpec]) -> Self {
        Self {
            id: Uuid::new_v4(),
            items: specs
                .iter()
                .enumerate()
                .map(|(position, spec)| JobItem {
                    id: spec.id.clone(),
                    position,
                    status: ItemStatus::Pending,
                    result: None,
                    error: None,
                    finished_at: None,
                })
                .collect(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Move an item out of `Pending`. Returns `true` when this transition
    /// left every item terminal.
    pub fn finish_item(
        &mut self,
        item_id: &str,
        outcome: Result<T, String>,
    ) -> Result<bool, JobError> {
        let job_id = self.id;
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| JobError::ItemNotFound {
                id: job_id,
                item: item_id.to_string(),
            })?;

        let target = if outcome.is_ok() {
            ItemStatus::Completed
        } else {
            ItemStatus::Failed
        };
        if !item.status.can_transition_to(target) {
            return Err(JobError::InvalidTransition {
                item: item_id.to_string(),
                state: item.status.to_string(),
                target: target.to_string(),
            });
        }

        item.status = target;
        item.finished_at = Some(Utc::now());
        match outcome {
            Ok(result) => item.result = Some(result),
            Err(reason) => item.error = Some(reason),
        }

        let all_terminal = self.items.iter().all(|i| i.status.is_terminal());
        if all_terminal {
            self.finished_at = Some(Utc::now());
        }
        Ok(all_terminal)
    }

    /// Every item has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.items.iter().all(|i| i.status.is_terminal())
    }

    pub fn is_running(&self) -> bool {
        !self.is_finished()
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    /// Ids of completed items, in position order.
    pub fn completed_ids(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Completed)
            .map(|i| i.id.as_str())
            .collect()
    }

    pub fn item(&self, item_id: &str) -> Option<&JobItem<T>> {
        self.items.iter().find(|i| i.id == item_id)
    }
}

/// Progress notifications for observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    ItemFinished {
        job_id: Uuid,
        item_id: String,
        status: ItemStatus,
        finished: usize,
        total: usize,
    },
    JobFinished {
        job_id: Uuid,
        completed: usize,
        failed: usize,
    },
}

/// Produces the result of one job item.
#[async_trait]
pub trait ItemWorker: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    fn name(&self) -> &str;

    async fn run(&self, item: &ItemSpec) -> Result<Self::Output, String>;
}

/// Runs at most one background job at a time for its owner.
pub struct JobTracker<W: ItemWorker> {
    job: Arc<RwLock<Option<BackgroundJob<W::Output>>>>,
    timers: Mutex<Vec<TimerHandle>>,
    tx: broadcast::Sender<JobEvent>,
}

impl<W: ItemWorker> JobTracker<W> {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self {
            job: Arc::new(RwLock::new(None)),
            timers: Mutex::new(Vec::new()),
            tx,
        }
    }

    /// Subscribe to item and job completion events.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    /// Start a job with one timer per item. Rejected without side effects
    /// while a previous job still has pending items.
    pub async fn start(&self, worker: Arc<W>, specs: Vec<ItemSpec>) -> Result<Uuid, JobError> {
        if specs.is_empty() {
            return Err(JobError::Empty);
        }
        let mut seen = HashSet::new();
        if let Some(dup) = specs.iter().find(|spec| !seen.insert(spec.id.as_str())) {
            return Err(JobError::DuplicateItem {
                item: dup.id.clone(),
            });
        }

        let mut slot = self.job.write().await;
        if let Some(current) = slot.as_ref()
            && current.is_running()
        {
            debug!(job_id = %current.id, "Start ignored: job already running");
            return Err(JobError::AlreadyRunning { id: current.id });
        }

        let job = BackgroundJob::new(&specs);
        let job_id = job.id;
        *slot = Some(job);
        drop(slot);

        let mut timers = self.timers.lock().await;
        timers.clear();
        for spec in specs {
            timers.push(timer::schedule(
                spec.delay,
                Self::run_item(
                    Arc::clone(&self.job),
                    Arc::clone(&worker),
                    self.tx.clone(),
                    job_id,
                    spec,
                ),
            ));
        }

        info!(job_id = %job_id, worker = worker.name(), items = timers.len(), "Background job started");
        Ok(job_id)
    }

    async fn run_item(
        job: Arc<RwLock<Option<BackgroundJob<W::Output>>>>,
        worker: Arc<W>,
        tx: broadcast::Sender<JobEvent>,
        job_id: Uuid,
        spec: ItemSpec,
    ) {
        let outcome = worker.run(&spec).await;
        if let Err(ref reason) = outcome {
            warn!(job_id = %job_id, item = %spec.id, "Job item failed: {}", reason);
        }

        let mut slot = job.write().await;
        let Some(current) = slot.as_mut().filter(|j| j.id == job_id) else {
            debug!(job_id = %job_id, item = %spec.id, "Dropping result for replaced job");
            return;
        };

        let finished_now = match current.finish_item(&spec.id, outcome) {
            Ok(done) => done,
            Err(e) => {
                warn!(job_id = %job_id, "Ignoring item transition: {}", e);
                return;
            }
        };

        let status = current
            .item(&spec.id)
            .map(|i| i.status)
            .unwrap_or(ItemStatus::Pending);
        let total = current.items.len();
        let finished = total - current.count(ItemStatus::Pending);
        debug!(job_id = %job_id, item = %spec.id, %status, finished, total, "Job item finished");

        // Ok if no receivers are listening
        let _ = tx.send(JobEvent::ItemFinished {
            job_id,
            item_id: spec.id.clone(),
            status,
            finished,
            total,
        });

        if finished_now {
            let completed = current.count(ItemStatus::Completed);
            let failed = current.count(ItemStatus::Failed);
            info!(job_id = %job_id, completed, failed, "Background job finished");
            let _ = tx.send(JobEvent::JobFinished {
                job_id,
                completed,
                failed,
            });
        }
    }

    /// Read one item regardless of its status.
    pub async fn select(&self, item_id: &str) -> Option<JobItem<W::Output>> {
        self.job
            .read()
            .await
            .as_ref()
            .and_then(|job| job.item(item_id).cloned())
    }

    pub async fn snapshot(&self) -> Option<BackgroundJob<W::Output>> {
        self.job.read().await.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.job
            .read()
            .await
            .as_ref()
            .is_some_and(|job| job.is_running())
    }

    pub async fn is_finished(&self) -> bool {
        self.job
            .read()
            .await
            .as_ref()
            .is_some_and(|job| job.is_finished())
    }

    /// Cancel every outstanding item timer. Items already finished keep
    /// their results; pending ones fail as cancelled, which finishes the job.
    pub async fn cancel(&self) {
        let mut timers = self.timers.lock().await;
        for handle in timers.drain(..) {
            handle.cancel();
        }
        drop(timers);

        let mut slot = self.job.write().await;
        let Some(job) = slot.as_mut().filter(|j| j.is_running()) else {
            return;
        };
        let pending: Vec<String> = job
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Pending)
            .map(|i| i.id.clone())
            .collect();

        let mut finished_now = false;
        for item_id in &pending {
            match job.finish_item(item_id, Err(CANCELLED.to_string())) {
                Ok(done) => finished_now |= done,
                Err(e) => warn!(job_id = %job.id, "Ignoring item transition: {}", e),
            }
        }

        if finished_now {
            let completed = job.count(ItemStatus::Completed);
            let failed = job.count(ItemStatus::Failed);
            info!(job_id = %job.id, completed, failed, cancelled = pending.len(), "Background job cancelled");
            // Ok if no receivers are listening
            let _ = self.tx.send(JobEvent::JobFinished {
                job_id: job.id,
                completed,
                failed,
            });
        }
    }
}

impl<W: ItemWorker> Default for JobTracker<W> {
    fn default() -> Self {
        Self::new()
    }
}
