//! Bounded worker pool.

use futures::FutureExt;
use serde::Serialize;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::PoolConfig;
use super::error::PoolError;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>;

/// Lifecycle of a [`WorkerPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// Snapshot of pool activity.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub state: PoolState,
    pub workers: usize,
    pub queue_capacity: usize,
    pub active_tasks: usize,
    pub queued_tasks: usize,
    pub completed_tasks: u64,
    pub panicked_tasks: u64,
}

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    completed: AtomicU64,
    panicked: AtomicU64,
}

struct Inner {
    sender: Option<mpsc::Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

/// Handle to the result of a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    rx: oneshot::Receiver<Result<T, PoolError>>,
}

impl<T> TaskHandle<T> {
    /// Waits for the task to finish and returns its output.
    pub async fn join(self) -> Result<T, PoolError> {
        self.rx.await.map_err(|_| PoolError::TaskDropped)?
    }
}

/// A fixed set of workers pulling tasks from a shared bounded queue.
///
/// State machine: `Created -> Running -> Stopping -> Stopped`. Exactly
/// `workers` tasks exist while running and none after `stop` returns.
pub struct WorkerPool {
    size: usize,
    queue_capacity: usize,
    inner: Mutex<Inner>,
    state: Arc<watch::Sender<PoolState>>,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    /// Creates a pool with `size` workers and a queue of `queue_capacity` tasks.
    ///
    /// Both values are clamped to at least 1.
    pub fn new(size: usize, queue_capacity: usize) -> Self {
        let (state, _) = watch::channel(PoolState::Created);
        Self {
            size: size.max(1),
            queue_capacity: queue_capacity.max(1),
            inner: Mutex::new(Inner {
                sender: None,
                workers: Vec::new(),
            }),
            state: Arc::new(state),
            stats: Arc::new(PoolStats::default()),
        }
    }

    /// Creates a pool from configuration.
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::new(config.workers, config.queue_capacity)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        *self.state.borrow()
    }

    /// Number of workers.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Spawns the workers. Must be called from within a Tokio runtime.
    pub fn start(&self) -> Result<(), PoolError> {
        let mut inner = self.lock_inner();
        match self.state() {
            PoolState::Created => {}
            PoolState::Running => return Err(PoolError::AlreadyStarted),
            PoolState::Stopping | PoolState::Stopped => return Err(PoolError::Closed),
        }

        let (tx, rx) = mpsc::channel::<Job>(self.queue_capacity);
        let rx: SharedReceiver = Arc::new(tokio::sync::Mutex::new(rx));
        for worker_id in 0..self.size {
            inner
                .workers
                .push(tokio::spawn(run_worker(worker_id, Arc::clone(&rx))));
        }
        inner.sender = Some(tx);
        self.state.send_replace(PoolState::Running);

        info!(
            workers = self.size,
            queue_capacity = self.queue_capacity,
            "Worker pool started"
        );
        Ok(())
    }

    /// Queues a task, waiting for queue space if necessary.
    ///
    /// Fails fast with [`PoolError::NotStarted`] or [`PoolError::Closed`]
    /// instead of waiting on a pool that will never run the task.
    pub async fn submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.running_sender()?;
        let permit = sender
            .reserve_owned()
            .await
            .map_err(|_| PoolError::Closed)?;

        // Enqueue under the state lock so nothing slips in once stop() began.
        let _guard = self.lock_inner();
        if self.state() != PoolState::Running {
            return Err(PoolError::Closed);
        }
        let (job, handle) = self.wrap(task);
        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        permit.send(job);
        Ok(handle)
    }

    /// Queues a task without waiting; rejects it when the queue is full.
    pub fn try_submit<F, T>(&self, task: F) -> Result<TaskHandle<T>, PoolError>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = self.lock_inner();
        let sender = match self.state() {
            PoolState::Created => return Err(PoolError::NotStarted),
            PoolState::Running => inner.sender.clone().ok_or(PoolError::Closed)?,
            PoolState::Stopping | PoolState::Stopped => return Err(PoolError::Closed),
        };
        let permit = sender.try_reserve_owned().map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PoolError::QueueFull {
                capacity: self.queue_capacity,
            },
            mpsc::error::TrySendError::Closed(_) => PoolError::Closed,
        })?;
        let (job, handle) = self.wrap(task);
        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        permit.send(job);
        Ok(handle)
    }

    /// Stops accepting work and waits until every queued and in-flight task
    /// has finished.
    ///
    /// Safe to call more than once and from several tasks; every caller
    /// returns once the pool reaches `Stopped`. The drain runs in its own
    /// task, so a caller that gives up waiting does not leave the pool stuck
    /// in `Stopping`.
    pub async fn stop(&self) {
        let mut rx = self.state.subscribe();
        {
            let mut inner = self.lock_inner();
            match self.state() {
                PoolState::Created => {
                    self.state.send_replace(PoolState::Stopped);
                    return;
                }
                PoolState::Running => {
                    self.state.send_replace(PoolState::Stopping);
                    inner.sender = None;
                    let workers = std::mem::take(&mut inner.workers);
                    tokio::spawn(drain(workers, Arc::clone(&self.state)));
                }
                PoolState::Stopping | PoolState::Stopped => {}
            }
        }

        let _ = rx.wait_for(|s| *s == PoolState::Stopped).await;
    }

    /// Returns a snapshot of pool activity.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            state: self.state(),
            workers: self.size,
            queue_capacity: self.queue_capacity,
            active_tasks: self.stats.active.load(Ordering::Relaxed) as usize,
            queued_tasks: self.stats.queued.load(Ordering::Relaxed) as usize,
            completed_tasks: self.stats.completed.load(Ordering::Relaxed),
            panicked_tasks: self.stats.panicked.load(Ordering::Relaxed),
        }
    }

    fn running_sender(&self) -> Result<mpsc::Sender<Job>, PoolError> {
        let inner = self.lock_inner();
        match self.state() {
            PoolState::Created => Err(PoolError::NotStarted),
            PoolState::Running => inner.sender.clone().ok_or(PoolError::Closed),
            PoolState::Stopping | PoolState::Stopped => Err(PoolError::Closed),
        }
    }

    fn wrap<F, T>(&self, task: F) -> (Job, TaskHandle<T>)
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let stats = Arc::clone(&self.stats);

        let job: Job = Box::pin(async move {
            stats.queued.fetch_sub(1, Ordering::Relaxed);
            stats.active.fetch_add(1, Ordering::Relaxed);

            let result = AssertUnwindSafe(task).catch_unwind().await;

            stats.active.fetch_sub(1, Ordering::Relaxed);
            match result {
                Ok(value) => {
                    stats.completed.fetch_add(1, Ordering::Relaxed);
                    let _ = tx.send(Ok(value));
                }
                Err(_) => {
                    stats.panicked.fetch_add(1, Ordering::Relaxed);
                    warn!("Pool task panicked");
                    let _ = tx.send(Err(PoolError::TaskPanicked));
                }
            }
        });

        (job, TaskHandle { rx })
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn drain(workers: Vec<JoinHandle<()>>, state: Arc<watch::Sender<PoolState>>) {
    info!(workers = workers.len(), "Worker pool draining");
    for worker in workers {
        if let Err(e) = worker.await {
            warn!("Worker terminated abnormally: {}", e);
        }
    }

    state.send_replace(PoolState::Stopped);
    info!("Worker pool stopped");
}

async fn run_worker(worker_id: usize, rx: SharedReceiver) {
    debug!(worker_id, "Worker started");
    loop {
        let job = {
            let mut rx = rx.lock().await;
            rx.recv().await
        };
        match job {
            Some(job) => job.await,
            None => break,
        }
    }
    debug!(worker_id, "Worker exiting");
}
