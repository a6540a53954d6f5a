use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Mutex, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{DeadJob, JobEnvelope, JobOptions, QueueStats, Worker};
use crate::common::retry::RetryBackoff;
use crate::config::QueueConfig;
use crate::error::{Error, Result};

type Handler = Arc<dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<()>> + Send + Sync>;

#[derive(Clone)]
struct RegisteredWorker {
    options: JobOptions,
    handler: Handler,
}

/// One named queue and its backlog
struct Lane {
    concurrency: usize,
    sender: mpsc::UnboundedSender<JobEnvelope>,
    /// Taken by the dispatcher on start
    receiver: Mutex<Option<mpsc::UnboundedReceiver<JobEnvelope>>>,
    enqueued: AtomicU64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    failed: AtomicU64,
    retried: AtomicU64,
    dead: AtomicU64,
}

struct QueueInner {
    workers: DashMap<&'static str, RegisteredWorker>,
    lanes: HashMap<String, Lane>,
    backoff: RetryBackoff,
    dead_set_capacity: usize,
    dead: Mutex<VecDeque<DeadJob>>,
    counters: Counters,
    /// Jobs queued, running or waiting to retry
    pending: AtomicUsize,
    idle: Notify,
    shutdown_tx: watch::Sender<bool>,
    dispatchers: Mutex<Vec<JoinHandle<()>>>,
}

/// Handle to the job queue; clones share the same queue
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<QueueInner>,
}

impl JobQueue {
    pub fn new(config: &QueueConfig) -> Self {
        let lanes = config
            .queues
            .iter()
            .map(|(name, concurrency)| {
                let (sender, receiver) = mpsc::unbounded_channel();
                let lane = Lane {
                    concurrency: (*concurrency).max(1),
                    sender,
                    receiver: Mutex::new(Some(receiver)),
                    enqueued: AtomicU64::new(0),
                };
                (name.clone(), lane)
            })
            .collect();

        let (shutdown_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(QueueInner {
                workers: DashMap::new(),
                lanes,
                backoff: config.retry_backoff,
                dead_set_capacity: config.dead_set_capacity,
                dead: Mutex::new(VecDeque::new()),
                counters: Counters::default(),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
                shutdown_tx,
                dispatchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Make a worker dispatchable by its name
    pub fn register<W: Worker>(&self, worker: W) {
        let worker = Arc::new(worker);
        let handler: Handler = Arc::new(move |args: serde_json::Value| {
            let worker = worker.clone();
            async move {
                let args: W::Args =
                    serde_json::from_value(args).map_err(|e| Error::InvalidJobArgs {
                        worker: W::NAME.to_string(),
                        reason: e.to_string(),
                    })?;
                worker.perform(args).await
            }
            .boxed()
        });

        let options = W::options();
        if !self.inner.lanes.contains_key(options.queue) {
            warn!(worker = W::NAME, queue = options.queue, "Worker routes to an unconfigured queue");
        }
        debug!(worker = W::NAME, queue = options.queue, retry = options.retry, "Registered worker");
        self.inner
            .workers
            .insert(W::NAME, RegisteredWorker { options, handler });
    }

    /// Queue a job for a registered worker, returning its id
    pub async fn enqueue<W: Worker>(&self, args: W::Args) -> Result<Uuid> {
        if self.is_closed() {
            return Err(Error::QueueClosed);
        }
        let options = self
            .inner
            .workers
            .get(W::NAME)
            .map(|registered| registered.options)
            .ok_or_else(|| Error::UnknownWorker {
                worker: W::NAME.to_string(),
            })?;
        let lane = self
            .inner
            .lanes
            .get(options.queue)
            .ok_or_else(|| Error::UnknownQueue {
                queue: options.queue.to_string(),
            })?;

        let envelope = JobEnvelope::new(W::NAME, options.queue, serde_json::to_value(args)?);
        let id = envelope.id;

        self.inner.pending.fetch_add(1, Ordering::SeqCst);
        if lane.sender.send(envelope).is_err() {
            self.inner.complete_one();
            return Err(Error::QueueClosed);
        }
        lane.enqueued.fetch_add(1, Ordering::Relaxed);

        debug!(job_id = %id, worker = W::NAME, queue = options.queue, "Enqueued job");
        Ok(id)
    }

    /// Spawn one dispatcher per queue; calling it again has no effect
    pub async fn start(&self) {
        let mut dispatchers = self.inner.dispatchers.lock().await;
        for (name, lane) in &self.inner.lanes {
            let Some(receiver) = lane.receiver.lock().await.take() else {
                continue;
            };
            info!(queue = %name, concurrency = lane.concurrency, "Starting queue dispatcher");
            dispatchers.push(tokio::spawn(dispatch(
                self.inner.clone(),
                name.clone(),
                lane.concurrency,
                receiver,
                self.inner.shutdown_tx.subscribe(),
            )));
        }
    }

    /// Resolve once no job is queued, running or waiting to retry
    ///
    /// Returns immediately after shutdown.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.inner.pending.load(Ordering::SeqCst) == 0 || self.is_closed() {
                return;
            }
            notified.await;
        }
    }

    /// Stop dispatching, let running jobs finish and drop scheduled retries
    pub async fn shutdown(&self) {
        if self.inner.shutdown_tx.send_replace(true) {
            return;
        }
        info!("Shutting down job queue");

        let dispatchers: Vec<_> = self.inner.dispatchers.lock().await.drain(..).collect();
        for dispatcher in dispatchers {
            if let Err(e) = dispatcher.await {
                error!(error = %e, "Queue dispatcher failed");
            }
        }

        // Workers may hold queue handles of their own
        self.inner.workers.clear();
        self.inner.idle.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        let closed = *self.inner.shutdown_tx.borrow();
        closed
    }

    /// Receiver that flips to true when the queue shuts down
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.inner.shutdown_tx.subscribe()
    }

    pub fn stats(&self) -> QueueStats {
        let counters = &self.inner.counters;
        QueueStats {
            processed: counters.processed.load(Ordering::Relaxed),
            failed: counters.failed.load(Ordering::Relaxed),
            retried: counters.retried.load(Ordering::Relaxed),
            dead: counters.dead.load(Ordering::Relaxed),
            enqueued: self
                .inner
                .lanes
                .iter()
                .map(|(name, lane)| (name.clone(), lane.enqueued.load(Ordering::Relaxed)))
                .collect(),
        }
    }

    /// Jobs in the dead set, oldest first
    pub async fn dead_jobs(&self) -> Vec<DeadJob> {
        self.inner.dead.lock().await.iter().cloned().collect()
    }
}

/// Resolve once the shutdown flag is set or its sender is gone
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let closed = *shutdown.borrow_and_update();
        if closed || shutdown.changed().await.is_err() {
            return;
        }
    }
}

async fn dispatch(
    inner: Arc<QueueInner>,
    queue: String,
    concurrency: usize,
    mut receiver: mpsc::UnboundedReceiver<JobEnvelope>,
    mut shutdown: watch::Receiver<bool>,
) {
    let semaphore = Arc::new(Semaphore::new(concurrency));

    loop {
        let closed = *shutdown.borrow();
        if closed {
            break;
        }

        let permit = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let envelope = tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            envelope = receiver.recv() => match envelope {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let inner = inner.clone();
        tokio::spawn(async move {
            inner.execute(envelope).await;
            drop(permit);
        });
    }

    // Wait for running jobs before reporting the dispatcher done
    let _ = semaphore.acquire_many(concurrency as u32).await;
    debug!(queue = %queue, "Queue dispatcher stopped");
}

impl QueueInner {
    async fn execute(self: &Arc<Self>, envelope: JobEnvelope) {
        let registered = self
            .workers
            .get(envelope.worker.as_str())
            .map(|entry| entry.value().clone());
        let Some(registered) = registered else {
            let err = Error::UnknownWorker {
                worker: envelope.worker.clone(),
            };
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            self.bury(envelope, &err).await;
            self.complete_one();
            return;
        };

        let started = Instant::now();
        debug!(job_id = %envelope.id, worker = %envelope.worker, retry_count = envelope.retry_count, "Running job");

        // Run on its own task so a panicking worker fails only its job
        let result = match tokio::spawn((registered.handler)(envelope.args.clone())).await {
            Ok(result) => result,
            Err(e) => Err(Error::Internal(format!("worker task failed: {}", e))),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                self.counters.processed.fetch_add(1, Ordering::Relaxed);
                info!(
                    job_id = %envelope.id,
                    worker = %envelope.worker,
                    queue = %envelope.queue,
                    elapsed_ms,
                    "Job completed"
                );
                self.complete_one();
            }
            Err(err) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                let can_retry =
                    !err.is_permanent_job_failure() && envelope.retry_count < registered.options.retry;
                warn!(
                    job_id = %envelope.id,
                    worker = %envelope.worker,
                    error = %err,
                    category = %err.category(),
                    transient = err.is_retryable(),
                    retry_count = envelope.retry_count,
                    will_retry = can_retry,
                    elapsed_ms,
                    "Job failed"
                );

                if can_retry {
                    self.schedule_retry(envelope, err.retry_after());
                } else {
                    self.bury(envelope, &err).await;
                    self.complete_one();
                }
            }
        }
    }

    /// Requeue after the backoff, or after `not_before` when the failure asked for longer
    fn schedule_retry(self: &Arc<Self>, mut envelope: JobEnvelope, not_before: Option<Duration>) {
        envelope.retry_count += 1;
        let backoff = self.backoff.delay_for(envelope.retry_count);
        let delay = not_before.map_or(backoff, |reset| reset.max(backoff));
        self.counters.retried.fetch_add(1, Ordering::Relaxed);
        debug!(job_id = %envelope.id, retry_count = envelope.retry_count, delay_ms = delay.as_millis() as u64, "Scheduling retry");

        let inner = self.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    let sent = inner
                        .lanes
                        .get(&envelope.queue)
                        .map(|lane| lane.sender.send(envelope).is_ok())
                        .unwrap_or(false);
                    if !sent {
                        inner.complete_one();
                    }
                }
                _ = shutdown_requested(&mut shutdown) => {
                    debug!(job_id = %envelope.id, "Dropping scheduled retry on shutdown");
                    inner.complete_one();
                }
            }
        });
    }

    async fn bury(&self, envelope: JobEnvelope, err: &Error) {
        error!(job_id = %envelope.id, worker = %envelope.worker, error = %err, "Job moved to dead set");
        self.counters.dead.fetch_add(1, Ordering::Relaxed);

        if self.dead_set_capacity == 0 {
            return;
        }
        let mut dead = self.dead.lock().await;
        while dead.len() >= self.dead_set_capacity {
            dead.pop_front();
        }
        dead.push_back(DeadJob {
            envelope,
            error: err.to_string(),
            died_at: chrono::Utc::now(),
        });
    }

    fn complete_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}
