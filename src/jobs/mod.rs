//! In-process background job queue.
//!
//! Jobs are routed to named queues by their worker's options. Each queue is
//! drained by one dispatcher that runs at most `concurrency` jobs at once.
//! A failed job is retried with exponential backoff while its error is
//! retryable and its retry budget lasts; after that it lands in the dead set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;

pub mod queue;
pub mod schedule;
pub mod workers;

pub use queue::JobQueue;
pub use schedule::{spawn_periodic, spawn_renewal};
pub use workers::{RegisterAllTwitchWebhooksWorker, TwitchWebhookRegistrationWorker};

/// Queue used when a worker does not name one
pub const DEFAULT_QUEUE: &str = "default";

/// Retry budget used when a worker does not set one
pub const DEFAULT_RETRY: u32 = 25;

/// Where and how often a worker's jobs run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    pub queue: &'static str,
    /// Retries allowed after the first attempt
    pub retry: u32,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE,
            retry: DEFAULT_RETRY,
        }
    }
}

/// A unit of background work
#[async_trait]
pub trait Worker: Send + Sync + 'static {
    type Args: Serialize + DeserializeOwned + Send + 'static;

    /// Name jobs are dispatched by
    const NAME: &'static str;

    fn options() -> JobOptions {
        JobOptions::default()
    }

    async fn perform(&self, args: Self::Args) -> Result<()>;
}

/// A job as it travels through the queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub id: Uuid,
    pub worker: String,
    pub queue: String,
    pub args: serde_json::Value,
    /// Retries already scheduled for this job
    pub retry_count: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl JobEnvelope {
    pub fn new(worker: &str, queue: &str, args: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            worker: worker.to_string(),
            queue: queue.to_string(),
            args,
            retry_count: 0,
            enqueued_at: Utc::now(),
        }
    }
}

/// A job that exhausted its retries or could never run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadJob {
    pub envelope: JobEnvelope,
    pub error: String,
    pub died_at: DateTime<Utc>,
}

/// Counters describing queue activity since start
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub processed: u64,
    pub failed: u64,
    pub retried: u64,
    pub dead: u64,
    /// Jobs enqueued per queue, retries excluded
    pub enqueued: HashMap<String, u64>,
}
