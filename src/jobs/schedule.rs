use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::queue::shutdown_requested;
use super::{JobQueue, RegisterAllTwitchWebhooksWorker, Worker};
use crate::error::Error;

/// Enqueue a job now and then once every `period` until the queue shuts down
pub fn spawn_periodic<W>(queue: JobQueue, period: Duration, args: W::Args) -> JoinHandle<()>
where
    W: Worker,
    W::Args: Clone,
{
    let mut shutdown = queue.shutdown_signal();

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(worker = W::NAME, period_secs = period.as_secs(), "Starting periodic job");

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = ticker.tick() => {
                    match queue.enqueue::<W>(args.clone()).await {
                        Ok(job_id) => debug!(%job_id, worker = W::NAME, "Enqueued periodic job"),
                        Err(Error::QueueClosed) => break,
                        Err(e) => warn!(worker = W::NAME, error = %e, "Failed to enqueue periodic job"),
                    }
                }
            }
        }

        debug!(worker = W::NAME, "Periodic job stopped");
    })
}

/// Re-register every linked user before their webhook leases run out
pub fn spawn_renewal(queue: JobQueue, period: Duration) -> JoinHandle<()> {
    spawn_periodic::<RegisterAllTwitchWebhooksWorker>(queue, period, ())
}
