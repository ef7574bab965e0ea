// rams-generation-client/src/poller.rs

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::backend::{GenerationBackend, JobMonitor, MonitorError, UpdateStream};
use crate::config::GenerationConfig;
use crate::models::JobUpdate;

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Watches a job by re-reading its record on a fixed interval. The stream it
/// hands out ends after exactly one final update: the job finishing with a
/// usable document, the row disappearing, or polling itself giving up after
/// repeated failures. A complete row whose document has no method steps yet
/// is forwarded but keeps the watch open, matching what the controller will
/// accept as done.
pub struct IntervalPoller {
    backend: Arc<dyn GenerationBackend>,
    poll_interval: Duration,
    failure_threshold: u32,
    shutdown: CancellationToken,
}

impl IntervalPoller {
    pub fn new(backend: Arc<dyn GenerationBackend>, config: &GenerationConfig) -> Self {
        Self {
            backend,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            failure_threshold: config.poll_failure_threshold.max(1),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stops every stream started from this poller. Streams end without a
    /// further update; callers decide what to do with the in-flight job.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[async_trait]
impl JobMonitor for IntervalPoller {
    async fn watch(&self, job_id: Uuid) -> Result<UpdateStream, MonitorError> {
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let backend = self.backend.clone();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let failure_threshold = self.failure_threshold;
        let cancel = self.shutdown.child_token();

        tokio::spawn(async move {
            poll_job(backend, job_id, &mut ticker, failure_threshold, cancel, tx).await;
        });

        Ok(Box::pin(PolledUpdates { receiver: rx }))
    }
}

async fn poll_job(
    backend: Arc<dyn GenerationBackend>,
    job_id: Uuid,
    ticker: &mut Interval,
    failure_threshold: u32,
    cancel: CancellationToken,
    tx: mpsc::Sender<JobUpdate>,
) {
    let mut consecutive_failures = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(%job_id, "Polling stopped by shutdown");
                break;
            }
            _ = ticker.tick() => {}
        }

        match backend.fetch_job(job_id).await {
            Ok(Some(job)) => {
                consecutive_failures = 0;
                let update = JobUpdate::from_job(&job);
                let finished = update.is_final();
                if tx.send(update).await.is_err() {
                    debug!(%job_id, "Update stream dropped, stopping poller");
                    break;
                }
                if finished {
                    info!(%job_id, status = %job.status, "Job reached a final status");
                    break;
                }
                if job.status.is_terminal() {
                    warn!(%job_id, status = %job.status, "Complete row has no method steps yet, still watching");
                }
            }
            Ok(None) => {
                warn!(%job_id, "Job record no longer exists");
                let _ = tx
                    .send(JobUpdate::failed(job_id, "generation job no longer exists"))
                    .await;
                break;
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures >= failure_threshold {
                    error!(
                        %job_id,
                        error = %e,
                        failures = consecutive_failures,
                        "Giving up polling after repeated failures"
                    );
                    let _ = tx
                        .send(JobUpdate::failed(
                            job_id,
                            format!("status polling failed: {e}"),
                        ))
                        .await;
                    break;
                }
                warn!(
                    %job_id,
                    error = %e,
                    failures = consecutive_failures,
                    "Failed to read job status, will retry"
                );
            }
        }
    }
}

struct PolledUpdates {
    receiver: mpsc::Receiver<JobUpdate>,
}

impl Stream for PolledUpdates {
    type Item = JobUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
