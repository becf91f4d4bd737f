//! Download worker pool
//!
//! Each worker owns one mpsc receiver fed by the [`TaskBroker`](crate::queue::TaskBroker),
//! runs jobs one at a time through the engine fallback loop and writes the
//! terminal state to the ledger.

pub mod executor;
pub mod runner;

pub use executor::{CompletedJob, FailedJob, FallbackExecutor, JobOutcome};
pub use runner::{TaskError, WorkerContext, process_task};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use crate::queue::TaskEnvelope;

/// Start one tokio task per receiver; each exits when its channel closes
pub fn spawn_workers(
    ctx: Arc<WorkerContext>,
    receivers: Vec<mpsc::Receiver<TaskEnvelope>>,
) -> Vec<JoinHandle<()>> {
    receivers
        .into_iter()
        .enumerate()
        .map(|(worker_id, mut rx)| {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                info!(worker_id, "Worker started");

                while let Some(envelope) = rx.recv().await {
                    let span = info_span!(
                        "job",
                        worker_id,
                        seq = envelope.seq,
                        job_id = %envelope.task.job_id,
                        correlation_id = %envelope.task.correlation_id,
                    );

                    async {
                        if let Err(e) = process_task(&ctx, envelope).await {
                            // Left unacknowledged; picked up again on restart
                            error!(error = %e, "Task processing failed");
                        }
                    }
                    .instrument(span)
                    .await;
                }

                info!(worker_id, "Worker stopped");
            })
        })
        .collect()
}
