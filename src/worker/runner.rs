//! Task runner - drives one queued DownloadTask to a terminal job state

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::executor::{FallbackExecutor, JobOutcome};
use crate::api::models::{JobSnapshot, TaskStatus};
use crate::engines::EngineRegistry;
use crate::ledger::{FjallStore, LedgerError};
use crate::observability::Metrics;
use crate::queue::{QueueError, TaskBroker, TaskEnvelope};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

pub type Result<T> = std::result::Result<T, TaskError>;

/// Everything a worker needs, shared by the whole pool
pub struct WorkerContext {
    pub registry: Arc<EngineRegistry>,
    pub executor: Arc<FallbackExecutor>,
    pub store: Arc<FjallStore>,
    pub broker: Arc<TaskBroker>,
    pub metrics: Arc<Metrics>,
}

/// Process a single envelope
///
/// The task is acknowledged only after the terminal snapshot is written, so
/// a crash anywhere before that leaves it pending for redelivery.
pub async fn process_task(ctx: &WorkerContext, envelope: TaskEnvelope) -> Result<()> {
    let TaskEnvelope { seq, task } = envelope;
    let job_id = task.job_id.as_str();
    let cid = task.correlation_id.as_str();

    let Some(snapshot) = ctx.store.get(job_id)? else {
        warn!(seq, correlation_id = cid, "Queued task has no job record, dropping");
        ctx.broker.ack(seq)?;
        return Ok(());
    };

    match snapshot.status {
        status if status.is_terminal() => {
            debug!(seq, ?status, "Job already finished, acknowledging");
            ctx.broker.ack(seq)?;
            return Ok(());
        }
        TaskStatus::Processing => info!(seq, "Resuming interrupted job"),
        _ => {
            ctx.store.update(job_id, JobSnapshot::mark_processing)?;
        }
    }

    let engines = ctx
        .registry
        .select_engines(&task.video_url, task.requested_engine.as_deref(), Some(cid));
    info!(
        correlation_id = cid,
        url = %task.video_url,
        engines = ?engines,
        "Processing task"
    );

    let outcome = ctx
        .executor
        .execute(job_id, &task.video_url, &task.params, &engines, Some(cid))
        .await;
    ctx.metrics.engines_attempted(outcome.attempted().len());

    match outcome {
        JobOutcome::Completed(done) => {
            info!(correlation_id = cid, engine = %done.engine, key = %done.artifact.key, "Job completed");
            ctx.store
                .update(job_id, |s| s.mark_completed(done.engine, done.artifact, done.attempted))?;
            ctx.metrics.job_completed();
            ctx.broker.ack(seq)?;
        }
        JobOutcome::Failed(failed) => {
            let message = failed.message();
            warn!(correlation_id = cid, error = %message, "Job failed");
            ctx.store
                .update(job_id, |s| s.mark_failed(message.clone(), failed.attempted.clone()))?;
            ctx.metrics.job_failed();
            ctx.broker.dead_letter(seq, message, failed.attempted)?;
        }
    }

    Ok(())
}
