use crate::engines::EngineId;
use crate::queue::store::{FjallQueue, QueueError};
use crate::queue::task::DownloadTask;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// TaskEnvelope wraps a DownloadTask with its sequence number
#[derive(Clone, Debug)]
pub struct TaskEnvelope {
    pub seq: u64,
    pub task: DownloadTask,
}

/// TaskBroker distributes tasks from the API to the worker pool
///
/// Flow:
/// 1. API calls `broker.enqueue(task)`
/// 2. Broker persists task to FjallQueue (get seq)
/// 3. Broker sends TaskEnvelope{seq, task} to a worker via mpsc channel
/// 4. Round-robin distribution across worker pool
/// 5. Backpressure via bounded channels
/// 6. Worker calls `ack` / `dead_letter` once the job state is terminal
pub struct TaskBroker {
    queue: Arc<FjallQueue>,
    worker_channels: Vec<mpsc::Sender<TaskEnvelope>>,
    next_worker: AtomicUsize,
}

impl TaskBroker {
    /// Create a new TaskBroker with worker channels
    ///
    /// Returns the broker and one receiver per worker.
    pub fn new(
        queue: Arc<FjallQueue>,
        num_workers: usize,
        channel_size: usize,
    ) -> (Self, Vec<mpsc::Receiver<TaskEnvelope>>) {
        info!(
            num_workers,
            channel_size, "Creating TaskBroker with worker channels"
        );

        let mut worker_channels = Vec::with_capacity(num_workers);
        let mut worker_receivers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let (tx, rx) = mpsc::channel(channel_size);
            worker_channels.push(tx);
            worker_receivers.push(rx);
            debug!(worker_id, "Created worker channel");
        }

        let broker = Self {
            queue,
            worker_channels,
            next_worker: AtomicUsize::new(0),
        };

        (broker, worker_receivers)
    }

    /// Persist a task, then hand it to the next worker
    pub async fn enqueue(&self, task: DownloadTask) -> Result<u64, QueueError> {
        let seq = self.queue.enqueue(&task)?;
        debug!(seq, job_id = %task.job_id, "Task persisted to queue");

        self.dispatch(TaskEnvelope { seq, task }).await;
        Ok(seq)
    }

    /// Redeliver every unacknowledged task; call once workers are running
    pub async fn recover(&self) -> Result<usize, QueueError> {
        let pending = self.queue.pending()?;
        let count = pending.len();

        for (seq, task) in pending {
            info!(seq, job_id = %task.job_id, "Redelivering unacknowledged task");
            self.dispatch(TaskEnvelope { seq, task }).await;
        }

        if count > 0 {
            info!(count, "Recovered pending tasks");
        }
        Ok(count)
    }

    async fn dispatch(&self, envelope: TaskEnvelope) {
        let seq = envelope.seq;
        let worker_idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.worker_channels.len();

        // Bounded channel: waits when the worker is saturated
        match self.worker_channels[worker_idx].send(envelope).await {
            Ok(_) => debug!(seq, worker_idx, "Task sent to worker"),
            // Task is already persisted and will be redelivered on restart
            Err(_) => warn!(seq, worker_idx, "Worker channel closed, task not delivered"),
        }
    }

    /// Mark a task done
    pub fn ack(&self, seq: u64) -> Result<(), QueueError> {
        self.queue.ack(seq)
    }

    /// Record a permanently failed task and drop it from the pending set
    pub fn dead_letter(
        &self,
        seq: u64,
        failure_message: String,
        attempted_engines: Vec<EngineId>,
    ) -> Result<(), QueueError> {
        self.queue.move_to_dlq(seq, failure_message, attempted_engines)
    }

    pub fn queue(&self) -> &FjallQueue {
        &self.queue
    }

    /// Get number of active workers
    pub fn num_workers(&self) -> usize {
        self.worker_channels.len()
    }

    /// Check if all worker channels are healthy (not closed)
    pub fn health_check(&self) -> bool {
        self.worker_channels.iter().all(|ch| !ch.is_closed())
    }
}
