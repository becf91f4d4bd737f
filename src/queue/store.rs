use super::task::{DeadLetterTask, DownloadTask};
use crate::engines::EngineId;
use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task not found: seq={0}")]
    TaskNotFound(u64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

const NEXT_SEQ_KEY: &[u8] = b"next_seq";

/// FjallQueue manages task persistence and DLQ using Fjall embedded database
///
/// Architecture:
/// - `tasks` partition: u64 (big-endian) → DownloadTask (JSON)
/// - `metadata` partition: "next_seq" → u64 (atomic counter)
/// - `dlq` partition: u64 (big-endian) → DeadLetterTask (JSON)
///
/// A task stays in `tasks` until the worker acknowledges it after writing the
/// terminal job state, so anything still there on startup was interrupted
/// and is redelivered.
pub struct FjallQueue {
    keyspace: Keyspace,
    tasks: PartitionHandle,
    metadata: PartitionHandle,
    dlq: PartitionHandle,
    seq_counter: AtomicU64,
}

impl FjallQueue {
    /// Open or create a new FjallQueue at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening FjallQueue at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let tasks = keyspace.open_partition("tasks", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;
        let dlq = keyspace.open_partition("dlq", PartitionCreateOptions::default())?;

        let current_seq = metadata
            .get(NEXT_SEQ_KEY)?
            .map(|bytes| decode_seq(&bytes))
            .unwrap_or(0);

        info!("FjallQueue opened, current sequence: {}", current_seq);

        Ok(Self {
            keyspace,
            tasks,
            metadata,
            dlq,
            seq_counter: AtomicU64::new(current_seq),
        })
    }

    /// Persist a task and return its sequence number
    pub fn enqueue(&self, task: &DownloadTask) -> Result<u64> {
        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);

        let value = serde_json::to_vec(task)?;
        self.tasks.insert(seq.to_be_bytes(), value)?;

        // Persist updated counter (for crash recovery)
        self.metadata.insert(NEXT_SEQ_KEY, (seq + 1).to_be_bytes())?;

        debug!(seq, job_id = %task.job_id, "Task enqueued");

        Ok(seq)
    }

    /// Retrieve a task by sequence number
    pub fn get_task(&self, seq: u64) -> Result<Option<DownloadTask>> {
        match self.tasks.get(seq.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Acknowledge a finished task, removing it from the pending set
    pub fn ack(&self, seq: u64) -> Result<()> {
        self.tasks.remove(seq.to_be_bytes())?;
        debug!(seq, "Task acknowledged");
        Ok(())
    }

    /// Unacknowledged tasks in sequence order
    pub fn pending(&self) -> Result<Vec<(u64, DownloadTask)>> {
        let mut results = Vec::new();

        for item in self.tasks.iter() {
            let (key, value) = item?;
            let seq = decode_seq(&key);
            match serde_json::from_slice(&value) {
                Ok(task) => results.push((seq, task)),
                Err(e) => warn!(seq, error = %e, "Skipping undecodable queued task"),
            }
        }

        Ok(results)
    }

    /// Move a task to the Dead Letter Queue and drop it from the pending set
    pub fn move_to_dlq(
        &self,
        seq: u64,
        failure_message: String,
        attempted_engines: Vec<EngineId>,
    ) -> Result<()> {
        let task = self.get_task(seq)?.ok_or(QueueError::TaskNotFound(seq))?;

        let dlq_entry = DeadLetterTask {
            task,
            failure_message,
            attempted_engines,
            failed_at: Utc::now(),
        };

        self.dlq.insert(seq.to_be_bytes(), serde_json::to_vec(&dlq_entry)?)?;
        self.tasks.remove(seq.to_be_bytes())?;

        info!(seq, attempts = dlq_entry.attempted_engines.len(), "Task moved to DLQ");

        Ok(())
    }

    /// Remove dead letters that failed before `cutoff`
    pub fn prune_dlq(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut expired = Vec::new();

        for item in self.dlq.iter() {
            let (key, value) = item?;
            match serde_json::from_slice::<DeadLetterTask>(&value) {
                Ok(entry) if entry.failed_at < cutoff => expired.push(key),
                Ok(_) => {}
                Err(e) => {
                    warn!(seq = decode_seq(&key), error = %e, "Dropping unreadable dead letter");
                    expired.push(key);
                }
            }
        }

        for key in &expired {
            self.dlq.remove(key.clone())?;
        }

        if !expired.is_empty() {
            info!(count = expired.len(), "Pruned dead letters");
        }
        Ok(expired.len())
    }

    /// Get a task from the DLQ by sequence number
    pub fn get_dlq_task(&self, seq: u64) -> Result<Option<DeadLetterTask>> {
        match self.dlq.get(seq.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// List DLQ tasks (for debugging/inspection)
    pub fn list_dlq(&self, limit: usize) -> Result<Vec<(u64, DeadLetterTask)>> {
        let mut results = Vec::new();

        for item in self.dlq.iter().take(limit) {
            let (key, value) = item?;
            results.push((decode_seq(&key), serde_json::from_slice(&value)?));
        }

        Ok(results)
    }

    /// Get current sequence counter value
    pub fn current_seq(&self) -> u64 {
        self.seq_counter.load(Ordering::SeqCst)
    }

    /// Flush all writes to disk
    pub fn flush(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Health check - verify database is accessible
    pub fn health_check(&self) -> Result<()> {
        let _ = self.metadata.get(NEXT_SEQ_KEY)?;
        Ok(())
    }
}

fn decode_seq(bytes: &[u8]) -> u64 {
    u64::from_be_bytes(bytes.try_into().unwrap_or([0u8; 8]))
}
