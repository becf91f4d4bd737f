use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use tracing::{debug, info};

use crate::api::models::{JobSnapshot, TransitionError};

use super::error::{LedgerError, Result};
use super::partitions::{encode_idem_key, encode_job_key, encode_meta_key};
use super::pruning::{IdempotencyRecord, META_LAST_PRUNE, PruneStats, RetentionPolicy, prune_expired};

/// Fjall-backed persistent storage for job snapshots and idempotency keys
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    jobs: PartitionHandle,
    idempotency: PartitionHandle,
    metadata: PartitionHandle,
    /// Serializes check-then-insert on the idempotency partition
    idem_guard: Arc<Mutex<()>>,
}

impl FjallStore {
    /// Open or create a Fjall store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening Fjall store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;

        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;
        let idempotency = keyspace.open_partition("idempotency", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        info!("Fjall store opened successfully");
        Ok(Self {
            keyspace,
            jobs,
            idempotency,
            metadata,
            idem_guard: Arc::new(Mutex::new(())),
        })
    }

    /// Store or replace a job snapshot
    pub fn upsert(&self, snapshot: &JobSnapshot) -> Result<()> {
        let key = encode_job_key(&snapshot.task_id);
        let value = serde_json::to_vec(snapshot)?;
        self.jobs.insert(key, value)?;
        debug!(task_id = %snapshot.task_id, status = ?snapshot.status, "Upserted job");
        Ok(())
    }

    /// Get a job snapshot by ID
    pub fn get(&self, task_id: &str) -> Result<Option<JobSnapshot>> {
        let key = encode_job_key(task_id);
        match self.jobs.get(key)? {
            Some(value) => {
                let snapshot = serde_json::from_slice(&value)?;
                Ok(Some(snapshot))
            }
            None => Ok(None),
        }
    }

    /// Read-modify-write of one snapshot; `apply` enforces status transitions
    pub fn update<F>(&self, task_id: &str, apply: F) -> Result<JobSnapshot>
    where
        F: FnOnce(&mut JobSnapshot) -> std::result::Result<(), TransitionError>,
    {
        let mut snapshot = self
            .get(task_id)?
            .ok_or_else(|| LedgerError::JobNotFound(task_id.to_string()))?;
        apply(&mut snapshot)?;
        self.upsert(&snapshot)?;
        Ok(snapshot)
    }

    /// Bind `key` to `job_id` unless it is already bound
    ///
    /// Returns the job id that already owns the key, or `None` when this call
    /// claimed it. Concurrent claims of one key see exactly one winner.
    pub fn claim_idempotency(&self, key: &str, job_id: &str) -> Result<Option<String>> {
        let _guard = self.idem_guard.lock().map_err(|_| LedgerError::LockPoisoned)?;

        if let Some(existing) = self.get_idempotent(key)? {
            return Ok(Some(existing));
        }

        let record = IdempotencyRecord {
            job_id: job_id.to_string(),
            created_at: Utc::now(),
        };
        self.idempotency
            .insert(encode_idem_key(key), serde_json::to_vec(&record)?)?;
        debug!("Claimed idempotency: {} -> {}", key, job_id);
        Ok(None)
    }

    /// Drop a claim made by `job_id`, leaving any other owner untouched
    pub fn release_idempotency(&self, key: &str, job_id: &str) -> Result<()> {
        let _guard = self.idem_guard.lock().map_err(|_| LedgerError::LockPoisoned)?;

        if self.get_idempotent(key)?.as_deref() == Some(job_id) {
            self.idempotency.remove(encode_idem_key(key))?;
            debug!("Released idempotency: {} -> {}", key, job_id);
        }
        Ok(())
    }

    /// Check if an idempotency key exists and return the associated job_id
    pub fn get_idempotent(&self, key: &str) -> Result<Option<String>> {
        match self.idempotency.get(encode_idem_key(key))? {
            Some(value) => {
                let record: IdempotencyRecord = serde_json::from_slice(&value)?;
                Ok(Some(record.job_id))
            }
            None => Ok(None),
        }
    }

    /// Prune expired entries based on retention policies
    pub fn prune_expired(&self, policy: RetentionPolicy) -> Result<PruneStats> {
        self.prune_expired_at(policy, Utc::now())
    }

    pub fn prune_expired_at(&self, policy: RetentionPolicy, now: DateTime<Utc>) -> Result<PruneStats> {
        info!("Starting pruning process");
        prune_expired(
            &self.keyspace,
            &self.jobs,
            &self.idempotency,
            &self.metadata,
            policy,
            now,
        )
    }

    /// Unix timestamp of the last completed prune run
    pub fn last_prune(&self) -> Result<Option<i64>> {
        match self.metadata.get(encode_meta_key(META_LAST_PRUNE))? {
            Some(value) => {
                let text = String::from_utf8_lossy(&value);
                text.parse()
                    .map(Some)
                    .map_err(|_| LedgerError::InvalidKey(format!("bad {META_LAST_PRUNE} value: {text}")))
            }
            None => Ok(None),
        }
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Cheap read against the jobs partition
    pub fn health_check(&self) -> Result<()> {
        self.jobs.first_key_value()?;
        Ok(())
    }

    /// Get internal statistics (for debugging/monitoring)
    pub fn stats(&self) -> Result<StoreStats> {
        let mut job_count = 0;
        let mut idem_count = 0;

        for item in self.jobs.iter() {
            item?;
            job_count += 1;
        }

        for item in self.idempotency.iter() {
            item?;
            idem_count += 1;
        }

        Ok(StoreStats {
            job_count,
            idem_count,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StoreStats {
    pub job_count: usize,
    pub idem_count: usize,
}
