/// Pruning and retention policy implementation
use chrono::{DateTime, Duration, Utc};
use fjall::{Keyspace, PartitionHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::models::JobSnapshot;
use crate::config::RetentionConfig;

use super::error::Result;
use super::partitions::{decode_idem_key, decode_job_key, encode_meta_key};

/// Metadata key holding the unix timestamp of the last prune run
pub(crate) const META_LAST_PRUNE: &str = "last_prune";

/// Value stored under `idem:{key}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub job_id: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
}

/// How long entries live before pruning
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    pub job_ttl: Duration,
    pub idempotency_ttl: Duration,
}

impl From<&RetentionConfig> for RetentionPolicy {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            job_ttl: Duration::days(config.job_ttl_days.into()),
            idempotency_ttl: Duration::days(config.idempotency_ttl_days.into()),
        }
    }
}

/// Pruning statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneStats {
    pub jobs_pruned: usize,
    pub idempotency_pruned: usize,
}

/// Prune expired entries from all partitions as of `now`
pub fn prune_expired(
    keyspace: &Keyspace,
    jobs_partition: &PartitionHandle,
    idem_partition: &PartitionHandle,
    metadata_partition: &PartitionHandle,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Result<PruneStats> {
    let stats = PruneStats {
        jobs_pruned: prune_jobs(jobs_partition, now - policy.job_ttl)?,
        idempotency_pruned: prune_idempotency(idem_partition, now - policy.idempotency_ttl)?,
    };

    metadata_partition.insert(
        encode_meta_key(META_LAST_PRUNE),
        now.timestamp().to_string().as_bytes(),
    )?;

    keyspace.persist(fjall::PersistMode::SyncAll)?;
    info!("Pruning complete: {:?}", stats);

    Ok(stats)
}

/// Remove terminal job snapshots last updated before `cutoff`
///
/// Pending and processing jobs are never pruned regardless of age.
fn prune_jobs(jobs_partition: &PartitionHandle, cutoff: DateTime<Utc>) -> Result<usize> {
    let mut expired = Vec::new();

    for item in jobs_partition.iter() {
        let (key, value) = item?;
        let snapshot: JobSnapshot = match serde_json::from_slice(&value) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(key = ?decode_job_key(&key), error = %e, "Skipping unreadable job snapshot");
                continue;
            }
        };

        if snapshot.status.is_terminal() && snapshot.updated_at < cutoff {
            expired.push(key);
        }
    }

    for key in &expired {
        jobs_partition.remove(key.clone())?;
        debug!(task_id = ?decode_job_key(key), "Pruned job snapshot");
    }

    Ok(expired.len())
}

/// Remove idempotency records created before `cutoff`
fn prune_idempotency(idem_partition: &PartitionHandle, cutoff: DateTime<Utc>) -> Result<usize> {
    let mut expired = Vec::new();

    for item in idem_partition.iter() {
        let (key, value) = item?;
        match serde_json::from_slice::<IdempotencyRecord>(&value) {
            Ok(record) if record.created_at < cutoff => expired.push(key),
            Ok(_) => {}
            Err(e) => {
                // Records that cannot be dated cannot be trusted for dedup either
                warn!(key = ?decode_idem_key(&key), error = %e, "Dropping unreadable idempotency record");
                expired.push(key);
            }
        }
    }

    for key in &expired {
        idem_partition.remove(key.clone())?;
    }

    Ok(expired.len())
}
