/// Fjall-based persistence layer for job snapshots and idempotency keys
///
/// Uses Fjall (an embedded LSM key-value store) to persist:
///
/// - Job snapshots (status, parameters, engine attempts, artifact)
/// - Idempotency keys (deduplication for `POST /api/v1/video/download`)
/// - Metadata (last prune timestamp)
///
/// ## Retention Policies
///
/// - Jobs: terminal snapshots older than `retention.job_ttl_days` (default 30)
/// - Idempotency: records older than `retention.idempotency_ttl_days` (default 14)
///
/// The server runs [`FjallStore::prune_expired`] every `retention.prune_interval`.
///
/// ## Usage
///
/// ```rust,ignore
/// use mediabox::ledger::FjallStore;
///
/// let store = FjallStore::open("data/ledger")?;
/// store.upsert(&snapshot)?;
/// let snapshot = store.get(&task_id)?;
/// ```

pub mod error;
pub mod partitions;
pub mod pruning;
pub mod store;

pub use error::{LedgerError, Result};
pub use pruning::{IdempotencyRecord, PruneStats, RetentionPolicy};
pub use store::{FjallStore, StoreStats};
