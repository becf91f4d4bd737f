pub mod broker;
pub mod store;
pub mod task;

pub use broker::{TaskBroker, TaskEnvelope};
pub use store::{FjallQueue, QueueError};
pub use task::{DeadLetterTask, DownloadTask};
