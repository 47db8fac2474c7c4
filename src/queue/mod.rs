pub mod bulk;
pub mod pending;

pub use bulk::{BatchId, BulkBatch, BulkCallback, BulkOutcome};
pub use pending::{Completion, CompletionCallback, PendingQueue, ProgressCallback, QueueItem};
