//! Scheduling infrastructure for the periodic reconciliation trigger.
//!
//! The cron-based [`SyncScheduler`] kicks off the standard reconciliation
//! batches on a configurable schedule. It follows the same runtime rules as
//! the other workers: explicit lifecycle management, tracked join handles,
//! cancellation token support, and timeout wrapping on the scheduled job.

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{SyncScheduler, SyncSchedulerConfig};
