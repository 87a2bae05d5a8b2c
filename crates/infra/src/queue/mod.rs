//! Persistent named job queues.

pub mod manager;

pub use manager::{JobProcessor, QueueHandle, QueueManager, QueueOptions, TaskOutcome};
