//! Application services.

pub mod processor;

pub use processor::{Assembler, JobSelector, ProcessOutcome, QueueProcessor};
