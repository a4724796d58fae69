//! Database models.

pub mod job;

pub use job::{JobDbModel, JobStatus, ProgramType};
