//! Database repositories.

pub mod job;

pub use job::{JobRepository, SqlxJobRepository};
