//! API route modules.

pub mod health;
pub mod jobs;
pub mod process;
pub mod status;
