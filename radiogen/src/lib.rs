//! # radiogen
//!
//! Children's radio program assembly service. An external trigger enqueues a
//! job describing the program's segments; the queue processor claims it,
//! drives the [`mixdown`] assembly pipeline, uploads the rendered MP3 to CDN
//! storage and persists the outcome. Clients read job state via a pull
//! snapshot or an SSE push stream.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod storage;

pub use error::{Error, Result};
