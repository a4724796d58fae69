//! Queue processor: claims a job, drives the assembly pipeline, persists the
//! outcome.
//!
//! Two layers of exclusion: the store-level conditional claim coordinates
//! across instances, and a process-local atomic flag rejects concurrent
//! invocations within one worker instance, since at most one assembly
//! pipeline may run per instance. The flag is released by a drop guard on
//! every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use mixdown::{AssembledProgram, AssemblyPipeline, SegmentDescriptor};

use crate::database::models::JobDbModel;
use crate::database::repositories::JobRepository;
use crate::storage::ProgramStore;
use crate::Result;

/// Which job to process.
#[derive(Debug, Clone)]
pub enum JobSelector {
    /// FIFO: oldest pending by `created_at`.
    OldestPending,
    /// A specific job, for low-latency triggering right after enqueue.
    ById(String),
}

/// Outcome of one processor invocation.
#[derive(Debug, Clone)]
pub enum ProcessOutcome {
    /// The claimed job completed; the record now carries the result fields.
    Completed {
        job_id: String,
        program_url: String,
        file_count: i64,
        duration_ms: i64,
    },
    /// The claimed job failed; the record now carries the error message.
    Failed { job_id: String, error: String },
    /// Untargeted invocation found no pending job.
    NothingToDo,
    /// Targeted job missing or already claimed by another worker.
    NotFound { job_id: String },
    /// Another pipeline is already running in this worker instance.
    Busy { retry_after_secs: u64 },
}

/// Seam over the assembly engine, narrow enough to fake in tests.
#[async_trait]
pub trait Assembler: Send + Sync {
    async fn assemble(
        &self,
        segments: &[SegmentDescriptor],
        output_name: &str,
    ) -> mixdown::Result<AssembledProgram>;
}

#[async_trait]
impl Assembler for AssemblyPipeline {
    async fn assemble(
        &self,
        segments: &[SegmentDescriptor],
        output_name: &str,
    ) -> mixdown::Result<AssembledProgram> {
        self.run(segments, output_name).await
    }
}

pub struct QueueProcessor {
    repository: Arc<dyn JobRepository>,
    store: Arc<dyn ProgramStore>,
    assembler: Arc<dyn Assembler>,
    busy: AtomicBool,
    retry_after_secs: u64,
}

impl QueueProcessor {
    pub fn new(
        repository: Arc<dyn JobRepository>,
        store: Arc<dyn ProgramStore>,
        assembler: Arc<dyn Assembler>,
        retry_after_secs: u64,
    ) -> Self {
        Self {
            repository,
            store,
            assembler,
            busy: AtomicBool::new(false),
            retry_after_secs,
        }
    }

    /// Claim and process one job.
    ///
    /// Claim conflicts are benign: a targeted claim that loses the race
    /// reports `NotFound`, an untargeted one moves on to `NothingToDo`.
    pub async fn process(&self, selector: JobSelector) -> Result<ProcessOutcome> {
        let Some(_guard) = BusyGuard::acquire(&self.busy) else {
            return Ok(ProcessOutcome::Busy {
                retry_after_secs: self.retry_after_secs,
            });
        };

        let claimed = match &selector {
            JobSelector::OldestPending => self.repository.claim_oldest_pending().await?,
            JobSelector::ById(id) => self.repository.claim_by_id(id).await?,
        };

        let Some(job) = claimed else {
            return Ok(match selector {
                JobSelector::OldestPending => ProcessOutcome::NothingToDo,
                JobSelector::ById(job_id) => ProcessOutcome::NotFound { job_id },
            });
        };

        info!(job_id = %job.id, world = %job.world, lmid = %job.lmid, "job claimed");
        let started = Instant::now();

        match self.run_pipeline(&job).await {
            Ok((program_url, file_count)) => {
                let duration_ms = started.elapsed().as_millis() as i64;
                self.repository
                    .mark_completed(&job.id, &program_url, file_count, duration_ms)
                    .await?;
                info!(job_id = %job.id, program_url, duration_ms, "job completed");
                Ok(ProcessOutcome::Completed {
                    job_id: job.id,
                    program_url,
                    file_count,
                    duration_ms,
                })
            }
            Err(error) => {
                let duration_ms = started.elapsed().as_millis() as i64;
                let message = error.to_string();
                warn!(job_id = %job.id, error = %message, duration_ms, "job failed");
                self.repository
                    .mark_failed(&job.id, &message, duration_ms)
                    .await?;
                Ok(ProcessOutcome::Failed {
                    job_id: job.id,
                    error: message,
                })
            }
        }
    }

    /// Assemble, upload, return `(program_url, file_count)`.
    ///
    /// The scratch directory lives inside [`AssembledProgram`] and is removed
    /// when it drops, on the error paths included.
    async fn run_pipeline(&self, job: &JobDbModel) -> Result<(String, i64)> {
        let segments: Vec<SegmentDescriptor> = serde_json::from_str(&job.segments)?;
        let filename = format!("{}-program.mp3", job.program_type);

        let program = self.assembler.assemble(&segments, &filename).await?;
        let bytes = tokio::fs::read(&program.path).await?;

        let program_url = self
            .store
            .store(bytes, &job.lang, &job.lmid, &job.world, &filename)
            .await?;

        Ok((program_url, program.file_count as i64))
    }
}

/// RAII guard over the process-local busy flag.
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
