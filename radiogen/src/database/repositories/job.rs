//! Job repository.
//!
//! All claiming and completion goes through conditional updates guarded on
//! the current status, with `rows_affected()` deciding who won. Zero rows
//! affected is a benign no-op (another worker was faster), never an error.

use async_trait::async_trait;

use crate::database::models::JobDbModel;
use crate::database::DbPool;
use crate::{Error, Result};

/// Job repository trait.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn get_job(&self, id: &str) -> Result<Option<JobDbModel>>;
    async fn create_job(&self, job: &JobDbModel) -> Result<()>;

    /// Find the most recent job for a target program, any status.
    async fn find_by_target(
        &self,
        program_type: &str,
        world: &str,
        lmid: &str,
        lang: &str,
    ) -> Result<Option<JobDbModel>>;

    /// Atomically claim the oldest pending job (FIFO by `created_at`).
    /// `None` when the queue is empty.
    async fn claim_oldest_pending(&self) -> Result<Option<JobDbModel>>;

    /// Atomically claim a specific pending job. `None` when the job does not
    /// exist or was already claimed by another worker.
    async fn claim_by_id(&self, id: &str) -> Result<Option<JobDbModel>>;

    /// Transition PROCESSING -> COMPLETED with the result fields.
    /// Returns whether the transition happened.
    async fn mark_completed(
        &self,
        id: &str,
        program_url: &str,
        file_count: i64,
        duration_ms: i64,
    ) -> Result<bool>;

    /// Transition PROCESSING -> FAILED with the error message.
    async fn mark_failed(&self, id: &str, error_message: &str, duration_ms: i64) -> Result<bool>;

    /// Reset a FAILED job to PENDING with fresh segments so it can be claimed
    /// again. Returns whether the reset happened.
    async fn reset_failed(&self, id: &str, segments_json: &str) -> Result<bool>;
}

/// SQLx implementation of [`JobRepository`].
pub struct SqlxJobRepository {
    pool: DbPool,
}

impl SqlxJobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn try_claim(&self, id: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let done = sqlx::query(
            "UPDATE job SET status = 'PROCESSING', started_at = ? WHERE id = ? AND status = 'PENDING'",
        )
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn get_job_required(&self, id: &str) -> Result<JobDbModel> {
        self.get_job(id)
            .await?
            .ok_or_else(|| Error::not_found("Job", id))
    }
}

#[async_trait]
impl JobRepository for SqlxJobRepository {
    async fn get_job(&self, id: &str) -> Result<Option<JobDbModel>> {
        let job = sqlx::query_as::<_, JobDbModel>("SELECT * FROM job WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    async fn create_job(&self, job: &JobDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO job (
                id, status, created_at, started_at, completed_at,
                program_type, world, lmid, lang, segments,
                program_url, file_count, error_message, processing_duration_ms
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.status)
        .bind(&job.created_at)
        .bind(&job.started_at)
        .bind(&job.completed_at)
        .bind(&job.program_type)
        .bind(&job.world)
        .bind(&job.lmid)
        .bind(&job.lang)
        .bind(&job.segments)
        .bind(&job.program_url)
        .bind(&job.file_count)
        .bind(&job.error_message)
        .bind(&job.processing_duration_ms)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_target(
        &self,
        program_type: &str,
        world: &str,
        lmid: &str,
        lang: &str,
    ) -> Result<Option<JobDbModel>> {
        let job = sqlx::query_as::<_, JobDbModel>(
            r#"
            SELECT * FROM job
            WHERE program_type = ? AND world = ? AND lmid = ? AND lang = ?
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(program_type)
        .bind(world)
        .bind(lmid)
        .bind(lang)
        .fetch_optional(&self.pool)
        .await?;
        Ok(job)
    }

    async fn claim_oldest_pending(&self) -> Result<Option<JobDbModel>> {
        loop {
            let candidate: Option<(String,)> = sqlx::query_as(
                "SELECT id FROM job WHERE status = 'PENDING' ORDER BY created_at LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;

            let Some((id,)) = candidate else {
                return Ok(None);
            };

            if self.try_claim(&id).await? {
                return Ok(Some(self.get_job_required(&id).await?));
            }
            // Lost the race for this candidate; try the next oldest.
        }
    }

    async fn claim_by_id(&self, id: &str) -> Result<Option<JobDbModel>> {
        if self.try_claim(id).await? {
            Ok(Some(self.get_job_required(id).await?))
        } else {
            Ok(None)
        }
    }

    async fn mark_completed(
        &self,
        id: &str,
        program_url: &str,
        file_count: i64,
        duration_ms: i64,
    ) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let done = sqlx::query(
            r#"
            UPDATE job
            SET status = 'COMPLETED', completed_at = ?, program_url = ?,
                file_count = ?, processing_duration_ms = ?, error_message = NULL
            WHERE id = ? AND status = 'PROCESSING'
            "#,
        )
        .bind(&now)
        .bind(program_url)
        .bind(file_count)
        .bind(duration_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn mark_failed(&self, id: &str, error_message: &str, duration_ms: i64) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let done = sqlx::query(
            r#"
            UPDATE job
            SET status = 'FAILED', completed_at = ?, error_message = ?,
                processing_duration_ms = ?, program_url = NULL, file_count = NULL
            WHERE id = ? AND status = 'PROCESSING'
            "#,
        )
        .bind(&now)
        .bind(error_message)
        .bind(duration_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }

    async fn reset_failed(&self, id: &str, segments_json: &str) -> Result<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let done = sqlx::query(
            r#"
            UPDATE job
            SET status = 'PENDING', created_at = ?, started_at = NULL,
                completed_at = NULL, segments = ?, program_url = NULL,
                file_count = NULL, error_message = NULL, processing_duration_ms = NULL
            WHERE id = ? AND status = 'FAILED'
            "#,
        )
        .bind(&now)
        .bind(segments_json)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected() == 1)
    }
}
