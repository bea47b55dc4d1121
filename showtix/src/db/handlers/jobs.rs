//! Queued background work.
//!
//! Jobs are plain rows claimed with `FOR UPDATE SKIP LOCKED`, so several
//! workers can poll the same table without double-running anything. A
//! claim flips the row to `running` and bumps `attempts`; the worker then
//! settles it as `completed`, or re-queues it with a delay until the
//! attempt budget runs out.

use sqlx::PgConnection;
use std::time::Duration;
use tracing::instrument;

use crate::db::errors::{DbError, Result};
use crate::db::models::jobs::{JobCreateDBRequest, JobDBResponse};
use crate::types::JobId;

pub struct Jobs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Jobs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a job. `run_at` in the future makes it a delayed job.
    ///
    /// Enqueueing on the same connection as a data mutation (inside one
    /// transaction) makes the job and the mutation atomic: both land or
    /// neither does.
    #[instrument(skip(self, request), fields(job_type = %request.job_type), err)]
    pub async fn enqueue(&mut self, request: &JobCreateDBRequest) -> Result<JobDBResponse> {
        let job = sqlx::query_as::<_, JobDBResponse>(
            r#"
            INSERT INTO jobs (job_type, payload, run_at)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(&request.job_type)
        .bind(&request.payload)
        .bind(request.run_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(job)
    }

    /// Atomically claim up to `batch` due jobs.
    ///
    /// `SKIP LOCKED` keeps concurrent pollers from blocking on or
    /// double-claiming the same rows.
    #[instrument(skip(self), fields(batch), err)]
    pub async fn claim_due(&mut self, batch: i64) -> Result<Vec<JobDBResponse>> {
        let jobs = sqlx::query_as::<_, JobDBResponse>(
            r#"
            UPDATE jobs
            SET status = 'running',
                attempts = attempts + 1,
                updated_at = NOW()
            WHERE id IN (
                SELECT id
                FROM jobs
                WHERE status = 'pending' AND run_at <= NOW()
                ORDER BY run_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(batch)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(jobs)
    }

    #[instrument(skip(self), fields(job_id = %id), err)]
    pub async fn mark_completed(&mut self, id: JobId) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'completed', updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Record a failed attempt.
    ///
    /// Below `max_attempts` the job goes back to `pending` with a linear
    /// backoff (`retry_delay * attempts`); at or past the budget it is
    /// parked as `failed` and never claimed again.
    #[instrument(skip(self, error), fields(job_id = %id), err)]
    pub async fn mark_failed(
        &mut self,
        id: JobId,
        error: &str,
        max_attempts: i32,
        retry_delay: Duration,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts >= $3 THEN 'failed' ELSE 'pending' END,
                run_at = NOW() + make_interval(secs => $4 * attempts),
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(max_attempts)
        .bind(retry_delay.as_secs_f64())
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}
