//! PostgreSQL-backed job store over sqlx.
//!
//! This is the durable production backing for the work queue: enqueued jobs
//! survive process restarts, and `FOR UPDATE SKIP LOCKED` gives the
//! exclusive-delivery contract the worker pool relies on for per-order
//! serialization.
//!
//! Expected table:
//! ```sql
//! CREATE TABLE order_jobs (
//!   id            TEXT PRIMARY KEY,
//!   payload       JSONB NOT NULL,
//!   priority      INTEGER NOT NULL DEFAULT 1,
//!   state         TEXT NOT NULL,
//!   attempts_made INTEGER NOT NULL DEFAULT 0,
//!   last_error    TEXT,
//!   enqueued_at   TIMESTAMPTZ NOT NULL,
//!   scheduled_at  TIMESTAMPTZ NOT NULL,
//!   finished_at   TIMESTAMPTZ
//! );
//! CREATE INDEX idx_order_jobs_dispatch ON order_jobs (state, priority DESC, enqueued_at);
//! ```

use super::job::{JobCounts, JobPayload, JobState, OrderJob};
use super::store::{JobStore, RetentionPolicy};
use crate::error::{OrderflowError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::debug;

const JOB_COLUMNS: &str =
    "id, payload, priority, state, attempts_made, last_error, enqueued_at, scheduled_at, finished_at";

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    payload: Json<JobPayload>,
    priority: i32,
    state: String,
    attempts_made: i32,
    last_error: Option<String>,
    enqueued_at: DateTime<Utc>,
    scheduled_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for OrderJob {
    type Error = OrderflowError;

    fn try_from(row: JobRow) -> Result<OrderJob> {
        let state = row
            .state
            .parse()
            .map_err(|e: String| OrderflowError::infrastructure("decode_job", e))?;

        Ok(OrderJob {
            id: row.id,
            payload: row.payload.0,
            priority: row.priority,
            state,
            attempts_made: row.attempts_made,
            last_error: row.last_error,
            enqueued_at: row.enqueued_at,
            scheduled_at: row.scheduled_at,
            finished_at: row.finished_at,
        })
    }
}

/// Durable job store over a shared PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: OrderJob) -> Result<OrderJob> {
        let inserted = sqlx::query_as::<_, JobRow>(&format!(
            "INSERT INTO order_jobs \
             (id, payload, priority, state, attempts_made, last_error, enqueued_at, scheduled_at, finished_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&job.id)
        .bind(Json(&job.payload))
        .bind(job.priority)
        .bind(job.state.to_string())
        .bind(job.attempts_made)
        .bind(&job.last_error)
        .bind(job.enqueued_at)
        .bind(job.scheduled_at)
        .bind(job.finished_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(row) => OrderJob::try_from(row),
            // Conflict: a live job with this key already exists
            None => {
                debug!(job_id = %job.id, "Job already enqueued, returning existing");
                self.get(&job.id)
                    .await?
                    .ok_or_else(|| OrderflowError::not_found("job", &job.id))
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<OrderJob>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {JOB_COLUMNS} FROM order_jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderJob::try_from).transpose()
    }

    async fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<OrderJob>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "UPDATE order_jobs \
             SET state = 'active', attempts_made = attempts_made + 1 \
             WHERE id = ( \
               SELECT id FROM order_jobs \
               WHERE state = 'waiting' OR (state = 'delayed' AND scheduled_at <= $1) \
               ORDER BY priority DESC, enqueued_at ASC \
               LIMIT 1 \
               FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(OrderJob::try_from).transpose()
    }

    async fn mark_completed(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE order_jobs SET state = 'completed', finished_at = $2 WHERE id = $1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE order_jobs SET state = 'failed', last_error = $2, finished_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reschedule(&self, id: &str, run_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE order_jobs SET state = 'delayed', scheduled_at = $2 WHERE id = $1")
            .bind(id)
            .bind(run_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn counts(&self) -> Result<JobCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM order_jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await?;

        let mut counts = JobCounts::default();
        for (state, count) in rows {
            match state.parse::<JobState>() {
                Ok(JobState::Waiting) => counts.waiting = count,
                Ok(JobState::Active) => counts.active = count,
                Ok(JobState::Delayed) => counts.delayed = count,
                Ok(JobState::Completed) => counts.completed = count,
                Ok(JobState::Failed) => counts.failed = count,
                Err(e) => return Err(OrderflowError::infrastructure("decode_job", e)),
            }
        }
        Ok(counts)
    }

    async fn prune(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0u64;

        for (state, max_age, max_count) in [
            (
                JobState::Completed,
                policy.completed_max_age,
                policy.completed_max_count,
            ),
            (
                JobState::Failed,
                policy.failed_max_age,
                policy.failed_max_count,
            ),
        ] {
            let cutoff = now - max_age;
            let by_age = sqlx::query(
                "DELETE FROM order_jobs WHERE state = $1 AND finished_at IS NOT NULL AND finished_at < $2",
            )
            .bind(state.to_string())
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
            removed += by_age.rows_affected();

            let by_count = sqlx::query(
                "DELETE FROM order_jobs \
                 WHERE state = $1 AND id NOT IN ( \
                   SELECT id FROM order_jobs WHERE state = $1 \
                   ORDER BY finished_at DESC NULLS LAST LIMIT $2 \
                 )",
            )
            .bind(state.to_string())
            .bind(max_count)
            .execute(&self.pool)
            .await?;
            removed += by_count.rows_affected();
        }

        if removed > 0 {
            debug!(removed, "Pruned finished jobs outside retention");
        }
        Ok(removed)
    }

    async fn close(&self) -> Result<()> {
        // The pool is shared with the order repository; its lifetime is owned
        // by process wiring. Persisted job state survives regardless.
        debug!("Job store closed");
        Ok(())
    }
}
