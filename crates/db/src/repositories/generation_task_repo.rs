//! Repository for the outcome columns of `generation_tasks`.
//!
//! Writes are addressed by *job* id because that is the only identifier the
//! in-memory streaming layer knows. Each outcome write is guarded so a task
//! only ever leaves the running state once; the return value says whether
//! this call was the one that did it.

use layoutgen_core::replica::ReplicaId;
use layoutgen_core::types::JobId;
use sqlx::PgPool;

/// Predicate matching tasks without any recorded outcome.
const UNFINISHED: &str = "output IS NULL AND error IS NULL AND canceled = FALSE";

/// Outcome writes and the restart sweep for generation tasks.
pub struct GenerationTaskRepo;

impl GenerationTaskRepo {
    /// Record the full generated output.
    pub async fn set_output(pool: &PgPool, job_id: JobId, output: &str) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE generation_tasks SET output = $2, updated_at = NOW() \
             WHERE id = (SELECT generation_task_id FROM jobs WHERE id = $1) AND {UNFINISHED}"
        );
        let result = sqlx::query(&query)
            .bind(job_id)
            .bind(output)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record an upstream failure message.
    pub async fn set_error(pool: &PgPool, job_id: JobId, error: &str) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE generation_tasks SET error = $2, updated_at = NOW() \
             WHERE id = (SELECT generation_task_id FROM jobs WHERE id = $1) AND {UNFINISHED}"
        );
        let result = sqlx::query(&query)
            .bind(job_id)
            .bind(error)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Record an explicit cancellation.
    pub async fn set_canceled(pool: &PgPool, job_id: JobId) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE generation_tasks SET canceled = TRUE, updated_at = NOW() \
             WHERE id = (SELECT generation_task_id FROM jobs WHERE id = $1) AND {UNFINISHED}"
        );
        let result = sqlx::query(&query).bind(job_id).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every unfinished task owned by `replica_id` as failed.
    ///
    /// Run once at startup: a freshly started replica holds no streams, so
    /// any task it still owns can never finish.
    pub async fn fail_unfinished_for_replica(
        pool: &PgPool,
        replica_id: &ReplicaId,
        message: &str,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE generation_tasks SET error = $2, updated_at = NOW() \
             WHERE replica_id = $1 AND {UNFINISHED}"
        );
        let result = sqlx::query(&query)
            .bind(replica_id.as_str())
            .bind(message)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
