//! Repository for the `jobs` table and its 1:1 `generation_tasks` row.
//!
//! Every read path hides soft-deleted jobs except [`JobRepo::count_created_between`],
//! which feeds the monthly quota (deleting a job does not refund a request).

use layoutgen_core::types::{new_job_id, JobId, Timestamp};
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::job::{JobDetail, JobListQuery, JobPage, JobSummary, NewJob, Pagination, PAGE_SIZE};

/// Column list for joined `jobs j` / `generation_tasks t` queries.
const DETAIL_COLUMNS: &str = "\
    j.id, j.user_id, j.created_at, j.deleted_at, \
    j.feedback_kind, j.feedback_text, j.generation_task_id, \
    t.replica_id, t.prompt, t.flags, t.output, t.error, t.canceled";

/// Provides CRUD operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a generation task and its job in one transaction.
    pub async fn create(pool: &PgPool, input: &NewJob) -> Result<JobDetail, sqlx::Error> {
        let job_id = new_job_id();
        let task_id = new_job_id();
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT INTO generation_tasks (id, replica_id, prompt, flags) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(task_id)
        .bind(input.replica_id.as_str())
        .bind(&input.prompt)
        .bind(input.flags.clone().map(Json))
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO jobs (id, user_id, generation_task_id) VALUES ($1, $2, $3)")
            .bind(job_id)
            .bind(input.user_id.as_deref())
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        let query = format!(
            "SELECT {DETAIL_COLUMNS} FROM jobs j \
             JOIN generation_tasks t ON t.id = j.generation_task_id \
             WHERE j.id = $1"
        );
        let detail = sqlx::query_as::<_, JobDetail>(&query)
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(detail)
    }

    /// Find a live (not soft-deleted) job by id.
    pub async fn find_by_id(pool: &PgPool, job_id: JobId) -> Result<Option<JobDetail>, sqlx::Error> {
        let query = format!(
            "SELECT {DETAIL_COLUMNS} FROM jobs j \
             JOIN generation_tasks t ON t.id = j.generation_task_id \
             WHERE j.id = $1 AND j.deleted_at IS NULL"
        );
        sqlx::query_as::<_, JobDetail>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// One page of a user's live jobs, newest first.
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: &str,
        params: &JobListQuery,
    ) -> Result<JobPage, sqlx::Error> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let jobs = sqlx::query_as::<_, JobSummary>(
            "SELECT j.id, t.prompt, j.created_at FROM jobs j \
             JOIN generation_tasks t ON t.id = j.generation_task_id \
             WHERE j.user_id = $1 AND j.deleted_at IS NULL \
             ORDER BY j.created_at DESC, j.id DESC \
             LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(PAGE_SIZE)
        .bind(params.offset())
        .fetch_all(pool)
        .await?;

        Ok(JobPage {
            jobs,
            pagination: Pagination::new(params.page(), PAGE_SIZE, total),
        })
    }

    /// Count jobs a user created in `[from, until)`, soft-deleted ones included.
    pub async fn count_created_between(
        pool: &PgPool,
        user_id: &str,
        from: Timestamp,
        until: Timestamp,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM jobs \
             WHERE user_id = $1 AND created_at >= $2 AND created_at < $3",
        )
        .bind(user_id)
        .bind(from)
        .bind(until)
        .fetch_one(pool)
        .await
    }

    /// Soft-delete a job. Returns `true` if a live job was marked deleted.
    pub async fn soft_delete(pool: &PgPool, job_id: JobId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(job_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the feedback on a live job. Returns `false` if the job is gone.
    pub async fn set_feedback(
        pool: &PgPool,
        job_id: JobId,
        kind: &str,
        text: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET feedback_kind = $2, feedback_text = $3 \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(job_id)
        .bind(kind)
        .bind(text)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
