//! PostgreSQL-backed [`JobStore`].

use async_trait::async_trait;
use layoutgen_core::generation::FeedbackKind;
use layoutgen_core::replica::ReplicaId;
use layoutgen_core::types::{JobId, Timestamp};

use crate::models::job::{JobDetail, JobListQuery, JobPage, NewJob, TaskState};
use crate::repositories::{GenerationTaskRepo, JobRepo};
use crate::store::{JobStore, StoreError, TaskOutcomeWriter, TaskStateReader};
use crate::DbPool;

/// [`JobStore`] over a PostgreSQL pool, delegating to the repositories.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl TaskOutcomeWriter for PgJobStore {
    async fn record_output(&self, job_id: JobId, output: &str) -> Result<bool, StoreError> {
        Ok(GenerationTaskRepo::set_output(&self.pool, job_id, output).await?)
    }

    async fn record_error(&self, job_id: JobId, error: &str) -> Result<bool, StoreError> {
        Ok(GenerationTaskRepo::set_error(&self.pool, job_id, error).await?)
    }

    async fn record_canceled(&self, job_id: JobId) -> Result<bool, StoreError> {
        Ok(GenerationTaskRepo::set_canceled(&self.pool, job_id).await?)
    }
}

#[async_trait]
impl TaskStateReader for PgJobStore {
    async fn task_state(&self, job_id: JobId) -> Result<Option<TaskState>, StoreError> {
        let job = JobRepo::find_by_id(&self.pool, job_id).await?;
        Ok(job.map(|job| job.task_state()))
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, input: NewJob) -> Result<JobDetail, StoreError> {
        Ok(JobRepo::create(&self.pool, &input).await?)
    }

    async fn find_job(&self, job_id: JobId) -> Result<Option<JobDetail>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, job_id).await?)
    }

    async fn list_jobs(&self, user_id: &str, params: &JobListQuery) -> Result<JobPage, StoreError> {
        Ok(JobRepo::list_by_user(&self.pool, user_id, params).await?)
    }

    async fn count_jobs_created_between(
        &self,
        user_id: &str,
        from: Timestamp,
        until: Timestamp,
    ) -> Result<i64, StoreError> {
        Ok(JobRepo::count_created_between(&self.pool, user_id, from, until).await?)
    }

    async fn soft_delete_job(&self, job_id: JobId) -> Result<bool, StoreError> {
        Ok(JobRepo::soft_delete(&self.pool, job_id).await?)
    }

    async fn set_feedback(
        &self,
        job_id: JobId,
        kind: FeedbackKind,
        text: Option<&str>,
    ) -> Result<bool, StoreError> {
        Ok(JobRepo::set_feedback(&self.pool, job_id, kind.as_str(), text).await?)
    }

    async fn fail_unfinished_tasks(
        &self,
        replica_id: &ReplicaId,
        message: &str,
    ) -> Result<u64, StoreError> {
        Ok(GenerationTaskRepo::fail_unfinished_for_replica(&self.pool, replica_id, message).await?)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
