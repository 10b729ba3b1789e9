//! In-process [`JobStore`] for running without PostgreSQL.
//!
//! Used when `DATABASE_URL` is unset (single-replica local development) and
//! by tests. Mirrors the guards of the SQL repositories: outcomes are written
//! at most once and soft-deleted jobs are invisible to reads.

use std::collections::HashMap;

use async_trait::async_trait;
use layoutgen_core::generation::FeedbackKind;
use layoutgen_core::replica::ReplicaId;
use layoutgen_core::types::{new_job_id, JobId, Timestamp};
use parking_lot::RwLock;
use sqlx::types::Json;

use crate::models::job::{JobDetail, JobListQuery, JobPage, JobSummary, NewJob, Pagination, TaskState, PAGE_SIZE};
use crate::store::{JobStore, StoreError, TaskOutcomeWriter, TaskStateReader};

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, JobDetail>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed row, bypassing id generation. Lets callers seed
    /// jobs owned by other replicas or with a given outcome.
    pub fn insert(&self, job: JobDetail) {
        self.jobs.write().insert(job.id, job);
    }

    /// Read a row regardless of its soft-delete marker.
    pub fn get_raw(&self, job_id: JobId) -> Option<JobDetail> {
        self.jobs.read().get(&job_id).cloned()
    }

    /// Apply `write` to an unfinished task. Returns whether it was applied.
    fn finish(&self, job_id: JobId, write: impl FnOnce(&mut JobDetail)) -> bool {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(&job_id) {
            Some(job) if job.outcome().is_none() => {
                write(job);
                true
            }
            _ => false,
        }
    }
}

/// Build a detail row for a new job, as the SQL insert would.
pub fn new_detail(input: NewJob, created_at: Timestamp) -> JobDetail {
    JobDetail {
        id: new_job_id(),
        user_id: input.user_id,
        created_at,
        deleted_at: None,
        feedback_kind: None,
        feedback_text: None,
        generation_task_id: new_job_id(),
        replica_id: input.replica_id.to_string(),
        prompt: input.prompt,
        flags: input.flags.map(Json),
        output: None,
        error: None,
        canceled: false,
    }
}

#[async_trait]
impl TaskOutcomeWriter for MemoryJobStore {
    async fn record_output(&self, job_id: JobId, output: &str) -> Result<bool, StoreError> {
        Ok(self.finish(job_id, |job| job.output = Some(output.to_string())))
    }

    async fn record_error(&self, job_id: JobId, error: &str) -> Result<bool, StoreError> {
        Ok(self.finish(job_id, |job| job.error = Some(error.to_string())))
    }

    async fn record_canceled(&self, job_id: JobId) -> Result<bool, StoreError> {
        Ok(self.finish(job_id, |job| job.canceled = true))
    }
}

#[async_trait]
impl TaskStateReader for MemoryJobStore {
    async fn task_state(&self, job_id: JobId) -> Result<Option<TaskState>, StoreError> {
        Ok(self
            .jobs
            .read()
            .get(&job_id)
            .filter(|job| !job.is_deleted())
            .map(JobDetail::task_state))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, input: NewJob) -> Result<JobDetail, StoreError> {
        let job = new_detail(input, chrono::Utc::now());
        self.insert(job.clone());
        Ok(job)
    }

    async fn find_job(&self, job_id: JobId) -> Result<Option<JobDetail>, StoreError> {
        Ok(self
            .jobs
            .read()
            .get(&job_id)
            .filter(|job| !job.is_deleted())
            .cloned())
    }

    async fn list_jobs(&self, user_id: &str, params: &JobListQuery) -> Result<JobPage, StoreError> {
        let jobs = self.jobs.read();
        let mut owned: Vec<&JobDetail> = jobs
            .values()
            .filter(|job| !job.is_deleted() && job.user_id.as_deref() == Some(user_id))
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = owned.len() as i64;
        let page = owned
            .into_iter()
            .skip(params.offset() as usize)
            .take(PAGE_SIZE as usize)
            .map(|job| JobSummary {
                id: job.id,
                prompt: job.prompt.clone(),
                created_at: job.created_at,
            })
            .collect();

        Ok(JobPage {
            jobs: page,
            pagination: Pagination::new(params.page(), PAGE_SIZE, total),
        })
    }

    async fn count_jobs_created_between(
        &self,
        user_id: &str,
        from: Timestamp,
        until: Timestamp,
    ) -> Result<i64, StoreError> {
        let count = self
            .jobs
            .read()
            .values()
            .filter(|job| job.user_id.as_deref() == Some(user_id))
            .filter(|job| job.created_at >= from && job.created_at < until)
            .count();
        Ok(count as i64)
    }

    async fn soft_delete_job(&self, job_id: JobId) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(&job_id) {
            Some(job) if !job.is_deleted() => {
                job.deleted_at = Some(chrono::Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_feedback(
        &self,
        job_id: JobId,
        kind: FeedbackKind,
        text: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write();
        match jobs.get_mut(&job_id) {
            Some(job) if !job.is_deleted() => {
                job.feedback_kind = Some(kind.as_str().to_string());
                job.feedback_text = text.map(str::to_string);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn fail_unfinished_tasks(
        &self,
        replica_id: &ReplicaId,
        message: &str,
    ) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.write();
        let mut touched = 0;
        for job in jobs.values_mut() {
            if job.replica_id == replica_id.as_str() && job.outcome().is_none() {
                job.error = Some(message.to_string());
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
