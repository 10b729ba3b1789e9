//! Narrow persistence interfaces used by the rest of the service.
//!
//! The upstream fetcher only ever writes outcomes ([`TaskOutcomeWriter`]),
//! the cross-replica router only ever reads owner + outcome
//! ([`TaskStateReader`]), and the HTTP layer uses the full [`JobStore`].

use std::sync::Arc;

use async_trait::async_trait;
use layoutgen_core::generation::FeedbackKind;
use layoutgen_core::replica::ReplicaId;
use layoutgen_core::types::{JobId, Timestamp};

use crate::models::job::{JobDetail, JobListQuery, JobPage, NewJob, TaskState};

/// Errors from a job store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Writes the terminal outcome of a generation task.
///
/// Each method returns `true` if it recorded the outcome and `false` if the
/// task had already finished (or does not exist). Outcomes are never
/// overwritten.
#[async_trait]
pub trait TaskOutcomeWriter: Send + Sync {
    async fn record_output(&self, job_id: JobId, output: &str) -> Result<bool, StoreError>;

    async fn record_error(&self, job_id: JobId, error: &str) -> Result<bool, StoreError>;

    async fn record_canceled(&self, job_id: JobId) -> Result<bool, StoreError>;
}

/// Reads the routing-relevant state of a job's generation task.
#[async_trait]
pub trait TaskStateReader: Send + Sync {
    /// `None` if the job does not exist or was soft-deleted.
    async fn task_state(&self, job_id: JobId) -> Result<Option<TaskState>, StoreError>;
}

/// Full job CRUD used by the HTTP handlers.
#[async_trait]
pub trait JobStore: TaskOutcomeWriter + TaskStateReader {
    async fn create_job(&self, input: NewJob) -> Result<JobDetail, StoreError>;

    /// `None` if the job does not exist or was soft-deleted.
    async fn find_job(&self, job_id: JobId) -> Result<Option<JobDetail>, StoreError>;

    async fn list_jobs(&self, user_id: &str, params: &JobListQuery) -> Result<JobPage, StoreError>;

    /// Jobs created by `user_id` in `[from, until)`, soft-deleted ones included.
    async fn count_jobs_created_between(
        &self,
        user_id: &str,
        from: Timestamp,
        until: Timestamp,
    ) -> Result<i64, StoreError>;

    /// Returns `true` if a live job was marked deleted.
    async fn soft_delete_job(&self, job_id: JobId) -> Result<bool, StoreError>;

    /// Returns `false` if the job does not exist or was soft-deleted.
    async fn set_feedback(
        &self,
        job_id: JobId,
        kind: FeedbackKind,
        text: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Mark every unfinished task owned by `replica_id` as failed with
    /// `message`. Returns how many tasks were touched.
    async fn fail_unfinished_tasks(
        &self,
        replica_id: &ReplicaId,
        message: &str,
    ) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// One concrete store, viewed through each of the narrow interfaces.
#[derive(Clone)]
pub struct StoreHandles {
    pub jobs: Arc<dyn JobStore>,
    pub outcomes: Arc<dyn TaskOutcomeWriter>,
    pub task_states: Arc<dyn TaskStateReader>,
}

impl StoreHandles {
    pub fn new<S: JobStore + 'static>(store: Arc<S>) -> Self {
        Self {
            jobs: store.clone(),
            outcomes: store.clone(),
            task_states: store,
        }
    }
}
