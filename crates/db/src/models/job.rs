//! Job and generation task models and DTOs.

use layoutgen_core::generation::{status_of, GenerationFlags, TaskOutcome};
use layoutgen_core::replica::ReplicaId;
use layoutgen_core::status::JobStatus;
use layoutgen_core::types::{JobId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Jobs per page in listings.
pub const PAGE_SIZE: i64 = 10;

/// A job joined with its generation task (`jobs` ⋈ `generation_tasks`).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobDetail {
    pub id: JobId,
    pub user_id: Option<UserId>,
    pub created_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub feedback_kind: Option<String>,
    pub feedback_text: Option<String>,
    pub generation_task_id: JobId,
    pub replica_id: String,
    pub prompt: String,
    pub flags: Option<Json<GenerationFlags>>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub canceled: bool,
}

impl JobDetail {
    pub fn outcome(&self) -> Option<TaskOutcome> {
        TaskOutcome::from_columns(self.output.clone(), self.error.clone(), self.canceled)
    }

    pub fn status(&self) -> JobStatus {
        status_of(self.outcome().as_ref())
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether `user_id` may modify this job. Anonymous jobs (no owner) are
    /// open to any authenticated caller.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        match self.user_id.as_deref() {
            Some(owner) => owner == user_id,
            None => true,
        }
    }

    pub fn task_state(&self) -> TaskState {
        TaskState {
            replica_id: ReplicaId::new(self.replica_id.clone()),
            outcome: self.outcome(),
        }
    }
}

/// The only task fields the cross-replica router needs: who owns the
/// in-memory stream, and whether the task already finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskState {
    pub replica_id: ReplicaId,
    pub outcome: Option<TaskOutcome>,
}

/// Insert DTO for a new job and its generation task.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub user_id: Option<UserId>,
    pub replica_id: ReplicaId,
    pub prompt: String,
    pub flags: Option<GenerationFlags>,
}

/// A row of the job listing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub prompt: String,
    pub created_at: Timestamp,
}

/// Query parameters for `GET /api/v1/jobs`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobListQuery {
    /// 1-based page number. Defaults to 1.
    pub page: Option<i64>,
}

impl JobListQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * PAGE_SIZE
    }
}

/// Pagination metadata returned alongside a page of jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = (total + limit - 1) / limit;
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

/// One page of a user's jobs.
#[derive(Debug, Clone, Serialize)]
pub struct JobPage {
    pub jobs: Vec<JobSummary>,
    pub pagination: Pagination,
}
