/// Jobs and generation tasks are keyed by opaque UUIDs (v7, time-ordered).
pub type JobId = uuid::Uuid;

/// User references come from the external identity provider and are opaque.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, time-ordered job identifier.
pub fn new_job_id() -> JobId {
    uuid::Uuid::now_v7()
}
