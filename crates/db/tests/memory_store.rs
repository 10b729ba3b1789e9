//! Behaviour of the in-memory job store.
//!
//! These mirror the guarantees of the SQL repositories: single terminal
//! outcome, soft-delete hiding, per-user listing, and the restart sweep.

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use layoutgen_core::generation::{FeedbackKind, GenerationFlags, TaskOutcome};
use layoutgen_core::replica::ReplicaId;
use layoutgen_core::status::JobStatus;
use layoutgen_db::memory::{new_detail, MemoryJobStore};
use layoutgen_db::models::job::{JobListQuery, NewJob};
use layoutgen_db::{JobStore, TaskOutcomeWriter, TaskStateReader};

fn new_job(user: Option<&str>, replica: &str, prompt: &str) -> NewJob {
    NewJob {
        user_id: user.map(str::to_string),
        replica_id: ReplicaId::new(replica),
        prompt: prompt.to_string(),
        flags: None,
    }
}

// ---------------------------------------------------------------------------
// Test: created jobs are running and readable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_then_find_returns_running_job() {
    let store = MemoryJobStore::new();
    let mut input = new_job(Some("u1"), "a", "blue dashboard");
    input.flags = Some(GenerationFlags {
        vibe: Some("calm".into()),
        ..Default::default()
    });

    let created = store.create_job(input).await.unwrap();
    let found = store.find_job(created.id).await.unwrap().expect("job exists");

    assert_eq!(found.prompt, "blue dashboard");
    assert_eq!(found.status(), JobStatus::Running);
    assert_eq!(found.replica_id, "a");
    assert_eq!(found.flags.unwrap().0.vibe.as_deref(), Some("calm"));
}

// ---------------------------------------------------------------------------
// Test: only the first outcome sticks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn outcome_is_recorded_at_most_once() {
    let store = MemoryJobStore::new();
    let job = store.create_job(new_job(None, "a", "p")).await.unwrap();

    assert!(store.record_output(job.id, "{}").await.unwrap());
    assert!(!store.record_error(job.id, "late failure").await.unwrap());
    assert!(!store.record_canceled(job.id).await.unwrap());

    let state = store.task_state(job.id).await.unwrap().unwrap();
    assert_eq!(state.outcome, Some(TaskOutcome::Output("{}".into())));
}

#[tokio::test]
async fn outcome_for_unknown_job_is_not_recorded() {
    let store = MemoryJobStore::new();
    assert!(!store.record_canceled(uuid::Uuid::now_v7()).await.unwrap());
}

// ---------------------------------------------------------------------------
// Test: soft delete hides the job but keeps the row
// ---------------------------------------------------------------------------

#[tokio::test]
async fn soft_deleted_job_is_hidden() {
    let store = MemoryJobStore::new();
    let job = store.create_job(new_job(Some("u1"), "a", "p")).await.unwrap();

    assert!(store.soft_delete_job(job.id).await.unwrap());
    assert!(!store.soft_delete_job(job.id).await.unwrap());

    assert!(store.find_job(job.id).await.unwrap().is_none());
    assert!(store.task_state(job.id).await.unwrap().is_none());
    assert!(store.get_raw(job.id).unwrap().deleted_at.is_some());
}

// ---------------------------------------------------------------------------
// Test: listing is per user, newest first, paginated
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_is_scoped_to_user_and_paginated() {
    let store = MemoryJobStore::new();
    let base = Utc::now() - Duration::hours(1);
    for i in 0..12 {
        let mut job = new_detail(new_job(Some("u1"), "a", &format!("prompt {i}")), base);
        job.created_at = base + Duration::seconds(i);
        store.insert(job);
    }
    store.create_job(new_job(Some("u2"), "a", "other")).await.unwrap();

    let first = store.list_jobs("u1", &JobListQuery { page: Some(1) }).await.unwrap();
    assert_eq!(first.jobs.len(), 10);
    assert_eq!(first.jobs[0].prompt, "prompt 11");
    assert_eq!(first.pagination.total, 12);
    assert_eq!(first.pagination.total_pages, 2);
    assert!(first.pagination.has_next);

    let second = store.list_jobs("u1", &JobListQuery { page: Some(2) }).await.unwrap();
    assert_eq!(second.jobs.len(), 2);
    assert_eq!(second.jobs[1].prompt, "prompt 0");
    assert!(second.pagination.has_prev);
}

// ---------------------------------------------------------------------------
// Test: quota counting includes deleted jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn count_includes_soft_deleted_jobs() {
    let store = MemoryJobStore::new();
    let job = store.create_job(new_job(Some("u1"), "a", "p")).await.unwrap();
    store.create_job(new_job(Some("u1"), "a", "q")).await.unwrap();
    store.soft_delete_job(job.id).await.unwrap();

    let now = Utc::now();
    let count = store
        .count_jobs_created_between("u1", now - Duration::days(1), now + Duration::days(1))
        .await
        .unwrap();
    assert_eq!(count, 2);
}

// ---------------------------------------------------------------------------
// Test: feedback
// ---------------------------------------------------------------------------

#[tokio::test]
async fn feedback_is_stored_on_live_jobs_only() {
    let store = MemoryJobStore::new();
    let job = store.create_job(new_job(Some("u1"), "a", "p")).await.unwrap();

    assert!(store
        .set_feedback(job.id, FeedbackKind::Positive, Some("nice"))
        .await
        .unwrap());
    let found = store.find_job(job.id).await.unwrap().unwrap();
    assert_eq!(found.feedback_kind.as_deref(), Some("positive"));
    assert_eq!(found.feedback_text.as_deref(), Some("nice"));

    store.soft_delete_job(job.id).await.unwrap();
    assert!(!store
        .set_feedback(job.id, FeedbackKind::Negative, None)
        .await
        .unwrap());
}

// ---------------------------------------------------------------------------
// Test: restart sweep only touches this replica's unfinished tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sweep_fails_only_own_unfinished_tasks() {
    let store = MemoryJobStore::new();
    let mine = store.create_job(new_job(None, "a", "p")).await.unwrap();
    let done = store.create_job(new_job(None, "a", "q")).await.unwrap();
    let theirs = store.create_job(new_job(None, "b", "r")).await.unwrap();
    store.record_output(done.id, "{}").await.unwrap();

    let touched = store
        .fail_unfinished_tasks(&ReplicaId::new("a"), "interrupted")
        .await
        .unwrap();
    assert_eq!(touched, 1);

    let state = store.task_state(mine.id).await.unwrap().unwrap();
    assert_matches!(state.outcome, Some(TaskOutcome::Error(msg)) if msg == "interrupted");
    let state = store.task_state(done.id).await.unwrap().unwrap();
    assert_matches!(state.outcome, Some(TaskOutcome::Output(_)));
    let state = store.task_state(theirs.id).await.unwrap().unwrap();
    assert_eq!(state.outcome, None);
}
