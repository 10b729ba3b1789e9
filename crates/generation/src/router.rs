//! Decides where a job's live data can be read.
//!
//! Order of checks: this replica's registry, then the persisted task. A
//! finished task is served from the database on any replica; an unfinished
//! task owned by another replica is rerouted there; an unfinished task owned
//! by this replica but absent from the registry was orphaned by a restart.

use std::sync::Arc;

use layoutgen_core::generation::TaskOutcome;
use layoutgen_core::replica::ReplicaId;
use layoutgen_core::types::JobId;
use layoutgen_db::{StoreError, TaskStateReader};

use crate::registry::StreamRegistry;
use crate::stream::DurableStream;

/// Where a job's data lives.
#[derive(Debug)]
pub enum Route {
    /// Fetch still running on this replica.
    LocalActive(DurableStream),
    /// Task finished; the outcome is persisted.
    LocalTerminal(TaskOutcome),
    /// Task still running on another replica.
    Remote(ReplicaId),
}

/// Result of a routed operation: served here, or replay elsewhere.
#[derive(Debug)]
pub enum Routed<T> {
    Local(T),
    Reroute(ReplicaId),
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// Unknown or soft-deleted job.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Unfinished task owned by this replica with no live stream.
    #[error("Job {0} has no live stream on its owning replica")]
    Orphaned(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct JobRouter {
    registry: Arc<StreamRegistry>,
    task_states: Arc<dyn TaskStateReader>,
    replica_id: ReplicaId,
}

impl JobRouter {
    pub fn new(
        registry: Arc<StreamRegistry>,
        task_states: Arc<dyn TaskStateReader>,
        replica_id: ReplicaId,
    ) -> Self {
        Self {
            registry,
            task_states,
            replica_id,
        }
    }

    pub fn replica_id(&self) -> &ReplicaId {
        &self.replica_id
    }

    pub async fn resolve(&self, job_id: JobId) -> Result<Route, RouteError> {
        if let Some(stream) = self.registry.lookup(job_id) {
            return Ok(Route::LocalActive(stream));
        }

        let state = self
            .task_states
            .task_state(job_id)
            .await?
            .ok_or(RouteError::NotFound(job_id))?;

        if let Some(outcome) = state.outcome {
            return Ok(Route::LocalTerminal(outcome));
        }
        if state.replica_id != self.replica_id {
            return Ok(Route::Remote(state.replica_id));
        }

        tracing::warn!(%job_id, replica = %self.replica_id, "Unfinished job has no live stream");
        Err(RouteError::Orphaned(job_id))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use layoutgen_db::memory::{new_detail, MemoryJobStore};
    use layoutgen_db::models::job::NewJob;
    use layoutgen_db::TaskOutcomeWriter;
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn seed(store: &MemoryJobStore, replica: &str) -> JobId {
        let job = new_detail(
            NewJob {
                user_id: None,
                replica_id: ReplicaId::new(replica),
                prompt: "p".into(),
                flags: None,
            },
            Utc::now(),
        );
        let id = job.id;
        store.insert(job);
        id
    }

    fn router(store: Arc<MemoryJobStore>) -> (JobRouter, Arc<StreamRegistry>) {
        let registry = Arc::new(StreamRegistry::new());
        let router = JobRouter::new(Arc::clone(&registry), store, ReplicaId::new("a"));
        (router, registry)
    }

    #[tokio::test]
    async fn registry_hit_is_local_active() {
        let store = Arc::new(MemoryJobStore::new());
        let id = seed(&store, "a");
        let (router, registry) = router(store);
        registry.register(id, DurableStream::new(CancellationToken::new()));

        assert_matches!(router.resolve(id).await, Ok(Route::LocalActive(_)));
    }

    #[tokio::test]
    async fn finished_task_is_terminal_on_any_replica() {
        let store = Arc::new(MemoryJobStore::new());
        let id = seed(&store, "b");
        store.record_output(id, "{}").await.unwrap();
        let (router, _) = router(store);

        assert_matches!(
            router.resolve(id).await,
            Ok(Route::LocalTerminal(TaskOutcome::Output(o))) if o == "{}"
        );
    }

    #[tokio::test]
    async fn unfinished_foreign_task_is_remote() {
        let store = Arc::new(MemoryJobStore::new());
        let id = seed(&store, "b");
        let (router, _) = router(store);

        assert_matches!(router.resolve(id).await, Ok(Route::Remote(r)) if r.as_str() == "b");
    }

    #[tokio::test]
    async fn unfinished_own_task_without_stream_is_orphaned() {
        let store = Arc::new(MemoryJobStore::new());
        let id = seed(&store, "a");
        let (router, _) = router(store);

        assert_matches!(router.resolve(id).await, Err(RouteError::Orphaned(_)));
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let (router, _) = router(Arc::new(MemoryJobStore::new()));
        assert_matches!(
            router.resolve(uuid::Uuid::now_v7()).await,
            Err(RouteError::NotFound(_))
        );
    }
}
