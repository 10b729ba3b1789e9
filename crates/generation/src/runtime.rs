//! Per-process owner of the registry, fetcher, and router.
//!
//! Created once at startup and shared with the HTTP layer behind an `Arc`.
//! Holds the process shutdown token every stream's abort signal derives from.

use std::sync::Arc;
use std::time::Duration;

use layoutgen_core::replica::ReplicaId;
use layoutgen_core::types::JobId;
use layoutgen_db::{TaskOutcomeWriter, TaskStateReader};
use tokio_util::sync::CancellationToken;

use crate::api::{GenerationApi, GenerationRequest};
use crate::fetcher::UpstreamFetcher;
use crate::registry::StreamRegistry;
use crate::router::{JobRouter, Route, RouteError, Routed};
use crate::stream::{AbortReason, DurableStream};
use crate::subscription::{
    replay_output, replay_status, subscribe_output, subscribe_status, OutputStream, StatusStream,
};

/// How long [`GenerationRuntime::shutdown`] waits for fetches to stop.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// What a cancel request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// A live fetch was signalled to stop.
    Requested,
    /// The job had already finished.
    AlreadyFinished,
}

pub struct GenerationRuntime {
    registry: Arc<StreamRegistry>,
    fetcher: UpstreamFetcher,
    router: JobRouter,
    shutdown: CancellationToken,
}

impl GenerationRuntime {
    pub fn new(
        api: Arc<GenerationApi>,
        outcomes: Arc<dyn TaskOutcomeWriter>,
        task_states: Arc<dyn TaskStateReader>,
        replica_id: ReplicaId,
        shutdown: CancellationToken,
    ) -> Self {
        let registry = Arc::new(StreamRegistry::new());
        let fetcher = UpstreamFetcher::new(api, Arc::clone(&registry), outcomes, shutdown.clone());
        let router = JobRouter::new(Arc::clone(&registry), task_states, replica_id);
        Self {
            registry,
            fetcher,
            router,
            shutdown,
        }
    }

    pub fn replica_id(&self) -> &ReplicaId {
        self.router.replica_id()
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Token for one subscriber. Fires at shutdown so open subscriptions
    /// end and the server can drain.
    pub fn subscriber_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }

    /// Start generating for a freshly persisted job.
    pub fn start(&self, job_id: JobId, request: GenerationRequest) -> DurableStream {
        self.fetcher.start(job_id, request)
    }

    pub async fn resolve(&self, job_id: JobId) -> Result<Route, RouteError> {
        self.router.resolve(job_id).await
    }

    /// Output subscription for `job_id`, ending when `cancel` fires.
    pub async fn output(
        &self,
        job_id: JobId,
        cancel: CancellationToken,
    ) -> Result<Routed<OutputStream>, RouteError> {
        Ok(match self.router.resolve(job_id).await? {
            Route::LocalActive(stream) => Routed::Local(subscribe_output(stream, cancel)),
            Route::LocalTerminal(outcome) => Routed::Local(replay_output(outcome)),
            Route::Remote(replica) => Routed::Reroute(replica),
        })
    }

    /// Status subscription for `job_id`, ending when `cancel` fires.
    pub async fn status(
        &self,
        job_id: JobId,
        cancel: CancellationToken,
    ) -> Result<Routed<StatusStream>, RouteError> {
        Ok(match self.router.resolve(job_id).await? {
            Route::LocalActive(stream) => Routed::Local(subscribe_status(stream, cancel)),
            Route::LocalTerminal(outcome) => Routed::Local(replay_status(&outcome)),
            Route::Remote(replica) => Routed::Reroute(replica),
        })
    }

    /// Stop the fetch for `job_id` if it runs here.
    pub async fn cancel(&self, job_id: JobId) -> Result<Routed<CancelOutcome>, RouteError> {
        Ok(match self.router.resolve(job_id).await? {
            // Output is final; the fetch is only persisting it.
            Route::LocalActive(stream) if stream.snapshot().is_complete() => {
                Routed::Local(CancelOutcome::AlreadyFinished)
            }
            Route::LocalActive(stream) => {
                stream.cancel();
                tracing::info!(%job_id, "Cancel requested");
                Routed::Local(CancelOutcome::Requested)
            }
            Route::LocalTerminal(_) => Routed::Local(CancelOutcome::AlreadyFinished),
            Route::Remote(replica) => Routed::Reroute(replica),
        })
    }

    /// Cancel every stream, wait for fetches to stop, then abort leftovers.
    pub async fn shutdown(&self, grace: Duration) {
        tracing::info!(active = self.fetcher.active(), "Shutting down generation runtime");
        self.shutdown.cancel();

        if !self.fetcher.drain(grace).await {
            let aborted = self.registry.abort_all(AbortReason::Shutdown);
            tracing::warn!(aborted, "Fetches did not stop in time");
        }

        tracing::info!("Generation runtime shut down complete");
    }
}
