//! Background task that drives one upstream generation into a stream.
//!
//! One fetch runs per job on the replica that created it. It appends every
//! decoded chunk to the job's [`DurableStream`], persists the terminal
//! outcome, and removes the registry entry once the outcome is durable.

use std::sync::Arc;

use futures::StreamExt;
use layoutgen_core::types::JobId;
use layoutgen_db::TaskOutcomeWriter;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::api::{GenerationApi, GenerationApiError, GenerationRequest};
use crate::decode::Utf8ChunkDecoder;
use crate::registry::StreamRegistry;
use crate::stream::{AbortReason, DurableStream, StreamError};

/// Why a fetch ended without producing output.
#[derive(Debug, thiserror::Error)]
enum FetchError {
    #[error(transparent)]
    Api(#[from] GenerationApiError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    /// The stream's abort signal fired (explicit cancel or shutdown).
    #[error("interrupted")]
    Interrupted,
}

/// Starts upstream fetches and tracks them until they finish.
pub struct UpstreamFetcher {
    api: Arc<GenerationApi>,
    registry: Arc<StreamRegistry>,
    outcomes: Arc<dyn TaskOutcomeWriter>,
    /// Parent of every stream's token.
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl UpstreamFetcher {
    pub fn new(
        api: Arc<GenerationApi>,
        registry: Arc<StreamRegistry>,
        outcomes: Arc<dyn TaskOutcomeWriter>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            api,
            registry,
            outcomes,
            shutdown,
            tracker: TaskTracker::new(),
        }
    }

    /// Register a fresh stream for `job_id` and start fetching into it.
    ///
    /// The stream is registered before this returns, so a subscriber that
    /// arrives right after job creation always finds it.
    pub fn start(&self, job_id: JobId, request: GenerationRequest) -> DurableStream {
        let stream = DurableStream::new(self.shutdown.child_token());
        self.registry.register(job_id, stream.clone());

        let task = FetchTask {
            job_id,
            api: Arc::clone(&self.api),
            outcomes: Arc::clone(&self.outcomes),
            shutdown: self.shutdown.clone(),
            stream: stream.clone(),
            _entry: RegistryEntry {
                registry: Arc::clone(&self.registry),
                job_id,
            },
        };

        let span = tracing::info_span!("generation_fetch", %job_id);
        self.tracker.spawn(task.run(request).instrument(span));
        stream
    }

    /// Number of fetches still running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting work and wait for running fetches to wind down.
    /// Returns `false` if they did not finish within `timeout`.
    pub async fn drain(&self, timeout: std::time::Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait()).await.is_ok()
    }
}

/// Removes the registry entry when the fetch task ends, however it ends.
struct RegistryEntry {
    registry: Arc<StreamRegistry>,
    job_id: JobId,
}

impl Drop for RegistryEntry {
    fn drop(&mut self) {
        self.registry.unregister(self.job_id);
    }
}

struct FetchTask {
    job_id: JobId,
    api: Arc<GenerationApi>,
    outcomes: Arc<dyn TaskOutcomeWriter>,
    shutdown: CancellationToken,
    stream: DurableStream,
    _entry: RegistryEntry,
}

impl FetchTask {
    async fn run(self, request: GenerationRequest) {
        tracing::info!("Generation started");
        let token = self.stream.token().clone();

        let result = tokio::select! {
            biased;
            () = token.cancelled() => Err(FetchError::Interrupted),
            result = self.pump(&request) => result,
        };

        // Complete before persisting so a cancel arriving during the write
        // cannot be observed as the outcome. If the signal already fired,
        // the job ends as interrupted instead.
        let result = result.and_then(|output| {
            if self.stream.mark_complete() {
                Ok(output)
            } else {
                Err(FetchError::Interrupted)
            }
        });

        match result {
            Ok(output) => {
                self.persist(self.outcomes.record_output(self.job_id, &output).await);
                tracing::info!(bytes = output.len(), "Generation finished");
            }
            Err(FetchError::Interrupted) if self.shutdown.is_cancelled() => {
                // Left unfinished; the restart sweep settles it.
                self.stream.abort(AbortReason::Shutdown);
                tracing::info!("Generation interrupted by shutdown");
            }
            Err(FetchError::Interrupted) => {
                self.stream.abort(AbortReason::Canceled);
                self.persist(self.outcomes.record_canceled(self.job_id).await);
                tracing::info!("Generation canceled");
            }
            Err(e) => {
                let message = e.to_string();
                if let FetchError::Api(GenerationApiError::ApiError { status, body }) = &e {
                    tracing::warn!(status, body = %body, "Generation API rejected request");
                }
                self.stream.abort(AbortReason::Failed(message.clone()));
                self.persist(self.outcomes.record_error(self.job_id, &message).await);
                tracing::warn!(error = %message, "Generation failed");
            }
        }
    }

    /// Read the upstream body to the end, appending decoded text as it
    /// arrives. Returns the full output.
    async fn pump(&self, request: &GenerationRequest) -> Result<String, FetchError> {
        let response = self.api.open_stream(request).await?;
        let mut body = response.bytes_stream();
        let mut decoder = Utf8ChunkDecoder::new();
        let mut output = String::new();

        while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(GenerationApiError::from)?;
            let text = decoder.decode(&bytes);
            if !text.is_empty() {
                output.push_str(&text);
                self.stream.append(text)?;
            }
        }

        let rest = decoder.finish();
        if !rest.is_empty() {
            output.push_str(&rest);
            self.stream.append(rest)?;
        }
        Ok(output)
    }

    fn persist(&self, result: Result<bool, layoutgen_db::StoreError>) {
        match result {
            Ok(true) => {}
            Ok(false) => tracing::debug!("Task outcome already recorded"),
            Err(e) => tracing::error!(error = %e, "Failed to persist task outcome"),
        }
    }
}
