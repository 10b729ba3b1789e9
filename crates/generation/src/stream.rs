//! In-memory durable stream of generated text chunks.
//!
//! A [`DurableStream`] is written by exactly one upstream fetch and read by
//! any number of subscribers. Chunks are append-only with stable indices, so
//! a subscriber can attach at any time and replay from index 0.
//!
//! Change notification uses a [`Notify`]: every mutation bumps a version
//! counter under the state lock and then wakes all current waiters. Waiters
//! arm their `Notified` future *before* comparing versions, so a change that
//! lands between the check and the await is never lost.

use std::sync::Arc;

use layoutgen_core::status::JobStatus;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Why a stream stopped before completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Explicit cancel request for this job.
    Canceled,
    /// The process is shutting down.
    Shutdown,
    /// The upstream request failed with this message.
    Failed(String),
}

/// Terminal failures seen by writers and subscribers of a stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// Write attempted after completion or abort.
    #[error("stream is closed")]
    Closed,

    #[error("canceled")]
    Canceled,

    #[error("{0}")]
    Failed(String),
}

impl From<AbortReason> for StreamError {
    fn from(reason: AbortReason) -> Self {
        match reason {
            AbortReason::Canceled | AbortReason::Shutdown => StreamError::Canceled,
            AbortReason::Failed(message) => StreamError::Failed(message),
        }
    }
}

/// Point-in-time view of a stream's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Bumped on every append, completion, and abort.
    pub version: u64,
    pub len: usize,
    pub final_len: Option<usize>,
    pub abort: Option<AbortReason>,
}

impl Snapshot {
    pub fn is_complete(&self) -> bool {
        self.final_len.is_some()
    }

    /// Coarse status: completion wins over abort, since a completed stream
    /// can no longer be aborted.
    pub fn status(&self) -> JobStatus {
        match (&self.final_len, &self.abort) {
            (Some(_), _) => JobStatus::Finished,
            (None, Some(AbortReason::Failed(_))) => JobStatus::Error,
            (None, Some(_)) => JobStatus::Canceled,
            (None, None) => JobStatus::Running,
        }
    }
}

#[derive(Default)]
struct State {
    chunks: Vec<String>,
    final_len: Option<usize>,
    abort: Option<AbortReason>,
    version: u64,
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
    /// Child of the process shutdown token; cancelled by explicit cancel,
    /// by shutdown, or by [`DurableStream::abort`].
    cancel: CancellationToken,
}

/// Shared handle to one job's chunk buffer. Cloning is cheap.
#[derive(Clone)]
pub struct DurableStream {
    inner: Arc<Inner>,
}

impl DurableStream {
    /// Create an empty stream whose abort signal is `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::default()),
                notify: Notify::new(),
                cancel,
            }),
        }
    }

    /// Append a chunk and wake every waiter.
    pub fn append(&self, chunk: impl Into<String>) -> Result<(), StreamError> {
        {
            let mut state = self.inner.state.lock();
            if state.final_len.is_some() || state.abort.is_some() {
                return Err(StreamError::Closed);
            }
            state.chunks.push(chunk.into());
            state.version += 1;
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }

    /// Freeze the chunk count as the final length. Returns `false` if the
    /// stream had already completed or been aborted, or if its abort signal
    /// has fired: readers may already have seen it as canceled.
    pub fn mark_complete(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.final_len.is_some()
                || state.abort.is_some()
                || self.inner.cancel.is_cancelled()
            {
                return false;
            }
            state.final_len = Some(state.chunks.len());
            state.version += 1;
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// Abort the stream. The first reason wins; aborting a completed stream
    /// does nothing. Returns whether this call aborted the stream.
    pub fn abort(&self, reason: AbortReason) -> bool {
        {
            let mut state = self.inner.state.lock();
            if state.final_len.is_some() || state.abort.is_some() {
                return false;
            }
            state.abort = Some(reason);
            state.version += 1;
        }
        self.inner.cancel.cancel();
        self.inner.notify.notify_waiters();
        true
    }

    /// Request cancellation of the fetch feeding this stream.
    ///
    /// The fetcher observes the token, records the cancellation, and aborts
    /// the stream; subscribers see the stream as aborted right away.
    pub fn cancel(&self) {
        self.inner.cancel.cancel();
    }

    /// The stream's combined abort signal.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.cancel
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.inner.state.lock();
        let abort = match (&state.abort, &state.final_len) {
            (Some(reason), _) => Some(reason.clone()),
            // Signal fired but the fetcher has not reacted yet.
            (None, None) if self.inner.cancel.is_cancelled() => Some(AbortReason::Canceled),
            (None, _) => None,
        };
        Snapshot {
            version: state.version,
            len: state.chunks.len(),
            final_len: state.final_len,
            abort,
        }
    }

    /// Chunk at `index`, if it has been appended.
    pub fn chunk(&self, index: usize) -> Option<String> {
        self.inner.state.lock().chunks.get(index).cloned()
    }

    /// Wait until the stream changes after the state observed as `seen`
    /// (a [`Snapshot::version`]), or until its abort signal fires.
    ///
    /// Returns immediately if a change already happened. One-shot: call
    /// again with a fresh version after each wake-up.
    pub async fn wait_for_change(&self, seen: u64) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.inner.state.lock().version != seen || self.inner.cancel.is_cancelled() {
            return;
        }

        tokio::select! {
            () = &mut notified => {}
            () = self.inner.cancel.cancelled() => {}
        }
    }
}

impl std::fmt::Debug for DurableStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStream")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}
