//! Subscriber-side views over a [`DurableStream`] or a persisted outcome.
//!
//! Each subscriber keeps its own cursor, so any number of them can read the
//! same stream independently. Both views end silently when the subscriber's
//! own token is cancelled (client went away).

use futures::stream::{self, BoxStream, StreamExt};
use layoutgen_core::generation::TaskOutcome;
use layoutgen_core::status::JobStatus;
use tokio_util::sync::CancellationToken;

use crate::stream::{DurableStream, StreamError};

/// Chunks of a job's output, ending with `Err` if the job failed or was
/// canceled.
pub type OutputStream = BoxStream<'static, Result<String, StreamError>>;

/// Distinct consecutive statuses of a job, ending after the first terminal one.
pub type StatusStream = BoxStream<'static, JobStatus>;

struct OutputCursor {
    stream: DurableStream,
    cancel: CancellationToken,
    next: usize,
    done: bool,
}

/// Replay every chunk from index 0, then follow live appends until the
/// stream completes or aborts.
pub fn subscribe_output(stream: DurableStream, cancel: CancellationToken) -> OutputStream {
    let cursor = OutputCursor {
        stream,
        cancel,
        next: 0,
        done: false,
    };
    stream::unfold(cursor, next_output).boxed()
}

async fn next_output(
    mut c: OutputCursor,
) -> Option<(Result<String, StreamError>, OutputCursor)> {
    loop {
        if c.done || c.cancel.is_cancelled() {
            return None;
        }

        let snap = c.stream.snapshot();
        if c.next < snap.len {
            if let Some(chunk) = c.stream.chunk(c.next) {
                c.next += 1;
                return Some((Ok(chunk), c));
            }
        }
        if snap.is_complete() {
            return None;
        }
        if let Some(reason) = snap.abort {
            c.done = true;
            return Some((Err(reason.into()), c));
        }

        tokio::select! {
            () = c.stream.wait_for_change(snap.version) => {}
            () = c.cancel.cancelled() => return None,
        }
    }
}

struct StatusCursor {
    stream: DurableStream,
    cancel: CancellationToken,
    last: Option<JobStatus>,
    done: bool,
}

/// Project a live stream onto `running` / `finished` / `canceled` / `error`.
pub fn subscribe_status(stream: DurableStream, cancel: CancellationToken) -> StatusStream {
    let cursor = StatusCursor {
        stream,
        cancel,
        last: None,
        done: false,
    };
    stream::unfold(cursor, next_status).boxed()
}

async fn next_status(mut c: StatusCursor) -> Option<(JobStatus, StatusCursor)> {
    loop {
        if c.done || c.cancel.is_cancelled() {
            return None;
        }

        let snap = c.stream.snapshot();
        let status = snap.status();
        if c.last != Some(status) {
            c.last = Some(status);
            c.done = status.is_terminal();
            return Some((status, c));
        }

        tokio::select! {
            () = c.stream.wait_for_change(snap.version) => {}
            () = c.cancel.cancelled() => return None,
        }
    }
}

/// Output view of a job that already finished: the whole output as a single
/// chunk, or the terminal failure.
pub fn replay_output(outcome: TaskOutcome) -> OutputStream {
    let item = match outcome {
        TaskOutcome::Output(output) if output.is_empty() => None,
        TaskOutcome::Output(output) => Some(Ok(output)),
        TaskOutcome::Error(message) => Some(Err(StreamError::Failed(message))),
        TaskOutcome::Canceled => Some(Err(StreamError::Canceled)),
    };
    stream::iter(item).boxed()
}

/// Status view of a job that already finished.
pub fn replay_status(outcome: &TaskOutcome) -> StatusStream {
    stream::iter([outcome.status()]).boxed()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::stream::AbortReason;

    fn stream() -> DurableStream {
        DurableStream::new(CancellationToken::new())
    }

    async fn collect<T>(s: BoxStream<'static, T>) -> Vec<T> {
        tokio::time::timeout(Duration::from_secs(2), s.collect::<Vec<_>>())
            .await
            .expect("subscription ended")
    }

    // -----------------------------------------------------------------------
    // Test: replay of completed streams
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn completed_stream_replays_all_chunks_then_ends() {
        let s = stream();
        for chunk in ["a", "b", "c"] {
            s.append(chunk).unwrap();
        }
        s.mark_complete();

        let items = collect(subscribe_output(s, CancellationToken::new())).await;
        assert_eq!(
            items,
            vec![Ok("a".to_string()), Ok("b".to_string()), Ok("c".to_string())]
        );
    }

    #[tokio::test]
    async fn late_subscriber_sees_identical_sequence() {
        let s = stream();
        let early = subscribe_output(s.clone(), CancellationToken::new());
        let early = tokio::spawn(collect(early));

        s.append("x").unwrap();
        tokio::task::yield_now().await;
        s.append("y").unwrap();
        s.mark_complete();

        let late = collect(subscribe_output(s, CancellationToken::new())).await;
        let early = early.await.unwrap();
        assert_eq!(early, late);
        assert_eq!(late.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Test: aborts
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn abort_yields_buffered_chunks_then_error() {
        let s = stream();
        s.append("partial").unwrap();
        s.abort(AbortReason::Failed("API request failed: 500".into()));

        let items = collect(subscribe_output(s, CancellationToken::new())).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], Ok("partial".to_string()));
        assert_matches!(&items[1], Err(StreamError::Failed(m)) if m == "API request failed: 500");
    }

    #[tokio::test]
    async fn abort_wakes_waiting_subscriber() {
        let s = stream();
        let sub = tokio::spawn(collect(subscribe_output(s.clone(), CancellationToken::new())));
        tokio::task::yield_now().await;

        s.abort(AbortReason::Canceled);
        let items = sub.await.unwrap();
        assert_eq!(items, vec![Err(StreamError::Canceled)]);
    }

    #[tokio::test]
    async fn subscriber_cancel_ends_silently() {
        let s = stream();
        s.append("a").unwrap();
        let cancel = CancellationToken::new();
        let mut sub = subscribe_output(s, cancel.clone());

        assert_eq!(sub.next().await, Some(Ok("a".to_string())));
        cancel.cancel();
        assert_eq!(sub.next().await, None);
    }

    // -----------------------------------------------------------------------
    // Test: status projection
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn status_runs_then_finishes_without_duplicates() {
        let s = stream();
        let mut sub = subscribe_status(s.clone(), CancellationToken::new());
        assert_eq!(sub.next().await, Some(JobStatus::Running));

        let rest = tokio::spawn(collect(sub));
        s.append("a").unwrap();
        tokio::task::yield_now().await;
        s.append("b").unwrap();
        s.mark_complete();

        assert_eq!(rest.await.unwrap(), vec![JobStatus::Finished]);
    }

    #[tokio::test]
    async fn status_reports_error_for_failed_abort() {
        let s = stream();
        s.abort(AbortReason::Failed("boom".into()));
        let statuses = collect(subscribe_status(s, CancellationToken::new())).await;
        assert_eq!(statuses, vec![JobStatus::Error]);
    }

    #[tokio::test]
    async fn status_reports_canceled_for_shutdown() {
        let s = stream();
        s.abort(AbortReason::Shutdown);
        let statuses = collect(subscribe_status(s, CancellationToken::new())).await;
        assert_eq!(statuses, vec![JobStatus::Canceled]);
    }

    // -----------------------------------------------------------------------
    // Test: persisted outcome replay
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn replay_of_persisted_outcomes() {
        let out = collect(replay_output(TaskOutcome::Output("{}".into()))).await;
        assert_eq!(out, vec![Ok("{}".to_string())]);

        let out = collect(replay_output(TaskOutcome::Error("x".into()))).await;
        assert_eq!(out, vec![Err(StreamError::Failed("x".into()))]);

        let out = collect(replay_output(TaskOutcome::Canceled)).await;
        assert_eq!(out, vec![Err(StreamError::Canceled)]);

        let statuses = collect(replay_status(&TaskOutcome::Canceled)).await;
        assert_eq!(statuses, vec![JobStatus::Canceled]);
    }
}
