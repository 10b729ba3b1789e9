//! Server-Sent Events framing for job subscriptions.
//!
//! Output: one `chunk` event per chunk (data is the chunk as a JSON string),
//! then `done`; or an `error` event as the last frame. Status: one `status`
//! event per distinct status.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use layoutgen_generation::{OutputStream, StatusStream, StreamError};
use serde::Serialize;

/// Payload of a terminal `error` event, shaped like the JSON error envelope.
#[derive(Debug, Serialize)]
struct ErrorFrame<'a> {
    error: &'a str,
    code: &'static str,
}

fn chunk_event(chunk: String) -> Result<Event, axum::Error> {
    Event::default().event("chunk").json_data(chunk)
}

fn error_event(err: &StreamError) -> Result<Event, axum::Error> {
    let message = err.to_string();
    let code = match err {
        StreamError::Canceled => "CANCELED",
        StreamError::Failed(_) | StreamError::Closed => "GENERATION_FAILED",
    };
    Event::default().event("error").json_data(ErrorFrame {
        error: &message,
        code,
    })
}

fn done_event() -> Result<Event, axum::Error> {
    Ok(Event::default().event("done").data(""))
}

/// Frame an output subscription. Ends after `done` or `error`.
pub fn output_events(
    output: OutputStream,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = stream::unfold(Some(output), |state| async move {
        let mut output = state?;
        match output.next().await {
            Some(Ok(chunk)) => Some((chunk_event(chunk), Some(output))),
            Some(Err(err)) => Some((error_event(&err), None)),
            None => Some((done_event(), None)),
        }
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Frame a status subscription.
pub fn status_events(
    statuses: StatusStream,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events =
        statuses.map(|status| Ok(Event::default().event("status").data(status.as_str())));
    Sse::new(events).keep_alive(KeepAlive::default())
}
