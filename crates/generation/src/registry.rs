//! Process-wide map from job id to the live stream fed by this replica.

use std::collections::HashMap;

use layoutgen_core::types::JobId;
use parking_lot::RwLock;

use crate::stream::{AbortReason, DurableStream};

/// Streams whose upstream fetch is still running on this replica.
///
/// An entry exists from job creation until its fetch finishes (after the
/// outcome has been persisted), so a miss here means "ask the database".
#[derive(Default)]
pub struct StreamRegistry {
    streams: RwLock<HashMap<JobId, DurableStream>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, job_id: JobId, stream: DurableStream) {
        self.streams.write().insert(job_id, stream);
    }

    pub fn lookup(&self, job_id: JobId) -> Option<DurableStream> {
        self.streams.read().get(&job_id).cloned()
    }

    pub fn unregister(&self, job_id: JobId) -> Option<DurableStream> {
        self.streams.write().remove(&job_id)
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry and abort its stream. Used at shutdown for fetches
    /// that did not wind down in time.
    pub fn abort_all(&self, reason: AbortReason) -> usize {
        let drained: Vec<DurableStream> = self.streams.write().drain().map(|(_, s)| s).collect();
        for stream in &drained {
            stream.abort(reason.clone());
        }
        drained.len()
    }
}

#[cfg(test)]
mod tests {
    use layoutgen_core::types::new_job_id;
    use tokio_util::sync::CancellationToken;

    use super::*;

    #[test]
    fn register_lookup_unregister() {
        let registry = StreamRegistry::new();
        let id = new_job_id();
        let stream = DurableStream::new(CancellationToken::new());
        stream.append("x").unwrap();

        registry.register(id, stream);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup(id).unwrap().chunk(0).as_deref(), Some("x"));
        assert!(registry.lookup(new_job_id()).is_none());

        assert!(registry.unregister(id).is_some());
        assert!(registry.lookup(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn abort_all_empties_and_aborts() {
        let registry = StreamRegistry::new();
        let stream = DurableStream::new(CancellationToken::new());
        registry.register(new_job_id(), stream.clone());

        assert_eq!(registry.abort_all(AbortReason::Shutdown), 1);
        assert!(registry.is_empty());
        assert_eq!(stream.snapshot().abort, Some(AbortReason::Shutdown));
    }
}
