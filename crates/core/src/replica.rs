//! Replica identity and the edge reroute convention.
//!
//! Every process is one of several stateless replicas behind a network edge.
//! A job's in-memory stream only exists on the replica that created it, so
//! requests landing elsewhere are bounced back to the edge with a replay
//! instruction naming the owner.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Response header the network edge inspects to replay a request.
pub const REPLAY_HEADER: &str = "fly-replay";

/// Identifier of a single replica (process) of the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReplicaId(String);

impl ReplicaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the [`REPLAY_HEADER`] that sends a request to this replica.
    pub fn replay_instruction(&self) -> String {
        format!("instance={}", self.0)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReplicaId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ReplicaId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
