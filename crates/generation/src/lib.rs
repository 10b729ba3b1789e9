//! Live generation: upstream fetches, durable in-memory streams, and
//! routing of readers to the replica that owns a job.

pub mod api;
pub mod decode;
pub mod fetcher;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod stream;
pub mod subscription;

pub use api::{GenerationApi, GenerationApiError, GenerationRequest};
pub use router::{Route, RouteError, Routed};
pub use runtime::{CancelOutcome, GenerationRuntime, SHUTDOWN_GRACE};
pub use stream::{AbortReason, DurableStream, StreamError};
pub use subscription::{OutputStream, StatusStream};
