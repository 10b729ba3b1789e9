//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod generation_task_repo;
pub mod job_repo;

pub use generation_task_repo::GenerationTaskRepo;
pub use job_repo::JobRepo;
