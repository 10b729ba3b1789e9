pub mod customer;
pub mod jobs;
