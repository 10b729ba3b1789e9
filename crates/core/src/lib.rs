pub mod error;
pub mod generation;
pub mod quota;
pub mod replica;
pub mod status;
pub mod types;
