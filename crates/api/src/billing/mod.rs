//! Payments-provider entitlements and the monthly request quota.

pub mod entitlements;
pub mod quota;
