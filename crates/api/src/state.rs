use std::sync::Arc;

use layoutgen_db::JobStore;
use layoutgen_generation::GenerationRuntime;

use crate::billing::quota::QuotaService;
use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Job persistence (PostgreSQL or in-memory).
    pub jobs: Arc<dyn JobStore>,
    /// Live streams, upstream fetches, and cross-replica routing.
    pub runtime: Arc<GenerationRuntime>,
    /// Monthly request quota and entitlements.
    pub quota: Arc<QuotaService>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
