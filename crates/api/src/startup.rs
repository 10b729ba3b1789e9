//! Process bootstrap: store selection, state assembly, and the restart
//! sweep.

use std::sync::Arc;

use layoutgen_core::replica::ReplicaId;
use layoutgen_db::memory::MemoryJobStore;
use layoutgen_db::pg::PgJobStore;
use layoutgen_db::{JobStore, StoreError, StoreHandles};
use layoutgen_generation::{GenerationApi, GenerationRuntime};
use tokio_util::sync::CancellationToken;

use crate::billing::entitlements::{
    CachedEntitlements, EntitlementProvider, NoEntitlements, PaymentsApi, ENTITLEMENT_CACHE_TTL,
};
use crate::billing::quota::QuotaService;
use crate::config::ServerConfig;
use crate::state::AppState;

/// Error recorded on tasks this replica owned when it last stopped.
pub const INTERRUPTED_MESSAGE: &str = "interrupted: replica restarted before the job finished";

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Open the configured job store: PostgreSQL when `DATABASE_URL` is set,
/// otherwise an in-memory store.
pub async fn open_store(config: &ServerConfig) -> Result<StoreHandles, StartupError> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, keeping jobs in memory");
        return Ok(StoreHandles::new(Arc::new(MemoryJobStore::new())));
    };

    let pool = layoutgen_db::create_pool(database_url).await?;
    tracing::info!("Database connection pool created");

    layoutgen_db::health_check(&pool).await?;
    tracing::info!("Database health check passed");

    layoutgen_db::run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(StoreHandles::new(Arc::new(PgJobStore::new(pool))))
}

/// Entitlement provider from configuration, cached for
/// [`ENTITLEMENT_CACHE_TTL`].
pub fn build_entitlements(config: &ServerConfig) -> Arc<dyn EntitlementProvider> {
    match &config.entitlements {
        Some(cfg) => Arc::new(CachedEntitlements::new(
            PaymentsApi::new(cfg.api_url.clone(), cfg.api_token.clone(), cfg.benefit_id.clone()),
            ENTITLEMENT_CACHE_TTL,
        )),
        None => {
            tracing::warn!("ENTITLEMENTS_API_URL not set, nobody holds the app benefit");
            Arc::new(NoEntitlements)
        }
    }
}

/// Fail every unfinished task this replica owns. Run before serving, while
/// the registry is still empty, so no live fetch is touched.
pub async fn sweep_interrupted_tasks(
    jobs: &dyn JobStore,
    replica_id: &ReplicaId,
) -> Result<u64, StoreError> {
    let swept = jobs.fail_unfinished_tasks(replica_id, INTERRUPTED_MESSAGE).await?;
    if swept > 0 {
        tracing::warn!(swept, replica_id = %replica_id, "Marked interrupted tasks as failed");
    }
    Ok(swept)
}

/// Assemble the shared handler state.
pub fn build_state(
    config: ServerConfig,
    store: StoreHandles,
    entitlements: Arc<dyn EntitlementProvider>,
    shutdown: CancellationToken,
) -> AppState {
    let api = GenerationApi::new(
        config.generation.api_url.clone(),
        config.generation.api_key.clone(),
    );
    let runtime = GenerationRuntime::new(
        Arc::new(api),
        store.outcomes,
        store.task_states,
        config.replica_id.clone(),
        shutdown,
    );
    let quota = QuotaService::new(Arc::clone(&store.jobs), entitlements);

    AppState {
        jobs: store.jobs,
        runtime: Arc::new(runtime),
        quota: Arc::new(quota),
        config: Arc::new(config),
    }
}
