use std::net::SocketAddr;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use layoutgen_api::config::ServerConfig;
use layoutgen_api::router::build_app_router;
use layoutgen_api::startup;
use layoutgen_generation::SHUTDOWN_GRACE;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "layoutgen_api=debug,layoutgen_generation=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        replica_id = %config.replica_id,
        "Loaded server configuration",
    );

    // --- Job store ---
    let store = startup::open_store(&config)
        .await
        .expect("Failed to open job store");

    // --- Restart sweep (before any fetch can start) ---
    startup::sweep_interrupted_tasks(store.jobs.as_ref(), &config.replica_id)
        .await
        .expect("Failed to sweep interrupted tasks");

    // --- App state ---
    let shutdown = CancellationToken::new();
    let entitlements = startup::build_entitlements(&config);
    let state = startup::build_state(config.clone(), store, entitlements, shutdown.clone());
    let runtime = state.runtime.clone();

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    // Cancelling the token on signal ends open subscriptions, which lets
    // the server stop waiting on their connections.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");
    runtime.shutdown(SHUTDOWN_GRACE).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM, then fire `shutdown`.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }

    shutdown.cancel();
}
