use std::net::SocketAddr;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zimage_api::config::ServerConfig;
use zimage_api::router::build_app_router;
use zimage_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "zimage_api=debug,zimage_model=info,zimage_worker=info,zimage_store=info,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(
        backend = ?config.backend,
        model = %config.model.repo_id,
        output_dir = %config.output_dir.display(),
        "Configuration loaded"
    );

    let loader = config.backend.loader();
    let host = config.host.clone();
    let port = config.port;
    let mcp_path = config.mcp_path.clone();

    let state = AppState::new(config, loader).expect("Failed to open output directory");

    // Load in the background; requests are served (and answered NotReady)
    // while the model is still loading.
    let _load = state.model.spawn_load();

    let app = build_app_router(state);

    let addr = SocketAddr::new(host.parse().expect("Invalid HOST"), port);
    tracing::info!(%addr, %mcp_path, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server shut down");
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
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
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
