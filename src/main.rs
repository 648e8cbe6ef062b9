use repo_triage::api::{self, AppState};
use repo_triage::config::AppConfig;
use repo_triage::db;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = Arc::new(AppConfig::from_env());

    let pool = match db::initialize(&config.db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!(error = %e, path = %config.db_path.display(), "failed to initialize database");
            std::process::exit(1);
        }
    };

    let app = api::router(AppState {
        db: pool,
        config: config.clone(),
    });

    let listener = match tokio::net::TcpListener::bind(config.listen_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, addr = %config.listen_addr, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %config.listen_addr, repos = config.repos.len(), "server listening");

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    if let Err(e) = server.await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }

    tracing::info!("server stopped");
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
