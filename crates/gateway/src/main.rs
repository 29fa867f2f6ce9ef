use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use pf_gateway::api;
use pf_gateway::bootstrap::build_app_state;
use pf_gateway::config_loader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let (config, config_path) = config_loader::load()?;
    tracing::info!(config = %config_path.display(), "pairflow starting");

    let config = Arc::new(config);
    let state = build_app_state(config.clone()).await?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(addr = %addr, "listening");

    let app = api::router(&config.server).with_state(state.clone());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;

    // Flush both stores before exit; mutations persist eagerly, so this
    // is belt-and-braces for anything in flight.
    if let Err(e) = state.session_store.flush() {
        tracing::error!(error = %e, "session store flush failed");
    }
    let profile = state.profile.snapshot().await;
    if let Err(e) = state.profile_store.upsert(&profile) {
        tracing::error!(error = %e, "profile store flush failed");
    }
    tracing::info!("pairflow stopped");

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pf_gateway=debug")),
        )
        .json()
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("ctrl-c received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
