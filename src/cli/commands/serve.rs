use anyhow::Context;
use clap::Args;

use crate::config::{AppConfig, StorageBackend};
use crate::state::AppState;

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, help = "Keep all data in process memory instead of PostgreSQL")]
    pub memory: bool,

    #[arg(long, help = "Write default data before accepting requests")]
    pub seed: bool,
}

pub async fn handle(args: ServeArgs, mut config: AppConfig) -> anyhow::Result<()> {
    if args.memory {
        config.database.backend = StorageBackend::Memory;
    }
    let bind_addr = config.bind_addr();
    tracing::info!("Starting back-office API in {:?} mode", config.environment);

    let state = AppState::connect(config)
        .await
        .context("failed to open storage")?;
    if args.seed {
        crate::seed::run(&state.store).await.context("seeding failed")?;
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, crate::app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
