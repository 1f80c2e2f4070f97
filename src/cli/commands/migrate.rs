use anyhow::{bail, Context};

use crate::config::{AppConfig, StorageBackend};
use crate::database::DatabaseManager;

pub async fn handle(config: AppConfig) -> anyhow::Result<()> {
    if config.database.backend != StorageBackend::Postgres {
        bail!("migrations only apply to the postgres backend");
    }

    let db = DatabaseManager::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    db.migrate().await.context("migration failed")?;
    db.close().await;

    tracing::info!("Migrations applied");
    Ok(())
}
