use anyhow::Context;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::config::{AppConfig, StorageBackend};
use crate::state::AppState;

pub async fn handle(config: AppConfig, output_format: OutputFormat) -> anyhow::Result<()> {
    if config.database.backend == StorageBackend::Memory {
        tracing::warn!("Seeding the memory backend; data is discarded when this command exits");
    }

    let state = AppState::connect(config)
        .await
        .context("failed to open storage")?;
    let summary = crate::seed::run(&state.store).await.context("seeding failed")?;

    match output_format {
        OutputFormat::Json => println!(
            "{}",
            json!({
                "menu_items": summary.menu_items,
                "configurations": summary.configurations,
                "permissions": summary.permissions,
                "roles": summary.roles,
            })
        ),
        OutputFormat::Text => {
            println!("Menu items created:    {}", summary.menu_items);
            println!("Configurations saved:  {}", summary.configurations);
            println!("Permissions created:   {}", summary.permissions);
            println!("Roles synced:          {}", summary.roles);
        }
    }
    Ok(())
}
