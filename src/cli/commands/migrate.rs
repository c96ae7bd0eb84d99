use anyhow::Context;
use serde_json::json;

use crate::cli::{utils::output_success, OutputFormat};
use crate::config::config;
use crate::database::{ddl, DatabaseManager};
use crate::entity::EntityRegistry;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::connect(&config().database)
        .await
        .context("failed to connect to database")?;

    let mut tables = Vec::new();
    for entity in EntityRegistry::builtin().iter() {
        ddl::ensure_table(&pool, entity)
            .await
            .with_context(|| format!("failed to create table for {}", entity.name))?;
        tables.push(entity.table.clone());
    }
    pool.close().await;

    output_success(
        &output_format,
        &format!("Ensured {} table(s): {}", tables.len(), tables.join(", ")),
        Some(json!({ "tables": tables })),
    )
}
