use sqlx::PgPool;
use tracing::info;

use crate::database::manager::DatabaseError;
use crate::entity::{self, EntityDescriptor, FieldDef};
use crate::filter::filter_where::quote_identifier;
use crate::filter::{Filter, FilterError};

/// `CREATE TABLE IF NOT EXISTS` for an entity's table
pub fn create_table_sql(entity: &EntityDescriptor) -> Result<String, FilterError> {
    Filter::validate_table_name(&entity.table)?;
    let columns: Vec<String> = entity.fields().iter().map(column_ddl).collect();
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(&entity.table),
        columns.join(", ")
    ))
}

fn column_ddl(field: &FieldDef) -> String {
    let name = quote_identifier(&field.name);
    match field.name.as_str() {
        entity::ID => format!("{} BIGSERIAL PRIMARY KEY", name),
        entity::CREATED_AT | entity::UPDATED_AT => format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", name),
        entity::IS_ACTIVE => format!("{} BOOLEAN NOT NULL DEFAULT TRUE", name),
        entity::IS_DELETED => format!("{} BOOLEAN NOT NULL DEFAULT FALSE", name),
        _ => {
            let mut ddl = format!("{} {}", name, field.kind.ddl_type());
            if field.required {
                ddl.push_str(" NOT NULL");
            }
            ddl
        }
    }
}

/// Creates the entity's table when missing
pub async fn ensure_table(pool: &PgPool, entity: &EntityDescriptor) -> Result<(), DatabaseError> {
    let sql = create_table_sql(entity)?;
    sqlx::query(&sql).execute(pool).await?;
    info!("Ensured table {} for entity {}", entity.table, entity.name);
    Ok(())
}
