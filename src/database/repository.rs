use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::pagination::{Page, PaginateOptions};
use crate::config::DatabaseConfig;
use crate::database::query_builder::{execute, fetch_count, fetch_records, QueryBuilder, QueryLogging};
use crate::database::record::{NewRecord, Patch, Record};
use crate::entity::{self, EntityDescriptor};
use crate::filter::{Filter, FilterData};

/// Generic data-access layer for one entity's table.
///
/// Performs no authorization and adds no implicit filter: soft-deleted rows
/// are returned unless the caller filters on `isDeleted`.
#[derive(Clone)]
pub struct Repository {
    pool: PgPool,
    entity: Arc<EntityDescriptor>,
    logging: QueryLogging,
}

impl Repository {
    pub fn new(pool: PgPool, entity: Arc<EntityDescriptor>, database: &DatabaseConfig) -> Self {
        Self {
            pool,
            entity,
            logging: QueryLogging::from(database),
        }
    }

    pub fn entity(&self) -> &EntityDescriptor {
        &self.entity
    }

    fn filter(&self, where_clause: Option<Value>) -> Result<Filter<'_>, DatabaseError> {
        let mut filter = Filter::new(&self.entity)?;
        if let Some(conditions) = where_clause {
            filter.where_clause(conditions)?;
        }
        Ok(filter)
    }

    pub async fn create_one(&self, record: NewRecord) -> Result<Record, DatabaseError> {
        let sql = QueryBuilder::new(&self.entity)?.insert_sql(std::slice::from_ref(record.values()), true)?;
        let mut rows = fetch_records(&self.pool, &sql, self.logging).await?;
        tracing::debug!("Created {} record", self.entity.name);
        rows.pop()
            .ok_or_else(|| DatabaseError::QueryError("INSERT returned no row".to_string()))
    }

    /// Inserts every record in one transaction and returns the inserted count
    pub async fn create_many(&self, records: Vec<NewRecord>) -> Result<u64, DatabaseError> {
        if records.is_empty() {
            return Ok(0);
        }
        let rows: Vec<Record> = records.into_iter().map(NewRecord::into_values).collect();
        let builder = QueryBuilder::new(&self.entity)?;
        let per_statement = builder.rows_per_statement(&rows);

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for chunk in rows.chunks(per_statement) {
            let sql = builder.insert_sql(chunk, false)?;
            inserted += execute(&mut *tx, &sql, self.logging).await?;
        }
        tx.commit().await?;

        tracing::info!("Inserted {} {} records", inserted, self.entity.name);
        Ok(inserted)
    }

    /// First match ordered by `id`
    pub async fn find_one(&self, where_clause: Option<Value>) -> Result<Option<Record>, DatabaseError> {
        let mut filter = self.filter(where_clause)?;
        filter.limit(1, None)?;
        let sql = filter.to_sql()?;
        Ok(fetch_records(&self.pool, &sql, self.logging).await?.into_iter().next())
    }

    pub async fn find_by_pk(&self, id: i64) -> Result<Option<Record>, DatabaseError> {
        self.find_one(Some(json!({ "id": id }))).await
    }

    /// One page of matches, or `None` when nothing matches at all.
    /// A page past the end yields empty `data`.
    pub async fn paginate(
        &self,
        where_clause: Option<Value>,
        options: &PaginateOptions,
    ) -> Result<Option<Page>, DatabaseError> {
        let total = self.count(where_clause.clone()).await?;
        if total == 0 {
            return Ok(None);
        }
        let offset = match options.offset() {
            Some(offset) if offset < total => offset,
            _ => return Ok(Some(Page::new(vec![], total, options))),
        };

        let sql = {
            let mut filter = Filter::new(&self.entity)?;
            filter.assign(FilterData {
                select: options.select.clone(),
                where_clause,
                order: options.sort.clone(),
                limit: Some(options.limit),
                offset: Some(offset),
            })?;
            filter.to_sql()?
        };

        let mut data = fetch_records(&self.pool, &sql, self.logging).await?;
        self.load_relations(&mut data, &options.include).await?;
        Ok(Some(Page::new(data, total, options)))
    }

    pub async fn count(&self, where_clause: Option<Value>) -> Result<i64, DatabaseError> {
        let sql = self.filter(where_clause)?.to_count_sql()?;
        fetch_count(&self.pool, &sql, self.logging).await
    }

    /// Applies the patch to every match; `None` when nothing matched
    pub async fn update(&self, where_clause: Option<Value>, patch: Patch) -> Result<Option<Vec<Record>>, DatabaseError> {
        let sql = self.filter(where_clause)?.to_update_sql(patch.values())?;
        let rows = fetch_records(&self.pool, &sql, self.logging).await?;
        if rows.is_empty() {
            return Ok(None);
        }
        tracing::debug!("Updated {} {} records", rows.len(), self.entity.name);
        Ok(Some(rows))
    }

    /// Physically removes one row. An unknown id removes nothing.
    pub async fn delete_by_pk(&self, id: i64) -> Result<u64, DatabaseError> {
        self.destroy(Some(json!({ "id": id }))).await
    }

    pub async fn destroy(&self, where_clause: Option<Value>) -> Result<u64, DatabaseError> {
        let sql = self.filter(where_clause)?.to_delete_sql()?;
        let removed = execute(&self.pool, &sql, self.logging).await?;
        tracing::debug!("Removed {} {} records", removed, self.entity.name);
        Ok(removed)
    }

    /// Attaches each requested to-one relation under its name, or `null`
    async fn load_relations(&self, records: &mut [Record], include: &[String]) -> Result<(), DatabaseError> {
        for name in include {
            let relation = self
                .entity
                .relation_named(name)
                .ok_or_else(|| DatabaseError::QueryError(format!("Unknown relation: {}", name)))?;

            let mut ids: Vec<i64> = records
                .iter()
                .filter_map(|r| r.get(&relation.foreign_key).and_then(Value::as_i64))
                .collect();
            ids.sort_unstable();
            ids.dedup();

            let mut related: HashMap<i64, Record> = HashMap::new();
            if !ids.is_empty() {
                let target = EntityDescriptor::new(relation.name.clone()).with_table(relation.table.clone());
                let sql = {
                    let mut filter = Filter::new(&target)?;
                    filter.where_clause(json!({ "id": ids }))?;
                    filter.to_sql()?
                };
                for row in fetch_records(&self.pool, &sql, self.logging).await? {
                    if let Some(id) = row.get(entity::ID).and_then(Value::as_i64) {
                        related.insert(id, row);
                    }
                }
            }

            for record in records.iter_mut() {
                let value = record
                    .get(&relation.foreign_key)
                    .and_then(Value::as_i64)
                    .and_then(|id| related.get(&id))
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null);
                record.insert(relation.name.clone(), value);
            }
        }
        Ok(())
    }
}
