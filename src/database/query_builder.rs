use serde_json::Value;
use sqlx::{self, postgres::{PgArguments, PgExecutor}, Row};
use std::time::{Duration, Instant};

use crate::config::DatabaseConfig;
use crate::database::manager::DatabaseError;
use crate::database::record::Record;
use crate::entity::{self, EntityDescriptor};
use crate::filter::filter_where::quote_identifier;
use crate::filter::{Filter, FilterError, SqlResult};

/// PostgreSQL caps a statement at 65535 bind parameters
const MAX_BIND_PARAMS: usize = 65_535;

/// SQL logging settings for the statement runners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryLogging {
    pub enabled: bool,
    pub slow_threshold_ms: u64,
}

impl From<&DatabaseConfig> for QueryLogging {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            enabled: config.enable_query_logging,
            slow_threshold_ms: config.slow_query_threshold_ms,
        }
    }
}

impl QueryLogging {
    fn statement(&self, sql: &SqlResult) {
        if self.enabled {
            tracing::debug!(query = %sql.query, params = ?sql.params, "Executing SQL");
        }
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed.as_millis() > u128::from(self.slow_threshold_ms)
    }

    fn finished(&self, started: Instant, query: &str) {
        let elapsed = started.elapsed();
        if self.is_slow(elapsed) {
            tracing::warn!("Slow query ({}ms > {}ms): {}", elapsed.as_millis(), self.slow_threshold_ms, query);
        }
    }
}

/// Builds INSERT statements for one entity
pub struct QueryBuilder<'a> {
    entity: &'a EntityDescriptor,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(entity: &'a EntityDescriptor) -> Result<Self, FilterError> {
        Filter::validate_table_name(&entity.table)?;
        Ok(Self { entity })
    }

    /// Columns that appear in at least one row, in declaration order.
    /// Timestamps are always set by the database.
    fn insert_columns(&self, rows: &[Record]) -> Vec<&'a entity::FieldDef> {
        self.entity
            .fields()
            .iter()
            .filter(|f| f.name != entity::CREATED_AT && f.name != entity::UPDATED_AT)
            .filter(|f| rows.iter().any(|row| row.contains_key(&f.name)))
            .collect()
    }

    /// Rows per statement so that no chunk exceeds the bind parameter limit
    pub fn rows_per_statement(&self, rows: &[Record]) -> usize {
        let width = self.insert_columns(rows).len().max(1);
        (MAX_BIND_PARAMS / width).max(1)
    }

    /// Multi-row INSERT. Missing values use the column DEFAULT.
    /// With `returning`, each inserted row comes back as JSON in `row`.
    pub fn insert_sql(&self, rows: &[Record], returning: bool) -> Result<SqlResult, FilterError> {
        if rows.is_empty() {
            return Err(FilterError::InvalidOperatorData("INSERT requires at least one row".to_string()));
        }

        let mut names: Vec<String> = Vec::new();
        let mut casts: Vec<Option<&str>> = Vec::new();
        for field in self.insert_columns(rows) {
            names.push(quote_identifier(&field.name));
            casts.push(Some(field.kind.sql_cast()));
        }
        for stamp in [entity::CREATED_AT, entity::UPDATED_AT] {
            if self.entity.has_column(stamp) {
                names.push(quote_identifier(stamp));
                casts.push(None);
            }
        }
        if names.is_empty() {
            // Every value defaulted: insert the key alone
            names.push(quote_identifier(entity::ID));
        }

        let columns = self.insert_columns(rows);
        let mut params = Vec::new();
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(names.len());
            for (i, field) in columns.iter().enumerate() {
                match row.get(&field.name) {
                    Some(value) => {
                        params.push(value.clone());
                        values.push(format!("${}::{}", params.len(), casts[i].unwrap_or("text")));
                    }
                    None => values.push("DEFAULT".to_string()),
                }
            }
            values.extend(casts[columns.len()..].iter().map(|_| "NOW()".to_string()));
            if values.is_empty() {
                values.push("DEFAULT".to_string());
            }
            tuples.push(format!("({})", values.join(", ")));
        }

        let insert = format!(
            "INSERT INTO {} ({}) VALUES {}",
            quote_identifier(&self.entity.table),
            names.join(", "),
            tuples.join(", ")
        );
        let query = if returning {
            format!(
                "WITH inserted AS ({} RETURNING *) SELECT row_to_json(inserted) AS row FROM inserted ORDER BY {}",
                insert,
                quote_identifier(entity::ID)
            )
        } else {
            insert
        };
        Ok(SqlResult { query, params })
    }
}

/// Runs a statement whose rows carry one JSON object in a `row` column
pub async fn fetch_records<'e, E>(executor: E, sql: &SqlResult, logging: QueryLogging) -> Result<Vec<Record>, DatabaseError>
where
    E: PgExecutor<'e>,
{
    logging.statement(sql);
    let started = Instant::now();
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param(q, p);
    }
    let rows = q.fetch_all(executor).await?;
    logging.finished(started, &sql.query);

    rows.into_iter()
        .map(|row| match row.try_get::<Value, _>("row")? {
            Value::Object(map) => Ok(map),
            other => Err(DatabaseError::QueryError(format!("expected a JSON object row, got {}", other))),
        })
        .collect()
}

/// Runs a `SELECT COUNT(*) AS count` statement
pub async fn fetch_count<'e, E>(executor: E, sql: &SqlResult, logging: QueryLogging) -> Result<i64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    logging.statement(sql);
    let started = Instant::now();
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param(q, p);
    }
    let row = q.fetch_one(executor).await?;
    logging.finished(started, &sql.query);
    let count: i64 = row.try_get("count")?;
    Ok(count)
}

/// Runs a statement and returns the affected row count
pub async fn execute<'e, E>(executor: E, sql: &SqlResult, logging: QueryLogging) -> Result<u64, DatabaseError>
where
    E: PgExecutor<'e>,
{
    logging.statement(sql);
    let started = Instant::now();
    let mut q = sqlx::query(&sql.query);
    for p in sql.params.iter() {
        q = bind_param(q, p);
    }
    let result = q.execute(executor).await?;
    logging.finished(started, &sql.query);
    Ok(result.rows_affected())
}

/// Placeholders carry an explicit cast, so each JSON value binds as its
/// natural Postgres type and the server converts it.
fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Membership lists: a text[] the placeholder casts to the column's array type
        Value::Array(items) => q.bind(items.iter().map(array_element).collect::<Vec<Option<String>>>()),
        Value::Object(_) => q.bind(v.to_string()),
    }
}

fn array_element(item: &Value) -> Option<String> {
    match item {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
