use serde_json::{Map, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::{quote_identifier, FilterWhere};
use super::types::{FilterData, FilterOrderInfo, SqlResult};
use crate::entity::{self, EntityDescriptor};

pub struct Filter<'a> {
    entity: &'a EntityDescriptor,
    select_columns: Vec<String>,
    where_data: Option<Value>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl<'a> Filter<'a> {
    pub fn new(entity: &'a EntityDescriptor) -> Result<Self, FilterError> {
        Self::validate_table_name(&entity.table)?;
        Ok(Self {
            entity,
            select_columns: vec![],
            where_data: None,
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(select) = data.select { self.select(select)?; }
        if let Some(where_clause) = data.where_clause { self.where_clause(where_clause)?; }
        if let Some(order) = data.order { self.order(&order)?; }
        if let Some(limit) = data.limit { self.limit(limit, data.offset)?; }
        Ok(self)
    }

    pub fn select(&mut self, columns: Vec<String>) -> Result<&mut Self, FilterError> {
        for column in &columns {
            if column != "*" && !self.entity.has_column(column) {
                return Err(FilterError::InvalidColumn(column.clone()));
            }
        }
        self.select_columns = columns;
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: Value) -> Result<&mut Self, FilterError> {
        FilterWhere::validate(&conditions)?;
        self.where_data = Some(conditions);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(self.entity, order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: i64, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if limit < 0 || offset.is_some_and(|o| o < 0) {
            return Err(FilterError::InvalidPaging(format!(
                "limit and offset must be non-negative, got {} and {:?}",
                limit, offset
            )));
        }
        self.limit = Some(limit);
        self.offset = offset;
        Ok(self)
    }

    /// SELECT returning one JSON object per row in a column named `row`
    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql(0)?;
        let order_clause = if self.order_data.is_empty() {
            format!("ORDER BY {} ASC", quote_identifier(entity::ID))
        } else {
            FilterOrder::generate(&self.order_data)
        };

        let inner = [
            format!("SELECT {}", self.build_select_clause()),
            format!("FROM {}", self.table()),
            format!("WHERE {}", where_clause),
            order_clause,
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult {
            query: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner),
            params,
        })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql(0)?;
        Ok(SqlResult {
            query: format!("SELECT COUNT(*) AS count FROM {} WHERE {}", self.table(), where_clause),
            params,
        })
    }

    /// UPDATE of every matching row, returning the updated rows as JSON.
    /// `updatedAt` is refreshed unless the patch sets it.
    pub fn to_update_sql(&self, patch: &Map<String, Value>) -> Result<SqlResult, FilterError> {
        let mut assignments = Vec::with_capacity(patch.len() + 1);
        let mut params = Vec::with_capacity(patch.len());

        let mut columns: Vec<_> = patch.iter().collect();
        columns.sort_by(|a, b| a.0.cmp(b.0));
        for (name, value) in columns {
            let column = self
                .entity
                .column(name)
                .ok_or_else(|| FilterError::InvalidColumn(name.clone()))?;
            params.push(value.clone());
            assignments.push(format!(
                "{} = ${}::{}",
                quote_identifier(&column.name),
                params.len(),
                column.kind.sql_cast()
            ));
        }

        if self.entity.has_column(entity::UPDATED_AT) && !patch.contains_key(entity::UPDATED_AT) {
            assignments.push(format!("{} = NOW()", quote_identifier(entity::UPDATED_AT)));
        }
        if assignments.is_empty() {
            return Err(FilterError::EmptyUpdate);
        }

        let (where_clause, where_params) = self.where_sql(params.len())?;
        params.extend(where_params);

        Ok(SqlResult {
            query: format!(
                "WITH updated AS (UPDATE {} SET {} WHERE {} RETURNING *) SELECT row_to_json(updated) AS row FROM updated ORDER BY {}",
                self.table(),
                assignments.join(", "),
                where_clause,
                quote_identifier(entity::ID)
            ),
            params,
        })
    }

    pub fn to_delete_sql(&self) -> Result<SqlResult, FilterError> {
        let (where_clause, params) = self.where_sql(0)?;
        Ok(SqlResult {
            query: format!("DELETE FROM {} WHERE {}", self.table(), where_clause),
            params,
        })
    }

    fn where_sql(&self, param_offset: usize) -> Result<(String, Vec<Value>), FilterError> {
        FilterWhere::generate(self.entity, self.where_data.as_ref(), param_offset)
    }

    fn table(&self) -> String {
        quote_identifier(&self.entity.table)
    }

    pub(crate) fn validate_table_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let first = chars
            .next()
            .ok_or_else(|| FilterError::InvalidTableName("Table name cannot be empty".to_string()))?;
        if !(first.is_ascii_alphabetic() || first == '_') || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)));
        }
        Ok(())
    }

    fn build_select_clause(&self) -> String {
        if self.select_columns.is_empty() || self.select_columns.iter().any(|c| c == "*") {
            "*".to_string()
        } else {
            self.select_columns.iter().map(|c| quote_identifier(c)).collect::<Vec<_>>().join(", ")
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
