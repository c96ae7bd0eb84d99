use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::FilterOp;
use crate::entity::{EntityDescriptor, FieldDef, FieldKind};

/// Translates a JSON filter object into a parameterized WHERE clause.
///
/// Every bound parameter is cast to its column's type, so JSON scalars bind
/// the same way whatever their JSON type. `param_offset` is the number of
/// placeholders already used by the enclosing statement.
pub struct FilterWhere<'a> {
    entity: &'a EntityDescriptor,
    param_offset: usize,
    param_values: Vec<Value>,
}

impl<'a> FilterWhere<'a> {
    pub fn new(entity: &'a EntityDescriptor, param_offset: usize) -> Self {
        Self {
            entity,
            param_offset,
            param_values: vec![],
        }
    }

    /// Absent or empty filters produce `1=1`
    pub fn generate(
        entity: &'a EntityDescriptor,
        where_data: Option<&Value>,
        param_offset: usize,
    ) -> Result<(String, Vec<Value>), FilterError> {
        let mut filter_where = Self::new(entity, param_offset);
        let clause = match where_data {
            None | Some(Value::Null) => None,
            Some(data) => filter_where.build(data)?,
        };
        Ok((clause.unwrap_or_else(|| "1=1".to_string()), filter_where.param_values))
    }

    pub fn validate(where_data: &Value) -> Result<(), FilterError> {
        match where_data {
            Value::Null | Value::Object(_) => Ok(()),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// Conjunction of every condition in the object; `None` when it has none
    fn build(&mut self, where_data: &Value) -> Result<Option<String>, FilterError> {
        let obj = where_data
            .as_object()
            .ok_or_else(|| FilterError::InvalidWhereClause("WHERE must be an object".to_string()))?;

        let mut conditions = Vec::with_capacity(obj.len());
        for (key, value) in sorted(obj) {
            let sql = if key.starts_with('$') {
                self.logical_operator(key, value)?
            } else {
                self.field_condition(key, value)?
            };
            conditions.push(sql);
        }

        if conditions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(conditions.join(" AND ")))
        }
    }

    fn logical_operator(&mut self, op: &str, value: &Value) -> Result<String, FilterError> {
        match op {
            "$and" | "$or" => {
                let items: Vec<&Value> = match value {
                    Value::Array(arr) => arr.iter().collect(),
                    Value::Object(_) => vec![value],
                    _ => {
                        return Err(FilterError::InvalidOperatorData(format!(
                            "{} requires an array of objects",
                            op
                        )))
                    }
                };

                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(sql) = self.build(item)? {
                        parts.push(format!("({})", sql));
                    }
                }

                let (joiner, empty) = if op == "$and" { (" AND ", "1=1") } else { (" OR ", "1=0") };
                if parts.is_empty() {
                    Ok(empty.to_string())
                } else {
                    Ok(format!("({})", parts.join(joiner)))
                }
            }
            "$not" => match self.build(value)? {
                Some(sql) => Ok(format!("NOT ({})", sql)),
                // NOT of an always-true filter
                None => Ok("1=0".to_string()),
            },
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn field_condition(&mut self, field: &str, value: &Value) -> Result<String, FilterError> {
        let entity = self.entity;
        let column = entity
            .column(field)
            .ok_or_else(|| FilterError::InvalidColumn(field.to_string()))?;

        match value {
            Value::Object(ops) => self.operator_conditions(column, ops),
            Value::Array(values) => Ok(self.in_list(column, values, false)),
            Value::Null => Ok(format!("{} IS NULL", quote(column))),
            scalar => Ok(format!("{} = {}", quote(column), self.param(column, scalar))),
        }
    }

    fn operator_conditions(&mut self, column: &FieldDef, ops: &Map<String, Value>) -> Result<String, FilterError> {
        let mut parts = Vec::with_capacity(ops.len());
        for (op_key, data) in sorted(ops) {
            let op = FilterOp::parse(op_key)
                .ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
            parts.push(self.operator_condition(column, op, data)?);
        }
        if parts.is_empty() {
            return Ok("1=1".to_string());
        }
        Ok(parts.join(" AND "))
    }

    fn operator_condition(&mut self, column: &FieldDef, op: FilterOp, data: &Value) -> Result<String, FilterError> {
        let quoted = quote(column);
        match op {
            FilterOp::Eq | FilterOp::In => match data {
                Value::Null => Ok(format!("{} IS NULL", quoted)),
                Value::Array(values) => Ok(self.in_list(column, values, false)),
                scalar => Ok(format!("{} = {}", quoted, self.param(column, scalar))),
            },
            FilterOp::Ne | FilterOp::NIn => match data {
                Value::Null => Ok(format!("{} IS NOT NULL", quoted)),
                Value::Array(values) => Ok(self.in_list(column, values, true)),
                scalar => Ok(format!("{} <> {}", quoted, self.param(column, scalar))),
            },
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let scalar = require_scalar(op, data)?;
                let cmp = op.comparison().unwrap_or("=");
                Ok(format!("{} {} {}", quoted, cmp, self.param(column, scalar)))
            }
            FilterOp::Like | FilterOp::ILike => {
                if column.kind != FieldKind::String {
                    return Err(FilterError::InvalidOperatorData(format!(
                        "{:?} is only supported on string columns, not '{}'",
                        op, column.name
                    )));
                }
                let pattern = data.as_str().ok_or_else(|| {
                    FilterError::InvalidOperatorData(format!("{:?} requires a string pattern", op))
                })?;
                let cmp = op.comparison().unwrap_or("LIKE");
                Ok(format!("{} {} {}", quoted, cmp, self.param(column, &Value::String(pattern.to_string()))))
            }
            FilterOp::Between => match data {
                Value::Array(values) if values.len() == 2 => {
                    let low = self.param(column, &values[0]);
                    let high = self.param(column, &values[1]);
                    Ok(format!("{} BETWEEN {} AND {}", quoted, low, high))
                }
                _ => Err(FilterError::InvalidOperatorData(
                    "$between requires an array with exactly 2 values".to_string(),
                )),
            },
            FilterOp::Null => match data {
                Value::Bool(true) => Ok(format!("{} IS NULL", quoted)),
                Value::Bool(false) => Ok(format!("{} IS NOT NULL", quoted)),
                _ => Err(FilterError::InvalidOperatorData("$null requires a boolean".to_string())),
            },
        }
    }

    /// The whole list binds as one array parameter, however long it is
    fn in_list(&mut self, column: &FieldDef, values: &[Value], negate: bool) -> String {
        if values.is_empty() {
            return if negate { "1=1" } else { "1=0" }.to_string();
        }
        self.param_values.push(Value::Array(values.to_vec()));
        let placeholder = format!(
            "${}::{}[]",
            self.param_offset + self.param_values.len(),
            column.kind.sql_cast()
        );
        if negate {
            format!("{} <> ALL({})", quote(column), placeholder)
        } else {
            format!("{} = ANY({})", quote(column), placeholder)
        }
    }

    fn param(&mut self, column: &FieldDef, value: &Value) -> String {
        self.param_values.push(value.clone());
        format!(
            "${}::{}",
            self.param_offset + self.param_values.len(),
            column.kind.sql_cast()
        )
    }
}

/// Keys in a stable order so generated SQL does not depend on map ordering
fn sorted(obj: &Map<String, Value>) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = obj.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn require_scalar(op: FilterOp, data: &Value) -> Result<&Value, FilterError> {
    match data {
        Value::Null | Value::Array(_) | Value::Object(_) => Err(FilterError::InvalidOperatorData(
            format!("{:?} requires a scalar value", op),
        )),
        scalar => Ok(scalar),
    }
}

pub(crate) fn quote(column: &FieldDef) -> String {
    quote_identifier(&column.name)
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
