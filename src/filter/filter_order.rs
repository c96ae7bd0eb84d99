use serde_json::Value;

use super::error::FilterError;
use super::filter_where::quote_identifier;
use super::types::{FilterOrderInfo, SortDirection};
use crate::entity::EntityDescriptor;

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"info desc"`, `["info desc", "id"]` or `{ "info": "desc", "id": 1 }`.
    /// Every column must belong to the entity.
    pub fn validate_and_parse(entity: &EntityDescriptor, order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let parsed = match order {
            Value::Null => vec![],
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)),
                        other => {
                            return Err(FilterError::InvalidOperatorData(format!(
                                "sort entries must be strings, got {}",
                                other
                            )))
                        }
                    }
                }
                out
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (column, direction) in obj {
                    out.push(FilterOrderInfo {
                        column: column.clone(),
                        sort: Self::parse_direction(direction)?,
                    });
                }
                out
            }
            other => {
                return Err(FilterError::InvalidOperatorData(format!(
                    "unsupported sort specification: {}",
                    other
                )))
            }
        };

        for info in &parsed {
            if !entity.has_column(&info.column) {
                return Err(FilterError::InvalidColumn(info.column.clone()));
            }
        }
        Ok(parsed)
    }

    fn parse_direction(direction: &Value) -> Result<SortDirection, FilterError> {
        match direction {
            Value::String(s) if s.eq_ignore_ascii_case("desc") => Ok(SortDirection::Desc),
            Value::String(s) if s.eq_ignore_ascii_case("asc") => Ok(SortDirection::Asc),
            Value::Number(n) if n.as_i64() == Some(-1) => Ok(SortDirection::Desc),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(SortDirection::Asc),
            other => Err(FilterError::InvalidOperatorData(format!(
                "sort direction must be asc, desc, 1 or -1, got {}",
                other
            ))),
        }
    }

    fn parse_order_string(s: &str) -> Vec<FilterOrderInfo> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let dir = it.next().unwrap_or("asc");
                let sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                out.push(FilterOrderInfo { column: col.to_string(), sort });
            }
        }
        out
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() { return String::new(); }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("{} {}", quote_identifier(&i.column), i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_every_sort_shape() {
        let entity = EntityDescriptor::basics();

        let infos = FilterOrder::validate_and_parse(&entity, &json!("info desc, id")).unwrap();
        assert_eq!(FilterOrder::generate(&infos), "ORDER BY \"info\" DESC, \"id\" ASC");

        let infos = FilterOrder::validate_and_parse(&entity, &json!(["createdAt DESC"])).unwrap();
        assert_eq!(FilterOrder::generate(&infos), "ORDER BY \"createdAt\" DESC");

        let infos = FilterOrder::validate_and_parse(&entity, &json!({ "id": -1 })).unwrap();
        assert_eq!(infos, vec![FilterOrderInfo { column: "id".into(), sort: SortDirection::Desc }]);

        let infos = FilterOrder::validate_and_parse(&entity, &json!({ "db": "asc" })).unwrap();
        assert_eq!(infos[0].sort, SortDirection::Asc);
    }

    #[test]
    fn rejects_unknown_columns_and_directions() {
        let entity = EntityDescriptor::basics();
        assert!(matches!(
            FilterOrder::validate_and_parse(&entity, &json!("name desc")),
            Err(FilterError::InvalidColumn(c)) if c == "name"
        ));
        assert!(FilterOrder::validate_and_parse(&entity, &json!({ "id": "sideways" })).is_err());
        assert!(FilterOrder::validate_and_parse(&entity, &json!(42)).is_err());
    }

    #[test]
    fn empty_order_generates_nothing() {
        let entity = EntityDescriptor::basics();
        let infos = FilterOrder::validate_and_parse(&entity, &Value::Null).unwrap();
        assert_eq!(FilterOrder::generate(&infos), "");
    }
}
