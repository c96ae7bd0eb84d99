//! Payload and filter-request checks applied by handlers before any
//! data-access call. Messages name the offending path, e.g.
//! `"info" must be a string` or `"options.page" must be a number`.

use chrono::{DateTime, NaiveDate};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::entity::{self, EntityDescriptor, FieldDef, FieldKind};

#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaMode {
    /// Required fields must be present and non-null
    Create,
    /// Any subset of fields; an integer `id` is accepted
    Update,
}

/// Checks a create/update payload against the entity's writable fields.
/// Unknown and system-managed keys are tolerated; they are dropped later.
pub fn validate_payload(
    entity: &EntityDescriptor,
    payload: &Map<String, Value>,
    mode: SchemaMode,
) -> Result<(), ValidationError> {
    if mode == SchemaMode::Update {
        if let Some(id) = payload.get(entity::ID) {
            if !id.is_i64() {
                return Err(ValidationError::new(format!("\"{}\" must be a number", entity::ID)));
            }
        }
    }

    for field in entity.writable_fields() {
        match payload.get(&field.name) {
            None | Some(Value::Null) if mode == SchemaMode::Create && field.required => {
                return Err(ValidationError::new(format!("\"{}\" is required", field.name)));
            }
            None => {}
            Some(value) => check_value(field, value, &field.name)?,
        }
    }
    Ok(())
}

fn check_value(field: &FieldDef, value: &Value, path: &str) -> Result<(), ValidationError> {
    if value.is_null() {
        // String columns accept null like they accept ""
        if field.nullable || field.kind == FieldKind::String {
            return Ok(());
        }
        return Err(ValidationError::new(format!("\"{}\" must be a {}", path, field.kind.label())));
    }
    if is_scalar_of(field.kind, value) {
        Ok(())
    } else {
        Err(ValidationError::new(format!("\"{}\" must be a {}", path, field.kind.label())))
    }
}

fn is_scalar_of(kind: FieldKind, value: &Value) -> bool {
    match (kind, value) {
        (FieldKind::String, Value::String(_)) => true,
        (FieldKind::Integer, Value::Number(n)) => n.is_i64() || n.is_u64(),
        (FieldKind::Boolean, Value::Bool(_)) => true,
        (FieldKind::Timestamp, Value::String(s)) => parses_as_date(s),
        _ => false,
    }
}

fn parses_as_date(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok() || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Checks the shape of a list/count/bulk-update request body:
/// `query`/`where`/`filter` objects, `options`, `isCountOnly`, `include`
/// and `select`. Unknown top-level keys are tolerated.
pub fn validate_filter_request(entity: &EntityDescriptor, body: &Value) -> Result<(), ValidationError> {
    let body = match body {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        _ => return Err(ValidationError::new("\"value\" must be of type object")),
    };

    for key in ["query", "where", "filter"] {
        if let Some(conditions) = body.get(key) {
            validate_conditions(entity, conditions, key)?;
        }
    }

    if let Some(options) = body.get("options") {
        validate_options(entity, options)?;
    }

    if let Some(count_only) = body.get("isCountOnly") {
        if !count_only.is_boolean() {
            return Err(ValidationError::new("\"isCountOnly\" must be a boolean"));
        }
    }

    if let Some(include) = body.get("include") {
        validate_include(entity, include, "include")?;
    }

    if let Some(select) = body.get("select") {
        validate_select(entity, select, "select")?;
    }

    Ok(())
}

fn validate_conditions(entity: &EntityDescriptor, conditions: &Value, path: &str) -> Result<(), ValidationError> {
    let map = match conditions {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        _ => return Err(ValidationError::new(format!("\"{}\" must be of type object", path))),
    };

    for (key, value) in map {
        let field_path = format!("{}.{}", path, key);
        if key.starts_with('$') {
            if !(value.is_array() || value.is_object()) {
                return Err(ValidationError::new(format!("\"{}\" must be one of [array, object]", field_path)));
            }
            continue;
        }

        let field = match entity.column(key) {
            Some(field) => field,
            None => continue,
        };
        if field.name == entity::ID {
            continue;
        }
        let ok = value.is_null() || value.is_array() || value.is_object() || is_scalar_of(field.kind, value);
        if !ok {
            return Err(ValidationError::new(format!(
                "\"{}\" must be one of [array, {}, object]",
                field_path,
                field.kind.label()
            )));
        }
    }
    Ok(())
}

fn validate_options(entity: &EntityDescriptor, options: &Value) -> Result<(), ValidationError> {
    let map = match options {
        Value::Null => return Ok(()),
        Value::Object(map) => map,
        _ => return Err(ValidationError::new("\"options\" must be of type object")),
    };

    for key in ["page", "limit"] {
        if let Some(value) = map.get(key) {
            let n = value
                .as_i64()
                .ok_or_else(|| ValidationError::new(format!("\"options.{}\" must be a number", key)))?;
            if n < 1 {
                return Err(ValidationError::new(format!(
                    "\"options.{}\" must be greater than or equal to 1",
                    key
                )));
            }
        }
    }

    if let Some(sort) = map.get("sort") {
        if !(sort.is_string() || sort.is_array() || sort.is_object()) {
            return Err(ValidationError::new("\"options.sort\" must be one of [string, array, object]"));
        }
    }

    for key in ["include", "includes"] {
        if let Some(include) = map.get(key) {
            validate_include(entity, include, &format!("options.{}", key))?;
        }
    }

    if let Some(select) = map.get("select") {
        validate_select(entity, select, "options.select")?;
    }

    Ok(())
}

fn validate_include(entity: &EntityDescriptor, include: &Value, path: &str) -> Result<(), ValidationError> {
    let items = include
        .as_array()
        .ok_or_else(|| ValidationError::new(format!("\"{}\" must be an array", path)))?;
    for (i, item) in items.iter().enumerate() {
        let declared = item.as_str().map(|name| entity.relation_named(name).is_some()).unwrap_or(false);
        if !declared {
            return Err(ValidationError::new(format!(
                "\"{}[{}]\" must be a relation of {}",
                path, i, entity.name
            )));
        }
    }
    Ok(())
}

fn validate_select(entity: &EntityDescriptor, select: &Value, path: &str) -> Result<(), ValidationError> {
    let items = select
        .as_array()
        .ok_or_else(|| ValidationError::new(format!("\"{}\" must be an array", path)))?;
    for (i, item) in items.iter().enumerate() {
        let known = item.as_str().map(|name| entity.has_column(name)).unwrap_or(false);
        if !known {
            return Err(ValidationError::new(format!(
                "\"{}[{}]\" must be a column of {}",
                path, i, entity.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn create_accepts_strings_null_and_empty() {
        let basics = EntityDescriptor::basics();
        let payload = object(json!({ "info": "a", "db": "", "isActive": false, "unknown": [1] }));
        assert!(validate_payload(&basics, &payload, SchemaMode::Create).is_ok());

        let payload = object(json!({ "info": null }));
        assert!(validate_payload(&basics, &payload, SchemaMode::Create).is_ok());
    }

    #[test]
    fn create_rejects_wrong_kinds() {
        let basics = EntityDescriptor::basics();
        let err = validate_payload(&basics, &object(json!({ "info": 5 })), SchemaMode::Create).unwrap_err();
        assert_eq!(err.message, "\"info\" must be a string");

        let err = validate_payload(&basics, &object(json!({ "isDeleted": null })), SchemaMode::Create).unwrap_err();
        assert_eq!(err.message, "\"isDeleted\" must be a boolean");
    }

    #[test]
    fn system_columns_are_not_type_checked() {
        let basics = EntityDescriptor::basics();
        let payload = object(json!({ "addedBy": "someone", "createdAt": 12 }));
        assert!(validate_payload(&basics, &payload, SchemaMode::Create).is_ok());
    }

    #[test]
    fn required_fields_only_enforced_on_create() {
        let entity = EntityDescriptor::new("Notes")
            .field(FieldDef::string("title").required())
            .field(FieldDef::timestamp("due").nullable());

        let err = validate_payload(&entity, &Map::new(), SchemaMode::Create).unwrap_err();
        assert_eq!(err.message, "\"title\" is required");
        assert!(validate_payload(&entity, &Map::new(), SchemaMode::Update).is_ok());

        let payload = object(json!({ "title": "t", "due": "2024-05-01" }));
        assert!(validate_payload(&entity, &payload, SchemaMode::Create).is_ok());
        let payload = object(json!({ "title": "t", "due": "tomorrow" }));
        assert_eq!(
            validate_payload(&entity, &payload, SchemaMode::Create).unwrap_err().message,
            "\"due\" must be a date"
        );
    }

    #[test]
    fn update_accepts_integer_id_only() {
        let basics = EntityDescriptor::basics();
        assert!(validate_payload(&basics, &object(json!({ "id": 3, "info": "x" })), SchemaMode::Update).is_ok());
        let err = validate_payload(&basics, &object(json!({ "id": "3" })), SchemaMode::Update).unwrap_err();
        assert_eq!(err.message, "\"id\" must be a number");
    }

    #[test]
    fn filter_request_shapes() {
        let basics = EntityDescriptor::basics();
        let ok = json!({
            "query": { "info": "a", "db": ["x", "y"], "isActive": { "$eq": true }, "$or": [{ "id": 1 }] },
            "options": { "page": 2, "limit": 5, "sort": { "id": "desc" } },
            "isCountOnly": false,
            "select": ["id", "info"]
        });
        assert!(validate_filter_request(&basics, &ok).is_ok());
        assert!(validate_filter_request(&basics, &Value::Null).is_ok());

        let cases = [
            (json!({ "query": { "info": 5 } }), "\"query.info\" must be one of [array, string, object]"),
            (json!({ "where": { "isActive": "yes" } }), "\"where.isActive\" must be one of [array, boolean, object]"),
            (json!({ "query": { "$or": 1 } }), "\"query.$or\" must be one of [array, object]"),
            (json!({ "query": [] }), "\"query\" must be of type object"),
            (json!({ "options": { "page": 0 } }), "\"options.page\" must be greater than or equal to 1"),
            (json!({ "options": { "limit": "ten" } }), "\"options.limit\" must be a number"),
            (json!({ "options": { "sort": 1 } }), "\"options.sort\" must be one of [string, array, object]"),
            (json!({ "isCountOnly": "true" }), "\"isCountOnly\" must be a boolean"),
            (json!({ "include": ["owner"] }), "\"include[0]\" must be a relation of Basics"),
            (json!({ "select": ["id", "secret"] }), "\"select[1]\" must be a column of Basics"),
        ];
        for (body, message) in cases {
            let err = validate_filter_request(&basics, &body).unwrap_err();
            assert_eq!(err.message, message, "body: {}", body);
        }
    }

    #[test]
    fn filter_request_tolerates_unknown_keys() {
        let basics = EntityDescriptor::basics();
        let body = json!({ "query": { "nope": 1 }, "extra": true });
        assert!(validate_filter_request(&basics, &body).is_ok());
    }
}
