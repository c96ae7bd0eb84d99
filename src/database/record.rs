use serde_json::{Map, Value};

use crate::entity::{self, EntityDescriptor};
use crate::validation::{validate_payload, SchemaMode, ValidationError};

/// One stored row as returned by the data-access layer
pub type Record = Map<String, Value>;

/// Insert payload with creation defaults applied.
///
/// Only writable columns survive. `isActive`/`isDeleted` are forced to
/// `true`/`false` and `addedBy` is the creating caller, whatever the
/// client sent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord(Record);

impl NewRecord {
    pub fn build(entity: &EntityDescriptor, payload: &Record, caller_id: i64) -> Result<Self, ValidationError> {
        validate_payload(entity, payload, SchemaMode::Create)?;

        let mut values = writable_subset(entity, payload);
        if entity.has_column(entity::IS_ACTIVE) {
            values.insert(entity::IS_ACTIVE.to_string(), Value::Bool(true));
        }
        if entity.has_column(entity::IS_DELETED) {
            values.insert(entity::IS_DELETED.to_string(), Value::Bool(false));
        }
        if entity.has_column(entity::ADDED_BY) {
            values.insert(entity::ADDED_BY.to_string(), Value::from(caller_id));
        }
        Ok(Self(values))
    }

    pub fn values(&self) -> &Record {
        &self.0
    }

    pub fn into_values(self) -> Record {
        self.0
    }
}

/// Update payload. `id`, `addedBy` and the timestamps never appear;
/// `updatedBy` is the mutating caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch(Record);

impl Patch {
    pub fn build(
        entity: &EntityDescriptor,
        payload: &Record,
        caller_id: i64,
        mode: SchemaMode,
    ) -> Result<Self, ValidationError> {
        validate_payload(entity, payload, mode)?;

        let mut values = writable_subset(entity, payload);
        stamp_updated_by(entity, &mut values, caller_id);
        Ok(Self(values))
    }

    /// Marks rows deleted without removing them
    pub fn soft_delete(entity: &EntityDescriptor, caller_id: i64) -> Self {
        let mut values = Record::new();
        if entity.has_column(entity::IS_DELETED) {
            values.insert(entity::IS_DELETED.to_string(), Value::Bool(true));
        }
        stamp_updated_by(entity, &mut values, caller_id);
        Self(values)
    }

    pub fn values(&self) -> &Record {
        &self.0
    }
}

fn writable_subset(entity: &EntityDescriptor, payload: &Record) -> Record {
    entity
        .writable_fields()
        .filter_map(|field| payload.get(&field.name).map(|v| (field.name.clone(), v.clone())))
        .collect()
}

fn stamp_updated_by(entity: &EntityDescriptor, values: &mut Record, caller_id: i64) {
    if entity.has_column(entity::UPDATED_BY) {
        values.insert(entity::UPDATED_BY.to_string(), Value::from(caller_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn new_record_forces_flags_and_creator() {
        let basics = EntityDescriptor::basics();
        let payload = object(json!({
            "info": "a", "db": "x",
            "isActive": false, "isDeleted": true,
            "id": 99, "addedBy": 1, "updatedBy": 2, "createdAt": "2020-01-01T00:00:00Z",
            "extra": "ignored"
        }));

        let record = NewRecord::build(&basics, &payload, 7).unwrap();
        assert_eq!(
            Value::Object(record.values().clone()),
            json!({ "info": "a", "db": "x", "isActive": true, "isDeleted": false, "addedBy": 7 })
        );
    }

    #[test]
    fn new_record_validates() {
        let basics = EntityDescriptor::basics();
        let err = NewRecord::build(&basics, &object(json!({ "db": 1 })), 7).unwrap_err();
        assert_eq!(err.message, "\"db\" must be a string");
    }

    #[test]
    fn patch_strips_creator_and_stamps_updater() {
        let basics = EntityDescriptor::basics();
        let payload = object(json!({ "id": 1, "info": "b", "addedBy": 999 }));
        let patch = Patch::build(&basics, &payload, 8, SchemaMode::Update).unwrap();
        assert_eq!(Value::Object(patch.values().clone()), json!({ "info": "b", "updatedBy": 8 }));
    }

    #[test]
    fn soft_delete_patch() {
        let basics = EntityDescriptor::basics();
        let patch = Patch::soft_delete(&basics, 8);
        assert_eq!(Value::Object(patch.values().clone()), json!({ "isDeleted": true, "updatedBy": 8 }));
    }
}
