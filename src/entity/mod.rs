//! Entity descriptors: the schema + table binding that parameterizes the
//! generic data-access layer, validation, and routing for one record type.

mod basics;

use std::sync::Arc;

use serde::Serialize;

/// Standard columns carried by every entity table
pub const ID: &str = "id";
pub const IS_ACTIVE: &str = "isActive";
pub const IS_DELETED: &str = "isDeleted";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";
pub const ADDED_BY: &str = "addedBy";
pub const UPDATED_BY: &str = "updatedBy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    String,
    Boolean,
    Timestamp,
}

impl FieldKind {
    /// Type used when casting bound parameters in generated SQL
    pub fn sql_cast(&self) -> &'static str {
        match self {
            FieldKind::Integer => "bigint",
            FieldKind::String => "text",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "timestamptz",
        }
    }

    /// Column type used in CREATE TABLE
    pub fn ddl_type(&self) -> &'static str {
        match self {
            FieldKind::Integer => "BIGINT",
            FieldKind::String => "VARCHAR(255)",
            FieldKind::Boolean => "BOOLEAN",
            FieldKind::Timestamp => "TIMESTAMPTZ",
        }
    }

    /// Human name used in validation messages
    pub fn label(&self) -> &'static str {
        match self {
            FieldKind::Integer => "number",
            FieldKind::String => "string",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "date",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub nullable: bool,
    /// System-managed columns are never taken from client payloads
    pub writable: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            nullable: matches!(kind, FieldKind::String),
            writable: true,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn timestamp(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Timestamp)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.nullable = false;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.writable = false;
        self
    }
}

/// To-one relation: `foreign_key` on this entity references `table.id`
#[derive(Debug, Clone, Serialize)]
pub struct Relation {
    pub name: String,
    pub table: String,
    pub foreign_key: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub table: String,
    fields: Vec<FieldDef>,
    relations: Vec<Relation>,
}

impl EntityDescriptor {
    /// New descriptor with the `id` primary key and no other columns.
    /// The table is named after the entity.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            fields: vec![FieldDef::integer(ID).system()],
            relations: vec![],
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Appends the enabled/soft-delete flags, timestamps and audit columns
    pub fn with_standard_columns(self) -> Self {
        self.field(FieldDef::boolean(IS_ACTIVE))
            .field(FieldDef::boolean(IS_DELETED))
            .field(FieldDef::timestamp(CREATED_AT).system())
            .field(FieldDef::timestamp(UPDATED_AT).system())
            .field(FieldDef::integer(ADDED_BY).nullable().system())
            .field(FieldDef::integer(UPDATED_BY).nullable().system())
    }

    /// URL segment, e.g. `basics` for the `Basics` entity
    pub fn route_segment(&self) -> String {
        self.name.to_lowercase()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn column(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn relation_named(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn writable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.writable)
    }
}

/// All entities served by the application. Built once at start-up.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    entities: Vec<Arc<EntityDescriptor>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every entity this service ships with
    pub fn builtin() -> Self {
        Self::new().register(EntityDescriptor::basics())
    }

    pub fn register(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(Arc::new(entity));
        self
    }

    pub fn get(&self, route_segment: &str) -> Option<Arc<EntityDescriptor>> {
        self.entities
            .iter()
            .find(|e| e.route_segment() == route_segment)
            .cloned()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntityDescriptor>> {
        self.entities.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_columns_are_system_managed_except_flags() {
        let entity = EntityDescriptor::new("Widgets").with_standard_columns();
        let writable: Vec<_> = entity.writable_fields().map(|f| f.name.as_str()).collect();
        assert_eq!(writable, vec![IS_ACTIVE, IS_DELETED]);
        assert!(!entity.column(ADDED_BY).unwrap().writable);
        assert!(entity.column(UPDATED_BY).unwrap().nullable);
    }

    #[test]
    fn registry_looks_up_by_route_segment() {
        let registry = EntityRegistry::builtin();
        let basics = registry.get("basics").expect("basics registered");
        assert_eq!(basics.table, "Basics");
        assert!(registry.get("Basics").is_none());
    }

    #[test]
    fn required_fields_are_not_nullable() {
        let field = FieldDef::string("title").required();
        assert!(field.required);
        assert!(!field.nullable);
    }
}
