use super::{EntityDescriptor, FieldDef};

impl EntityDescriptor {
    /// `Basics`: two free-text columns plus the standard flags and audit columns
    pub fn basics() -> Self {
        EntityDescriptor::new("Basics")
            .field(FieldDef::string("info"))
            .field(FieldDef::string("db"))
            .with_standard_columns()
    }
}
