pub mod ddl;
pub mod manager;
pub mod pagination;
pub mod query_builder;
pub mod record;
pub mod repository;

pub use manager::{DatabaseError, DatabaseManager};
pub use pagination::{Page, PaginateOptions};
pub use record::{NewRecord, Patch, Record};
pub use repository::Repository;
