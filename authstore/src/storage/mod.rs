mod catalog;
mod config;
mod errors;
mod pagination;
mod schema_validation;
mod uow;

pub use catalog::TableCatalog;
pub use config::StorageConfig;
pub use errors::StorageError;
pub use pagination::{PageBoundary, SortOrder};
pub use uow::{AuthStorage, UnitOfWork};

pub(crate) use catalog::tables;
pub(crate) use errors::ensure_affected;
pub(crate) use pagination::{Keyset, validate_limit};
pub(crate) use schema_validation::validate_table_schema;
