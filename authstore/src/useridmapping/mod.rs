//! Mappings between internal user ids and caller-supplied external ids.

mod store;
mod types;

pub use store::UserIdMappingStore;
pub use types::{UserIdMapping, UserIdMappingKey};
