use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Mapping between the internal 36-character user id and an external id
/// chosen by the embedding application. Both sides are unique: a user has
/// at most one mapping, and an external id maps to at most one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserIdMapping {
    pub internal_user_id: String,
    pub external_user_id: String,
    pub external_user_id_info: Option<String>,
}

impl UserIdMapping {
    pub fn new(
        internal_user_id: impl Into<String>,
        external_user_id: impl Into<String>,
        external_user_id_info: Option<String>,
    ) -> Self {
        Self {
            internal_user_id: internal_user_id.into(),
            external_user_id: external_user_id.into(),
            external_user_id_info,
        }
    }

    pub fn key(&self) -> UserIdMappingKey {
        UserIdMappingKey {
            internal_user_id: self.internal_user_id.clone(),
            external_user_id: self.external_user_id.clone(),
        }
    }
}

/// Composite key of a mapping row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserIdMappingKey {
    pub internal_user_id: String,
    pub external_user_id: String,
}
