use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Arbitrary metadata attached to a user. The blob is opaque to the
/// storage layer; it has no relationships to other records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserMetadata {
    pub user_id: String,
    pub user_metadata: serde_json::Value,
}

impl UserMetadata {
    pub fn new(user_id: impl Into<String>, user_metadata: serde_json::Value) -> Self {
        Self {
            user_id: user_id.into(),
            user_metadata,
        }
    }
}
