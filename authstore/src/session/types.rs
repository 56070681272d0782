use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::{new_uuid, now_millis};

/// One refresh-token session. The data and payload fields are opaque
/// blobs to the storage layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SessionInfo {
    /// 36-character session handle; primary key.
    pub session_handle: String,
    pub user_id: String,
    /// Hash of the current refresh token; replaced on rotation.
    pub refresh_token_hash_2: String,
    pub session_data: serde_json::Value,
    pub expires_at: i64,
    /// Immutable after creation.
    pub created_at_time: i64,
    pub jwt_user_payload: serde_json::Value,
}

impl SessionInfo {
    pub fn new(
        user_id: impl Into<String>,
        refresh_token_hash_2: impl Into<String>,
        session_data: serde_json::Value,
        jwt_user_payload: serde_json::Value,
        expires_at: i64,
    ) -> Self {
        Self {
            session_handle: new_uuid(),
            user_id: user_id.into(),
            refresh_token_hash_2: refresh_token_hash_2.into(),
            session_data,
            expires_at,
            created_at_time: now_millis(),
            jwt_user_payload,
        }
    }
}
