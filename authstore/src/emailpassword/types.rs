use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::{new_uuid, now_millis};

/// Credential-based login user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EmailPasswordUser {
    /// 36-character user identifier.
    pub user_id: String,
    pub email: String,
    pub password_hash: String,
    /// Immutable after creation.
    pub time_joined: i64,
}

impl EmailPasswordUser {
    /// New user with a generated id and the current join time.
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            user_id: new_uuid(),
            email: email.into(),
            password_hash: password_hash.into(),
            time_joined: now_millis(),
        }
    }
}

/// Password-reset token row. Belongs to exactly one emailpassword user and
/// is removed when that user is removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PasswordResetToken {
    pub user_id: String,
    pub token: String,
    pub token_expiry: i64,
}

impl PasswordResetToken {
    pub fn new(
        user_id: impl Into<String>,
        token: impl Into<String>,
        token_expiry: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            token: token.into(),
            token_expiry,
        }
    }

    pub fn key(&self) -> PasswordResetTokenKey {
        PasswordResetTokenKey {
            user_id: self.user_id.clone(),
            token: self.token.clone(),
        }
    }
}

/// Composite key of a password-reset token row.
///
/// Equality and hashing derive from the raw component values, so two keys
/// naming the same logical row are interchangeable in any container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PasswordResetTokenKey {
    pub user_id: String,
    pub token: String,
}
