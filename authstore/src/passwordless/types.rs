use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::{new_uuid, now_millis};

/// Passwordless login user, reachable by email, phone number, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PasswordlessUser {
    /// 36-character user identifier.
    pub user_id: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Immutable after creation.
    pub time_joined: i64,
}

impl PasswordlessUser {
    pub fn new(email: Option<String>, phone_number: Option<String>) -> Self {
        Self {
            user_id: new_uuid(),
            email,
            phone_number,
            time_joined: now_millis(),
        }
    }
}

/// A device that requested passwordless codes. Parent of its codes: when
/// the device goes, its codes go with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PasswordlessDevice {
    /// Hash of the device id; primary key.
    pub device_id_hash: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub link_code_salt: String,
    /// Incremented under a locked read on each wrong OTP.
    pub failed_attempts: i32,
}

impl PasswordlessDevice {
    pub fn new(
        device_id_hash: impl Into<String>,
        email: Option<String>,
        phone_number: Option<String>,
        link_code_salt: impl Into<String>,
    ) -> Self {
        Self {
            device_id_hash: device_id_hash.into(),
            email,
            phone_number,
            link_code_salt: link_code_salt.into(),
            failed_attempts: 0,
        }
    }
}

/// One active code on a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PasswordlessCode {
    /// 36-character code identifier.
    pub code_id: String,
    pub device_id_hash: String,
    pub link_code_hash: String,
    pub created_at: i64,
}

impl PasswordlessCode {
    pub fn new(device_id_hash: impl Into<String>, link_code_hash: impl Into<String>) -> Self {
        Self {
            code_id: new_uuid(),
            device_id_hash: device_id_hash.into(),
            link_code_hash: link_code_hash.into(),
            created_at: now_millis(),
        }
    }
}
