use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::now_millis;

/// A named value with its creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct KeyValueEntry {
    pub name: String,
    pub value: String,
    pub created_at_time: i64,
}

impl KeyValueEntry {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            created_at_time: now_millis(),
        }
    }
}
