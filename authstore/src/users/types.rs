use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::storage::StorageError;
use crate::utils::now_millis;

/// One authentication method. Each recipe keeps its own user and
/// credential tables; the index row records which recipe a user belongs
/// to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipeId {
    EmailPassword,
    ThirdParty,
    Passwordless,
}

impl RecipeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipeId::EmailPassword => "emailpassword",
            RecipeId::ThirdParty => "thirdparty",
            RecipeId::Passwordless => "passwordless",
        }
    }
}

impl FromStr for RecipeId {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "emailpassword" => Ok(RecipeId::EmailPassword),
            "thirdparty" => Ok(RecipeId::ThirdParty),
            "passwordless" => Ok(RecipeId::Passwordless),
            other => Err(StorageError::InvalidArgument(format!(
                "unrecognized recipe id: {other}"
            ))),
        }
    }
}

/// Index row identifying a user across recipes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuthRecipeUser {
    /// 36-character user identifier.
    pub user_id: String,
    pub recipe_id: String,
    /// Immutable after creation.
    pub time_joined: i64,
}

impl AuthRecipeUser {
    pub fn new(user_id: impl Into<String>, recipe_id: RecipeId) -> Self {
        Self {
            user_id: user_id.into(),
            recipe_id: recipe_id.as_str().to_string(),
            time_joined: now_millis(),
        }
    }

    /// Index row stamped with an explicit join time, so the recipe row and
    /// the index row share one timestamp.
    pub fn with_time_joined(
        user_id: impl Into<String>,
        recipe_id: RecipeId,
        time_joined: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            recipe_id: recipe_id.as_str().to_string(),
            time_joined,
        }
    }

    pub fn recipe(&self) -> Result<RecipeId, StorageError> {
        self.recipe_id.parse()
    }
}
