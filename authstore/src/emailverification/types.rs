use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One outstanding email-verification token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EmailVerificationToken {
    pub user_id: String,
    pub email: String,
    pub token: String,
    pub token_expiry: i64,
}

impl EmailVerificationToken {
    pub fn new(
        user_id: impl Into<String>,
        email: impl Into<String>,
        token: impl Into<String>,
        token_expiry: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
            token: token.into(),
            token_expiry,
        }
    }

    pub fn key(&self) -> EmailVerificationTokenKey {
        EmailVerificationTokenKey {
            user_id: self.user_id.clone(),
            email: self.email.clone(),
            token: self.token.clone(),
        }
    }
}

/// Composite key of a verification-token row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailVerificationTokenKey {
    pub user_id: String,
    pub email: String,
    pub token: String,
}

/// Composite key of a verified (user, email) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VerifiedEmailKey {
    pub user_id: String,
    pub email: String,
}

impl VerifiedEmailKey {
    pub fn new(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: email.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_token_key_components() {
        let token = EmailVerificationToken::new("user-1", "a@example.com", "tok", 50);
        let key = token.key();

        assert_eq!(key.user_id, "user-1");
        assert_eq!(key.email, "a@example.com");
        assert_eq!(key.token, "tok");
    }

    #[test]
    fn test_keys_interchangeable_as_map_keys() {
        // Two instances of the same logical key address one map entry
        let mut seen: HashMap<VerifiedEmailKey, u32> = HashMap::new();
        seen.insert(VerifiedEmailKey::new("user-1", "a@example.com"), 1);

        let other = VerifiedEmailKey::new("user-1", "a@example.com");
        assert_eq!(seen.get(&other), Some(&1));

        *seen.entry(other).or_insert(0) += 1;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[&VerifiedEmailKey::new("user-1", "a@example.com")], 2);
    }

    #[test]
    fn test_keys_differ_when_any_component_differs() {
        let base = VerifiedEmailKey::new("user-1", "a@example.com");
        assert_ne!(base, VerifiedEmailKey::new("user-2", "a@example.com"));
        assert_ne!(base, VerifiedEmailKey::new("user-1", "b@example.com"));
    }
}
