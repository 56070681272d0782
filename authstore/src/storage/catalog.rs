//! Logical-to-physical table name resolution.

use super::config::StorageConfig;

/// Logical table names, one per entity family.
pub(crate) mod tables {
    pub const AUTH_USERS: &str = "auth_users";
    pub const EMAILPASSWORD_USERS: &str = "emailpassword_users";
    pub const EMAILPASSWORD_PSWD_RESET_TOKENS: &str = "emailpassword_pswd_reset_tokens";
    pub const THIRDPARTY_USERS: &str = "thirdparty_users";
    pub const PASSWORDLESS_USERS: &str = "passwordless_users";
    pub const PASSWORDLESS_DEVICES: &str = "passwordless_devices";
    pub const PASSWORDLESS_CODES: &str = "passwordless_codes";
    pub const SESSION_INFO: &str = "session_info";
    pub const JWT_SIGNING_KEYS: &str = "jwt_signing_keys";
    pub const ACCESS_TOKEN_SIGNING_KEYS: &str = "session_access_token_signing_keys";
    pub const EMAILVERIFICATION_TOKENS: &str = "emailverification_tokens";
    pub const EMAILVERIFICATION_VERIFIED_EMAILS: &str = "emailverification_verified_emails";
    pub const ROLES: &str = "roles";
    pub const ROLE_PERMISSIONS: &str = "role_permissions";
    pub const USER_ROLES: &str = "user_roles";
    pub const USERID_MAPPING: &str = "userid_mapping";
    pub const USER_METADATA: &str = "user_metadata";
    pub const KEY_VALUE: &str = "key_value";
}

/// Resolves logical entity names to physical table names.
///
/// A single database may host several isolated storage instances (tenants);
/// the catalog applies the configured schema qualifier and table prefix
/// uniformly so instances never collide. Pure and stateless: constructed
/// once from the configuration value and passed by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCatalog {
    schema: Option<String>,
    prefix: String,
}

impl TableCatalog {
    pub fn new(schema: Option<String>, prefix: impl Into<String>) -> Self {
        Self {
            schema,
            prefix: prefix.into(),
        }
    }

    pub(crate) fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.schema.clone(), config.table_prefix.clone())
    }

    /// Schema qualifier, if one is configured.
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Physical table name without the schema qualifier.
    pub fn physical(&self, logical: &str) -> String {
        format!("{}{}", self.prefix, logical)
    }

    /// Fully qualified physical table name, usable directly in SQL.
    pub fn table(&self, logical: &str) -> String {
        let name = self.physical(logical);
        match &self.schema {
            Some(schema) => format!("{schema}.{name}"),
            None => name,
        }
    }

    /// Index name for a table. Index names are schema-scoped objects in
    /// PostgreSQL, so they carry the table prefix.
    pub fn index(&self, logical: &str, suffix: &str) -> String {
        format!("idx_{}_{}", self.physical(logical), suffix).replace('.', "_")
    }

    /// Constraint name for a table. Unique/primary-key constraints create
    /// backing indexes, which are schema-scoped, so these carry the prefix
    /// too. The translator reports this name on Conflict/UnknownParent.
    pub fn constraint(&self, logical: &str, suffix: &str) -> String {
        format!("{}_{}", self.physical(logical), suffix)
    }
}

/// Table names are interpolated into SQL text (bind parameters cannot name
/// tables), so schema and prefix must be plain identifiers.
pub(crate) fn is_safe_identifier_part(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_table_without_schema_or_prefix() {
        let catalog = TableCatalog::new(None, "");
        assert_eq!(catalog.table(tables::AUTH_USERS), "auth_users");
        assert_eq!(catalog.physical(tables::AUTH_USERS), "auth_users");
    }

    #[test]
    fn test_table_with_prefix() {
        let catalog = TableCatalog::new(None, "tenant1_");
        assert_eq!(catalog.table(tables::SESSION_INFO), "tenant1_session_info");
    }

    #[test]
    fn test_table_with_schema_and_prefix() {
        let catalog = TableCatalog::new(Some("auth".to_string()), "t_");
        assert_eq!(catalog.table(tables::ROLES), "auth.t_roles");
        // The unqualified form never carries the schema
        assert_eq!(catalog.physical(tables::ROLES), "t_roles");
    }

    #[test]
    fn test_index_name_carries_prefix() {
        let catalog = TableCatalog::new(Some("auth".to_string()), "t_");
        assert_eq!(
            catalog.index(tables::SESSION_INFO, "expires_at"),
            "idx_t_session_info_expires_at"
        );
    }

    #[test]
    fn test_constraint_name_carries_prefix() {
        let catalog = TableCatalog::new(None, "t_");
        assert_eq!(
            catalog.constraint(tables::EMAILPASSWORD_USERS, "email_key"),
            "t_emailpassword_users_email_key"
        );
    }

    #[test]
    fn test_safe_identifier_part() {
        assert!(is_safe_identifier_part("auth"));
        assert!(is_safe_identifier_part("tenant_1"));
        assert!(is_safe_identifier_part("_private"));
        assert!(!is_safe_identifier_part(""));
        assert!(!is_safe_identifier_part("1tenant"));
        assert!(!is_safe_identifier_part("bad-name"));
        assert!(!is_safe_identifier_part("drop table;"));
        assert!(!is_safe_identifier_part("a.b"));
    }

    proptest! {
        /// Any catalog built from safe identifier parts yields table names
        /// consisting only of identifier characters and at most one dot.
        #[test]
        fn test_table_names_stay_identifier_shaped(
            schema in proptest::option::of("[a-z_][a-z0-9_]{0,15}"),
            prefix in "[a-z_][a-z0-9_]{0,15}",
        ) {
            let catalog = TableCatalog::new(schema.clone(), prefix);
            let name = catalog.table(tables::AUTH_USERS);
            let dots = name.chars().filter(|c| *c == '.').count();
            prop_assert_eq!(dots, usize::from(schema.is_some()));
            prop_assert!(
                name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            );
        }
    }
}
