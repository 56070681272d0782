use crate::storage::{
    StorageError, UnitOfWork, ensure_affected, tables, validate_table_schema,
};

/// Repository for roles, role permissions, and user-role assignments.
pub struct UserRolesStore;

impl UserRolesStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let roles = uow.table(tables::ROLES);
        let roles_pkey = uow.constraint(tables::ROLES, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {roles} (
                role VARCHAR(255) NOT NULL,
                CONSTRAINT {roles_pkey} PRIMARY KEY (role)
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let permissions = uow.table(tables::ROLE_PERMISSIONS);
        let permissions_pkey = uow.constraint(tables::ROLE_PERMISSIONS, "pkey");
        let permissions_role_fkey = uow.constraint(tables::ROLE_PERMISSIONS, "role_fkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {permissions} (
                role VARCHAR(255) NOT NULL,
                permission VARCHAR(255) NOT NULL,
                CONSTRAINT {permissions_pkey} PRIMARY KEY (role, permission),
                CONSTRAINT {permissions_role_fkey} FOREIGN KEY (role)
                    REFERENCES {roles} (role) ON DELETE CASCADE
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let permission_index = uow.index(tables::ROLE_PERMISSIONS, "permission");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {permission_index} ON {permissions} (permission)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let user_roles = uow.table(tables::USER_ROLES);
        let user_roles_pkey = uow.constraint(tables::USER_ROLES, "pkey");
        let user_roles_role_fkey = uow.constraint(tables::USER_ROLES, "role_fkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {user_roles} (
                user_id VARCHAR(36) NOT NULL,
                role VARCHAR(255) NOT NULL,
                CONSTRAINT {user_roles_pkey} PRIMARY KEY (user_id, role),
                CONSTRAINT {user_roles_role_fkey} FOREIGN KEY (role)
                    REFERENCES {roles} (role) ON DELETE CASCADE
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let user_roles_role_index = uow.index(tables::USER_ROLES, "role");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {user_roles_role_index} ON {user_roles} (role)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub(crate) async fn validate_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        validate_table_schema(uow, tables::ROLES, &[("role", "character varying")]).await?;

        validate_table_schema(
            uow,
            tables::ROLE_PERMISSIONS,
            &[
                ("role", "character varying"),
                ("permission", "character varying"),
            ],
        )
        .await?;

        validate_table_schema(
            uow,
            tables::USER_ROLES,
            &[("user_id", "character varying"), ("role", "character varying")],
        )
        .await
    }

    /// Create a role. Conflict when it already exists.
    pub async fn create_role(uow: &mut UnitOfWork<'_>, role: &str) -> Result<(), StorageError> {
        let table = uow.table(tables::ROLES);

        sqlx::query(&format!("INSERT INTO {table} (role) VALUES ($1)"))
            .bind(role)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn role_exists(uow: &mut UnitOfWork<'_>, role: &str) -> Result<bool, StorageError> {
        let table = uow.table(tables::ROLES);

        sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT FROM {table} WHERE role = $1)"
        ))
        .bind(role)
        .fetch_one(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn list_roles(uow: &mut UnitOfWork<'_>) -> Result<Vec<String>, StorageError> {
        let table = uow.table(tables::ROLES);

        sqlx::query_scalar(&format!("SELECT role FROM {table} ORDER BY role"))
            .fetch_all(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)
    }

    /// Delete a role. Its permissions and user assignments cascade within
    /// the same transaction. NotFound when the role does not exist.
    pub async fn delete_role(uow: &mut UnitOfWork<'_>, role: &str) -> Result<(), StorageError> {
        let table = uow.table(tables::ROLES);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE role = $1"))
            .bind(role)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// Grant a permission to a role. UnknownParent when the role does not
    /// exist; Conflict when the pair is already granted.
    pub async fn add_permission_to_role(
        uow: &mut UnitOfWork<'_>,
        role: &str,
        permission: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::ROLE_PERMISSIONS);

        sqlx::query(&format!(
            "INSERT INTO {table} (role, permission) VALUES ($1, $2)"
        ))
        .bind(role)
        .bind(permission)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    /// NotFound when the pair was not granted.
    pub async fn remove_permission_from_role(
        uow: &mut UnitOfWork<'_>,
        role: &str,
        permission: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::ROLE_PERMISSIONS);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE role = $1 AND permission = $2"
        ))
        .bind(role)
        .bind(permission)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    pub async fn list_permissions_for_role(
        uow: &mut UnitOfWork<'_>,
        role: &str,
    ) -> Result<Vec<String>, StorageError> {
        let table = uow.table(tables::ROLE_PERMISSIONS);

        sqlx::query_scalar(&format!(
            "SELECT permission FROM {table} WHERE role = $1 ORDER BY permission"
        ))
        .bind(role)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn list_roles_with_permission(
        uow: &mut UnitOfWork<'_>,
        permission: &str,
    ) -> Result<Vec<String>, StorageError> {
        let table = uow.table(tables::ROLE_PERMISSIONS);

        sqlx::query_scalar(&format!(
            "SELECT role FROM {table} WHERE permission = $1 ORDER BY role"
        ))
        .bind(permission)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Assign a role to a user. UnknownParent when the role does not
    /// exist; Conflict when the user already has it.
    pub async fn assign_role_to_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        role: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::USER_ROLES);

        sqlx::query(&format!(
            "INSERT INTO {table} (user_id, role) VALUES ($1, $2)"
        ))
        .bind(user_id)
        .bind(role)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    /// NotFound when the user did not have the role.
    pub async fn remove_role_from_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        role: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::USER_ROLES);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE user_id = $1 AND role = $2"
        ))
        .bind(user_id)
        .bind(role)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    pub async fn list_roles_for_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        let table = uow.table(tables::USER_ROLES);

        sqlx::query_scalar(&format!(
            "SELECT role FROM {table} WHERE user_id = $1 ORDER BY role"
        ))
        .bind(user_id)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn list_users_with_role(
        uow: &mut UnitOfWork<'_>,
        role: &str,
    ) -> Result<Vec<String>, StorageError> {
        let table = uow.table(tables::USER_ROLES);

        sqlx::query_scalar(&format!(
            "SELECT user_id FROM {table} WHERE role = $1 ORDER BY user_id"
        ))
        .bind(role)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Drop every role assignment of a user, e.g. when the user is
    /// deleted. Returns the number removed; zero is a valid outcome.
    pub async fn delete_all_roles_for_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::USER_ROLES);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(result.rows_affected())
    }
}
