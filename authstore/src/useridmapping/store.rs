use crate::storage::{
    StorageError, UnitOfWork, ensure_affected, tables, validate_table_schema,
};

use super::types::UserIdMapping;

/// Repository for user-id mappings.
pub struct UserIdMappingStore;

impl UserIdMappingStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let table = uow.table(tables::USERID_MAPPING);
        let auth_users = uow.table(tables::AUTH_USERS);
        let pkey = uow.constraint(tables::USERID_MAPPING, "pkey");
        let internal_key = uow.constraint(tables::USERID_MAPPING, "internal_user_id_key");
        let external_key = uow.constraint(tables::USERID_MAPPING, "external_user_id_key");
        let internal_fkey = uow.constraint(tables::USERID_MAPPING, "internal_user_id_fkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                internal_user_id VARCHAR(36) NOT NULL,
                external_user_id VARCHAR(128) NOT NULL,
                external_user_id_info VARCHAR(256),
                CONSTRAINT {pkey} PRIMARY KEY (internal_user_id, external_user_id),
                CONSTRAINT {internal_key} UNIQUE (internal_user_id),
                CONSTRAINT {external_key} UNIQUE (external_user_id),
                CONSTRAINT {internal_fkey} FOREIGN KEY (internal_user_id)
                    REFERENCES {auth_users} (user_id) ON DELETE CASCADE
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub(crate) async fn validate_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        validate_table_schema(
            uow,
            tables::USERID_MAPPING,
            &[
                ("internal_user_id", "character varying"),
                ("external_user_id", "character varying"),
                ("external_user_id_info", "character varying"),
            ],
        )
        .await
    }

    /// Create a mapping. UnknownParent when the internal user id is not in
    /// the index; Conflict when either side is already mapped.
    pub async fn insert(
        uow: &mut UnitOfWork<'_>,
        mapping: &UserIdMapping,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::USERID_MAPPING);

        sqlx::query(&format!(
            "INSERT INTO {table}
             (internal_user_id, external_user_id, external_user_id_info)
             VALUES ($1, $2, $3)"
        ))
        .bind(&mapping.internal_user_id)
        .bind(&mapping.external_user_id)
        .bind(&mapping.external_user_id_info)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get_by_internal_id(
        uow: &mut UnitOfWork<'_>,
        internal_user_id: &str,
    ) -> Result<Option<UserIdMapping>, StorageError> {
        let table = uow.table(tables::USERID_MAPPING);

        sqlx::query_as::<_, UserIdMapping>(&format!(
            "SELECT internal_user_id, external_user_id, external_user_id_info
             FROM {table} WHERE internal_user_id = $1"
        ))
        .bind(internal_user_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn get_by_external_id(
        uow: &mut UnitOfWork<'_>,
        external_user_id: &str,
    ) -> Result<Option<UserIdMapping>, StorageError> {
        let table = uow.table(tables::USERID_MAPPING);

        sqlx::query_as::<_, UserIdMapping>(&format!(
            "SELECT internal_user_id, external_user_id, external_user_id_info
             FROM {table} WHERE external_user_id = $1"
        ))
        .bind(external_user_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// NotFound when the user has no mapping.
    pub async fn delete_by_internal_id(
        uow: &mut UnitOfWork<'_>,
        internal_user_id: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::USERID_MAPPING);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE internal_user_id = $1"
        ))
        .bind(internal_user_id)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// NotFound when the external id is not mapped.
    pub async fn delete_by_external_id(
        uow: &mut UnitOfWork<'_>,
        external_user_id: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::USERID_MAPPING);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE external_user_id = $1"
        ))
        .bind(external_user_id)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// Replace the info field. `None` clears it. NotFound when the user
    /// has no mapping.
    pub async fn update_external_user_id_info(
        uow: &mut UnitOfWork<'_>,
        internal_user_id: &str,
        external_user_id_info: Option<&str>,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::USERID_MAPPING);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET external_user_id_info = $1 WHERE internal_user_id = $2"
        ))
        .bind(external_user_id_info)
        .bind(internal_user_id)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }
}
