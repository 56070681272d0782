use crate::storage::{
    StorageError, UnitOfWork, ensure_affected, tables, validate_table_schema,
};

use super::types::UserMetadata;

/// Repository for user metadata blobs.
pub struct UserMetadataStore;

impl UserMetadataStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let table = uow.table(tables::USER_METADATA);
        let pkey = uow.constraint(tables::USER_METADATA, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                user_id VARCHAR(36) NOT NULL,
                user_metadata JSONB NOT NULL,
                CONSTRAINT {pkey} PRIMARY KEY (user_id)
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
            tables::USER_METADATA,
            &[("user_id", "character varying"), ("user_metadata", "jsonb")],
        )
        .await
    }

    pub async fn get(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Option<UserMetadata>, StorageError> {
        let table = uow.table(tables::USER_METADATA);

        sqlx::query_as::<_, UserMetadata>(&format!(
            "SELECT user_id, user_metadata FROM {table} WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked read, taken before [`set`](Self::set) merges or replaces the
    /// blob so concurrent writers serialize.
    pub async fn get_locked(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Option<UserMetadata>, StorageError> {
        let table = uow.table(tables::USER_METADATA);

        sqlx::query_as::<_, UserMetadata>(&format!(
            "SELECT user_id, user_metadata FROM {table} WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Write the blob: a locked read inside the caller's unit of work
    /// decides between insert and update, never a blind upsert. Two
    /// first-time writers can both observe no row; the loser's insert
    /// fails with Conflict and the whole unit of work is retried.
    pub async fn set(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        user_metadata: &serde_json::Value,
    ) -> Result<UserMetadata, StorageError> {
        let table = uow.table(tables::USER_METADATA);
        let existing = Self::get_locked(uow, user_id).await?;

        match existing {
            Some(_) => {
                sqlx::query(&format!(
                    "UPDATE {table} SET user_metadata = $1 WHERE user_id = $2"
                ))
                .bind(user_metadata)
                .bind(user_id)
                .execute(uow.conn())
                .await
                .map_err(StorageError::from_sqlx)?;
            }
            None => {
                sqlx::query(&format!(
                    "INSERT INTO {table} (user_id, user_metadata) VALUES ($1, $2)"
                ))
                .bind(user_id)
                .bind(user_metadata)
                .execute(uow.conn())
                .await
                .map_err(StorageError::from_sqlx)?;
            }
        }

        Ok(UserMetadata::new(user_id, user_metadata.clone()))
    }

    /// NotFound when the user has no metadata.
    pub async fn delete(uow: &mut UnitOfWork<'_>, user_id: &str) -> Result<(), StorageError> {
        let table = uow.table(tables::USER_METADATA);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }
}
