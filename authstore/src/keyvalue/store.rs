use crate::storage::{
    StorageError, UnitOfWork, tables, validate_table_schema,
};

use super::types::KeyValueEntry;

/// Repository for key-value entries.
pub struct KeyValueStore;

impl KeyValueStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let table = uow.table(tables::KEY_VALUE);
        let pkey = uow.constraint(tables::KEY_VALUE, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                name VARCHAR(128) NOT NULL,
                value TEXT NOT NULL,
                created_at_time BIGINT NOT NULL,
                CONSTRAINT {pkey} PRIMARY KEY (name)
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
            tables::KEY_VALUE,
            &[
                ("name", "character varying"),
                ("value", "text"),
                ("created_at_time", "bigint"),
            ],
        )
        .await
    }

    pub async fn get(
        uow: &mut UnitOfWork<'_>,
        name: &str,
    ) -> Result<Option<KeyValueEntry>, StorageError> {
        let table = uow.table(tables::KEY_VALUE);

        sqlx::query_as::<_, KeyValueEntry>(&format!(
            "SELECT name, value, created_at_time FROM {table} WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked read, for read-then-conditionally-write sequences on an
    /// entry.
    pub async fn get_locked(
        uow: &mut UnitOfWork<'_>,
        name: &str,
    ) -> Result<Option<KeyValueEntry>, StorageError> {
        let table = uow.table(tables::KEY_VALUE);

        sqlx::query_as::<_, KeyValueEntry>(&format!(
            "SELECT name, value, created_at_time FROM {table} WHERE name = $1 FOR UPDATE"
        ))
        .bind(name)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Write an entry: a locked read inside the caller's unit of work
    /// decides between insert and update. Two first-time writers can both
    /// observe no row; the loser's insert fails with Conflict and the
    /// whole unit of work is retried.
    pub async fn set(
        uow: &mut UnitOfWork<'_>,
        entry: &KeyValueEntry,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::KEY_VALUE);
        let existing = Self::get_locked(uow, &entry.name).await?;

        match existing {
            Some(_) => {
                sqlx::query(&format!(
                    "UPDATE {table} SET value = $1, created_at_time = $2 WHERE name = $3"
                ))
                .bind(&entry.value)
                .bind(entry.created_at_time)
                .bind(&entry.name)
                .execute(uow.conn())
                .await
                .map_err(StorageError::from_sqlx)?;
            }
            None => {
                sqlx::query(&format!(
                    "INSERT INTO {table} (name, value, created_at_time) VALUES ($1, $2, $3)"
                ))
                .bind(&entry.name)
                .bind(&entry.value)
                .bind(entry.created_at_time)
                .execute(uow.conn())
                .await
                .map_err(StorageError::from_sqlx)?;
            }
        }

        Ok(())
    }
}
