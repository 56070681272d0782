use crate::storage::{
    StorageError, UnitOfWork, tables, validate_table_schema,
};

use super::types::{AccessTokenSigningKey, JwtSigningKey};

/// Repository for signing keys.
///
/// Key rotation is a list-then-insert sequence: callers take the locked
/// listing first so two rotators cannot both decide to insert.
pub struct SigningKeyStore;

impl SigningKeyStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let jwt_keys = uow.table(tables::JWT_SIGNING_KEYS);
        let jwt_pkey = uow.constraint(tables::JWT_SIGNING_KEYS, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {jwt_keys} (
                key_id VARCHAR(255) NOT NULL,
                key_string TEXT NOT NULL,
                algorithm VARCHAR(10) NOT NULL,
                created_at BIGINT NOT NULL,
                CONSTRAINT {jwt_pkey} PRIMARY KEY (key_id)
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let at_keys = uow.table(tables::ACCESS_TOKEN_SIGNING_KEYS);
        let at_pkey = uow.constraint(tables::ACCESS_TOKEN_SIGNING_KEYS, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {at_keys} (
                created_at_time BIGINT NOT NULL,
                value TEXT NOT NULL,
                CONSTRAINT {at_pkey} PRIMARY KEY (created_at_time)
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
            tables::JWT_SIGNING_KEYS,
            &[
                ("key_id", "character varying"),
                ("key_string", "text"),
                ("algorithm", "character varying"),
                ("created_at", "bigint"),
            ],
        )
        .await?;

        validate_table_schema(
            uow,
            tables::ACCESS_TOKEN_SIGNING_KEYS,
            &[("created_at_time", "bigint"), ("value", "text")],
        )
        .await
    }

    // ---- JWT signing keys ----

    /// Insert a key. Conflict when the key id already exists.
    pub async fn insert_jwt_key(
        uow: &mut UnitOfWork<'_>,
        key: &JwtSigningKey,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::JWT_SIGNING_KEYS);

        sqlx::query(&format!(
            "INSERT INTO {table} (key_id, key_string, algorithm, created_at)
             VALUES ($1, $2, $3, $4)"
        ))
        .bind(&key.key_id)
        .bind(&key.key_string)
        .bind(&key.algorithm)
        .bind(key.created_at)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    /// Newest-first listing. The layer only guarantees ordering on read;
    /// callers are responsible for monotone creation times.
    pub async fn list_jwt_keys(
        uow: &mut UnitOfWork<'_>,
    ) -> Result<Vec<JwtSigningKey>, StorageError> {
        let table = uow.table(tables::JWT_SIGNING_KEYS);

        sqlx::query_as::<_, JwtSigningKey>(&format!(
            "SELECT key_id, key_string, algorithm, created_at
             FROM {table} ORDER BY created_at DESC, key_id DESC"
        ))
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked newest-first listing, required before inserting a fresh key
    /// so concurrent rotators serialize instead of both inserting.
    pub async fn list_jwt_keys_locked(
        uow: &mut UnitOfWork<'_>,
    ) -> Result<Vec<JwtSigningKey>, StorageError> {
        let table = uow.table(tables::JWT_SIGNING_KEYS);

        sqlx::query_as::<_, JwtSigningKey>(&format!(
            "SELECT key_id, key_string, algorithm, created_at
             FROM {table} ORDER BY created_at DESC, key_id DESC FOR UPDATE"
        ))
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    // ---- access-token signing keys ----

    /// Insert a key. Conflict when a key with the same creation time
    /// exists.
    pub async fn insert_access_token_key(
        uow: &mut UnitOfWork<'_>,
        key: &AccessTokenSigningKey,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::ACCESS_TOKEN_SIGNING_KEYS);

        sqlx::query(&format!(
            "INSERT INTO {table} (created_at_time, value) VALUES ($1, $2)"
        ))
        .bind(key.created_at_time)
        .bind(&key.value)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    /// Keys created at or after the cutoff, oldest first.
    pub async fn list_access_token_keys_since(
        uow: &mut UnitOfWork<'_>,
        since: i64,
    ) -> Result<Vec<AccessTokenSigningKey>, StorageError> {
        let table = uow.table(tables::ACCESS_TOKEN_SIGNING_KEYS);

        sqlx::query_as::<_, AccessTokenSigningKey>(&format!(
            "SELECT created_at_time, value FROM {table}
             WHERE created_at_time >= $1 ORDER BY created_at_time"
        ))
        .bind(since)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked variant of
    /// [`list_access_token_keys_since`](Self::list_access_token_keys_since),
    /// for the rotation sequence.
    pub async fn list_access_token_keys_since_locked(
        uow: &mut UnitOfWork<'_>,
        since: i64,
    ) -> Result<Vec<AccessTokenSigningKey>, StorageError> {
        let table = uow.table(tables::ACCESS_TOKEN_SIGNING_KEYS);

        sqlx::query_as::<_, AccessTokenSigningKey>(&format!(
            "SELECT created_at_time, value FROM {table}
             WHERE created_at_time >= $1 ORDER BY created_at_time FOR UPDATE"
        ))
        .bind(since)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Drop keys older than the retention cutoff.
    pub async fn delete_access_token_keys_before(
        uow: &mut UnitOfWork<'_>,
        cutoff: i64,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::ACCESS_TOKEN_SIGNING_KEYS);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE created_at_time < $1"
        ))
        .bind(cutoff)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        tracing::debug!(removed = result.rows_affected(), "swept retired access token signing keys");
        Ok(result.rows_affected())
    }
}
