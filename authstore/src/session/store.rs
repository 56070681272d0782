use crate::storage::{
    StorageError, UnitOfWork, ensure_affected, tables, validate_table_schema,
};

use super::types::SessionInfo;

/// Repository for session records.
pub struct SessionStore;

impl SessionStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let table = uow.table(tables::SESSION_INFO);
        let pkey = uow.constraint(tables::SESSION_INFO, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                session_handle VARCHAR(36) NOT NULL,
                user_id VARCHAR(36) NOT NULL,
                refresh_token_hash_2 VARCHAR(128) NOT NULL,
                session_data JSONB NOT NULL,
                expires_at BIGINT NOT NULL,
                created_at_time BIGINT NOT NULL,
                jwt_user_payload JSONB NOT NULL,
                CONSTRAINT {pkey} PRIMARY KEY (session_handle)
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let user_index = uow.index(tables::SESSION_INFO, "user_id");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {user_index} ON {table} (user_id)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let expiry_index = uow.index(tables::SESSION_INFO, "expires_at");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {expiry_index} ON {table} (expires_at)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub(crate) async fn validate_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        validate_table_schema(
            uow,
            tables::SESSION_INFO,
            &[
                ("session_handle", "character varying"),
                ("user_id", "character varying"),
                ("refresh_token_hash_2", "character varying"),
                ("session_data", "jsonb"),
                ("expires_at", "bigint"),
                ("created_at_time", "bigint"),
                ("jwt_user_payload", "jsonb"),
            ],
        )
        .await
    }

    /// Insert a session. Conflict when the handle already exists.
    pub async fn insert(
        uow: &mut UnitOfWork<'_>,
        session: &SessionInfo,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        sqlx::query(&format!(
            "INSERT INTO {table}
             (session_handle, user_id, refresh_token_hash_2, session_data,
              expires_at, created_at_time, jwt_user_payload)
             VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(&session.session_handle)
        .bind(&session.user_id)
        .bind(&session.refresh_token_hash_2)
        .bind(&session.session_data)
        .bind(session.expires_at)
        .bind(session.created_at_time)
        .bind(&session.jwt_user_payload)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get(
        uow: &mut UnitOfWork<'_>,
        session_handle: &str,
    ) -> Result<Option<SessionInfo>, StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        sqlx::query_as::<_, SessionInfo>(&format!(
            "SELECT session_handle, user_id, refresh_token_hash_2, session_data,
                    expires_at, created_at_time, jwt_user_payload
             FROM {table} WHERE session_handle = $1"
        ))
        .bind(session_handle)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked read of a session row. Refresh-token rotation must lock the
    /// row first so concurrent refresh calls serialize: the second caller
    /// blocks here until the first commits, then observes the rotated
    /// hash.
    pub async fn get_locked(
        uow: &mut UnitOfWork<'_>,
        session_handle: &str,
    ) -> Result<Option<SessionInfo>, StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        sqlx::query_as::<_, SessionInfo>(&format!(
            "SELECT session_handle, user_id, refresh_token_hash_2, session_data,
                    expires_at, created_at_time, jwt_user_payload
             FROM {table} WHERE session_handle = $1 FOR UPDATE"
        ))
        .bind(session_handle)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Replace the refresh-token hash and expiry. NotFound when the
    /// session is gone. Call only after [`get_locked`](Self::get_locked)
    /// in the same unit of work.
    pub async fn update_refresh_token_hash(
        uow: &mut UnitOfWork<'_>,
        session_handle: &str,
        refresh_token_hash_2: &str,
        expires_at: i64,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET refresh_token_hash_2 = $1, expires_at = $2
             WHERE session_handle = $3"
        ))
        .bind(refresh_token_hash_2)
        .bind(expires_at)
        .bind(session_handle)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    pub async fn update_session_data(
        uow: &mut UnitOfWork<'_>,
        session_handle: &str,
        session_data: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET session_data = $1 WHERE session_handle = $2"
        ))
        .bind(session_data)
        .bind(session_handle)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    pub async fn update_jwt_user_payload(
        uow: &mut UnitOfWork<'_>,
        session_handle: &str,
        jwt_user_payload: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET jwt_user_payload = $1 WHERE session_handle = $2"
        ))
        .bind(jwt_user_payload)
        .bind(session_handle)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    pub async fn list_handles_for_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Vec<String>, StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        sqlx::query_scalar(&format!(
            "SELECT session_handle FROM {table} WHERE user_id = $1 ORDER BY created_at_time"
        ))
        .bind(user_id)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn count_for_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<i64, StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .fetch_one(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)
    }

    pub async fn delete(
        uow: &mut UnitOfWork<'_>,
        session_handle: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE session_handle = $1"
        ))
        .bind(session_handle)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// Revoke every session of a user. Returns the number removed; zero
    /// is a valid outcome.
    pub async fn delete_all_for_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    /// Time-based sweep of expired sessions.
    pub async fn delete_expired(uow: &mut UnitOfWork<'_>, now: i64) -> Result<u64, StorageError> {
        let table = uow.table(tables::SESSION_INFO);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE expires_at < $1"))
            .bind(now)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        tracing::debug!(removed = result.rows_affected(), "swept expired sessions");
        Ok(result.rows_affected())
    }
}
