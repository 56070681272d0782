use crate::storage::{
    StorageError, UnitOfWork, ensure_affected, tables, validate_table_schema,
};

use super::types::EmailVerificationToken;

/// Repository for email-verification tokens and verified-email pairs.
pub struct EmailVerificationStore;

impl EmailVerificationStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let tokens = uow.table(tables::EMAILVERIFICATION_TOKENS);
        let tokens_pkey = uow.constraint(tables::EMAILVERIFICATION_TOKENS, "pkey");
        let tokens_token_key = uow.constraint(tables::EMAILVERIFICATION_TOKENS, "token_key");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {tokens} (
                user_id VARCHAR(36) NOT NULL,
                email VARCHAR(256) NOT NULL,
                token VARCHAR(128) NOT NULL,
                token_expiry BIGINT NOT NULL,
                CONSTRAINT {tokens_pkey} PRIMARY KEY (user_id, email, token),
                CONSTRAINT {tokens_token_key} UNIQUE (token)
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let expiry_index = uow.index(tables::EMAILVERIFICATION_TOKENS, "token_expiry");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {expiry_index} ON {tokens} (token_expiry)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let verified = uow.table(tables::EMAILVERIFICATION_VERIFIED_EMAILS);
        let verified_pkey = uow.constraint(tables::EMAILVERIFICATION_VERIFIED_EMAILS, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {verified} (
                user_id VARCHAR(36) NOT NULL,
                email VARCHAR(256) NOT NULL,
                CONSTRAINT {verified_pkey} PRIMARY KEY (user_id, email)
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
            tables::EMAILVERIFICATION_TOKENS,
            &[
                ("user_id", "character varying"),
                ("email", "character varying"),
                ("token", "character varying"),
                ("token_expiry", "bigint"),
            ],
        )
        .await?;

        validate_table_schema(
            uow,
            tables::EMAILVERIFICATION_VERIFIED_EMAILS,
            &[("user_id", "character varying"), ("email", "character varying")],
        )
        .await
    }

    /// Insert a verification token. Conflict when the token value is
    /// already in use.
    pub async fn insert_token(
        uow: &mut UnitOfWork<'_>,
        token: &EmailVerificationToken,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::EMAILVERIFICATION_TOKENS);

        sqlx::query(&format!(
            "INSERT INTO {table} (user_id, email, token, token_expiry)
             VALUES ($1, $2, $3, $4)"
        ))
        .bind(&token.user_id)
        .bind(&token.email)
        .bind(&token.token)
        .bind(token.token_expiry)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get_token(
        uow: &mut UnitOfWork<'_>,
        token: &str,
    ) -> Result<Option<EmailVerificationToken>, StorageError> {
        let table = uow.table(tables::EMAILVERIFICATION_TOKENS);

        sqlx::query_as::<_, EmailVerificationToken>(&format!(
            "SELECT user_id, email, token, token_expiry FROM {table} WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked listing of the outstanding tokens for a (user, email) pair,
    /// for consume-token flows: lock, verify, mark verified, delete,
    /// commit.
    pub async fn list_tokens_locked(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        email: &str,
    ) -> Result<Vec<EmailVerificationToken>, StorageError> {
        let table = uow.table(tables::EMAILVERIFICATION_TOKENS);

        sqlx::query_as::<_, EmailVerificationToken>(&format!(
            "SELECT user_id, email, token, token_expiry FROM {table}
             WHERE user_id = $1 AND email = $2 FOR UPDATE"
        ))
        .bind(user_id)
        .bind(email)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Remove every token of a (user, email) pair. Returns the number
    /// removed; zero is a valid outcome.
    pub async fn delete_tokens(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        email: &str,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::EMAILVERIFICATION_TOKENS);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE user_id = $1 AND email = $2"
        ))
        .bind(user_id)
        .bind(email)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    /// Time-based sweep of expired verification tokens.
    pub async fn delete_expired_tokens(
        uow: &mut UnitOfWork<'_>,
        now: i64,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::EMAILVERIFICATION_TOKENS);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE token_expiry < $1"))
            .bind(now)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        tracing::debug!(removed = result.rows_affected(), "swept expired email verification tokens");
        Ok(result.rows_affected())
    }

    /// Record a (user, email) pair as verified. Conflict when it already
    /// is.
    pub async fn mark_email_verified(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        email: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::EMAILVERIFICATION_VERIFIED_EMAILS);

        sqlx::query(&format!(
            "INSERT INTO {table} (user_id, email) VALUES ($1, $2)"
        ))
        .bind(user_id)
        .bind(email)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    /// NotFound when the pair was not verified.
    pub async fn unmark_email_verified(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        email: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::EMAILVERIFICATION_VERIFIED_EMAILS);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE user_id = $1 AND email = $2"
        ))
        .bind(user_id)
        .bind(email)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    pub async fn is_email_verified(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        email: &str,
    ) -> Result<bool, StorageError> {
        let table = uow.table(tables::EMAILVERIFICATION_VERIFIED_EMAILS);

        sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT FROM {table} WHERE user_id = $1 AND email = $2)"
        ))
        .bind(user_id)
        .bind(email)
        .fetch_one(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }
}
