use crate::storage::{
    StorageError, UnitOfWork, ensure_affected, tables, validate_table_schema,
};

use super::types::{EmailPasswordUser, PasswordResetToken};

/// Repository for emailpassword users and their password-reset tokens.
pub struct EmailPasswordStore;

impl EmailPasswordStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let users = uow.table(tables::EMAILPASSWORD_USERS);
        let users_pkey = uow.constraint(tables::EMAILPASSWORD_USERS, "pkey");
        let users_email_key = uow.constraint(tables::EMAILPASSWORD_USERS, "email_key");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {users} (
                user_id VARCHAR(36) NOT NULL,
                email VARCHAR(256) NOT NULL,
                password_hash VARCHAR(256) NOT NULL,
                time_joined BIGINT NOT NULL,
                CONSTRAINT {users_pkey} PRIMARY KEY (user_id),
                CONSTRAINT {users_email_key} UNIQUE (email)
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let tokens = uow.table(tables::EMAILPASSWORD_PSWD_RESET_TOKENS);
        let tokens_pkey = uow.constraint(tables::EMAILPASSWORD_PSWD_RESET_TOKENS, "pkey");
        let tokens_token_key = uow.constraint(tables::EMAILPASSWORD_PSWD_RESET_TOKENS, "token_key");
        let tokens_user_fkey = uow.constraint(tables::EMAILPASSWORD_PSWD_RESET_TOKENS, "user_id_fkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {tokens} (
                user_id VARCHAR(36) NOT NULL,
                token VARCHAR(128) NOT NULL,
                token_expiry BIGINT NOT NULL,
                CONSTRAINT {tokens_pkey} PRIMARY KEY (user_id, token),
                CONSTRAINT {tokens_token_key} UNIQUE (token),
                CONSTRAINT {tokens_user_fkey} FOREIGN KEY (user_id)
                    REFERENCES {users} (user_id) ON DELETE CASCADE
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        // Sweep deletes scan by expiry
        let expiry_index = uow.index(tables::EMAILPASSWORD_PSWD_RESET_TOKENS, "token_expiry");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {expiry_index} ON {tokens} (token_expiry)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub(crate) async fn validate_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        validate_table_schema(
            uow,
            tables::EMAILPASSWORD_USERS,
            &[
                ("user_id", "character varying"),
                ("email", "character varying"),
                ("password_hash", "character varying"),
                ("time_joined", "bigint"),
            ],
        )
        .await?;

        validate_table_schema(
            uow,
            tables::EMAILPASSWORD_PSWD_RESET_TOKENS,
            &[
                ("user_id", "character varying"),
                ("token", "character varying"),
                ("token_expiry", "bigint"),
            ],
        )
        .await
    }

    /// Insert a user. Conflict when the user id or email already exists.
    pub async fn insert_user(
        uow: &mut UnitOfWork<'_>,
        user: &EmailPasswordUser,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_USERS);

        sqlx::query(&format!(
            "INSERT INTO {table} (user_id, email, password_hash, time_joined)
             VALUES ($1, $2, $3, $4)"
        ))
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.time_joined)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get_user_by_id(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Option<EmailPasswordUser>, StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_USERS);

        sqlx::query_as::<_, EmailPasswordUser>(&format!(
            "SELECT user_id, email, password_hash, time_joined FROM {table} WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked read of a user row (`SELECT ... FOR UPDATE`). Blocks
    /// concurrent lockers of the same row until this unit of work ends;
    /// required before any read-then-conditionally-write sequence on the
    /// row.
    pub async fn get_user_by_id_locked(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Option<EmailPasswordUser>, StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_USERS);

        sqlx::query_as::<_, EmailPasswordUser>(&format!(
            "SELECT user_id, email, password_hash, time_joined FROM {table}
             WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn get_user_by_email(
        uow: &mut UnitOfWork<'_>,
        email: &str,
    ) -> Result<Option<EmailPasswordUser>, StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_USERS);

        sqlx::query_as::<_, EmailPasswordUser>(&format!(
            "SELECT user_id, email, password_hash, time_joined FROM {table} WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// NotFound when the user does not exist.
    pub async fn update_password_hash(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        password_hash: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_USERS);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET password_hash = $1 WHERE user_id = $2"
        ))
        .bind(password_hash)
        .bind(user_id)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// NotFound when the user does not exist; Conflict when the new email
    /// is already taken.
    pub async fn update_email(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        email: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_USERS);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET email = $1 WHERE user_id = $2"
        ))
        .bind(email)
        .bind(user_id)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// Delete a user. Their password-reset tokens cascade within the same
    /// transaction.
    pub async fn delete_user(uow: &mut UnitOfWork<'_>, user_id: &str) -> Result<(), StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_USERS);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// Insert a reset token. UnknownParent when the user does not exist;
    /// Conflict when the token value is already in use.
    pub async fn insert_password_reset_token(
        uow: &mut UnitOfWork<'_>,
        token: &PasswordResetToken,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_PSWD_RESET_TOKENS);

        sqlx::query(&format!(
            "INSERT INTO {table} (user_id, token, token_expiry) VALUES ($1, $2, $3)"
        ))
        .bind(&token.user_id)
        .bind(&token.token)
        .bind(token.token_expiry)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get_password_reset_token(
        uow: &mut UnitOfWork<'_>,
        token: &str,
    ) -> Result<Option<PasswordResetToken>, StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_PSWD_RESET_TOKENS);

        sqlx::query_as::<_, PasswordResetToken>(&format!(
            "SELECT user_id, token, token_expiry FROM {table} WHERE token = $1"
        ))
        .bind(token)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn get_password_reset_tokens_for_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Vec<PasswordResetToken>, StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_PSWD_RESET_TOKENS);

        sqlx::query_as::<_, PasswordResetToken>(&format!(
            "SELECT user_id, token, token_expiry FROM {table} WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked listing of a user's reset tokens, for consume-token flows:
    /// lock, verify, delete, commit.
    pub async fn get_password_reset_tokens_for_user_locked(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Vec<PasswordResetToken>, StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_PSWD_RESET_TOKENS);

        sqlx::query_as::<_, PasswordResetToken>(&format!(
            "SELECT user_id, token, token_expiry FROM {table} WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Remove every reset token of a user. Returns the number of rows
    /// removed; zero is a valid outcome.
    pub async fn delete_password_reset_tokens_for_user(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_PSWD_RESET_TOKENS);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    /// Time-based sweep of expired reset tokens.
    pub async fn delete_expired_password_reset_tokens(
        uow: &mut UnitOfWork<'_>,
        now: i64,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::EMAILPASSWORD_PSWD_RESET_TOKENS);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE token_expiry < $1"))
            .bind(now)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        tracing::debug!(removed = result.rows_affected(), "swept expired password reset tokens");
        Ok(result.rows_affected())
    }
}
