use crate::storage::{
    StorageError, UnitOfWork, ensure_affected, tables, validate_table_schema,
};

use super::types::{PasswordlessCode, PasswordlessDevice, PasswordlessUser};

/// Repository for passwordless users, devices, and codes.
pub struct PasswordlessStore;

impl PasswordlessStore {
    pub(crate) async fn create_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        let users = uow.table(tables::PASSWORDLESS_USERS);
        let users_pkey = uow.constraint(tables::PASSWORDLESS_USERS, "pkey");
        let users_email_key = uow.constraint(tables::PASSWORDLESS_USERS, "email_key");
        let users_phone_key = uow.constraint(tables::PASSWORDLESS_USERS, "phone_number_key");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {users} (
                user_id VARCHAR(36) NOT NULL,
                email VARCHAR(256),
                phone_number VARCHAR(256),
                time_joined BIGINT NOT NULL,
                CONSTRAINT {users_pkey} PRIMARY KEY (user_id),
                CONSTRAINT {users_email_key} UNIQUE (email),
                CONSTRAINT {users_phone_key} UNIQUE (phone_number)
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let devices = uow.table(tables::PASSWORDLESS_DEVICES);
        let devices_pkey = uow.constraint(tables::PASSWORDLESS_DEVICES, "pkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {devices} (
                device_id_hash VARCHAR(44) NOT NULL,
                email VARCHAR(256),
                phone_number VARCHAR(256),
                link_code_salt VARCHAR(44) NOT NULL,
                failed_attempts INTEGER NOT NULL,
                CONSTRAINT {devices_pkey} PRIMARY KEY (device_id_hash)
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let devices_email_index = uow.index(tables::PASSWORDLESS_DEVICES, "email");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {devices_email_index} ON {devices} (email)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let devices_phone_index = uow.index(tables::PASSWORDLESS_DEVICES, "phone_number");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {devices_phone_index} ON {devices} (phone_number)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let codes = uow.table(tables::PASSWORDLESS_CODES);
        let codes_pkey = uow.constraint(tables::PASSWORDLESS_CODES, "pkey");
        let codes_link_key = uow.constraint(tables::PASSWORDLESS_CODES, "link_code_hash_key");
        let codes_device_fkey = uow.constraint(tables::PASSWORDLESS_CODES, "device_id_hash_fkey");

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {codes} (
                code_id VARCHAR(36) NOT NULL,
                device_id_hash VARCHAR(44) NOT NULL,
                link_code_hash VARCHAR(44) NOT NULL,
                created_at BIGINT NOT NULL,
                CONSTRAINT {codes_pkey} PRIMARY KEY (code_id),
                CONSTRAINT {codes_link_key} UNIQUE (link_code_hash),
                CONSTRAINT {codes_device_fkey} FOREIGN KEY (device_id_hash)
                    REFERENCES {devices} (device_id_hash) ON DELETE CASCADE
            )
            "#
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let codes_created_index = uow.index(tables::PASSWORDLESS_CODES, "created_at");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {codes_created_index} ON {codes} (created_at)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        let codes_device_index = uow.index(tables::PASSWORDLESS_CODES, "device_id_hash");
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS {codes_device_index} ON {codes} (device_id_hash)"
        ))
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub(crate) async fn validate_tables(uow: &mut UnitOfWork<'_>) -> Result<(), StorageError> {
        validate_table_schema(
            uow,
            tables::PASSWORDLESS_USERS,
            &[
                ("user_id", "character varying"),
                ("email", "character varying"),
                ("phone_number", "character varying"),
                ("time_joined", "bigint"),
            ],
        )
        .await?;

        validate_table_schema(
            uow,
            tables::PASSWORDLESS_DEVICES,
            &[
                ("device_id_hash", "character varying"),
                ("email", "character varying"),
                ("phone_number", "character varying"),
                ("link_code_salt", "character varying"),
                ("failed_attempts", "integer"),
            ],
        )
        .await?;

        validate_table_schema(
            uow,
            tables::PASSWORDLESS_CODES,
            &[
                ("code_id", "character varying"),
                ("device_id_hash", "character varying"),
                ("link_code_hash", "character varying"),
                ("created_at", "bigint"),
            ],
        )
        .await
    }

    // ---- users ----

    /// Insert a user. Conflict when the user id, email, or phone number is
    /// already taken.
    pub async fn insert_user(
        uow: &mut UnitOfWork<'_>,
        user: &PasswordlessUser,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_USERS);

        sqlx::query(&format!(
            "INSERT INTO {table} (user_id, email, phone_number, time_joined)
             VALUES ($1, $2, $3, $4)"
        ))
        .bind(&user.user_id)
        .bind(&user.email)
        .bind(&user.phone_number)
        .bind(user.time_joined)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get_user_by_id(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
    ) -> Result<Option<PasswordlessUser>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_USERS);

        sqlx::query_as::<_, PasswordlessUser>(&format!(
            "SELECT user_id, email, phone_number, time_joined FROM {table} WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn get_user_by_email(
        uow: &mut UnitOfWork<'_>,
        email: &str,
    ) -> Result<Option<PasswordlessUser>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_USERS);

        sqlx::query_as::<_, PasswordlessUser>(&format!(
            "SELECT user_id, email, phone_number, time_joined FROM {table} WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn get_user_by_phone_number(
        uow: &mut UnitOfWork<'_>,
        phone_number: &str,
    ) -> Result<Option<PasswordlessUser>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_USERS);

        sqlx::query_as::<_, PasswordlessUser>(&format!(
            "SELECT user_id, email, phone_number, time_joined FROM {table} WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// NotFound when the user does not exist; Conflict when the new email
    /// belongs to someone else. `None` clears the field.
    pub async fn update_user_email(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        email: Option<&str>,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_USERS);

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

    pub async fn update_user_phone_number(
        uow: &mut UnitOfWork<'_>,
        user_id: &str,
        phone_number: Option<&str>,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_USERS);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET phone_number = $1 WHERE user_id = $2"
        ))
        .bind(phone_number)
        .bind(user_id)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    pub async fn delete_user(uow: &mut UnitOfWork<'_>, user_id: &str) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_USERS);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    // ---- devices ----

    /// Insert a device. Conflict when the device id hash already exists.
    pub async fn insert_device(
        uow: &mut UnitOfWork<'_>,
        device: &PasswordlessDevice,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        sqlx::query(&format!(
            "INSERT INTO {table}
             (device_id_hash, email, phone_number, link_code_salt, failed_attempts)
             VALUES ($1, $2, $3, $4, $5)"
        ))
        .bind(&device.device_id_hash)
        .bind(&device.email)
        .bind(&device.phone_number)
        .bind(&device.link_code_salt)
        .bind(device.failed_attempts)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get_device(
        uow: &mut UnitOfWork<'_>,
        device_id_hash: &str,
    ) -> Result<Option<PasswordlessDevice>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        sqlx::query_as::<_, PasswordlessDevice>(&format!(
            "SELECT device_id_hash, email, phone_number, link_code_salt, failed_attempts
             FROM {table} WHERE device_id_hash = $1"
        ))
        .bind(device_id_hash)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked read of a device, required before the failed-attempt
    /// increment so concurrent wrong-OTP submissions serialize.
    pub async fn get_device_locked(
        uow: &mut UnitOfWork<'_>,
        device_id_hash: &str,
    ) -> Result<Option<PasswordlessDevice>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        sqlx::query_as::<_, PasswordlessDevice>(&format!(
            "SELECT device_id_hash, email, phone_number, link_code_salt, failed_attempts
             FROM {table} WHERE device_id_hash = $1 FOR UPDATE"
        ))
        .bind(device_id_hash)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Bump the failed-attempt counter. NotFound when the device is gone.
    pub async fn increment_failed_attempts(
        uow: &mut UnitOfWork<'_>,
        device_id_hash: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        let result = sqlx::query(&format!(
            "UPDATE {table} SET failed_attempts = failed_attempts + 1
             WHERE device_id_hash = $1"
        ))
        .bind(device_id_hash)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// Delete a device; its codes cascade within the same transaction.
    pub async fn delete_device(
        uow: &mut UnitOfWork<'_>,
        device_id_hash: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        let result = sqlx::query(&format!(
            "DELETE FROM {table} WHERE device_id_hash = $1"
        ))
        .bind(device_id_hash)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    pub async fn list_devices_by_email(
        uow: &mut UnitOfWork<'_>,
        email: &str,
    ) -> Result<Vec<PasswordlessDevice>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        sqlx::query_as::<_, PasswordlessDevice>(&format!(
            "SELECT device_id_hash, email, phone_number, link_code_salt, failed_attempts
             FROM {table} WHERE email = $1"
        ))
        .bind(email)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn list_devices_by_phone_number(
        uow: &mut UnitOfWork<'_>,
        phone_number: &str,
    ) -> Result<Vec<PasswordlessDevice>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        sqlx::query_as::<_, PasswordlessDevice>(&format!(
            "SELECT device_id_hash, email, phone_number, link_code_salt, failed_attempts
             FROM {table} WHERE phone_number = $1"
        ))
        .bind(phone_number)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Remove every device registered to an email. Codes cascade. Returns
    /// the number of devices removed.
    pub async fn delete_devices_by_email(
        uow: &mut UnitOfWork<'_>,
        email: &str,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE email = $1"))
            .bind(email)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    pub async fn delete_devices_by_phone_number(
        uow: &mut UnitOfWork<'_>,
        phone_number: &str,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_DEVICES);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE phone_number = $1"))
            .bind(phone_number)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(result.rows_affected())
    }

    // ---- codes ----

    /// Insert a code. UnknownParent when the device does not exist;
    /// Conflict when the code id or link-code hash is already in use.
    pub async fn insert_code(
        uow: &mut UnitOfWork<'_>,
        code: &PasswordlessCode,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_CODES);

        sqlx::query(&format!(
            "INSERT INTO {table} (code_id, device_id_hash, link_code_hash, created_at)
             VALUES ($1, $2, $3, $4)"
        ))
        .bind(&code.code_id)
        .bind(&code.device_id_hash)
        .bind(&code.link_code_hash)
        .bind(code.created_at)
        .execute(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)?;

        Ok(())
    }

    pub async fn get_code(
        uow: &mut UnitOfWork<'_>,
        code_id: &str,
    ) -> Result<Option<PasswordlessCode>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_CODES);

        sqlx::query_as::<_, PasswordlessCode>(&format!(
            "SELECT code_id, device_id_hash, link_code_hash, created_at
             FROM {table} WHERE code_id = $1"
        ))
        .bind(code_id)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn get_code_by_link_code_hash(
        uow: &mut UnitOfWork<'_>,
        link_code_hash: &str,
    ) -> Result<Option<PasswordlessCode>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_CODES);

        sqlx::query_as::<_, PasswordlessCode>(&format!(
            "SELECT code_id, device_id_hash, link_code_hash, created_at
             FROM {table} WHERE link_code_hash = $1"
        ))
        .bind(link_code_hash)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    /// Locked read by link-code hash, for consume-code flows.
    pub async fn get_code_by_link_code_hash_locked(
        uow: &mut UnitOfWork<'_>,
        link_code_hash: &str,
    ) -> Result<Option<PasswordlessCode>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_CODES);

        sqlx::query_as::<_, PasswordlessCode>(&format!(
            "SELECT code_id, device_id_hash, link_code_hash, created_at
             FROM {table} WHERE link_code_hash = $1 FOR UPDATE"
        ))
        .bind(link_code_hash)
        .fetch_optional(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn list_codes_for_device(
        uow: &mut UnitOfWork<'_>,
        device_id_hash: &str,
    ) -> Result<Vec<PasswordlessCode>, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_CODES);

        sqlx::query_as::<_, PasswordlessCode>(&format!(
            "SELECT code_id, device_id_hash, link_code_hash, created_at
             FROM {table} WHERE device_id_hash = $1 ORDER BY created_at, code_id"
        ))
        .bind(device_id_hash)
        .fetch_all(uow.conn())
        .await
        .map_err(StorageError::from_sqlx)
    }

    pub async fn delete_code(
        uow: &mut UnitOfWork<'_>,
        code_id: &str,
    ) -> Result<(), StorageError> {
        let table = uow.table(tables::PASSWORDLESS_CODES);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE code_id = $1"))
            .bind(code_id)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        ensure_affected(result.rows_affected())
    }

    /// Time-based sweep of stale codes.
    pub async fn delete_codes_created_before(
        uow: &mut UnitOfWork<'_>,
        cutoff: i64,
    ) -> Result<u64, StorageError> {
        let table = uow.table(tables::PASSWORDLESS_CODES);

        let result = sqlx::query(&format!("DELETE FROM {table} WHERE created_at < $1"))
            .bind(cutoff)
            .execute(uow.conn())
            .await
            .map_err(StorageError::from_sqlx)?;

        tracing::debug!(removed = result.rows_affected(), "swept stale passwordless codes");
        Ok(result.rows_affected())
    }
}
