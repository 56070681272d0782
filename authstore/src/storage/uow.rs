//! Connection pool and unit-of-work lifecycle.

use std::str::FromStr;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::catalog::TableCatalog;
use super::config::StorageConfig;
use super::errors::StorageError;

/// Handle to the storage backend: connection pool plus table catalog.
///
/// One instance per configured database; cheap to share by reference. The
/// pool is the only shared mutable resource in the layer. There is no
/// cross-request in-process cache, so every read observes current backend
/// state.
#[derive(Debug, Clone)]
pub struct AuthStorage {
    pool: PgPool,
    catalog: TableCatalog,
    lock_timeout_ms: u64,
}

impl AuthStorage {
    /// Build the pool and catalog from an explicit configuration value.
    ///
    /// The pool connects lazily; the first unit of work pays the
    /// connection cost.
    pub fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;

        let options =
            PgConnectOptions::from_str(&config.database_url).map_err(StorageError::from_sqlx)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(options);

        tracing::info!(
            max_connections = config.max_connections,
            prefix = %config.table_prefix,
            schema = config.schema.as_deref().unwrap_or("<default>"),
            "initialized PostgreSQL pool"
        );

        Ok(Self {
            pool,
            catalog: TableCatalog::from_config(config),
            lock_timeout_ms: config.lock_timeout.as_millis() as u64,
        })
    }

    pub fn catalog(&self) -> &TableCatalog {
        &self.catalog
    }

    /// Open a unit of work: one pooled connection, one transaction.
    ///
    /// Exactly one transaction is active per unit of work; nesting is not
    /// supported. The configured lock wait bound is applied with
    /// `SET LOCAL`, so it expires with the transaction. Suspension points
    /// are pool acquisition here and row-lock contention inside locked
    /// reads.
    pub async fn begin(&self) -> Result<UnitOfWork<'_>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from_sqlx)?;

        // lock_timeout takes a bare integer as milliseconds; SET cannot
        // carry bind parameters.
        sqlx::query(&format!("SET LOCAL lock_timeout = {}", self.lock_timeout_ms))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from_sqlx)?;

        Ok(UnitOfWork {
            tx,
            catalog: &self.catalog,
        })
    }

    /// Ping the backend.
    pub async fn health_check(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StorageError::from_sqlx)?;
        Ok(())
    }

    /// Create every table, index, and constraint the layer relies on.
    /// Idempotent; safe to call on every startup.
    pub async fn create_tables(&self) -> Result<(), StorageError> {
        let mut uow = self.begin().await?;

        if let Some(schema) = self.catalog.schema() {
            sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {schema}"))
                .execute(uow.conn())
                .await
                .map_err(StorageError::from_sqlx)?;
        }

        crate::users::UserStore::create_tables(&mut uow).await?;
        crate::emailpassword::EmailPasswordStore::create_tables(&mut uow).await?;
        crate::thirdparty::ThirdPartyStore::create_tables(&mut uow).await?;
        crate::passwordless::PasswordlessStore::create_tables(&mut uow).await?;
        crate::session::SessionStore::create_tables(&mut uow).await?;
        crate::signingkeys::SigningKeyStore::create_tables(&mut uow).await?;
        crate::emailverification::EmailVerificationStore::create_tables(&mut uow).await?;
        crate::userroles::UserRolesStore::create_tables(&mut uow).await?;
        crate::useridmapping::UserIdMappingStore::create_tables(&mut uow).await?;
        crate::usermetadata::UserMetadataStore::create_tables(&mut uow).await?;
        crate::keyvalue::KeyValueStore::create_tables(&mut uow).await?;

        uow.commit().await?;
        tracing::info!("storage tables ready");
        Ok(())
    }

    /// Validate the deployed schema against the expected column sets.
    pub async fn validate_schema(&self) -> Result<(), StorageError> {
        let mut uow = self.begin().await?;

        crate::users::UserStore::validate_tables(&mut uow).await?;
        crate::emailpassword::EmailPasswordStore::validate_tables(&mut uow).await?;
        crate::thirdparty::ThirdPartyStore::validate_tables(&mut uow).await?;
        crate::passwordless::PasswordlessStore::validate_tables(&mut uow).await?;
        crate::session::SessionStore::validate_tables(&mut uow).await?;
        crate::signingkeys::SigningKeyStore::validate_tables(&mut uow).await?;
        crate::emailverification::EmailVerificationStore::validate_tables(&mut uow).await?;
        crate::userroles::UserRolesStore::validate_tables(&mut uow).await?;
        crate::useridmapping::UserIdMappingStore::validate_tables(&mut uow).await?;
        crate::usermetadata::UserMetadataStore::validate_tables(&mut uow).await?;
        crate::keyvalue::KeyValueStore::validate_tables(&mut uow).await?;

        uow.rollback().await
    }
}

/// A scoped connection + transaction: the unit-of-work handle passed by the
/// caller into every repository call.
///
/// Writes become visible only on [`commit`](Self::commit). Dropping an
/// uncommitted unit of work rolls it back, and on every exit path the
/// connection returns to the pool exactly once. Row locks taken by
/// `get_*_locked` calls are held until the unit of work ends.
pub struct UnitOfWork<'a> {
    tx: Transaction<'static, Postgres>,
    catalog: &'a TableCatalog,
}

impl UnitOfWork<'_> {
    /// Make all writes of this unit of work visible and release the
    /// connection. A failed commit leaves the unit of work fully rolled
    /// back.
    pub async fn commit(self) -> Result<(), StorageError> {
        self.tx.commit().await.map_err(StorageError::from_sqlx)
    }

    /// Discard all writes and release the connection.
    pub async fn rollback(self) -> Result<(), StorageError> {
        self.tx.rollback().await.map_err(StorageError::from_sqlx)
    }

    pub fn catalog(&self) -> &TableCatalog {
        self.catalog
    }

    pub(crate) fn conn(&mut self) -> &mut PgConnection {
        &mut self.tx
    }

    pub(crate) fn table(&self, logical: &str) -> String {
        self.catalog.table(logical)
    }

    pub(crate) fn index(&self, logical: &str, suffix: &str) -> String {
        self.catalog.index(logical, suffix)
    }

    pub(crate) fn constraint(&self, logical: &str, suffix: &str) -> String {
        self.catalog.constraint(logical, suffix)
    }
}
