//! Domain error taxonomy and backend failure translation.
//!
//! Every write operation funnels backend failures through
//! [`StorageError::from_sqlx`], which reclassifies them into exactly one
//! domain kind. Nothing is swallowed: domain errors are typed returns to
//! the immediate caller, and anything unrecognized surfaces unchanged as
//! [`StorageError::Fatal`].

use thiserror::Error;

use sqlx::error::ErrorKind;

/// PostgreSQL `lock_not_available`, raised when `lock_timeout` expires.
const SQLSTATE_LOCK_NOT_AVAILABLE: &str = "55P03";
/// PostgreSQL `deadlock_detected`.
const SQLSTATE_DEADLOCK_DETECTED: &str = "40P01";

/// Error kinds surfaced by every storage operation.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A uniqueness constraint was violated. Recoverable: the caller picks
    /// a different value or treats the row as already existing. Tagged with
    /// the violated constraint so the caller can tell which field clashed.
    #[error("conflict on unique constraint {constraint}")]
    Conflict { constraint: String },

    /// A targeted row is absent. Recoverable; usually means the caller's
    /// reference is stale.
    #[error("row not found")]
    NotFound,

    /// An insert referenced a parent row that does not exist.
    #[error("unknown parent row (constraint {constraint})")]
    UnknownParent { constraint: String },

    /// Malformed caller input, rejected before any query executes.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A row lock could not be acquired within the configured wait window,
    /// or a deadlock was detected. The whole unit of work must be rolled
    /// back and retried from the beginning, never resumed.
    #[error("lock wait timed out")]
    LockTimeout,

    /// Any other backend failure, surfaced unchanged and never retried by
    /// this layer.
    #[error("database error: {0}")]
    Fatal(#[source] sqlx::Error),
}

impl StorageError {
    /// Reclassify a backend failure into exactly one domain kind.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if matches!(err, sqlx::Error::RowNotFound) {
            return Self::NotFound;
        }
        if let sqlx::Error::Database(ref db) = err {
            match db.kind() {
                ErrorKind::UniqueViolation => {
                    return Self::Conflict {
                        constraint: db.constraint().unwrap_or("unknown").to_string(),
                    };
                }
                ErrorKind::ForeignKeyViolation => {
                    return Self::UnknownParent {
                        constraint: db.constraint().unwrap_or("unknown").to_string(),
                    };
                }
                _ => {}
            }
            if let Some(code) = db.code() {
                if let Some(translated) = Self::from_sqlstate(&code) {
                    return translated;
                }
            }
        }
        Self::Fatal(err)
    }

    fn from_sqlstate(code: &str) -> Option<Self> {
        match code {
            SQLSTATE_LOCK_NOT_AVAILABLE | SQLSTATE_DEADLOCK_DETECTED => Some(Self::LockTimeout),
            _ => None,
        }
    }

    /// Fatal error carrying a plain message, for failures (schema drift,
    /// bad deployment state) that do not originate in a driver call.
    pub(crate) fn fatal_msg(message: impl Into<String>) -> Self {
        Self::Fatal(sqlx::Error::Configuration(message.into().into()))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout)
    }
}

/// Map zero rows affected on a targeted update/delete to [`StorageError::NotFound`].
///
/// Callers that require the row to exist must treat zero rows as an error,
/// never a silent success.
pub(crate) fn ensure_affected(rows: u64) -> Result<(), StorageError> {
    if rows == 0 {
        Err(StorageError::NotFound)
    } else {
        Ok(())
    }
}
