use rusqlite::{ErrorCode, ffi};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The database stayed locked past the busy timeout.
    #[error("store is busy: {0}")]
    Busy(#[source] rusqlite::Error),

    /// A compare-and-set write lost to a concurrent writer.
    #[error("concurrent modification of {entity} {id}")]
    Conflict { entity: &'static str, id: String },

    #[error("corrupt {column} in {table}: {detail}")]
    Corrupt {
        table: &'static str,
        column: &'static str,
        detail: String,
    },

    #[error("failed to prepare database file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[source] rusqlite::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    pub(crate) fn corrupt(
        table: &'static str,
        column: &'static str,
        detail: impl ToString,
    ) -> Self {
        Self::Corrupt {
            table,
            column,
            detail: detail.to_string(),
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Busy(err)
            }
            _ => Self::Sqlite(err),
        }
    }
}

/// A UNIQUE or PRIMARY KEY violation: another writer already holds the key.
/// NOT NULL and CHECK failures are not conflicts.
pub(crate) fn is_key_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(
                failure.extended_code,
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            )
    )
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;
