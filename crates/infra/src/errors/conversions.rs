//! Conversions from external infrastructure errors into domain errors.

use redis::RedisError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use storesync_common::ResilienceError;
use storesync_domain::StoreSyncError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub StoreSyncError);

impl From<InfraError> for StoreSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<StoreSyncError> for InfraError {
    fn from(value: StoreSyncError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoStoreSyncError {
    fn into_storesync(self) -> StoreSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStoreSyncError for SqlError {
    fn into_storesync(self) -> StoreSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        StoreSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        StoreSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        StoreSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        StoreSyncError::Database("foreign key constraint violation".into())
                    }
                    _ => StoreSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => StoreSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                StoreSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                StoreSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                StoreSyncError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidParameterName(parameter_name) => {
                StoreSyncError::Database(format!("invalid parameter name: {parameter_name}"))
            }
            RE::InvalidPath(path) => StoreSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => StoreSyncError::Database("invalid SQL query".into()),
            other => StoreSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_storesync())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(StoreSyncError::Database(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStoreSyncError for HttpError {
    fn into_storesync(self) -> StoreSyncError {
        if self.is_timeout() {
            return StoreSyncError::Timeout("HTTP request timed out".into());
        }

        if self.is_connect() {
            return StoreSyncError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return StoreSyncError::Upstream {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown status").to_string(),
            };
        }

        if self.is_decode() {
            return StoreSyncError::InvalidPayload(format!("undecodable response body: {self}"));
        }

        StoreSyncError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_storesync())
    }
}

/* -------------------------------------------------------------------------- */
/* redis::RedisError → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl IntoStoreSyncError for RedisError {
    fn into_storesync(self) -> StoreSyncError {
        if self.is_timeout() {
            StoreSyncError::Timeout(format!("redis: {self}"))
        } else if self.is_io_error() || self.is_connection_dropped() || self.is_connection_refusal()
        {
            StoreSyncError::Unavailable(format!("redis: {self}"))
        } else {
            StoreSyncError::Internal(format!("redis: {self}"))
        }
    }
}

impl From<RedisError> for InfraError {
    fn from(value: RedisError) -> Self {
        InfraError(value.into_storesync())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(StoreSyncError::Database(format!("corrupt JSON column: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* ResilienceError → StoreSyncError */
/* -------------------------------------------------------------------------- */

impl<E> From<ResilienceError<E>> for InfraError
where
    E: std::error::Error + Send + Sync + 'static + Into<StoreSyncError>,
{
    fn from(value: ResilienceError<E>) -> Self {
        InfraError(match value {
            ResilienceError::CircuitOpen { key } => StoreSyncError::CircuitOpen(key),
            ResilienceError::RateLimited { key, retry_after } => StoreSyncError::RateLimited {
                key,
                retry_after_ms: u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
            },
            ResilienceError::StoreUnavailable { message } => StoreSyncError::Unavailable(message),
            ResilienceError::OperationFailed { source } => source.into(),
            ResilienceError::InvalidConfiguration { message } => StoreSyncError::Config(message),
        })
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
