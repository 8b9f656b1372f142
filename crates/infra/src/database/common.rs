//! Row conversion helpers shared by the SQLite repositories

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use serde_json::Value;
use storesync_domain::{Result, StoreSyncError};
use tokio::task;

use super::manager::{DbManager, SqliteConnection};

/// Run `work` on the blocking pool with a pooled connection.
pub(crate) async fn with_connection<T, F>(db: &Arc<DbManager>, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
{
    let db = Arc::clone(db);
    task::spawn_blocking(move || -> Result<T> {
        let mut conn = db.get_connection()?;
        work(&mut conn)
    })
    .await
    .map_err(map_join_error)?
}

pub(crate) fn map_join_error(err: task::JoinError) -> StoreSyncError {
    if err.is_cancelled() {
        StoreSyncError::Internal("database task cancelled".into())
    } else {
        StoreSyncError::Internal(format!("database task panic: {err}"))
    }
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Integer,
            format!("timestamp out of range: {millis}").into(),
        )
    })
}

pub(crate) fn opt_from_millis(idx: usize, millis: Option<i64>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    millis.map(|m| from_millis(idx, m)).transpose()
}

/// Decode a JSON TEXT column
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_json_column(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<Value>> {
    raw.map(|text| json_column(idx, &text)).transpose()
}

pub(crate) fn to_json_text<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| StoreSyncError::Internal(format!("encode JSON column: {e}")))
}

pub(crate) const fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) const fn int_to_bool(value: i64) -> bool {
    value != 0
}

pub(crate) fn u32_column(idx: usize, value: i64) -> rusqlite::Result<u32> {
    u32::try_from(value).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn millis_round_trip() {
        let at = Utc.with_ymd_and_hms(2024, 5, 8, 12, 0, 0).unwrap();
        assert_eq!(from_millis(0, to_millis(at)).unwrap(), at);
        assert!(from_millis(0, i64::MAX).is_err());
    }

    #[test]
    fn negative_counters_are_rejected() {
        assert_eq!(u32_column(0, 3).unwrap(), 3);
        assert!(u32_column(0, -1).is_err());
    }
}
