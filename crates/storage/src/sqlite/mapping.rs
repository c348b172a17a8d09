use drill_core::model::Session;
use sqlx::Row;

use crate::record::SessionRecord;
use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn session_payload(session: &Session) -> Result<String, StorageError> {
    serde_json::to_string(&SessionRecord::from_session(session)).map_err(ser)
}

/// Decode the `payload` column of a session row into its persisted shape.
pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let payload: String = row.try_get("payload").map_err(ser)?;
    let mut record: SessionRecord = serde_json::from_str(&payload).map_err(ser)?;
    // The key column is authoritative over whatever id the payload carries.
    record.id = Some(id);
    Ok(record)
}

pub(crate) fn count_from_i64(v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid count: {v}")))
}
