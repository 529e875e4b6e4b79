//! Error taxonomy of the scheduling core.

use crate::model::{BatchFailure, ConflictRecord, UnresolvedItem};
use rusqlite::ErrorCode;
use serde_json::json;

pub type ScheduleResult<T> = Result<T, ScheduleError>;

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// Malformed interval or an inactive/invalid reference.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The detector found blocking collisions.
    #[error("{} scheduling conflict(s)", .0.len())]
    Conflict(Vec<ConflictRecord>),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A concurrent writer won the race, surfaced by the storage layer.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    #[error("clone aborted: {} unresolvable item(s)", .0.len())]
    CloneAborted(Vec<UnresolvedItem>),

    #[error("batch rejected: {} failing item(s)", .0.len())]
    BatchRejected(Vec<BatchFailure>),

    #[error("storage error: {0}")]
    Storage(rusqlite::Error),
}

impl ScheduleError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable error code for the IPC envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Conflict(_) => "schedule_conflict",
            Self::NotFound { .. } => "not_found",
            Self::Concurrency(_) => "concurrency_conflict",
            Self::CloneAborted(_) => "clone_aborted",
            Self::BatchRejected(_) => "batch_rejected",
            Self::Storage(_) => "db_error",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Conflict(records) => Some(json!({ "conflicts": records })),
            Self::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            Self::CloneAborted(items) => Some(json!({ "unresolved": items })),
            Self::BatchRejected(failures) => Some(json!({ "failures": failures })),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for ScheduleError {
    fn from(e: rusqlite::Error) -> Self {
        let raced = matches!(
            &e,
            rusqlite::Error::SqliteFailure(f, _)
                if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    || f.code == ErrorCode::DatabaseBusy
                    || f.code == ErrorCode::DatabaseLocked
        );
        if raced {
            Self::Concurrency(e.to_string())
        } else {
            Self::Storage(e)
        }
    }
}
