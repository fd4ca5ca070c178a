//! Record operations.
//!
//! Every operation composes builders from [`crate::db::query`] with one
//! [`Executor`] and returns an [`Outcome`]. Nothing here returns `Err`: store
//! faults, rejected writes, and failed confirmatory reads are all folded into
//! a not-ok outcome whose [`OutcomeKind`] records which one happened.

pub mod rows;
mod staff;
mod trials;

use std::fmt;

use crate::db::{Executor, Query, RawOutcome, Store, StoreFailure};

pub use rows::{
    Assignment, AssignmentInput, FromRow, Role, StaffUser, Trial, TrialInput, TrialStatus,
    parse_id,
};
pub use staff::StaffRecords;
pub use trials::TrialRecords;

pub const MSG_RETRIEVED: &str = "Records retrieved successfully.";
pub const MSG_NO_RECORDS: &str = "No records found";
pub const MSG_CREATED: &str = "Record created successfully.";
pub const MSG_UPDATED: &str = "Record updated successfully.";
pub const MSG_DELETED: &str = "Record deleted successfully.";
pub const MSG_UPDATE_MISSING: &str = "Record not found; nothing was updated.";
pub const MSG_DELETE_MISSING: &str = "Record not found; nothing was deleted.";
pub const MSG_READ_BACK_FAILED: &str = "Record was written but could not be read back.";

/// Which of the result classes an outcome belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    /// A read matched no rows.
    NotFound,
    /// A keyed update or delete affected no rows.
    WriteRejected,
    /// A write ran but its confirmatory read failed or came back empty.
    ReadBackFailed,
    StoreFailure,
}

/// Uniform result of a record operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub ok: bool,
    pub message: String,
    pub data: Option<T>,
    pub kind: OutcomeKind,
}

impl<T> Outcome<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            ok: true,
            message: message.into(),
            data: Some(data),
            kind: OutcomeKind::Success,
        }
    }

    pub fn not_found(data: Option<T>) -> Self {
        Self {
            ok: false,
            message: MSG_NO_RECORDS.to_string(),
            data,
            kind: OutcomeKind::NotFound,
        }
    }

    pub fn write_rejected(message: impl Into<String>) -> Self {
        Self::failure(message, OutcomeKind::WriteRejected)
    }

    pub fn read_back_failed() -> Self {
        Self::failure(MSG_READ_BACK_FAILED, OutcomeKind::ReadBackFailed)
    }

    pub fn store_failure(failure: &StoreFailure) -> Self {
        Self::failure(
            format!("Failed to execute query: {}", failure.detail),
            OutcomeKind::StoreFailure,
        )
    }

    fn failure(message: impl Into<String>, kind: OutcomeKind) -> Self {
        Self {
            ok: false,
            message: message.into(),
            data: None,
            kind,
        }
    }
}

/// Progress of a write operation.
///
/// `Requested -> Executing -> {Succeeded -> Confirmed | ReadBackFailed} | Failed`.
/// Operations without a confirmatory read end at `Succeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Requested,
    Executing,
    Succeeded,
    Confirmed,
    ReadBackFailed,
    Failed,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requested => "requested",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::Confirmed => "confirmed",
            Self::ReadBackFailed => "read_back_failed",
            Self::Failed => "failed",
        })
    }
}

/// Logs each stage a single write passes through.
pub(crate) struct WriteTrace {
    entity: &'static str,
    operation: &'static str,
}

impl WriteTrace {
    pub(crate) fn start(entity: &'static str, operation: &'static str) -> Self {
        let trace = Self { entity, operation };
        trace.stage(WriteStage::Requested);
        trace
    }

    pub(crate) fn stage(&self, stage: WriteStage) {
        match stage {
            WriteStage::Requested | WriteStage::Executing => tracing::debug!(
                entity = self.entity,
                operation = self.operation,
                stage = %stage,
                "Write stage"
            ),
            WriteStage::Succeeded | WriteStage::Confirmed => tracing::info!(
                entity = self.entity,
                operation = self.operation,
                stage = %stage,
                "Write finished"
            ),
            WriteStage::ReadBackFailed | WriteStage::Failed => tracing::warn!(
                entity = self.entity,
                operation = self.operation,
                stage = %stage,
                "Write did not complete"
            ),
        }
    }
}

/// Run a select and decode every row. Decode errors count as store failures.
pub(crate) async fn read_rows<T: FromRow>(
    exec: &Executor,
    query: &Query,
) -> Result<Vec<T>, StoreFailure> {
    match exec.execute(query).await {
        RawOutcome::Rows(rows) => rows
            .iter()
            .map(|row| T::from_row(row).map_err(StoreFailure::from))
            .collect(),
        RawOutcome::Written { .. } => Err(StoreFailure::new(
            "select reported a write result instead of rows",
        )),
        RawOutcome::Failed(failure) => Err(failure),
    }
}

/// A list read on its own session: rows, empty, or failure.
pub(crate) async fn list_outcome<T: FromRow>(store: &dyn Store, query: &Query) -> Outcome<Vec<T>> {
    let exec = match Executor::open(store).await {
        Ok(exec) => exec,
        Err(failure) => return Outcome::store_failure(&failure),
    };
    match read_rows(&exec, query).await {
        Ok(rows) if rows.is_empty() => Outcome::not_found(Some(Vec::new())),
        Ok(rows) => Outcome::success(MSG_RETRIEVED, rows),
        Err(failure) => Outcome::store_failure(&failure),
    }
}

/// A keyed delete: ok iff at least one row went away.
pub(crate) async fn delete_outcome(
    store: &dyn Store,
    entity: &'static str,
    query: &Query,
) -> Outcome<()> {
    let trace = WriteTrace::start(entity, "delete");
    let exec = match Executor::open(store).await {
        Ok(exec) => exec,
        Err(failure) => {
            trace.stage(WriteStage::Failed);
            return Outcome::store_failure(&failure);
        }
    };

    trace.stage(WriteStage::Executing);
    match exec.execute(query).await {
        RawOutcome::Written { affected, .. } if affected >= 1 => {
            trace.stage(WriteStage::Succeeded);
            Outcome::success(MSG_DELETED, ())
        }
        RawOutcome::Written { .. } => {
            trace.stage(WriteStage::Failed);
            Outcome::write_rejected(MSG_DELETE_MISSING)
        }
        RawOutcome::Rows(_) => {
            trace.stage(WriteStage::Failed);
            Outcome::store_failure(&StoreFailure::new(
                "delete reported rows instead of a write result",
            ))
        }
        RawOutcome::Failed(failure) => {
            trace.stage(WriteStage::Failed);
            Outcome::store_failure(&failure)
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn store_failure_keeps_detail_and_has_no_data() {
        let outcome: Outcome<Vec<Trial>> =
            Outcome::store_failure(&StoreFailure::new("connection refused"));
        assert!(!outcome.ok);
        assert_eq!(outcome.data, None);
        assert_eq!(outcome.message, "Failed to execute query: connection refused");
        assert_eq!(outcome.kind, OutcomeKind::StoreFailure);
    }

    #[test]
    fn not_found_list_carries_empty_data() {
        let outcome: Outcome<Vec<Trial>> = Outcome::not_found(Some(Vec::new()));
        assert!(!outcome.ok);
        assert_eq!(outcome.data, Some(Vec::new()));
        assert_eq!(outcome.message, MSG_NO_RECORDS);
    }

    #[test]
    fn write_stage_names() {
        assert_eq!(WriteStage::ReadBackFailed.to_string(), "read_back_failed");
        assert_eq!(WriteStage::Confirmed.to_string(), "confirmed");
    }
}
