use std::sync::Arc;

use crate::db::query::{self, ListVariant, TRIALS};
use crate::db::{Executor, Query, RawOutcome, Store, StoreFailure};

use super::{
    MSG_CREATED, MSG_UPDATE_MISSING, MSG_UPDATED, Outcome, Trial, TrialInput, WriteStage,
    WriteTrace, delete_outcome, list_outcome, read_rows,
};

const ENTITY: &str = "trial";

/// Trial record operations.
#[derive(Clone)]
pub struct TrialRecords {
    store: Arc<dyn Store>,
}

impl TrialRecords {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// List trials, optionally filtered. With a `Related` variant the filter
    /// is a staff user id; otherwise it is the trial id.
    pub async fn list(&self, filter: Option<i64>, variant: ListVariant) -> Outcome<Vec<Trial>> {
        list_outcome(self.store.as_ref(), &query::list(&TRIALS, filter, variant)).await
    }

    /// Single trial by id. Empty means not found.
    pub async fn get(&self, id: i64) -> Outcome<Trial> {
        let listed = self.list(Some(id), ListVariant::Plain).await;
        match listed.data {
            Some(trials) if listed.ok => match trials.into_iter().next() {
                Some(trial) => Outcome::success(listed.message, trial),
                None => Outcome::not_found(None),
            },
            Some(_) => Outcome::not_found(None),
            None => Outcome {
                ok: false,
                message: listed.message,
                data: None,
                kind: listed.kind,
            },
        }
    }

    /// Insert, then read the stored row back on the same session.
    pub async fn create(&self, input: &TrialInput) -> Outcome<Trial> {
        let trace = WriteTrace::start(ENTITY, "create");
        let exec = match Executor::open(self.store.as_ref()).await {
            Ok(exec) => exec,
            Err(failure) => {
                trace.stage(WriteStage::Failed);
                return Outcome::store_failure(&failure);
            }
        };

        trace.stage(WriteStage::Executing);
        let id = match exec.execute(&query::insert(&TRIALS, input.values())).await {
            RawOutcome::Written {
                generated_id: Some(id),
                affected,
            } if affected >= 1 => id,
            RawOutcome::Failed(failure) => {
                trace.stage(WriteStage::Failed);
                return Outcome::store_failure(&failure);
            }
            other => {
                trace.stage(WriteStage::Failed);
                tracing::warn!(outcome = ?other, "Insert did not report a generated id");
                return Outcome::store_failure(&StoreFailure::new(
                    "insert did not report a generated id",
                ));
            }
        };
        trace.stage(WriteStage::Succeeded);

        confirm(
            &exec,
            &trace,
            &query::list(&TRIALS, Some(id), ListVariant::Plain),
            MSG_CREATED,
        )
        .await
    }

    /// Whole-record overwrite. A missing id is rejected without a read.
    pub async fn update(&self, id: i64, input: &TrialInput) -> Outcome<Trial> {
        let trace = WriteTrace::start(ENTITY, "update");
        let exec = match Executor::open(self.store.as_ref()).await {
            Ok(exec) => exec,
            Err(failure) => {
                trace.stage(WriteStage::Failed);
                return Outcome::store_failure(&failure);
            }
        };

        trace.stage(WriteStage::Executing);
        match exec.execute(&query::update(&TRIALS, id, input.values())).await {
            RawOutcome::Written { affected, .. } if affected >= 1 => {}
            RawOutcome::Written { .. } => {
                trace.stage(WriteStage::Failed);
                return Outcome::write_rejected(MSG_UPDATE_MISSING);
            }
            RawOutcome::Failed(failure) => {
                trace.stage(WriteStage::Failed);
                return Outcome::store_failure(&failure);
            }
            RawOutcome::Rows(_) => {
                trace.stage(WriteStage::Failed);
                return Outcome::store_failure(&StoreFailure::new(
                    "update reported rows instead of a write result",
                ));
            }
        }
        trace.stage(WriteStage::Succeeded);

        confirm(
            &exec,
            &trace,
            &query::list(&TRIALS, Some(id), ListVariant::Plain),
            MSG_UPDATED,
        )
        .await
    }

    pub async fn delete(&self, id: i64) -> Outcome<()> {
        delete_outcome(self.store.as_ref(), ENTITY, &query::delete(&TRIALS, id)).await
    }
}

/// Confirmatory read after a successful write.
async fn confirm(
    exec: &Executor,
    trace: &WriteTrace,
    query: &Query,
    message: &str,
) -> Outcome<Trial> {
    match read_rows::<Trial>(exec, query).await {
        Ok(rows) => match rows.into_iter().next() {
            Some(trial) => {
                trace.stage(WriteStage::Confirmed);
                Outcome::success(message, trial)
            }
            None => {
                trace.stage(WriteStage::ReadBackFailed);
                Outcome::read_back_failed()
            }
        },
        Err(failure) => {
            trace.stage(WriteStage::ReadBackFailed);
            tracing::warn!(error = %failure, "Confirmatory read failed");
            Outcome::read_back_failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::SqlValue;
    use crate::db::query::{JoinStrategy, Statement, TRIALS_BY_STAFF_USER};
    use crate::records::{MSG_NO_RECORDS, OutcomeKind, TrialStatus};
    use crate::testing::{Scripted, ScriptedStore, trial_row};

    fn records(store: &ScriptedStore) -> TrialRecords {
        TrialRecords::new(Arc::new(store.clone()))
    }

    fn input(name: &str) -> TrialInput {
        TrialInput {
            name: name.to_string(),
            status: TrialStatus::Active,
            description: None,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: None,
        }
    }

    fn statements(store: &ScriptedStore) -> Vec<Statement> {
        store.executed().iter().map(|q| q.statement).collect()
    }

    #[tokio::test]
    async fn create_returns_the_row_read_back() {
        let store = ScriptedStore::new(vec![
            Scripted::Written {
                affected: 1,
                generated_id: Some(17),
            },
            Scripted::Rows(vec![trial_row(17, "Trial A", "active")]),
        ]);

        let outcome = records(&store).create(&input("Trial A")).await;

        assert!(outcome.ok);
        assert_eq!(outcome.message, MSG_CREATED);
        let trial = outcome.data.unwrap();
        assert_eq!(trial.id, 17);
        assert_eq!(trial.name, "Trial A");
        assert_eq!(trial.status, TrialStatus::Active);

        let executed = store.executed();
        assert_eq!(
            statements(&store),
            vec![Statement::Insert { id_column: "trial_id" }, Statement::Select]
        );
        assert_eq!(executed[1].params[0].value, SqlValue::Integer(17));
        // write and read share one session
        assert_eq!(store.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn create_with_empty_read_back_is_not_ok() {
        let store = ScriptedStore::new(vec![
            Scripted::Written {
                affected: 1,
                generated_id: Some(3),
            },
            Scripted::Rows(Vec::new()),
        ]);

        let outcome = records(&store).create(&input("Trial A")).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.data, None);
        assert_eq!(outcome.kind, OutcomeKind::ReadBackFailed);
    }

    #[tokio::test]
    async fn create_with_failed_read_back_is_not_ok() {
        let store = ScriptedStore::new(vec![
            Scripted::Written {
                affected: 1,
                generated_id: Some(3),
            },
            Scripted::Error("connection reset"),
        ]);

        let outcome = records(&store).create(&input("Trial A")).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::ReadBackFailed);
        assert!(!outcome.message.contains("SELECT"));
    }

    #[tokio::test]
    async fn create_insert_failure_skips_read() {
        let store = ScriptedStore::new(vec![Scripted::Error("NOT NULL constraint failed")]);

        let outcome = records(&store).create(&input("Trial A")).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.data, None);
        assert_eq!(outcome.kind, OutcomeKind::StoreFailure);
        assert!(outcome.message.contains("NOT NULL constraint failed"));
        assert_eq!(store.executed().len(), 1);
    }

    #[tokio::test]
    async fn update_of_missing_id_performs_no_read() {
        let store = ScriptedStore::new(vec![Scripted::Written {
            affected: 0,
            generated_id: None,
        }]);

        let outcome = records(&store).update(99, &input("Nope")).await;

        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::WriteRejected);
        assert_eq!(outcome.message, MSG_UPDATE_MISSING);
        assert_eq!(statements(&store), vec![Statement::Update]);
    }

    #[tokio::test]
    async fn update_reads_back_by_the_same_id() {
        let store = ScriptedStore::new(vec![
            Scripted::Written {
                affected: 1,
                generated_id: None,
            },
            Scripted::Rows(vec![trial_row(5, "Renamed", "completed")]),
        ]);

        let outcome = records(&store).update(5, &input("Renamed")).await;
        assert!(outcome.ok);
        assert_eq!(outcome.message, MSG_UPDATED);
        assert_eq!(outcome.data.unwrap().status, TrialStatus::Completed);

        let executed = store.executed();
        assert_eq!(executed.len(), 2);
        assert_eq!(executed[1].params[0].value, SqlValue::Integer(5));
    }

    #[tokio::test]
    async fn list_distinguishes_empty_from_failure() {
        let empty = ScriptedStore::new(vec![Scripted::Rows(Vec::new())]);
        let outcome = records(&empty).list(None, ListVariant::Plain).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.message, MSG_NO_RECORDS);
        assert_eq!(outcome.data, Some(Vec::new()));

        let failing = ScriptedStore::new(vec![Scripted::Error("timeout")]);
        let outcome = records(&failing).list(None, ListVariant::Plain).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.data, None);
        assert_eq!(outcome.kind, OutcomeKind::StoreFailure);
    }

    #[tokio::test]
    async fn related_list_binds_user_id() {
        let store = ScriptedStore::new(vec![Scripted::Rows(vec![trial_row(1, "E1", "active")])]);
        let outcome = records(&store)
            .list(
                Some(8),
                ListVariant::Related(&TRIALS_BY_STAFF_USER, JoinStrategy::Inner),
            )
            .await;
        assert!(outcome.ok);
        assert_eq!(outcome.data.unwrap().len(), 1);
        let executed = store.executed();
        assert_eq!(executed[0].params[0].name, "user_id");
    }

    #[tokio::test]
    async fn get_maps_empty_to_not_found_without_data() {
        let store = ScriptedStore::new(vec![Scripted::Rows(Vec::new())]);
        let outcome = records(&store).get(4).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::NotFound);
        assert_eq!(outcome.data, None);
    }

    #[tokio::test]
    async fn delete_twice_reports_ok_then_rejected() {
        let store = ScriptedStore::new(vec![
            Scripted::Written {
                affected: 1,
                generated_id: None,
            },
            Scripted::Written {
                affected: 0,
                generated_id: None,
            },
        ]);
        let records = records(&store);

        assert!(records.delete(2).await.ok);
        let second = records.delete(2).await;
        assert!(!second.ok);
        assert_eq!(second.kind, OutcomeKind::WriteRejected);
    }

    #[tokio::test]
    async fn closed_store_is_a_store_failure() {
        let store = ScriptedStore::new(Vec::new());
        store.close().await;
        let outcome = records(&store).create(&input("Late")).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::StoreFailure);
        assert!(store.executed().is_empty());
    }
}
