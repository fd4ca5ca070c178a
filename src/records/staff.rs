use std::sync::Arc;

use crate::db::query::{self, TRIAL_STAFF};
use crate::db::{Executor, RawOutcome, Store, StoreFailure};

use super::{
    Assignment, AssignmentInput, MSG_CREATED, Outcome, Role, StaffUser, WriteStage, WriteTrace,
    delete_outcome, list_outcome,
};

const ENTITY: &str = "assignment";

/// Staffing operations: assignments plus the role and staff-user reference
/// lists used to build them.
#[derive(Clone)]
pub struct StaffRecords {
    store: Arc<dyn Store>,
}

impl StaffRecords {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert an assignment and return the input under its new id.
    ///
    /// Unlike trial create there is no confirmatory read.
    pub async fn create_assignment(&self, input: AssignmentInput) -> Outcome<Assignment> {
        let trace = WriteTrace::start(ENTITY, "create");
        let exec = match Executor::open(self.store.as_ref()).await {
            Ok(exec) => exec,
            Err(failure) => {
                trace.stage(WriteStage::Failed);
                return Outcome::store_failure(&failure);
            }
        };

        trace.stage(WriteStage::Executing);
        match exec
            .execute(&query::insert(&TRIAL_STAFF, input.values()))
            .await
        {
            RawOutcome::Written {
                generated_id: Some(id),
                affected,
            } if affected >= 1 => {
                trace.stage(WriteStage::Succeeded);
                Outcome::success(MSG_CREATED, input.into_assignment(id))
            }
            RawOutcome::Failed(failure) => {
                trace.stage(WriteStage::Failed);
                Outcome::store_failure(&failure)
            }
            other => {
                trace.stage(WriteStage::Failed);
                tracing::warn!(outcome = ?other, "Insert did not report a generated id");
                Outcome::store_failure(&StoreFailure::new("insert did not report a generated id"))
            }
        }
    }

    /// Assignments, optionally for one trial.
    pub async fn list_assignments(&self, trial_id: Option<i64>) -> Outcome<Vec<Assignment>> {
        list_outcome(self.store.as_ref(), &query::assignments(trial_id)).await
    }

    pub async fn delete_assignment(&self, id: i64) -> Outcome<()> {
        delete_outcome(self.store.as_ref(), ENTITY, &query::delete(&TRIAL_STAFF, id)).await
    }

    pub async fn list_roles(&self) -> Outcome<Vec<Role>> {
        list_outcome(self.store.as_ref(), &query::roles()).await
    }

    /// Users whose type code makes them eligible for staffing.
    pub async fn list_staff_users(&self) -> Outcome<Vec<StaffUser>> {
        list_outcome(self.store.as_ref(), &query::staff_users()).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::query::Statement;
    use crate::db::{Row, SqlValue};
    use crate::records::OutcomeKind;
    use crate::testing::{Scripted, ScriptedStore};

    fn records(store: &ScriptedStore) -> StaffRecords {
        StaffRecords::new(Arc::new(store.clone()))
    }

    fn assignment_input() -> AssignmentInput {
        AssignmentInput {
            trial_id: 1,
            user_id: 2,
            role_id: 3,
            start: NaiveDate::from_ymd_opt(2024, 1, 1),
            end: NaiveDate::from_ymd_opt(2024, 12, 31),
        }
    }

    #[tokio::test]
    async fn create_assignment_enriches_input_without_reading() {
        let store = ScriptedStore::new(vec![Scripted::Written {
            affected: 1,
            generated_id: Some(41),
        }]);

        let outcome = records(&store).create_assignment(assignment_input()).await;

        assert!(outcome.ok);
        assert_eq!(
            outcome.data,
            Some(Assignment {
                assignment_id: 41,
                trial_id: 1,
                user_id: 2,
                role_id: 3,
                start: NaiveDate::from_ymd_opt(2024, 1, 1),
                end: NaiveDate::from_ymd_opt(2024, 12, 31),
            })
        );
        let executed = store.executed();
        assert_eq!(executed.len(), 1);
        assert_eq!(
            executed[0].statement,
            Statement::Insert {
                id_column: "trialstaff_id"
            }
        );
    }

    #[tokio::test]
    async fn create_assignment_constraint_failure_has_no_data() {
        let store = ScriptedStore::new(vec![Scripted::Error("FOREIGN KEY constraint failed")]);
        let outcome = records(&store).create_assignment(assignment_input()).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.data, None);
        assert_eq!(outcome.kind, OutcomeKind::StoreFailure);
        assert!(outcome.message.contains("FOREIGN KEY"));
    }

    #[tokio::test]
    async fn staff_users_are_mapped_with_full_names() {
        let store = ScriptedStore::new(vec![Scripted::Rows(vec![Row::new(vec![
            ("user_id".into(), SqlValue::Text("9".into())),
            ("user_type".into(), "nurse".into()),
            ("user_firstname".into(), "Mary".into()),
            ("user_lastname".into(), "Seacole".into()),
            ("user_fullname".into(), "Mary Seacole".into()),
            ("user_participant_code".into(), SqlValue::Null),
            ("user_email".into(), SqlValue::Null),
        ])])]);

        let outcome = records(&store).list_staff_users().await;
        let users = outcome.data.unwrap();
        assert_eq!(users[0].user_id, 9);
        assert_eq!(users[0].full_name, "Mary Seacole");
        assert_eq!(store.executed()[0].params.len(), 3);
    }

    #[tokio::test]
    async fn empty_roles_list_is_not_ok_with_empty_data() {
        let store = ScriptedStore::new(vec![Scripted::Rows(Vec::new())]);
        let outcome = records(&store).list_roles().await;
        assert!(!outcome.ok);
        assert_eq!(outcome.data, Some(Vec::new()));
        assert_eq!(outcome.kind, OutcomeKind::NotFound);
    }

    #[tokio::test]
    async fn assignment_delete_of_missing_id_is_rejected() {
        let store = ScriptedStore::new(vec![Scripted::Written {
            affected: 0,
            generated_id: None,
        }]);
        let outcome = records(&store).delete_assignment(12).await;
        assert!(!outcome.ok);
        assert_eq!(outcome.kind, OutcomeKind::WriteRejected);
    }
}
