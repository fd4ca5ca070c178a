//! Test doubles for the store layer.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::db::{Query, Row, Session, Store, WriteSummary};
use crate::error::DatabaseError;

/// One canned response, consumed in order.
#[derive(Debug, Clone)]
pub enum Scripted {
    Rows(Vec<Row>),
    Written {
        affected: u64,
        generated_id: Option<i64>,
    },
    Error(&'static str),
}

#[derive(Default)]
struct Shared {
    script: Mutex<VecDeque<Scripted>>,
    log: Mutex<Vec<Query>>,
    sessions: Mutex<usize>,
}

/// Store that replays a script and records every query it is given.
#[derive(Clone, Default)]
pub struct ScriptedStore {
    shared: Arc<Shared>,
    closed: Arc<AtomicBool>,
}

impl ScriptedStore {
    pub fn new(script: Vec<Scripted>) -> Self {
        let store = Self::default();
        *store.shared.script.lock().unwrap() = script.into();
        store
    }

    /// Queries executed so far, in order.
    pub fn executed(&self) -> Vec<Query> {
        self.shared.log.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        *self.shared.sessions.lock().unwrap()
    }

    fn next(&self, query: &Query) -> Result<Scripted, DatabaseError> {
        self.shared.log.lock().unwrap().push(query.clone());
        self.shared
            .script
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| DatabaseError::Query(format!("unscripted query: {}", query.sql)))
    }
}

#[async_trait]
impl Store for ScriptedStore {
    fn backend_name(&self) -> &'static str {
        "scripted"
    }

    async fn session(&self) -> Result<Box<dyn Session>, DatabaseError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DatabaseError::Closed);
        }
        *self.shared.sessions.lock().unwrap() += 1;
        Ok(Box::new(self.clone()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Session for ScriptedStore {
    async fn fetch(&self, query: &Query) -> Result<Vec<Row>, DatabaseError> {
        match self.next(query)? {
            Scripted::Rows(rows) => Ok(rows),
            Scripted::Written { .. } => Ok(Vec::new()),
            Scripted::Error(detail) => Err(DatabaseError::Query(detail.to_string())),
        }
    }

    async fn write(&self, query: &Query) -> Result<WriteSummary, DatabaseError> {
        match self.next(query)? {
            Scripted::Written {
                affected,
                generated_id,
            } => Ok(WriteSummary {
                affected,
                generated_id,
            }),
            Scripted::Rows(_) => Ok(WriteSummary {
                affected: 0,
                generated_id: None,
            }),
            Scripted::Error(detail) => Err(DatabaseError::Query(detail.to_string())),
        }
    }
}

/// A row for the `clinicaltrials` select list.
pub fn trial_row(id: i64, name: &str, status: &str) -> Row {
    Row::new(vec![
        ("trial_id".into(), id.into()),
        ("trial_name".into(), name.into()),
        ("trial_status".into(), status.into()),
        ("trial_description".into(), crate::db::SqlValue::Null),
        ("trial_start".into(), "2024-01-01".into()),
        ("trial_end".into(), crate::db::SqlValue::Null),
    ])
}
