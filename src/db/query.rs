//! Parameterized SQL for every entity, operation, and list variant.
//!
//! Everything here is pure: a builder takes a table description plus the
//! values for one operation and returns a [`Query`]. Templates use named
//! `:param` placeholders and every variable value travels in
//! [`Query::params`]; no value is ever spliced into the SQL text. Backends
//! rewrite the placeholders into their own positional syntax with
//! [`Query::positional`].

use std::fmt::Write as _;

use chrono::NaiveDate;

/// A single bound value or decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        Self::Text(value.format(DATE_FORMAT).to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

static NULL: SqlValue = SqlValue::Null;

/// Storage format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A named parameter bound to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub value: SqlValue,
}

impl Param {
    fn new(name: &'static str, value: impl Into<SqlValue>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// What a statement does, which decides how its result is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement {
    Select,
    /// Insert whose store-assigned identifier lives in `id_column`.
    Insert { id_column: &'static str },
    Update,
    Delete,
}

impl Statement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert { .. } => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Self::Select)
    }
}

/// SQL template plus its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub params: Vec<Param>,
    pub statement: Statement,
}

/// Placeholder syntax expected by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?1, ?2, …` (SQLite / libSQL).
    Question,
    /// `$1, $2, …` (PostgreSQL).
    Dollar,
}

impl Query {
    /// Rewrite `:name` placeholders into numbered positional ones.
    ///
    /// Returns the rewritten SQL and the values in positional order. A name
    /// used more than once maps to the same position. Text inside single
    /// quotes and `::` casts are left alone.
    pub fn positional(&self, style: Placeholder) -> (String, Vec<&SqlValue>) {
        let marker = match style {
            Placeholder::Question => '?',
            Placeholder::Dollar => '$',
        };
        let mut out = String::with_capacity(self.sql.len());
        let mut order: Vec<&str> = Vec::new();
        let mut chars = self.sql.char_indices().peekable();
        let mut in_quote = false;

        while let Some((idx, ch)) = chars.next() {
            if ch == '\'' {
                in_quote = !in_quote;
                out.push(ch);
                continue;
            }
            if in_quote || ch != ':' {
                out.push(ch);
                continue;
            }
            // `::type` cast
            if matches!(chars.peek(), Some((_, ':'))) {
                out.push_str("::");
                chars.next();
                continue;
            }
            let start = idx + 1;
            let mut end = start;
            while let Some(&(i, c)) = chars.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    end = i + c.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            if end == start {
                out.push(ch);
                continue;
            }
            let name = &self.sql[start..end];
            let position = match order.iter().position(|seen| *seen == name) {
                Some(pos) => pos + 1,
                None => {
                    order.push(name);
                    order.len()
                }
            };
            let _ = write!(out, "{marker}{position}");
        }

        let values = order
            .iter()
            .map(|name| {
                self.params
                    .iter()
                    .find(|param| param.name == *name)
                    .map_or(&NULL, |param| &param.value)
            })
            .collect();
        (out, values)
    }
}

/// Shape of a stored table as far as the builders need to know.
#[derive(Debug)]
pub struct Table {
    pub name: &'static str,
    pub alias: &'static str,
    /// Store-assigned identifier column; never written by the service.
    pub id: &'static str,
    /// Fixed, ordered set of columns written by create and update.
    pub mutable: &'static [&'static str],
    /// Ordering columns, ascending, applied to every list.
    pub order_by: &'static [&'static str],
}

impl Table {
    /// Identifier followed by the mutable columns.
    pub fn exposed(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.id).chain(self.mutable.iter().copied())
    }
}

/// Link table joining an entity to another entity it can be filtered by.
#[derive(Debug)]
pub struct Relation {
    pub table: &'static str,
    pub alias: &'static str,
    /// Column in the relation that references the entity's identifier.
    pub entity_key: &'static str,
    /// Column in the relation that a related-list filter binds to.
    pub filter_key: &'static str,
}

pub static TRIALS: Table = Table {
    name: "clinicaltrials",
    alias: "ct",
    id: "trial_id",
    mutable: &[
        "trial_name",
        "trial_status",
        "trial_description",
        "trial_start",
        "trial_end",
    ],
    order_by: &["trial_name", "trial_id"],
};

pub static TRIAL_STAFF: Table = Table {
    name: "trialstaff",
    alias: "ts",
    id: "trialstaff_id",
    mutable: &[
        "trial_id",
        "user_id",
        "role_id",
        "trialstaff_start",
        "trialstaff_end",
    ],
    order_by: &["trialstaff_start", "trialstaff_id"],
};

/// Trials reachable from a staff user through their assignments.
pub static TRIALS_BY_STAFF_USER: Relation = Relation {
    table: "trialstaff",
    alias: "ts",
    entity_key: "trial_id",
    filter_key: "user_id",
};

/// User type codes eligible for trial staffing.
pub const STAFF_USER_TYPES: &[&str] = &["crc", "pi", "nurse"];

/// How a related list joins the entity to its relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinStrategy {
    /// Only entities with a matching relation row survive.
    #[default]
    Inner,
    /// Outer join followed by a filter on the relation's key. The filter
    /// discards the unmatched rows again, so the result equals `Inner`.
    LeftFiltered,
}

/// Query shape for a list operation.
#[derive(Debug, Clone, Copy, Default)]
pub enum ListVariant {
    /// The entity table alone; a filter binds to the entity's own id.
    #[default]
    Plain,
    /// Entity joined to a relation; a filter binds to the relation key.
    Related(&'static Relation, JoinStrategy),
}

fn select_list(table: &Table) -> String {
    table
        .exposed()
        .map(|column| format!("{alias}.{column} AS {column}", alias = table.alias))
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_clause(table: &Table) -> String {
    let columns = table
        .order_by
        .iter()
        .map(|column| format!("{}.{column} ASC", table.alias))
        .collect::<Vec<_>>()
        .join(", ");
    format!(" ORDER BY {columns}")
}

/// Build a list query for `table`.
pub fn list(table: &Table, filter: Option<i64>, variant: ListVariant) -> Query {
    match variant {
        ListVariant::Plain => select_plain(table, filter),
        ListVariant::Related(relation, join) => select_related(table, relation, join, filter),
    }
}

fn select_plain(table: &Table, filter: Option<i64>) -> Query {
    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        select_list(table),
        table.name,
        table.alias
    );
    let mut params = Vec::new();
    if let Some(id) = filter {
        let _ = write!(sql, " WHERE {}.{id_col} = :{id_col}", table.alias, id_col = table.id);
        params.push(Param::new(table.id, id));
    }
    sql.push_str(&order_clause(table));
    Query {
        sql,
        params,
        statement: Statement::Select,
    }
}

fn select_related(
    table: &Table,
    relation: &Relation,
    join: JoinStrategy,
    filter: Option<i64>,
) -> Query {
    let join_kw = match join {
        JoinStrategy::Inner => "INNER JOIN",
        JoinStrategy::LeftFiltered => "LEFT JOIN",
    };
    let mut sql = format!(
        "SELECT DISTINCT {} FROM {} AS {} {join_kw} {} AS {} ON {}.{} = {}.{}",
        select_list(table),
        table.name,
        table.alias,
        relation.table,
        relation.alias,
        relation.alias,
        relation.entity_key,
        table.alias,
        table.id,
    );
    let mut params = Vec::new();
    if let Some(id) = filter {
        let _ = write!(
            sql,
            " WHERE {}.{key} = :{key}",
            relation.alias,
            key = relation.filter_key
        );
        params.push(Param::new(relation.filter_key, id));
    }
    sql.push_str(&order_clause(table));
    Query {
        sql,
        params,
        statement: Statement::Select,
    }
}

fn bind_mutable(table: &Table, values: Vec<SqlValue>) -> Vec<Param> {
    debug_assert_eq!(
        values.len(),
        table.mutable.len(),
        "value count must match the mutable columns of {}",
        table.name
    );
    table
        .mutable
        .iter()
        .zip(values)
        .map(|(&column, value)| Param {
            name: column,
            value,
        })
        .collect()
}

/// `INSERT` of the mutable columns. `values` follow `table.mutable` order.
pub fn insert(table: &Table, values: Vec<SqlValue>) -> Query {
    let columns = table.mutable.join(", ");
    let placeholders = table
        .mutable
        .iter()
        .map(|column| format!(":{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    Query {
        sql: format!("INSERT INTO {} ({columns}) VALUES ({placeholders})", table.name),
        params: bind_mutable(table, values),
        statement: Statement::Insert {
            id_column: table.id,
        },
    }
}

/// Whole-record `UPDATE` of the mutable columns, keyed by identifier.
pub fn update(table: &Table, id: i64, values: Vec<SqlValue>) -> Query {
    let assignments = table
        .mutable
        .iter()
        .map(|column| format!("{column} = :{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut params = bind_mutable(table, values);
    params.push(Param::new(table.id, id));
    Query {
        sql: format!(
            "UPDATE {} SET {assignments} WHERE {id_col} = :{id_col}",
            table.name,
            id_col = table.id
        ),
        params,
        statement: Statement::Update,
    }
}

pub fn delete(table: &Table, id: i64) -> Query {
    Query {
        sql: format!(
            "DELETE FROM {} WHERE {id_col} = :{id_col}",
            table.name,
            id_col = table.id
        ),
        params: vec![Param::new(table.id, id)],
        statement: Statement::Delete,
    }
}

/// Assignments, optionally narrowed to one trial.
pub fn assignments(trial_id: Option<i64>) -> Query {
    let table = &TRIAL_STAFF;
    let mut sql = format!(
        "SELECT {} FROM {} AS {}",
        select_list(table),
        table.name,
        table.alias
    );
    let mut params = Vec::new();
    if let Some(id) = trial_id {
        sql.push_str(" WHERE ts.trial_id = :trial_id");
        params.push(Param::new("trial_id", id));
    }
    sql.push_str(&order_clause(table));
    Query {
        sql,
        params,
        statement: Statement::Select,
    }
}

/// Staff role reference data.
pub fn roles() -> Query {
    Query {
        sql: "SELECT r.role_id AS role_id, r.role_name AS role_name \
              FROM trialstaffroles AS r \
              ORDER BY r.role_name ASC, r.role_id ASC"
            .to_string(),
        params: Vec::new(),
        statement: Statement::Select,
    }
}

/// Users whose type makes them eligible for trial staffing.
pub fn staff_users() -> Query {
    const NAMES: [&'static str; 3] = ["staff_type_0", "staff_type_1", "staff_type_2"];
    debug_assert_eq!(NAMES.len(), STAFF_USER_TYPES.len());

    let placeholders = NAMES
        .iter()
        .map(|name| format!(":{name}"))
        .collect::<Vec<_>>()
        .join(", ");
    let params = NAMES
        .iter()
        .zip(STAFF_USER_TYPES)
        .map(|(&name, &code)| Param::new(name, code))
        .collect();
    Query {
        sql: format!(
            "SELECT u.user_id AS user_id, u.user_type AS user_type, \
             u.user_firstname AS user_firstname, u.user_lastname AS user_lastname, \
             u.user_firstname || ' ' || u.user_lastname AS user_fullname, \
             u.user_participant_code AS user_participant_code, u.user_email AS user_email \
             FROM users AS u \
             WHERE u.user_type IN ({placeholders}) \
             ORDER BY u.user_lastname ASC, u.user_firstname ASC, u.user_id ASC"
        ),
        params,
        statement: Statement::Select,
    }
}
