//! Client-facing record types and their decoding from store rows.
//!
//! Storage columns are snake-case and table-prefixed (`trial_name`); records
//! serialize camelCase (`name`). Identifiers stored or returned as text are
//! cast to integers here.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::db::query::DATE_FORMAT;
use crate::db::{Row, SqlValue};
use crate::error::DatabaseError;

/// Decode one store row into a record.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> Result<Self, DatabaseError>;
}

fn column<'a>(row: &'a Row, name: &str) -> Result<&'a SqlValue, DatabaseError> {
    row.get(name)
        .ok_or_else(|| DatabaseError::Serialization(format!("missing column {name}")))
}

fn opt_integer(row: &Row, name: &str) -> Result<Option<i64>, DatabaseError> {
    match column(row, name)? {
        SqlValue::Null => Ok(None),
        SqlValue::Integer(v) => Ok(Some(*v)),
        SqlValue::Real(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(*v as i64)),
        SqlValue::Text(v) => v.trim().parse().map(Some).map_err(|_| {
            DatabaseError::Serialization(format!("column {name} is not numeric: '{v}'"))
        }),
        SqlValue::Real(v) => Err(DatabaseError::Serialization(format!(
            "column {name} is not an integer: {v}"
        ))),
    }
}

fn integer(row: &Row, name: &str) -> Result<i64, DatabaseError> {
    opt_integer(row, name)?
        .ok_or_else(|| DatabaseError::Serialization(format!("column {name} is null")))
}

fn opt_text(row: &Row, name: &str) -> Result<Option<String>, DatabaseError> {
    match column(row, name)? {
        SqlValue::Null => Ok(None),
        SqlValue::Text(v) => Ok(Some(v.clone())),
        SqlValue::Integer(v) => Ok(Some(v.to_string())),
        SqlValue::Real(v) => Ok(Some(v.to_string())),
    }
}

fn text(row: &Row, name: &str) -> Result<String, DatabaseError> {
    opt_text(row, name)?
        .ok_or_else(|| DatabaseError::Serialization(format!("column {name} is null")))
}

fn opt_date(row: &Row, name: &str) -> Result<Option<NaiveDate>, DatabaseError> {
    let Some(raw) = opt_text(row, name)? else {
        return Ok(None);
    };
    // Tolerate a trailing time component from stores that keep datetimes.
    let day = raw.get(..10).unwrap_or(raw.as_str());
    NaiveDate::parse_from_str(day, DATE_FORMAT)
        .map(Some)
        .map_err(|e| DatabaseError::Serialization(format!("invalid date in {name}: {e}")))
}

/// Lifecycle status of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    #[default]
    Planned,
    Recruiting,
    Active,
    Suspended,
    Completed,
    Terminated,
}

impl TrialStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Recruiting => "recruiting",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Completed => "completed",
            Self::Terminated => "terminated",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "planned" => Some(Self::Planned),
            "recruiting" => Some(Self::Recruiting),
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "completed" => Some(Self::Completed),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }
}

/// A clinical trial as persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trial {
    pub id: i64,
    pub name: String,
    pub status: TrialStatus,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl FromRow for Trial {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        let raw_status = text(row, "trial_status")?;
        let status = TrialStatus::from_db_value(&raw_status).ok_or_else(|| {
            DatabaseError::Serialization(format!("invalid trial status '{raw_status}'"))
        })?;
        Ok(Self {
            id: integer(row, "trial_id")?,
            name: text(row, "trial_name")?,
            status,
            description: opt_text(row, "trial_description")?,
            start_date: opt_date(row, "trial_start")?,
            end_date: opt_date(row, "trial_end")?,
        })
    }
}

/// Mutable trial fields accepted by create and update.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialInput {
    #[serde(alias = "trialName")]
    pub name: String,
    #[serde(default)]
    pub status: TrialStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "start")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, alias = "end")]
    pub end_date: Option<NaiveDate>,
}

impl TrialInput {
    /// The only business rule checked before a write.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Trial name cannot be empty".to_string());
        }
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if end < start => {
                Err("Trial end date cannot be before its start date".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Values in the stored column order of the mutable field set. The name
    /// is stored as given so it reads back unchanged.
    pub fn values(&self) -> Vec<SqlValue> {
        vec![
            self.name.as_str().into(),
            self.status.as_str().into(),
            self.description.clone().into(),
            self.start_date.into(),
            self.end_date.into(),
        ]
    }
}

/// A staff member assigned to a trial in a role for a date window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub assignment_id: i64,
    pub trial_id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl FromRow for Assignment {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        Ok(Self {
            assignment_id: integer(row, "trialstaff_id")?,
            trial_id: integer(row, "trial_id")?,
            user_id: integer(row, "user_id")?,
            role_id: integer(row, "role_id")?,
            start: opt_date(row, "trialstaff_start")?,
            end: opt_date(row, "trialstaff_end")?,
        })
    }
}

/// Body of an assignment create.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentInput {
    #[serde(deserialize_with = "positive_id")]
    pub trial_id: i64,
    #[serde(deserialize_with = "positive_id")]
    pub user_id: i64,
    #[serde(deserialize_with = "positive_id")]
    pub role_id: i64,
    #[serde(default)]
    pub start: Option<NaiveDate>,
    #[serde(default)]
    pub end: Option<NaiveDate>,
}

impl AssignmentInput {
    pub fn values(&self) -> Vec<SqlValue> {
        vec![
            self.trial_id.into(),
            self.user_id.into(),
            self.role_id.into(),
            self.start.into(),
            self.end.into(),
        ]
    }

    /// The input as stored under `assignment_id`.
    pub fn into_assignment(self, assignment_id: i64) -> Assignment {
        Assignment {
            assignment_id,
            trial_id: self.trial_id,
            user_id: self.user_id,
            role_id: self.role_id,
            start: self.start,
            end: self.end,
        }
    }
}

/// Parse an identifier: a positive integer, an integral positive float, or
/// the same as text. `None` for anything else.
pub fn parse_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        return (id > 0).then_some(id);
    }
    let value = raw.parse::<f64>().ok()?;
    // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
    (value.is_finite() && value > 0.0 && value.fract() == 0.0 && value < i64::MAX as f64)
        .then_some(value as i64)
}

fn positive_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match &value {
        serde_json::Value::Number(n) => parse_id(&n.to_string()),
        serde_json::Value::String(s) => parse_id(s),
        _ => None,
    };
    parsed.ok_or_else(|| {
        serde::de::Error::custom(format!("expected a positive integer identifier, got {value}"))
    })
}

/// A user eligible for trial staffing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffUser {
    pub user_id: i64,
    pub user_type: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub participant_code: Option<String>,
    pub email: Option<String>,
}

impl FromRow for StaffUser {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        let first_name = text(row, "user_firstname")?;
        let last_name = text(row, "user_lastname")?;
        let supplied = match row.get("user_fullname") {
            Some(_) => opt_text(row, "user_fullname")?,
            None => None,
        };
        let full_name = supplied
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("{first_name} {last_name}").trim().to_string());
        Ok(Self {
            user_id: integer(row, "user_id")?,
            user_type: text(row, "user_type")?,
            first_name,
            last_name,
            full_name,
            participant_code: opt_text(row, "user_participant_code")?,
            email: opt_text(row, "user_email")?,
        })
    }
}

/// Staff role reference data.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub role_id: i64,
    pub role_name: String,
}

impl FromRow for Role {
    fn from_row(row: &Row) -> Result<Self, DatabaseError> {
        Ok(Self {
            role_id: integer(row, "role_id")?,
            role_name: text(row, "role_name")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn row(columns: &[(&str, SqlValue)]) -> Row {
        Row::new(
            columns
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        )
    }

    fn trial_row(id: SqlValue) -> Row {
        row(&[
            ("trial_id", id),
            ("trial_name", "Trial A".into()),
            ("trial_status", "active".into()),
            ("trial_description", SqlValue::Null),
            ("trial_start", "2024-01-01".into()),
            ("trial_end", SqlValue::Null),
        ])
    }

    #[test]
    fn trial_serializes_camel_case_fields_only() {
        let trial = Trial::from_row(&trial_row(SqlValue::Integer(4))).unwrap();
        assert_eq!(
            serde_json::to_value(&trial).unwrap(),
            json!({
                "id": 4,
                "name": "Trial A",
                "status": "active",
                "description": null,
                "startDate": "2024-01-01",
                "endDate": null,
            })
        );
    }

    #[test]
    fn numeric_text_identifiers_are_cast() {
        let trial = Trial::from_row(&trial_row(SqlValue::Text(" 12 ".into()))).unwrap();
        assert_eq!(trial.id, 12);

        let err = Trial::from_row(&trial_row(SqlValue::Text("twelve".into()))).unwrap_err();
        assert!(err.to_string().contains("trial_id"));
    }

    #[test]
    fn unknown_status_is_a_decode_error() {
        let archived = row(&[
            ("trial_id", SqlValue::Integer(1)),
            ("trial_name", "Trial A".into()),
            ("trial_status", "archived".into()),
            ("trial_description", SqlValue::Null),
            ("trial_start", SqlValue::Null),
            ("trial_end", SqlValue::Null),
        ]);
        let err = Trial::from_row(&archived).unwrap_err();
        assert!(err.to_string().contains("archived"));
    }

    #[test]
    fn staff_user_full_name_is_derived_when_absent() {
        let user = StaffUser::from_row(&row(&[
            ("user_id", SqlValue::Integer(2)),
            ("user_type", "crc".into()),
            ("user_firstname", "Ada".into()),
            ("user_lastname", "Lovelace".into()),
            ("user_participant_code", SqlValue::Null),
            ("user_email", "ada@example.org".into()),
        ]))
        .unwrap();
        assert_eq!(user.full_name, "Ada Lovelace");

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["participantCode"], serde_json::Value::Null);
        assert!(json.get("user_firstname").is_none());
    }

    #[test]
    fn staff_user_keeps_supplied_full_name() {
        let user = StaffUser::from_row(&row(&[
            ("user_id", SqlValue::Integer(2)),
            ("user_type", "pi".into()),
            ("user_firstname", "Grace".into()),
            ("user_lastname", "Hopper".into()),
            ("user_fullname", "Rear Admiral Hopper".into()),
            ("user_participant_code", "P-01".into()),
            ("user_email", SqlValue::Null),
        ]))
        .unwrap();
        assert_eq!(user.full_name, "Rear Admiral Hopper");
    }

    #[test]
    fn trial_input_accepts_aliases_and_defaults_status() {
        let input: TrialInput = serde_json::from_value(json!({
            "trialName": "  Trial B ",
            "start": "2024-02-01",
        }))
        .unwrap();
        assert_eq!(input.status, TrialStatus::Planned);
        assert_eq!(
            input.values(),
            vec![
                SqlValue::Text("  Trial B ".into()),
                SqlValue::Text("planned".into()),
                SqlValue::Null,
                SqlValue::Text("2024-02-01".into()),
                SqlValue::Null,
            ]
        );
    }

    #[test]
    fn trial_input_validation() {
        let blank: TrialInput = serde_json::from_value(json!({ "name": "   " })).unwrap();
        assert!(blank.validate().is_err());

        let backwards: TrialInput = serde_json::from_value(json!({
            "name": "X",
            "startDate": "2024-05-01",
            "endDate": "2024-04-01",
        }))
        .unwrap();
        assert!(backwards.validate().is_err());
    }

    #[test]
    fn assignment_input_requires_positive_ids() {
        let input: AssignmentInput = serde_json::from_value(json!({
            "trialId": 1,
            "userId": "2",
            "roleId": 3.0,
            "start": "2024-01-01",
            "end": "2024-12-31",
        }))
        .unwrap();
        assert_eq!((input.trial_id, input.user_id, input.role_id), (1, 2, 3));

        for bad in [json!(0), json!(-4), json!(1.5), json!("abc"), json!(null)] {
            let result = serde_json::from_value::<AssignmentInput>(json!({
                "trialId": bad,
                "userId": 2,
                "roleId": 3,
            }));
            assert!(result.is_err(), "accepted {bad}");
        }
    }

    #[test]
    fn parse_id_rules() {
        assert_eq!(parse_id("7"), Some(7));
        assert_eq!(parse_id("7.0"), Some(7));
        assert_eq!(parse_id("0"), None);
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("2.5"), None);
        assert_eq!(parse_id("NaN"), None);
        assert_eq!(parse_id("inf"), None);
        assert_eq!(parse_id("abc"), None);
    }

    #[test]
    fn parse_id_rejects_values_beyond_i64() {
        assert_eq!(parse_id("9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_id("9223372036854775808"), None);
        assert_eq!(parse_id("9223372036854775808.0"), None);
        assert_eq!(parse_id("1e19"), None);
        assert_eq!(parse_id("4503599627370496.0"), Some(4_503_599_627_370_496));
    }
}
