//! Per-table row conversion for the MySQL to PostgreSQL migration.
//!
//! Each table's transform is a standalone function registered in
//! [`registry`], so conversions are explicit and independently testable.
//! Source identity columns are dropped; the destination regenerates its own
//! keys.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};
use thiserror::Error;

use crate::model::{EnrollmentStatus, UserRole};

/// A single source cell, decoded from MySQL into a neutral representation.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

/// Conversion failure for one column of one row. Recorded, never fatal.
#[derive(Debug, Error)]
#[error("column {column}: {message}")]
pub struct ConvertError {
    pub column: String,
    pub message: String,
}

impl ConvertError {
    fn new(column: &str, message: impl Into<String>) -> Self {
        Self {
            column: column.to_string(),
            message: message.into(),
        }
    }
}

/// One exported row, keyed by column name.
#[derive(Debug, Clone, Default)]
pub struct SourceRow {
    values: BTreeMap<String, SourceValue>,
}

impl SourceRow {
    /// Build a row from explicit pairs (used by converter tests).
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, SourceValue)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Decode a MySQL result row. Unknown column types fall back to text.
    pub fn from_mysql(row: &MySqlRow) -> Self {
        let mut values = BTreeMap::new();

        for (i, column) in row.columns().iter().enumerate() {
            let name = column.name().to_string();

            let is_null = row.try_get_raw(i).map(|v| v.is_null()).unwrap_or(true);
            if is_null {
                values.insert(name, SourceValue::Null);
                continue;
            }

            let type_name = column.type_info().name().to_uppercase();
            let value = match type_name.as_str() {
                "BOOLEAN" => row
                    .try_get::<bool, _>(i)
                    .map(SourceValue::Bool)
                    .unwrap_or(SourceValue::Null),
                "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => row
                    .try_get::<i64, _>(i)
                    .map(SourceValue::Int)
                    .unwrap_or(SourceValue::Null),
                "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED"
                | "INT UNSIGNED" | "BIGINT UNSIGNED" => row
                    .try_get::<u64, _>(i)
                    .map(SourceValue::UInt)
                    .unwrap_or(SourceValue::Null),
                "FLOAT" | "DOUBLE" => row
                    .try_get::<f64, _>(i)
                    .map(SourceValue::Float)
                    .unwrap_or(SourceValue::Null),
                "DATE" => row
                    .try_get::<NaiveDate, _>(i)
                    .map(SourceValue::Date)
                    .unwrap_or(SourceValue::Null),
                "TIME" => row
                    .try_get::<NaiveTime, _>(i)
                    .map(SourceValue::Time)
                    .unwrap_or(SourceValue::Null),
                "DATETIME" | "TIMESTAMP" => row
                    .try_get::<NaiveDateTime, _>(i)
                    .map(SourceValue::DateTime)
                    .unwrap_or(SourceValue::Null),
                "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
                    .try_get::<Vec<u8>, _>(i)
                    .map(SourceValue::Bytes)
                    .unwrap_or(SourceValue::Null),
                _ => row
                    .try_get::<String, _>(i)
                    .map(SourceValue::Text)
                    .unwrap_or(SourceValue::Null),
            };
            values.insert(name, value);
        }

        Self { values }
    }

    fn get(&self, column: &str) -> &SourceValue {
        self.values.get(column).unwrap_or(&SourceValue::Null)
    }

    /// Required text column.
    pub fn text(&self, column: &str) -> Result<String, ConvertError> {
        self.opt_text(column)?
            .ok_or_else(|| ConvertError::new(column, "required value is missing"))
    }

    /// Optional text column.
    pub fn opt_text(&self, column: &str) -> Result<Option<String>, ConvertError> {
        match self.get(column) {
            SourceValue::Null => Ok(None),
            SourceValue::Text(s) => Ok(Some(s.clone())),
            other => Err(ConvertError::new(
                column,
                format!("expected text, found {other:?}"),
            )),
        }
    }

    /// Required integer column.
    pub fn int(&self, column: &str) -> Result<i64, ConvertError> {
        self.opt_int(column)?
            .ok_or_else(|| ConvertError::new(column, "required value is missing"))
    }

    /// Optional integer column.
    pub fn opt_int(&self, column: &str) -> Result<Option<i64>, ConvertError> {
        match self.get(column) {
            SourceValue::Null => Ok(None),
            SourceValue::Int(v) => Ok(Some(*v)),
            SourceValue::UInt(v) => i64::try_from(*v)
                .map(Some)
                .map_err(|_| ConvertError::new(column, format!("{v} does not fit in i64"))),
            other => Err(ConvertError::new(
                column,
                format!("expected integer, found {other:?}"),
            )),
        }
    }

    /// Optional integer-encoded boolean (`0`/`1`), the MySQL idiom.
    pub fn opt_boolish(&self, column: &str) -> Result<Option<bool>, ConvertError> {
        match self.get(column) {
            SourceValue::Null => Ok(None),
            SourceValue::Bool(v) => Ok(Some(*v)),
            SourceValue::Int(0) | SourceValue::UInt(0) => Ok(Some(false)),
            SourceValue::Int(1) | SourceValue::UInt(1) => Ok(Some(true)),
            other => Err(ConvertError::new(
                column,
                format!("expected boolean 0/1, found {other:?}"),
            )),
        }
    }

    /// Required date column.
    pub fn date(&self, column: &str) -> Result<NaiveDate, ConvertError> {
        self.opt_date(column)?
            .ok_or_else(|| ConvertError::new(column, "required value is missing"))
    }

    /// Optional date column.
    pub fn opt_date(&self, column: &str) -> Result<Option<NaiveDate>, ConvertError> {
        match self.get(column) {
            SourceValue::Null => Ok(None),
            SourceValue::Date(d) => Ok(Some(*d)),
            SourceValue::DateTime(dt) => Ok(Some(dt.date())),
            other => Err(ConvertError::new(
                column,
                format!("expected date, found {other:?}"),
            )),
        }
    }

    /// Required datetime column, interpreted as UTC.
    pub fn datetime(&self, column: &str) -> Result<DateTime<Utc>, ConvertError> {
        self.opt_datetime(column)?
            .ok_or_else(|| ConvertError::new(column, "required value is missing"))
    }

    /// Optional datetime column, interpreted as UTC.
    pub fn opt_datetime(&self, column: &str) -> Result<Option<DateTime<Utc>>, ConvertError> {
        match self.get(column) {
            SourceValue::Null => Ok(None),
            SourceValue::DateTime(dt) => Ok(Some(dt.and_utc())),
            other => Err(ConvertError::new(
                column,
                format!("expected datetime, found {other:?}"),
            )),
        }
    }
}

/// A typed value bound into the destination insert.
#[derive(Debug, Clone)]
pub enum PgValue {
    Bool(Option<bool>),
    Int(Option<i64>),
    Text(Option<String>),
    Date(Option<NaiveDate>),
    Timestamp(Option<DateTime<Utc>>),
    Status(EnrollmentStatus),
    Role(UserRole),
}

/// A converted row: destination columns and matching values.
#[derive(Debug, Clone)]
pub struct ConvertedRow {
    pub columns: &'static [&'static str],
    pub values: Vec<PgValue>,
}

impl ConvertedRow {
    fn new(columns: &'static [&'static str], values: Vec<PgValue>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }
}

/// Conversion function for one table.
pub type ConvertFn = fn(&SourceRow) -> Result<ConvertedRow, ConvertError>;

/// One table in the migration plan.
pub struct TableSpec {
    /// Table name, identical on both sides.
    pub name: &'static str,
    /// Source column the export is ordered by, so destination key
    /// regeneration follows source key order.
    pub order_by: &'static str,
    pub convert: ConvertFn,
}

/// Migration plan in dependency order: parents before children, so the
/// destination's foreign keys are satisfied.
pub fn registry() -> &'static [TableSpec] {
    const REGISTRY: &[TableSpec] = &[
        TableSpec {
            name: "users",
            order_by: "id",
            convert: convert_users,
        },
        TableSpec {
            name: "children",
            order_by: "id",
            convert: convert_children,
        },
        TableSpec {
            name: "enrollments",
            order_by: "id",
            convert: convert_enrollments,
        },
        TableSpec {
            name: "enrollment_documents",
            order_by: "id",
            convert: convert_enrollment_documents,
        },
        TableSpec {
            name: "children_documents",
            order_by: "id",
            convert: convert_children_documents,
        },
        TableSpec {
            name: "attendance",
            order_by: "id",
            convert: convert_attendance,
        },
        TableSpec {
            name: "settings",
            order_by: "key",
            convert: convert_settings,
        },
    ];
    REGISTRY
}

fn convert_users(row: &SourceRow) -> Result<ConvertedRow, ConvertError> {
    const COLUMNS: &[&str] = &["email", "full_name", "phone", "role", "is_active", "created_at"];

    let role_raw = row.opt_text("role")?.unwrap_or_else(|| "parent".to_string());
    let role = UserRole::parse(role_raw.trim().to_lowercase().as_str())
        .ok_or_else(|| ConvertError::new("role", format!("unknown role '{role_raw}'")))?;

    Ok(ConvertedRow::new(
        COLUMNS,
        vec![
            PgValue::Text(Some(row.text("email")?)),
            PgValue::Text(row.opt_text("full_name")?),
            PgValue::Text(row.opt_text("phone")?),
            PgValue::Role(role),
            PgValue::Bool(Some(row.opt_boolish("is_active")?.unwrap_or(true))),
            PgValue::Timestamp(Some(row.datetime("created_at")?)),
        ],
    ))
}

fn convert_children(row: &SourceRow) -> Result<ConvertedRow, ConvertError> {
    const COLUMNS: &[&str] = &[
        "parent_id",
        "first_name",
        "last_name",
        "birth_date",
        "gender",
        "medical_notes",
        "emergency_contact",
        "created_at",
    ];

    Ok(ConvertedRow::new(
        COLUMNS,
        vec![
            PgValue::Int(Some(row.int("parent_id")?)),
            PgValue::Text(Some(row.text("first_name")?)),
            PgValue::Text(row.opt_text("last_name")?),
            PgValue::Date(row.opt_date("birth_date")?),
            PgValue::Text(row.opt_text("gender")?.map(|g| g.to_lowercase())),
            PgValue::Text(row.opt_text("medical_notes")?),
            PgValue::Text(row.opt_text("emergency_contact")?),
            PgValue::Timestamp(Some(row.datetime("created_at")?)),
        ],
    ))
}

fn convert_enrollments(row: &SourceRow) -> Result<ConvertedRow, ConvertError> {
    const COLUMNS: &[&str] = &[
        "applicant_name",
        "applicant_email",
        "applicant_phone",
        "child_first_name",
        "child_last_name",
        "child_birth_date",
        "child_gender",
        "child_medical_notes",
        "child_emergency_contact",
        "status",
        "parent_id",
        "child_id",
        "decided_by",
        "decided_at",
        "decision_reason",
        "created_at",
    ];

    let status_raw = row.text("status")?;
    let status = EnrollmentStatus::parse(status_raw.trim().to_lowercase().as_str())
        .ok_or_else(|| ConvertError::new("status", format!("unknown status '{status_raw}'")))?;

    Ok(ConvertedRow::new(
        COLUMNS,
        vec![
            PgValue::Text(row.opt_text("applicant_name")?),
            PgValue::Text(Some(row.text("applicant_email")?)),
            PgValue::Text(row.opt_text("applicant_phone")?),
            PgValue::Text(Some(row.text("child_first_name")?)),
            PgValue::Text(row.opt_text("child_last_name")?),
            PgValue::Date(row.opt_date("child_birth_date")?),
            PgValue::Text(row.opt_text("child_gender")?.map(|g| g.to_lowercase())),
            PgValue::Text(row.opt_text("child_medical_notes")?),
            PgValue::Text(row.opt_text("child_emergency_contact")?),
            PgValue::Status(status),
            PgValue::Int(row.opt_int("parent_id")?),
            PgValue::Int(row.opt_int("child_id")?),
            PgValue::Int(row.opt_int("decided_by")?),
            PgValue::Timestamp(row.opt_datetime("decided_at")?),
            PgValue::Text(row.opt_text("decision_reason")?),
            PgValue::Timestamp(Some(row.datetime("created_at")?)),
        ],
    ))
}

fn convert_enrollment_documents(row: &SourceRow) -> Result<ConvertedRow, ConvertError> {
    const COLUMNS: &[&str] = &[
        "enrollment_id",
        "file_path",
        "mime_type",
        "category",
        "size_bytes",
        "uploaded_at",
    ];

    Ok(ConvertedRow::new(
        COLUMNS,
        vec![
            PgValue::Int(Some(row.int("enrollment_id")?)),
            PgValue::Text(Some(row.text("file_path")?)),
            PgValue::Text(Some(row.text("mime_type")?)),
            PgValue::Text(row.opt_text("category")?),
            PgValue::Int(row.opt_int("size_bytes")?),
            PgValue::Timestamp(Some(row.datetime("uploaded_at")?)),
        ],
    ))
}

fn convert_children_documents(row: &SourceRow) -> Result<ConvertedRow, ConvertError> {
    const COLUMNS: &[&str] = &[
        "child_id",
        "file_path",
        "mime_type",
        "category",
        "size_bytes",
        "uploaded_at",
    ];

    Ok(ConvertedRow::new(
        COLUMNS,
        vec![
            PgValue::Int(Some(row.int("child_id")?)),
            PgValue::Text(Some(row.text("file_path")?)),
            PgValue::Text(Some(row.text("mime_type")?)),
            PgValue::Text(row.opt_text("category")?),
            PgValue::Int(row.opt_int("size_bytes")?),
            PgValue::Timestamp(Some(row.datetime("uploaded_at")?)),
        ],
    ))
}

fn convert_attendance(row: &SourceRow) -> Result<ConvertedRow, ConvertError> {
    const COLUMNS: &[&str] = &[
        "child_id",
        "attended_on",
        "checked_in_at",
        "checked_out_at",
        "notes",
    ];

    Ok(ConvertedRow::new(
        COLUMNS,
        vec![
            PgValue::Int(Some(row.int("child_id")?)),
            PgValue::Date(Some(row.date("attended_on")?)),
            PgValue::Timestamp(row.opt_datetime("checked_in_at")?),
            PgValue::Timestamp(row.opt_datetime("checked_out_at")?),
            PgValue::Text(row.opt_text("notes")?),
        ],
    ))
}

fn convert_settings(row: &SourceRow) -> Result<ConvertedRow, ConvertError> {
    const COLUMNS: &[&str] = &["key", "value", "updated_at"];

    Ok(ConvertedRow::new(
        COLUMNS,
        vec![
            PgValue::Text(Some(row.text("key")?)),
            PgValue::Text(row.opt_text("value")?),
            PgValue::Timestamp(Some(row.datetime("updated_at")?)),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(s: &str) -> SourceValue {
        SourceValue::DateTime(
            NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap(),
        )
    }

    fn user_row() -> SourceRow {
        SourceRow::from_pairs([
            ("id", SourceValue::Int(7)),
            ("email", SourceValue::Text("a@x.com".into())),
            ("full_name", SourceValue::Text("Alice Example".into())),
            ("phone", SourceValue::Null),
            ("role", SourceValue::Text("PARENT".into())),
            ("is_active", SourceValue::Int(1)),
            ("created_at", dt("2023-04-01 08:30:00")),
        ])
    }

    #[test]
    fn users_integer_boolean_becomes_bool() {
        let converted = convert_users(&user_row()).unwrap();
        assert_eq!(converted.columns.len(), converted.values.len());
        assert!(matches!(converted.values[4], PgValue::Bool(Some(true))));

        let mut row = user_row();
        row.values
            .insert("is_active".into(), SourceValue::Int(0));
        let converted = convert_users(&row).unwrap();
        assert!(matches!(converted.values[4], PgValue::Bool(Some(false))));
    }

    #[test]
    fn users_role_string_becomes_enum() {
        let converted = convert_users(&user_row()).unwrap();
        assert!(matches!(converted.values[3], PgValue::Role(UserRole::Parent)));

        let mut row = user_row();
        row.values
            .insert("role".into(), SourceValue::Text("superuser".into()));
        let err = convert_users(&row).unwrap_err();
        assert_eq!(err.column, "role");
    }

    #[test]
    fn users_identity_column_is_dropped() {
        let converted = convert_users(&user_row()).unwrap();
        assert!(!converted.columns.contains(&"id"));
    }

    #[test]
    fn missing_required_column_names_the_column() {
        let row = SourceRow::from_pairs([("full_name", SourceValue::Text("x".into()))]);
        let err = convert_users(&row).unwrap_err();
        assert_eq!(err.column, "email");
    }

    #[test]
    fn enrollment_status_string_becomes_enum() {
        let row = SourceRow::from_pairs([
            ("applicant_email", SourceValue::Text("a@x.com".into())),
            ("child_first_name", SourceValue::Text("Sam".into())),
            ("status", SourceValue::Text("rejected_incomplete".into())),
            ("created_at", dt("2023-04-01 08:30:00")),
        ]);
        let converted = convert_enrollments(&row).unwrap();
        assert!(matches!(
            converted.values[9],
            PgValue::Status(EnrollmentStatus::RejectedIncomplete)
        ));

        let mut row = row;
        row.values
            .insert("status".into(), SourceValue::Text("archived".into()));
        let err = convert_enrollments(&row).unwrap_err();
        assert_eq!(err.column, "status");
    }

    #[test]
    fn datetimes_are_interpreted_as_utc() {
        let row = user_row();
        let converted = convert_users(&row).unwrap();
        match &converted.values[5] {
            PgValue::Timestamp(Some(ts)) => {
                assert_eq!(ts.to_rfc3339(), "2023-04-01T08:30:00+00:00");
            }
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn attendance_requires_the_day() {
        let row = SourceRow::from_pairs([
            ("child_id", SourceValue::Int(3)),
            (
                "attended_on",
                SourceValue::Date(NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()),
            ),
        ]);
        let converted = convert_attendance(&row).unwrap();
        assert!(matches!(converted.values[1], PgValue::Date(Some(_))));

        let row = SourceRow::from_pairs([("child_id", SourceValue::Int(3))]);
        let err = convert_attendance(&row).unwrap_err();
        assert_eq!(err.column, "attended_on");
    }

    #[test]
    fn gender_is_normalized_to_lowercase() {
        let row = SourceRow::from_pairs([
            ("parent_id", SourceValue::Int(1)),
            ("first_name", SourceValue::Text("Sam".into())),
            ("gender", SourceValue::Text("Male".into())),
            ("created_at", dt("2023-04-01 08:30:00")),
        ]);
        let converted = convert_children(&row).unwrap();
        match &converted.values[4] {
            PgValue::Text(Some(gender)) => assert_eq!(gender, "male"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn unsigned_counters_fit_into_int() {
        let row = SourceRow::from_pairs([
            ("enrollment_id", SourceValue::UInt(9)),
            ("file_path", SourceValue::Text("uploads/a.pdf".into())),
            ("mime_type", SourceValue::Text("application/pdf".into())),
            ("size_bytes", SourceValue::UInt(2048)),
            ("uploaded_at", dt("2023-04-02 10:00:00")),
        ]);
        let converted = convert_enrollment_documents(&row).unwrap();
        assert!(matches!(converted.values[0], PgValue::Int(Some(9))));
        assert!(matches!(converted.values[4], PgValue::Int(Some(2048))));
    }

    #[test]
    fn registry_is_in_dependency_order() {
        let order: Vec<&str> = registry().iter().map(|spec| spec.name).collect();
        let position =
            |name: &str| order.iter().position(|t| *t == name).expect("table missing");

        assert!(position("users") < position("children"));
        assert!(position("children") < position("enrollments"));
        assert!(position("enrollments") < position("enrollment_documents"));
        assert!(position("children") < position("children_documents"));
        assert!(position("children") < position("attendance"));
        assert_eq!(order.len(), 7);
    }
}
