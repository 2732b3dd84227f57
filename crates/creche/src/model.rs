//! Domain model: enrollment lifecycle, users, children and documents.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

use crate::error::{AppError, Result};

/// Lifecycle status of an enrollment.
///
/// `pending` is the sole initial state; the three remaining values are
/// terminal and no edge leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "enrollment_status", rename_all = "snake_case")]
pub enum EnrollmentStatus {
    #[default]
    Pending,
    Approved,
    RejectedIncomplete,
    RejectedDeleted,
}

impl EnrollmentStatus {
    /// Whether the status permits no further transition.
    pub fn is_terminal(self) -> bool {
        self != EnrollmentStatus::Pending
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Approved => "approved",
            EnrollmentStatus::RejectedIncomplete => "rejected_incomplete",
            EnrollmentStatus::RejectedDeleted => "rejected_deleted",
        }
    }

    /// Parse a stored status value, e.g. from a legacy database snapshot.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(EnrollmentStatus::Pending),
            "approved" => Some(EnrollmentStatus::Approved),
            "rejected_incomplete" => Some(EnrollmentStatus::RejectedIncomplete),
            "rejected_deleted" => Some(EnrollmentStatus::RejectedDeleted),
            _ => None,
        }
    }
}

/// Role of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type, Default)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Parent,
    Staff,
    Admin,
}

impl UserRole {
    /// Parse a stored role value, e.g. from a legacy database snapshot.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "parent" => Some(UserRole::Parent),
            "staff" => Some(UserRole::Staff),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

/// Rejection subtype chosen by staff, mapping to a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Incomplete,
    Delete,
}

impl RejectionKind {
    /// Terminal status this rejection produces.
    pub fn terminal_status(self) -> EnrollmentStatus {
        match self {
            RejectionKind::Incomplete => EnrollmentStatus::RejectedIncomplete,
            RejectionKind::Delete => EnrollmentStatus::RejectedDeleted,
        }
    }
}

/// A parent or staff account.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A child created by an enrollment approval.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Child {
    pub id: i64,
    pub parent_id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub gender: Option<String>,
    pub medical_notes: Option<String>,
    pub emergency_contact: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A pending or decided enrollment application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Enrollment {
    pub id: i64,
    pub applicant_name: Option<String>,
    pub applicant_email: String,
    pub applicant_phone: Option<String>,
    pub child_first_name: String,
    pub child_last_name: Option<String>,
    pub child_birth_date: Option<NaiveDate>,
    pub child_gender: Option<String>,
    pub child_medical_notes: Option<String>,
    pub child_emergency_contact: Option<String>,
    pub status: EnrollmentStatus,
    pub parent_id: Option<i64>,
    pub child_id: Option<i64>,
    pub decided_by: Option<i64>,
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A document attached to a pending enrollment.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentDocument {
    pub id: i64,
    pub enrollment_id: i64,
    pub file_path: String,
    pub mime_type: String,
    pub category: Option<String>,
    pub size_bytes: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

/// A document owned by a child, copied from an enrollment on approval.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChildDocument {
    pub id: i64,
    pub child_id: i64,
    pub file_path: String,
    pub mime_type: String,
    pub category: Option<String>,
    pub size_bytes: Option<i64>,
    pub uploaded_at: DateTime<Utc>,
}

/// Public enrollment submission. Unknown fields are rejected at the boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewEnrollment {
    pub applicant_name: Option<String>,
    pub applicant_email: String,
    pub applicant_phone: Option<String>,
    pub child_first_name: String,
    pub child_last_name: Option<String>,
    pub child_birth_date: Option<NaiveDate>,
    pub child_gender: Option<String>,
    pub child_medical_notes: Option<String>,
    pub child_emergency_contact: Option<String>,
}

impl NewEnrollment {
    /// Validation gate: applicant email and child first name are mandatory.
    pub fn validate(&self) -> Result<()> {
        if self.applicant_email.trim().is_empty() {
            return Err(AppError::validation("applicant_email is required"));
        }
        if !self.applicant_email.contains('@') {
            return Err(AppError::validation(
                "applicant_email must be a valid email address",
            ));
        }
        if self.child_first_name.trim().is_empty() {
            return Err(AppError::validation("child_first_name is required"));
        }
        Ok(())
    }
}

/// Rejection request body.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RejectEnrollment {
    pub reason: String,
    #[serde(rename = "type")]
    pub kind: RejectionKind,
}

/// Candidate document metadata, staged by the upload middleware.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentUpload {
    pub file_path: String,
    pub mime_type: String,
    pub category: Option<String>,
    pub size_bytes: i64,
}

/// Identifier and status of a freshly created enrollment.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnrollmentTicket {
    pub id: i64,
    pub status: EnrollmentStatus,
}

/// Result of an approval: the (possibly pre-existing) parent and new child.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ApprovalOutcome {
    pub parent_id: i64,
    pub child_id: i64,
}

/// Listing filter and pagination.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrollmentFilter {
    pub status: Option<EnrollmentStatus>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page", alias = "limit")]
    pub per_page: u32,
}

impl Default for EnrollmentFilter {
    fn default() -> Self {
        Self {
            status: None,
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

impl EnrollmentFilter {
    pub fn validate(&self) -> Result<()> {
        if self.page == 0 {
            return Err(AppError::validation("page must be greater than 0"));
        }
        if self.per_page == 0 || self.per_page > 100 {
            return Err(AppError::validation("per_page must be between 1 and 100"));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// One row of the enrollment listing, joined with its document count.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnrollmentSummary {
    pub id: i64,
    pub applicant_name: Option<String>,
    pub applicant_email: String,
    pub child_first_name: String,
    pub child_last_name: Option<String>,
    pub status: EnrollmentStatus,
    pub document_count: i64,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// A page of enrollment summaries.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentPage {
    pub items: Vec<EnrollmentSummary>,
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl EnrollmentPage {
    pub fn new(items: Vec<EnrollmentSummary>, filter: &EnrollmentFilter, total: u64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(u64::from(filter.per_page)) as u32
        };
        Self {
            items,
            page: filter.page,
            per_page: filter.per_page,
            total,
            total_pages,
        }
    }
}

/// An enrollment together with its attached documents.
#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentDetail {
    pub enrollment: Enrollment,
    pub documents: Vec<EnrollmentDocument>,
}

/// An admin setting.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: Option<String>,
    pub updated_at: DateTime<Utc>,
}

const fn default_page() -> u32 {
    1
}

const fn default_per_page() -> u32 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> NewEnrollment {
        NewEnrollment {
            applicant_name: Some("Alice Example".into()),
            applicant_email: "a@x.com".into(),
            applicant_phone: None,
            child_first_name: "Sam".into(),
            child_last_name: None,
            child_birth_date: None,
            child_gender: None,
            child_medical_notes: None,
            child_emergency_contact: None,
        }
    }

    #[test]
    fn validation_gate_requires_email_and_first_name() {
        assert!(submission().validate().is_ok());

        let mut missing_email = submission();
        missing_email.applicant_email = "  ".into();
        assert!(matches!(
            missing_email.validate(),
            Err(AppError::Validation(_))
        ));

        let mut bad_email = submission();
        bad_email.applicant_email = "not-an-email".into();
        assert!(matches!(bad_email.validate(), Err(AppError::Validation(_))));

        let mut missing_name = submission();
        missing_name.child_first_name = String::new();
        assert!(matches!(
            missing_name.validate(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let body = r#"{"applicant_email":"a@x.com","child_first_name":"Sam","admin":true}"#;
        assert!(serde_json::from_str::<NewEnrollment>(body).is_err());
    }

    #[test]
    fn pending_is_the_only_non_terminal_status() {
        assert!(!EnrollmentStatus::Pending.is_terminal());
        assert!(EnrollmentStatus::Approved.is_terminal());
        assert!(EnrollmentStatus::RejectedIncomplete.is_terminal());
        assert!(EnrollmentStatus::RejectedDeleted.is_terminal());
    }

    #[test]
    fn rejection_kind_maps_to_terminal_status() {
        assert_eq!(
            RejectionKind::Incomplete.terminal_status(),
            EnrollmentStatus::RejectedIncomplete
        );
        assert_eq!(
            RejectionKind::Delete.terminal_status(),
            EnrollmentStatus::RejectedDeleted
        );
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            EnrollmentStatus::Pending,
            EnrollmentStatus::Approved,
            EnrollmentStatus::RejectedIncomplete,
            EnrollmentStatus::RejectedDeleted,
        ] {
            assert_eq!(EnrollmentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EnrollmentStatus::parse("cancelled"), None);
    }

    #[test]
    fn filter_validation_and_offset() {
        let filter = EnrollmentFilter {
            status: None,
            page: 3,
            per_page: 20,
        };
        assert!(filter.validate().is_ok());
        assert_eq!(filter.offset(), 40);

        let zero_page = EnrollmentFilter {
            page: 0,
            ..EnrollmentFilter::default()
        };
        assert!(zero_page.validate().is_err());

        let oversized = EnrollmentFilter {
            per_page: 500,
            ..EnrollmentFilter::default()
        };
        assert!(oversized.validate().is_err());
    }

    #[test]
    fn limit_is_accepted_as_per_page_alias() {
        let filter: EnrollmentFilter =
            serde_json::from_str(r#"{"status":"pending","limit":5}"#).unwrap();
        assert_eq!(filter.per_page, 5);
        assert_eq!(filter.status, Some(EnrollmentStatus::Pending));
    }
}
