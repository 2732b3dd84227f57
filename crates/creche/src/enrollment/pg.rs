//! PostgreSQL enrollment store.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::model::{
    ApprovalOutcome, DocumentUpload, Enrollment, EnrollmentDetail, EnrollmentDocument,
    EnrollmentFilter, EnrollmentPage, EnrollmentStatus, EnrollmentTicket, NewEnrollment,
    RejectionKind, UserRole,
};

use super::EnrollmentStore;

/// All columns of the `enrollments` table, in declaration order.
const ENROLLMENT_COLUMNS: &str = "\
    id, applicant_name, applicant_email, applicant_phone, \
    child_first_name, child_last_name, child_birth_date, child_gender, \
    child_medical_notes, child_emergency_contact, \
    status, parent_id, child_id, decided_by, decided_at, decision_reason, created_at";

/// Enrollment store backed by PostgreSQL.
#[derive(Clone)]
pub struct PgEnrollmentStore {
    pool: PgPool,
}

impl PgEnrollmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EnrollmentStore for PgEnrollmentStore {
    async fn create(&self, input: NewEnrollment) -> Result<EnrollmentTicket> {
        input.validate()?;

        // Single-statement transaction, like the approval path.
        let mut tx = self.pool.begin().await?;

        let ticket = sqlx::query_as::<_, EnrollmentTicket>(
            r#"
            INSERT INTO enrollments (
                applicant_name, applicant_email, applicant_phone,
                child_first_name, child_last_name, child_birth_date,
                child_gender, child_medical_notes, child_emergency_contact
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, status
            "#,
        )
        .bind(&input.applicant_name)
        .bind(input.applicant_email.trim())
        .bind(&input.applicant_phone)
        .bind(input.child_first_name.trim())
        .bind(&input.child_last_name)
        .bind(input.child_birth_date)
        .bind(&input.child_gender)
        .bind(&input.child_medical_notes)
        .bind(&input.child_emergency_contact)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("enrollment {} created", ticket.id);
        Ok(ticket)
    }

    async fn approve(&self, enrollment_id: i64, approver_id: i64) -> Result<ApprovalOutcome> {
        let mut tx = self.pool.begin().await?;

        // Lock the row so concurrent approvals of the same enrollment
        // serialize here.
        let lock_sql =
            format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1 FOR UPDATE");
        let enrollment = sqlx::query_as::<_, Enrollment>(&lock_sql)
            .bind(enrollment_id)
            .fetch_optional(&mut *tx)
            .await?
        .ok_or_else(|| AppError::not_found(format!("enrollment {enrollment_id} not found")))?;

        // Re-check after lock acquisition: a concurrent request may have
        // decided this enrollment while we waited for the lock.
        if enrollment.status != EnrollmentStatus::Pending {
            return Err(AppError::conflict(format!(
                "enrollment {enrollment_id} is already {}",
                enrollment.status.as_str()
            )));
        }

        // Reuse the parent account if the applicant email is known,
        // otherwise create one lazily.
        let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(&enrollment.applicant_email)
            .fetch_optional(&mut *tx)
            .await?;

        let parent_id = match existing {
            Some(id) => {
                debug!("reusing user {id} for {}", enrollment.applicant_email);
                id
            }
            None => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO users (email, full_name, phone, role)
                    VALUES ($1, $2, $3, $4)
                    RETURNING id
                    "#,
                )
                .bind(&enrollment.applicant_email)
                .bind(&enrollment.applicant_name)
                .bind(&enrollment.applicant_phone)
                .bind(UserRole::Parent)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let child_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO children (
                parent_id, first_name, last_name, birth_date,
                gender, medical_notes, emergency_contact
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(parent_id)
        .bind(&enrollment.child_first_name)
        .bind(&enrollment.child_last_name)
        .bind(enrollment.child_birth_date)
        .bind(&enrollment.child_gender)
        .bind(&enrollment.child_medical_notes)
        .bind(&enrollment.child_emergency_contact)
        .fetch_one(&mut *tx)
        .await?;

        // Copy the enrollment's documents into the child's document set.
        sqlx::query(
            r#"
            INSERT INTO children_documents (child_id, file_path, mime_type, category, size_bytes)
            SELECT $1, file_path, mime_type, category, size_bytes
            FROM enrollment_documents
            WHERE enrollment_id = $2
            "#,
        )
        .bind(child_id)
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE enrollments
            SET status = $1, parent_id = $2, child_id = $3,
                decided_by = $4, decided_at = NOW()
            WHERE id = $5
            "#,
        )
        .bind(EnrollmentStatus::Approved)
        .bind(parent_id)
        .bind(child_id)
        .bind(approver_id)
        .bind(enrollment_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            "enrollment {enrollment_id} approved: parent {parent_id}, child {child_id}"
        );
        Ok(ApprovalOutcome {
            parent_id,
            child_id,
        })
    }

    async fn reject(
        &self,
        enrollment_id: i64,
        approver_id: i64,
        reason: String,
        kind: RejectionKind,
    ) -> Result<EnrollmentStatus> {
        let status = kind.terminal_status();

        // No derived entities are created, so a guarded single-row update
        // suffices.
        let result = sqlx::query(
            r#"
            UPDATE enrollments
            SET status = $1, decision_reason = $2, decided_by = $3, decided_at = NOW()
            WHERE id = $4 AND status = 'pending'
            "#,
        )
        .bind(status)
        .bind(&reason)
        .bind(approver_id)
        .bind(enrollment_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current: Option<EnrollmentStatus> =
                sqlx::query_scalar("SELECT status FROM enrollments WHERE id = $1")
                    .bind(enrollment_id)
                    .fetch_optional(&self.pool)
                    .await?;

            return match current {
                None => Err(AppError::not_found(format!(
                    "enrollment {enrollment_id} not found"
                ))),
                Some(current) => Err(AppError::conflict(format!(
                    "enrollment {enrollment_id} is already {}",
                    current.as_str()
                ))),
            };
        }

        info!("enrollment {enrollment_id} rejected as {}", status.as_str());
        Ok(status)
    }

    async fn list(&self, filter: EnrollmentFilter) -> Result<EnrollmentPage> {
        filter.validate()?;

        let mut count_builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM enrollments");
        if let Some(status) = filter.status {
            count_builder.push(" WHERE status = ").push_bind(status);
        }
        let total: i64 = count_builder
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            SELECT
                e.id,
                e.applicant_name,
                e.applicant_email,
                e.child_first_name,
                e.child_last_name,
                e.status,
                COUNT(d.id) AS document_count,
                e.created_at,
                e.decided_at
            FROM enrollments e
            LEFT JOIN enrollment_documents d ON d.enrollment_id = e.id
            "#,
        );
        if let Some(status) = filter.status {
            builder.push(" WHERE e.status = ").push_bind(status);
        }
        builder.push(" GROUP BY e.id ORDER BY e.created_at DESC, e.id DESC");
        builder
            .push(" LIMIT ")
            .push_bind(i64::from(filter.per_page))
            .push(" OFFSET ")
            .push_bind(filter.offset());

        let items = builder.build_query_as().fetch_all(&self.pool).await?;

        Ok(EnrollmentPage::new(
            items,
            &filter,
            u64::try_from(total).unwrap_or(0),
        ))
    }

    async fn get(&self, enrollment_id: i64) -> Result<EnrollmentDetail> {
        let sql = format!("SELECT {ENROLLMENT_COLUMNS} FROM enrollments WHERE id = $1");
        let enrollment = sqlx::query_as::<_, Enrollment>(&sql)
            .bind(enrollment_id)
            .fetch_optional(&self.pool)
            .await?
        .ok_or_else(|| AppError::not_found(format!("enrollment {enrollment_id} not found")))?;

        let documents = sqlx::query_as::<_, EnrollmentDocument>(
            r#"
            SELECT id, enrollment_id, file_path, mime_type, category, size_bytes, uploaded_at
            FROM enrollment_documents
            WHERE enrollment_id = $1
            ORDER BY id
            "#,
        )
        .bind(enrollment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(EnrollmentDetail {
            enrollment,
            documents,
        })
    }

    async fn attach_documents(
        &self,
        enrollment_id: i64,
        documents: Vec<DocumentUpload>,
    ) -> Result<Vec<EnrollmentDocument>> {
        let mut tx = self.pool.begin().await?;

        let status: Option<EnrollmentStatus> =
            sqlx::query_scalar("SELECT status FROM enrollments WHERE id = $1 FOR UPDATE")
                .bind(enrollment_id)
                .fetch_optional(&mut *tx)
                .await?;

        match status {
            None => {
                return Err(AppError::not_found(format!(
                    "enrollment {enrollment_id} not found"
                )))
            }
            Some(status) if status.is_terminal() => {
                return Err(AppError::conflict(format!(
                    "enrollment {enrollment_id} is already {}",
                    status.as_str()
                )))
            }
            Some(_) => {}
        }

        let mut inserted = Vec::with_capacity(documents.len());
        for doc in documents {
            let row = sqlx::query_as::<_, EnrollmentDocument>(
                r#"
                INSERT INTO enrollment_documents
                    (enrollment_id, file_path, mime_type, category, size_bytes)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id, enrollment_id, file_path, mime_type, category, size_bytes, uploaded_at
                "#,
            )
            .bind(enrollment_id)
            .bind(&doc.file_path)
            .bind(&doc.mime_type)
            .bind(&doc.category)
            .bind(doc.size_bytes)
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row);
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
