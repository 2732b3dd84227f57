//! In-memory enrollment store.
//!
//! Mirrors the state machine of the PostgreSQL store behind a single lock,
//! which makes every operation atomic by construction. Used by handler and
//! workflow tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::model::{
    ApprovalOutcome, Child, ChildDocument, DocumentUpload, Enrollment, EnrollmentDetail,
    EnrollmentDocument, EnrollmentFilter, EnrollmentPage, EnrollmentStatus, EnrollmentSummary,
    EnrollmentTicket, NewEnrollment, RejectionKind, User, UserRole,
};

use super::EnrollmentStore;

#[derive(Debug, Default)]
struct MemoryInner {
    next_id: i64,
    users: BTreeMap<i64, User>,
    children: BTreeMap<i64, Child>,
    enrollments: BTreeMap<i64, Enrollment>,
    enrollment_documents: BTreeMap<i64, EnrollmentDocument>,
    children_documents: Vec<ChildDocument>,
}

impl MemoryInner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn document_count(&self, enrollment_id: i64) -> i64 {
        self.enrollment_documents
            .values()
            .filter(|d| d.enrollment_id == enrollment_id)
            .count() as i64
    }
}

/// Enrollment store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryEnrollmentStore {
    inner: RwLock<MemoryInner>,
}

impl InMemoryEnrollmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryEnrollmentStore {
    async fn create(&self, input: NewEnrollment) -> Result<EnrollmentTicket> {
        input.validate()?;

        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        let enrollment = Enrollment {
            id,
            applicant_name: input.applicant_name,
            applicant_email: input.applicant_email.trim().to_string(),
            applicant_phone: input.applicant_phone,
            child_first_name: input.child_first_name.trim().to_string(),
            child_last_name: input.child_last_name,
            child_birth_date: input.child_birth_date,
            child_gender: input.child_gender,
            child_medical_notes: input.child_medical_notes,
            child_emergency_contact: input.child_emergency_contact,
            status: EnrollmentStatus::Pending,
            parent_id: None,
            child_id: None,
            decided_by: None,
            decided_at: None,
            decision_reason: None,
            created_at: Utc::now(),
        };
        inner.enrollments.insert(id, enrollment);

        Ok(EnrollmentTicket {
            id,
            status: EnrollmentStatus::Pending,
        })
    }

    async fn approve(&self, enrollment_id: i64, approver_id: i64) -> Result<ApprovalOutcome> {
        let mut inner = self.inner.write().await;

        let enrollment = inner
            .enrollments
            .get(&enrollment_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("enrollment {enrollment_id} not found")))?;

        if enrollment.status != EnrollmentStatus::Pending {
            return Err(AppError::conflict(format!(
                "enrollment {enrollment_id} is already {}",
                enrollment.status.as_str()
            )));
        }

        let existing = inner
            .users
            .values()
            .find(|u| u.email == enrollment.applicant_email)
            .map(|u| u.id);
        let parent_id = match existing {
            Some(id) => id,
            None => {
                let id = inner.next_id();
                inner.users.insert(
                    id,
                    User {
                        id,
                        email: enrollment.applicant_email.clone(),
                        full_name: enrollment.applicant_name.clone(),
                        phone: enrollment.applicant_phone.clone(),
                        role: UserRole::Parent,
                        is_active: true,
                        created_at: Utc::now(),
                    },
                );
                id
            }
        };

        let child_id = inner.next_id();
        inner.children.insert(
            child_id,
            Child {
                id: child_id,
                parent_id,
                first_name: enrollment.child_first_name.clone(),
                last_name: enrollment.child_last_name.clone(),
                birth_date: enrollment.child_birth_date,
                gender: enrollment.child_gender.clone(),
                medical_notes: enrollment.child_medical_notes.clone(),
                emergency_contact: enrollment.child_emergency_contact.clone(),
                created_at: Utc::now(),
            },
        );

        let copies: Vec<ChildDocument> = inner
            .enrollment_documents
            .values()
            .filter(|d| d.enrollment_id == enrollment_id)
            .map(|d| ChildDocument {
                id: d.id,
                child_id,
                file_path: d.file_path.clone(),
                mime_type: d.mime_type.clone(),
                category: d.category.clone(),
                size_bytes: d.size_bytes,
                uploaded_at: d.uploaded_at,
            })
            .collect();
        inner.children_documents.extend(copies);

        let entry = inner
            .enrollments
            .get_mut(&enrollment_id)
            .expect("row checked above");
        entry.status = EnrollmentStatus::Approved;
        entry.parent_id = Some(parent_id);
        entry.child_id = Some(child_id);
        entry.decided_by = Some(approver_id);
        entry.decided_at = Some(Utc::now());

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
        let mut inner = self.inner.write().await;

        let entry = inner
            .enrollments
            .get_mut(&enrollment_id)
            .ok_or_else(|| AppError::not_found(format!("enrollment {enrollment_id} not found")))?;

        if entry.status != EnrollmentStatus::Pending {
            return Err(AppError::conflict(format!(
                "enrollment {enrollment_id} is already {}",
                entry.status.as_str()
            )));
        }

        let status = kind.terminal_status();
        entry.status = status;
        entry.decision_reason = Some(reason);
        entry.decided_by = Some(approver_id);
        entry.decided_at = Some(Utc::now());

        Ok(status)
    }

    async fn list(&self, filter: EnrollmentFilter) -> Result<EnrollmentPage> {
        filter.validate()?;

        let inner = self.inner.read().await;

        let mut matching: Vec<&Enrollment> = inner
            .enrollments
            .values()
            .filter(|e| filter.status.is_none_or(|status| e.status == status))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as u64;
        let start = filter.offset() as usize;
        let items: Vec<EnrollmentSummary> = matching
            .into_iter()
            .skip(start)
            .take(filter.per_page as usize)
            .map(|e| EnrollmentSummary {
                id: e.id,
                applicant_name: e.applicant_name.clone(),
                applicant_email: e.applicant_email.clone(),
                child_first_name: e.child_first_name.clone(),
                child_last_name: e.child_last_name.clone(),
                status: e.status,
                document_count: inner.document_count(e.id),
                created_at: e.created_at,
                decided_at: e.decided_at,
            })
            .collect();

        Ok(EnrollmentPage::new(items, &filter, total))
    }

    async fn get(&self, enrollment_id: i64) -> Result<EnrollmentDetail> {
        let inner = self.inner.read().await;

        let enrollment = inner
            .enrollments
            .get(&enrollment_id)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("enrollment {enrollment_id} not found")))?;

        let documents = inner
            .enrollment_documents
            .values()
            .filter(|d| d.enrollment_id == enrollment_id)
            .cloned()
            .collect();

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
        let mut inner = self.inner.write().await;

        match inner.enrollments.get(&enrollment_id) {
            None => {
                return Err(AppError::not_found(format!(
                    "enrollment {enrollment_id} not found"
                )))
            }
            Some(e) if e.status.is_terminal() => {
                return Err(AppError::conflict(format!(
                    "enrollment {enrollment_id} is already {}",
                    e.status.as_str()
                )))
            }
            Some(_) => {}
        }

        let mut inserted = Vec::with_capacity(documents.len());
        for doc in documents {
            let id = inner.next_id();
            let row = EnrollmentDocument {
                id,
                enrollment_id,
                file_path: doc.file_path,
                mime_type: doc.mime_type,
                category: doc.category,
                size_bytes: Some(doc.size_bytes),
                uploaded_at: Utc::now(),
            };
            inner.enrollment_documents.insert(id, row.clone());
            inserted.push(row);
        }

        Ok(inserted)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(email: &str, first_name: &str) -> NewEnrollment {
        NewEnrollment {
            applicant_name: Some("Alice Example".into()),
            applicant_email: email.into(),
            applicant_phone: None,
            child_first_name: first_name.into(),
            child_last_name: None,
            child_birth_date: None,
            child_gender: None,
            child_medical_notes: None,
            child_emergency_contact: None,
        }
    }

    #[tokio::test]
    async fn approve_creates_user_child_and_links() {
        let store = InMemoryEnrollmentStore::new();
        let ticket = store.create(submission("a@x.com", "Sam")).await.unwrap();
        assert_eq!(ticket.status, EnrollmentStatus::Pending);

        let outcome = store.approve(ticket.id, 99).await.unwrap();

        let inner = store.inner.read().await;
        let user = inner.users.get(&outcome.parent_id).unwrap();
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.role, UserRole::Parent);

        let child = inner.children.get(&outcome.child_id).unwrap();
        assert_eq!(child.first_name, "Sam");
        assert_eq!(child.parent_id, outcome.parent_id);

        let enrollment = inner.enrollments.get(&ticket.id).unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Approved);
        assert_eq!(enrollment.parent_id, Some(outcome.parent_id));
        assert_eq!(enrollment.child_id, Some(outcome.child_id));
        assert_eq!(enrollment.decided_by, Some(99));
        assert!(enrollment.decided_at.is_some());
    }

    #[tokio::test]
    async fn approving_twice_is_a_conflict() {
        let store = InMemoryEnrollmentStore::new();
        let ticket = store.create(submission("a@x.com", "Sam")).await.unwrap();

        store.approve(ticket.id, 1).await.unwrap();
        let err = store.approve(ticket.id, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // A second attempt must not create a duplicate child.
        let inner = store.inner.read().await;
        assert_eq!(inner.children.len(), 1);
    }

    #[tokio::test]
    async fn same_email_reuses_the_user() {
        let store = InMemoryEnrollmentStore::new();
        let first = store.create(submission("a@x.com", "Sam")).await.unwrap();
        let second = store.create(submission("a@x.com", "Ada")).await.unwrap();

        let one = store.approve(first.id, 1).await.unwrap();
        let two = store.approve(second.id, 1).await.unwrap();

        assert_eq!(one.parent_id, two.parent_id);
        assert_ne!(one.child_id, two.child_id);

        let inner = store.inner.read().await;
        assert_eq!(inner.users.len(), 1);
    }

    #[tokio::test]
    async fn statuses_are_monotonic() {
        let store = InMemoryEnrollmentStore::new();
        let ticket = store.create(submission("a@x.com", "Sam")).await.unwrap();

        let status = store
            .reject(ticket.id, 1, "missing papers".into(), RejectionKind::Incomplete)
            .await
            .unwrap();
        assert_eq!(status, EnrollmentStatus::RejectedIncomplete);

        assert!(matches!(
            store.approve(ticket.id, 1).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            store
                .reject(ticket.id, 1, "again".into(), RejectionKind::Delete)
                .await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn validation_gate_leaves_no_row_behind() {
        let store = InMemoryEnrollmentStore::new();
        let err = store.create(submission("", "Sam")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let inner = store.inner.read().await;
        assert!(inner.enrollments.is_empty());
    }

    #[tokio::test]
    async fn approval_copies_the_document_set() {
        let store = InMemoryEnrollmentStore::new();
        let ticket = store.create(submission("a@x.com", "Sam")).await.unwrap();

        store
            .attach_documents(
                ticket.id,
                vec![
                    DocumentUpload {
                        file_path: "uploads/passport.pdf".into(),
                        mime_type: "application/pdf".into(),
                        category: Some("identity".into()),
                        size_bytes: 1024,
                    },
                    DocumentUpload {
                        file_path: "uploads/photo.jpg".into(),
                        mime_type: "image/jpeg".into(),
                        category: None,
                        size_bytes: 2048,
                    },
                ],
            )
            .await
            .unwrap();

        store.approve(ticket.id, 1).await.unwrap();

        let inner = store.inner.read().await;
        assert_eq!(inner.children_documents.len(), 2);
        // Originals remain attached to the enrollment.
        assert_eq!(inner.enrollment_documents.len(), 2);
    }

    #[tokio::test]
    async fn attaching_to_a_decided_enrollment_is_a_conflict() {
        let store = InMemoryEnrollmentStore::new();
        let ticket = store.create(submission("a@x.com", "Sam")).await.unwrap();
        store.approve(ticket.id, 1).await.unwrap();

        let err = store
            .attach_documents(
                ticket.id,
                vec![DocumentUpload {
                    file_path: "late.pdf".into(),
                    mime_type: "application/pdf".into(),
                    category: None,
                    size_bytes: 10,
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_filters_and_counts_documents() {
        let store = InMemoryEnrollmentStore::new();
        let first = store.create(submission("a@x.com", "Sam")).await.unwrap();
        let second = store.create(submission("b@x.com", "Ada")).await.unwrap();

        store
            .attach_documents(
                first.id,
                vec![DocumentUpload {
                    file_path: "doc.pdf".into(),
                    mime_type: "application/pdf".into(),
                    category: None,
                    size_bytes: 10,
                }],
            )
            .await
            .unwrap();
        store.approve(second.id, 1).await.unwrap();

        let pending = store
            .list(EnrollmentFilter {
                status: Some(EnrollmentStatus::Pending),
                ..EnrollmentFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.total, 1);
        assert_eq!(pending.items[0].id, first.id);
        assert_eq!(pending.items[0].document_count, 1);

        let all = store.list(EnrollmentFilter::default()).await.unwrap();
        assert_eq!(all.total, 2);
    }
}
