//! Enrollment transaction engine.
//!
//! The store trait is the seam between the HTTP layer and persistence. The
//! production implementation runs every state-changing operation in a single
//! PostgreSQL transaction; the in-memory implementation mirrors the same
//! state machine for tests.

mod memory;
mod pg;

pub use memory::InMemoryEnrollmentStore;
pub use pg::PgEnrollmentStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    ApprovalOutcome, DocumentUpload, EnrollmentDetail, EnrollmentDocument, EnrollmentFilter,
    EnrollmentPage, EnrollmentStatus, EnrollmentTicket, NewEnrollment, RejectionKind,
};

/// State-changing and read operations on enrollments.
#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    /// Record a new application with status `pending`.
    async fn create(&self, input: NewEnrollment) -> Result<EnrollmentTicket>;

    /// Convert a pending enrollment into a user, a child and a copied
    /// document set, all-or-nothing.
    async fn approve(&self, enrollment_id: i64, approver_id: i64) -> Result<ApprovalOutcome>;

    /// Transition a pending enrollment to the terminal status for `kind`.
    async fn reject(
        &self,
        enrollment_id: i64,
        approver_id: i64,
        reason: String,
        kind: RejectionKind,
    ) -> Result<EnrollmentStatus>;

    /// Paginated listing with per-row document counts.
    async fn list(&self, filter: EnrollmentFilter) -> Result<EnrollmentPage>;

    /// Single enrollment with its attached documents.
    async fn get(&self, enrollment_id: i64) -> Result<EnrollmentDetail>;

    /// Record document metadata against a pending enrollment. Callers are
    /// expected to have filtered candidates against the upload constraints.
    async fn attach_documents(
        &self,
        enrollment_id: i64,
        documents: Vec<DocumentUpload>,
    ) -> Result<Vec<EnrollmentDocument>>;

    /// Liveness probe for the backing store.
    async fn ping(&self) -> Result<()>;
}
