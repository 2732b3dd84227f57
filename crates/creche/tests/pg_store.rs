//! PostgreSQL store integration tests.
//!
//! These run only when TEST_DATABASE_URL (or DATABASE_URL) points at a
//! reachable PostgreSQL instance; otherwise they skip.

use creche::model::{DocumentUpload, EnrollmentFilter, EnrollmentStatus, NewEnrollment, RejectionKind};
use creche::{db, EnrollmentStore, PgEnrollmentStore};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

async fn maybe_pool() -> Option<PgPool> {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;

    PgPoolOptions::new()
        .max_connections(4)
        .connect(&database_url)
        .await
        .ok()
}

async fn reset(pool: &PgPool) {
    db::run_schema_migrations(pool)
        .await
        .expect("migrations should run");

    sqlx::query(
        "TRUNCATE TABLE attendance, children_documents, enrollment_documents, \
         enrollments, children, users, settings RESTART IDENTITY CASCADE",
    )
    .execute(pool)
    .await
    .expect("truncate should succeed");
}

fn submission(email: &str, first_name: &str) -> NewEnrollment {
    NewEnrollment {
        applicant_name: Some("Alice Example".into()),
        applicant_email: email.into(),
        applicant_phone: Some("+45 555 0100".into()),
        child_first_name: first_name.into(),
        child_last_name: Some("Example".into()),
        child_birth_date: None,
        child_gender: Some("female".into()),
        child_medical_notes: None,
        child_emergency_contact: None,
    }
}

async fn seed_staff(pool: &PgPool) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO users (email, full_name, role) VALUES ($1, $2, 'staff') RETURNING id",
    )
    .bind("staff@creche.test")
    .bind("Staff Member")
    .fetch_one(pool)
    .await
    .expect("staff insert should succeed")
}

#[tokio::test]
async fn postgres_approval_flow() {
    let Some(pool) = maybe_pool().await else {
        eprintln!("Skipping postgres_approval_flow: TEST_DATABASE_URL is not set or unreachable.");
        return;
    };
    reset(&pool).await;

    let staff_id = seed_staff(&pool).await;
    let store = PgEnrollmentStore::new(pool.clone());

    let ticket = store
        .create(submission("a@x.com", "Sam"))
        .await
        .expect("create should succeed");
    assert_eq!(ticket.status, EnrollmentStatus::Pending);

    store
        .attach_documents(
            ticket.id,
            vec![DocumentUpload {
                file_path: "uploads/passport.pdf".into(),
                mime_type: "application/pdf".into(),
                category: Some("identity".into()),
                size_bytes: 1024,
            }],
        )
        .await
        .expect("attach should succeed");

    let outcome = store
        .approve(ticket.id, staff_id)
        .await
        .expect("approve should succeed");

    let (email, role): (String, String) =
        sqlx::query_as("SELECT email, role::TEXT FROM users WHERE id = $1")
            .bind(outcome.parent_id)
            .fetch_one(&pool)
            .await
            .expect("parent should exist");
    assert_eq!(email, "a@x.com");
    assert_eq!(role, "parent");

    let first_name: String = sqlx::query_scalar("SELECT first_name FROM children WHERE id = $1")
        .bind(outcome.child_id)
        .fetch_one(&pool)
        .await
        .expect("child should exist");
    assert_eq!(first_name, "Sam");

    // The document set was copied to the child.
    let copies: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM children_documents WHERE child_id = $1")
            .bind(outcome.child_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(copies, 1);

    // Approving again conflicts: the row is no longer pending.
    let err = store.approve(ticket.id, staff_id).await.unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);

    // A second enrollment with the same applicant email reuses the user.
    let second = store
        .create(submission("a@x.com", "Ada"))
        .await
        .expect("create should succeed");
    let outcome2 = store
        .approve(second.id, staff_id)
        .await
        .expect("approve should succeed");
    assert_eq!(outcome2.parent_id, outcome.parent_id);

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = 'a@x.com'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(users, 1);

    let page = store
        .list(EnrollmentFilter {
            status: Some(EnrollmentStatus::Approved),
            ..EnrollmentFilter::default()
        })
        .await
        .expect("list should succeed");
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].document_count, 0);
}

#[tokio::test]
async fn postgres_reject_is_terminal() {
    let Some(pool) = maybe_pool().await else {
        eprintln!(
            "Skipping postgres_reject_is_terminal: TEST_DATABASE_URL is not set or unreachable."
        );
        return;
    };
    reset(&pool).await;

    let staff_id = seed_staff(&pool).await;
    let store = PgEnrollmentStore::new(pool.clone());

    let ticket = store
        .create(submission("b@x.com", "Ada"))
        .await
        .expect("create should succeed");

    let status = store
        .reject(
            ticket.id,
            staff_id,
            "incomplete paperwork".into(),
            RejectionKind::Incomplete,
        )
        .await
        .expect("reject should succeed");
    assert_eq!(status, EnrollmentStatus::RejectedIncomplete);

    // No derived entities were created.
    let children: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM children")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(children, 0);

    let err = store.approve(ticket.id, staff_id).await.unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);

    let err = store
        .reject(ticket.id, staff_id, "again".into(), RejectionKind::Delete)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
}
