//! Request handlers and response envelopes.
//!
//! Every response carries a `success` flag; failures add an `error` string
//! (see `AppError::into_response`). Authentication itself is an upstream
//! concern; handlers only consume the identity header it sets.

use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::model::{
    ApprovalOutcome, DocumentUpload, EnrollmentDetail, EnrollmentDocument, EnrollmentFilter,
    EnrollmentPage, EnrollmentStatus, EnrollmentTicket, NewEnrollment, RejectEnrollment, Setting,
};

use super::{AppState, STAFF_ID_HEADER};

/// Staff identity established by the upstream auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct StaffIdentity {
    pub user_id: i64,
}

impl<S> FromRequestParts<S> for StaffIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(STAFF_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok())
            .ok_or_else(|| AppError::Unauthorized("staff identity required".into()))?;

        Ok(StaffIdentity { user_id })
    }
}

#[derive(Debug, Serialize)]
pub struct EnrollmentCreated {
    pub success: bool,
    pub enrollment: EnrollmentTicket,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentApproved {
    pub success: bool,
    pub parent_id: i64,
    pub child_id: i64,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentRejected {
    pub success: bool,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentList {
    pub success: bool,
    #[serde(flatten)]
    pub page: EnrollmentPage,
}

#[derive(Debug, Serialize)]
pub struct EnrollmentView {
    pub success: bool,
    #[serde(flatten)]
    pub detail: EnrollmentDetail,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentBatch {
    pub documents: Vec<DocumentUpload>,
}

#[derive(Debug, Serialize)]
pub struct DocumentsAccepted {
    pub success: bool,
    pub accepted: Vec<EnrollmentDocument>,
    pub rejected: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingUpdate {
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettingsList {
    pub success: bool,
    pub settings: Vec<Setting>,
}

#[derive(Debug, Serialize)]
pub struct SettingSaved {
    pub success: bool,
    pub setting: Setting,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub success: bool,
    pub status: &'static str,
}

pub async fn create_enrollment(
    State(state): State<AppState>,
    Json(payload): Json<NewEnrollment>,
) -> Result<(StatusCode, Json<EnrollmentCreated>)> {
    let enrollment = state.store.create(payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(EnrollmentCreated {
            success: true,
            enrollment,
        }),
    ))
}

pub async fn approve_enrollment(
    State(state): State<AppState>,
    staff: StaffIdentity,
    Path(id): Path<i64>,
) -> Result<Json<EnrollmentApproved>> {
    let ApprovalOutcome {
        parent_id,
        child_id,
    } = state.store.approve(id, staff.user_id).await?;

    Ok(Json(EnrollmentApproved {
        success: true,
        parent_id,
        child_id,
    }))
}

pub async fn reject_enrollment(
    State(state): State<AppState>,
    staff: StaffIdentity,
    Path(id): Path<i64>,
    Json(payload): Json<RejectEnrollment>,
) -> Result<Json<EnrollmentRejected>> {
    let status = state
        .store
        .reject(id, staff.user_id, payload.reason, payload.kind)
        .await?;

    Ok(Json(EnrollmentRejected {
        success: true,
        status,
    }))
}

pub async fn list_enrollments(
    State(state): State<AppState>,
    Query(filter): Query<EnrollmentFilter>,
) -> Result<Json<EnrollmentList>> {
    let page = state.store.list(filter).await?;
    Ok(Json(EnrollmentList {
        success: true,
        page,
    }))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<EnrollmentView>> {
    let detail = state.store.get(id).await?;
    Ok(Json(EnrollmentView {
        success: true,
        detail,
    }))
}

/// Record documents staged by the upload middleware. Candidates that fail
/// the size or MIME constraints are excluded from the accepted set rather
/// than failing the request.
pub async fn attach_documents(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(batch): Json<DocumentBatch>,
) -> Result<(StatusCode, Json<DocumentsAccepted>)> {
    let candidates = batch.documents.len();
    let eligible: Vec<DocumentUpload> = batch
        .documents
        .into_iter()
        .filter(|doc| {
            state
                .config
                .server
                .accepts_document(&doc.mime_type, doc.size_bytes)
        })
        .collect();
    let rejected = candidates - eligible.len();

    let accepted = state.store.attach_documents(id, eligible).await?;

    Ok((
        StatusCode::CREATED,
        Json(DocumentsAccepted {
            success: true,
            accepted,
            rejected,
        }),
    ))
}

pub async fn get_settings(State(state): State<AppState>) -> Result<Json<SettingsList>> {
    let settings = state.settings.all().await?;
    Ok(Json(SettingsList {
        success: true,
        settings,
    }))
}

pub async fn put_setting(
    State(state): State<AppState>,
    _staff: StaffIdentity,
    Path(key): Path<String>,
    Json(payload): Json<SettingUpdate>,
) -> Result<Json<SettingSaved>> {
    let setting = state.settings.upsert(&key, payload.value).await?;
    Ok(Json(SettingSaved {
        success: true,
        setting,
    }))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<Health>> {
    state.store.ping().await?;
    Ok(Json(Health {
        success: true,
        status: "ok",
    }))
}
