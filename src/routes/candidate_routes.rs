use crate::dto::candidate_dto::{
    CandidateResponse, CvDownloadResponse, HistoryResponse, UpdateStatusRequest,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::candidate::{history_kind, CandidateStatus, NewHistoryEvent};
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::time::Duration;
use uuid::Uuid;

const CV_DOWNLOAD_TTL: Duration = Duration::from_secs(600);

pub async fn get_candidate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CandidateResponse>> {
    let candidate = state
        .candidate_service
        .get_in_company(claims.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;
    Ok(Json(candidate.into()))
}

pub async fn get_candidate_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<HistoryResponse>> {
    let candidate = state
        .candidate_service
        .get_in_company(claims.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;
    let events = state.candidate_service.list_history(candidate.id).await?;
    Ok(Json(HistoryResponse {
        candidate_id: candidate.id,
        events,
    }))
}

/// Short-lived presigned link to the PDF rendition when one exists,
/// otherwise to the original upload.
pub async fn download_cv(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<CvDownloadResponse>> {
    let candidate = state
        .candidate_service
        .get_in_company(claims.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;

    let key = candidate
        .cv_pdf_storage_key
        .or(candidate.cv_storage_path)
        .ok_or_else(|| Error::NotFound("Candidate has no stored CV".to_string()))?;

    let url = state
        .storage_service
        .presign_read(&key, CV_DOWNLOAD_TTL)
        .await
        .map_err(|e| Error::Storage(e.to_string()))?;
    Ok(Json(CvDownloadResponse {
        url,
        expires_in_seconds: CV_DOWNLOAD_TTL.as_secs(),
    }))
}

/// Recruiter moves a candidate along the funnel. The pipeline statuses are
/// machine-owned and cannot be set by hand.
pub async fn update_candidate_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<CandidateResponse>> {
    let candidate = state
        .candidate_service
        .get_in_company(claims.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;

    let status = CandidateStatus::parse(&req.status)
        .ok_or_else(|| Error::BadRequest(format!("Unknown status '{}'", req.status)))?;
    if status.is_transient() {
        return Err(Error::BadRequest(format!(
            "Status '{}' is assigned by the ingestion pipeline",
            req.status
        )));
    }

    let mut event = NewHistoryEvent::new(
        history_kind::STATUS_CHANGED,
        format!("Status changed from {} to {}", candidate.status, req.status),
    );
    event.actor_id = claims.user_id().ok();
    state
        .candidate_service
        .set_status(candidate.id, status, Some(event))
        .await?;

    let updated = state
        .candidate_service
        .get_in_company(claims.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;
    Ok(Json(updated.into()))
}

/// Deletes the candidate row, then cleans its stored objects best-effort;
/// an orphaned object is preferable to a dangling row.
pub async fn delete_candidate(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    let candidate = state
        .candidate_service
        .get_in_company(claims.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("Candidate not found".to_string()))?;

    state.candidate_service.delete(candidate.id).await?;

    for key in [candidate.cv_storage_path, candidate.cv_pdf_storage_key]
        .into_iter()
        .flatten()
    {
        if let Err(e) = state.storage_service.delete(&key).await {
            tracing::warn!(key = %key, error = %e, "CV object cleanup failed after candidate delete");
        }
    }

    tracing::info!(candidate_id = %candidate.id, "candidate deleted");
    Ok(StatusCode::NO_CONTENT)
}
