use crate::dto::interview_dto::{
    ConfirmQuery, CreateInterviewRequest, CreatedInterviewResponse, EvaluationRequest,
    InterviewDetailResponse, InterviewResponse, ReproposeRequest, TokenOutcomeResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::services::interview_service::{CreateInterview, ProposedSlot, TokenResolution};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

fn to_create(candidate_id: Uuid, position_id: Option<Uuid>, req: ReproposeRequest) -> CreateInterview {
    CreateInterview {
        candidate_id,
        position_id,
        slots: req
            .slots
            .into_iter()
            .map(|s| ProposedSlot {
                start_time: s.start_time,
                end_time: s.end_time,
            })
            .collect(),
        notes_to_candidate: req.notes_to_candidate,
        internal_notes: req.internal_notes,
    }
}

fn token_outcome(outcome: &str, resolution: TokenResolution) -> TokenOutcomeResponse {
    match resolution {
        TokenResolution::Resolved(interview) => TokenOutcomeResponse {
            outcome: outcome.to_string(),
            status: interview.status,
            scheduled_start_time: interview.scheduled_start_time,
            scheduled_end_time: interview.scheduled_end_time,
        },
        TokenResolution::AlreadyResolved { status } => TokenOutcomeResponse {
            outcome: "already_resolved".to_string(),
            status,
            scheduled_start_time: None,
            scheduled_end_time: None,
        },
    }
}

/// POST /api/interviews
pub async fn create_interview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateInterviewRequest>,
) -> Result<impl axum::response::IntoResponse> {
    req.validate()?;
    let recruiter_id = claims.user_id()?;
    let create = CreateInterview {
        candidate_id: req.candidate_id,
        position_id: req.position_id,
        slots: req
            .slots
            .into_iter()
            .map(|s| ProposedSlot {
                start_time: s.start_time,
                end_time: s.end_time,
            })
            .collect(),
        notes_to_candidate: req.notes_to_candidate,
        internal_notes: req.internal_notes,
    };
    let interview = state
        .interview_service
        .create(claims.company_id, recruiter_id, create)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedInterviewResponse::from(interview)),
    ))
}

/// GET /api/interviews/:id
pub async fn get_interview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewDetailResponse>> {
    let interview = state
        .interview_service
        .get_in_company(claims.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("Interview not found".to_string()))?;
    let slots = state.interview_service.slots(interview.id).await?;
    Ok(Json(InterviewDetailResponse {
        interview: interview.into(),
        slots,
    }))
}

/// GET /api/interviews/confirm/:token?slot_id_choice=... The candidate's
/// email link; the token is the only credential.
pub async fn confirm_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<TokenOutcomeResponse>> {
    let resolution = state
        .interview_service
        .confirm_by_token(&token, query.slot_id_choice)
        .await?;
    Ok(Json(token_outcome("confirmed", resolution)))
}

/// GET /api/interviews/reject/:token
pub async fn reject_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<TokenOutcomeResponse>> {
    let resolution = state.interview_service.reject_by_token(&token).await?;
    Ok(Json(token_outcome("rejected", resolution)))
}

/// GET /api/interviews/cancel/:token
pub async fn cancel_by_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<TokenOutcomeResponse>> {
    let resolution = state.interview_service.cancel_by_token(&token).await?;
    Ok(Json(token_outcome("cancelled", resolution)))
}

/// POST /api/interviews/:id/cancel
pub async fn recruiter_cancel(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<InterviewResponse>> {
    let interview = state
        .interview_service
        .recruiter_cancel(claims.company_id, id)
        .await?;
    Ok(Json(interview.into()))
}

/// POST /api/interviews/:id/evaluation
pub async fn evaluate_interview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<EvaluationRequest>,
) -> Result<Json<InterviewResponse>> {
    let interview = state
        .interview_service
        .evaluate(claims.company_id, id, req.positive)
        .await?;
    Ok(Json(interview.into()))
}

/// POST /api/interviews/:id/repropose
pub async fn repropose_interview(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReproposeRequest>,
) -> Result<impl axum::response::IntoResponse> {
    req.validate()?;
    let recruiter_id = claims.user_id()?;
    let existing = state
        .interview_service
        .get_in_company(claims.company_id, id)
        .await?
        .ok_or_else(|| Error::NotFound("Interview not found".to_string()))?;
    let create = to_create(existing.candidate_id, existing.position_id, req);
    let interview = state
        .interview_service
        .repropose(claims.company_id, recruiter_id, id, create)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedInterviewResponse::from(interview)),
    ))
}
