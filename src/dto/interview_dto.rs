use crate::models::interview::{Interview, InterviewSlot};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProposedSlotRequest {
    pub start_time: chrono::DateTime<chrono::Utc>,
    pub end_time: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInterviewRequest {
    pub candidate_id: uuid::Uuid,
    pub position_id: Option<uuid::Uuid>,
    #[validate(length(min = 1, max = 5))]
    pub slots: Vec<ProposedSlotRequest>,
    #[validate(length(max = 4000))]
    pub notes_to_candidate: Option<String>,
    #[validate(length(max = 4000))]
    pub internal_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReproposeRequest {
    #[validate(length(min = 1, max = 5))]
    pub slots: Vec<ProposedSlotRequest>,
    #[validate(length(max = 4000))]
    pub notes_to_candidate: Option<String>,
    #[validate(length(max = 4000))]
    pub internal_notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationRequest {
    pub positive: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmQuery {
    pub slot_id_choice: uuid::Uuid,
}

/// 201 body for a fresh proposal. The confirmation token is exposed once
/// here so callers can build the candidate-facing link themselves.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedInterviewResponse {
    pub confirmation_token: String,
    pub confirmation_token_expires_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub interview: InterviewResponse,
}

impl From<Interview> for CreatedInterviewResponse {
    fn from(i: Interview) -> Self {
        Self {
            confirmation_token: i.confirmation_token.clone(),
            confirmation_token_expires_at: i.confirmation_token_expires_at,
            interview: i.into(),
        }
    }
}

/// Recruiter-facing view. The candidate-facing tokens never leave the
/// server after the initial 201; they only travel in the candidate's own
/// email links.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewResponse {
    pub id: uuid::Uuid,
    pub candidate_id: uuid::Uuid,
    pub position_id: Option<uuid::Uuid>,
    pub status: String,
    pub scheduled_start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub scheduled_end_time: Option<chrono::DateTime<chrono::Utc>>,
    pub notes_to_candidate: Option<String>,
    pub internal_notes: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Interview> for InterviewResponse {
    fn from(i: Interview) -> Self {
        Self {
            id: i.id,
            candidate_id: i.candidate_id,
            position_id: i.position_id,
            status: i.status,
            scheduled_start_time: i.scheduled_start_time,
            scheduled_end_time: i.scheduled_end_time,
            notes_to_candidate: i.notes_to_candidate,
            internal_notes: i.internal_notes,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InterviewDetailResponse {
    #[serde(flatten)]
    pub interview: InterviewResponse,
    pub slots: Vec<InterviewSlot>,
}

/// What a candidate sees after clicking a token link. Stable regardless of
/// how many times the link is clicked.
#[derive(Debug, Clone, Serialize)]
pub struct TokenOutcomeResponse {
    pub outcome: String,
    pub status: String,
    pub scheduled_start_time: Option<chrono::DateTime<chrono::Utc>>,
    pub scheduled_end_time: Option<chrono::DateTime<chrono::Utc>>,
}
