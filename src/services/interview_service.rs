use crate::config::get_config;
use crate::error::{Error, Result};
use crate::models::candidate::{history_kind, NewHistoryEvent};
use crate::models::interview::{
    next_status, Interview, InterviewAction, InterviewSlot, InterviewStatus, SlotStatus,
};
use crate::models::job::{job_type, SendNotificationArgs};
use crate::services::candidate_service::append_history;
use crate::services::job_service::{enqueue_on, DEFAULT_MAX_ATTEMPTS, NOTIFY_BACKOFF_BASE_SECONDS};
use crate::utils::token::{cancellation_url, confirmation_url, generate_opaque_token, INTERVIEW_TOKEN_LENGTH};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub const MAX_PROPOSED_SLOTS: usize = 5;

const INTERVIEW_COLS: &str = "id, company_id, recruiter_id, candidate_id, position_id, status, \
     confirmation_token, confirmation_token_expires_at, cancellation_token, \
     scheduled_start_time, scheduled_end_time, last_reminder_sent_at, \
     notes_to_candidate, internal_notes, created_at, updated_at";

/// Outcome of a candidate-facing token click. Losing a race, re-clicking and
/// presenting an expired token all land on `AlreadyResolved`.
#[derive(Debug, Clone)]
pub enum TokenResolution {
    Resolved(Interview),
    AlreadyResolved { status: String },
}

#[derive(Debug, Clone)]
pub struct ProposedSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateInterview {
    pub candidate_id: Uuid,
    pub position_id: Option<Uuid>,
    pub slots: Vec<ProposedSlot>,
    pub notes_to_candidate: Option<String>,
    pub internal_notes: Option<String>,
}

#[derive(Clone)]
pub struct InterviewService {
    pool: PgPool,
}

impl InterviewService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the interview atomically with its offered slots, the candidate
    /// history event and the proposal notification.
    pub async fn create(
        &self,
        company_id: Uuid,
        recruiter_id: Uuid,
        req: CreateInterview,
    ) -> Result<Interview> {
        if req.slots.is_empty() || req.slots.len() > MAX_PROPOSED_SLOTS {
            return Err(Error::BadRequest(format!(
                "An interview proposal carries between 1 and {} slots",
                MAX_PROPOSED_SLOTS
            )));
        }
        for slot in &req.slots {
            if slot.start_time >= slot.end_time {
                return Err(Error::BadRequest(
                    "Each proposed slot must start before it ends".to_string(),
                ));
            }
        }

        let candidate: Option<(Uuid, Option<String>)> = sqlx::query_as(
            "SELECT id, email FROM candidates WHERE id = $1 AND company_id = $2",
        )
        .bind(req.candidate_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some((candidate_id, candidate_email)) = candidate else {
            return Err(Error::NotFound("Candidate not found".to_string()));
        };

        let config = get_config();
        let token = generate_opaque_token(INTERVIEW_TOKEN_LENGTH);
        let expires_at = Utc::now() + Duration::days(config.confirmation_token_ttl_days);
        let interview_id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "INSERT INTO interviews \
             (id, company_id, recruiter_id, candidate_id, position_id, status, \
              confirmation_token, confirmation_token_expires_at, notes_to_candidate, internal_notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            INTERVIEW_COLS
        );
        let interview = sqlx::query_as::<_, Interview>(&sql)
            .bind(interview_id)
            .bind(company_id)
            .bind(recruiter_id)
            .bind(candidate_id)
            .bind(req.position_id)
            .bind(InterviewStatus::Proposed.as_str())
            .bind(&token)
            .bind(expires_at)
            .bind(&req.notes_to_candidate)
            .bind(&req.internal_notes)
            .fetch_one(&mut *tx)
            .await?;

        for slot in &req.slots {
            sqlx::query(
                "INSERT INTO interview_slots (id, interview_id, start_time, end_time, status) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(interview_id)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(SlotStatus::Offered.as_str())
            .execute(&mut *tx)
            .await?;
        }

        let event = NewHistoryEvent::new(
            history_kind::INTERVIEW_PROPOSED,
            format!("Interview proposed with {} time slot(s)", req.slots.len()),
        )
        .with_details(json!({ "interview_id": interview_id }));
        append_history(&mut *tx, candidate_id, &event).await?;

        enqueue_transition_notification(
            &mut tx,
            &interview,
            "interview_proposed",
            candidate_email,
            json!({
                "confirmation_url": confirmation_url(&config.frontend_url, &token),
                "expires_at": expires_at,
                "notes_to_candidate": req.notes_to_candidate,
            }),
        )
        .await?;
        tx.commit().await?;

        Ok(interview)
    }

    /// Candidate confirms one offered slot. Serialized per interview by the
    /// row lock; a concurrent click observes the committed state.
    pub async fn confirm_by_token(&self, token: &str, slot_id: Uuid) -> Result<TokenResolution> {
        let mut tx = self.pool.begin().await?;
        let Some(interview) = lock_by_token(&mut tx, "confirmation_token", token).await? else {
            return Err(Error::NotFound("Unknown confirmation token".to_string()));
        };

        let Some(to) = guard(&interview, InterviewAction::CandidateConfirms)? else {
            return Ok(TokenResolution::AlreadyResolved { status: interview.status });
        };

        let slot: Option<InterviewSlot> = sqlx::query_as(
            "SELECT id, interview_id, start_time, end_time, status \
             FROM interview_slots WHERE id = $1 AND interview_id = $2",
        )
        .bind(slot_id)
        .bind(interview.id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(slot) = slot else {
            return Err(Error::BadRequest("Chosen slot does not belong to this interview".to_string()));
        };

        sqlx::query("UPDATE interview_slots SET status = $1 WHERE interview_id = $2 AND id <> $3")
            .bind(SlotStatus::Withdrawn.as_str())
            .bind(interview.id)
            .bind(slot.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE interview_slots SET status = $1 WHERE id = $2")
            .bind(SlotStatus::Selected.as_str())
            .bind(slot.id)
            .execute(&mut *tx)
            .await?;

        let config = get_config();
        let cancellation_token = generate_opaque_token(INTERVIEW_TOKEN_LENGTH);
        let sql = format!(
            "UPDATE interviews SET status = $1, cancellation_token = $2, \
             scheduled_start_time = $3, scheduled_end_time = $4, updated_at = NOW() \
             WHERE id = $5 RETURNING {}",
            INTERVIEW_COLS
        );
        let updated = sqlx::query_as::<_, Interview>(&sql)
            .bind(to.as_str())
            .bind(&cancellation_token)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(interview.id)
            .fetch_one(&mut *tx)
            .await?;

        let event = NewHistoryEvent::new(
            history_kind::INTERVIEW_CONFIRMED,
            format!("Candidate confirmed interview slot starting {}", slot.start_time),
        )
        .with_details(json!({ "interview_id": interview.id, "slot_id": slot.id }));
        append_history(&mut *tx, interview.candidate_id, &event).await?;

        let recruiter_email = recruiter_email(&mut tx, interview.recruiter_id).await?;
        enqueue_transition_notification(
            &mut tx,
            &updated,
            "interview_confirmed",
            recruiter_email,
            json!({
                "scheduled_start_time": slot.start_time,
                "cancellation_url": cancellation_url(&config.frontend_url, &cancellation_token),
            }),
        )
        .await?;
        tx.commit().await?;

        Ok(TokenResolution::Resolved(updated))
    }

    /// Candidate declines every offered slot.
    pub async fn reject_by_token(&self, token: &str) -> Result<TokenResolution> {
        let mut tx = self.pool.begin().await?;
        let Some(interview) = lock_by_token(&mut tx, "confirmation_token", token).await? else {
            return Err(Error::NotFound("Unknown confirmation token".to_string()));
        };

        let Some(to) = guard(&interview, InterviewAction::CandidateRejects)? else {
            return Ok(TokenResolution::AlreadyResolved { status: interview.status });
        };

        let updated = resolve_interview(
            &mut tx,
            &interview,
            to,
            history_kind::INTERVIEW_REJECTED,
            "Candidate rejected all proposed interview slots",
            "interview_rejected",
        )
        .await?;
        tx.commit().await?;
        Ok(TokenResolution::Resolved(updated))
    }

    /// Candidate cancels a scheduled interview with the cancellation token.
    /// The token stays on the row after use; the state guard turns a repeat
    /// click (or the loser of a concurrent race) into `AlreadyResolved`.
    pub async fn cancel_by_token(&self, token: &str) -> Result<TokenResolution> {
        let mut tx = self.pool.begin().await?;
        let Some(interview) = lock_by_token(&mut tx, "cancellation_token", token).await? else {
            return Err(Error::NotFound("Unknown cancellation token".to_string()));
        };

        let Some(to) = guard(&interview, InterviewAction::CandidateCancels)? else {
            return Ok(TokenResolution::AlreadyResolved { status: interview.status });
        };

        let updated = resolve_interview(
            &mut tx,
            &interview,
            to,
            history_kind::INTERVIEW_CANCELLED,
            "Candidate cancelled the scheduled interview",
            "interview_cancelled_by_candidate",
        )
        .await?;
        tx.commit().await?;
        Ok(TokenResolution::Resolved(updated))
    }

    /// Recruiter-side cancellation of a scheduled interview.
    pub async fn recruiter_cancel(&self, company_id: Uuid, interview_id: Uuid) -> Result<Interview> {
        let mut tx = self.pool.begin().await?;
        let interview = lock_in_company(&mut tx, company_id, interview_id).await?;
        let Some(to) = guard(&interview, InterviewAction::RecruiterCancels)? else {
            return Err(Error::Conflict(format!(
                "Interview is {} and cannot be cancelled",
                interview.status
            )));
        };
        let updated = resolve_interview(
            &mut tx,
            &interview,
            to,
            history_kind::INTERVIEW_CANCELLED,
            "Recruiter cancelled the scheduled interview",
            "interview_cancelled_by_recruiter",
        )
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Recruiter records the interview outcome.
    pub async fn evaluate(
        &self,
        company_id: Uuid,
        interview_id: Uuid,
        positive: bool,
    ) -> Result<Interview> {
        let action = if positive {
            InterviewAction::EvaluatePositive
        } else {
            InterviewAction::EvaluateNegative
        };
        let mut tx = self.pool.begin().await?;
        let interview = lock_in_company(&mut tx, company_id, interview_id).await?;
        let Some(to) = guard(&interview, action)? else {
            return Err(Error::Conflict(format!(
                "Interview is {} and cannot be evaluated",
                interview.status
            )));
        };
        let description = if positive {
            "Interview evaluated positively"
        } else {
            "Interview evaluated negatively"
        };
        let updated = resolve_interview(
            &mut tx,
            &interview,
            to,
            history_kind::INTERVIEW_EVALUATED,
            description,
            "interview_evaluated",
        )
        .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Cancels a scheduled interview for re-evaluation, then opens a fresh
    /// proposal with new slots.
    pub async fn repropose(
        &self,
        company_id: Uuid,
        recruiter_id: Uuid,
        interview_id: Uuid,
        req: CreateInterview,
    ) -> Result<Interview> {
        {
            let mut tx = self.pool.begin().await?;
            let interview = lock_in_company(&mut tx, company_id, interview_id).await?;
            let Some(to) = guard(&interview, InterviewAction::Repropose)? else {
                return Err(Error::Conflict(format!(
                    "Interview is {} and cannot be re-proposed",
                    interview.status
                )));
            };
            resolve_interview(
                &mut tx,
                &interview,
                to,
                history_kind::INTERVIEW_CANCELLED,
                "Interview cancelled for re-evaluation",
                "interview_cancelled_for_reevaluation",
            )
            .await?;
            tx.commit().await?;
        }
        self.create(company_id, recruiter_id, req).await
    }

    /// Flips proposed interviews with lapsed confirmation tokens to
    /// rejected. Called from the periodic sweep.
    pub async fn expire_stale_proposals(&self) -> Result<u64> {
        let mut expired = 0u64;
        loop {
            let mut tx = self.pool.begin().await?;
            let sql = format!(
                "SELECT {} FROM interviews \
                 WHERE status = $1 AND confirmation_token_expires_at < NOW() \
                 LIMIT 1 FOR UPDATE SKIP LOCKED",
                INTERVIEW_COLS
            );
            let Some(interview) = sqlx::query_as::<_, Interview>(&sql)
                .bind(InterviewStatus::Proposed.as_str())
                .fetch_optional(&mut *tx)
                .await?
            else {
                break;
            };

            let Some(to) = guard(&interview, InterviewAction::TokenExpired)? else {
                break;
            };
            resolve_interview(
                &mut tx,
                &interview,
                to,
                history_kind::INTERVIEW_REJECTED,
                "Interview proposal expired without a candidate response",
                "interview_proposal_expired",
            )
            .await?;
            tx.commit().await?;
            expired += 1;
        }
        Ok(expired)
    }

    pub async fn get_in_company(&self, company_id: Uuid, id: Uuid) -> Result<Option<Interview>> {
        let sql = format!(
            "SELECT {} FROM interviews WHERE id = $1 AND company_id = $2",
            INTERVIEW_COLS
        );
        let interview = sqlx::query_as::<_, Interview>(&sql)
            .bind(id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(interview)
    }

    pub async fn slots(&self, interview_id: Uuid) -> Result<Vec<InterviewSlot>> {
        let slots = sqlx::query_as::<_, InterviewSlot>(
            "SELECT id, interview_id, start_time, end_time, status \
             FROM interview_slots WHERE interview_id = $1 ORDER BY start_time ASC",
        )
        .bind(interview_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(slots)
    }
}

fn guard(interview: &Interview, action: InterviewAction) -> Result<Option<InterviewStatus>> {
    let from = interview
        .status()
        .ok_or_else(|| Error::Internal(format!("unknown interview status '{}'", interview.status)))?;
    // An expired confirmation token behaves like a consumed one.
    if matches!(
        action,
        InterviewAction::CandidateConfirms | InterviewAction::CandidateRejects
    ) && interview.confirmation_token_expires_at < Utc::now()
    {
        return Ok(None);
    }
    Ok(next_status(from, action))
}

async fn lock_by_token(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    column: &str,
    token: &str,
) -> Result<Option<Interview>> {
    let sql = format!(
        "SELECT {} FROM interviews WHERE {} = $1 FOR UPDATE",
        INTERVIEW_COLS, column
    );
    let interview = sqlx::query_as::<_, Interview>(&sql)
        .bind(token)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(interview)
}

async fn lock_in_company(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    company_id: Uuid,
    interview_id: Uuid,
) -> Result<Interview> {
    let sql = format!(
        "SELECT {} FROM interviews WHERE id = $1 AND company_id = $2 FOR UPDATE",
        INTERVIEW_COLS
    );
    let interview = sqlx::query_as::<_, Interview>(&sql)
        .bind(interview_id)
        .bind(company_id)
        .fetch_optional(&mut **tx)
        .await?;
    interview.ok_or_else(|| Error::NotFound("Interview not found".to_string()))
}

/// Shared tail of every non-confirm transition: status write, selected slots
/// withdrawn, candidate history, one notification.
async fn resolve_interview(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    interview: &Interview,
    to: InterviewStatus,
    history_event: &'static str,
    description: &str,
    notification_event: &str,
) -> Result<Interview> {
    let sql = format!(
        "UPDATE interviews SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING {}",
        INTERVIEW_COLS
    );
    let updated = sqlx::query_as::<_, Interview>(&sql)
        .bind(to.as_str())
        .bind(interview.id)
        .fetch_one(&mut **tx)
        .await?;

    if !matches!(to, InterviewStatus::EvaluationPositive | InterviewStatus::EvaluationNegative) {
        sqlx::query("UPDATE interview_slots SET status = $1 WHERE interview_id = $2 AND status <> $1")
            .bind(SlotStatus::Withdrawn.as_str())
            .bind(interview.id)
            .execute(&mut **tx)
            .await?;
    }

    let event = NewHistoryEvent::new(history_event, description.to_string())
        .with_details(json!({ "interview_id": interview.id, "to_status": to.as_str() }));
    append_history(&mut **tx, interview.candidate_id, &event).await?;

    let recruiter = recruiter_email(tx, interview.recruiter_id).await?;
    enqueue_transition_notification(
        tx,
        &updated,
        notification_event,
        recruiter,
        json!({ "previous_status": interview.status }),
    )
    .await?;
    Ok(updated)
}

async fn recruiter_email(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    recruiter_id: Uuid,
) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT email FROM users WHERE id = $1")
        .bind(recruiter_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.and_then(|(email,)| email))
}

/// Exactly one notification per transition; the dedup key is the transition
/// identity so queue redelivery cannot duplicate the send.
async fn enqueue_transition_notification(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    interview: &Interview,
    event: &str,
    recipient_email: Option<String>,
    context: serde_json::Value,
) -> Result<()> {
    let args = SendNotificationArgs {
        company_id: interview.company_id,
        event_type: event.to_string(),
        recipient_email,
        subject: format!("Interview update: {}", event.replace('_', " ")),
        dedup_key: format!("interview:{}:{}", interview.id, interview.status),
        context,
    };
    enqueue_on(
        &mut **tx,
        job_type::SEND_NOTIFICATION,
        &args,
        DEFAULT_MAX_ATTEMPTS,
        NOTIFY_BACKOFF_BASE_SECONDS,
    )
    .await?;
    Ok(())
}
