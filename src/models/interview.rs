use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Proposed,
    Scheduled,
    RejectedByCandidate,
    CancelledByCandidate,
    CancelledByRecruiter,
    Completed,
    EvaluationPositive,
    EvaluationNegative,
    CancelledDueToReevaluation,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Proposed => "proposed",
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::RejectedByCandidate => "rejected_by_candidate",
            InterviewStatus::CancelledByCandidate => "cancelled_by_candidate",
            InterviewStatus::CancelledByRecruiter => "cancelled_by_recruiter",
            InterviewStatus::Completed => "completed",
            InterviewStatus::EvaluationPositive => "evaluation_positive",
            InterviewStatus::EvaluationNegative => "evaluation_negative",
            InterviewStatus::CancelledDueToReevaluation => "cancelled_due_to_reevaluation",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "proposed" => Some(InterviewStatus::Proposed),
            "scheduled" => Some(InterviewStatus::Scheduled),
            "rejected_by_candidate" => Some(InterviewStatus::RejectedByCandidate),
            "cancelled_by_candidate" => Some(InterviewStatus::CancelledByCandidate),
            "cancelled_by_recruiter" => Some(InterviewStatus::CancelledByRecruiter),
            "completed" => Some(InterviewStatus::Completed),
            "evaluation_positive" => Some(InterviewStatus::EvaluationPositive),
            "evaluation_negative" => Some(InterviewStatus::EvaluationNegative),
            "cancelled_due_to_reevaluation" => Some(InterviewStatus::CancelledDueToReevaluation),
            _ => None,
        }
    }
}

/// Triggers that move an interview between states. The transition table is
/// the single authority consulted before any status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterviewAction {
    CandidateConfirms,
    CandidateRejects,
    TokenExpired,
    CandidateCancels,
    RecruiterCancels,
    EvaluatePositive,
    EvaluateNegative,
    Repropose,
}

/// Returns the successor state, or None when the action is not legal from
/// the given state.
pub fn next_status(from: InterviewStatus, action: InterviewAction) -> Option<InterviewStatus> {
    use InterviewAction::*;
    use InterviewStatus::*;
    match (from, action) {
        (Proposed, CandidateConfirms) => Some(Scheduled),
        (Proposed, CandidateRejects) => Some(RejectedByCandidate),
        (Proposed, TokenExpired) => Some(RejectedByCandidate),
        (Scheduled, CandidateCancels) => Some(CancelledByCandidate),
        (Scheduled, RecruiterCancels) => Some(CancelledByRecruiter),
        (Scheduled, EvaluatePositive) => Some(EvaluationPositive),
        (Scheduled, EvaluateNegative) => Some(EvaluationNegative),
        (Scheduled, Repropose) => Some(CancelledDueToReevaluation),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Offered,
    Selected,
    Withdrawn,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Offered => "offered",
            SlotStatus::Selected => "selected",
            SlotStatus::Withdrawn => "withdrawn",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Interview {
    pub id: Uuid,
    pub company_id: Uuid,
    pub recruiter_id: Uuid,
    pub candidate_id: Uuid,
    pub position_id: Option<Uuid>,
    pub status: String,
    pub confirmation_token: String,
    pub confirmation_token_expires_at: DateTime<Utc>,
    pub cancellation_token: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub scheduled_end_time: Option<DateTime<Utc>>,
    pub last_reminder_sent_at: Option<DateTime<Utc>>,
    pub notes_to_candidate: Option<String>,
    pub internal_notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Interview {
    pub fn status(&self) -> Option<InterviewStatus> {
        InterviewStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewSlot {
    pub id: Uuid,
    pub interview_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use InterviewAction::*;
    use InterviewStatus::*;

    #[test]
    fn proposed_transitions() {
        assert_eq!(next_status(Proposed, CandidateConfirms), Some(Scheduled));
        assert_eq!(next_status(Proposed, CandidateRejects), Some(RejectedByCandidate));
        assert_eq!(next_status(Proposed, TokenExpired), Some(RejectedByCandidate));
        assert_eq!(next_status(Proposed, CandidateCancels), None);
        assert_eq!(next_status(Proposed, EvaluatePositive), None);
    }

    #[test]
    fn scheduled_transitions() {
        assert_eq!(next_status(Scheduled, CandidateCancels), Some(CancelledByCandidate));
        assert_eq!(next_status(Scheduled, RecruiterCancels), Some(CancelledByRecruiter));
        assert_eq!(next_status(Scheduled, EvaluatePositive), Some(EvaluationPositive));
        assert_eq!(next_status(Scheduled, EvaluateNegative), Some(EvaluationNegative));
        assert_eq!(next_status(Scheduled, Repropose), Some(CancelledDueToReevaluation));
        assert_eq!(next_status(Scheduled, CandidateConfirms), None);
    }

    #[test]
    fn resolved_states_accept_nothing() {
        for s in [
            RejectedByCandidate,
            CancelledByCandidate,
            CancelledByRecruiter,
            Completed,
            EvaluationPositive,
            EvaluationNegative,
            CancelledDueToReevaluation,
        ] {
            for a in [
                CandidateConfirms,
                CandidateRejects,
                TokenExpired,
                CandidateCancels,
                RecruiterCancels,
                EvaluatePositive,
                EvaluateNegative,
                Repropose,
            ] {
                assert_eq!(next_status(s, a), None);
            }
        }
    }

    #[test]
    fn status_roundtrip() {
        for s in [
            Proposed,
            Scheduled,
            RejectedByCandidate,
            CancelledByCandidate,
            CancelledByRecruiter,
            Completed,
            EvaluationPositive,
            EvaluationNegative,
            CancelledDueToReevaluation,
        ] {
            assert_eq!(InterviewStatus::parse(s.as_str()), Some(s));
        }
    }
}
