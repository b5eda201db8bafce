use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

/// Reserved email prefix for candidates whose CV has not been parsed yet.
/// Rows carrying it are invisible to the per-tenant email uniqueness rule.
pub const PLACEHOLDER_EMAIL_PREFIX: &str = "placeholder-";
pub const PLACEHOLDER_EMAIL_DOMAIN: &str = "local.invalid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Processing,
    NeedsReview,
    ParsingFailed,
    Interviewing,
    Hired,
    Rejected,
    Archived,
}

impl CandidateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Processing => "processing",
            CandidateStatus::NeedsReview => "needs_review",
            CandidateStatus::ParsingFailed => "parsing_failed",
            CandidateStatus::Interviewing => "interviewing",
            CandidateStatus::Hired => "hired",
            CandidateStatus::Rejected => "rejected",
            CandidateStatus::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "processing" => Some(CandidateStatus::Processing),
            "needs_review" => Some(CandidateStatus::NeedsReview),
            "parsing_failed" => Some(CandidateStatus::ParsingFailed),
            "interviewing" => Some(CandidateStatus::Interviewing),
            "hired" => Some(CandidateStatus::Hired),
            "rejected" => Some(CandidateStatus::Rejected),
            "archived" => Some(CandidateStatus::Archived),
            _ => None,
        }
    }

    /// Hired/rejected/archived candidates are done with the pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CandidateStatus::Hired | CandidateStatus::Rejected | CandidateStatus::Archived
        )
    }

    /// Statuses a candidate passes through while ingestion is still pending or broken.
    pub fn is_transient(&self) -> bool {
        matches!(self, CandidateStatus::Processing | CandidateStatus::ParsingFailed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Candidate {
    pub id: Uuid,
    pub company_id: Uuid,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub age: Option<i32>,
    pub education_summary: Option<String>,
    pub experience_summary: Option<String>,
    pub skills_summary: Option<String>,
    pub languages: Option<String>,
    pub seminars: Option<String>,
    pub notes: Option<String>,
    pub status: String,
    pub cv_storage_path: Option<String>,
    pub cv_pdf_storage_key: Option<String>,
    pub cv_original_filename: Option<String>,
    pub cv_content_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Candidate {
    pub fn status(&self) -> Option<CandidateStatus> {
        CandidateStatus::parse(&self.status)
    }

}

pub fn placeholder_email(candidate_id: Uuid) -> String {
    format!("{}{}@{}", PLACEHOLDER_EMAIL_PREFIX, candidate_id, PLACEHOLDER_EMAIL_DOMAIN)
}

/// History event kinds appended to a candidate's audit log.
pub mod history_kind {
    pub const CV_ADDED: &str = "cv_added";
    pub const CV_REPLACED: &str = "cv_replaced";
    pub const CV_PARSED_AND_POPULATED: &str = "cv_parsed_and_populated";
    pub const CV_PARSED_NO_EMAIL: &str = "cv_parsed_no_email";
    pub const EMAIL_UPDATE_CONFLICT: &str = "email_update_conflict";
    pub const EMAIL_UPDATED_FROM_CV: &str = "email_updated_from_cv";
    pub const CV_RE_SUBMISSION_MERGE: &str = "cv_re_submission_merge";
    pub const CV_REFRESH_MERGE: &str = "cv_refresh_merge";
    pub const INTERVIEW_PROPOSED: &str = "interview_proposed";
    pub const INTERVIEW_CONFIRMED: &str = "interview_confirmed";
    pub const INTERVIEW_REJECTED: &str = "interview_rejected";
    pub const INTERVIEW_CANCELLED: &str = "interview_cancelled";
    pub const INTERVIEW_EVALUATED: &str = "interview_evaluated";
    pub const CV_CONVERSION_FAILED: &str = "cv_conversion_failed";
    pub const CV_CONVERTED_TO_PDF: &str = "cv_converted_to_pdf";
    pub const CV_PARSING_FAILED: &str = "cv_parsing_failed";
    pub const STATUS_CHANGED: &str = "status_changed";
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryEvent {
    pub id: i64,
    pub candidate_id: Uuid,
    pub event_type: String,
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub details: Option<JsonValue>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A history entry staged in memory and flushed in the same transaction as
/// the candidate row it belongs to.
#[derive(Debug, Clone)]
pub struct NewHistoryEvent {
    pub event_type: &'static str,
    pub description: String,
    pub actor_id: Option<Uuid>,
    pub details: Option<JsonValue>,
}

impl NewHistoryEvent {
    pub fn new(event_type: &'static str, description: impl Into<String>) -> Self {
        Self {
            event_type,
            description: description.into(),
            actor_id: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_email_uses_reserved_prefix() {
        let id = Uuid::new_v4();
        let email = placeholder_email(id);
        assert!(email.starts_with(PLACEHOLDER_EMAIL_PREFIX));
        assert!(email.ends_with("@local.invalid"));
        assert!(email.contains(&id.to_string()));
    }

    #[test]
    fn status_roundtrip() {
        for s in [
            CandidateStatus::Processing,
            CandidateStatus::NeedsReview,
            CandidateStatus::ParsingFailed,
            CandidateStatus::Interviewing,
            CandidateStatus::Hired,
            CandidateStatus::Rejected,
            CandidateStatus::Archived,
        ] {
            assert_eq!(CandidateStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(CandidateStatus::parse("bogus"), None);
    }

    #[test]
    fn terminal_and_transient_partition() {
        assert!(CandidateStatus::Hired.is_terminal());
        assert!(CandidateStatus::Processing.is_transient());
        assert!(!CandidateStatus::NeedsReview.is_terminal());
        assert!(!CandidateStatus::NeedsReview.is_transient());
    }
}
