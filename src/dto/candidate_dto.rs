use crate::models::candidate::{Candidate, HistoryEvent};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadAcceptedResponse {
    pub candidate_id: uuid::Uuid,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CandidateResponse {
    pub id: uuid::Uuid,
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
    pub cv_original_filename: Option<String>,
    pub has_pdf_rendition: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<Candidate> for CandidateResponse {
    fn from(c: Candidate) -> Self {
        Self {
            id: c.id,
            first_name: c.first_name,
            last_name: c.last_name,
            email: c.email,
            phone_number: c.phone_number,
            age: c.age,
            education_summary: c.education_summary,
            experience_summary: c.experience_summary,
            skills_summary: c.skills_summary,
            languages: c.languages,
            seminars: c.seminars,
            notes: c.notes,
            status: c.status,
            cv_original_filename: c.cv_original_filename,
            has_pdf_rendition: c.cv_pdf_storage_key.is_some(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub candidate_id: uuid::Uuid,
    pub events: Vec<HistoryEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CvDownloadResponse {
    pub url: String,
    pub expires_in_seconds: u64,
}
