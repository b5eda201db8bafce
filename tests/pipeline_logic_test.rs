use chrono::NaiveDate;
use serde_json::json;
use talenthub_backend::models::candidate::{placeholder_email, Candidate, CandidateStatus};
use talenthub_backend::models::interview::{next_status, InterviewAction, InterviewStatus};
use talenthub_backend::services::ingestion_service::{apply_profile, needs_pdf_conversion};
use talenthub_backend::services::parser_service::{extract_profile, ResumeData};
use talenthub_backend::services::storage_service::{derived_pdf_key, original_cv_key};
use uuid::Uuid;

fn blank_candidate(id: Uuid, company_id: Uuid) -> Candidate {
    Candidate {
        id,
        company_id,
        first_name: None,
        last_name: None,
        email: Some(placeholder_email(id)),
        phone_number: None,
        age: None,
        education_summary: None,
        experience_summary: None,
        skills_summary: None,
        languages: None,
        seminars: None,
        notes: None,
        status: CandidateStatus::Processing.as_str().to_string(),
        cv_storage_path: None,
        cv_pdf_storage_key: None,
        cv_original_filename: None,
        cv_content_type: None,
        created_at: None,
        updated_at: None,
    }
}

#[test]
fn parsed_resume_populates_a_placeholder() {
    let resume: ResumeData = serde_json::from_value(json!({
        "ContactInformation": {
            "CandidateName": { "GivenName": "Ada", "FamilyName": "Lovelace" },
            "EmailAddresses": ["  Ada@Example.COM "],
            "Telephones": [{ "Raw": "+44 1234", "Normalized": "+441234" }]
        },
        "Skills": { "Raw": [{ "Name": "Analysis" }, { "Name": "Mathematics" }] }
    }))
    .expect("resume fixture");

    let today = NaiveDate::from_ymd_opt(2026, 8, 1).unwrap();
    let profile = extract_profile(&resume, today);
    assert_eq!(profile.primary_email(), Some("ada@example.com"));
    assert_eq!(profile.primary_phone(), Some("+441234"));

    let id = Uuid::new_v4();
    let mut candidate = blank_candidate(id, Uuid::new_v4());
    let changes = apply_profile(&mut candidate, &profile);

    // nothing was populated before, so nothing counts as overwritten
    assert!(changes.is_empty());
    assert_eq!(candidate.first_name.as_deref(), Some("Ada"));
    assert_eq!(candidate.skills_summary.as_deref(), Some("Analysis, Mathematics"));
    assert!(candidate.notes.as_deref().unwrap().starts_with("CV parsed on"));
    // email stays untouched until the merge protocol decides it
    assert_eq!(candidate.email.as_deref(), Some(placeholder_email(id).as_str()));
}

#[test]
fn refresh_overwrites_and_reports_prior_values() {
    let resume: ResumeData = serde_json::from_value(json!({
        "ContactInformation": {
            "CandidateName": { "GivenName": "Adam", "FamilyName": "Lovelace" }
        }
    }))
    .expect("resume fixture");
    let profile = extract_profile(&resume, NaiveDate::from_ymd_opt(2026, 8, 1).unwrap());

    let mut candidate = blank_candidate(Uuid::new_v4(), Uuid::new_v4());
    candidate.first_name = Some("Ada".to_string());
    candidate.last_name = Some("Lovelace".to_string());

    let changes = apply_profile(&mut candidate, &profile);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].field, "first_name");
    assert_eq!(changes[0].previous, "Ada");
    assert_eq!(candidate.first_name.as_deref(), Some("Adam"));
}

#[test]
fn upload_decides_conversion_by_type_and_extension() {
    assert!(!needs_pdf_conversion("application/pdf", "cv.pdf"));
    assert!(needs_pdf_conversion(
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "cv.docx"
    ));
    assert!(needs_pdf_conversion("application/octet-stream", "cv.doc"));
}

#[test]
fn storage_keys_are_tenant_and_candidate_scoped() {
    let company = Uuid::new_v4();
    let candidate = Uuid::new_v4();
    let original = original_cv_key(company, candidate, "John Smith CV.docx");
    assert!(original.starts_with(&format!("cvs_original/{}/{}/", company, candidate)));
    assert!(original.ends_with("John_Smith_CV.docx"));

    let pdf = derived_pdf_key(company, candidate, "John Smith CV.docx");
    assert!(pdf.starts_with(&format!("cvs_pdf/{}/{}/", company, candidate)));
    assert!(pdf.ends_with(".pdf"));
}

#[test]
fn interview_lifecycle_follows_the_transition_table() {
    use InterviewAction::*;
    use InterviewStatus::*;

    // happy path: proposal, confirmation, evaluation
    let scheduled = next_status(Proposed, CandidateConfirms).unwrap();
    assert_eq!(scheduled, Scheduled);
    assert_eq!(next_status(scheduled, EvaluatePositive), Some(EvaluationPositive));

    // a resolved interview accepts nothing further
    for action in [CandidateConfirms, CandidateRejects, RecruiterCancels, Repropose] {
        assert_eq!(next_status(RejectedByCandidate, action), None);
        assert_eq!(next_status(EvaluationPositive, action), None);
    }

    // re-proposal only applies to a scheduled interview
    assert_eq!(next_status(Scheduled, Repropose), Some(CancelledDueToReevaluation));
    assert_eq!(next_status(Proposed, Repropose), None);
}

#[test]
fn repeated_cancellation_clicks_settle_on_the_first_outcome() {
    use InterviewAction::*;
    use InterviewStatus::*;

    // first click cancels the scheduled interview
    let cancelled = next_status(Scheduled, CandidateCancels).unwrap();
    assert_eq!(cancelled, CancelledByCandidate);

    // the token stays on the row, so a second click (or the loser of a
    // concurrent race) re-resolves the interview and must land on the
    // guard's "nothing further" answer, not an unknown-token error
    assert_eq!(next_status(cancelled, CandidateCancels), None);
    for resolved in [CancelledByRecruiter, CancelledDueToReevaluation, RejectedByCandidate] {
        assert_eq!(next_status(resolved, CandidateCancels), None);
    }
}
