use crate::error::{Error, Result};
use crate::models::candidate::{history_kind, Candidate, CandidateStatus, NewHistoryEvent};
use crate::models::job::{job_type, ConvertToPdfArgs, ParseCvArgs};
use crate::services::candidate_service::{
    append_history, insert_placeholder, link_position, transfer_associations, upsert_position,
};
use crate::services::job_service::{
    enqueue_on, JobError, JobResult, CONVERT_BACKOFF_BASE_SECONDS, DEFAULT_MAX_ATTEMPTS,
    PARSE_BACKOFF_BASE_SECONDS,
};
use crate::services::parser_service::{excerpt, extract_profile, CandidateProfile};
use crate::services::storage_service::original_cv_key;
use crate::AppState;
use bytes::Bytes;
use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

/// Content types the upload endpoint accepts.
const ACCEPTED_CONTENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.oasis.opendocument.text",
    "application/rtf",
    "text/rtf",
    "text/plain",
];

const OFFICE_EXTENSIONS: &[&str] = &["doc", "docx", "odt", "rtf"];

/// Office documents get a derived PDF rendition; PDFs and plain text do not.
pub fn needs_pdf_conversion(content_type: &str, filename: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    if ct == "application/pdf" || ct == "text/plain" {
        return false;
    }
    if ACCEPTED_CONTENT_TYPES.contains(&ct.as_str()) {
        return true;
    }
    filename
        .rsplit_once('.')
        .map(|(_, ext)| OFFICE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn is_accepted_content_type(content_type: &str) -> bool {
    ACCEPTED_CONTENT_TYPES.contains(&content_type.to_ascii_lowercase().as_str())
}

/// One overwritten field, kept in the history event so an operator can
/// recover the prior value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: &'static str,
    pub previous: String,
}

/// Field-merge rules: a parsed non-empty value always wins; the prior value
/// is reported back when one existed. Email is handled separately by the
/// merge protocol, and notes are append-only.
pub fn apply_profile(candidate: &mut Candidate, profile: &CandidateProfile) -> Vec<FieldChange> {
    let mut changes = Vec::new();

    fn merge_text(
        changes: &mut Vec<FieldChange>,
        field: &'static str,
        current: &mut Option<String>,
        parsed: Option<&str>,
    ) {
        let Some(parsed) = parsed.map(str::trim).filter(|p| !p.is_empty()) else {
            return;
        };
        if let Some(prior) = current.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            if prior != parsed {
                changes.push(FieldChange {
                    field,
                    previous: prior.to_string(),
                });
            }
        }
        *current = Some(parsed.to_string());
    }

    merge_text(&mut changes, "first_name", &mut candidate.first_name, profile.first_name.as_deref());
    merge_text(&mut changes, "last_name", &mut candidate.last_name, profile.last_name.as_deref());
    merge_text(&mut changes, "phone_number", &mut candidate.phone_number, profile.primary_phone());
    merge_text(
        &mut changes,
        "education_summary",
        &mut candidate.education_summary,
        profile.education_summary.as_deref(),
    );
    merge_text(
        &mut changes,
        "experience_summary",
        &mut candidate.experience_summary,
        profile.experience_summary.as_deref(),
    );
    merge_text(
        &mut changes,
        "skills_summary",
        &mut candidate.skills_summary,
        profile.skills_summary.as_deref(),
    );
    merge_text(&mut changes, "languages", &mut candidate.languages, profile.languages.as_deref());
    merge_text(&mut changes, "seminars", &mut candidate.seminars, profile.seminars.as_deref());

    if let Some(age) = profile.age {
        if let Some(prior) = candidate.age.filter(|prior| *prior != age) {
            changes.push(FieldChange {
                field: "age",
                previous: prior.to_string(),
            });
        }
        candidate.age = Some(age);
    }

    // Notes are append-only: one bounded line per successful parse.
    let line = format!("CV parsed on {}", Utc::now().format("%Y-%m-%d %H:%M UTC"));
    candidate.notes = Some(match candidate.notes.as_deref().filter(|n| !n.is_empty()) {
        Some(existing) => format!("{}\n{}", existing, line),
        None => line,
    });

    changes
}

fn changes_details(changes: &[FieldChange]) -> serde_json::Value {
    json!({
        "overwritten": changes
            .iter()
            .map(|c| json!({ "field": c.field, "previous": c.previous }))
            .collect::<Vec<_>>()
    })
}

#[derive(Clone)]
pub struct IngestionService {
    pool: PgPool,
}

impl IngestionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Synchronous upload path: object-store put, then placeholder row,
    /// position link and job enqueues in one transaction. Returns the
    /// placeholder id for the 202 response.
    pub async fn ingest_upload(
        &self,
        state: &AppState,
        company_id: Uuid,
        actor_id: Option<Uuid>,
        original_filename: &str,
        content_type: &str,
        data: Bytes,
        position_name: Option<&str>,
    ) -> Result<Uuid> {
        if !is_accepted_content_type(content_type) {
            return Err(Error::BadRequest(format!(
                "Unsupported CV content type: {}",
                content_type
            )));
        }

        // The key needs the candidate id, so allocate the id up front; the
        // object write needs no row and goes first. Everything else commits
        // together, so a failure mid-path never strands a `processing` row
        // without its parse job.
        let candidate_id = Uuid::new_v4();
        let storage_key = original_cv_key(company_id, candidate_id, original_filename);

        state
            .storage_service
            .put(&storage_key, data, content_type)
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        if let Err(e) = self
            .record_upload(
                company_id,
                candidate_id,
                actor_id,
                original_filename,
                content_type,
                &storage_key,
                position_name,
            )
            .await
        {
            // Nothing committed; the stored object is the only leftover.
            let _ = state.storage_service.delete(&storage_key).await;
            return Err(e);
        }

        Ok(candidate_id)
    }

    /// The transactional half of the upload: placeholder row, history,
    /// optional position link and the pipeline jobs land in a single commit.
    #[allow(clippy::too_many_arguments)]
    async fn record_upload(
        &self,
        company_id: Uuid,
        candidate_id: Uuid,
        actor_id: Option<Uuid>,
        original_filename: &str,
        content_type: &str,
        storage_key: &str,
        position_name: Option<&str>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        insert_placeholder(
            &mut *tx,
            candidate_id,
            company_id,
            original_filename,
            content_type,
            storage_key,
            actor_id,
        )
        .await?;

        if let Some(name) = position_name.map(str::trim).filter(|n| !n.is_empty()) {
            let position = upsert_position(&mut *tx, company_id, name).await?;
            link_position(&mut *tx, candidate_id, position.id).await?;
        }

        enqueue_on(
            &mut *tx,
            job_type::PARSE_CV,
            &ParseCvArgs {
                candidate_id,
                storage_key: storage_key.to_string(),
                company_id,
            },
            DEFAULT_MAX_ATTEMPTS,
            PARSE_BACKOFF_BASE_SECONDS,
        )
        .await?;

        if needs_pdf_conversion(content_type, original_filename) {
            enqueue_on(
                &mut *tx,
                job_type::CONVERT_TO_PDF,
                &ConvertToPdfArgs {
                    candidate_id,
                    original_key: storage_key.to_string(),
                    original_filename: original_filename.to_string(),
                },
                DEFAULT_MAX_ATTEMPTS,
                CONVERT_BACKOFF_BASE_SECONDS,
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// The `parse_cv` job body. Idempotent: re-delivery after the placeholder
    /// was promoted or merged away converges on the same candidate set and
    /// object-store contents.
    pub async fn run_parse_cv(&self, state: &AppState, args: ParseCvArgs) -> JobResult {
        let candidate = state
            .candidate_service
            .get(args.candidate_id)
            .await
            .map_err(|e| JobError::transient(e.to_string()))?;

        let Some(placeholder) = candidate else {
            // Admin deleted the placeholder while parsing was queued. Only
            // remove the object if no surviving candidate references it
            // (a completed merge hands the key to the target).
            let still_referenced = self
                .key_is_referenced(&args.storage_key)
                .await
                .map_err(|e| JobError::transient(e.to_string()))?;
            if !still_referenced {
                if let Err(e) = state.storage_service.delete(&args.storage_key).await {
                    tracing::warn!(key = %args.storage_key, error = %e, "orphan CV object cleanup failed");
                }
            }
            tracing::info!(candidate_id = %args.candidate_id, "placeholder gone, parse job dropped");
            return Ok(());
        };

        // Re-delivered job after a successful parse: nothing left to do.
        if !matches!(
            placeholder.status(),
            Some(CandidateStatus::Processing) | Some(CandidateStatus::ParsingFailed)
        ) {
            tracing::info!(candidate_id = %placeholder.id, status = %placeholder.status, "candidate already parsed, skipping");
            return Ok(());
        }

        let resume = match state.parser_service.parse(&args.storage_key).await {
            Ok(resume) => resume,
            Err(e) if e.is_transient() => return Err(JobError::transient(e.to_string())),
            Err(e) => {
                // Logical parse failure: terminal for the job, the row and
                // object stay behind for audit.
                self.mark_parsing_failed(placeholder.id, &e.to_string())
                    .await
                    .map_err(|err| JobError::transient(err.to_string()))?;
                return Err(JobError::terminal(e.to_string()));
            }
        };

        let profile = extract_profile(&resume, Utc::now().date_naive());

        let outcome = match profile.primary_email() {
            None => self.promote_placeholder(&placeholder, &profile, None).await,
            Some(email) => {
                let existing = state
                    .candidate_service
                    .find_by_email(args.company_id, email)
                    .await
                    .map_err(|e| JobError::transient(e.to_string()))?
                    .filter(|c| c.id != placeholder.id);

                match existing {
                    None => {
                        self.promote_placeholder(&placeholder, &profile, Some(email.to_string()))
                            .await
                    }
                    Some(target) => self.merge(state, &placeholder, target, &profile).await,
                }
            }
        };

        outcome.map_err(|e| JobError::transient(e.to_string()))
    }

    /// No pre-existing candidate owns the parsed email (or there is no
    /// email): the placeholder becomes the real candidate.
    async fn promote_placeholder(
        &self,
        placeholder: &Candidate,
        profile: &CandidateProfile,
        email: Option<String>,
    ) -> Result<()> {
        let mut updated = placeholder.clone();
        let changes = apply_profile(&mut updated, profile);
        let has_email = email.is_some();
        if let Some(email) = email {
            updated.email = Some(email);
        }
        updated.status = CandidateStatus::NeedsReview.as_str().to_string();

        let event = if has_email {
            NewHistoryEvent::new(
                history_kind::CV_PARSED_AND_POPULATED,
                "CV parsed and candidate profile populated",
            )
            .with_details(changes_details(&changes))
        } else {
            NewHistoryEvent::new(
                history_kind::CV_PARSED_NO_EMAIL,
                "CV parsed but no email address was found; manual review required",
            )
            .with_details(changes_details(&changes))
        };

        let mut tx = self.pool.begin().await?;
        persist_candidate_fields(&mut tx, &updated).await?;
        append_history(&mut *tx, updated.id, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    /// The merge protocol: the placeholder donates its parsed data and CV
    /// object to the candidate that already owns the email, then disappears.
    /// Everything up to the object-store deletes is one transaction.
    async fn merge(
        &self,
        state: &AppState,
        placeholder: &Candidate,
        target: Candidate,
        profile: &CandidateProfile,
    ) -> Result<()> {
        let prior_status = target.status();
        let mut merged = target;
        let changes = apply_profile(&mut merged, profile);
        let mut events: Vec<NewHistoryEvent> = Vec::new();

        // Email conflict rule: keep the target's email when a third
        // candidate in the tenant already owns the parsed one.
        if let Some(parsed_email) = profile.primary_email() {
            let differs = merged
                .email
                .as_deref()
                .map(|e| !e.eq_ignore_ascii_case(parsed_email))
                .unwrap_or(true);
            if differs {
                let third_owner = state
                    .candidate_service
                    .find_other_email_owner(
                        merged.company_id,
                        parsed_email,
                        vec![merged.id, placeholder.id],
                    )
                    .await?;
                if third_owner.is_some() {
                    events.push(
                        NewHistoryEvent::new(
                            history_kind::EMAIL_UPDATE_CONFLICT,
                            format!(
                                "Parsed email '{}' is already owned by another candidate; existing email retained",
                                parsed_email
                            ),
                        ),
                    );
                } else {
                    let previous = merged.email.clone();
                    merged.email = Some(parsed_email.to_string());
                    events.push(
                        NewHistoryEvent::new(
                            history_kind::EMAIL_UPDATED_FROM_CV,
                            format!("Email updated from CV to '{}'", parsed_email),
                        )
                        .with_details(json!({ "previous": previous })),
                    );
                }
            }
        }

        let (replaced_event, keys_to_delete) = swap_cv_objects(&mut merged, placeholder);
        events.extend(replaced_event);

        let merge_kind = merge_event_kind(prior_status);
        events.push(
            NewHistoryEvent::new(
                merge_kind,
                format!(
                    "Re-submitted CV '{}' merged into existing candidate",
                    merged.cv_original_filename.as_deref().unwrap_or("unknown")
                ),
            )
            .with_details(json!({
                "donor_candidate_id": placeholder.id,
                "prior_status": merged.status,
                "overwritten": changes_details(&changes)["overwritten"],
            })),
        );

        merged.status = CandidateStatus::NeedsReview.as_str().to_string();

        let mut tx = self.pool.begin().await?;
        persist_candidate_fields(&mut tx, &merged).await?;
        transfer_associations(&mut *tx, placeholder.id, merged.id).await?;
        for event in &events {
            append_history(&mut *tx, merged.id, event).await?;
        }
        sqlx::query("DELETE FROM candidates WHERE id = $1")
            .bind(placeholder.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        // Post-commit, best effort: a failed delete only leaks an object.
        for key in keys_to_delete {
            if let Err(e) = state.storage_service.delete(&key).await {
                tracing::warn!(key = %key, error = %e, "stale CV object delete failed");
            }
        }

        tracing::info!(
            target_id = %merged.id,
            donor_id = %placeholder.id,
            event = merge_kind,
            "placeholder merged into existing candidate"
        );
        Ok(())
    }

    /// Terminal parse failure: mark the row, keep the object for inspection.
    pub async fn mark_parsing_failed(&self, candidate_id: Uuid, error: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE candidates SET status = $1, updated_at = NOW() WHERE id = $2",
        )
        .bind(CandidateStatus::ParsingFailed.as_str())
        .bind(candidate_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() > 0 {
            let event = NewHistoryEvent::new(
                history_kind::CV_PARSING_FAILED,
                format!("CV parsing failed: {}", excerpt(error)),
            );
            append_history(&mut *tx, candidate_id, &event).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn key_is_referenced(&self, storage_key: &str) -> Result<bool> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM candidates WHERE cv_storage_path = $1 OR cv_pdf_storage_key = $1 LIMIT 1",
        )
        .bind(storage_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }
}

/// The donor's freshly uploaded CV replaces the merge target's stored
/// objects. Returns the `cv_replaced` event when a prior CV was displaced,
/// plus the now-stale keys to delete after commit.
pub fn swap_cv_objects(
    merged: &mut Candidate,
    donor: &Candidate,
) -> (Option<NewHistoryEvent>, Vec<String>) {
    let mut stale_keys = Vec::new();
    let mut replaced = None;

    let new_cv_key = donor.cv_storage_path.clone();
    let old_cv_key = merged.cv_storage_path.clone();
    if let Some(old) = old_cv_key.filter(|old| Some(old) != new_cv_key.as_ref()) {
        replaced = Some(
            NewHistoryEvent::new(
                history_kind::CV_REPLACED,
                format!(
                    "Stored CV replaced by '{}'",
                    donor.cv_original_filename.as_deref().unwrap_or("unknown")
                ),
            )
            .with_details(json!({ "previous_key": old.as_str() })),
        );
        stale_keys.push(old);
    }
    merged.cv_storage_path = new_cv_key;
    merged.cv_original_filename = donor.cv_original_filename.clone();
    merged.cv_content_type = donor.cv_content_type.clone();

    let new_original_is_pdf = donor
        .cv_content_type
        .as_deref()
        .map(|ct| ct.eq_ignore_ascii_case("application/pdf"))
        .unwrap_or(false);
    if let Some(donor_pdf) = donor.cv_pdf_storage_key.clone() {
        // Conversion finished before the merge; adopt its output.
        if let Some(old_pdf) = merged.cv_pdf_storage_key.replace(donor_pdf) {
            stale_keys.push(old_pdf);
        }
    } else if !new_original_is_pdf {
        // A conversion job for the new original is still in flight; the
        // stale rendition goes away now and the worker fills in the new key.
        if let Some(old_pdf) = merged.cv_pdf_storage_key.take() {
            stale_keys.push(old_pdf);
        }
    }

    (replaced, stale_keys)
}

/// `cv_refresh_merge` when the target was mid-pipeline, the plain
/// re-submission event otherwise.
pub fn merge_event_kind(prior_status: Option<CandidateStatus>) -> &'static str {
    match prior_status {
        Some(s) if !s.is_terminal() && !s.is_transient() => history_kind::CV_REFRESH_MERGE,
        _ => history_kind::CV_RE_SUBMISSION_MERGE,
    }
}

/// Writes every pipeline-owned candidate column. Used by both the promote
/// and merge paths inside their transactions.
async fn persist_candidate_fields(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    candidate: &Candidate,
) -> Result<()> {
    sqlx::query(
        "UPDATE candidates SET \
            first_name = $1, last_name = $2, email = $3, phone_number = $4, age = $5, \
            education_summary = $6, experience_summary = $7, skills_summary = $8, \
            languages = $9, seminars = $10, notes = $11, status = $12, \
            cv_storage_path = $13, cv_pdf_storage_key = $14, cv_original_filename = $15, \
            cv_content_type = $16, updated_at = NOW() \
         WHERE id = $17",
    )
    .bind(&candidate.first_name)
    .bind(&candidate.last_name)
    .bind(&candidate.email)
    .bind(&candidate.phone_number)
    .bind(candidate.age)
    .bind(&candidate.education_summary)
    .bind(&candidate.experience_summary)
    .bind(&candidate.skills_summary)
    .bind(&candidate.languages)
    .bind(&candidate.seminars)
    .bind(&candidate.notes)
    .bind(&candidate.status)
    .bind(&candidate.cv_storage_path)
    .bind(&candidate.cv_pdf_storage_key)
    .bind(&candidate.cv_original_filename)
    .bind(&candidate.cv_content_type)
    .bind(candidate.id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::candidate::placeholder_email;

    fn blank_candidate() -> Candidate {
        let id = Uuid::new_v4();
        Candidate {
            id,
            company_id: Uuid::new_v4(),
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
            cv_storage_path: Some("cvs_original/x/y/alice.pdf".to_string()),
            cv_pdf_storage_key: None,
            cv_original_filename: Some("alice.pdf".to_string()),
            cv_content_type: Some("application/pdf".to_string()),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn empty_target_fields_take_parsed_values() {
        let mut candidate = blank_candidate();
        let profile = CandidateProfile {
            first_name: Some("Alice".into()),
            last_name: Some("Smith".into()),
            phones: vec!["+301234".into()],
            age: Some(30),
            skills_summary: Some("Rust".into()),
            ..Default::default()
        };
        let changes = apply_profile(&mut candidate, &profile);
        assert!(changes.is_empty());
        assert_eq!(candidate.first_name.as_deref(), Some("Alice"));
        assert_eq!(candidate.phone_number.as_deref(), Some("+301234"));
        assert_eq!(candidate.age, Some(30));
    }

    #[test]
    fn parsed_values_overwrite_and_report_prior() {
        let mut candidate = blank_candidate();
        candidate.first_name = Some("Alicia".into());
        candidate.age = Some(29);
        let profile = CandidateProfile {
            first_name: Some("Alice".into()),
            age: Some(30),
            ..Default::default()
        };
        let changes = apply_profile(&mut candidate, &profile);
        assert_eq!(candidate.first_name.as_deref(), Some("Alice"));
        assert_eq!(candidate.age, Some(30));
        assert!(changes.iter().any(|c| c.field == "first_name" && c.previous == "Alicia"));
        assert!(changes.iter().any(|c| c.field == "age" && c.previous == "29"));
    }

    #[test]
    fn empty_parsed_values_leave_target_untouched() {
        let mut candidate = blank_candidate();
        candidate.experience_summary = Some("10 years".into());
        let changes = apply_profile(&mut candidate, &CandidateProfile::default());
        assert!(changes.is_empty());
        assert_eq!(candidate.experience_summary.as_deref(), Some("10 years"));
    }

    #[test]
    fn notes_accumulate_one_line_per_parse() {
        let mut candidate = blank_candidate();
        apply_profile(&mut candidate, &CandidateProfile::default());
        let first = candidate.notes.clone().unwrap();
        assert!(first.starts_with("CV parsed on "));
        apply_profile(&mut candidate, &CandidateProfile::default());
        assert_eq!(candidate.notes.unwrap().lines().count(), 2);
    }

    #[test]
    fn conversion_needed_only_for_office_documents() {
        assert!(!needs_pdf_conversion("application/pdf", "cv.pdf"));
        assert!(!needs_pdf_conversion("text/plain", "cv.txt"));
        assert!(needs_pdf_conversion("application/msword", "cv.doc"));
        assert!(needs_pdf_conversion(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "cv.docx"
        ));
        assert!(needs_pdf_conversion("application/octet-stream", "cv.docx"));
        assert!(!needs_pdf_conversion("application/octet-stream", "cv.bin"));
    }

    #[test]
    fn merge_swap_replaces_stored_cv_and_records_it() {
        let mut target = blank_candidate();
        target.cv_storage_path = Some("cvs_original/x/t/old.pdf".to_string());
        target.cv_pdf_storage_key = Some("cvs_pdf/x/t/old.pdf".to_string());

        let mut donor = blank_candidate();
        donor.cv_storage_path = Some("cvs_original/x/d/new.docx".to_string());
        donor.cv_original_filename = Some("new.docx".to_string());
        donor.cv_content_type = Some("application/msword".to_string());
        donor.cv_pdf_storage_key = None;

        let (event, stale) = swap_cv_objects(&mut target, &donor);
        assert_eq!(event.unwrap().event_type, history_kind::CV_REPLACED);
        assert_eq!(target.cv_storage_path.as_deref(), Some("cvs_original/x/d/new.docx"));
        // conversion for the new original is still in flight
        assert_eq!(target.cv_pdf_storage_key, None);
        assert!(stale.contains(&"cvs_original/x/t/old.pdf".to_string()));
        assert!(stale.contains(&"cvs_pdf/x/t/old.pdf".to_string()));
    }

    #[test]
    fn merge_swap_adopts_a_finished_donor_rendition() {
        let mut target = blank_candidate();
        target.cv_storage_path = Some("cvs_original/x/t/old.doc".to_string());
        target.cv_pdf_storage_key = Some("cvs_pdf/x/t/old.pdf".to_string());

        let mut donor = blank_candidate();
        donor.cv_storage_path = Some("cvs_original/x/d/new.doc".to_string());
        donor.cv_content_type = Some("application/msword".to_string());
        donor.cv_pdf_storage_key = Some("cvs_pdf/x/d/new.pdf".to_string());

        let (event, stale) = swap_cv_objects(&mut target, &donor);
        assert!(event.is_some());
        assert_eq!(target.cv_pdf_storage_key.as_deref(), Some("cvs_pdf/x/d/new.pdf"));
        assert!(stale.contains(&"cvs_pdf/x/t/old.pdf".to_string()));
    }

    #[test]
    fn merge_swap_without_prior_cv_reports_nothing_replaced() {
        let mut target = blank_candidate();
        target.cv_storage_path = None;
        target.cv_pdf_storage_key = None;

        let donor = blank_candidate();
        let (event, stale) = swap_cv_objects(&mut target, &donor);
        assert!(event.is_none());
        assert!(stale.is_empty());
        assert_eq!(target.cv_storage_path, donor.cv_storage_path);
    }

    #[test]
    fn merge_event_kind_depends_on_prior_status() {
        assert_eq!(
            merge_event_kind(Some(CandidateStatus::Hired)),
            history_kind::CV_RE_SUBMISSION_MERGE
        );
        assert_eq!(
            merge_event_kind(Some(CandidateStatus::Processing)),
            history_kind::CV_RE_SUBMISSION_MERGE
        );
        assert_eq!(
            merge_event_kind(Some(CandidateStatus::NeedsReview)),
            history_kind::CV_REFRESH_MERGE
        );
        assert_eq!(
            merge_event_kind(Some(CandidateStatus::Interviewing)),
            history_kind::CV_REFRESH_MERGE
        );
        assert_eq!(merge_event_kind(None), history_kind::CV_RE_SUBMISSION_MERGE);
    }
}
