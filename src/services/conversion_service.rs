use crate::error::Result;
use crate::models::candidate::{history_kind, Candidate, NewHistoryEvent};
use crate::models::job::ConvertToPdfArgs;
use crate::services::candidate_service::append_history;
use crate::services::job_service::{JobError, JobResult};
use crate::services::parser_service::excerpt;
use crate::services::storage_service::{derived_pdf_key, sanitize_filename, StorageError};
use crate::AppState;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

const CONVERT_TIMEOUT: Duration = Duration::from_secs(180);
const CONVERTER_BIN: &str = "libreoffice";

const CANDIDATE_COLS: &str = "id, company_id, first_name, last_name, email, phone_number, age, \
     education_summary, experience_summary, skills_summary, languages, seminars, notes, status, \
     cv_storage_path, cv_pdf_storage_key, cv_original_filename, cv_content_type, created_at, updated_at";

#[derive(Clone)]
pub struct ConversionService {
    pool: PgPool,
}

impl ConversionService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The `convert_to_pdf` job body. Converter failures are terminal; a
    /// merge racing this job is detected by re-checking who owns the
    /// original key before linking the rendition.
    pub async fn run_convert_to_pdf(&self, state: &AppState, args: ConvertToPdfArgs) -> JobResult {
        let original = match state.storage_service.get(&args.original_key).await {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound(_)) => {
                tracing::info!(key = %args.original_key, "original CV object gone, conversion dropped");
                return Ok(());
            }
            Err(e) => return Err(JobError::transient(e.to_string())),
        };

        // The placeholder may have merged away while we were queued; the key
        // follows the surviving candidate, so resolve ownership by key.
        let Some(owner) = self
            .resolve_owner(args.candidate_id, &args.original_key)
            .await
            .map_err(|e| JobError::transient(e.to_string()))?
        else {
            tracing::info!(
                candidate_id = %args.candidate_id,
                key = %args.original_key,
                "no candidate references the original key anymore, conversion dropped"
            );
            return Ok(());
        };

        let scratch = tempfile::tempdir()
            .map_err(|e| JobError::transient(format!("scratch dir: {}", e)))?;
        let input_name = sanitize_filename(&args.original_filename);
        let input_path = scratch.path().join(&input_name);
        tokio::fs::write(&input_path, &original)
            .await
            .map_err(|e| JobError::transient(format!("write scratch input: {}", e)))?;

        let output = tokio::time::timeout(
            CONVERT_TIMEOUT,
            tokio::process::Command::new(CONVERTER_BIN)
                .arg("--headless")
                .arg("--convert-to")
                .arg("pdf")
                .arg("--outdir")
                .arg(scratch.path())
                .arg(&input_path)
                .output(),
        )
        .await;

        let output = match output {
            Err(_) => return Err(JobError::transient("document converter timed out".to_string())),
            Ok(Err(e)) => {
                let msg = format!("could not run {}: {}", CONVERTER_BIN, e);
                self.record_conversion_failure(owner.id, &msg)
                    .await
                    .map_err(|e| JobError::transient(e.to_string()))?;
                return Err(JobError::terminal(msg));
            }
            Ok(Ok(output)) => output,
        };

        let stem = input_name.rsplit_once('.').map(|(s, _)| s).unwrap_or(&input_name);
        let produced = scratch.path().join(format!("{}.pdf", stem));
        if !output.status.success() || !produced.exists() {
            let msg = format!(
                "converter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            );
            self.record_conversion_failure(owner.id, &msg)
                .await
                .map_err(|e| JobError::transient(e.to_string()))?;
            return Err(JobError::terminal(msg));
        }

        let pdf_bytes = tokio::fs::read(&produced)
            .await
            .map_err(|e| JobError::transient(format!("read converted PDF: {}", e)))?;

        let pdf_key = derived_pdf_key(owner.company_id, owner.id, &args.original_filename);
        state
            .storage_service
            .put(&pdf_key, pdf_bytes.into(), "application/pdf")
            .await
            .map_err(|e| JobError::transient(e.to_string()))?;

        // Link only if the owner still carries this original; otherwise the
        // rendition is stale and gets cleaned up again.
        let linked = self
            .link_rendition(owner.id, &args.original_key, &pdf_key)
            .await
            .map_err(|e| JobError::transient(e.to_string()))?;
        if !linked {
            tracing::info!(
                candidate_id = %owner.id,
                key = %args.original_key,
                "CV replaced during conversion, discarding rendition"
            );
            if let Err(e) = state.storage_service.delete(&pdf_key).await {
                tracing::warn!(key = %pdf_key, error = %e, "stale rendition cleanup failed");
            }
        }
        Ok(())
    }

    /// Candidate by id when it still owns the key, otherwise whoever
    /// inherited the key through a merge.
    async fn resolve_owner(&self, candidate_id: Uuid, original_key: &str) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {} FROM candidates WHERE id = $1", CANDIDATE_COLS);
        let by_id = sqlx::query_as::<_, Candidate>(&sql)
            .bind(candidate_id)
            .fetch_optional(&self.pool)
            .await?;
        if let Some(candidate) = by_id {
            if candidate.cv_storage_path.as_deref() == Some(original_key) {
                return Ok(Some(candidate));
            }
        }
        let sql = format!("SELECT {} FROM candidates WHERE cv_storage_path = $1 LIMIT 1", CANDIDATE_COLS);
        let by_key = sqlx::query_as::<_, Candidate>(&sql)
            .bind(original_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(by_key)
    }

    async fn link_rendition(&self, candidate_id: Uuid, original_key: &str, pdf_key: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            "UPDATE candidates SET cv_pdf_storage_key = $1, updated_at = NOW() \
             WHERE id = $2 AND cv_storage_path = $3",
        )
        .bind(pdf_key)
        .bind(candidate_id)
        .bind(original_key)
        .execute(&mut *tx)
        .await?;
        let linked = updated.rows_affected() > 0;
        if linked {
            let event = NewHistoryEvent::new(
                history_kind::CV_CONVERTED_TO_PDF,
                "CV converted to PDF rendition".to_string(),
            );
            append_history(&mut *tx, candidate_id, &event).await?;
        }
        tx.commit().await?;
        Ok(linked)
    }

    pub async fn record_conversion_failure(&self, candidate_id: Uuid, error: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let event = NewHistoryEvent::new(
            history_kind::CV_CONVERSION_FAILED,
            format!("PDF conversion failed: {}", excerpt(error)),
        );
        append_history(&mut *tx, candidate_id, &event).await?;
        tx.commit().await?;
        Ok(())
    }
}
