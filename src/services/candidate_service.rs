use crate::error::Result;
use crate::models::candidate::{
    history_kind, placeholder_email, Candidate, CandidateStatus, HistoryEvent, NewHistoryEvent,
    PLACEHOLDER_EMAIL_PREFIX,
};
use crate::models::position::Position;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

const CANDIDATE_COLS: &str = "id, company_id, first_name, last_name, email, phone_number, age, \
     education_summary, experience_summary, skills_summary, languages, seminars, notes, status, \
     cv_storage_path, cv_pdf_storage_key, cv_original_filename, cv_content_type, created_at, updated_at";

#[derive(Clone)]
pub struct CandidateService {
    pool: PgPool,
}

impl CandidateService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Candidate>> {
        let sql = format!("SELECT {} FROM candidates WHERE id = $1", CANDIDATE_COLS);
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    pub async fn get_in_company(&self, company_id: Uuid, id: Uuid) -> Result<Option<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates WHERE id = $1 AND company_id = $2",
            CANDIDATE_COLS
        );
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(id)
            .bind(company_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    /// Case-normalized match; placeholder rows never participate.
    pub async fn find_by_email(&self, company_id: Uuid, email: &str) -> Result<Option<Candidate>> {
        let sql = format!(
            "SELECT {} FROM candidates \
             WHERE company_id = $1 AND lower(email) = lower($2) AND email NOT LIKE $3",
            CANDIDATE_COLS
        );
        let candidate = sqlx::query_as::<_, Candidate>(&sql)
            .bind(company_id)
            .bind(email)
            .bind(format!("{}%", PLACEHOLDER_EMAIL_PREFIX))
            .fetch_optional(&self.pool)
            .await?;
        Ok(candidate)
    }

    /// Like `find_by_email` but skipping the given candidates; used by the
    /// merge path to detect a third owner of a parsed email.
    pub async fn find_other_email_owner(
        &self,
        company_id: Uuid,
        email: &str,
        excluding: Vec<Uuid>,
    ) -> Result<Option<Uuid>> {
        let row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM candidates \
             WHERE company_id = $1 AND lower(email) = lower($2) \
               AND email NOT LIKE $3 AND NOT (id = ANY($4))",
        )
        .bind(company_id)
        .bind(email)
        .bind(format!("{}%", PLACEHOLDER_EMAIL_PREFIX))
        .bind(excluding)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id,)| id))
    }

    pub async fn set_status(
        &self,
        candidate_id: Uuid,
        status: CandidateStatus,
        event: Option<NewHistoryEvent>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE candidates SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status.as_str())
            .bind(candidate_id)
            .execute(&mut *tx)
            .await?;
        if let Some(event) = event {
            append_history(&mut *tx, candidate_id, &event).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete(&self, candidate_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM candidates WHERE id = $1")
            .bind(candidate_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_history(&self, candidate_id: Uuid) -> Result<Vec<HistoryEvent>> {
        let events = sqlx::query_as::<_, HistoryEvent>(
            "SELECT id, candidate_id, event_type, description, actor_id, details, created_at \
             FROM candidate_history WHERE candidate_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

}

/// Inserts the pre-parse placeholder row and its `cv_added` history event on
/// the caller's connection. The id is caller-allocated because the storage
/// key encodes it before the row exists.
pub async fn insert_placeholder(
    conn: &mut PgConnection,
    id: Uuid,
    company_id: Uuid,
    original_filename: &str,
    content_type: &str,
    storage_key: &str,
    actor_id: Option<Uuid>,
) -> Result<Candidate> {
    let email = placeholder_email(id);
    let sql = format!(
        "INSERT INTO candidates \
         (id, company_id, email, status, cv_storage_path, cv_original_filename, cv_content_type) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
        CANDIDATE_COLS
    );
    let candidate = sqlx::query_as::<_, Candidate>(&sql)
        .bind(id)
        .bind(company_id)
        .bind(&email)
        .bind(CandidateStatus::Processing.as_str())
        .bind(storage_key)
        .bind(original_filename)
        .bind(content_type)
        .fetch_one(&mut *conn)
        .await?;

    let mut event = NewHistoryEvent::new(
        history_kind::CV_ADDED,
        format!("CV '{}' uploaded, awaiting parsing", original_filename),
    );
    event.actor_id = actor_id;
    append_history(conn, id, &event).await?;
    Ok(candidate)
}

pub async fn upsert_position(
    conn: &mut PgConnection,
    company_id: Uuid,
    name: &str,
) -> Result<Position> {
    let position = sqlx::query_as::<_, Position>(
        "INSERT INTO positions (id, company_id, name) VALUES ($1, $2, $3) \
         ON CONFLICT (company_id, name) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id, company_id, name, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(name)
    .fetch_one(conn)
    .await?;
    Ok(position)
}

pub async fn link_position(
    conn: &mut PgConnection,
    candidate_id: Uuid,
    position_id: Uuid,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO candidate_positions (candidate_id, position_id) VALUES ($1, $2) \
         ON CONFLICT DO NOTHING",
    )
    .bind(candidate_id)
    .bind(position_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Appends one history event inside the caller's transaction so the event
/// lands or rolls back together with the row mutation it describes.
pub async fn append_history(
    conn: &mut PgConnection,
    candidate_id: Uuid,
    event: &NewHistoryEvent,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO candidate_history (candidate_id, event_type, description, actor_id, details) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(candidate_id)
    .bind(event.event_type)
    .bind(&event.description)
    .bind(event.actor_id)
    .bind(&event.details)
    .execute(conn)
    .await?;
    Ok(())
}

/// Union of position and branch associations from `source` into `target`,
/// inside the caller's transaction.
pub async fn transfer_associations(
    conn: &mut PgConnection,
    source: Uuid,
    target: Uuid,
) -> std::result::Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO candidate_positions (candidate_id, position_id) \
         SELECT $2, position_id FROM candidate_positions WHERE candidate_id = $1 \
         ON CONFLICT DO NOTHING",
    )
    .bind(source)
    .bind(target)
    .execute(&mut *conn)
    .await?;
    sqlx::query(
        "INSERT INTO candidate_branches (candidate_id, branch_id) \
         SELECT $2, branch_id FROM candidate_branches WHERE candidate_id = $1 \
         ON CONFLICT DO NOTHING",
    )
    .bind(source)
    .bind(target)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
