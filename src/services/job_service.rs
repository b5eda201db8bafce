use crate::error::Result;
use crate::models::job::{job_type, ConvertToPdfArgs, ParseCvArgs, SendNotificationArgs};
use crate::AppState;
use serde::Serialize;
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;
pub const PARSE_BACKOFF_BASE_SECONDS: i32 = 60;
pub const CONVERT_BACKOFF_BASE_SECONDS: i32 = 120;
pub const NOTIFY_BACKOFF_BASE_SECONDS: i32 = 30;

/// A `running` claim older than this belongs to a dead worker; no job body
/// legitimately runs longer (conversion caps at 180 s, parsing at 120 s).
pub const STALE_CLAIM_SECONDS: i64 = 900;

/// Worker-side error classification. The queue harness is the only place
/// that turns these into a retry or a terminal job status; job bodies never
/// re-run themselves.
#[derive(Debug)]
pub enum JobError {
    Transient(String),
    Terminal(String),
}

impl JobError {
    pub fn transient(msg: impl Into<String>) -> Self {
        JobError::Transient(msg.into())
    }

    pub fn terminal(msg: impl Into<String>) -> Self {
        JobError::Terminal(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            JobError::Transient(m) | JobError::Terminal(m) => m,
        }
    }
}

pub type JobResult = std::result::Result<(), JobError>;

/// Exponential back-off from a per-job base delay: base * 2^(attempt-1).
pub fn backoff_seconds(base_seconds: i32, attempt: i32) -> i64 {
    let exp = attempt.saturating_sub(1).clamp(0, 16) as u32;
    (base_seconds as i64).saturating_mul(1i64 << exp)
}

#[derive(Clone)]
pub struct JobQueue {
    pool: PgPool,
}

struct ClaimedJob {
    id: Uuid,
    job_type: String,
    payload: JsonValue,
    attempts: i32,
    max_attempts: i32,
    backoff_base_seconds: i32,
}

impl JobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue<T: Serialize>(
        &self,
        job_type: &str,
        args: &T,
        max_attempts: i32,
        backoff_base_seconds: i32,
    ) -> Result<Uuid> {
        let mut conn = self.pool.acquire().await?;
        enqueue_on(&mut *conn, job_type, args, max_attempts, backoff_base_seconds).await
    }

    /// Requeues jobs whose worker died between claim and settle, so
    /// at-least-once delivery survives a crash. The claim already counted
    /// an attempt, so the lost run is not free.
    pub async fn requeue_stale(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE jobs SET status = 'queued', next_run_at = NOW(), \
             last_error = 'reclaimed from an unresponsive worker', updated_at = NOW() \
             WHERE status = 'running' AND updated_at < NOW() - make_interval(secs => $1)",
        )
        .bind(STALE_CLAIM_SECONDS as f64)
        .execute(&self.pool)
        .await?;
        let reclaimed = result.rows_affected();
        if reclaimed > 0 {
            tracing::warn!(reclaimed, "requeued stale running jobs");
        }
        Ok(reclaimed)
    }

    /// Claims the next due job, runs it, and settles its status. Returns
    /// false when the queue is drained.
    pub async fn run_once(&self, state: &AppState) -> Result<bool> {
        let row = sqlx::query(
            r#"
            UPDATE jobs SET status = 'running', attempts = attempts + 1, updated_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'queued' AND next_run_at <= NOW()
                ORDER BY next_run_at ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, job_type, payload, attempts, max_attempts, backoff_base_seconds
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(false) };
        let job = ClaimedJob {
            id: row.try_get("id")?,
            job_type: row.try_get("job_type")?,
            payload: row.try_get("payload")?,
            attempts: row.try_get("attempts")?,
            max_attempts: row.try_get("max_attempts")?,
            backoff_base_seconds: row.try_get("backoff_base_seconds")?,
        };

        let outcome = dispatch(state, &job.job_type, &job.payload).await;
        self.settle(state, &job, outcome).await?;
        Ok(true)
    }

    async fn settle(&self, state: &AppState, job: &ClaimedJob, outcome: JobResult) -> Result<()> {
        match outcome {
            Ok(()) => {
                sqlx::query(
                    "UPDATE jobs SET status = 'succeeded', last_error = NULL, updated_at = NOW() WHERE id = $1",
                )
                .bind(job.id)
                .execute(&self.pool)
                .await?;
            }
            Err(JobError::Terminal(msg)) => {
                tracing::warn!(job_id = %job.id, job_type = %job.job_type, error = %msg, "job failed terminally");
                sqlx::query(
                    "UPDATE jobs SET status = 'failed', last_error = $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(&msg)
                .bind(job.id)
                .execute(&self.pool)
                .await?;
            }
            Err(JobError::Transient(msg)) if job.attempts < job.max_attempts => {
                let delay = backoff_seconds(job.backoff_base_seconds, job.attempts);
                tracing::warn!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempt = job.attempts,
                    retry_in_seconds = delay,
                    error = %msg,
                    "job failed, scheduling retry"
                );
                sqlx::query(
                    "UPDATE jobs SET status = 'queued', last_error = $1, \
                     next_run_at = NOW() + make_interval(secs => $2), updated_at = NOW() WHERE id = $3",
                )
                .bind(&msg)
                .bind(delay as f64)
                .bind(job.id)
                .execute(&self.pool)
                .await?;
            }
            Err(JobError::Transient(msg)) => {
                tracing::error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    attempts = job.attempts,
                    error = %msg,
                    "job exhausted its attempts"
                );
                sqlx::query(
                    "UPDATE jobs SET status = 'failed', last_error = $1, updated_at = NOW() WHERE id = $2",
                )
                .bind(&msg)
                .bind(job.id)
                .execute(&self.pool)
                .await?;
                on_exhausted(state, &job.job_type, &job.payload, &msg).await;
            }
        }
        Ok(())
    }

    /// One worker: polls until shutdown flips, draining eagerly and idling
    /// when the queue is empty. Executing jobs run to completion.
    pub async fn worker_loop(
        &self,
        state: AppState,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
        worker_id: usize,
    ) {
        tracing::info!(worker_id, "job worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.run_once(&state).await {
                Ok(true) => {}
                Ok(false) => {
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_millis(750)) => {}
                        _ = shutdown.changed() => {}
                    }
                }
                Err(e) => {
                    tracing::error!(worker_id, error = ?e, "job worker error");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
        tracing::info!(worker_id, "job worker stopped");
    }
}

/// Enqueue on an explicit connection so callers can make the enqueue atomic
/// with their own commit.
pub async fn enqueue_on<T: Serialize>(
    conn: &mut PgConnection,
    job_type: &str,
    args: &T,
    max_attempts: i32,
    backoff_base_seconds: i32,
) -> Result<Uuid> {
    let payload = serde_json::to_value(args)?;
    let row = sqlx::query(
        "INSERT INTO jobs (id, job_type, payload, max_attempts, backoff_base_seconds) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(job_type)
    .bind(payload)
    .bind(max_attempts)
    .bind(backoff_base_seconds)
    .fetch_one(conn)
    .await?;
    let id: Uuid = row.try_get("id")?;
    Ok(id)
}

async fn dispatch(state: &AppState, kind: &str, payload: &JsonValue) -> JobResult {
    match kind {
        job_type::PARSE_CV => {
            let args: ParseCvArgs = decode_args(payload)?;
            state.ingestion_service.run_parse_cv(state, args).await
        }
        job_type::CONVERT_TO_PDF => {
            let args: ConvertToPdfArgs = decode_args(payload)?;
            state.conversion_service.run_convert_to_pdf(state, args).await
        }
        job_type::SEND_NOTIFICATION => {
            let args: SendNotificationArgs = decode_args(payload)?;
            state.notification_service.run_send(args).await
        }
        other => Err(JobError::terminal(format!("unknown job type '{}'", other))),
    }
}

/// Final-failure hook: the last chance to leave the subject row in a state
/// an operator can act on.
async fn on_exhausted(state: &AppState, kind: &str, payload: &JsonValue, error: &str) {
    match kind {
        job_type::PARSE_CV => {
            if let Ok(args) = serde_json::from_value::<ParseCvArgs>(payload.clone()) {
                if let Err(e) = state
                    .ingestion_service
                    .mark_parsing_failed(args.candidate_id, error)
                    .await
                {
                    tracing::error!(candidate_id = %args.candidate_id, error = ?e, "could not mark candidate parsing_failed");
                }
            }
        }
        job_type::CONVERT_TO_PDF => {
            if let Ok(args) = serde_json::from_value::<ConvertToPdfArgs>(payload.clone()) {
                if let Err(e) = state
                    .conversion_service
                    .record_conversion_failure(args.candidate_id, error)
                    .await
                {
                    tracing::error!(candidate_id = %args.candidate_id, error = ?e, "could not record conversion failure");
                }
            }
        }
        _ => {}
    }
}

fn decode_args<T: serde::de::DeserializeOwned>(payload: &JsonValue) -> std::result::Result<T, JobError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| JobError::terminal(format!("malformed job payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        assert_eq!(backoff_seconds(60, 1), 60);
        assert_eq!(backoff_seconds(60, 2), 120);
        assert_eq!(backoff_seconds(60, 3), 240);
        assert_eq!(backoff_seconds(120, 1), 120);
        assert_eq!(backoff_seconds(120, 2), 240);
    }

    #[test]
    fn backoff_handles_degenerate_attempts() {
        assert_eq!(backoff_seconds(60, 0), 60);
        // capped exponent keeps the arithmetic in range
        assert!(backoff_seconds(60, 1000) > 0);
    }
}
