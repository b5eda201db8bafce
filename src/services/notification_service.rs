use crate::models::job::SendNotificationArgs;
use crate::services::job_service::{JobError, JobResult};
use sqlx::PgPool;

#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
}

impl NotificationService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The `send_notification` job body. Delivery is an insert into the
    /// notifications outbox; the unique dedup_key makes redelivered jobs
    /// collapse into a no-op instead of double-sending.
    pub async fn run_send(&self, args: SendNotificationArgs) -> JobResult {
        let inserted = sqlx::query(
            "INSERT INTO notifications \
               (id, company_id, event_type, recipient_email, subject, dedup_key, context) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (dedup_key) DO NOTHING",
        )
        .bind(uuid::Uuid::new_v4())
        .bind(args.company_id)
        .bind(&args.event_type)
        .bind(&args.recipient_email)
        .bind(&args.subject)
        .bind(&args.dedup_key)
        .bind(&args.context)
        .execute(&self.pool)
        .await
        .map_err(|e| JobError::transient(format!("notification insert: {}", e)))?;

        if inserted.rows_affected() == 0 {
            tracing::debug!(dedup_key = %args.dedup_key, "duplicate notification suppressed");
        } else {
            tracing::info!(
                event_type = %args.event_type,
                dedup_key = %args.dedup_key,
                recipient = args.recipient_email.as_deref().unwrap_or("<none>"),
                "notification dispatched"
            );
        }
        Ok(())
    }
}
