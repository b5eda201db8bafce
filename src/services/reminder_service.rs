use crate::config::get_config;
use crate::error::Result;
use crate::models::job::{job_type, SendNotificationArgs};
use crate::services::job_service::{enqueue_on, DEFAULT_MAX_ATTEMPTS, NOTIFY_BACKOFF_BASE_SECONDS};
use crate::AppState;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Reminders never fire inside the last 15 minutes before the interview;
/// by then the email would arrive too late to matter.
const REMINDER_CUTOFF_MINUTES: i64 = 15;

/// Lead times outside the configured window are clamped, not rejected.
pub fn clamp_lead_time(lead_minutes: i64, min: i64, max: i64) -> i64 {
    lead_minutes.clamp(min, max)
}

/// The eligibility window of §sweep: past the trigger instant, before the
/// cutoff, and not already sent for this trigger.
pub fn reminder_eligible(
    scheduled_start: DateTime<Utc>,
    lead_minutes: i64,
    now: DateTime<Utc>,
    last_reminder_sent_at: Option<DateTime<Utc>>,
) -> bool {
    let trigger_at = scheduled_start - Duration::minutes(lead_minutes);
    let cutoff = scheduled_start - Duration::minutes(REMINDER_CUTOFF_MINUTES);
    if !(trigger_at <= now && now < cutoff) {
        return false;
    }
    match last_reminder_sent_at {
        None => true,
        Some(sent) => sent < trigger_at,
    }
}

#[derive(Debug, Default)]
pub struct SweepStats {
    pub reminders_enqueued: u64,
    pub proposals_expired: u64,
    pub jobs_reclaimed: u64,
}

/// One scheduled interview joined with the recruiter and tenant settings
/// that gate its reminder.
#[derive(Debug, FromRow)]
struct ReminderCandidateRow {
    id: Uuid,
    company_id: Uuid,
    candidate_id: Uuid,
    scheduled_start_time: DateTime<Utc>,
    last_reminder_sent_at: Option<DateTime<Utc>>,
    recruiter_email: Option<String>,
    is_active: bool,
    reminders_enabled: bool,
    reminder_lead_time_minutes: i32,
    interview_reminders_enabled: bool,
}

#[derive(Clone)]
pub struct ReminderService {
    pool: PgPool,
}

impl ReminderService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// One sweeper tick: reclaim jobs lost to dead workers, expire lapsed
    /// proposals, then fire eligible reminders for upcoming scheduled
    /// interviews.
    pub async fn run_sweep(&self, state: &AppState) -> Result<SweepStats> {
        let mut stats = SweepStats {
            jobs_reclaimed: state.job_queue.requeue_stale().await?,
            proposals_expired: state.interview_service.expire_stale_proposals().await?,
            ..Default::default()
        };

        let config = get_config();
        let rows = sqlx::query_as::<_, ReminderCandidateRow>(
            r#"
            SELECT i.id, i.company_id, i.candidate_id,
                   i.scheduled_start_time, i.last_reminder_sent_at,
                   u.email AS recruiter_email, u.is_active, u.reminders_enabled,
                   u.reminder_lead_time_minutes, c.interview_reminders_enabled
            FROM interviews i
            JOIN users u ON u.id = i.recruiter_id
            JOIN companies c ON c.id = i.company_id
            WHERE i.status = 'scheduled' AND i.scheduled_start_time > NOW()
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        for row in rows {
            let Some(recruiter_email) = row.recruiter_email.clone().filter(|e| !e.is_empty())
            else {
                continue;
            };
            if !row.is_active || !row.reminders_enabled || !row.interview_reminders_enabled {
                continue;
            }

            let lead = clamp_lead_time(
                row.reminder_lead_time_minutes as i64,
                config.min_reminder_lead_time_minutes,
                config.max_reminder_lead_time_minutes,
            );
            if !reminder_eligible(row.scheduled_start_time, lead, now, row.last_reminder_sent_at) {
                continue;
            }

            let trigger_at = row.scheduled_start_time - Duration::minutes(lead);
            if self.fire_reminder(&row, recruiter_email, trigger_at).await? {
                stats.reminders_enqueued += 1;
            }
        }

        Ok(stats)
    }

    /// Compare-and-set on last_reminder_sent_at, atomic with the enqueue;
    /// a concurrent sweeper tick loses the update and enqueues nothing.
    async fn fire_reminder(
        &self,
        row: &ReminderCandidateRow,
        recruiter_email: String,
        trigger_at: DateTime<Utc>,
    ) -> Result<bool> {
        let config = get_config();

        let mut tx = self.pool.begin().await?;
        let claimed = sqlx::query(
            "UPDATE interviews SET last_reminder_sent_at = NOW() \
             WHERE id = $1 AND status = 'scheduled' \
               AND (last_reminder_sent_at IS NULL OR last_reminder_sent_at < $2) \
             RETURNING id",
        )
        .bind(row.id)
        .bind(trigger_at)
        .fetch_optional(&mut *tx)
        .await?;
        if claimed.is_none() {
            return Ok(false);
        }

        let args = SendNotificationArgs {
            company_id: row.company_id,
            event_type: "interview_reminder".to_string(),
            recipient_email: Some(recruiter_email),
            subject: "Upcoming interview reminder".to_string(),
            dedup_key: format!("interview:{}:reminder:{}", row.id, trigger_at.timestamp()),
            context: json!({
                "interview_id": row.id,
                "candidate_id": row.candidate_id,
                "scheduled_start_time": row.scheduled_start_time,
                "display_timezone": config.local_timezone,
            }),
        };
        enqueue_on(
            &mut *tx,
            job_type::SEND_NOTIFICATION,
            &args,
            DEFAULT_MAX_ATTEMPTS,
            NOTIFY_BACKOFF_BASE_SECONDS,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(interview_id = %row.id, "interview reminder enqueued");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, h, m, 0).unwrap()
    }

    #[test]
    fn eligible_inside_window() {
        // interview 09:00, lead 60min: trigger 08:00, cutoff 08:45
        assert!(reminder_eligible(at(9, 0), 60, at(8, 1), None));
        assert!(reminder_eligible(at(9, 0), 60, at(8, 44), None));
    }

    #[test]
    fn not_eligible_before_trigger_or_after_cutoff() {
        assert!(!reminder_eligible(at(9, 0), 60, at(7, 59), None));
        assert!(!reminder_eligible(at(9, 0), 60, at(8, 45), None));
        assert!(!reminder_eligible(at(9, 0), 60, at(8, 50), None));
    }

    #[test]
    fn already_sent_reminders_do_not_repeat() {
        // sent at 08:01 for trigger 08:00 -> later ticks skip
        assert!(!reminder_eligible(at(9, 0), 60, at(8, 5), Some(at(8, 1))));
        // sent before the trigger (older schedule) -> fire again
        assert!(reminder_eligible(at(9, 0), 60, at(8, 5), Some(at(7, 0))));
    }

    #[test]
    fn lead_time_is_clamped_to_bounds() {
        assert_eq!(clamp_lead_time(1, 5, 2880), 5);
        assert_eq!(clamp_lead_time(60, 5, 2880), 60);
        assert_eq!(clamp_lead_time(10_000, 5, 2880), 2880);
    }
}
