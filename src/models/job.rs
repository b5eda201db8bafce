use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub mod job_type {
    pub const PARSE_CV: &str = "parse_cv";
    pub const CONVERT_TO_PDF: &str = "convert_to_pdf";
    pub const SEND_NOTIFICATION: &str = "send_notification";
}

/// Typed arguments for the ingestion jobs. The queue stores them as jsonb.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseCvArgs {
    pub candidate_id: Uuid,
    pub storage_key: String,
    pub company_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertToPdfArgs {
    pub candidate_id: Uuid,
    pub original_key: String,
    pub original_filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendNotificationArgs {
    pub company_id: Uuid,
    pub event_type: String,
    pub recipient_email: Option<String>,
    pub subject: String,
    /// Transition-scoped key; the dispatcher inserts with ON CONFLICT DO
    /// NOTHING so queue redelivery cannot double-send.
    pub dedup_key: String,
    pub context: JsonValue,
}
