use crate::config::get_config;
use crate::dto::candidate_dto::UploadAcceptedResponse;
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::AppState;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use bytes::Bytes;

struct UploadForm {
    filename: String,
    content_type: String,
    data: Bytes,
    position: Option<String>,
    company_id_override: Option<uuid::Uuid>,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm> {
    let max_bytes = get_config().max_upload_bytes;
    let mut file: Option<(String, String, Bytes)> = None;
    let mut position: Option<String> = None;
    let mut company_id_override: Option<uuid::Uuid> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name().unwrap_or_default() {
            "cv_file" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| Error::BadRequest("cv_file is missing a filename".to_string()))?;
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let data = field.bytes().await?;
                if data.len() > max_bytes {
                    return Err(Error::PayloadTooLarge(format!(
                        "CV exceeds the {} byte upload limit",
                        max_bytes
                    )));
                }
                if data.is_empty() {
                    return Err(Error::BadRequest("cv_file is empty".to_string()));
                }
                file = Some((filename, content_type, data));
            }
            "position" => {
                let value = field.text().await?;
                let trimmed = value.trim();
                if !trimmed.is_empty() {
                    position = Some(trimmed.to_string());
                }
            }
            "company_id_for_upload" => {
                let value = field.text().await?;
                let parsed = uuid::Uuid::parse_str(value.trim()).map_err(|_| {
                    Error::BadRequest("company_id_for_upload is not a valid id".to_string())
                })?;
                company_id_override = Some(parsed);
            }
            _ => {}
        }
    }

    let (filename, content_type, data) =
        file.ok_or_else(|| Error::BadRequest("Multipart field 'cv_file' is required".to_string()))?;
    Ok(UploadForm {
        filename,
        content_type,
        data,
        position,
        company_id_override,
    })
}

/// POST /api/candidates/upload. Accepts the CV, stores it and schedules the
/// parse; the 202 body carries the id the caller can poll.
pub async fn upload_cv(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    multipart: Multipart,
) -> Result<impl axum::response::IntoResponse> {
    let form = read_form(multipart).await?;
    let actor_id = claims.user_id().ok();

    // Only a superadmin may upload into another tenant.
    let company_id = match form.company_id_override {
        Some(other) if other != claims.company_id => {
            let is_superadmin = claims
                .role
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case("superadmin"));
            if !is_superadmin {
                return Err(Error::Forbidden(
                    "Only a superadmin may upload for another company".to_string(),
                ));
            }
            other
        }
        _ => claims.company_id,
    };

    let candidate_id = state
        .ingestion_service
        .ingest_upload(
            &state,
            company_id,
            actor_id,
            &form.filename,
            &form.content_type,
            form.data,
            form.position.as_deref(),
        )
        .await?;

    let body = UploadAcceptedResponse {
        candidate_id,
        status: "processing".to_string(),
    };
    Ok((StatusCode::ACCEPTED, Json(body)))
}
