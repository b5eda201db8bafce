use crate::config::get_config;
use aws_config::BehaviorVersion;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

/// Errors surfaced by the object store facade. Callers retry `Transient`;
/// `NotFound` is a stable answer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object store error: {0}")]
    Transient(String),
}

#[derive(Clone)]
pub struct StorageService {
    client: S3Client,
    bucket: String,
}

impl StorageService {
    pub async fn from_config() -> Self {
        let config = get_config();
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.s3_region.clone()));
        if let Some(endpoint) = &config.s3_endpoint_url {
            loader = loader.endpoint_url(endpoint.clone());
        }
        let sdk_config = loader.load().await;
        Self {
            client: S3Client::new(&sdk_config),
            bucket: config.s3_bucket.clone(),
        }
    }

    pub async fn put(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::Transient(format!("put {}: {}", key, e)))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Bytes, StorageError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(se) if se.err().is_no_such_key() => {
                    StorageError::NotFound(key.to_string())
                }
                _ => StorageError::Transient(format!("get {}: {}", key, e)),
            })?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Transient(format!("read {}: {}", key, e)))?;
        Ok(data.into_bytes())
    }

    /// Idempotent: deleting a missing key succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Transient(format!("delete {}: {}", key, e)))?;
        Ok(())
    }

    pub async fn presign_read(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::Transient(format!("presign config: {}", e)))?;
        let req = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Transient(format!("presign {}: {}", key, e)))?;
        Ok(req.uri().to_string())
    }
}

/// Keys are self-describing: tenant and candidate ids are part of the path.
pub fn original_cv_key(company_id: Uuid, candidate_id: Uuid, filename: &str) -> String {
    format!(
        "cvs_original/{}/{}/{}",
        company_id,
        candidate_id,
        sanitize_filename(filename)
    )
}

pub fn derived_pdf_key(company_id: Uuid, candidate_id: Uuid, filename: &str) -> String {
    let sanitized = sanitize_filename(filename);
    let stem = sanitized.rsplit_once('.').map(|(s, _)| s).unwrap_or(&sanitized);
    format!("cvs_pdf/{}/{}/{}.pdf", company_id, candidate_id, stem)
}

/// Retains alphanumerics, dot, underscore and hyphen; everything else
/// becomes an underscore.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_filename("alice_cv-2.pdf"), "alice_cv-2.pdf");
        assert_eq!(sanitize_filename("résumé final.docx"), "r_sum__final.docx");
        assert_eq!(sanitize_filename("../../etc/passwd"), ".._.._etc_passwd");
    }

    #[test]
    fn original_key_encodes_tenant_and_candidate() {
        let company = Uuid::new_v4();
        let candidate = Uuid::new_v4();
        let key = original_cv_key(company, candidate, "alice.pdf");
        assert_eq!(
            key,
            format!("cvs_original/{}/{}/alice.pdf", company, candidate)
        );
    }

    #[test]
    fn derived_key_swaps_extension_for_pdf() {
        let company = Uuid::new_v4();
        let candidate = Uuid::new_v4();
        let key = derived_pdf_key(company, candidate, "alice new.docx");
        assert_eq!(
            key,
            format!("cvs_pdf/{}/{}/alice_new.pdf", company, candidate)
        );
    }

    #[test]
    fn derived_key_handles_missing_extension() {
        let company = Uuid::new_v4();
        let candidate = Uuid::new_v4();
        let key = derived_pdf_key(company, candidate, "resume");
        assert_eq!(key, format!("cvs_pdf/{}/{}/resume.pdf", company, candidate));
    }
}
