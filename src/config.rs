use crate::error::{Error, Result};
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout_seconds: u64,
    pub jwt_secret: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint_url: Option<String>,
    pub textkernel_base_endpoint: String,
    pub textkernel_api_key: String,
    pub textkernel_account_id: String,
    pub textkernel_enabled: bool,
    pub frontend_url: String,
    pub local_timezone: String,
    pub min_reminder_lead_time_minutes: i64,
    pub max_reminder_lead_time_minutes: i64,
    pub max_upload_bytes: usize,
    pub worker_concurrency: usize,
    pub confirmation_token_ttl_days: i64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 50)?,
            database_acquire_timeout_seconds: get_env_parse_or("DATABASE_ACQUIRE_TIMEOUT_SECONDS", 30)?,
            jwt_secret: get_env("JWT_SECRET")?,
            s3_bucket: get_env("S3_BUCKET")?,
            s3_region: get_env("S3_REGION")?,
            s3_endpoint_url: env::var("S3_ENDPOINT_URL").ok(),
            textkernel_base_endpoint: env::var("TEXTKERNEL_BASE_ENDPOINT").unwrap_or_default(),
            textkernel_api_key: env::var("TEXTKERNEL_API_KEY").unwrap_or_default(),
            textkernel_account_id: env::var("TEXTKERNEL_ACCOUNT_ID").unwrap_or_default(),
            textkernel_enabled: env::var("TEXTKERNEL_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            frontend_url: get_env("FRONTEND_URL")?,
            local_timezone: env::var("LOCAL_TIMEZONE").unwrap_or_else(|_| "UTC".to_string()),
            min_reminder_lead_time_minutes: get_env_parse_or("MIN_INTERVIEW_REMINDER_LEAD_TIME", 5)?,
            max_reminder_lead_time_minutes: get_env_parse_or("MAX_INTERVIEW_REMINDER_LEAD_TIME", 2880)?,
            max_upload_bytes: get_env_parse_or("MAX_UPLOAD_BYTES", 16 * 1024 * 1024)?,
            worker_concurrency: get_env_parse_or("WORKER_CONCURRENCY", 4)?,
            confirmation_token_ttl_days: get_env_parse_or("CONFIRMATION_TOKEN_TTL_DAYS", 14)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
