pub mod candidate_service;
pub mod conversion_service;
pub mod ingestion_service;
pub mod interview_service;
pub mod job_service;
pub mod notification_service;
pub mod parser_service;
pub mod reminder_service;
pub mod storage_service;
