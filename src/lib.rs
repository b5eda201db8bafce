pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    candidate_service::CandidateService, conversion_service::ConversionService,
    ingestion_service::IngestionService, interview_service::InterviewService,
    job_service::JobQueue, notification_service::NotificationService,
    parser_service::ParserService, reminder_service::ReminderService,
    storage_service::StorageService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub storage_service: StorageService,
    pub parser_service: ParserService,
    pub candidate_service: CandidateService,
    pub ingestion_service: IngestionService,
    pub conversion_service: ConversionService,
    pub interview_service: InterviewService,
    pub notification_service: NotificationService,
    pub reminder_service: ReminderService,
    pub job_queue: JobQueue,
}

impl AppState {
    pub async fn new(pool: PgPool) -> Self {
        let storage_service = StorageService::from_config().await;
        let parser_service = ParserService::new(storage_service.clone());
        let candidate_service = CandidateService::new(pool.clone());
        let ingestion_service = IngestionService::new(pool.clone());
        let conversion_service = ConversionService::new(pool.clone());
        let interview_service = InterviewService::new(pool.clone());
        let notification_service = NotificationService::new(pool.clone());
        let reminder_service = ReminderService::new(pool.clone());
        let job_queue = JobQueue::new(pool.clone());

        Self {
            pool,
            storage_service,
            parser_service,
            candidate_service,
            ingestion_service,
            conversion_service,
            interview_service,
            notification_service,
            reminder_service,
            job_queue,
        }
    }
}
