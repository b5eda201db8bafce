use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use talenthub_backend::{
    config::{get_config, init_config},
    database::pool::create_pool,
    middleware::auth::require_bearer_auth,
    routes, AppState,
};
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    init_config()?;
    let config = get_config();

    let pool = create_pool().await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let app_state = AppState::new(pool).await;

    // Jobs claimed by a previous process that crashed mid-run go back to
    // the queue before the workers start.
    app_state.job_queue.requeue_stale().await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    for worker_id in 0..config.worker_concurrency {
        let state = app_state.clone();
        let queue = app_state.job_queue.clone();
        let rx = shutdown_rx.clone();
        tokio::spawn(async move {
            queue.worker_loop(state, rx, worker_id).await;
        });
    }

    let scheduler = JobScheduler::new().await?;
    {
        let state = app_state.clone();
        scheduler
            .add(Job::new_repeated_async(
                Duration::from_secs(60),
                move |_id, _lock| {
                    let state = state.clone();
                    Box::pin(async move {
                        match state.reminder_service.run_sweep(&state).await {
                            Ok(stats) => {
                                if stats.reminders_enqueued > 0
                                    || stats.proposals_expired > 0
                                    || stats.jobs_reclaimed > 0
                                {
                                    info!(
                                        reminders = stats.reminders_enqueued,
                                        expired = stats.proposals_expired,
                                        reclaimed = stats.jobs_reclaimed,
                                        "periodic sweep completed"
                                    );
                                }
                            }
                            Err(e) => tracing::error!(error = ?e, "periodic sweep failed"),
                        }
                    })
                },
            )?)
            .await?;
    }
    scheduler.start().await?;

    // Candidate email links resolve without authentication; everything else
    // under /api requires a recruiter token.
    let token_api = Router::new()
        .route(
            "/api/interviews/confirm/:token",
            get(routes::interview_routes::confirm_by_token),
        )
        .route(
            "/api/interviews/reject/:token",
            get(routes::interview_routes::reject_by_token),
        )
        .route(
            "/api/interviews/cancel/:token",
            get(routes::interview_routes::cancel_by_token),
        );

    let recruiter_api = Router::new()
        .route("/api/candidates/upload", post(routes::upload::upload_cv))
        .route(
            "/api/candidates/:id",
            get(routes::candidate_routes::get_candidate)
                .delete(routes::candidate_routes::delete_candidate),
        )
        .route(
            "/api/candidates/:id/status",
            post(routes::candidate_routes::update_candidate_status),
        )
        .route(
            "/api/candidates/:id/history",
            get(routes::candidate_routes::get_candidate_history),
        )
        .route(
            "/api/candidates/:id/cv",
            get(routes::candidate_routes::download_cv),
        )
        .route("/api/interviews", post(routes::interview_routes::create_interview))
        .route(
            "/api/interviews/:id",
            get(routes::interview_routes::get_interview),
        )
        .route(
            "/api/interviews/:id/cancel",
            post(routes::interview_routes::recruiter_cancel),
        )
        .route(
            "/api/interviews/:id/evaluation",
            post(routes::interview_routes::evaluate_interview),
        )
        .route(
            "/api/interviews/:id/repropose",
            post(routes::interview_routes::repropose_interview),
        )
        .route_layer(axum::middleware::from_fn(require_bearer_auth));

    let app = Router::new()
        .route("/health", get(routes::health::health))
        .merge(token_api)
        .merge(recruiter_api)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes + 64 * 1024));

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
