use std::env;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    routing::get,
    Extension, Json, Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value as JsonValue};
use talenthub_backend::middleware::auth::{require_bearer_auth, Claims};
use tower::ServiceExt;
use uuid::Uuid;

fn ensure_config() {
    env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
    env::set_var("DATABASE_URL", "postgres://localhost/talenthub_test");
    env::set_var("JWT_SECRET", "test_secret_key");
    env::set_var("S3_BUCKET", "talenthub-test");
    env::set_var("S3_REGION", "eu-central-1");
    env::set_var("FRONTEND_URL", "https://app.example.com");
    // other tests in this binary may have initialized it already
    let _ = talenthub_backend::config::init_config();
}

async fn whoami(Extension(claims): Extension<Claims>) -> Json<JsonValue> {
    Json(json!({
        "sub": claims.sub,
        "company_id": claims.company_id,
    }))
}

fn protected_app() -> Router {
    Router::new()
        .route("/api/whoami", get(whoami))
        .route_layer(axum::middleware::from_fn(require_bearer_auth))
        .route("/health", get(talenthub_backend::routes::health::health))
}

fn sign_token(secret: &str, company_id: Uuid) -> String {
    let claims = Claims {
        sub: Uuid::new_v4().to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
        role: Some("recruiter".to_string()),
        company_id,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("sign token")
}

#[tokio::test]
async fn health_is_open() {
    ensure_config();
    let app = protected_app();
    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_token_is_rejected() {
    ensure_config();
    let app = protected_app();
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/whoami")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_token_is_rejected() {
    ensure_config();
    let app = protected_app();
    let token = sign_token("some_other_secret", Uuid::new_v4());
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/whoami")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn valid_token_reaches_the_handler_with_claims() {
    ensure_config();
    let app = protected_app();
    let company_id = Uuid::new_v4();
    let token = sign_token("test_secret_key", company_id);
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/whoami")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json: JsonValue = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["company_id"], json!(company_id));
}

#[tokio::test]
async fn basic_scheme_is_rejected() {
    ensure_config();
    let app = protected_app();
    let res = app
        .oneshot(
            Request::builder()
                .uri("/api/whoami")
                .header("Authorization", "Basic dXNlcjpwYXNz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}
