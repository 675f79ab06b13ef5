use actix_web::{http::StatusCode, test::TestRequest, web::ServiceConfig};

use super::helpers::{json, send};
use crate::routes::{health, ping};

fn configure(cfg: &mut ServiceConfig) {
    cfg.service(health).service(ping);
}

#[actix_web::test]
async fn health_check() {
    let _ = env_logger::try_init();
    let (status, body) = send(TestRequest::get().uri("/health"), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️");
}

#[actix_web::test]
async fn ping_pong() {
    let (status, body) = send(TestRequest::get().uri("/ping"), configure).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!({"message": "pong"}));
}
