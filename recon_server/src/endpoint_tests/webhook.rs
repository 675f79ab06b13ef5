use actix_web::http::StatusCode;
use recon_engine::{
    db_types::{OrderId, PaymentStatus},
    test_utils::fakes::ScriptedPublisher,
    PaymentStore,
};

use super::helpers::{api_get, json, webhook_request, TestEnv, WEBHOOK_TOKEN};

const PAID_1: &str = r#"{"external_id":"order-1","status":"PAID","amount":250000}"#;

#[actix_web::test]
async fn webhook_without_token() {
    let env = TestEnv::new().await;
    env.seed_payment(1, "250000").await;
    let (status, body) = env.call(webhook_request("", PAID_1)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json(&body)["error"], "Missing or invalid access token");
    let (status, _) = env.call(webhook_request("not-the-token", PAID_1)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // Nothing was touched
    assert_eq!(env.publisher.attempts(), 0);
    let payment = env.db.fetch_payment_for_order(OrderId(1)).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
}

#[actix_web::test]
async fn webhook_with_unreadable_body() {
    let env = TestEnv::new().await;
    let (status, body) = env.call(webhook_request(WEBHOOK_TOKEN, r#"{"external_id": 12"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn webhook_with_malformed_reference() {
    let env = TestEnv::new().await;
    let (status, body) =
        env.call(webhook_request(WEBHOOK_TOKEN, r#"{"external_id":"inv-1","status":"PAID","amount":10}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().contains("inv-1"));
    assert_eq!(env.publisher.attempts(), 0);
}

#[actix_web::test]
async fn paid_webhook_settles_the_payment_once() {
    let env = TestEnv::new().await;
    env.seed_payment(1, "250000").await;
    let (status, body) = env.call(webhook_request(WEBHOOK_TOKEN, PAID_1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), serde_json::json!({"message": "webhook processed"}));
    let payment = env.db.fetch_payment_for_order(OrderId(1)).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(env.publisher.published().len(), 1);
    // A duplicate delivery is acknowledged, but nothing is announced a second time
    let (status, _) = env.call(webhook_request(WEBHOOK_TOKEN, PAID_1)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(env.publisher.published().len(), 1);
}

#[actix_web::test]
async fn non_final_statuses_are_acknowledged() {
    let env = TestEnv::new().await;
    env.seed_payment(2, "100").await;
    for status in ["PENDING", "FAILED", "REFUNDED"] {
        let body = format!(r#"{{"external_id":"order-2","status":"{status}"}}"#);
        let (code, _) = env.call(webhook_request(WEBHOOK_TOKEN, &body)).await;
        assert_eq!(code, StatusCode::OK, "{status}");
    }
    let payment = env.db.fetch_payment_for_order(OrderId(2)).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    assert_eq!(env.publisher.attempts(), 0);
}

#[actix_web::test]
async fn webhook_amount_mismatch_is_quarantined() {
    let env = TestEnv::new().await;
    env.seed_payment(3, "250000").await;
    let body = r#"{"external_id":"order-3","status":"PAID","amount":249000}"#;
    let (status, _) = env.call(webhook_request(WEBHOOK_TOKEN, body)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let payment = env.db.fetch_payment_for_order(OrderId(3)).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    let (status, body) = env.call(api_get("/api/v1/payment/3/anomalies")).await;
    assert_eq!(status, StatusCode::OK);
    let anomalies = json(&body);
    assert_eq!(anomalies.as_array().unwrap().len(), 1);
    assert_eq!(anomalies[0]["anomaly_type"], "INVALID_AMOUNT");
    assert_eq!(anomalies[0]["status"], "NEEDS_REVIEW");
}

#[actix_web::test]
async fn webhook_for_unknown_payment() {
    let env = TestEnv::new().await;
    let body = r#"{"external_id":"order-404","status":"PAID","amount":10}"#;
    let (status, _) = env.call(webhook_request(WEBHOOK_TOKEN, body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn webhook_publish_failure() {
    let env = TestEnv::new().await.with_publisher(ScriptedPublisher::new().always_fail());
    env.seed_payment(1, "250000").await;
    let (status, _) = env.call(webhook_request(WEBHOOK_TOKEN, PAID_1)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(env.publisher.attempts(), 3);
    // The announcement is part of settlement, so the payment stays PENDING for the next webhook or poll
    let payment = env.db.fetch_payment_for_order(OrderId(1)).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Pending);
    let (status, body) = env.call(api_get("/api/v1/payment/1/failed_events")).await;
    assert_eq!(status, StatusCode::OK);
    let events = json(&body);
    assert_eq!(events.as_array().unwrap().len(), 1);
    assert_eq!(events[0]["status"], "NEEDS_REVIEW");
}

#[actix_web::test]
async fn webhook_paid_after_expiry() {
    let env = TestEnv::new().await;
    env.seed_payment(1, "250000").await;
    let expired = env.db.expire_overdue_payments(chrono::Utc::now() + chrono::Duration::days(2)).await.unwrap();
    assert_eq!(expired.len(), 1);
    let (status, _) = env.call(webhook_request(WEBHOOK_TOKEN, PAID_1)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(env.publisher.attempts(), 0);
    let payment = env.db.fetch_payment_for_order(OrderId(1)).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Expired);
    let (status, body) = env.call(api_get("/api/v1/payment/1/anomalies")).await;
    assert_eq!(status, StatusCode::OK);
    let anomalies = json(&body);
    assert_eq!(anomalies.as_array().unwrap().len(), 1);
    assert_eq!(anomalies[0]["anomaly_type"], "PAID_AFTER_CLOSE");
    assert_eq!(anomalies[0]["status"], "NEEDS_REVIEW");
}
