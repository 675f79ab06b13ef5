use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use recon_engine::{
    db_types::{NewPaymentRequest, OrderId, PaymentRequestStatus},
    traits::PaymentStoreError,
    NoopAuditSink,
    PaymentStore,
    ReviewApi,
};

use super::{
    helpers::{access_tokens, api_get, api_post, json, send, TestEnv, WEBHOOK_TOKEN},
    mocks::MockPaymentBackend,
};
use crate::{
    routes::{PaymentForOrderRoute, ResolveAnomalyRoute},
    server::API_TOKEN_HEADER,
};

const ORDER_10: &str = r#"{"order_id":10,"user_id":3,"total_amount":150000,"payment_method":"BCA"}"#;

#[actix_web::test]
async fn operator_routes_need_the_api_token() {
    let env = TestEnv::new().await;
    env.seed_payment(1, "100").await;
    let (status, _) = env.call(TestRequest::get().uri("/api/v1/payment/1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    // The webhook token is not an api token
    let req = TestRequest::get().uri("/api/v1/payment/1").insert_header((API_TOKEN_HEADER, WEBHOOK_TOKEN));
    let (status, _) = env.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = env.call(api_get("/api/v1/payment/1")).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn create_invoice() {
    let env = TestEnv::new().await;
    let (status, body) = env.call(api_post("/api/v1/payment/invoice", ORDER_10)).await;
    assert_eq!(status, StatusCode::OK);
    let invoice = json(&body);
    assert_eq!(invoice["id"], "inv-10");
    assert_eq!(invoice["invoice_url"], "https://checkout.example.com/inv-10");
    assert_eq!(invoice["status"], "PENDING");
    let created = env.gateway.created_invoices();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].external_id.as_str(), "order-10");
    // One payment per order
    let (status, _) = env.call(api_post("/api/v1/payment/invoice", ORDER_10)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(env.gateway.created_invoices().len(), 1);
}

#[actix_web::test]
async fn create_invoice_failures() {
    let env = TestEnv::new().await;
    let body = r#"{"order_id":11,"user_id":3,"total_amount":0}"#;
    let (status, _) = env.call(api_post("/api/v1/payment/invoice", body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    env.gateway.reject_order(OrderId(10));
    let (status, body) = env.call(api_post("/api/v1/payment/invoice", ORDER_10)).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(json(&body)["error"].as_str().unwrap().contains("payment gateway"));
    assert!(env.db.fetch_payment_for_order(OrderId(10)).await.unwrap().is_none());
}

#[actix_web::test]
async fn order_created_opens_an_invoice() {
    let env = TestEnv::new().await;
    let (status, body) = env.call(api_post("/api/v1/orders/created", ORDER_10)).await;
    assert_eq!(status, StatusCode::OK);
    let outcome = json(&body);
    assert_eq!(outcome["result"], "invoice_created");
    assert_eq!(outcome["invoice"]["id"], "inv-10");
}

#[actix_web::test]
async fn order_created_is_queued_when_invoices_are_deferred() {
    let env = TestEnv::new().await.with_deferred_invoices();
    let (status, body) = env.call(api_post("/api/v1/orders/created", ORDER_10)).await;
    assert_eq!(status, StatusCode::OK);
    let outcome = json(&body);
    assert_eq!(outcome["result"], "queued");
    assert_eq!(outcome["payment_request"]["order_id"], 10);
    assert_eq!(outcome["payment_request"]["status"], "PENDING");
    assert!(env.gateway.created_invoices().is_empty());
}

#[actix_web::test]
async fn retry_failed_payment_requests() {
    let env = TestEnv::new().await;
    let request = NewPaymentRequest {
        order_id: OrderId(20),
        user_id: 4,
        amount: "5000".parse().unwrap(),
        user_email: None,
        payment_method: "OVO".into(),
    };
    let request = env.db.insert_payment_request(request).await.unwrap();
    assert!(env.db.mark_payment_request_failed(request.id, "gateway unreachable").await.unwrap());
    let (status, body) = env.call(api_post("/api/v1/payment_requests/retry_failed?limit=10", "")).await;
    assert_eq!(status, StatusCode::OK);
    let requeued = json(&body);
    assert_eq!(requeued["requeued"].as_array().unwrap().len(), 1);
    let pending = env.db.fetch_pending_payment_requests(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, PaymentRequestStatus::Pending);
    // Nothing left to requeue
    let (_, body) = env.call(api_post("/api/v1/payment_requests/retry_failed", "")).await;
    assert!(json(&body)["requeued"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn fetch_payment() {
    let env = TestEnv::new().await;
    env.seed_payment(5, "99.5").await;
    let (status, body) = env.call(api_get("/api/v1/payment/5")).await;
    assert_eq!(status, StatusCode::OK);
    let payment = json(&body);
    assert_eq!(payment["order_id"], 5);
    assert_eq!(payment["external_id"], "order-5");
    assert_eq!(payment["status"], "PENDING");
    let (status, _) = env.call(api_get("/api/v1/payment/6")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = env.call(api_get("/api/v1/payment/six")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn resolve_anomaly() {
    let env = TestEnv::new().await;
    env.seed_payment(3, "250000").await;
    let body = r#"{"external_id":"order-3","status":"PAID","amount":1}"#;
    let req = super::helpers::webhook_request(WEBHOOK_TOKEN, body);
    let (status, _) = env.call(req).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, body) = env.call(api_get("/api/v1/payment/3/anomalies")).await;
    let id = json(&body)[0]["id"].as_i64().unwrap();
    let path = format!("/api/v1/anomalies/{id}/resolve");
    let (status, body) = env.call(api_post(&path, r#"{"notes":"Customer refunded"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    let anomaly = json(&body);
    assert_eq!(anomaly["status"], "RESOLVED");
    assert!(anomaly["notes"].as_str().unwrap().contains("Customer refunded"));
    // Already resolved
    let (status, _) = env.call(api_post(&path, r#"{"notes":"again"}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = env.call(api_post(&path, r#"{"comment":"no notes field"}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn resolve_unknown_failed_event() {
    let env = TestEnv::new().await;
    let (status, _) = env.call(api_post("/api/v1/failed_events/77/resolve", r#"{"notes":"republished"}"#)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn store_errors_are_server_errors() {
    let _ = env_logger::try_init();
    let (status, body) = send(api_get("/api/v1/payment/1"), configure_failing_store).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json(&body)["error"].as_str().unwrap().contains("database is locked"));
}

#[actix_web::test]
async fn unauthorized_requests_never_reach_the_store() {
    let _ = env_logger::try_init();
    // The mock has no expectations, so any call into the store would panic
    let configure = |cfg: &mut ServiceConfig| configure_review(cfg, MockPaymentBackend::new());
    let (status, _) = send(TestRequest::get().uri("/api/v1/payment/1"), configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let req = TestRequest::post().uri("/api/v1/anomalies/1/resolve").set_json(serde_json::json!({"notes": "x"}));
    let (status, _) = send(req, configure).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn configure_failing_store(cfg: &mut ServiceConfig) {
    let mut store = MockPaymentBackend::new();
    store
        .expect_fetch_payment_for_order()
        .returning(|_| Err(PaymentStoreError::DatabaseError("database is locked".into())));
    configure_review(cfg, store);
}

fn configure_review(cfg: &mut ServiceConfig, store: MockPaymentBackend) {
    let review = ReviewApi::new(store, NoopAuditSink);
    let tokens = access_tokens();
    let scope = web::scope("/api")
        .wrap(crate::middleware::TokenAuthMiddlewareFactory::new(API_TOKEN_HEADER, tokens.api))
        .service(PaymentForOrderRoute::<MockPaymentBackend, NoopAuditSink>::new())
        .service(ResolveAnomalyRoute::<MockPaymentBackend, NoopAuditSink>::new());
    cfg.app_data(web::Data::new(review)).service(scope);
}
