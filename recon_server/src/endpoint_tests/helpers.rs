use std::time::Duration;

use actix_web::{
    body::to_bytes,
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use log::debug;
use recon_common::Secret;
use recon_engine::{
    db_types::{Amount, NewPayment, OrderId, Payment},
    helpers::RetryPolicy,
    test_utils::{
        fakes::{FakeGateway, ScriptedPublisher},
        prepare_env::new_test_database,
    },
    InvoiceApi,
    PaymentStore,
    ReviewApi,
    SettlementApi,
    SqliteDatabase,
    WebhookApi,
};

use crate::{
    config::OperatorOptions,
    server::{configure_error_handlers, configure_routes, AccessTokens, API_TOKEN_HEADER, CALLBACK_TOKEN_HEADER},
};

pub const WEBHOOK_TOKEN: &str = "test-callback-token";
pub const API_TOKEN: &str = "test-api-token";

pub fn access_tokens() -> AccessTokens {
    AccessTokens { webhook: Secret::new(WEBHOOK_TOKEN.to_string()), api: Secret::new(API_TOKEN.to_string()) }
}

/// A real (temporary) database behind the full route table, with the gateway and the event bus faked out.
#[derive(Clone)]
pub struct TestEnv {
    pub db: SqliteDatabase,
    pub publisher: ScriptedPublisher,
    pub gateway: FakeGateway,
    pub defer_invoice_creation: bool,
}

impl TestEnv {
    pub async fn new() -> Self {
        let _ = env_logger::try_init();
        let db = new_test_database().await;
        Self { db, publisher: ScriptedPublisher::new(), gateway: FakeGateway::new(), defer_invoice_creation: false }
    }

    pub fn with_publisher(mut self, publisher: ScriptedPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn with_deferred_invoices(mut self) -> Self {
        self.defer_invoice_creation = true;
        self
    }

    pub fn configure(&self, cfg: &mut ServiceConfig) {
        let audit = Some(self.db.clone());
        let settlement = SettlementApi::new(self.db.clone(), self.publisher.clone(), audit.clone())
            .with_retry_policy(RetryPolicy::new(3, Duration::from_millis(1)));
        let invoices = InvoiceApi::new(self.db.clone(), self.gateway.clone(), audit.clone())
            .with_deferred_invoice_creation(self.defer_invoice_creation);
        cfg.app_data(web::Data::new(WebhookApi::new(settlement)))
            .app_data(web::Data::new(invoices))
            .app_data(web::Data::new(ReviewApi::new(self.db.clone(), audit)))
            .app_data(web::Data::new(OperatorOptions::default()));
        configure_routes::<SqliteDatabase, ScriptedPublisher, FakeGateway, Option<SqliteDatabase>>(
            cfg,
            access_tokens(),
        );
    }

    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let env = self.clone();
        send(req, move |cfg| env.configure(cfg)).await
    }

    /// Stores a PENDING payment for `order_id` with an invoice that expires in a day.
    pub async fn seed_payment(&self, order_id: i64, amount: &str) -> Payment {
        let amount = amount.parse::<Amount>().expect("Not a valid amount");
        let expires = Utc::now() + chrono::Duration::hours(24);
        let payment = NewPayment::new(OrderId(order_id), 1000 + order_id, amount).with_invoice(
            format!("inv-{order_id}"),
            format!("https://checkout.example.com/inv-{order_id}"),
            expires,
        );
        self.db.insert_payment(payment).await.expect("Error inserting payment")
    }
}

pub fn webhook_request(token: &str, body: &str) -> TestRequest {
    let mut req = TestRequest::post().uri("/v1/payment/webhook").insert_header(("content-type", "application/json"));
    if !token.is_empty() {
        req = req.insert_header((CALLBACK_TOKEN_HEADER, token));
    }
    req.set_payload(body.to_string())
}

pub fn api_get(path: &str) -> TestRequest {
    TestRequest::get().uri(path).insert_header((API_TOKEN_HEADER, API_TOKEN))
}

pub fn api_post(path: &str, body: &str) -> TestRequest {
    TestRequest::post()
        .uri(path)
        .insert_header((API_TOKEN_HEADER, API_TOKEN))
        .insert_header(("content-type", "application/json"))
        .set_payload(body.to_string())
}

/// Runs a single request through an app built by `configure`. Errors raised by middleware are rendered the same way
/// actix would render them for a real client.
pub async fn send<F>(req: TestRequest, configure: F) -> (StatusCode, String)
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().configure(configure_error_handlers).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    match test::try_call_service(&service, req.to_request()).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.error_response();
            let status = res.status();
            let body = to_bytes(res.into_body()).await.map(|b| b.to_vec()).unwrap_or_default();
            (status, String::from_utf8_lossy(&body).into_owned())
        },
    }
}

pub fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).unwrap_or_else(|e| panic!("Response was not JSON ({e}): {body}"))
}
