use std::time::Duration;

use actix_web::{
    dev::Server,
    error::{JsonPayloadError, PathError, QueryPayloadError},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpRequest,
    HttpServer,
};
use log::*;
use recon_common::Secret;
use recon_engine::{
    traits::{AuditSink, EventPublisher, InvoiceGateway, PaymentStore},
    ReviewApi,
    SettlementApi,
    SqliteDatabase,
    WebhookApi,
};

use crate::{
    config::{OperatorOptions, ServerConfig},
    errors::ServerError,
    integrations::{alerts::create_alert_event_handlers, event_bus::KafkaRestPublisher, xendit::XenditGateway},
    middleware::TokenAuthMiddlewareFactory,
    routes::{
        health,
        ping,
        AnomaliesForOrderRoute,
        CreateInvoiceRoute,
        FailedEventsForOrderRoute,
        OrderCreatedRoute,
        PaymentForOrderRoute,
        PaymentWebhookRoute,
        ResolveAnomalyRoute,
        ResolveFailedEventRoute,
        RetryFailedRequestsRoute,
    },
    workers::{start_workers, Audit, ServerInvoiceApi, ServerReconciliationApi},
};

pub const CALLBACK_TOKEN_HEADER: &str = "x-callback-token";
pub const API_TOKEN_HEADER: &str = "x-api-token";

type ServerWebhookApi = WebhookApi<SqliteDatabase, KafkaRestPublisher, Audit>;
type ServerReviewApi = ReviewApi<SqliteDatabase, Audit>;

/// Everything the request handlers need. Cheap to clone; each actix worker gets its own copy.
#[derive(Clone)]
pub struct ServerApis {
    pub webhooks: ServerWebhookApi,
    pub invoices: ServerInvoiceApi,
    pub review: ServerReviewApi,
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not connect to the database. {e}")))?;
    db.run_migrations()
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not migrate the database. {e}")))?;
    let gateway = XenditGateway::new(config.xendit.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let publisher =
        KafkaRestPublisher::new(&config.event_bus).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_alert_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let audit: Audit = config.audit_log_enabled.then(|| db.clone());
    let settlement = SettlementApi::new(db.clone(), publisher, audit.clone())
        .with_retry_policy(config.retry_policy())
        .with_producers(producers);
    let invoices = ServerInvoiceApi::new(db.clone(), gateway.clone(), audit.clone())
        .with_deadline(config.xendit.timeout)
        .with_deferred_invoice_creation(config.defer_invoice_creation);
    let reconciliation = ServerReconciliationApi::new(gateway, settlement.clone()).with_deadline(config.xendit.timeout);
    let apis = ServerApis {
        webhooks: WebhookApi::new(settlement),
        invoices: invoices.clone(),
        review: ReviewApi::new(db.clone(), audit),
    };

    let workers = start_workers(&config, invoices, reconciliation)?;
    info!("🚀️ {} background workers started", workers.count());
    let srv = create_server_instance(config, apis)?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    info!("🚀️ Server has stopped. Shutting down background workers.");
    workers.shutdown().await;
    db.close().await;
    result
}

pub fn create_server_instance(config: ServerConfig, apis: ServerApis) -> Result<Server, ServerError> {
    let operator_options = OperatorOptions::from_config(&config);
    let tokens = AccessTokens { webhook: config.webhook_token.clone(), api: config.api_token.clone() };
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("recon::access_log"))
            .configure(configure_error_handlers)
            .app_data(web::Data::new(apis.webhooks.clone()))
            .app_data(web::Data::new(apis.invoices.clone()))
            .app_data(web::Data::new(apis.review.clone()))
            .app_data(web::Data::new(operator_options))
            .configure(|cfg| {
                configure_routes::<SqliteDatabase, KafkaRestPublisher, XenditGateway, Audit>(cfg, tokens.clone())
            })
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// The shared secrets that callers must present.
#[derive(Clone, Debug, Default)]
pub struct AccessTokens {
    /// Expected in `x-callback-token` on gateway callbacks.
    pub webhook: Secret<String>,
    /// Expected in `x-api-token` on every `/api` route.
    pub api: Secret<String>,
}

/// Registers every route. The API objects the handlers use must already be in the app data.
pub fn configure_routes<B, P, G, A>(cfg: &mut web::ServiceConfig, tokens: AccessTokens)
where
    B: PaymentStore + 'static,
    P: EventPublisher + 'static,
    G: InvoiceGateway + 'static,
    A: AuditSink + 'static,
{
    let webhook_scope = web::scope("/v1/payment")
        .wrap(TokenAuthMiddlewareFactory::new(CALLBACK_TOKEN_HEADER, tokens.webhook))
        .service(PaymentWebhookRoute::<B, P, A>::new());
    let api_scope = web::scope("/api")
        .wrap(TokenAuthMiddlewareFactory::new(API_TOKEN_HEADER, tokens.api))
        .service(CreateInvoiceRoute::<B, G, A>::new())
        .service(OrderCreatedRoute::<B, G, A>::new())
        .service(RetryFailedRequestsRoute::<B, G, A>::new())
        .service(AnomaliesForOrderRoute::<B, A>::new())
        .service(FailedEventsForOrderRoute::<B, A>::new())
        .service(PaymentForOrderRoute::<B, A>::new())
        .service(ResolveAnomalyRoute::<B, A>::new())
        .service(ResolveFailedEventRoute::<B, A>::new());
    cfg.service(health).service(ping).service(webhook_scope).service(api_scope);
}

/// Bad JSON bodies, paths and query strings are reported as JSON `400`s, like every other error.
pub fn configure_error_handlers(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .app_data(web::QueryConfig::default().error_handler(query_error));
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("💻️ Rejected request body. {err}");
    ServerError::InvalidRequestBody(err.to_string()).into()
}

fn path_error(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    ServerError::InvalidRequestPath(err.to_string()).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    ServerError::InvalidRequestPath(err.to_string()).into()
}
