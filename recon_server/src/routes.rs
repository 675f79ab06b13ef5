//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here awaits the engine, which does its I/O
//! asynchronously, so workers are never blocked.
//!
//! Authentication is applied per scope in [`crate::server`]: the webhook scope checks `x-callback-token`, and the
//! `/api` scope checks `x-api-token`.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use recon_engine::{
    db_types::{AuditActor, NewPaymentRequest, OrderId},
    events::OrderCreatedEvent,
    traits::{AuditSink, EventPublisher, InvoiceGateway, PaymentStore},
    InvoiceApi,
    ReviewApi,
    WebhookApi,
    WebhookOutcome,
    WebhookPayload,
};

use crate::{
    config::OperatorOptions,
    data_objects::{
        InvoiceResponse,
        MessageResponse,
        OrderIntakeResponse,
        ResolveParams,
        RetryFailedParams,
        RetryFailedResponse,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️")
}

#[get("/ping")]
pub async fn ping() -> impl Responder {
    trace!("💻️ Received ping");
    HttpResponse::Ok().json(MessageResponse::new("pong"))
}

//----------------------------------------------   Webhook  ----------------------------------------------------
route!(payment_webhook => Post "/webhook" impl PaymentStore, EventPublisher, AuditSink);
/// Route handler for gateway payment notifications.
///
/// The gateway calls this endpoint whenever an invoice changes state. The body is `{external_id, status, amount}`,
/// where `external_id` is `order-<order id>`. Duplicate deliveries, non-final and unknown statuses are acknowledged
/// with a 200 so that the gateway stops retrying them. Anything the gateway should retry (or an operator should look
/// at) is an error response.
pub async fn payment_webhook<B, P, A>(
    body: web::Json<WebhookPayload>,
    api: web::Data<WebhookApi<B, P, A>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    P: EventPublisher,
    A: AuditSink,
{
    let payload = body.into_inner();
    debug!("💻️ Received payment webhook for {} with status {}", payload.external_id, payload.status);
    let outcome = api.handle_notification(payload).await.map_err(|e| {
        warn!("💻️ Payment webhook could not be processed. {e}");
        ServerError::from(e)
    })?;
    match &outcome {
        WebhookOutcome::Settled(p) => info!("💻️ Payment webhook settled order {}", p.order_id),
        WebhookOutcome::AlreadyPaid(p) => debug!("💻️ Order {} was already paid", p.order_id),
        WebhookOutcome::Ignored(id, status) => debug!("💻️ Ignored {status} notification for order {id}"),
        WebhookOutcome::Unrecognized(id, status) => warn!("💻️ Unrecognized status {status} for order {id}"),
    }
    Ok(HttpResponse::Ok().json(MessageResponse::new("webhook processed")))
}

//----------------------------------------------   Invoices  ----------------------------------------------------
route!(create_invoice => Post "/v1/payment/invoice" impl PaymentStore, InvoiceGateway, AuditSink);
/// Opens an invoice for an order straight away, bypassing the payment request queue.
///
/// Returns the gateway's invoice id, the checkout URL and the payment status.
pub async fn create_invoice<B, G, A>(
    body: web::Json<OrderCreatedEvent>,
    api: web::Data<InvoiceApi<B, G, A>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: InvoiceGateway,
    A: AuditSink,
{
    let request = NewPaymentRequest::from(body.into_inner());
    debug!("💻️ POST create invoice for order {}", request.order_id);
    let payment = api.create_invoice(&request, AuditActor::PaymentService).await.map_err(|e| {
        warn!("💻️ Could not create invoice for order {}. {e}", request.order_id);
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(InvoiceResponse::from(payment)))
}

route!(order_created => Post "/v1/orders/created" impl PaymentStore, InvoiceGateway, AuditSink);
/// Accepts an order-created event over HTTP. It is handled exactly as if it had arrived on the event bus.
pub async fn order_created<B, G, A>(
    body: web::Json<OrderCreatedEvent>,
    api: web::Data<InvoiceApi<B, G, A>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: InvoiceGateway,
    A: AuditSink,
{
    let event = body.into_inner();
    debug!("💻️ POST order created for order {}", event.order_id);
    let outcome = api.handle_order_created(event).await?;
    Ok(HttpResponse::Ok().json(OrderIntakeResponse::from(outcome)))
}

route!(retry_failed_requests => Post "/v1/payment_requests/retry_failed" impl PaymentStore, InvoiceGateway, AuditSink);
/// Moves FAILED payment requests that are still under the retry ceiling back to PENDING, so that the drain worker
/// picks them up again. Use `?limit=n` to cap the number of requests that are requeued.
pub async fn retry_failed_requests<B, G, A>(
    query: web::Query<RetryFailedParams>,
    api: web::Data<InvoiceApi<B, G, A>>,
    options: web::Data<OperatorOptions>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    G: InvoiceGateway,
    A: AuditSink,
{
    let limit = query.limit.unwrap_or(options.requeue_limit);
    debug!("💻️ POST retry failed payment requests (limit {limit})");
    let requeued = api.requeue_failed_payment_requests(limit, options.max_request_retries).await?;
    Ok(HttpResponse::Ok().json(RetryFailedResponse { requeued }))
}

//----------------------------------------------   Review  ----------------------------------------------------
route!(payment_for_order => Get "/v1/payment/{order_id}" impl PaymentStore, AuditSink);
pub async fn payment_for_order<B, A>(
    path: web::Path<i64>,
    api: web::Data<ReviewApi<B, A>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    A: AuditSink,
{
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET payment for order {order_id}");
    let payment = api
        .payment_for_order(order_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No payment exists for order {order_id}")))?;
    Ok(HttpResponse::Ok().json(payment))
}

route!(anomalies_for_order => Get "/v1/payment/{order_id}/anomalies" impl PaymentStore, AuditSink);
pub async fn anomalies_for_order<B, A>(
    path: web::Path<i64>,
    api: web::Data<ReviewApi<B, A>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    A: AuditSink,
{
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET anomalies for order {order_id}");
    let anomalies = api.anomalies_for_order(order_id).await?;
    Ok(HttpResponse::Ok().json(anomalies))
}

route!(failed_events_for_order => Get "/v1/payment/{order_id}/failed_events" impl PaymentStore, AuditSink);
pub async fn failed_events_for_order<B, A>(
    path: web::Path<i64>,
    api: web::Data<ReviewApi<B, A>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    A: AuditSink,
{
    let order_id = OrderId(path.into_inner());
    debug!("💻️ GET failed events for order {order_id}");
    let events = api.failed_events_for_order(order_id).await?;
    Ok(HttpResponse::Ok().json(events))
}

route!(resolve_anomaly => Post "/v1/anomalies/{id}/resolve" impl PaymentStore, AuditSink);
/// Marks an anomaly as reviewed. The operator's notes are appended to the anomaly record.
pub async fn resolve_anomaly<B, A>(
    path: web::Path<i64>,
    body: web::Json<ResolveParams>,
    api: web::Data<ReviewApi<B, A>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    A: AuditSink,
{
    let id = path.into_inner();
    debug!("💻️ POST resolve anomaly #{id}");
    let anomaly = api
        .resolve_anomaly(id, &body.notes)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No unresolved anomaly with id {id}")))?;
    Ok(HttpResponse::Ok().json(anomaly))
}

route!(resolve_failed_event => Post "/v1/failed_events/{id}/resolve" impl PaymentStore, AuditSink);
/// Marks a failed event as reviewed, typically after the announcement has been republished by hand.
pub async fn resolve_failed_event<B, A>(
    path: web::Path<i64>,
    body: web::Json<ResolveParams>,
    api: web::Data<ReviewApi<B, A>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentStore,
    A: AuditSink,
{
    let id = path.into_inner();
    debug!("💻️ POST resolve failed event #{id}");
    let event = api
        .resolve_failed_event(id, &body.notes)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("No unresolved failed event with id {id}")))?;
    Ok(HttpResponse::Ok().json(event))
}
