//! Event bus access through a Kafka REST proxy (API v2, JSON embedded format).
//!
//! * [`KafkaRestPublisher`] announces settled payments on the payment-success topic, keyed by the order's external id.
//! * [`OrderCreatedConsumer`] is a [`ScheduledJob`] that reads the order-created topic through a REST proxy consumer
//!   instance and hands each order to the [`InvoiceApi`].
use std::{sync::Arc, time::Duration};

use log::*;
use recon_engine::{
    events::{OrderCreatedEvent, PaymentSuccessEvent},
    traits::{AuditSink, EventPublisher, InvoiceGateway, PaymentStore, PublishError},
    InvoiceApi,
    ScheduledJob,
};
use reqwest::{
    header::{ACCEPT, CONTENT_TYPE},
    Client,
    RequestBuilder,
    Response,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::EventBusConfig;

const KAFKA_JSON_V2: &str = "application/vnd.kafka.json.v2+json";
const KAFKA_V2: &str = "application/vnd.kafka.v2+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum EventBusError {
    #[error("Could not initialize the REST proxy client. {0}")]
    Initialization(String),
    #[error("The REST proxy is unreachable. {0}")]
    Unreachable(String),
    #[error("The REST proxy rejected the request. Status {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("The REST proxy sent a response we could not understand. {0}")]
    InvalidResponse(String),
}

impl From<EventBusError> for PublishError {
    fn from(e: EventBusError) -> Self {
        match e {
            EventBusError::Initialization(s) | EventBusError::Unreachable(s) => PublishError::Unreachable(s),
            EventBusError::Rejected { status, message } => PublishError::Rejected { status, message },
            EventBusError::InvalidResponse(s) => PublishError::InvalidResponse(s),
        }
    }
}

//--------------------------------------   KafkaRestClient   ---------------------------------------------------------
#[derive(Clone)]
pub struct KafkaRestClient {
    url: String,
    client: Arc<Client>,
}

impl KafkaRestClient {
    pub fn new(url: &str) -> Result<Self, EventBusError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EventBusError::Initialization(e.to_string()))?;
        Ok(Self { url: url.trim_end_matches('/').to_string(), client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, EventBusError> {
        let response = req.send().await.map_err(|e| EventBusError::Unreachable(e.to_string()))?;
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| EventBusError::Unreachable(e.to_string()))?;
            Err(EventBusError::Rejected { status, message })
        }
    }

    /// Produces `records` to `topic`. Fails if the proxy reports an error for any record.
    pub async fn produce(&self, topic: &str, records: Vec<ProducerRecord>) -> Result<(), EventBusError> {
        let url = self.url(&format!("/topics/{topic}"));
        let body = json!({ "records": records });
        let req = self.client.post(url).header(CONTENT_TYPE, KAFKA_JSON_V2).json(&body);
        let response: ProduceResponse =
            self.send(req).await?.json().await.map_err(|e| EventBusError::InvalidResponse(e.to_string()))?;
        match response.offsets.iter().find_map(|o| o.error.clone()) {
            Some(error) => Err(EventBusError::InvalidResponse(error)),
            None => Ok(()),
        }
    }

    /// Creates a consumer instance in `group` and subscribes it to `topic`.
    pub async fn create_consumer(&self, group: &str, topic: &str) -> Result<ConsumerInstance, EventBusError> {
        let url = self.url(&format!("/consumers/{group}"));
        let body = json!({ "format": "json", "auto.offset.reset": "earliest", "auto.commit.enable": "false" });
        let req = self.client.post(url).header(CONTENT_TYPE, KAFKA_V2).json(&body);
        let instance: ConsumerInstance =
            self.send(req).await?.json().await.map_err(|e| EventBusError::InvalidResponse(e.to_string()))?;
        let url = format!("{}/subscription", instance.base_uri);
        let req = self.client.post(url).header(CONTENT_TYPE, KAFKA_V2).json(&json!({ "topics": [topic] }));
        self.send(req).await?;
        info!("📣️ Consumer {} in group {group} subscribed to {topic}", instance.instance_id);
        Ok(instance)
    }

    pub async fn fetch_records(&self, instance: &ConsumerInstance) -> Result<Vec<ConsumerRecord>, EventBusError> {
        let url = format!("{}/records", instance.base_uri);
        let req = self.client.get(url).header(ACCEPT, KAFKA_JSON_V2);
        self.send(req).await?.json().await.map_err(|e| EventBusError::InvalidResponse(e.to_string()))
    }

    /// Commits the offsets of every record fetched so far by the instance.
    pub async fn commit_offsets(&self, instance: &ConsumerInstance) -> Result<(), EventBusError> {
        let url = format!("{}/offsets", instance.base_uri);
        let req = self.client.post(url).header(CONTENT_TYPE, KAFKA_V2);
        self.send(req).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerRecord {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<ProduceOffset>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProduceOffset {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerInstance {
    pub instance_id: String,
    pub base_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerRecord {
    pub topic: String,
    #[serde(default)]
    pub key: Option<Value>,
    pub value: Value,
    pub partition: i64,
    pub offset: i64,
}

//--------------------------------------  KafkaRestPublisher  --------------------------------------------------------
#[derive(Clone)]
pub struct KafkaRestPublisher {
    client: KafkaRestClient,
    topic: String,
}

impl KafkaRestPublisher {
    pub fn new(config: &EventBusConfig) -> Result<Self, EventBusError> {
        let client = KafkaRestClient::new(&config.url)?;
        Ok(Self { client, topic: config.payment_success_topic.clone() })
    }
}

pub fn payment_success_record(event: &PaymentSuccessEvent) -> Result<ProducerRecord, PublishError> {
    let value = serde_json::to_value(event).map_err(|e| PublishError::Serialization(e.to_string()))?;
    Ok(ProducerRecord { key: event.key().to_string(), value })
}

impl EventPublisher for KafkaRestPublisher {
    async fn publish_payment_success(&self, event: &PaymentSuccessEvent) -> Result<(), PublishError> {
        let record = payment_success_record(event)?;
        trace!("📣️ Publishing {record:?} to {}", self.topic);
        self.client.produce(&self.topic, vec![record]).await?;
        debug!("📣️ Announced payment for order {} on {}", event.order_id, self.topic);
        Ok(())
    }
}

//--------------------------------------  OrderCreatedConsumer  ------------------------------------------------------
/// Reads new orders from the order-created topic and passes them to [`InvoiceApi::handle_order_created`].
///
/// The consumer instance is created lazily on the first run, and again whenever the proxy has forgotten it. Records
/// that cannot be parsed, or whose handling fails, are logged and skipped.
pub struct OrderCreatedConsumer<B, G, A> {
    client: KafkaRestClient,
    group: String,
    topic: String,
    instance: Option<ConsumerInstance>,
    invoices: InvoiceApi<B, G, A>,
}

impl<B, G, A> OrderCreatedConsumer<B, G, A> {
    pub fn new(config: &EventBusConfig, invoices: InvoiceApi<B, G, A>) -> Result<Self, EventBusError> {
        let client = KafkaRestClient::new(&config.url)?;
        Ok(Self {
            client,
            group: config.order_consumer_group.clone(),
            topic: config.order_created_topic.clone(),
            instance: None,
            invoices,
        })
    }
}

impl<B, G, A> OrderCreatedConsumer<B, G, A>
where
    B: PaymentStore,
    G: InvoiceGateway,
    A: AuditSink,
{
    async fn handle_record(&self, record: ConsumerRecord) {
        let event = match serde_json::from_value::<OrderCreatedEvent>(record.value) {
            Ok(event) => event,
            Err(e) => {
                error!("📣️ Skipping unreadable record at {}:{}. {e}", record.partition, record.offset);
                return;
            },
        };
        let order_id = event.order_id;
        if let Err(e) = self.invoices.handle_order_created(event).await {
            error!("📣️ Could not handle order-created event for order {order_id}. {e}");
        }
    }
}

impl<B, G, A> ScheduledJob for OrderCreatedConsumer<B, G, A>
where
    B: PaymentStore,
    G: InvoiceGateway,
    A: AuditSink,
{
    type Error = EventBusError;

    fn name(&self) -> &str {
        "Order-created consumer"
    }

    async fn run_once(&mut self) -> Result<(), Self::Error> {
        let instance = match self.instance.take() {
            Some(instance) => instance,
            None => self.client.create_consumer(&self.group, &self.topic).await?,
        };
        let records = match self.client.fetch_records(&instance).await {
            Ok(records) => records,
            Err(EventBusError::Rejected { status: 404, message }) => {
                warn!("📣️ Consumer {} is gone and will be recreated. {message}", instance.instance_id);
                return Ok(());
            },
            Err(e) => {
                self.instance = Some(instance);
                return Err(e);
            },
        };
        if !records.is_empty() {
            debug!("📣️ Received {} order-created records", records.len());
            for record in records {
                self.handle_record(record).await;
            }
            self.client.commit_offsets(&instance).await?;
        }
        self.instance = Some(instance);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use recon_engine::db_types::OrderId;

    use super::*;

    #[test]
    fn payment_success_records_are_keyed_by_external_id() {
        let record = payment_success_record(&PaymentSuccessEvent::new(OrderId(42))).unwrap();
        let body = json!({ "records": [record] });
        assert_eq!(body, json!({"records": [{"key": "order-42", "value": {"order_id": 42, "status": "paid"}}]}));
    }

    #[test]
    fn consumer_records() {
        let json = r#"[{"topic":"order.created","key":null,"value":{"order_id":7,"user_id":3,"total_amount":150000},
            "partition":0,"offset":12}]"#;
        let records: Vec<ConsumerRecord> = serde_json::from_str(json).unwrap();
        let event: OrderCreatedEvent = serde_json::from_value(records[0].value.clone()).unwrap();
        assert_eq!(event.order_id, OrderId(7));
        assert_eq!(event.payment_method, "");
    }

    #[test]
    fn proxy_errors_become_publish_errors() {
        let e: PublishError = EventBusError::Rejected { status: 404, message: "topic not found".into() }.into();
        assert!(matches!(e, PublishError::Rejected { status: 404, .. }));
        let e: PublishError = EventBusError::Unreachable("connection refused".into()).into();
        assert!(matches!(e, PublishError::Unreachable(_)));
    }
}
