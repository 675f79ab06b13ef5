use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{AnomalyDetectedEvent, EventHandler, EventProducer, Handler, PaymentPaidEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_paid_producer: Vec<EventProducer<PaymentPaidEvent>>,
    pub anomaly_detected_producer: Vec<EventProducer<AnomalyDetectedEvent>>,
}

impl EventProducers {
    pub async fn payment_paid(&self, event: PaymentPaidEvent) {
        for producer in &self.payment_paid_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn anomaly_detected(&self, event: AnomalyDetectedEvent) {
        for producer in &self.anomaly_detected_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_payment_paid: Option<EventHandler<PaymentPaidEvent>>,
    pub on_anomaly_detected: Option<EventHandler<AnomalyDetectedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_paid = hooks.on_payment_paid.map(|f| EventHandler::new(buffer_size, f));
        let on_anomaly_detected = hooks.on_anomaly_detected.map(|f| EventHandler::new(buffer_size, f));
        Self { on_payment_paid, on_anomaly_detected }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_paid {
            result.payment_paid_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_anomaly_detected {
            result.anomaly_detected_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_paid {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_anomaly_detected {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

/// Callbacks that are run, off the settlement path, whenever a payment is settled or quarantined.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_paid: Option<Handler<PaymentPaidEvent>>,
    pub on_anomaly_detected: Option<Handler<AnomalyDetectedEvent>>,
}

impl EventHooks {
    pub fn on_payment_paid<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentPaidEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_paid = Some(Arc::new(f));
        self
    }

    pub fn on_anomaly_detected<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AnomalyDetectedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_anomaly_detected = Some(Arc::new(f));
        self
    }
}
