use log::*;
use recon_engine::events::{AnomalyDetectedEvent, EventHandlers, EventHooks, PaymentPaidEvent};

const ALERT_EVENT_BUFFER_SIZE: usize = 25;

/// Creates the in-process event handlers that keep operators informed.
///
/// 1. PaymentPaidEvent - Logged at `info`, so that settlements show up in the server log alongside the access log.
/// 2. AnomalyDetectedEvent - Logged at `warn`. A quarantined payment stays PENDING until an operator resolves the
///    anomaly through `/api/v1/anomalies/{id}/resolve`.
pub fn create_alert_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    // --- On PaymentPaid Handler ---
    hooks.on_payment_paid(|ev| {
        Box::pin(async move {
            let PaymentPaidEvent { payment } = ev;
            info!("🔄️ Order {} is paid. {} via {}", payment.order_id, payment.amount, payment.payment_method);
        })
    });
    // --- On AnomalyDetected Handler ---
    hooks.on_anomaly_detected(|ev| {
        Box::pin(async move {
            let AnomalyDetectedEvent { anomaly } = ev;
            warn!(
                "🚨️ Payment for order {} has been quarantined and needs review. Anomaly #{} ({:?}): {}",
                anomaly.order_id, anomaly.id, anomaly.anomaly_type, anomaly.notes
            );
        })
    });
    EventHandlers::new(ALERT_EVENT_BUFFER_SIZE, hooks)
}
