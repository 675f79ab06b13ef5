use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, Payment};

/// Summary of one pass of the pending-invoice poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResult {
    /// Number of PENDING payments checked against the gateway.
    pub checked: usize,
    /// Orders moved to PAID during this pass.
    pub settled: Vec<OrderId>,
    /// Orders the gateway reported as paid, but which were already PAID locally by the time we got to them.
    pub already_paid: usize,
    /// Invoices that were skipped because the gateway query or the transition failed.
    pub errors: usize,
}

impl PollResult {
    pub fn settled_count(&self) -> usize {
        self.settled.len()
    }

    pub fn still_pending(&self) -> usize {
        self.checked.saturating_sub(self.settled.len() + self.already_paid + self.errors)
    }
}

/// Summary of one batch of the payment-request drain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainResult {
    /// Invoices opened, and the payments recorded for them.
    pub created: Vec<Payment>,
    /// Requests closed without a new invoice, because a payment already existed for the order.
    pub skipped: usize,
    /// Requests whose invoice could not be opened. These are now FAILED with an incremented retry count.
    pub failed: usize,
}

impl DrainResult {
    pub fn total_count(&self) -> usize {
        self.created.len() + self.skipped + self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }
}
