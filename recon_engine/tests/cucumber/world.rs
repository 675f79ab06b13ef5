use std::time::Duration;

use cucumber::World;
use recon_engine::{
    helpers::RetryPolicy,
    test_utils::{
        fakes::{FakeGateway, ScriptedPublisher},
        prepare_env::new_test_database,
    },
    InvoiceApi,
    ReconciliationApi,
    SettlementApi,
    SqliteDatabase,
    WebhookApi,
    WebhookError,
    WebhookOutcome,
};

pub type Audit = Option<SqliteDatabase>;

#[derive(Default, Debug, World)]
pub struct ReconWorld {
    pub system: Option<ReconSystem>,
    pub last_notification: Option<Result<WebhookOutcome, WebhookError>>,
}

#[derive(Debug)]
pub struct ReconSystem {
    pub db: SqliteDatabase,
    pub publisher: ScriptedPublisher,
    pub gateway: FakeGateway,
    pub webhooks: WebhookApi<SqliteDatabase, ScriptedPublisher, Audit>,
    pub invoices: InvoiceApi<SqliteDatabase, FakeGateway, Audit>,
    pub reconciliation: ReconciliationApi<SqliteDatabase, FakeGateway, ScriptedPublisher, Audit>,
}

impl ReconWorld {
    pub fn system(&self) -> &ReconSystem {
        self.system.as_ref().expect("System not initialised. Did you forget 'Given a fresh install'?")
    }
}

impl ReconSystem {
    pub async fn new(publisher: ScriptedPublisher) -> Self {
        let db = new_test_database().await;
        let gateway = FakeGateway::new();
        let retry = RetryPolicy::new(3, Duration::from_millis(1));
        let settlement = SettlementApi::new(db.clone(), publisher.clone(), Some(db.clone())).with_retry_policy(retry);
        let webhooks = WebhookApi::new(settlement.clone());
        let reconciliation = ReconciliationApi::new(gateway.clone(), settlement);
        let invoices = InvoiceApi::new(db.clone(), gateway.clone(), Some(db.clone()));
        Self { db, publisher, gateway, webhooks, invoices, reconciliation }
    }

    /// Rebuilds the APIs around a differently scripted event bus, keeping the database.
    pub fn with_publisher(mut self, publisher: ScriptedPublisher) -> Self {
        let retry = RetryPolicy::new(3, Duration::from_millis(1));
        let settlement =
            SettlementApi::new(self.db.clone(), publisher.clone(), Some(self.db.clone())).with_retry_policy(retry);
        self.webhooks = WebhookApi::new(settlement.clone());
        self.reconciliation = ReconciliationApi::new(self.gateway.clone(), settlement);
        self.publisher = publisher;
        self
    }
}
