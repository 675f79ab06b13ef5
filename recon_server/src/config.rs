use std::{env, time::Duration};

use log::*;
use recon_common::{
    helpers::{env_flag, env_parse},
    Secret,
};
use recon_engine::helpers::RetryPolicy;
use xendit_tools::XenditConfig;

const DEFAULT_RECON_HOST: &str = "127.0.0.1";
const DEFAULT_RECON_PORT: u16 = 8380;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/recon_store.db";
const DEFAULT_PAYMENT_SUCCESS_TOPIC: &str = "payment.success";
const DEFAULT_ORDER_CREATED_TOPIC: &str = "order.created";
const DEFAULT_ORDER_CONSUMER_GROUP: &str = "recon_server";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Gateway webhooks must present this value in the `x-callback-token` header.
    pub webhook_token: Secret<String>,
    /// Operator calls under `/api` must present this value in the `x-api-token` header.
    pub api_token: Secret<String>,
    pub xendit: XenditConfig,
    pub event_bus: EventBusConfig,
    pub jobs: JobConfig,
    /// When true, order-created events queue a payment request for the drain worker instead of opening the invoice
    /// immediately.
    pub defer_invoice_creation: bool,
    pub max_publish_attempts: u32,
    /// The base delay for publish retries. Attempt `i` waits `publish_backoff * 2^i`.
    pub publish_backoff: Duration,
    pub audit_log_enabled: bool,
}

#[derive(Clone, Debug)]
pub struct EventBusConfig {
    /// Base URL of the Kafka REST proxy, e.g. `http://localhost:8082`.
    pub url: String,
    pub payment_success_topic: String,
    pub order_created_topic: String,
    pub order_consumer_group: String,
    pub order_consumer_enabled: bool,
}

#[derive(Clone, Debug)]
pub struct JobConfig {
    pub pending_poll_interval: Duration,
    pub pending_lookback: Duration,
    pub drain_interval: Duration,
    pub drain_batch_size: u32,
    pub max_request_retries: u32,
    pub expiry_interval: Duration,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8082".to_string(),
            payment_success_topic: DEFAULT_PAYMENT_SUCCESS_TOPIC.to_string(),
            order_created_topic: DEFAULT_ORDER_CREATED_TOPIC.to_string(),
            order_consumer_group: DEFAULT_ORDER_CONSUMER_GROUP.to_string(),
            order_consumer_enabled: false,
        }
    }
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            pending_poll_interval: Duration::from_secs(600),
            pending_lookback: Duration::from_secs(24 * 3600),
            drain_interval: Duration::from_secs(5),
            drain_batch_size: 5,
            max_request_retries: 3,
            expiry_interval: Duration::from_secs(60),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RECON_HOST.to_string(),
            port: DEFAULT_RECON_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            webhook_token: Secret::default(),
            api_token: Secret::default(),
            xendit: XenditConfig::default(),
            event_bus: EventBusConfig::default(),
            jobs: JobConfig::default(),
            defer_invoice_creation: false,
            max_publish_attempts: 3,
            publish_backoff: Duration::from_millis(1000),
            audit_log_enabled: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RECON_HOST").ok().unwrap_or_else(|| DEFAULT_RECON_HOST.into());
        let port = env_parse("RECON_PORT", DEFAULT_RECON_PORT);
        let database_url = env::var("RECON_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ RECON_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let webhook_token = required_secret("RECON_WEBHOOK_TOKEN");
        let api_token = required_secret("RECON_API_TOKEN");
        let xendit = XenditConfig::new_from_env_or_default();
        let event_bus = EventBusConfig::from_env_or_default();
        let jobs = JobConfig::from_env_or_default();
        let defer_invoice_creation = env_flag("RECON_DEFER_INVOICE_CREATION", false);
        let max_publish_attempts = env_parse("RECON_MAX_PUBLISH_ATTEMPTS", 3u32).max(1);
        let publish_backoff = Duration::from_millis(env_parse("RECON_PUBLISH_BACKOFF_MS", 1000u64));
        let audit_log_enabled = env_flag("RECON_AUDIT_LOG", true);
        if !audit_log_enabled {
            warn!("🪛️ The audit log is disabled. No audit trail will be written.");
        }
        Self {
            host,
            port,
            database_url,
            webhook_token,
            api_token,
            xendit,
            event_bus,
            jobs,
            defer_invoice_creation,
            max_publish_attempts,
            publish_backoff,
            audit_log_enabled,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_publish_attempts, self.publish_backoff)
    }
}

impl EventBusConfig {
    pub fn from_env_or_default() -> Self {
        let default = Self::default();
        let url = env::var("RECON_EVENT_BUS_URL").ok().unwrap_or_else(|| {
            warn!(
                "🪛️ RECON_EVENT_BUS_URL is not set. Using {}. Payment announcements will fail if no REST proxy is \
                 listening there.",
                default.url
            );
            default.url.clone()
        });
        let payment_success_topic =
            env::var("RECON_PAYMENT_SUCCESS_TOPIC").ok().unwrap_or(default.payment_success_topic);
        let order_created_topic = env::var("RECON_ORDER_CREATED_TOPIC").ok().unwrap_or(default.order_created_topic);
        let order_consumer_group = env::var("RECON_ORDER_CONSUMER_GROUP").ok().unwrap_or(default.order_consumer_group);
        let order_consumer_enabled = env_flag("RECON_ORDER_CONSUMER_ENABLED", false);
        Self {
            url: url.trim_end_matches('/').to_string(),
            payment_success_topic,
            order_created_topic,
            order_consumer_group,
            order_consumer_enabled,
        }
    }
}

impl JobConfig {
    pub fn from_env_or_default() -> Self {
        let secs = |name: &str, default: u64| Duration::from_secs(env_parse(name, default).max(1));
        let pending_poll_interval = secs("RECON_PENDING_POLL_INTERVAL_SECS", 600);
        let pending_lookback = Duration::from_secs(3600 * env_parse("RECON_PENDING_LOOKBACK_HOURS", 24u64));
        let drain_interval = secs("RECON_DRAIN_INTERVAL_SECS", 5);
        let drain_batch_size = env_parse("RECON_DRAIN_BATCH_SIZE", 5u32);
        let max_request_retries = env_parse("RECON_MAX_REQUEST_RETRIES", 3u32);
        let expiry_interval = secs("RECON_EXPIRY_INTERVAL_SECS", 60);
        Self {
            pending_poll_interval,
            pending_lookback,
            drain_interval,
            drain_batch_size,
            max_request_retries,
            expiry_interval,
        }
    }
}

//-------------------------------------------------  OperatorOptions  --------------------------------------------------
/// The subset of the configuration that operator routes need. Contains no secrets.
#[derive(Clone, Copy, Debug)]
pub struct OperatorOptions {
    /// Failed payment requests with a `retry_count` above this are never requeued.
    pub max_request_retries: u32,
    /// How many failed requests are requeued per call when the caller does not say.
    pub requeue_limit: u32,
}

impl Default for OperatorOptions {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}

impl OperatorOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { max_request_retries: config.jobs.max_request_retries, requeue_limit: config.jobs.drain_batch_size }
    }
}

fn required_secret(name: &str) -> Secret<String> {
    let value = env::var(name).ok().unwrap_or_else(|| {
        error!("🪛️ {name} is not set. Every request that needs this token will be refused.");
        String::default()
    });
    Secret::new(value)
}
