use std::time::Duration;

use log::*;
use recon_common::{helpers::env_parse, Secret};

pub const DEFAULT_XENDIT_BASE_URL: &str = "https://api.xendit.co";

#[derive(Debug, Clone)]
pub struct XenditConfig {
    pub base_url: String,
    /// Used as the basic-auth username. The password is always empty.
    pub api_key: Secret<String>,
    pub timeout: Duration,
}

impl Default for XenditConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_XENDIT_BASE_URL.to_string(),
            api_key: Secret::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl XenditConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("RECON_XENDIT_BASE_URL").unwrap_or_else(|_| {
            info!("🪛️ RECON_XENDIT_BASE_URL not set, using {DEFAULT_XENDIT_BASE_URL}");
            DEFAULT_XENDIT_BASE_URL.to_string()
        });
        let api_key = Secret::new(std::env::var("RECON_XENDIT_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ RECON_XENDIT_API_KEY not set. Every call to Xendit will be rejected.");
            String::default()
        }));
        let timeout = Duration::from_secs(env_parse("RECON_GATEWAY_TIMEOUT_SECS", 30u64));
        Self { base_url: base_url.trim_end_matches('/').to_string(), api_key, timeout }
    }
}
