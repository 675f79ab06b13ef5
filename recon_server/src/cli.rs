use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 21] = [
        "RUST_LOG",
        "RECON_HOST",
        "RECON_PORT",
        "RECON_DATABASE_URL",
        "RECON_XENDIT_BASE_URL",
        "RECON_GATEWAY_TIMEOUT_SECS",
        "RECON_EVENT_BUS_URL",
        "RECON_PAYMENT_SUCCESS_TOPIC",
        "RECON_ORDER_CREATED_TOPIC",
        "RECON_ORDER_CONSUMER_GROUP",
        "RECON_ORDER_CONSUMER_ENABLED",
        "RECON_DEFER_INVOICE_CREATION",
        "RECON_MAX_PUBLISH_ATTEMPTS",
        "RECON_PUBLISH_BACKOFF_MS",
        "RECON_PENDING_POLL_INTERVAL_SECS",
        "RECON_PENDING_LOOKBACK_HOURS",
        "RECON_DRAIN_INTERVAL_SECS",
        "RECON_DRAIN_BATCH_SIZE",
        "RECON_MAX_REQUEST_RETRIES",
        "RECON_EXPIRY_INTERVAL_SECS",
        "RECON_AUDIT_LOG",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
