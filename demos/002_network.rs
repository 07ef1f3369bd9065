//! Network mode against a running backend.
//!
//! Demonstrates:
//! - Mode detection from the environment
//! - Stream-first routing with HTTP fallback
//! - Push event subscription
//!
//! Usage:
//!   cargo run --example 002_network
//!   cargo run --example 002_network -- --base-url http://localhost:8000
//!   WALLET_TRANSPORT_MODE=network cargo run --example 002_network -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use anyhow::Context;
use common::Args;
use serde_json::json;
use url::Url;
use wallet_transport::{CommandService, HostEnvironment, TransportMode, detect};

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    common::init_logging(args.debug);

    println!("=== 002: Network ===\n");

    let mut env = HostEnvironment::from_env().with_override_mode(TransportMode::Network);
    if let Some(base) = &args.base_url {
        let url = Url::parse(base).context("parsing --base-url")?;
        env = env.with_override_base_url(url);
    }
    let config = detect(&env);

    println!("[1] Configuration");
    println!("    Mode:   {}", config.mode);
    if let Some(base) = &config.base_url {
        println!("    HTTP:   {base}");
    }
    if let Some(stream) = &config.stream_url {
        println!("    Stream: {stream}");
    }

    let service = CommandService::builder()
        .config(config)
        .build()
        .context("building service")?;
    service.init().await;
    println!("    State:  {:?}\n", service.connection_state());

    // ========================================================================
    // Events
    // ========================================================================

    if let Some(mut events) = service.subscribe_event("balance.updated") {
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                println!("    [event] balance.updated {:?}", event.data);
            }
        });
    }

    // ========================================================================
    // Commands
    // ========================================================================

    println!("[2] wallet.balance");
    let reply = service.command("wallet.balance", json!({})).await;
    common::print_envelope("balance", &reply);

    println!("\n[3] GET /api/health");
    let health = service.get::<serde_json::Value>("/api/health").await;
    common::print_envelope("health", &health);

    println!("\n[4] Listening for events (5s)...");
    tokio::time::sleep(Duration::from_secs(5)).await;

    println!("\n[Diagnostics]");
    println!("    Pending:    {}", service.pending_count());
    println!("    Reconnects: {}", service.reconnect_attempts());

    service.dispose();
    println!("\n=== Done ===");
    Ok(())
}
