//! Local mode with an in-process bridge.
//!
//! Demonstrates:
//! - Implementing `LocalBridge`
//! - Concurrent identical commands sharing one bridge call
//! - Cached commands and cache eviction
//! - REST-style verbs funnelled through `api_request`
//!
//! Usage:
//!   cargo run --example 001_local_bridge
//!   cargo run --example 001_local_bridge -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use common::Args;
use serde_json::{Value, json};
use wallet_transport::{CommandEnvelope, CommandService, LocalBridge, TransportConfig};

// ============================================================================
// Bridge
// ============================================================================

/// Bridge that answers a handful of wallet commands from memory.
struct DemoBridge {
    calls: AtomicU64,
}

#[async_trait]
impl LocalBridge for DemoBridge {
    async fn invoke(&self, command: &str, payload: Value) -> wallet_transport::Result<Value> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;

        match command {
            "wallet.balance" => Ok(json!({"amount": 1250, "currency": "TON"})),
            "api_request" => Ok(json!({"success": true, "data": payload})),
            other => Err(wallet_transport::Error::bridge(format!(
                "unknown command: {other}"
            ))),
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    common::init_logging(args.debug);

    println!("=== 001: Local Bridge ===\n");

    let bridge = Arc::new(DemoBridge {
        calls: AtomicU64::new(0),
    });
    let service = CommandService::builder()
        .config(TransportConfig::local())
        .bridge(Arc::clone(&bridge) as Arc<dyn LocalBridge>)
        .build()
        .context("building service")?;

    // ========================================================================
    // Deduplication
    // ========================================================================

    println!("[1] Three concurrent balance requests...");
    let (a, b, c) = tokio::join!(
        service.command("wallet.balance", json!({})),
        service.command("wallet.balance", json!({})),
        service.command("wallet.balance", json!({})),
    );
    common::print_envelope("balance", &a);
    println!("    Identical replies: {}", a == b && b == c);
    println!("    Bridge calls: {}\n", bridge.calls.load(Ordering::Relaxed));

    // ========================================================================
    // Cache
    // ========================================================================

    println!("[2] Cached balance...");
    let ttl = Duration::from_secs(10);
    for _ in 0..3 {
        service
            .cached_command("wallet.balance", json!({"fresh": false}), ttl)
            .await;
    }
    println!("    Bridge calls: {}", bridge.calls.load(Ordering::Relaxed));
    println!("    Evicted: {}\n", service.clear_cache(Some("wallet.")));

    // ========================================================================
    // Verbs
    // ========================================================================

    println!("[3] REST-style POST...");
    let reply: CommandEnvelope = service
        .post("/api/withdraw", json!({"amount": 100, "address": "EQ..."}))
        .await;
    common::print_envelope("withdraw", &reply);

    println!("\n[4] Unknown command...");
    let reply = service.command("wallet.nope", json!({})).await;
    common::print_envelope("nope", &reply);

    service.dispose();
    println!("\n=== Done ===");
    Ok(())
}
