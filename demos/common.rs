//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub base_url: Option<String>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let base_url = args
            .iter()
            .position(|a| a == "--base-url")
            .and_then(|i| args.get(i + 1))
            .cloned();

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            base_url,
        }
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "wallet_transport=debug"
    } else {
        "wallet_transport=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Print an envelope on one line.
pub fn print_envelope(label: &str, envelope: &wallet_transport::CommandEnvelope) {
    if envelope.success {
        let data = envelope
            .data
            .as_ref()
            .map_or_else(|| "null".to_string(), ToString::to_string);
        println!("    ✓ {label}: {data}");
    } else {
        println!(
            "    ✗ {label}: {}",
            envelope.error_message().unwrap_or_default()
        );
    }
}
