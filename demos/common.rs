//! Shared utilities for the demos.
//!
//! Provides:
//! - Command-line argument parsing
//! - Logging initialization
//! - A printing handler

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use bytes::Bytes;
use tether::{Error, Handler, Session};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Address the demo server listens on.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for the demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub tcp: bool,
    pub addr: String,
}

impl Args {
    /// Parse command-line arguments.
    ///
    /// The first argument not starting with `--` is taken as the address.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self {
            debug: args.iter().any(|a| a == "--debug"),
            tcp: args.iter().any(|a| a == "--tcp"),
            addr: args
                .iter()
                .find(|a| !a.starts_with("--"))
                .cloned()
                .unwrap_or_else(|| DEFAULT_ADDR.to_string()),
        }
    }
}

/// Handler printing every callback.
pub struct Printer;

impl Handler for Printer {
    fn did_open_session(&self, session: &Session) {
        println!("open session {} {}", session.identifier(), session.tag());
    }

    fn did_closed_session(&self, session: &Session, cause: Option<&Error>) {
        match cause {
            Some(e) => println!("close session {} ({e})", session.identifier()),
            None => println!("close session {}", session.identifier()),
        }
    }

    fn did_written_data(&self, session: &Session, data: &Bytes) {
        println!("write data {} {}", session.identifier(), String::from_utf8_lossy(data));
    }

    fn did_received_data(&self, session: &Session, data: &Bytes) {
        println!("receive data {} {}", session.identifier(), String::from_utf8_lossy(data));
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging. `RUST_LOG` overrides the default filter.
pub fn init_logging(debug: bool) {
    let default = if debug { "tether=debug" } else { "tether=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
