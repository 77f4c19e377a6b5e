//! Chat client for the broadcast server.
//!
//! Demonstrates:
//! - Dialing a WebSocket (or raw TCP) server
//! - Opening a session with a custom identifier and tag
//! - Sending lines from stdin through the outbound queue
//!
//! Usage:
//!   cargo run --example echo_client
//!   cargo run --example echo_client -- 127.0.0.1:9000 --debug
//!   cargo run --example echo_client -- --tcp

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use common::{Args, Printer};
use tether::Session;
use tether::transport::{tcp, websocket};
use tokio::io::{AsyncBufReadExt, BufReader};

// ============================================================================
// Constants
// ============================================================================

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let builder = Session::builder()
        .handler(Printer)
        .identifier(format!("client-{}", std::process::id()))
        .tag("terminal");

    let session = if args.tcp {
        let connection = tcp::dial_timeout(&args.addr, DIAL_TIMEOUT).await?;
        builder.connection(connection).open().await?
    } else {
        let connection = websocket::connect(&format!("ws://{}", args.addr)).await?;
        builder.connection(connection).open().await?
    };

    println!("Type a line to broadcast it; Ctrl+D to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if session.is_closed() {
            break;
        }
        session.write_message(line)?;
    }

    session.close()?;
    Ok(())
}
