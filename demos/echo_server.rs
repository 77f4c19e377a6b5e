//! Broadcast server.
//!
//! Demonstrates:
//! - Opening a session per accepted connection
//! - Keeping a hub in sync with `HubHandler`
//! - Broadcasting every received message to all sessions
//! - Naming sessions from the upgrade URL's query
//!
//! Usage:
//!   cargo run --example echo_server
//!   cargo run --example echo_server -- 0.0.0.0:9000 --debug
//!   cargo run --example echo_server -- --tcp

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use bytes::Bytes;
use common::{Args, Printer};
use tether::transport::tcp::Listener;
use tether::transport::websocket::Request;
use tether::{
    Error, Handler, Hub, HubHandler, Identity, IdentityResolver, Server, Session, SessionConfig,
};

// ============================================================================
// Handler
// ============================================================================

/// Prints every event and relays received data to every session in the hub.
struct Broadcast {
    hub: Arc<Hub>,
}

impl Handler for Broadcast {
    fn did_open_session(&self, session: &Session) {
        Printer.did_open_session(session);
        println!("sessions: {}", self.hub.count());
    }

    fn did_closed_session(&self, session: &Session, cause: Option<&Error>) {
        Printer.did_closed_session(session, cause);
    }

    fn did_received_data(&self, session: &Session, data: &Bytes) {
        Printer.did_received_data(session, data);
        for peer in self.hub.get_all() {
            if let Err(e) = peer.write_message(data.clone()) {
                println!("broadcast to {} failed: {e}", peer.identifier());
            }
        }
    }
}

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
    let hub = Arc::new(Hub::new());
    let handler = Arc::new(HubHandler::new(
        Arc::clone(&hub),
        Broadcast {
            hub: Arc::clone(&hub),
        },
    ));

    if args.tcp {
        return serve_tcp(&args.addr, handler).await;
    }

    // Clients may name themselves with ws://host/?id=alice&tag=phone
    let resolver: IdentityResolver =
        Arc::new(|request: &Request| Identity::from_query(request, "id", "tag"));
    let server =
        Server::bind_with_identity(&args.addr, SessionConfig::default(), handler, resolver).await?;
    println!("Listening on {} (Ctrl+C to exit)", server.ws_url());

    tokio::signal::ctrl_c().await?;
    server.shutdown();
    println!("{} sessions accepted", server.accepted());

    Ok(())
}

/// Serves raw TCP peers until Ctrl+C.
async fn serve_tcp(addr: &str, handler: Arc<dyn Handler>) -> anyhow::Result<()> {
    let listener = Listener::bind(addr).await?;
    println!("Listening on tcp://{} (Ctrl+C to exit)", listener.local_addr()?);

    loop {
        let accepted = tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            accepted = listener.accept() => accepted,
        };

        let connection = match accepted {
            Ok(connection) => connection,
            Err(e) => {
                eprintln!("accept failed: {e}");
                continue;
            }
        };

        let opened = Session::builder()
            .connection(connection)
            .shared_handler(Arc::clone(&handler))
            .open()
            .await;
        if let Err(e) = opened {
            eprintln!("session open failed: {e}");
        }
    }
}
