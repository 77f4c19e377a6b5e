//! WebSocket server.
//!
//! Accepts TCP connections, performs the WebSocket upgrade and opens a
//! [`Session`] for each one with the server's configuration and handler.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                 Server                  │
//! │              (single port)              │
//! │                                         │
//! │  accept ──► upgrade ──► Session::open   │
//! │  accept ──► upgrade ──► Session::open   │
//! │   ...                                   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The server does not track the sessions it opens. Register them in a
//! [`Hub`](crate::Hub) from the handler, or wrap the handler in a
//! [`HubHandler`](crate::HubHandler).
//!
//! By default a session is identified by its remote address under the
//! default tag. An [`IdentityResolver`] derives both from the upgrade
//! request instead, e.g. from `ws://host/?id=alice&tag=phone`.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};
use url::form_urlencoded;

use crate::error::Result;
use crate::session::{Handler, Session, SessionConfig};

use super::connection::Shutdown;
use super::websocket::{self, Request};

// ============================================================================
// Identity
// ============================================================================

/// Identifier and tag for an accepted session.
///
/// `None` fields keep the session defaults: the remote address and the
/// default tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Identifier override.
    pub identifier: Option<String>,

    /// Tag override.
    pub tag: Option<String>,
}

impl Identity {
    /// Reads the identifier and tag from the request's query parameters.
    ///
    /// Missing parameters stay `None`; repeated ones use the first value.
    #[must_use]
    pub fn from_query(request: &Request, identifier_key: &str, tag_key: &str) -> Self {
        let mut identity = Self::default();
        let Some(query) = request.uri().query() else {
            return identity;
        };

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if identity.identifier.is_none() && key == identifier_key {
                identity.identifier = Some(value.into_owned());
            } else if identity.tag.is_none() && key == tag_key {
                identity.tag = Some(value.into_owned());
            }
        }
        identity
    }
}

/// Derives a session's [`Identity`] from its WebSocket upgrade request.
pub type IdentityResolver = Arc<dyn Fn(&Request) -> Identity + Send + Sync>;

// ============================================================================
// Server
// ============================================================================

/// Accept loop turning inbound WebSocket connections into sessions.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tether::{Server, SessionConfig};
///
/// let server = Server::bind("127.0.0.1:8080", SessionConfig::default(), Arc::new(MyHandler)).await?;
/// println!("Listening on {}", server.ws_url());
///
/// // ...
///
/// server.shutdown();
/// ```
pub struct Server {
    /// Address the listener is bound to.
    local_addr: SocketAddr,

    /// Configuration applied to every accepted session.
    config: SessionConfig,

    /// Handler shared by every accepted session.
    handler: Arc<dyn Handler>,

    /// Derives identifier and tag from the upgrade request.
    resolver: Option<IdentityResolver>,

    /// Number of sessions opened so far.
    accepted: AtomicU64,

    /// Stops the accept loop.
    shutdown: Shutdown,
}

// ============================================================================
// Server - Constructor
// ============================================================================

impl Server {
    /// Binds to `addr` and starts the accept loop.
    ///
    /// Use port 0 to let the OS assign a random available port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind(
        addr: impl ToSocketAddrs,
        config: SessionConfig,
        handler: Arc<dyn Handler>,
    ) -> Result<Arc<Self>> {
        Self::start(addr, config, handler, None).await
    }

    /// Binds to `addr`, naming each session with `resolver`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) if binding fails.
    pub async fn bind_with_identity(
        addr: impl ToSocketAddrs,
        config: SessionConfig,
        handler: Arc<dyn Handler>,
        resolver: IdentityResolver,
    ) -> Result<Arc<Self>> {
        Self::start(addr, config, handler, Some(resolver)).await
    }

    async fn start(
        addr: impl ToSocketAddrs,
        config: SessionConfig,
        handler: Arc<dyn Handler>,
        resolver: Option<IdentityResolver>,
    ) -> Result<Arc<Self>> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let server = Arc::new(Self {
            local_addr,
            config: config.normalized(),
            handler,
            resolver,
            accepted: AtomicU64::new(0),
            shutdown: Shutdown::new(),
        });

        let server_clone = Arc::clone(&server);
        tokio::spawn(async move {
            server_clone.accept_loop(listener).await;
        });

        info!(%local_addr, "Server started");

        Ok(server)
    }
}

// ============================================================================
// Server - Public API
// ============================================================================

impl Server {
    /// Returns the bound address.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns the WebSocket URL for this server.
    ///
    /// Format: `ws://{ip}:{port}`
    #[inline]
    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    /// Returns the number of sessions opened so far.
    #[inline]
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Returns the configuration applied to accepted sessions.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns `true` once [`Server::shutdown`] has been called.
    #[inline]
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_triggered()
    }

    /// Stops accepting connections.
    ///
    /// Sessions that are already open keep running.
    pub fn shutdown(&self) {
        if self.shutdown.trigger() {
            info!(local_addr = %self.local_addr, "Server shutting down");
        }
    }
}

// ============================================================================
// Server - Accept Loop
// ============================================================================

impl Server {
    /// Background task that accepts new connections.
    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        debug!("Accept loop started");

        loop {
            let accepted = tokio::select! {
                () = self.shutdown.wait() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, addr).await {
                            warn!(error = %e, ?addr, "Connection handling failed");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "Accept failed");
                }
            }
        }

        debug!("Accept loop terminated");
    }

    /// Upgrades one connection and opens its session.
    async fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) -> Result<()> {
        debug!(?addr, "New TCP connection");

        let (connection, identity) = match &self.resolver {
            Some(resolver) => websocket::accept_with(stream, |request| resolver(request)).await?,
            None => (websocket::accept(stream).await?, Identity::default()),
        };

        let mut builder = Session::builder()
            .connection(connection)
            .shared_handler(Arc::clone(&self.handler))
            .config(self.config.clone());
        if let Some(identifier) = identity.identifier {
            builder = builder.identifier(identifier);
        }
        if let Some(tag) = identity.tag {
            builder = builder.tag(tag);
        }
        let session = builder.open().await?;

        self.accepted.fetch_add(1, Ordering::Relaxed);
        debug!(
            session_id = %session.id(),
            identifier = %session.identifier(),
            tag = %session.tag(),
            ?addr,
            "Session accepted"
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
