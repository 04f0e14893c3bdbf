//! `SnakepitServer` builder and accept loop.
//!
//! Ties the layers together: each accepted WebSocket gets its own task
//! running [`handle_connection`], and every task shares one
//! [`RoomManager`].

use std::net::SocketAddr;
use std::sync::Arc;

use snakepit_protocol::JsonCodec;
use snakepit_room::{RoomConfig, RoomManager};
use snakepit_transport::{Transport, WebSocketTransport};

use crate::SnakepitError;
use crate::handler::handle_connection;

/// Address the binary listens on when `SNAKEPIT_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:10555";

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState {
    pub(crate) rooms: RoomManager,
    pub(crate) codec: JsonCodec,
}

/// Builder for configuring and starting a Snakepit server.
///
/// # Example
///
/// ```rust,ignore
/// let server = SnakepitServer::builder()
///     .bind("127.0.0.1:0")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct SnakepitServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
}

impl SnakepitServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener. The server does not accept until
    /// [`SnakepitServer::run`] is called.
    pub async fn build(self) -> Result<SnakepitServer, SnakepitError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: RoomManager::new(self.room_config),
            codec: JsonCodec,
        });

        Ok(SnakepitServer { transport, state })
    }
}

impl Default for SnakepitServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Snakepit game server.
pub struct SnakepitServer {
    transport: WebSocketTransport,
    state: Arc<ServerState>,
}

impl SnakepitServer {
    /// Creates a new builder.
    pub fn builder() -> SnakepitServerBuilder {
        SnakepitServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SnakepitError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    ///
    /// A failed accept (including a failed WebSocket upgrade) is logged and
    /// does not stop the loop.
    pub async fn run(mut self) -> Result<(), SnakepitError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "snakepit server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
