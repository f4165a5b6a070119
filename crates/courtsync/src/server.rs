//! `CourtServer` builder and server loop.
//!
//! This is the entry point for running a courtsync server. It ties the
//! layers together: transport → session → room registry, with the
//! mirror store and the identity decoder plugged in through the builder.

use std::net::SocketAddr;
use std::sync::Arc;

use courtsync_mirror::{MemoryStore, MirrorStore};
use courtsync_protocol::JsonCodec;
use courtsync_room::{RoomConfig, RoomRegistry, spawn_reaper};
use courtsync_session::{IdentityDecoder, TokenTable};
use courtsync_transport::{Transport, WebSocketConnection, WebSocketTransport};
use tokio::sync::watch;

use crate::CourtError;
use crate::config::GatewayConfig;
use crate::handler::handle_connection;

/// Registry type the server runs: rooms of WebSocket connections.
pub type Registry<S> = RoomRegistry<WebSocketConnection, S>;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<S: MirrorStore, D: IdentityDecoder> {
    pub(crate) registry: Arc<Registry<S>>,
    pub(crate) decoder: D,
    pub(crate) codec: JsonCodec,
    pub(crate) config: GatewayConfig,
}

/// Builder for configuring and starting a courtsync server.
///
/// Defaults to an in-process [`MemoryStore`] mirror and an empty
/// [`TokenTable`], which rejects every credential.
///
/// # Example
///
/// ```rust,no_run
/// use courtsync::prelude::*;
///
/// # async fn start() -> Result<(), CourtError> {
/// let tokens = TokenTable::from_pairs([("secret-a", "alice"), ("secret-b", "bob")]);
/// let server = CourtServer::builder()
///     .bind("0.0.0.0:8000")
///     .decoder(tokens)
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct CourtServerBuilder<S = MemoryStore, D = TokenTable> {
    bind_addr: String,
    room_config: RoomConfig,
    gateway_config: GatewayConfig,
    store: Arc<S>,
    decoder: D,
}

impl CourtServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            room_config: RoomConfig::default(),
            gateway_config: GatewayConfig::default(),
            store: Arc::new(MemoryStore::new()),
            decoder: TokenTable::new(),
        }
    }
}

impl Default for CourtServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MirrorStore, D: IdentityDecoder> CourtServerBuilder<S, D> {
    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets room timing and capacity.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the per-connection gateway settings.
    pub fn gateway_config(mut self, config: GatewayConfig) -> Self {
        self.gateway_config = config;
        self
    }

    /// Replaces the mirror store.
    pub fn mirror<S2: MirrorStore>(self, store: Arc<S2>) -> CourtServerBuilder<S2, D> {
        CourtServerBuilder {
            bind_addr: self.bind_addr,
            room_config: self.room_config,
            gateway_config: self.gateway_config,
            store,
            decoder: self.decoder,
        }
    }

    /// Replaces the identity decoder.
    pub fn decoder<D2: IdentityDecoder>(self, decoder: D2) -> CourtServerBuilder<S, D2> {
        CourtServerBuilder {
            bind_addr: self.bind_addr,
            room_config: self.room_config,
            gateway_config: self.gateway_config,
            store: self.store,
            decoder,
        }
    }

    /// Binds the listener and builds the room registry.
    ///
    /// # Errors
    /// Returns [`CourtError::Transport`] if the address cannot be bound.
    pub async fn build(self) -> Result<CourtServer<S, D>, CourtError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            registry: Arc::new(RoomRegistry::new(self.room_config, self.store)),
            decoder: self.decoder,
            codec: JsonCodec,
            config: self.gateway_config,
        });
        let (shutdown, _) = watch::channel(false);

        Ok(CourtServer {
            transport,
            state,
            shutdown: Arc::new(shutdown),
        })
    }
}

/// Asks a running [`CourtServer`] to stop.
#[derive(Clone)]
pub struct ShutdownHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    /// Makes the accept loop exit. The server then stops the reaper and
    /// tears down every room before `run` returns.
    pub fn shutdown(&self) {
        self.signal.send_replace(true);
    }
}

/// A bound courtsync server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct CourtServer<S: MirrorStore = MemoryStore, D: IdentityDecoder = TokenTable> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, D>>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl CourtServer {
    /// Creates a new builder.
    pub fn builder() -> CourtServerBuilder {
        CourtServerBuilder::new()
    }
}

impl<S: MirrorStore, D: IdentityDecoder> CourtServer<S, D> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// The room registry the server routes into.
    pub fn registry(&self) -> Arc<Registry<S>> {
        Arc::clone(&self.state.registry)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            signal: Arc::clone(&self.shutdown),
        }
    }

    /// Runs the server accept loop.
    ///
    /// Starts the reaper, then accepts connections and spawns a handler
    /// task for each (the WebSocket handshake runs inside that task) until [`ShutdownHandle::shutdown`] is called. On the
    /// way out the reaper is stopped and every room is shut down.
    pub async fn run(mut self) -> Result<(), CourtError> {
        let reaper = spawn_reaper(Arc::clone(&self.state.registry));
        let mut stop = self.shutdown.subscribe();

        match self.transport.local_addr() {
            Ok(addr) => tracing::info!(%addr, "courtsync server running"),
            Err(_) => tracing::info!("courtsync server running"),
        }

        loop {
            tokio::select! {
                _ = stop.wait_for(|stopped| *stopped) => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(pending) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(pending, state).await {
                                tracing::debug!(error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("courtsync server shutting down");
        reaper.stop().await;
        self.state.registry.shutdown().await;
        self.transport.shutdown().await?;
        Ok(())
    }
}
