//! `KibitzServer` builder and accept loop.
//!
//! This is the entry point for running a Kibitz session host. It ties
//! together all the layers: transport → protocol → registry → room.

use std::sync::Arc;

use kibitz_protocol::{Codec, JsonCodec};
use kibitz_room::{RoomConfig, Ruleset, SessionRegistry};
use kibitz_store::Store;
use kibitz_transport::{Listener, WebSocketListener};

use crate::handler::handle_connection;
use crate::KibitzError;

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<R: Ruleset, C: Codec> {
    pub(crate) registry: Arc<SessionRegistry<R>>,
    pub(crate) codec: C,
}

/// Builder for configuring and starting a Kibitz server.
///
/// # Example
///
/// ```rust,ignore
/// use kibitz::prelude::*;
///
/// let server = KibitzServer::builder()
///     .bind("0.0.0.0:8080")
///     .store(Arc::new(FileStore::new("/var/lib/kibitz")))
///     .build::<MyRules>()
///     .await?;
/// server.restore().await;
/// server.run().await
/// ```
pub struct KibitzServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    store: Option<Arc<dyn Store>>,
}

impl KibitzServerBuilder {
    /// Creates a new builder with default settings and no persistence.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
            store: None,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room configuration (idle timeout, reply pacing).
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Sets the persistence store rooms are saved to and restored from.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Binds the listener and builds the server for the given ruleset.
    ///
    /// Uses `JsonCodec` and the WebSocket transport.
    pub async fn build<R: Ruleset>(
        self,
    ) -> Result<KibitzServer<R, JsonCodec>, KibitzError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;
        let registry = SessionRegistry::new(self.room_config, self.store);

        Ok(KibitzServer {
            listener,
            state: Arc::new(ServerState {
                registry,
                codec: JsonCodec,
            }),
        })
    }
}

impl Default for KibitzServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Kibitz session host.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct KibitzServer<R: Ruleset, C: Codec> {
    listener: WebSocketListener,
    state: Arc<ServerState<R, C>>,
}

impl<R, C> KibitzServer<R, C>
where
    R: Ruleset,
    C: Codec + Clone,
{
    /// Creates a new builder.
    pub fn builder() -> KibitzServerBuilder {
        KibitzServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(
        &self,
    ) -> Result<std::net::SocketAddr, KibitzError> {
        Ok(self.listener.local_addr()?)
    }

    /// The room registry, for out-of-band access (admin endpoints,
    /// replay export).
    pub fn registry(&self) -> Arc<SessionRegistry<R>> {
        Arc::clone(&self.state.registry)
    }

    /// Recreates rooms from the persistence store. Call before
    /// [`run()`](Self::run). Returns the number of rooms restored.
    pub async fn restore(&self) -> usize {
        self.state.registry.restore().await
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each
    /// viewer. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), KibitzError> {
        tracing::info!("Kibitz server running");

        loop {
            match self.listener.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection::<R, C>(conn, state).await
                        {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
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
