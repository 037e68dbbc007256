//! `RealmsyncServer` builder and server loop.
//!
//! This is the entry point for running a Realmsync gateway. It ties
//! together all the layers: transport → protocol → session → world and
//! resources, plus the background jobs that run independently of any
//! connection.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use realmsync_protocol::{AccountId, JsonCodec, ServerMessage, WorldEvent, WorldUpdate};
use realmsync_resources::ResourceEngine;
use realmsync_session::{IdentityOracle, SessionManager};
use realmsync_store::WorldStore;
use realmsync_transport::{ConnectionId, Transport, WebSocketTransport};
use realmsync_world::WorldTracker;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::handler::handle_connection;
use crate::{ActionService, NoActionService, RealmsyncError, ServerConfig, background};

/// Shared server state passed to each connection handler and background
/// task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. The session
/// table is the only piece behind a gateway-level lock; the tracker and
/// engine guard their own state.
pub(crate) struct ServerState<S, O, P> {
    pub(crate) config: ServerConfig,
    pub(crate) sessions: Mutex<SessionManager>,
    pub(crate) tracker: WorldTracker<S>,
    pub(crate) engine: ResourceEngine<S>,
    pub(crate) oracle: O,
    pub(crate) services: P,
    pub(crate) codec: JsonCodec,
    pub(crate) started: Instant,
}

impl<S, O, P> ServerState<S, O, P>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    /// Milliseconds since the server started; the `timestamp` of every
    /// outgoing envelope.
    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Runs a downstream call under `downstream_timeout`.
    pub(crate) async fn bounded<T, E>(
        &self,
        what: &'static str,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, RealmsyncError>
    where
        RealmsyncError: From<E>,
    {
        match tokio::time::timeout(self.config.downstream_timeout, call).await {
            Ok(result) => result.map_err(RealmsyncError::from),
            Err(_) => Err(RealmsyncError::Timeout(what)),
        }
    }

    /// Queues `message` for every live session except `except`.
    pub(crate) async fn broadcast(
        &self,
        message: ServerMessage,
        except: Option<AccountId>,
    ) -> usize {
        self.sessions.lock().await.broadcast(message, except)
    }

    /// Ends the session `connection_id` holds for `account_id`.
    ///
    /// Only the first call for a live session does anything: it removes
    /// the session, drops the player from the world, and tells everyone
    /// else. Repeat calls, and calls from a connection that has since been
    /// superseded, are no-ops.
    ///
    /// The session lock is held throughout, so a reconnect for the same
    /// account registers only after the old player has left the world.
    pub(crate) async fn depart(
        &self,
        account_id: AccountId,
        connection_id: ConnectionId,
    ) -> bool {
        let mut sessions = self.sessions.lock().await;
        if sessions.disconnect(account_id, connection_id).is_none() {
            return false;
        }

        self.tracker.despawn(account_id).await;
        let notified = sessions.broadcast(
            ServerMessage::Event(WorldEvent::WorldUpdate(WorldUpdate::PlayerLeft {
                account_id,
            })),
            Some(account_id),
        );
        drop(sessions);
        tracing::info!(%account_id, %connection_id, notified, "player departed");
        true
    }
}

/// Builder for configuring and starting a Realmsync server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use realmsync::prelude::*;
///
/// # async fn start() -> Result<(), RealmsyncError> {
/// let oracle = StaticTokenOracle::new().with_token("dev", AccountId(1), "dev");
/// let store = Arc::new(MemoryStore::default_world());
///
/// let server = RealmsyncServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(store, oracle)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct RealmsyncServerBuilder<P = NoActionService> {
    config: ServerConfig,
    services: P,
}

impl RealmsyncServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            services: NoActionService,
        }
    }
}

impl Default for RealmsyncServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ActionService> RealmsyncServerBuilder<P> {
    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Replaces the whole configuration. The bind address comes with it.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers the service that pass-through actions are forwarded to.
    pub fn action_service<Q: ActionService>(self, services: Q) -> RealmsyncServerBuilder<Q> {
        RealmsyncServerBuilder {
            config: self.config,
            services,
        }
    }

    /// Binds the listener and assembles the server.
    ///
    /// Nothing runs until [`RealmsyncServer::run`].
    pub async fn build<S, O>(
        self,
        store: Arc<S>,
        oracle: O,
    ) -> Result<RealmsyncServer<S, O, P>, RealmsyncError>
    where
        S: WorldStore,
        O: IdentityOracle,
    {
        let config = self.config.aligned();
        let transport = WebSocketTransport::bind_with(&config.bind_addr, config.transport).await?;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(SessionManager::new()),
            tracker: WorldTracker::new(Arc::clone(&store), config.world.clone()),
            engine: ResourceEngine::new(store, config.resources.clone()),
            oracle,
            services: self.services,
            codec: JsonCodec,
            started: Instant::now(),
            config,
        });

        Ok(RealmsyncServer { transport, state })
    }
}

/// Aborts the background jobs when the server future is dropped.
struct BackgroundTasks(Vec<JoinHandle<()>>);

impl Drop for BackgroundTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

/// A Realmsync gateway, bound and ready.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct RealmsyncServer<S, O, P = NoActionService> {
    transport: WebSocketTransport,
    state: Arc<ServerState<S, O, P>>,
}

impl RealmsyncServer<(), (), NoActionService> {
    /// Creates a new builder.
    pub fn builder() -> RealmsyncServerBuilder {
        RealmsyncServerBuilder::new()
    }
}

impl<S, O, P> RealmsyncServer<S, O, P>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server.
    ///
    /// Fills every zone to its resource ceiling, starts the background
    /// jobs, then accepts connections and spawns a handler task for each.
    /// Runs until the process is terminated.
    ///
    /// # Errors
    /// Only startup can fail: if the initial zone population cannot reach
    /// the store, the error is returned and nothing is served.
    pub async fn run(mut self) -> Result<(), RealmsyncError> {
        // Bounded per store call inside the engine; a large world takes as
        // long as it takes.
        let spawned = self
            .state
            .engine
            .ensure_all_zones()
            .await
            .inspect_err(|e| tracing::error!(error = %e, "startup population failed"))?;
        tracing::info!(spawned, "zones populated");

        let _tasks = BackgroundTasks(background::spawn_all(&self.state));

        tracing::info!(addr = ?self.transport.local_addr().ok(), "Realmsync server running");

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
