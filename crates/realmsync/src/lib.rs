//! # Realmsync
//!
//! Multiplayer world coordination core.
//!
//! Realmsync sits between game clients and durable storage. It
//! authenticates WebSocket connections against an external identity
//! oracle, keeps a live mirror of where every player is, owns the
//! lifecycle of gatherable resource nodes, and pushes a consolidated world
//! snapshot to every client once a second.
//!
//! Embedders supply two things: a [`WorldStore`](realmsync_store::WorldStore)
//! and an [`IdentityOracle`](realmsync_session::IdentityOracle). Combat and
//! crafting live elsewhere; register an [`ActionService`] to have those
//! actions forwarded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use realmsync::prelude::*;
//!
//! # async fn start() -> Result<(), RealmsyncError> {
//! let oracle = StaticTokenOracle::parse("dev-token=1:alice")?;
//! let server = RealmsyncServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build(Arc::new(MemoryStore::default_world()), oracle)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod background;
mod config;
mod dispatch;
mod error;
mod handler;
mod health;
mod server;
mod service;

pub use config::ServerConfig;
pub use error::RealmsyncError;
pub use health::SERVICE_NAME;
pub use server::{RealmsyncServer, RealmsyncServerBuilder};
pub use service::{ActionService, NoActionService, ServiceError};

/// Re-exports of everything needed to embed and talk to a Realmsync
/// server.
pub mod prelude {
    pub use crate::{
        ActionService, NoActionService, RealmsyncError, RealmsyncServer,
        RealmsyncServerBuilder, ServerConfig, ServiceError,
    };

    pub use realmsync_protocol::{
        AccountId, Action, ActionKind, ActionReply, CharacterId, ClientMessage,
        Codec, Envelope, ErrorClass, HealthStatus, ItemId, JsonCodec,
        PlayerView, ResourceId, ResourceView, ServerMessage, SlotView,
        WorldEvent, WorldUpdate, ZoneId,
    };
    pub use realmsync_resources::{ResourceConfig, ResourceType};
    pub use realmsync_session::{
        Identity, IdentityOracle, SessionConfig, SessionError,
        StaticTokenOracle,
    };
    pub use realmsync_store::{MemoryStore, StoreError, WorldStore};
    pub use realmsync_world::WorldConfig;
}
