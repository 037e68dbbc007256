//! Unified error type for the Realmsync gateway.

use realmsync_protocol::{ErrorClass, ProtocolError};
use realmsync_resources::ResourceError;
use realmsync_session::SessionError;
use realmsync_store::StoreError;
use realmsync_transport::TransportError;
use realmsync_world::WorldError;

use crate::ServiceError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum RealmsyncError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, malformed action).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Handshake or authentication failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A forwarded action's service failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A downstream call did not finish within `downstream_timeout`.
    #[error("{0} timed out")]
    Timeout(&'static str),
}

impl RealmsyncError {
    /// Which kind of failure this is, as far as a client is concerned.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Transport(_) | Self::Timeout(_) => ErrorClass::Downstream,
            Self::Protocol(e) => e.class(),
            Self::Session(e) => e.class(),
            Self::World(e) => e.class(),
            Self::Resource(e) => e.class(),
            Self::Store(e) => e.class(),
            Self::Service(e) => e.class(),
        }
    }

    /// The message a client may see: the error itself when its class is
    /// client-visible, a generic one otherwise.
    pub fn client_message(&self) -> String {
        if self.class().is_client_visible() {
            self.to_string()
        } else {
            "internal error".to_string()
        }
    }
}
