//! Error types for the world layer.

use realmsync_protocol::{AccountId, ErrorClass, ZoneId};
use realmsync_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// Outside `0..=map_size` on either axis, or not a finite number.
    #[error("invalid coordinates ({x}, {y})")]
    InvalidCoordinates { x: f64, y: f64 },

    #[error("zone {0} not found")]
    ZoneNotFound(ZoneId),

    /// The account has no live player; it must spawn first.
    #[error("player {0} is not spawned")]
    NotSpawned(AccountId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorldError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidCoordinates { .. }
            | Self::ZoneNotFound(_)
            | Self::NotSpawned(_) => ErrorClass::Validation,
            Self::Store(e) => e.class(),
        }
    }
}
