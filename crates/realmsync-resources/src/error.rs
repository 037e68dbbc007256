//! Error types for the resource layer.

use realmsync_protocol::{AccountId, CharacterId, ErrorClass, ResourceId};
use realmsync_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// The node does not exist, is already gathered, or another gather
    /// won the race for it.
    #[error("resource {0} not found or already gathered")]
    NotFound(ResourceId),

    #[error("character not found for {0}")]
    CharacterNotFound(AccountId),

    /// The character is in another zone or further than the gather radius.
    #[error("too far from resource {0}")]
    TooFar(ResourceId),

    /// No slot holds the item and every slot index is taken.
    #[error("inventory full for {0}")]
    InventoryFull(CharacterId),

    /// A node's type has no configured item.
    #[error("no item configured for resource type {0:?}")]
    UnknownType(String),

    /// A store call did not answer within `call_timeout`.
    #[error("store call {0} timed out")]
    Timeout(&'static str),

    /// The task crediting a consumed node died before reporting back.
    #[error("gather settlement interrupted: {0}")]
    Interrupted(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ResourceError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotFound(_) => ErrorClass::Contention,
            Self::CharacterNotFound(_) | Self::TooFar(_) | Self::InventoryFull(_) => {
                ErrorClass::Validation
            }
            Self::UnknownType(_) | Self::Timeout(_) | Self::Interrupted(_) => {
                ErrorClass::Downstream
            }
            Self::Store(e) => e.class(),
        }
    }
}
