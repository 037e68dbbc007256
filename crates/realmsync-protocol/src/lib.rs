//! Wire protocol for Realmsync.
//!
//! This crate defines what travels between a game client and the gateway:
//!
//! - **Identifiers** ([`AccountId`], [`CharacterId`], [`ZoneId`],
//!   [`ResourceId`], [`ItemId`]) shared by every layer above.
//! - **Messages** ([`Envelope`], [`ClientMessage`], [`ServerMessage`],
//!   [`WorldEvent`]) and the typed [`Action`] parsed out of an action frame.
//! - **Views** ([`PlayerView`], [`ResourceView`], [`SlotView`]): the
//!   client-facing shape of world state.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//! - **Errors** ([`ProtocolError`], and the [`ErrorClass`] taxonomy every
//!   layer classifies into).
//!
//! ```text
//! Transport (frames) → Protocol (Envelope) → Session / Gateway
//! ```

mod action;
mod codec;
mod error;
mod ids;
mod message;
mod view;

pub use action::{Action, ActionKind, GatherPayload, MovePayload, TeleportPayload};
pub use codec::{Codec, JsonCodec};
pub use error::{ErrorClass, ProtocolError};
pub use ids::{AccountId, CharacterId, ItemId, ResourceId, ZoneId};
pub use message::{
    ActionReply, ClientMessage, Envelope, HealthStatus, ServerMessage,
    WorldEvent, WorldUpdate,
};
pub use view::{PlayerView, ResourceView, SlotView};
