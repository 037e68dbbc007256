//! Client-facing views of world state.
//!
//! These are what snapshots and events carry. They deliberately omit
//! server-only bookkeeping (timestamps, the `active` flag, capacity).

use serde::{Deserialize, Serialize};

use crate::{AccountId, CharacterId, ItemId, ResourceId, ZoneId};

/// A tracked player as other clients see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub account_id: AccountId,
    pub character_id: CharacterId,
    pub name: String,
    pub zone_id: ZoneId,
    pub x: f64,
    pub y: f64,
    pub level: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub max_mp: u32,
}

/// An active resource node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceView {
    pub id: ResourceId,
    pub zone_id: ZoneId,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub x: f64,
    pub y: f64,
}

/// One inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub slot_index: u32,
    pub item_id: ItemId,
    pub quantity: u32,
}
