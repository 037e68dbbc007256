//! Records exchanged with the store.

use std::time::SystemTime;

use realmsync_protocol::{
    AccountId, CharacterId, ItemId, ResourceId, ResourceView, SlotView, ZoneId,
};

/// A durable character row. One per account.
#[derive(Debug, Clone, PartialEq)]
pub struct Character {
    pub id: CharacterId,
    pub account_id: AccountId,
    pub name: String,
    pub zone_id: ZoneId,
    pub x: f64,
    pub y: f64,
    pub level: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub max_mp: u32,
    /// Slot capacity of the character's inventory.
    pub inventory_slots: u32,
}

/// Everything needed to create a character; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCharacter {
    pub account_id: AccountId,
    pub name: String,
    pub zone_id: ZoneId,
    pub x: f64,
    pub y: f64,
    pub level: u32,
    pub hp: u32,
    pub mp: u32,
    pub inventory_slots: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
}

/// A resource node row.
///
/// `active` only ever goes from `true` to `false`; see
/// [`WorldStore::deactivate_resource`](crate::WorldStore::deactivate_resource).
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceNode {
    pub id: ResourceId,
    pub zone_id: ZoneId,
    pub resource_type: String,
    pub x: f64,
    pub y: f64,
    pub active: bool,
    pub spawned_at: SystemTime,
}

impl ResourceNode {
    /// Euclidean distance from `(x, y)` to the node.
    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (self.x - x).hypot(self.y - y)
    }

    pub fn view(&self) -> ResourceView {
        ResourceView {
            id: self.id,
            zone_id: self.zone_id,
            resource_type: self.resource_type.clone(),
            x: self.x,
            y: self.y,
        }
    }
}

/// A node to insert; it is always inserted active.
#[derive(Debug, Clone, PartialEq)]
pub struct NewResource {
    pub zone_id: ZoneId,
    pub resource_type: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySlot {
    pub character_id: CharacterId,
    pub item_id: ItemId,
    pub quantity: u32,
    pub slot_index: u32,
}

impl InventorySlot {
    pub fn view(&self) -> SlotView {
        SlotView {
            slot_index: self.slot_index,
            item_id: self.item_id,
            quantity: self.quantity,
        }
    }
}
