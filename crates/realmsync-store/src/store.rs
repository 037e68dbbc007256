//! The store contract.

use std::future::Future;

use realmsync_protocol::{AccountId, CharacterId, ItemId, ResourceId, ZoneId};

use crate::{
    Character, InventorySlot, NewCharacter, NewResource, ResourceNode,
    StoreError, Zone,
};

/// The narrow interface the core needs from durable storage.
///
/// Every call may block on I/O, so every call is async. Futures are
/// `Send` because they are awaited from connection tasks and background
/// timers on the multi-threaded runtime.
///
/// Implementations decide their own connection handling; callers wrap
/// calls in their own timeouts.
pub trait WorldStore: Send + Sync + 'static {
    // -- characters --------------------------------------------------------

    /// The character owned by `account`, if any.
    fn find_character(
        &self,
        account: AccountId,
    ) -> impl Future<Output = Result<Option<Character>, StoreError>> + Send;

    /// Creates the account's character.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if the account already has one. Callers
    /// racing to create the same character should reload on conflict.
    fn create_character(
        &self,
        new: NewCharacter,
    ) -> impl Future<Output = Result<Character, StoreError>> + Send;

    /// Persists a character's zone and position.
    fn update_position(
        &self,
        character: CharacterId,
        zone: ZoneId,
        x: f64,
        y: f64,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    // -- zones -------------------------------------------------------------

    fn find_zone(
        &self,
        zone: ZoneId,
    ) -> impl Future<Output = Result<Option<Zone>, StoreError>> + Send;

    fn list_zones(
        &self,
    ) -> impl Future<Output = Result<Vec<Zone>, StoreError>> + Send;

    // -- resources ---------------------------------------------------------

    /// Inserts an active node and returns it with its new id.
    fn insert_resource(
        &self,
        new: NewResource,
    ) -> impl Future<Output = Result<ResourceNode, StoreError>> + Send;

    /// Looks a node up regardless of its `active` flag.
    fn find_resource(
        &self,
        id: ResourceId,
    ) -> impl Future<Output = Result<Option<ResourceNode>, StoreError>> + Send;

    /// All active nodes, ordered by zone then id.
    fn list_active_resources(
        &self,
    ) -> impl Future<Output = Result<Vec<ResourceNode>, StoreError>> + Send;

    fn count_active_resources(
        &self,
        zone: ZoneId,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Conditionally retires a node: sets `active = false` only if it is
    /// currently `true`, as one atomic step.
    ///
    /// Returns `Ok(true)` to exactly one caller per node; every other call
    /// (concurrent or later) gets `Ok(false)`. Missing nodes are `Ok(false)`.
    fn deactivate_resource(
        &self,
        id: ResourceId,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;

    // -- inventories -------------------------------------------------------

    /// A character's slots ordered by `slot_index`.
    fn inventory(
        &self,
        character: CharacterId,
    ) -> impl Future<Output = Result<Vec<InventorySlot>, StoreError>> + Send;

    /// Inserts a new slot.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if the character already has a slot at
    /// that index or already holds that item.
    fn insert_slot(
        &self,
        slot: InventorySlot,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Adds `quantity` to the slot holding `item` and returns the result.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the character holds no such item.
    fn increment_slot(
        &self,
        character: CharacterId,
        item: ItemId,
        quantity: u32,
    ) -> impl Future<Output = Result<InventorySlot, StoreError>> + Send;
}
