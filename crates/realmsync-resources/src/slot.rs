//! Inventory slot planning.

use realmsync_protocol::ItemId;
use realmsync_store::InventorySlot;

/// Where a gathered item will go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SlotPlan {
    /// The item already has a slot; add to it.
    Increment,
    /// Open a new slot at this index.
    Insert(u32),
}

/// Plans where `item` goes in `slots`. `None` means the inventory is full.
///
/// Must be called under the character's inventory lock, and the plan
/// committed before the lock is released.
pub(crate) fn plan_slot(
    slots: &[InventorySlot],
    item: ItemId,
    capacity: u32,
) -> Option<SlotPlan> {
    if slots.iter().any(|s| s.item_id == item) {
        return Some(SlotPlan::Increment);
    }
    (0..capacity)
        .find(|index| slots.iter().all(|s| s.slot_index != *index))
        .map(SlotPlan::Insert)
}
