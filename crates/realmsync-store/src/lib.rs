//! Persistent world store for Realmsync.
//!
//! The durable store (characters, zones, resource nodes, inventories) lives
//! outside this system. This crate pins down the narrow contract the core
//! needs from it ([`WorldStore`]), the records that cross that contract,
//! and [`MemoryStore`], an in-process backend used by tests and the dev
//! binary.
//!
//! Two operations carry the system's concurrency guarantees and every
//! backend must implement them as single conditional commits:
//!
//! - [`WorldStore::deactivate_resource`]: flips `active` only if it is
//!   still `true`, and reports whether this call did the flip.
//! - [`WorldStore::insert_slot`]: rejects a second slot with the same
//!   `(character, slot_index)` or `(character, item)`.

mod error;
mod memory;
mod model;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use model::{
    Character, InventorySlot, NewCharacter, NewResource, ResourceNode, Zone,
};
pub use store::WorldStore;
