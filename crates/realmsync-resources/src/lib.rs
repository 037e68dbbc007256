//! Resource lifecycle for Realmsync.
//!
//! A resource node is born active, is consumed by exactly one gather, and
//! is replaced (under a new id) after the respawn delay. The
//! [`ResourceEngine`] owns that lifecycle:
//!
//! ```text
//! ensure_zone_capacity ──→ [active] ──gather──→ [inactive]   (terminal)
//!        ▲                                          │
//!        └──────── respawn queue (zone, due) ◀──────┘
//! ```
//!
//! Two kinds of contention are resolved here. Racing gathers on one node
//! are settled by the store's conditional deactivate, so exactly one
//! caller wins. Racing gathers by one character are serialised by a
//! per-character lock around slot allocation.
//!
//! Every store call is bounded by [`ResourceConfig::call_timeout`]. Once a
//! gather has consumed its node, the rest of it runs on its own task, so
//! the item and the respawn survive a caller that stops waiting.

mod config;
mod engine;
mod error;
mod event;
mod slot;

pub use config::{ResourceConfig, ResourceType};
pub use engine::{GatherOutcome, ResourceEngine, ZoneCapacity};
pub use error::ResourceError;
pub use event::ResourceEvent;
