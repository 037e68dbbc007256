//! Identifier newtypes.
//!
//! Every id is a `u64` on the wire (`#[serde(transparent)]`), but each has
//! its own type so a `ZoneId` can never be passed where a `ResourceId` is
//! expected. The `Display` prefixes keep log lines readable.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "-{}"), self.0)
            }
        }
    };
}

id_type!(
    /// An account as known to the identity oracle. One live session and
    /// one character per account.
    AccountId,
    "A"
);

id_type!(
    /// A persisted character row.
    CharacterId,
    "C"
);

id_type!(
    /// A zone: a bounded region with its own resource population.
    ZoneId,
    "Z"
);

id_type!(
    /// A resource node. Never reused: a respawn gets a fresh id.
    ResourceId,
    "N"
);

id_type!(
    /// An item type that can sit in an inventory slot.
    ItemId,
    "I"
);
