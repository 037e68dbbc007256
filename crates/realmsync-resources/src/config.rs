use std::ops::RangeInclusive;
use std::time::Duration;

use realmsync_protocol::ItemId;

/// A kind of node and the item gathering it yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceType {
    pub name: String,
    pub item_id: ItemId,
}

impl ResourceType {
    pub fn new(name: impl Into<String>, item_id: u64) -> Self {
        Self {
            name: name.into(),
            item_id: ItemId(item_id),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// Spawn placement is uniform over `[0, map_size]` on both axes.
    pub map_size: f64,
    /// Furthest a character may stand from a node and still gather it.
    pub gather_radius: f64,
    /// Active node ceiling per zone.
    pub max_per_zone: usize,
    /// Delay before a gathered node is replaced.
    pub respawn_delay: Duration,
    /// How often every zone is topped back up to the ceiling.
    pub top_up_interval: Duration,
    /// Upper bound on each individual store call. Batches such as a zone
    /// top-up are bounded per call, never as a whole.
    pub call_timeout: Duration,
    /// Quantity yielded per gather, drawn uniformly.
    pub yield_range: RangeInclusive<u32>,
    pub types: Vec<ResourceType>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            map_size: 2048.0,
            gather_radius: 50.0,
            max_per_zone: 100,
            respawn_delay: Duration::from_secs(300),
            top_up_interval: Duration::from_secs(60),
            call_timeout: Duration::from_secs(3),
            yield_range: 1..=3,
            types: vec![
                ResourceType::new("wood", 1),
                ResourceType::new("stone", 2),
                ResourceType::new("iron_ore", 3),
            ],
        }
    }
}

impl ResourceConfig {
    /// The item a node of type `name` yields.
    pub fn item_for(&self, name: &str) -> Option<ItemId> {
        self.types.iter().find(|t| t.name == name).map(|t| t.item_id)
    }
}
