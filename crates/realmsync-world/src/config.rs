use std::time::Duration;

use realmsync_protocol::ZoneId;

/// Map geometry, new-character defaults, and staleness timing.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Side length of every zone. Valid coordinates are `0..=map_size`.
    pub map_size: f64,
    /// Zone new characters start in.
    pub starting_zone: ZoneId,
    pub default_level: u32,
    pub default_hp: u32,
    pub default_mp: u32,
    pub inventory_slots: u32,
    /// A player whose last update is older than this is evicted.
    pub idle_threshold: Duration,
    /// How often the eviction sweep runs.
    pub sweep_interval: Duration,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            map_size: 2048.0,
            starting_zone: ZoneId(1),
            default_level: 1,
            default_hp: 100,
            default_mp: 50,
            inventory_slots: 20,
            idle_threshold: Duration::from_secs(30),
            sweep_interval: Duration::from_secs(10),
        }
    }
}

impl WorldConfig {
    /// Where new characters appear: the centre of the map.
    pub fn spawn_point(&self) -> (f64, f64) {
        (self.map_size / 2.0, self.map_size / 2.0)
    }

    /// Whether `(x, y)` is a finite point inside the map.
    pub fn in_bounds(&self, x: f64, y: f64) -> bool {
        let axis = |v: f64| v.is_finite() && (0.0..=self.map_size).contains(&v);
        axis(x) && axis(y)
    }
}
