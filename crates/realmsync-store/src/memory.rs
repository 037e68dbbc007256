//! In-process [`WorldStore`] backend.
//!
//! All tables live behind one async mutex, so each trait call is one
//! atomic step, which is exactly the transactional behaviour the contract
//! asks of a real database. Two test hooks simulate an unhealthy
//! backend: [`MemoryStore::set_available`] and [`MemoryStore::set_latency`].

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use realmsync_protocol::{AccountId, CharacterId, ItemId, ResourceId, ZoneId};
use tokio::sync::Mutex;

use crate::{
    Character, InventorySlot, NewCharacter, NewResource, ResourceNode,
    StoreError, WorldStore, Zone,
};

#[derive(Default)]
struct Tables {
    characters: HashMap<CharacterId, Character>,
    by_account: HashMap<AccountId, CharacterId>,
    zones: BTreeMap<ZoneId, Zone>,
    resources: BTreeMap<ResourceId, ResourceNode>,
    inventories: HashMap<CharacterId, Vec<InventorySlot>>,
    next_character: u64,
    next_resource: u64,
}

/// A [`WorldStore`] held entirely in memory.
pub struct MemoryStore {
    tables: Mutex<Tables>,
    available: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryStore {
    /// An empty store with no zones.
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(Tables {
                next_character: 1,
                next_resource: 1,
                ..Tables::default()
            }),
            available: AtomicBool::new(true),
            latency_ms: AtomicU64::new(0),
        }
    }

    /// A store seeded with the given zones.
    pub fn with_zones<'a>(
        zones: impl IntoIterator<Item = (u64, &'a str)>,
    ) -> Self {
        let mut store = Self::new();
        {
            let tables = store.tables.get_mut();
            for (id, name) in zones {
                tables.zones.insert(
                    ZoneId(id),
                    Zone {
                        id: ZoneId(id),
                        name: name.to_string(),
                    },
                );
            }
        }
        store
    }

    /// The default world: starting zone, forest, mountain.
    pub fn default_world() -> Self {
        Self::with_zones([(1, "starting"), (2, "forest"), (3, "mountain")])
    }

    /// While `false`, every call fails with [`StoreError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Delays every call by `latency` before it touches the tables.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Inserts a node directly, bypassing the engine. For seeding tests.
    pub async fn seed_resource(
        &self,
        zone: ZoneId,
        resource_type: &str,
        x: f64,
        y: f64,
    ) -> ResourceNode {
        let mut tables = self.tables.lock().await;
        insert_resource(
            &mut tables,
            NewResource {
                zone_id: zone,
                resource_type: resource_type.to_string(),
                x,
                y,
            },
        )
    }

    async fn enter(&self) -> Result<tokio::sync::MutexGuard<'_, Tables>, StoreError> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(self.tables.lock().await)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_resource(tables: &mut Tables, new: NewResource) -> ResourceNode {
    let id = ResourceId(tables.next_resource);
    tables.next_resource += 1;
    let node = ResourceNode {
        id,
        zone_id: new.zone_id,
        resource_type: new.resource_type,
        x: new.x,
        y: new.y,
        active: true,
        spawned_at: SystemTime::now(),
    };
    tables.resources.insert(id, node.clone());
    node
}

impl WorldStore for MemoryStore {
    async fn find_character(
        &self,
        account: AccountId,
    ) -> Result<Option<Character>, StoreError> {
        let tables = self.enter().await?;
        Ok(tables
            .by_account
            .get(&account)
            .and_then(|id| tables.characters.get(id))
            .cloned())
    }

    async fn create_character(
        &self,
        new: NewCharacter,
    ) -> Result<Character, StoreError> {
        let mut tables = self.enter().await?;
        if tables.by_account.contains_key(&new.account_id) {
            return Err(StoreError::Conflict(format!(
                "account {} already has a character",
                new.account_id
            )));
        }
        let id = CharacterId(tables.next_character);
        tables.next_character += 1;
        let character = Character {
            id,
            account_id: new.account_id,
            name: new.name,
            zone_id: new.zone_id,
            x: new.x,
            y: new.y,
            level: new.level,
            hp: new.hp,
            max_hp: new.hp,
            mp: new.mp,
            max_mp: new.mp,
            inventory_slots: new.inventory_slots,
        };
        tables.by_account.insert(new.account_id, id);
        tables.characters.insert(id, character.clone());
        tracing::debug!(character_id = %id, account_id = %new.account_id, "character created");
        Ok(character)
    }

    async fn update_position(
        &self,
        character: CharacterId,
        zone: ZoneId,
        x: f64,
        y: f64,
    ) -> Result<(), StoreError> {
        let mut tables = self.enter().await?;
        let row = tables
            .characters
            .get_mut(&character)
            .ok_or_else(|| StoreError::NotFound(format!("character {character}")))?;
        row.zone_id = zone;
        row.x = x;
        row.y = y;
        Ok(())
    }

    async fn find_zone(&self, zone: ZoneId) -> Result<Option<Zone>, StoreError> {
        let tables = self.enter().await?;
        Ok(tables.zones.get(&zone).cloned())
    }

    async fn list_zones(&self) -> Result<Vec<Zone>, StoreError> {
        let tables = self.enter().await?;
        Ok(tables.zones.values().cloned().collect())
    }

    async fn insert_resource(
        &self,
        new: NewResource,
    ) -> Result<ResourceNode, StoreError> {
        let mut tables = self.enter().await?;
        Ok(insert_resource(&mut tables, new))
    }

    async fn find_resource(
        &self,
        id: ResourceId,
    ) -> Result<Option<ResourceNode>, StoreError> {
        let tables = self.enter().await?;
        Ok(tables.resources.get(&id).cloned())
    }

    async fn list_active_resources(&self) -> Result<Vec<ResourceNode>, StoreError> {
        let tables = self.enter().await?;
        let mut active: Vec<ResourceNode> = tables
            .resources
            .values()
            .filter(|node| node.active)
            .cloned()
            .collect();
        active.sort_by_key(|node| (node.zone_id, node.id));
        Ok(active)
    }

    async fn count_active_resources(&self, zone: ZoneId) -> Result<usize, StoreError> {
        let tables = self.enter().await?;
        Ok(tables
            .resources
            .values()
            .filter(|node| node.active && node.zone_id == zone)
            .count())
    }

    async fn deactivate_resource(&self, id: ResourceId) -> Result<bool, StoreError> {
        let mut tables = self.enter().await?;
        match tables.resources.get_mut(&id) {
            Some(node) if node.active => {
                node.active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn inventory(
        &self,
        character: CharacterId,
    ) -> Result<Vec<InventorySlot>, StoreError> {
        let tables = self.enter().await?;
        Ok(tables
            .inventories
            .get(&character)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_slot(&self, slot: InventorySlot) -> Result<(), StoreError> {
        let mut tables = self.enter().await?;
        let slots = tables.inventories.entry(slot.character_id).or_default();
        if slots.iter().any(|s| s.slot_index == slot.slot_index) {
            return Err(StoreError::Conflict(format!(
                "slot {} of {} is taken",
                slot.slot_index, slot.character_id
            )));
        }
        if slots.iter().any(|s| s.item_id == slot.item_id) {
            return Err(StoreError::Conflict(format!(
                "{} already holds {}",
                slot.character_id, slot.item_id
            )));
        }
        slots.push(slot);
        slots.sort_by_key(|s| s.slot_index);
        Ok(())
    }

    async fn increment_slot(
        &self,
        character: CharacterId,
        item: ItemId,
        quantity: u32,
    ) -> Result<InventorySlot, StoreError> {
        let mut tables = self.enter().await?;
        let slot = tables
            .inventories
            .get_mut(&character)
            .and_then(|slots| slots.iter_mut().find(|s| s.item_id == item))
            .ok_or_else(|| StoreError::NotFound(format!("{item} slot of {character}")))?;
        slot.quantity = slot.quantity.saturating_add(quantity);
        Ok(slot.clone())
    }
}
