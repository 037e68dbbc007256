//! The resource engine.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use rand::seq::IndexedRandom;
use realmsync_protocol::{AccountId, CharacterId, ItemId, ResourceId, ZoneId};
use realmsync_schedule::{RespawnQueue, Ticker};
use realmsync_store::{InventorySlot, NewResource, ResourceNode, StoreError, WorldStore};
use tokio::sync::{Mutex, Notify, OwnedMutexGuard, broadcast};
use tokio::time::Instant;

use crate::slot::{SlotPlan, plan_slot};
use crate::{ResourceConfig, ResourceError, ResourceEvent};

const EVENT_CAPACITY: usize = 1024;

/// A successful gather.
#[derive(Debug, Clone, PartialEq)]
pub struct GatherOutcome {
    pub resource_id: ResourceId,
    pub zone_id: ZoneId,
    pub resource_type: String,
    pub item_id: ItemId,
    pub quantity: u32,
    /// The character's whole inventory after the gather, by slot index.
    pub inventory: Vec<InventorySlot>,
    /// Always `true`: a gathered node never stays in the world.
    pub despawned: bool,
}

/// A zone's active node count against its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneCapacity {
    pub zone_id: ZoneId,
    pub active: usize,
    pub ceiling: usize,
}

/// Owns node population, gathering, and respawns.
pub struct ResourceEngine<S> {
    store: Arc<S>,
    config: ResourceConfig,
    /// One lock per character, held across slot planning and commit.
    inventory_locks: DashMap<CharacterId, Arc<Mutex<()>>>,
    /// One lock per zone, held across count-then-spawn.
    zone_locks: DashMap<ZoneId, Arc<Mutex<()>>>,
    respawns: Arc<Respawns>,
    events: broadcast::Sender<ResourceEvent>,
}

/// The respawn queue and the signal that wakes its driver.
#[derive(Default)]
struct Respawns {
    queue: Mutex<RespawnQueue<ZoneId>>,
    scheduled: Notify,
}

impl Respawns {
    async fn schedule(&self, delay: Duration, zone_id: ZoneId) {
        self.queue.lock().await.schedule_after(delay, zone_id);
        self.scheduled.notify_one();
    }
}

/// Runs one store call under `limit`.
async fn bounded<T>(
    limit: Duration,
    what: &'static str,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, ResourceError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(ResourceError::Timeout(what)),
    }
}

/// A node this gather has already consumed, and where its yield goes.
struct Claim {
    account_id: AccountId,
    character_id: CharacterId,
    resource_id: ResourceId,
    zone_id: ZoneId,
    item_id: ItemId,
    quantity: u32,
    plan: SlotPlan,
}

/// Everything the post-commit half of a gather needs, detached from the
/// engine so it can run on its own task.
struct Settlement<S> {
    store: Arc<S>,
    respawns: Arc<Respawns>,
    events: broadcast::Sender<ResourceEvent>,
    call_timeout: Duration,
    respawn_delay: Duration,
}

impl<S: WorldStore> Settlement<S> {
    /// Credits the yield, schedules the replacement node and announces the
    /// despawn. Holds the character's inventory lock until the credit is
    /// committed.
    async fn settle(
        self,
        claim: Claim,
        _inventory: OwnedMutexGuard<()>,
    ) -> Result<Vec<InventorySlot>, ResourceError> {
        let Claim {
            account_id,
            character_id,
            resource_id,
            zone_id,
            item_id,
            quantity,
            plan,
        } = claim;

        let committed = match plan {
            SlotPlan::Increment => bounded(
                self.call_timeout,
                "inventory increment",
                self.store.increment_slot(character_id, item_id, quantity),
            )
            .await
            .map(drop),
            SlotPlan::Insert(slot_index) => {
                bounded(
                    self.call_timeout,
                    "inventory insert",
                    self.store.insert_slot(InventorySlot {
                        character_id,
                        item_id,
                        quantity,
                        slot_index,
                    }),
                )
                .await
            }
        };

        // The node is gone whether or not the item landed.
        self.respawns.schedule(self.respawn_delay, zone_id).await;
        // No subscribers is fine.
        let _ = self.events.send(ResourceEvent::Despawned {
            resource_id,
            zone_id,
            gatherer: account_id,
        });

        if let Err(e) = committed {
            tracing::error!(
                %account_id,
                %resource_id,
                %item_id,
                quantity,
                error = %e,
                "node consumed but inventory commit failed"
            );
            return Err(e);
        }

        bounded(self.call_timeout, "inventory", self.store.inventory(character_id)).await
    }
}

fn lock_for<K>(locks: &DashMap<K, Arc<Mutex<()>>>, key: K) -> Arc<Mutex<()>>
where
    K: Eq + std::hash::Hash,
{
    Arc::clone(&locks.entry(key).or_default())
}

impl<S: WorldStore> ResourceEngine<S> {
    pub fn new(store: Arc<S>, config: ResourceConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            config,
            inventory_locks: DashMap::new(),
            zone_locks: DashMap::new(),
            respawns: Arc::new(Respawns::default()),
            events,
        }
    }

    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Every spawn and despawn from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceEvent> {
        self.events.subscribe()
    }

    /// Runs one store call under `call_timeout`.
    async fn call<T>(
        &self,
        what: &'static str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, ResourceError> {
        bounded(self.config.call_timeout, what, call).await
    }

    fn settlement(&self) -> Settlement<S> {
        Settlement {
            store: Arc::clone(&self.store),
            respawns: Arc::clone(&self.respawns),
            events: self.events.clone(),
            call_timeout: self.config.call_timeout,
            respawn_delay: self.config.respawn_delay,
        }
    }

    /// Characters with a gather in flight or a lock not yet pruned.
    pub fn inventory_locks(&self) -> usize {
        self.inventory_locks.len()
    }

    /// Drops inventory locks nobody holds.
    ///
    /// `lock_for` clones under the map's shard lock, so an entry seen here
    /// with a strong count of one has no holder and no pending waiter.
    fn prune_inventory_locks(&self) {
        self.inventory_locks
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    fn publish(&self, event: ResourceEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    // -- gathering ----------------------------------------------------------

    /// Consumes a node into the account's character's inventory.
    ///
    /// Validation and slot planning happen before the node is touched, so
    /// a rejected gather (too far, inventory full) leaves the node active.
    /// Exactly one of any number of concurrent gathers on a node succeeds;
    /// the rest get [`ResourceError::NotFound`].
    ///
    /// Once the node is consumed, crediting the yield and scheduling the
    /// respawn run on a spawned task. Dropping this future after that point
    /// does not lose the item.
    pub async fn gather(
        &self,
        account_id: AccountId,
        resource_id: ResourceId,
    ) -> Result<GatherOutcome, ResourceError> {
        let outcome = self.try_gather(account_id, resource_id).await;
        self.prune_inventory_locks();
        outcome
    }

    async fn try_gather(
        &self,
        account_id: AccountId,
        resource_id: ResourceId,
    ) -> Result<GatherOutcome, ResourceError> {
        let node = self
            .call("resource lookup", self.store.find_resource(resource_id))
            .await?
            .filter(|n| n.active)
            .ok_or(ResourceError::NotFound(resource_id))?;

        let character = self
            .call("character lookup", self.store.find_character(account_id))
            .await?
            .ok_or(ResourceError::CharacterNotFound(account_id))?;

        if character.zone_id != node.zone_id
            || node.distance_to(character.x, character.y) > self.config.gather_radius
        {
            return Err(ResourceError::TooFar(resource_id));
        }

        let item_id = self
            .config
            .item_for(&node.resource_type)
            .ok_or_else(|| ResourceError::UnknownType(node.resource_type.clone()))?;

        let guard = lock_for(&self.inventory_locks, character.id)
            .lock_owned()
            .await;

        let slots = self
            .call("inventory", self.store.inventory(character.id))
            .await?;
        let plan = plan_slot(&slots, item_id, character.inventory_slots)
            .ok_or(ResourceError::InventoryFull(character.id))?;

        if !self
            .call("resource deactivate", self.store.deactivate_resource(resource_id))
            .await?
        {
            tracing::debug!(%account_id, %resource_id, "lost gather race");
            return Err(ResourceError::NotFound(resource_id));
        }

        let quantity = {
            let range = self.config.yield_range.clone();
            rand::rng().random_range(range)
        };
        let claim = Claim {
            account_id,
            character_id: character.id,
            resource_id,
            zone_id: node.zone_id,
            item_id,
            quantity,
            plan,
        };
        let inventory = tokio::spawn(self.settlement().settle(claim, guard))
            .await
            .map_err(|e| ResourceError::Interrupted(e.to_string()))??;

        tracing::info!(
            %account_id,
            %resource_id,
            %item_id,
            quantity,
            "resource gathered"
        );

        Ok(GatherOutcome {
            resource_id,
            zone_id: node.zone_id,
            resource_type: node.resource_type,
            item_id,
            quantity,
            inventory,
            despawned: true,
        })
    }

    // -- population ---------------------------------------------------------

    /// Spawns nodes in `zone_id` until its active count reaches the
    /// ceiling. Returns the new nodes.
    pub async fn ensure_zone_capacity(
        &self,
        zone_id: ZoneId,
    ) -> Result<Vec<ResourceNode>, ResourceError> {
        let lock = lock_for(&self.zone_locks, zone_id);
        let _guard = lock.lock().await;

        let active = self
            .call("active count", self.store.count_active_resources(zone_id))
            .await?;
        let missing = self.config.max_per_zone.saturating_sub(active);
        let mut spawned = Vec::with_capacity(missing);
        for _ in 0..missing {
            spawned.push(self.spawn_node(zone_id).await?);
        }

        if !spawned.is_empty() {
            tracing::info!(%zone_id, spawned = spawned.len(), "zone topped up");
        }
        Ok(spawned)
    }

    /// Runs [`ensure_zone_capacity`](Self::ensure_zone_capacity) for every
    /// zone in the store. Returns how many nodes were spawned.
    pub async fn ensure_all_zones(&self) -> Result<usize, ResourceError> {
        let zones = self.call("zone listing", self.store.list_zones()).await?;
        let mut total = 0;
        for zone in zones {
            total += self.ensure_zone_capacity(zone.id).await?.len();
        }
        Ok(total)
    }

    /// Must be called under the zone's lock.
    async fn spawn_node(&self, zone_id: ZoneId) -> Result<ResourceNode, ResourceError> {
        let new = {
            let mut rng = rand::rng();
            let resource_type = self
                .config
                .types
                .choose(&mut rng)
                .map(|t| t.name.clone())
                .ok_or_else(|| ResourceError::UnknownType(String::new()))?;
            NewResource {
                zone_id,
                resource_type,
                x: rng.random_range(0.0..=self.config.map_size),
                y: rng.random_range(0.0..=self.config.map_size),
            }
        };

        let node = self
            .call("resource insert", self.store.insert_resource(new))
            .await?;
        tracing::debug!(
            %zone_id,
            resource_id = %node.id,
            resource_type = %node.resource_type,
            "node spawned"
        );
        self.publish(ResourceEvent::Spawned(node.clone()));
        Ok(node)
    }

    // -- respawn ------------------------------------------------------------

    /// Replaces one node per respawn entry due at or before `now`, as long
    /// as the zone is still below its ceiling. Returns the new nodes.
    ///
    /// A store failure for one entry is logged and the entry dropped; the
    /// recurring top-up restores the zone later.
    pub async fn process_due_respawns(&self, now: Instant) -> Vec<ResourceNode> {
        let due = self.respawns.queue.lock().await.pop_due(now);
        let mut spawned = Vec::new();
        for zone_id in due {
            match self.respawn_one(zone_id).await {
                Ok(Some(node)) => spawned.push(node),
                Ok(None) => {
                    tracing::debug!(%zone_id, "respawn skipped, zone at ceiling");
                }
                Err(e) => {
                    tracing::warn!(%zone_id, error = %e, "respawn failed");
                }
            }
        }
        spawned
    }

    async fn respawn_one(
        &self,
        zone_id: ZoneId,
    ) -> Result<Option<ResourceNode>, ResourceError> {
        let lock = lock_for(&self.zone_locks, zone_id);
        let _guard = lock.lock().await;

        let active = self
            .call("active count", self.store.count_active_resources(zone_id))
            .await?;
        if active >= self.config.max_per_zone {
            return Ok(None);
        }
        self.spawn_node(zone_id).await.map(Some)
    }

    /// Respawns waiting in the queue.
    pub async fn pending_respawns(&self) -> usize {
        self.respawns.queue.lock().await.len()
    }

    /// Drives the respawn queue forever: sleeps until the earliest entry
    /// falls due (or a new entry is scheduled) and processes what is due.
    pub async fn run_respawns(&self) {
        loop {
            let next = self.respawns.queue.lock().await.next_due();
            match next {
                Some(due) => {
                    tokio::select! {
                        _ = tokio::time::sleep_until(due) => {}
                        _ = self.respawns.scheduled.notified() => continue,
                    }
                }
                None => {
                    self.respawns.scheduled.notified().await;
                    continue;
                }
            }
            self.process_due_respawns(Instant::now()).await;
        }
    }

    /// Tops every zone up to its ceiling once per `top_up_interval`,
    /// forever.
    pub async fn run_top_up(&self) {
        let mut ticker = Ticker::every(self.config.top_up_interval);
        loop {
            ticker.wait_for_tick().await;
            match self.ensure_all_zones().await {
                Ok(0) => {}
                Ok(spawned) => tracing::debug!(spawned, "periodic top-up"),
                Err(e) => tracing::warn!(error = %e, "periodic top-up failed"),
            }
            ticker.record_tick_end();
        }
    }

    // -- queries ------------------------------------------------------------

    /// Every active node, ordered by zone then id.
    pub async fn active_nodes(&self) -> Result<Vec<ResourceNode>, ResourceError> {
        self.call("active listing", self.store.list_active_resources())
            .await
    }

    /// Active nodes in one zone.
    pub async fn zone_nodes(
        &self,
        zone_id: ZoneId,
    ) -> Result<Vec<ResourceNode>, ResourceError> {
        let mut nodes = self.active_nodes().await?;
        nodes.retain(|n| n.zone_id == zone_id);
        Ok(nodes)
    }

    pub async fn zone_capacity(
        &self,
        zone_id: ZoneId,
    ) -> Result<ZoneCapacity, ResourceError> {
        Ok(ZoneCapacity {
            zone_id,
            active: self
                .call("active count", self.store.count_active_resources(zone_id))
                .await?,
            ceiling: self.config.max_per_zone,
        })
    }
}
