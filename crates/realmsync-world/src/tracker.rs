//! The live player mirror.

use std::collections::HashMap;
use std::sync::Arc;

use realmsync_protocol::{AccountId, ZoneId};
use realmsync_store::{NewCharacter, StoreError, WorldStore};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{LivePlayerState, WorldConfig, WorldError};

/// Tracks every spawned player and keeps the store in step.
///
/// Store calls are never made while the map lock is held. Writes that
/// depend on the mirror (move, teleport) read what they need, release the
/// lock, persist, then take the write lock again to apply.
pub struct WorldTracker<S> {
    store: Arc<S>,
    config: WorldConfig,
    players: RwLock<HashMap<AccountId, LivePlayerState>>,
}

impl<S: WorldStore> WorldTracker<S> {
    pub fn new(store: Arc<S>, config: WorldConfig) -> Self {
        Self {
            store,
            config,
            players: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Brings the account's character into the world.
    ///
    /// Loads the persisted character, or creates one at the spawn point of
    /// the starting zone. While the player is tracked a repeat spawn only
    /// refreshes `last_update` and returns the live state unchanged.
    pub async fn spawn(
        &self,
        account_id: AccountId,
        display_name: &str,
    ) -> Result<LivePlayerState, WorldError> {
        if let Some(state) = self.refresh(account_id).await {
            tracing::debug!(%account_id, "spawn for tracked player, refreshed");
            return Ok(state);
        }

        let character = match self.store.find_character(account_id).await? {
            Some(character) => character,
            None => self.create_character(account_id, display_name).await?,
        };

        let mut players = self.players.write().await;
        // Another spawn for the same account may have won while we were
        // talking to the store. Keep its state.
        let state = players
            .entry(account_id)
            .and_modify(|s| s.last_update = Instant::now())
            .or_insert_with(|| LivePlayerState::from_character(&character))
            .clone();

        tracing::info!(
            %account_id,
            character_id = %state.character_id,
            zone_id = %state.zone_id,
            "player spawned"
        );
        Ok(state)
    }

    async fn create_character(
        &self,
        account_id: AccountId,
        display_name: &str,
    ) -> Result<realmsync_store::Character, WorldError> {
        let (x, y) = self.config.spawn_point();
        let new = NewCharacter {
            account_id,
            name: display_name.to_string(),
            zone_id: self.config.starting_zone,
            x,
            y,
            level: self.config.default_level,
            hp: self.config.default_hp,
            mp: self.config.default_mp,
            inventory_slots: self.config.inventory_slots,
        };
        match self.store.create_character(new).await {
            Ok(character) => Ok(character),
            // Lost a creation race; the winner's row is the character.
            Err(StoreError::Conflict(_)) => self
                .store
                .find_character(account_id)
                .await?
                .ok_or_else(|| {
                    WorldError::Store(StoreError::NotFound(format!(
                        "character for {account_id}"
                    )))
                }),
            Err(e) => Err(e.into()),
        }
    }

    /// Moves a player within their current zone.
    ///
    /// # Errors
    /// - [`WorldError::InvalidCoordinates`] without touching anything
    /// - [`WorldError::NotSpawned`] if the account is not tracked
    pub async fn move_to(
        &self,
        account_id: AccountId,
        x: f64,
        y: f64,
    ) -> Result<LivePlayerState, WorldError> {
        self.check_bounds(x, y)?;
        let current = self
            .get(account_id)
            .await
            .ok_or(WorldError::NotSpawned(account_id))?;

        self.store
            .update_position(current.character_id, current.zone_id, x, y)
            .await?;

        self.apply(account_id, None, x, y).await
    }

    /// Moves a player into another zone.
    ///
    /// # Errors
    /// - [`WorldError::InvalidCoordinates`] or [`WorldError::ZoneNotFound`]
    ///   without touching anything
    /// - [`WorldError::NotSpawned`] if the account is not tracked
    pub async fn teleport(
        &self,
        account_id: AccountId,
        zone_id: ZoneId,
        x: f64,
        y: f64,
    ) -> Result<LivePlayerState, WorldError> {
        self.check_bounds(x, y)?;
        let current = self
            .get(account_id)
            .await
            .ok_or(WorldError::NotSpawned(account_id))?;
        if self.store.find_zone(zone_id).await?.is_none() {
            return Err(WorldError::ZoneNotFound(zone_id));
        }

        self.store
            .update_position(current.character_id, zone_id, x, y)
            .await?;

        let state = self.apply(account_id, Some(zone_id), x, y).await?;
        tracing::info!(%account_id, %zone_id, "player changed zone");
        Ok(state)
    }

    fn check_bounds(&self, x: f64, y: f64) -> Result<(), WorldError> {
        if self.config.in_bounds(x, y) {
            Ok(())
        } else {
            Err(WorldError::InvalidCoordinates { x, y })
        }
    }

    async fn apply(
        &self,
        account_id: AccountId,
        zone_id: Option<ZoneId>,
        x: f64,
        y: f64,
    ) -> Result<LivePlayerState, WorldError> {
        let mut players = self.players.write().await;
        // The sweep may have evicted the player while the store write was
        // in flight. The write stands; the mirror just has nothing to update.
        let state = players
            .get_mut(&account_id)
            .ok_or(WorldError::NotSpawned(account_id))?;
        if let Some(zone_id) = zone_id {
            state.zone_id = zone_id;
        }
        state.x = x;
        state.y = y;
        state.last_update = Instant::now();
        Ok(state.clone())
    }

    /// A copy of every tracked player, taken under one read lock, ordered
    /// by account.
    pub async fn snapshot(&self) -> Vec<LivePlayerState> {
        let players = self.players.read().await;
        let mut snapshot: Vec<LivePlayerState> =
            players.values().cloned().collect();
        snapshot.sort_by_key(|p| p.account_id);
        snapshot
    }

    pub async fn get(&self, account_id: AccountId) -> Option<LivePlayerState> {
        self.players.read().await.get(&account_id).cloned()
    }

    /// Refreshes `last_update`. Returns `false` if the account is not
    /// tracked.
    pub async fn touch(&self, account_id: AccountId) -> bool {
        self.refresh(account_id).await.is_some()
    }

    async fn refresh(&self, account_id: AccountId) -> Option<LivePlayerState> {
        let mut players = self.players.write().await;
        let state = players.get_mut(&account_id)?;
        state.last_update = Instant::now();
        Some(state.clone())
    }

    /// Drops a player from the mirror.
    pub async fn despawn(&self, account_id: AccountId) -> Option<LivePlayerState> {
        let removed = self.players.write().await.remove(&account_id);
        if removed.is_some() {
            tracing::debug!(%account_id, "player despawned");
        }
        removed
    }

    /// Evicts every player whose last update is older than the idle
    /// threshold as of `now`. Returns the evicted accounts in order.
    pub async fn evict_stale(&self, now: Instant) -> Vec<AccountId> {
        let threshold = self.config.idle_threshold;
        let mut players = self.players.write().await;
        let mut evicted = Vec::new();
        players.retain(|account_id, state| {
            let stale =
                now.saturating_duration_since(state.last_update) > threshold;
            if stale {
                evicted.push(*account_id);
            }
            !stale
        });
        drop(players);

        evicted.sort();
        for account_id in &evicted {
            tracing::info!(%account_id, "evicted idle player");
        }
        evicted
    }

    pub async fn len(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.players.read().await.is_empty()
    }
}
