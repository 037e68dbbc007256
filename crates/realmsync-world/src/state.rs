use realmsync_protocol::{AccountId, CharacterId, PlayerView, ZoneId};
use realmsync_store::Character;
use tokio::time::Instant;

/// A spawned player as the tracker sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct LivePlayerState {
    pub account_id: AccountId,
    pub character_id: CharacterId,
    pub name: String,
    pub zone_id: ZoneId,
    pub x: f64,
    pub y: f64,
    pub level: u32,
    pub hp: u32,
    pub max_hp: u32,
    pub mp: u32,
    pub max_mp: u32,
    pub last_update: Instant,
}

impl LivePlayerState {
    pub fn from_character(character: &Character) -> Self {
        Self {
            account_id: character.account_id,
            character_id: character.id,
            name: character.name.clone(),
            zone_id: character.zone_id,
            x: character.x,
            y: character.y,
            level: character.level,
            hp: character.hp,
            max_hp: character.max_hp,
            mp: character.mp,
            max_mp: character.max_mp,
            last_update: Instant::now(),
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            account_id: self.account_id,
            character_id: self.character_id,
            name: self.name.clone(),
            zone_id: self.zone_id,
            x: self.x,
            y: self.y,
            level: self.level,
            hp: self.hp,
            max_hp: self.max_hp,
            mp: self.mp,
            max_mp: self.max_mp,
        }
    }
}
