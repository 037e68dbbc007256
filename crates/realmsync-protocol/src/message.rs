//! Frames exchanged between client and gateway.
//!
//! Every frame is an [`Envelope`]. Clients send `Envelope<ClientMessage>`,
//! the gateway answers with `Envelope<ServerMessage>`. Both message enums
//! are internally tagged on `"type"`, which keeps them easy to switch on
//! from JavaScript:
//!
//! ```text
//! {"seq":3,"timestamp":1200,"payload":{"type":"Action","request_id":7,
//!   "kind":"player.move","data":{"x":10.0,"y":20.0}}}
//! ```

use serde::{Deserialize, Serialize};

use crate::{AccountId, PlayerView, ResourceId, ResourceView, SlotView, ZoneId};

/// The outer wrapper of every frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<P> {
    /// Per-direction sequence number, assigned by the sender.
    pub seq: u64,

    /// Milliseconds since the sender started.
    pub timestamp: u64,

    pub payload: P,
}

/// Client → gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Must be the first frame. `token` is the bearer credential; a
    /// leading `"Bearer "` is tolerated.
    Handshake {
        version: u32,
        token: Option<String>,
    },

    /// Keep-alive. Also counts as activity for the player's live state.
    Heartbeat { client_time: u64 },

    /// Liveness probe; answered before and after authentication.
    Health,

    /// A player action. `kind` and `data` are parsed by
    /// [`Action::parse`](crate::Action::parse) so that malformed input can
    /// still be answered against `request_id`.
    Action {
        request_id: u64,
        kind: String,
        #[serde(default)]
        data: serde_json::Value,
    },

    /// Clean shutdown from the client side.
    Disconnect { reason: String },
}

/// The `{success, data | error}` result shape shared by every action,
/// including ones forwarded to outside services.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionReply {
    /// A success carrying `data`.
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A success with nothing to report.
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    /// A failure with a client-safe message.
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Gateway identity and liveness, answered to `Health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub service: String,
    pub status: String,
    pub uptime_ms: u64,
    /// Unix epoch milliseconds at the time of the answer.
    pub timestamp: u64,
}

/// Gateway → client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Authentication succeeded; the session is live.
    HandshakeAck {
        account_id: AccountId,
        display_name: String,
        server_time: u64,
    },

    HeartbeatAck { client_time: u64, server_time: u64 },

    Health(HealthStatus),

    /// The answer to one `Action`, always sent to the actor only.
    ActionResult {
        request_id: u64,
        kind: String,
        result: ActionReply,
    },

    /// Something changed in the world.
    Event(WorldEvent),

    /// A protocol-level failure. `code` follows HTTP conventions
    /// (400 bad request, 401 unauthorized).
    Error { code: u16, message: String },

    /// The gateway is closing this connection.
    Disconnect { reason: String },
}

/// Broadcast kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum WorldEvent {
    #[serde(rename = "world.update")]
    WorldUpdate(WorldUpdate),

    #[serde(rename = "resource.despawned")]
    ResourceDespawned { resource_id: ResourceId },

    #[serde(rename = "resource.spawned")]
    ResourceSpawned(ResourceView),

    /// Sent to the gathering player only.
    #[serde(rename = "inventory.update")]
    InventoryUpdate { slots: Vec<SlotView> },

    /// Result of a forwarded combat action, relayed to everyone else.
    #[serde(rename = "combat.result")]
    CombatResult(serde_json::Value),
}

/// The body of a `world.update` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorldUpdate {
    /// Periodic consolidated snapshot.
    FullUpdate {
        players: Vec<PlayerView>,
        resources: Vec<ResourceView>,
    },
    PlayerJoined { player: PlayerView },
    PlayerMoved { account_id: AccountId, x: f64, y: f64 },
    PlayerTeleported {
        account_id: AccountId,
        zone_id: ZoneId,
        x: f64,
        y: f64,
    },
    PlayerLeft { account_id: AccountId },
}
