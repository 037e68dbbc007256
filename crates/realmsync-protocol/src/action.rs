//! Player actions: the kinds a client may request and their payloads.
//!
//! An action arrives as `{kind, data}` where `kind` is a string and `data`
//! is free-form JSON. Parsing happens in two steps so that a bad frame can
//! still be answered with a structured error naming the request:
//!
//! 1. [`ActionKind::parse`]: is this a kind we route at all?
//! 2. [`Action::parse`]: does `data` have the shape that kind requires?
//!
//! Anything that fails either step never reaches an authoritative subsystem.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{ProtocolError, ResourceId, ZoneId};

/// Every action kind the gateway routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    #[serde(rename = "player.spawn")]
    Spawn,
    #[serde(rename = "player.move")]
    Move,
    #[serde(rename = "zone.change")]
    Teleport,
    #[serde(rename = "resource.gather")]
    Gather,
    #[serde(rename = "combat.attack")]
    Combat,
    #[serde(rename = "craft.item")]
    Craft,
}

impl ActionKind {
    /// All kinds, in routing-table order.
    pub const ALL: [ActionKind; 6] = [
        Self::Spawn,
        Self::Move,
        Self::Teleport,
        Self::Gather,
        Self::Combat,
        Self::Craft,
    ];

    /// The wire name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spawn => "player.spawn",
            Self::Move => "player.move",
            Self::Teleport => "zone.change",
            Self::Gather => "resource.gather",
            Self::Combat => "combat.attack",
            Self::Craft => "craft.item",
        }
    }

    /// Looks up a kind by its wire name.
    pub fn parse(kind: &str) -> Result<Self, ProtocolError> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == kind)
            .ok_or_else(|| ProtocolError::UnknownAction(kind.to_string()))
    }

    /// Kinds handled by services outside this core; the gateway only
    /// forwards them.
    pub fn is_pass_through(self) -> bool {
        matches!(self, Self::Combat | Self::Craft)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of `player.move`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovePayload {
    pub x: f64,
    pub y: f64,
}

/// Payload of `zone.change`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeleportPayload {
    #[serde(alias = "zoneId")]
    pub zone_id: ZoneId,
    pub x: f64,
    pub y: f64,
}

/// Payload of `resource.gather`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherPayload {
    #[serde(alias = "resourceId")]
    pub resource_id: ResourceId,
}

/// A fully parsed action, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Spawn,
    Move(MovePayload),
    Teleport(TeleportPayload),
    Gather(GatherPayload),
    /// Opaque to this core; forwarded as-is.
    Combat(serde_json::Value),
    /// Opaque to this core; forwarded as-is.
    Craft(serde_json::Value),
}

impl Action {
    /// Parses `data` according to `kind`.
    ///
    /// # Errors
    /// - [`ProtocolError::UnknownAction`] for an unrecognised kind
    /// - [`ProtocolError::InvalidPayload`] when `data` has the wrong shape
    pub fn parse(
        kind: &str,
        data: serde_json::Value,
    ) -> Result<Self, ProtocolError> {
        let kind = ActionKind::parse(kind)?;
        Ok(match kind {
            ActionKind::Spawn => Self::Spawn,
            ActionKind::Move => Self::Move(payload(kind, data)?),
            ActionKind::Teleport => Self::Teleport(payload(kind, data)?),
            ActionKind::Gather => Self::Gather(payload(kind, data)?),
            ActionKind::Combat => Self::Combat(data),
            ActionKind::Craft => Self::Craft(data),
        })
    }

    /// The kind this action was parsed from.
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Spawn => ActionKind::Spawn,
            Self::Move(_) => ActionKind::Move,
            Self::Teleport(_) => ActionKind::Teleport,
            Self::Gather(_) => ActionKind::Gather,
            Self::Combat(_) => ActionKind::Combat,
            Self::Craft(_) => ActionKind::Craft,
        }
    }
}

fn payload<T: DeserializeOwned>(
    kind: ActionKind,
    data: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.as_str(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_action_kind_parse_every_wire_name() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn test_action_kind_parse_unknown_returns_error() {
        let err = ActionKind::parse("player.fly").unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownAction(k) if k == "player.fly"));
    }

    #[test]
    fn test_action_kind_serde_name_matches_as_str() {
        for kind in ActionKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }

    #[test]
    fn test_action_parse_move() {
        let action = Action::parse("player.move", json!({"x": 1.5, "y": 2.0}))
            .unwrap();
        assert_eq!(action, Action::Move(MovePayload { x: 1.5, y: 2.0 }));
        assert_eq!(action.kind(), ActionKind::Move);
    }

    #[test]
    fn test_action_parse_move_missing_field_returns_invalid_payload() {
        let err = Action::parse("player.move", json!({"x": 1.0})).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::InvalidPayload { kind: "player.move", .. }
        ));
    }

    #[test]
    fn test_action_parse_gather_accepts_camel_case_alias() {
        let action =
            Action::parse("resource.gather", json!({"resourceId": 12})).unwrap();
        assert_eq!(
            action,
            Action::Gather(GatherPayload { resource_id: ResourceId(12) })
        );
    }

    #[test]
    fn test_action_parse_teleport() {
        let action = Action::parse(
            "zone.change",
            json!({"zone_id": 2, "x": 5.0, "y": 6.0}),
        )
        .unwrap();
        assert_eq!(
            action,
            Action::Teleport(TeleportPayload { zone_id: ZoneId(2), x: 5.0, y: 6.0 })
        );
    }

    #[test]
    fn test_action_parse_spawn_ignores_data() {
        assert_eq!(
            Action::parse("player.spawn", serde_json::Value::Null).unwrap(),
            Action::Spawn
        );
    }

    #[test]
    fn test_action_parse_pass_through_keeps_payload_verbatim() {
        let data = json!({"targetId": 99, "skill": "slash"});
        let action = Action::parse("combat.attack", data.clone()).unwrap();
        assert_eq!(action, Action::Combat(data));
        assert!(action.kind().is_pass_through());
        assert!(!ActionKind::Gather.is_pass_through());
    }
}
