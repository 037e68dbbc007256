//! Action routing.
//!
//! Every parsed action goes to the subsystem that owns it. The result is
//! relayed to the actor, and world-changing results are also broadcast to
//! every *other* session; the actor never gets its own change echoed.

use realmsync_protocol::{
    AccountId, Action, ActionKind, ActionReply, ItemId, ServerMessage, SlotView,
    WorldEvent, WorldUpdate,
};
use realmsync_session::IdentityOracle;
use realmsync_store::WorldStore;
use serde::Serialize;
use serde_json::json;

use crate::server::ServerState;
use crate::{ActionService, RealmsyncError};

/// What the actor gets back.
#[derive(Debug)]
pub(crate) struct Dispatched {
    pub(crate) reply: ActionReply,
    /// Further messages for the actor only, sent after the reply.
    pub(crate) follow_ups: Vec<ServerMessage>,
}

impl Dispatched {
    fn reply(reply: ActionReply) -> Self {
        Self {
            reply,
            follow_ups: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct Gathered<'a> {
    #[serde(rename = "type")]
    resource_type: &'a str,
    item_id: ItemId,
    quantity: u32,
}

#[derive(Serialize)]
struct GatherReply<'a> {
    gathered: Gathered<'a>,
    inventory: &'a [SlotView],
    resource_despawned: bool,
}

fn data<T: Serialize>(value: &T) -> Result<serde_json::Value, RealmsyncError> {
    serde_json::to_value(value)
        .map_err(|e| realmsync_protocol::ProtocolError::Encode(e).into())
}

fn world_update(update: WorldUpdate) -> ServerMessage {
    ServerMessage::Event(WorldEvent::WorldUpdate(update))
}

/// Runs one action for `account_id`.
///
/// # Errors
/// Whatever the owning subsystem reports, or [`RealmsyncError::Timeout`]
/// if it does not answer within `downstream_timeout`. Nothing is
/// broadcast for a failed action.
pub(crate) async fn dispatch<S, O, P>(
    state: &ServerState<S, O, P>,
    account_id: AccountId,
    display_name: &str,
    action: Action,
) -> Result<Dispatched, RealmsyncError>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    match action {
        Action::Spawn => {
            let player = state
                .bounded("spawn", state.tracker.spawn(account_id, display_name))
                .await?
                .view();
            let reply = ActionReply::ok(data(&player)?);
            state
                .broadcast(world_update(WorldUpdate::PlayerJoined { player }), Some(account_id))
                .await;
            Ok(Dispatched::reply(reply))
        }

        Action::Move(to) => {
            let moved = state
                .bounded("move", state.tracker.move_to(account_id, to.x, to.y))
                .await?;
            state
                .broadcast(
                    world_update(WorldUpdate::PlayerMoved {
                        account_id,
                        x: moved.x,
                        y: moved.y,
                    }),
                    Some(account_id),
                )
                .await;
            Ok(Dispatched::reply(ActionReply::ok(json!({
                "x": moved.x,
                "y": moved.y,
            }))))
        }

        Action::Teleport(to) => {
            let moved = state
                .bounded(
                    "zone change",
                    state.tracker.teleport(account_id, to.zone_id, to.x, to.y),
                )
                .await?;
            state
                .broadcast(
                    world_update(WorldUpdate::PlayerTeleported {
                        account_id,
                        zone_id: moved.zone_id,
                        x: moved.x,
                        y: moved.y,
                    }),
                    Some(account_id),
                )
                .await;
            Ok(Dispatched::reply(ActionReply::ok(json!({
                "zone_id": moved.zone_id,
                "x": moved.x,
                "y": moved.y,
            }))))
        }

        Action::Gather(target) => {
            // The engine bounds each store call itself. The despawn reaches
            // the other sessions through the event relay.
            let outcome = state.engine.gather(account_id, target.resource_id).await?;
            let slots: Vec<SlotView> = outcome.inventory.iter().map(|s| s.view()).collect();
            let reply = ActionReply::ok(data(&GatherReply {
                gathered: Gathered {
                    resource_type: &outcome.resource_type,
                    item_id: outcome.item_id,
                    quantity: outcome.quantity,
                },
                inventory: &slots,
                resource_despawned: outcome.despawned,
            })?);

            Ok(Dispatched {
                reply,
                follow_ups: vec![ServerMessage::Event(WorldEvent::InventoryUpdate {
                    slots,
                })],
            })
        }

        Action::Combat(payload) => {
            let reply = forward(state, account_id, ActionKind::Combat, payload).await?;
            if let (true, Some(result)) = (reply.success, &reply.data) {
                state
                    .broadcast(
                        ServerMessage::Event(WorldEvent::CombatResult(result.clone())),
                        Some(account_id),
                    )
                    .await;
            }
            Ok(Dispatched::reply(reply))
        }

        Action::Craft(payload) => {
            let reply = forward(state, account_id, ActionKind::Craft, payload).await?;
            Ok(Dispatched::reply(reply))
        }
    }
}

async fn forward<S, O, P>(
    state: &ServerState<S, O, P>,
    account_id: AccountId,
    kind: ActionKind,
    payload: serde_json::Value,
) -> Result<ActionReply, RealmsyncError>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    state
        .bounded(kind.as_str(), state.services.forward(account_id, kind, payload))
        .await
}

/// Turns a failed action into the reply the actor sees, logging anything
/// the actor is not told about.
pub(crate) fn failure(
    account_id: AccountId,
    kind: &str,
    error: &RealmsyncError,
) -> ActionReply {
    if error.class().is_client_visible() {
        tracing::debug!(%account_id, kind, error = %error, "action rejected");
    } else {
        tracing::error!(%account_id, kind, error = %error, "action failed downstream");
    }
    ActionReply::err(error.client_message())
}
