//! Integration tests for the Realmsync gateway: a real server on a random
//! port, driven by `tokio-tungstenite` clients.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use realmsync::prelude::*;
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Fixtures
// =========================================================================

const ALICE: AccountId = AccountId(1);
const BOB: AccountId = AccountId(2);

fn oracle() -> StaticTokenOracle {
    StaticTokenOracle::new()
        .with_token("alice-token", ALICE, "alice")
        .with_token("bob-token", BOB, "bob")
}

/// Quiet by default: no periodic snapshots or top-ups during a test, and
/// a ceiling of one node per zone so the population is predictable.
fn test_config() -> ServerConfig {
    let mut config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        snapshot_interval: Duration::from_secs(3600),
        ..ServerConfig::default()
    };
    config.resources.max_per_zone = 1;
    config.resources.top_up_interval = Duration::from_secs(3600);
    config
}

/// Echoes forwarded actions back as a successful result.
struct EchoServices;

impl ActionService for EchoServices {
    async fn forward(
        &self,
        account_id: AccountId,
        kind: ActionKind,
        data: Value,
    ) -> Result<ActionReply, ServiceError> {
        Ok(ActionReply::ok(json!({
            "by": account_id,
            "kind": kind.as_str(),
            "data": data,
        })))
    }
}

struct World {
    addr: String,
    store: Arc<MemoryStore>,
    /// A wood node in the starting zone at the spawn point.
    node: ResourceId,
}

async fn seeded_store() -> (Arc<MemoryStore>, ResourceId) {
    let store = Arc::new(MemoryStore::default_world());
    let node = store.seed_resource(ZoneId(1), "wood", 1024.0, 1024.0).await;
    (store, node.id)
}

async fn start_with<P: ActionService>(config: ServerConfig, services: P) -> World {
    let (store, node) = seeded_store().await;
    let server = RealmsyncServer::builder()
        .config(config)
        .action_service(services)
        .build(Arc::clone(&store), oracle())
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(20)).await;
    World { addr, store, node }
}

async fn start_server() -> World {
    start_with(test_config(), NoActionService).await
}

// =========================================================================
// Client helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send(ws: &mut ClientWs, payload: ClientMessage) {
    let envelope = Envelope {
        seq: 0,
        timestamp: 0,
        payload,
    };
    let text = serde_json::to_string(&envelope).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

async fn recv(ws: &mut ClientWs) -> ServerMessage {
    let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("websocket error");
    let envelope: Envelope<ServerMessage> =
        serde_json::from_slice(&msg.into_data()).expect("decode");
    envelope.payload
}

/// Reads frames until one matches, returning it and dropping the rest.
async fn recv_until(
    ws: &mut ClientWs,
    mut wanted: impl FnMut(&ServerMessage) -> bool,
) -> ServerMessage {
    loop {
        let msg = recv(ws).await;
        if wanted(&msg) {
            return msg;
        }
    }
}

/// Everything the server has queued for this client so far.
///
/// Sends a heartbeat and collects frames until its ack. Queued messages
/// are always written before the next inbound frame is handled, so the
/// ack comes after anything queued before the heartbeat arrived.
async fn drain(ws: &mut ClientWs) -> Vec<ServerMessage> {
    let marker = 424_242;
    send(ws, ClientMessage::Heartbeat { client_time: marker }).await;
    let mut seen = Vec::new();
    loop {
        match recv(ws).await {
            ServerMessage::HeartbeatAck { client_time, .. } if client_time == marker => {
                return seen;
            }
            other => seen.push(other),
        }
    }
}

async fn expect_closed(ws: &mut ClientWs) {
    let closed = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "connection should be closed");
}

fn handshake_msg(token: &str) -> ClientMessage {
    ClientMessage::Handshake {
        version: 1,
        token: Some(format!("Bearer {token}")),
    }
}

/// Connects and authenticates.
async fn join(addr: &str, token: &str) -> ClientWs {
    let mut ws = connect(addr).await;
    send(&mut ws, handshake_msg(token)).await;
    match recv(&mut ws).await {
        ServerMessage::HandshakeAck { .. } => ws,
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
}

/// Sends an action and returns its result, skipping anything else.
async fn act(ws: &mut ClientWs, request_id: u64, kind: &str, data: Value) -> ActionReply {
    send(
        ws,
        ClientMessage::Action {
            request_id,
            kind: kind.to_string(),
            data,
        },
    )
    .await;
    match recv_until(ws, |m| matches!(m, ServerMessage::ActionResult { request_id: r, .. } if *r == request_id)).await {
        ServerMessage::ActionResult { result, .. } => result,
        _ => unreachable!(),
    }
}

/// Connects, authenticates and spawns.
async fn spawned(addr: &str, token: &str) -> ClientWs {
    let mut ws = join(addr, token).await;
    let reply = act(&mut ws, 1, "player.spawn", Value::Null).await;
    assert!(reply.success, "spawn failed: {reply:?}");
    ws
}

fn is_world_update(msg: &ServerMessage, pred: impl Fn(&WorldUpdate) -> bool) -> bool {
    matches!(msg, ServerMessage::Event(WorldEvent::WorldUpdate(u)) if pred(u))
}

fn is_left(msg: &ServerMessage, account: AccountId) -> bool {
    is_world_update(msg, |u| {
        matches!(u, WorldUpdate::PlayerLeft { account_id } if *account_id == account)
    })
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_success_returns_identity() {
    let world = start_server().await;
    let mut ws = connect(&world.addr).await;

    send(&mut ws, handshake_msg("alice-token")).await;

    match recv(&mut ws).await {
        ServerMessage::HandshakeAck {
            account_id,
            display_name,
            ..
        } => {
            assert_eq!(account_id, ALICE);
            assert_eq!(display_name, "alice");
        }
        other => panic!("expected HandshakeAck, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_bare_token_accepted() {
    let world = start_server().await;
    let mut ws = connect(&world.addr).await;

    send(
        &mut ws,
        ClientMessage::Handshake {
            version: 1,
            token: Some("bob-token".into()),
        },
    )
    .await;

    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::HandshakeAck { account_id: BOB, .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_bad_token_rejected_with_401_and_closed() {
    let world = start_server().await;
    let mut ws = connect(&world.addr).await;

    send(&mut ws, handshake_msg("mallory-token")).await;

    match recv(&mut ws).await {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, 401);
            assert_eq!(message, "unauthorized");
        }
        other => panic!("expected Error, got {other:?}"),
    }
    expect_closed(&mut ws).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_missing_token_rejected_with_401() {
    let world = start_server().await;
    let mut ws = connect(&world.addr).await;

    send(
        &mut ws,
        ClientMessage::Handshake {
            version: 1,
            token: None,
        },
    )
    .await;

    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::Error { code: 401, .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_version_mismatch_rejected_with_400() {
    let world = start_server().await;
    let mut ws = connect(&world.addr).await;

    send(
        &mut ws,
        ClientMessage::Handshake {
            version: 999,
            token: Some("alice-token".into()),
        },
    )
    .await;

    match recv(&mut ws).await {
        ServerMessage::Error { code, message } => {
            assert_eq!(code, 400);
            assert!(message.contains("999"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_action_before_handshake_rejected() {
    let world = start_server().await;
    let mut ws = connect(&world.addr).await;

    send(
        &mut ws,
        ClientMessage::Action {
            request_id: 1,
            kind: "player.spawn".into(),
            data: Value::Null,
        },
    )
    .await;

    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::Error { code: 400, .. }
    ));
    expect_closed(&mut ws).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_handshake_timeout_closes_connection() {
    let mut config = test_config();
    config.session.handshake_timeout = Duration::from_millis(200);
    let world = start_with(config, NoActionService).await;
    let mut ws = connect(&world.addr).await;

    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::Error { code: 408, .. }
    ));
    expect_closed(&mut ws).await;
}

// =========================================================================
// Health and heartbeat
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_health_answered_before_handshake() {
    let world = start_server().await;
    let mut ws = connect(&world.addr).await;

    send(&mut ws, ClientMessage::Health).await;

    match recv(&mut ws).await {
        ServerMessage::Health(status) => {
            assert_eq!(status.service, "gateway");
            assert_eq!(status.status, "ok");
        }
        other => panic!("expected Health, got {other:?}"),
    }

    // The connection is still waiting for its handshake.
    send(&mut ws, handshake_msg("alice-token")).await;
    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::HandshakeAck { .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_heartbeat_echoes_client_time() {
    let world = start_server().await;
    let mut ws = join(&world.addr, "alice-token").await;

    send(&mut ws, ClientMessage::Heartbeat { client_time: 777 }).await;

    assert!(matches!(
        recv(&mut ws).await,
        ServerMessage::HeartbeatAck { client_time: 777, .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_idle_connection_closed_with_notice() {
    let mut config = test_config();
    config.session.idle_timeout = Duration::from_millis(300);
    let world = start_with(config, NoActionService).await;
    let mut ws = join(&world.addr, "alice-token").await;

    match recv(&mut ws).await {
        ServerMessage::Disconnect { reason } => assert_eq!(reason, "idle timeout"),
        other => panic!("expected Disconnect, got {other:?}"),
    }
    expect_closed(&mut ws).await;
}

// =========================================================================
// Actions: spawn, move, zone change
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_spawn_returns_defaults_and_notifies_others_only() {
    let world = start_server().await;
    let mut bob = join(&world.addr, "bob-token").await;
    let mut alice = join(&world.addr, "alice-token").await;

    let reply = act(&mut alice, 1, "player.spawn", Value::Null).await;

    assert!(reply.success);
    let player: PlayerView = serde_json::from_value(reply.data.unwrap()).unwrap();
    assert_eq!(player.account_id, ALICE);
    assert_eq!(player.zone_id, ZoneId(1));
    assert_eq!((player.x, player.y), (1024.0, 1024.0));
    assert_eq!((player.hp, player.mp, player.level), (100, 50, 1));

    let joined = recv_until(&mut bob, |m| {
        is_world_update(m, |u| matches!(u, WorldUpdate::PlayerJoined { .. }))
    })
    .await;
    assert!(is_world_update(&joined, |u| {
        matches!(u, WorldUpdate::PlayerJoined { player } if player.account_id == ALICE)
    }));

    let echoed = drain(&mut alice).await;
    assert!(
        !echoed.iter().any(|m| is_world_update(m, |_| true)),
        "actor got its own join: {echoed:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_move_broadcasts_to_others_not_actor() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;

    let reply = act(&mut alice, 2, "player.move", json!({"x": 100.0, "y": 200.0})).await;

    assert!(reply.success);
    assert_eq!(reply.data, Some(json!({"x": 100.0, "y": 200.0})));

    let moved = recv_until(&mut bob, |m| {
        is_world_update(m, |u| matches!(u, WorldUpdate::PlayerMoved { .. }))
    })
    .await;
    assert_eq!(
        moved,
        ServerMessage::Event(WorldEvent::WorldUpdate(WorldUpdate::PlayerMoved {
            account_id: ALICE,
            x: 100.0,
            y: 200.0,
        }))
    );

    let echoed = drain(&mut alice).await;
    assert!(!echoed.iter().any(|m| {
        is_world_update(m, |u| matches!(u, WorldUpdate::PlayerMoved { .. }))
    }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_move_out_of_bounds_rejected_without_broadcast() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;
    drain(&mut bob).await;

    let reply = act(&mut alice, 2, "player.move", json!({"x": -5.0, "y": 10.0})).await;

    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("invalid coordinates"));
    let seen = drain(&mut bob).await;
    assert!(seen.is_empty(), "observer saw {seen:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_move_before_spawn_rejected() {
    let world = start_server().await;
    let mut alice = join(&world.addr, "alice-token").await;

    let reply = act(&mut alice, 1, "player.move", json!({"x": 1.0, "y": 1.0})).await;

    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("not spawned"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zone_change_broadcasts_teleport() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;

    let reply = act(
        &mut alice,
        2,
        "zone.change",
        json!({"zone_id": 2, "x": 10.0, "y": 20.0}),
    )
    .await;

    assert!(reply.success);
    assert_eq!(reply.data, Some(json!({"zone_id": 2, "x": 10.0, "y": 20.0})));
    let teleported = recv_until(&mut bob, |m| {
        is_world_update(m, |u| matches!(u, WorldUpdate::PlayerTeleported { .. }))
    })
    .await;
    assert_eq!(
        teleported,
        ServerMessage::Event(WorldEvent::WorldUpdate(WorldUpdate::PlayerTeleported {
            account_id: ALICE,
            zone_id: ZoneId(2),
            x: 10.0,
            y: 20.0,
        }))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_zone_change_unknown_zone_rejected() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;

    let reply = act(
        &mut alice,
        2,
        "zone.change",
        json!({"zone_id": 99, "x": 10.0, "y": 20.0}),
    )
    .await;

    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("not found"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unknown_action_kind_rejected() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;

    let reply = act(&mut alice, 9, "player.fly", json!({})).await;

    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("unknown action kind"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_malformed_payload_rejected() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;

    let reply = act(&mut alice, 9, "player.move", json!({"x": "east"})).await;

    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("invalid payload"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_store_failure_hidden_from_client() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    world.store.set_available(false);

    let reply = act(&mut alice, 2, "player.move", json!({"x": 1.0, "y": 1.0})).await;

    assert!(!reply.success);
    assert_eq!(reply.error.as_deref(), Some("internal error"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_store_times_out_as_internal_error() {
    let mut config = test_config();
    config.downstream_timeout = Duration::from_millis(100);
    let world = start_with(config, NoActionService).await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    world.store.set_latency(Duration::from_millis(500));

    let reply = act(&mut alice, 2, "player.move", json!({"x": 1.0, "y": 1.0})).await;

    assert_eq!(reply.error.as_deref(), Some("internal error"));
}

// =========================================================================
// Gathering
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gather_replies_updates_inventory_and_notifies_others() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;

    let reply = act(
        &mut alice,
        2,
        "resource.gather",
        json!({"resource_id": world.node}),
    )
    .await;

    assert!(reply.success, "gather failed: {reply:?}");
    let data = reply.data.unwrap();
    assert_eq!(data["gathered"]["type"], "wood");
    assert_eq!(data["gathered"]["item_id"], 1);
    let quantity = data["gathered"]["quantity"].as_u64().unwrap();
    assert!((1..=3).contains(&quantity));
    assert_eq!(data["resource_despawned"], true);
    assert_eq!(data["inventory"][0]["slot_index"], 0);

    match recv(&mut alice).await {
        ServerMessage::Event(WorldEvent::InventoryUpdate { slots }) => {
            assert_eq!(slots.len(), 1);
            assert_eq!(slots[0].item_id, ItemId(1));
            assert_eq!(u64::from(slots[0].quantity), quantity);
        }
        other => panic!("expected inventory.update, got {other:?}"),
    }

    let despawned = recv_until(&mut bob, |m| {
        matches!(m, ServerMessage::Event(WorldEvent::ResourceDespawned { .. }))
    })
    .await;
    assert_eq!(
        despawned,
        ServerMessage::Event(WorldEvent::ResourceDespawned {
            resource_id: world.node
        })
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gather_second_attempt_not_found() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;
    let target = json!({"resource_id": world.node});

    assert!(act(&mut alice, 2, "resource.gather", target.clone()).await.success);
    let second = act(&mut bob, 2, "resource.gather", target).await;

    assert!(!second.success);
    assert!(second.error.unwrap().contains("not found or already gathered"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_gather_race_has_one_winner() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;
    let target = json!({"resource_id": world.node});

    let (a, b) = tokio::join!(
        act(&mut alice, 2, "resource.gather", target.clone()),
        act(&mut bob, 2, "resource.gather", target.clone()),
    );

    assert_eq!(
        [a.success, b.success].iter().filter(|s| **s).count(),
        1,
        "alice: {a:?}, bob: {b:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gather_from_other_zone_too_far() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    act(&mut alice, 2, "zone.change", json!({"zone_id": 2, "x": 1024.0, "y": 1024.0})).await;

    let reply = act(
        &mut alice,
        3,
        "resource.gather",
        json!({"resource_id": world.node}),
    )
    .await;

    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("too far"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gather_on_slow_store_outlasts_downstream_timeout() {
    let mut config = test_config();
    config.downstream_timeout = Duration::from_millis(500);
    let world = start_with(config, NoActionService).await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    // Six store calls at 200ms: each within the limit, the gather as a
    // whole well past it.
    world.store.set_latency(Duration::from_millis(200));

    let reply = act(
        &mut alice,
        2,
        "resource.gather",
        json!({"resource_id": world.node}),
    )
    .await;

    assert!(reply.success, "gather failed: {reply:?}");
    assert_eq!(reply.data.unwrap()["inventory"][0]["item_id"], 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_gather_activity_keeps_player_in_world_past_idle_threshold() {
    let mut config = test_config();
    config.world.idle_threshold = Duration::from_millis(400);
    config.world.sweep_interval = Duration::from_millis(50);
    let world = start_with(config, NoActionService).await;
    let mut alice = spawned(&world.addr, "alice-token").await;

    // No heartbeats and no moves: only gather attempts for twice the
    // threshold.
    for request_id in 2..10 {
        act(&mut alice, request_id, "resource.gather", json!({"resource_id": 9999})).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let reply = act(&mut alice, 10, "player.move", json!({"x": 5.0, "y": 5.0})).await;
    assert!(reply.success, "player was evicted: {reply:?}");
}

// =========================================================================
// Pass-through actions
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_combat_without_service_fails_generically() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;

    let reply = act(&mut alice, 2, "combat.attack", json!({"target": 2})).await;

    assert!(!reply.success);
    assert_eq!(reply.error.as_deref(), Some("internal error"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_combat_result_broadcast_to_others() {
    let world = start_with(test_config(), EchoServices).await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;

    let reply = act(&mut alice, 2, "combat.attack", json!({"target": 2})).await;

    assert!(reply.success);
    let expected = json!({"by": 1, "kind": "combat.attack", "data": {"target": 2}});
    assert_eq!(reply.data, Some(expected.clone()));
    let relayed = recv_until(&mut bob, |m| {
        matches!(m, ServerMessage::Event(WorldEvent::CombatResult(_)))
    })
    .await;
    assert_eq!(relayed, ServerMessage::Event(WorldEvent::CombatResult(expected)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_craft_result_goes_to_actor_only() {
    let world = start_with(test_config(), EchoServices).await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;
    drain(&mut bob).await;

    let reply = act(&mut alice, 2, "craft.item", json!({"recipe_id": 5})).await;

    assert!(reply.success);
    assert_eq!(reply.data.unwrap()["kind"], "craft.item");
    let seen = drain(&mut bob).await;
    assert!(seen.is_empty(), "observer saw {seen:?}");
}

// =========================================================================
// Disconnect and supersede
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_disconnect_broadcasts_departure_once() {
    let world = start_server().await;
    let mut alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;

    send(
        &mut alice,
        ClientMessage::Disconnect {
            reason: "bye".into(),
        },
    )
    .await;
    recv_until(&mut bob, |m| is_left(m, ALICE)).await;

    // The socket close that follows must not produce a second notice.
    drop(alice);
    tokio::time::sleep(Duration::from_millis(100)).await;
    let later = drain(&mut bob).await;
    assert!(!later.iter().any(|m| is_left(m, ALICE)), "{later:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_socket_drop_broadcasts_departure() {
    let world = start_server().await;
    let alice = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;

    drop(alice);

    recv_until(&mut bob, |m| is_left(m, ALICE)).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_second_connection_supersedes_first() {
    let world = start_server().await;
    let mut first = spawned(&world.addr, "alice-token").await;
    let mut bob = spawned(&world.addr, "bob-token").await;

    let mut second = join(&world.addr, "alice-token").await;

    let notice = recv_until(&mut first, |m| matches!(m, ServerMessage::Disconnect { .. })).await;
    assert_eq!(
        notice,
        ServerMessage::Disconnect {
            reason: "superseded".into()
        }
    );
    expect_closed(&mut first).await;

    // The old connection's exit is not a departure, and the player is
    // still in the world for the new connection.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let seen = drain(&mut bob).await;
    assert!(!seen.iter().any(|m| is_left(m, ALICE)), "{seen:?}");

    let reply = act(&mut second, 5, "player.move", json!({"x": 5.0, "y": 5.0})).await;
    assert!(reply.success, "{reply:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnect_right_after_disconnect_stays_in_world() {
    let world = start_server().await;

    for round in 0..10u64 {
        let mut old = spawned(&world.addr, "alice-token").await;
        send(
            &mut old,
            ClientMessage::Disconnect {
                reason: "reconnecting".into(),
            },
        )
        .await;

        let mut new = spawned(&world.addr, "alice-token").await;
        let reply = act(&mut new, 2, "player.move", json!({"x": 10.0, "y": 10.0})).await;
        assert!(reply.success, "round {round}: {reply:?}");

        drop(old);
        drop(new);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// =========================================================================
// Background jobs
// =========================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snapshot_broadcast_carries_players_and_resources() {
    let mut config = test_config();
    config.snapshot_interval = Duration::from_millis(100);
    let world = start_with(config, NoActionService).await;
    let mut alice = spawned(&world.addr, "alice-token").await;

    let snapshot = recv_until(&mut alice, |m| {
        is_world_update(m, |u| matches!(u, WorldUpdate::FullUpdate { players, .. } if !players.is_empty()))
    })
    .await;

    match snapshot {
        ServerMessage::Event(WorldEvent::WorldUpdate(WorldUpdate::FullUpdate {
            players,
            resources,
        })) => {
            assert_eq!(players.len(), 1);
            assert_eq!(players[0].account_id, ALICE);
            // One node per zone: the seeded one plus one spawned in each
            // of the other two zones at startup.
            assert_eq!(resources.len(), 3);
            assert!(resources.iter().any(|r| r.id == world.node));
        }
        _ => unreachable!(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_snapshot_suppressed_while_store_down() {
    let mut config = test_config();
    config.snapshot_interval = Duration::from_millis(50);
    let world = start_with(config, NoActionService).await;
    let mut alice = join(&world.addr, "alice-token").await;
    world.store.set_available(false);
    tokio::time::sleep(Duration::from_millis(100)).await;
    // Whatever went out before the outage.
    drain(&mut alice).await;

    // Let several ticks pass.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let seen = drain(&mut alice).await;

    assert!(
        !seen.iter().any(|m| is_world_update(m, |u| matches!(u, WorldUpdate::FullUpdate { .. }))),
        "{seen:?}"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_respawn_relayed_as_resource_spawned() {
    let mut config = test_config();
    config.resources.respawn_delay = Duration::from_millis(100);
    let world = start_with(config, NoActionService).await;
    let mut alice = spawned(&world.addr, "alice-token").await;

    assert!(
        act(&mut alice, 2, "resource.gather", json!({"resource_id": world.node}))
            .await
            .success
    );

    let spawned = recv_until(&mut alice, |m| {
        matches!(m, ServerMessage::Event(WorldEvent::ResourceSpawned(_)))
    })
    .await;
    match spawned {
        ServerMessage::Event(WorldEvent::ResourceSpawned(node)) => {
            assert_eq!(node.zone_id, ZoneId(1));
            assert_ne!(node.id, world.node);
        }
        _ => unreachable!(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_fails_when_store_down_at_startup() {
    let (store, _) = seeded_store().await;
    store.set_available(false);
    let server = RealmsyncServer::builder()
        .config(test_config())
        .build(store, oracle())
        .await
        .expect("server should build");

    let result = tokio::time::timeout(Duration::from_secs(3), server.run())
        .await
        .expect("run should return promptly");

    let err = result.unwrap_err();
    assert_eq!(err.class(), ErrorClass::Downstream);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_populates_slow_store_past_downstream_timeout() {
    let (store, _) = seeded_store().await;
    let mut config = test_config();
    config.downstream_timeout = Duration::from_millis(100);
    config.resources.max_per_zone = 3;
    // About a dozen calls at 20ms: over the limit as a batch, not per call.
    store.set_latency(Duration::from_millis(20));
    let server = RealmsyncServer::builder()
        .config(config)
        .build(Arc::clone(&store), oracle())
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("local addr").to_string();
    let running = tokio::spawn(async move {
        let _ = server.run().await;
    });

    let mut alice = spawned(&addr, "alice-token").await;

    assert!(!running.is_finished(), "startup population failed");
    let reply = act(&mut alice, 2, "player.move", json!({"x": 1.0, "y": 1.0})).await;
    assert!(reply.success);
    running.abort();
}
