//! Jobs that run independently of any connection: the snapshot
//! broadcaster, the staleness sweep, resource top-up and respawn, and the
//! relay that turns resource events into client events.

use std::sync::Arc;

use realmsync_protocol::{ServerMessage, WorldEvent, WorldUpdate};
use realmsync_resources::ResourceEvent;
use realmsync_schedule::Ticker;
use realmsync_session::IdentityOracle;
use realmsync_store::WorldStore;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::server::ServerState;
use crate::{ActionService, RealmsyncError};

/// Starts every background job. The handles are owned by the caller.
pub(crate) fn spawn_all<S, O, P>(state: &Arc<ServerState<S, O, P>>) -> Vec<JoinHandle<()>>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    // Subscribe before any job can publish, so no spawn is missed.
    let events = state.engine.subscribe();

    let broadcaster = tokio::spawn(run_snapshots(Arc::clone(state)));
    let sweeper = tokio::spawn(run_sweep(Arc::clone(state)));
    let relay = tokio::spawn(relay_resource_events(Arc::clone(state), events));

    let engine_state = Arc::clone(state);
    let top_up = tokio::spawn(async move { engine_state.engine.run_top_up().await });
    let engine_state = Arc::clone(state);
    let respawns = tokio::spawn(async move { engine_state.engine.run_respawns().await });

    vec![broadcaster, sweeper, relay, top_up, respawns]
}

/// Composes one consolidated `full_update`.
///
/// Either both halves come back or nothing does; a partial picture is
/// never sent.
pub(crate) async fn compose_snapshot<S, O, P>(
    state: &ServerState<S, O, P>,
) -> Result<ServerMessage, RealmsyncError>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    let players = state
        .tracker
        .snapshot()
        .await
        .iter()
        .map(|p| p.view())
        .collect();
    let resources = state
        .engine
        .active_nodes()
        .await?
        .iter()
        .map(|n| n.view())
        .collect();

    Ok(ServerMessage::Event(WorldEvent::WorldUpdate(
        WorldUpdate::FullUpdate { players, resources },
    )))
}

async fn run_snapshots<S, O, P>(state: Arc<ServerState<S, O, P>>)
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    let mut ticker = Ticker::every(state.config.snapshot_interval);
    loop {
        let tick = ticker.wait_for_tick().await;
        if tick.overrun {
            tracing::warn!(tick = tick.tick, skipped = tick.ticks_skipped, "snapshot tick late");
        }

        match compose_snapshot(&state).await {
            Ok(snapshot) => {
                let sessions = state.broadcast(snapshot, None).await;
                tracing::trace!(tick = tick.tick, sessions, "snapshot sent");
            }
            Err(e) => {
                tracing::warn!(tick = tick.tick, error = %e, "snapshot tick suppressed");
            }
        }
        ticker.record_tick_end();
    }
}

async fn run_sweep<S, O, P>(state: Arc<ServerState<S, O, P>>)
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    let mut ticker = Ticker::every(state.config.world.sweep_interval);
    loop {
        ticker.wait_for_tick().await;
        let evicted = state.tracker.evict_stale(tokio::time::Instant::now()).await;
        for account_id in evicted {
            state
                .broadcast(
                    ServerMessage::Event(WorldEvent::WorldUpdate(WorldUpdate::PlayerLeft {
                        account_id,
                    })),
                    Some(account_id),
                )
                .await;
        }
        ticker.record_tick_end();
    }
}

/// Relays node spawns to every client, and despawns to everyone but the
/// gatherer, who learns from its own reply.
async fn relay_resource_events<S, O, P>(
    state: Arc<ServerState<S, O, P>>,
    mut events: tokio::sync::broadcast::Receiver<ResourceEvent>,
) where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    loop {
        match events.recv().await {
            Ok(ResourceEvent::Spawned(node)) => {
                state
                    .broadcast(
                        ServerMessage::Event(WorldEvent::ResourceSpawned(node.view())),
                        None,
                    )
                    .await;
            }
            Ok(ResourceEvent::Despawned {
                resource_id,
                gatherer,
                ..
            }) => {
                state
                    .broadcast(
                        ServerMessage::Event(WorldEvent::ResourceDespawned { resource_id }),
                        Some(gatherer),
                    )
                    .await;
            }
            Err(RecvError::Lagged(missed)) => {
                // The next snapshot carries the full node list.
                tracing::warn!(missed, "resource event relay lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
