//! Per-connection handler: handshake, auth, and message routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive Handshake (answering Health probes meanwhile) → check the
//!      version and verify the credential
//!   2. Register the session, superseding any older one → send HandshakeAck
//!   3. Loop: inbound frames are handled one at a time, in order; messages
//!      queued for this session by broadcasts are written between them
//!   4. On exit, the session guard runs the departure

use std::sync::Arc;

use realmsync_protocol::{
    AccountId, Action, ClientMessage, Codec, Envelope, ServerMessage,
};
use realmsync_session::{Admission, Identity, IdentityOracle, SessionError, authenticate};
use realmsync_store::WorldStore;
use realmsync_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::time::Instant;

use crate::dispatch::{dispatch, failure};
use crate::server::ServerState;
use crate::{ActionService, RealmsyncError, health};

/// Drop guard that runs the departure when the handler exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async work.
struct SessionGuard<S, O, P>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    account_id: AccountId,
    connection_id: ConnectionId,
    state: Arc<ServerState<S, O, P>>,
}

impl<S, O, P> Drop for SessionGuard<S, O, P>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    fn drop(&mut self) {
        let account_id = self.account_id;
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                state.depart(account_id, connection_id).await;
            });
        }
    }
}

/// Whether the loop keeps going after a frame.
enum Flow {
    Continue,
    Close,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<S, O, P>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, O, P>>,
) -> Result<(), RealmsyncError>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    let connection_id = conn.id();
    tracing::debug!(%connection_id, peer = ?conn.peer_addr(), "handling new connection");

    let mut seq: u64 = 1;

    // --- Step 1: Handshake ---
    let identity = match perform_handshake(&conn, &state, &mut seq).await {
        Ok(identity) => identity,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let account_id = identity.account_id;

    // --- Step 2: Admission ---
    // Register and arm the guard back to back, so a registered session
    // always has someone to remove it.
    let Admission {
        session,
        mut outbound,
        superseded,
    } = state
        .sessions
        .lock()
        .await
        .register(connection_id, identity);
    let _guard = SessionGuard {
        account_id,
        connection_id,
        state: Arc::clone(&state),
    };
    if let Some(old) = superseded {
        tracing::info!(
            %account_id,
            old = %old.connection_id,
            "new connection replaces the old one"
        );
    }

    send(
        &conn,
        &state,
        &mut seq,
        &ServerMessage::HandshakeAck {
            account_id,
            display_name: session.display_name.clone(),
            server_time: state.elapsed_ms(),
        },
    )
    .await?;
    tracing::info!(%account_id, %connection_id, "player authenticated");

    // --- Step 3: Message loop ---
    let idle_timeout = state.config.session.idle_timeout;
    let mut deadline = Instant::now() + idle_timeout;

    let closing_reason = loop {
        tokio::select! {
            // Queued messages go out before the next inbound frame is
            // read, so a reply never overtakes an event queued before it.
            biased;

            queued = outbound.recv() => match queued {
                Some(message) => send(&conn, &state, &mut seq, &message).await?,
                None => {
                    tracing::info!(%account_id, %connection_id, "session superseded, closing");
                    break Some("superseded");
                }
            },

            inbound = tokio::time::timeout_at(deadline, conn.recv()) => {
                let data = match inbound {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        tracing::info!(%account_id, "connection closed cleanly");
                        break None;
                    }
                    Ok(Err(e)) => {
                        tracing::debug!(%account_id, error = %e, "recv error");
                        break None;
                    }
                    Err(_) => {
                        tracing::info!(%account_id, "connection idle, closing");
                        break Some("idle timeout");
                    }
                };

                // Any frame is activity: it keeps both the connection and
                // the player's world presence alive.
                deadline = Instant::now() + idle_timeout;
                state.sessions.lock().await.touch(account_id, connection_id);
                state.tracker.touch(account_id).await;

                let flow = handle_frame(
                    &conn,
                    &state,
                    account_id,
                    &session.display_name,
                    &data,
                    &mut seq,
                )
                .await?;
                if let Flow::Close = flow {
                    break None;
                }
            }
        }
    };

    if let Some(reason) = closing_reason {
        let notice = ServerMessage::Disconnect {
            reason: reason.to_string(),
        };
        // Best effort; the peer may already be gone.
        let _ = send(&conn, &state, &mut seq, &notice).await;
    }
    let _ = conn.close().await;

    // _guard drops here → departure fires.
    Ok(())
}

/// Waits for the Handshake, answering Health probes until it arrives, and
/// authenticates it.
///
/// On failure the client has already been sent an `Error` frame.
async fn perform_handshake<S, O, P>(
    conn: &WebSocketConnection,
    state: &ServerState<S, O, P>,
    seq: &mut u64,
) -> Result<Identity, RealmsyncError>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    let deadline = Instant::now() + state.config.session.handshake_timeout;

    loop {
        let data = match tokio::time::timeout_at(deadline, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                return Err(realmsync_protocol::ProtocolError::InvalidMessage(
                    "connection closed before handshake".into(),
                )
                .into());
            }
            Ok(Err(e)) => return Err(RealmsyncError::Transport(e)),
            Err(_) => {
                send_error(conn, state, seq, 408, "handshake timed out").await?;
                return Err(realmsync_protocol::ProtocolError::InvalidMessage(
                    "handshake timed out".into(),
                )
                .into());
            }
        };

        let envelope: Envelope<ClientMessage> = match state.codec.decode(&data) {
            Ok(envelope) => envelope,
            Err(e) => {
                send_error(conn, state, seq, 400, "malformed frame").await?;
                return Err(e.into());
            }
        };

        match envelope.payload {
            ClientMessage::Health => {
                let health = health::status(state.started.elapsed());
                send(conn, state, seq, &ServerMessage::Health(health)).await?;
            }
            ClientMessage::Handshake { version, token } => {
                let session_config = &state.config.session;
                return match authenticate(
                    &state.oracle,
                    session_config.protocol_version,
                    version,
                    token.as_deref(),
                    session_config.verify_timeout,
                )
                .await
                {
                    Ok(identity) => Ok(identity),
                    Err(e) => {
                        tracing::info!(connection_id = %conn.id(), error = %e, "handshake rejected");
                        send_error(conn, state, seq, e.code(), &rejection_message(&e)).await?;
                        Err(e.into())
                    }
                };
            }
            _ => {
                send_error(conn, state, seq, 400, "expected Handshake").await?;
                return Err(realmsync_protocol::ProtocolError::InvalidMessage(
                    "first message must be Handshake".into(),
                )
                .into());
            }
        }
    }
}

/// What a rejected client is told. Credential problems stay vague.
fn rejection_message(error: &SessionError) -> String {
    match error {
        SessionError::AuthFailed(_) => "unauthorized".to_string(),
        SessionError::VersionMismatch { .. } => error.to_string(),
        _ => "identity service unavailable".to_string(),
    }
}

/// Handles one inbound frame from an authenticated client.
async fn handle_frame<S, O, P>(
    conn: &WebSocketConnection,
    state: &ServerState<S, O, P>,
    account_id: AccountId,
    display_name: &str,
    data: &[u8],
    seq: &mut u64,
) -> Result<Flow, RealmsyncError>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    let envelope: Envelope<ClientMessage> = match state.codec.decode(data) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::debug!(%account_id, error = %e, "failed to decode envelope");
            send_error(conn, state, seq, 400, "malformed frame").await?;
            return Ok(Flow::Continue);
        }
    };

    match envelope.payload {
        ClientMessage::Heartbeat { client_time } => {
            let ack = ServerMessage::HeartbeatAck {
                client_time,
                server_time: state.elapsed_ms(),
            };
            send(conn, state, seq, &ack).await?;
        }

        ClientMessage::Health => {
            let health = health::status(state.started.elapsed());
            send(conn, state, seq, &ServerMessage::Health(health)).await?;
        }

        ClientMessage::Action {
            request_id,
            kind,
            data,
        } => {
            let outcome = match Action::parse(&kind, data) {
                Ok(action) => dispatch(state, account_id, display_name, action).await,
                Err(e) => Err(e.into()),
            };
            let (result, follow_ups) = match outcome {
                Ok(done) => (done.reply, done.follow_ups),
                Err(e) => (failure(account_id, &kind, &e), Vec::new()),
            };

            send(
                conn,
                state,
                seq,
                &ServerMessage::ActionResult {
                    request_id,
                    kind,
                    result,
                },
            )
            .await?;
            for message in &follow_ups {
                send(conn, state, seq, message).await?;
            }
        }

        ClientMessage::Disconnect { reason } => {
            tracing::info!(%account_id, %reason, "client disconnected");
            return Ok(Flow::Close);
        }

        ClientMessage::Handshake { .. } => {
            send_error(conn, state, seq, 400, "already authenticated").await?;
        }
    }

    Ok(Flow::Continue)
}

/// Wraps `payload` in the next envelope and writes it.
async fn send<S, O, P>(
    conn: &WebSocketConnection,
    state: &ServerState<S, O, P>,
    seq: &mut u64,
    payload: &ServerMessage,
) -> Result<(), RealmsyncError>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    let envelope = Envelope {
        seq: next_seq(seq),
        timestamp: state.elapsed_ms(),
        payload,
    };
    let bytes = state.codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

/// Sends a `ServerMessage::Error` envelope to the client.
async fn send_error<S, O, P>(
    conn: &WebSocketConnection,
    state: &ServerState<S, O, P>,
    seq: &mut u64,
    code: u16,
    message: &str,
) -> Result<(), RealmsyncError>
where
    S: WorldStore,
    O: IdentityOracle,
    P: ActionService,
{
    let error = ServerMessage::Error {
        code,
        message: message.to_string(),
    };
    send(conn, state, seq, &error).await
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
