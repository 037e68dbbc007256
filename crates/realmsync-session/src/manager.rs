//! The session table: every live session, keyed by account.
//!
//! # Concurrency note
//!
//! `SessionManager` is not thread-safe by itself. It uses a plain
//! `HashMap`, and the gateway owns it behind a single async mutex. Nothing
//! here does I/O: messages are handed to per-session unbounded channels and
//! written to the socket by the session's own connection task, so the lock
//! is never held across a network write.
//!
//! # Supersede
//!
//! [`SessionManager::register`] for an account that already has a session
//! replaces it. The old entry's sender is dropped on the spot, so the old
//! connection task sees its outbound channel close and shuts down. When
//! that task later calls [`SessionManager::disconnect`] with its own
//! connection id, the id no longer matches and nothing is removed.

use std::collections::HashMap;
use std::sync::Arc;

use realmsync_protocol::{AccountId, ServerMessage};
use realmsync_transport::ConnectionId;
use tokio::sync::mpsc;

use crate::{Identity, Session};

/// What travels through a session's outbound channel. Shared so one
/// broadcast allocates the message once.
pub type Outbound = Arc<ServerMessage>;

struct Entry {
    session: Session,
    outbound: mpsc::UnboundedSender<Outbound>,
}

/// The result of admitting a connection.
pub struct Admission {
    pub session: Session,
    /// Messages for this session. Closes when the session is superseded.
    pub outbound: mpsc::UnboundedReceiver<Outbound>,
    /// The session this one replaced, if the account was already connected.
    pub superseded: Option<Session>,
}

/// All live sessions.
#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<AccountId, Entry>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits an authenticated connection, superseding any prior session
    /// for the same account.
    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        identity: Identity,
    ) -> Admission {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Session::new(connection_id, identity);
        let account_id = session.account_id;

        let superseded = self
            .sessions
            .insert(
                account_id,
                Entry {
                    session: session.clone(),
                    outbound: tx,
                },
            )
            .map(|old| old.session);

        match &superseded {
            Some(old) => tracing::info!(
                %account_id,
                old = %old.connection_id,
                new = %connection_id,
                "session superseded"
            ),
            None => tracing::info!(%account_id, %connection_id, "session created"),
        }

        Admission {
            session,
            outbound: rx,
            superseded,
        }
    }

    /// Removes the session for `account_id` if it still belongs to
    /// `connection_id`.
    ///
    /// Returns the removed session. `None` means there was nothing to do:
    /// the session was already gone, or a newer connection owns the account.
    pub fn disconnect(
        &mut self,
        account_id: AccountId,
        connection_id: ConnectionId,
    ) -> Option<Session> {
        if !self.is_current(account_id, connection_id) {
            return None;
        }
        let entry = self.sessions.remove(&account_id)?;
        tracing::info!(%account_id, %connection_id, "session removed");
        Some(entry.session)
    }

    /// Whether `connection_id` is the live connection for `account_id`.
    pub fn is_current(
        &self,
        account_id: AccountId,
        connection_id: ConnectionId,
    ) -> bool {
        self.sessions
            .get(&account_id)
            .is_some_and(|e| e.session.connection_id == connection_id)
    }

    /// Records inbound activity for the live session.
    pub fn touch(&mut self, account_id: AccountId, connection_id: ConnectionId) {
        if let Some(entry) = self.sessions.get_mut(&account_id) {
            if entry.session.connection_id == connection_id {
                entry.session.touch();
            }
        }
    }

    /// Queues `message` for one account. Returns `false` if the account has
    /// no live session.
    pub fn send_to(&self, account_id: AccountId, message: ServerMessage) -> bool {
        self.sessions
            .get(&account_id)
            .is_some_and(|e| e.outbound.send(Arc::new(message)).is_ok())
    }

    /// Queues `message` for every live session except `except`.
    ///
    /// Returns how many sessions it was queued for. A session whose task
    /// has already gone away is skipped; its own disconnect removes it.
    pub fn broadcast(
        &self,
        message: ServerMessage,
        except: Option<AccountId>,
    ) -> usize {
        let message = Arc::new(message);
        self.sessions
            .iter()
            .filter(|(account, _)| Some(**account) != except)
            .filter(|(_, e)| e.outbound.send(Arc::clone(&message)).is_ok())
            .count()
    }

    pub fn get(&self, account_id: AccountId) -> Option<&Session> {
        self.sessions.get(&account_id).map(|e| &e.session)
    }

    /// Accounts with a live session, in ascending order.
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<AccountId> = self.sessions.keys().copied().collect();
        accounts.sort();
        accounts
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
