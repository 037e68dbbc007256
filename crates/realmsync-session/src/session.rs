//! Session types.
//!
//! A session is the server's record of one authenticated connection: which
//! connection it is, which account it speaks for, and when it last did
//! anything. Times use `tokio::time::Instant` so paused-clock tests can
//! drive idle expiry.

use std::time::Duration;

use realmsync_protocol::AccountId;
use realmsync_transport::ConnectionId;
use tokio::time::Instant;

use crate::Identity;

/// Admission and liveness settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The only protocol version accepted at handshake.
    pub protocol_version: u32,
    /// How long a new connection may take to send its handshake.
    pub handshake_timeout: Duration,
    /// Upper bound on a single identity oracle call.
    pub verify_timeout: Duration,
    /// A connection silent for this long is closed.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            protocol_version: 1,
            handshake_timeout: Duration::from_secs(5),
            verify_timeout: Duration::from_secs(3),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

/// One live, authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub account_id: AccountId,
    pub display_name: String,
    pub connected_at: Instant,
    pub last_activity_at: Instant,
}

impl Session {
    pub fn new(connection_id: ConnectionId, identity: Identity) -> Self {
        let now = Instant::now();
        Self {
            connection_id,
            account_id: identity.account_id,
            display_name: identity.display_name,
            connected_at: now,
            last_activity_at: now,
        }
    }

    /// Records inbound activity.
    pub fn touch(&mut self) {
        self.last_activity_at = Instant::now();
    }

    /// Time since the last inbound activity.
    pub fn idle_for(&self) -> Duration {
        self.last_activity_at.elapsed()
    }
}
