//! Session management for Realmsync.
//!
//! This crate owns the lifecycle of an authenticated connection:
//!
//! 1. **Identity**: who is on the other end ([`IdentityOracle`] trait,
//!    [`authenticate`] for the handshake checks around it).
//! 2. **Session table**: who is connected right now, and where to deliver
//!    their messages ([`SessionManager`]).
//!
//! At most one session exists per account. A second handshake for the same
//! account supersedes the first: the old connection's outbound channel is
//! dropped, which tells its handler to close.
//!
//! ```text
//! Gateway (above)   ← owns one SessionManager behind a mutex
//!     ↕
//! Session (this crate)
//!     ↕
//! Protocol / Transport (below)  ← AccountId, ServerMessage, ConnectionId
//! ```

mod error;
mod manager;
mod oracle;
mod session;

pub use error::SessionError;
pub use manager::{Admission, Outbound, SessionManager};
pub use oracle::{
    Identity, IdentityOracle, StaticTokenOracle, authenticate, bearer_token,
};
pub use session::{Session, SessionConfig};
