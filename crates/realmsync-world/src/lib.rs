//! World state tracking for Realmsync.
//!
//! [`WorldTracker`] keeps the live mirror of every spawned player: where
//! they are, in which zone, and when they last did something. The mirror
//! is the source of truth for position between store writes; every
//! position change is persisted first and mirrored second, so a crash
//! never leaves the store behind the mirror.
//!
//! Players who go quiet for longer than
//! [`WorldConfig::idle_threshold`] are dropped by
//! [`WorldTracker::evict_stale`], which the gateway runs every
//! [`WorldConfig::sweep_interval`].

mod config;
mod error;
mod state;
mod tracker;

pub use config::WorldConfig;
pub use error::WorldError;
pub use state::LivePlayerState;
pub use tracker::WorldTracker;
