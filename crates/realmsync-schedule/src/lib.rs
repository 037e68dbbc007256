//! Timing primitives for Realmsync's background work.
//!
//! Nothing in the world core runs on a per-frame game loop. What it does
//! have is a handful of recurring jobs (snapshot broadcast every second,
//! staleness sweep, capacity top-up) and one stream of delayed jobs
//! (resource respawns). This crate provides both shapes:
//!
//! - [`Ticker`]: a fixed-period timer with overrun detection and budget
//!   warnings, meant to sit in a `tokio::select!` loop.
//! - [`RespawnQueue`]: a due-time ordered work queue of delayed items.
//!
//! ```ignore
//! let mut ticker = Ticker::new(TickConfig::every(Duration::from_secs(1)));
//! loop {
//!     tokio::select! {
//!         _ = shutdown.changed() => break,
//!         _ = ticker.wait_for_tick() => {
//!             broadcast_snapshot().await;
//!             ticker.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod queue;
mod ticker;

pub use queue::RespawnQueue;
pub use ticker::{TickConfig, TickInfo, Ticker};
