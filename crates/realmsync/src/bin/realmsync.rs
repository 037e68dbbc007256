//! Development gateway over the in-memory store.
//!
//! ```text
//! REALMSYNC_BIND=0.0.0.0:8080 \
//! REALMSYNC_DEV_TOKENS="alice-token=1:alice,bob-token=2:bob" \
//! RUST_LOG=realmsync=debug cargo run -p realmsync
//! ```

use std::sync::Arc;

use realmsync::prelude::*;
use tracing_subscriber::EnvFilter;

const DEFAULT_BIND: &str = "127.0.0.1:8080";

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<(), RealmsyncError> {
    init_logging();

    let bind = std::env::var("REALMSYNC_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string());
    let oracle = StaticTokenOracle::parse(&std::env::var("REALMSYNC_DEV_TOKENS").unwrap_or_default())?;
    let oracle_len = oracle.len();
    if oracle.is_empty() {
        tracing::warn!("REALMSYNC_DEV_TOKENS is empty, every handshake will be rejected");
    }

    let server = RealmsyncServer::builder()
        .bind(&bind)
        .build(Arc::new(MemoryStore::default_world()), oracle)
        .await?;
    tracing::info!(addr = ?server.local_addr().ok(), tokens = oracle_len, "gateway bound");

    server.run().await
}
